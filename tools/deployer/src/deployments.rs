//! Machine-readable record of deployments, keyed by contract.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use ethers::{
    types::{Address, H256},
    utils::to_checksum,
};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub const DEPLOY_ID: &str = "deploy_confidential_trophy";
pub const TAGS: &[&str] = &["ConfidentialTrophyNFT"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub deployer: Address,
    pub chain_id: u64,
}

/// Merge `deployment` into the JSON at `path` under `deployments.<contract_key>`.
pub fn record(
    path: &Path,
    network: &str,
    contract_key: &str,
    rpc_url: &str,
    deployment: &Deployment,
) -> Result<()> {
    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());

    let existing = if path.exists() {
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?
    } else {
        String::new()
    };

    let mut root: Value = if existing.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(&existing)
            .with_context(|| format!("failed parsing JSON in {}", path.display()))?
    };

    merge(&mut root, network, contract_key, entry(deployment, rpc_url, &now), &now);
    write_json_atomic(path, &root)
}

fn entry(d: &Deployment, rpc_url: &str, now: &str) -> Value {
    let mut entry = json!({
        "address": to_checksum(&d.address, None),
        "tx_hash": format!("{:?}", d.tx_hash),
        "deployer": to_checksum(&d.deployer, None),
        "chain_id": d.chain_id,
        "rpc_url": rpc_url,
        "deployed_at": now,
        "deploy_id": DEPLOY_ID,
        "tags": TAGS,
    });
    if let Some(block) = d.block_number {
        entry["block_number"] = json!(block);
    }
    entry
}

fn merge(root: &mut Value, network: &str, contract_key: &str, entry: Value, now: &str) {
    if !root.is_object() {
        *root = json!({});
    }

    root["network"] = json!(network);
    root["updated_at"] = json!(now);

    if root.get("deployments").and_then(Value::as_object).is_none() {
        root["deployments"] = json!({});
    }
    root["deployments"][contract_key] = entry;
}

fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }

    let serialised =
        serde_json::to_string_pretty(value).context("failed serialising deployments JSON")?;
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, serialised.as_bytes())
        .with_context(|| format!("failed writing temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("failed replacing {}", path.display()))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
