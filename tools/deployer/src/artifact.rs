use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use ethers::{abi::Abi, types::Bytes};
use serde_json::Value;

/// Read ABI and creation bytecode from a compiled artifact.
pub fn load(path: &Path) -> Result<(Abi, Bytes)> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading artifact {}", path.display()))?;
    parse(&raw).with_context(|| format!("invalid artifact {}", path.display()))
}

/// Accepts the Hardhat layout (`bytecode: "0x…"`) and the Foundry layout
/// (`bytecode: { object: "0x…" }`).
pub fn parse(raw: &str) -> Result<(Abi, Bytes)> {
    let root: Value = serde_json::from_str(raw).context("artifact is not JSON")?;

    let abi = root
        .get("abi")
        .cloned()
        .ok_or_else(|| anyhow!("missing `abi`"))?;
    let abi: Abi = serde_json::from_value(abi).context("malformed `abi`")?;

    let code = match root.get("bytecode") {
        Some(Value::String(s)) => s.as_str(),
        Some(Value::Object(o)) => o
            .get("object")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("missing `bytecode.object`"))?,
        _ => bail!("missing `bytecode`"),
    };
    if code.contains("__") {
        bail!("bytecode has unlinked library placeholders");
    }
    let bytecode: Bytes = code.parse().context("bytecode is not hex")?;
    if bytecode.is_empty() {
        bail!("artifact has no creation bytecode (abstract contract or interface?)");
    }
    Ok((abi, bytecode))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABI: &str = r#"[{"type":"function","name":"balanceOf","stateMutability":"view","inputs":[{"name":"owner","type":"address"}],"outputs":[{"name":"","type":"uint256"}]}]"#;

    #[test]
    fn reads_hardhat_layout() {
        let raw = format!(r#"{{"contractName":"ConfidentialTrophyNFT","abi":{ABI},"bytecode":"0x6080604052"}}"#);
        let (abi, code) = parse(&raw).unwrap();
        assert!(abi.function("balanceOf").is_ok());
        assert_eq!(code.to_vec(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn reads_foundry_layout() {
        let raw = format!(r#"{{"abi":{ABI},"bytecode":{{"object":"0x6080","sourceMap":""}}}}"#);
        let (_, code) = parse(&raw).unwrap();
        assert_eq!(code.to_vec(), vec![0x60, 0x80]);
    }

    #[test]
    fn rejects_undeployable_artifacts() {
        assert!(parse(r#"{"abi":[],"bytecode":"0x"}"#).is_err());
        assert!(parse(r#"{"abi":[]}"#).is_err());
        assert!(parse(r#"{"bytecode":"0x6080"}"#).is_err());
        assert!(parse(r#"{"abi":[],"bytecode":"0x6080__$abcd$__"}"#).is_err());
        assert!(parse(r#"{"abi":[],"bytecode":"0xzz"}"#).is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load(Path::new("/nonexistent/Trophy.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/Trophy.json"));
    }
}
