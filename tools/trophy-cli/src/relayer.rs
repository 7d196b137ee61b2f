//! Encryption and user decryption through the FHEVM relayer bridge.
//!
//! The bridge is a separate service that wraps the FHEVM relayer SDK and speaks JSON over
//! HTTP (`/v1/encrypt`, `/v1/user-decrypt`). It is not the public relayer endpoint itself;
//! `RELAYER_URL` must point at a running bridge. Binary payloads in its responses are passed
//! on untouched as [`serde_json::Value`]s; the driver normalises them.

use std::time::Duration;

use async_trait::async_trait;
use ethers::{
    signers::{LocalWallet, Signer},
    types::Address,
    utils::keccak256,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use trophy_types::CiphertextHandle;

use crate::{
    config::FhevmParams,
    error::{Result, TrophyError},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Encrypted input as returned by the bridge, before normalisation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEncryptedInput {
    pub handles: Vec<Value>,
    pub input_proof: Value,
}

#[async_trait]
pub trait FheService: Send + Sync {
    /// Encrypt `value` as an `euint32`, bound to `contract` and to the submitting `user`.
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        value: u32,
    ) -> Result<RawEncryptedInput>;

    /// Decrypt a handle the owner has been granted access to.
    async fn user_decrypt(
        &self,
        handle: &CiphertextHandle,
        contract: Address,
        owner: &LocalWallet,
    ) -> Result<u64>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptRequest<'a> {
    instance: &'a FhevmParams,
    contract_address: Address,
    user_address: Address,
    values: Vec<TypedValue>,
}

#[derive(Serialize)]
struct TypedValue {
    #[serde(rename = "type")]
    ty: &'static str,
    value: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDecryptRequest<'a> {
    instance: &'a FhevmParams,
    handle: String,
    contract_address: Address,
    user_address: Address,
    signature: String,
}

pub struct RelayerClient {
    http: reqwest::Client,
    base_url: String,
    fhevm: FhevmParams,
}

impl RelayerClient {
    pub fn new(base_url: &str, fhevm: FhevmParams) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TrophyError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            fhevm,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "relayer request");
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TrophyError::transaction(format!("relayer request to {url} failed: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| TrophyError::transaction(format!("reading relayer response: {e}")))?;
        debug!(%status, body = %text, "relayer response");
        if !status.is_success() {
            return Err(TrophyError::Transaction {
                message: format!("relayer rejected {path} with {status}"),
                data: Some(text),
            });
        }
        serde_json::from_str(&text).map_err(|e| TrophyError::Transaction {
            message: format!("relayer response for {path} is not JSON: {e}"),
            data: Some(text),
        })
    }
}

#[async_trait]
impl FheService for RelayerClient {
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        value: u32,
    ) -> Result<RawEncryptedInput> {
        let body = EncryptRequest {
            instance: &self.fhevm,
            contract_address: contract,
            user_address: user,
            values: vec![TypedValue {
                ty: "euint32",
                value: value.into(),
            }],
        };
        let resp = self.post("/v1/encrypt", &body).await?;
        serde_json::from_value(resp.clone()).map_err(|e| TrophyError::Transaction {
            message: format!("unexpected encrypt response: {e}"),
            data: Some(resp.to_string()),
        })
    }

    async fn user_decrypt(
        &self,
        handle: &CiphertextHandle,
        contract: Address,
        owner: &LocalWallet,
    ) -> Result<u64> {
        let digest = decrypt_authorization_digest(handle, contract, owner.address());
        let signature = owner
            .sign_message(digest)
            .await
            .map_err(|e| TrophyError::transaction(format!("signing decrypt request: {e}")))?;
        let body = UserDecryptRequest {
            instance: &self.fhevm,
            handle: handle.to_hex(),
            contract_address: contract,
            user_address: owner.address(),
            signature: format!("0x{}", hex::encode(signature.to_vec())),
        };
        let resp = self.post("/v1/user-decrypt", &body).await?;
        parse_decrypted_value(&resp)
    }
}

/// `keccak256(handle ‖ contract ‖ user)`, signed (EIP-191) by the requester.
pub fn decrypt_authorization_digest(
    handle: &CiphertextHandle,
    contract: Address,
    user: Address,
) -> [u8; 32] {
    let mut buf = Vec::with_capacity(32 + 20 + 20);
    buf.extend_from_slice(&handle.to_array());
    buf.extend_from_slice(contract.as_bytes());
    buf.extend_from_slice(user.as_bytes());
    keccak256(buf)
}

/// The bridge reports plaintexts as decimal strings (they may exceed JS number range) or
/// plain numbers.
fn parse_decrypted_value(resp: &Value) -> Result<u64> {
    let unexpected = || TrophyError::Transaction {
        message: "unexpected decrypt response".into(),
        data: Some(resp.to_string()),
    };
    match resp.get("value") {
        Some(Value::String(s)) => s.trim().parse().map_err(|_| unexpected()),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(unexpected),
        _ => Err(unexpected()),
    }
}
