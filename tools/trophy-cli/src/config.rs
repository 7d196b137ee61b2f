//! Process configuration, read once from the environment after `.env` has been loaded.

use std::str::FromStr;

use ethers::{
    signers::{LocalWallet, Signer},
    types::Address,
};
use serde::Serialize;

use crate::error::{Result, TrophyError};

pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;
pub const DEFAULT_GATEWAY_CHAIN_ID: u64 = 10_901;
/// Local relayer bridge. The bridge is a separate service wrapping the relayer SDK; Zama's
/// public relayer does not speak the bridge protocol and cannot be used here directly.
pub const DEFAULT_RELAYER_URL: &str = "http://127.0.0.1:8787";
pub const DEFAULT_EXPLORER_URL: &str = "https://sepolia.etherscan.io";
pub const DEFAULT_TOKEN_URI: &str =
    "ipfs://bafkreifxdgxalrmctuytadma3avj43mjlojsunrtho2cxxahwm5sljhxvu";

// Sepolia FHEVM deployment.
const DEFAULT_ACL: &str = "0xf0Ffdc93b7E186bC2f8CB3dAA75D86d1930A433D";
const DEFAULT_KMS: &str = "0xbE0E383937d564D7FF0BC3b46c51f0bF8d5C311A";
const DEFAULT_INPUT_VERIFIER: &str = "0xBBC1fFCdc7C316aAAd72E807D9b0272BE8F84DA0";
const DEFAULT_DECRYPTION_VERIFIER: &str = "0x5D8BD78e2ea6bbE41f26dFe9fdaEAa349e077478";
const DEFAULT_INPUT_VERIFICATION_VERIFIER: &str = "0x483b9dE06E4E4C7D35CCf5837A1668487406D955";

/// FHEVM instance parameters forwarded to the relayer with every request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FhevmParams {
    pub acl_contract_address: Address,
    pub kms_contract_address: Address,
    pub input_verifier_contract_address: Address,
    pub verifying_contract_address_decryption: Address,
    pub verifying_contract_address_input_verification: Address,
    pub chain_id: u64,
    pub gateway_chain_id: u64,
}

pub struct Config {
    pub rpc_url: String,
    /// Signer for state-mutating commands. Read-only commands run without it.
    pub private_key: Option<String>,
    pub contract_address: Address,
    pub chain_id: u64,
    pub relayer_url: String,
    pub token_uri: String,
    pub explorer_url: String,
    pub fhevm: FhevmParams,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| TrophyError::Config(format!("{key} is not set")))
        };
        let address_or = |key: &str, default: &str| {
            parse_address(key, &get(key).unwrap_or_else(|| default.to_string()))
        };
        let u64_or = |key: &str, default: u64| match get(key) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| TrophyError::Config(format!("{key}: `{raw}` is not a u64: {e}"))),
            None => Ok(default),
        };

        let chain_id = u64_or("CHAIN_ID", DEFAULT_CHAIN_ID)?;
        Ok(Self {
            rpc_url: required("RPC_URL")?,
            private_key: get("PRIVATE_KEY"),
            contract_address: parse_address("CONTRACT_ADDRESS", &required("CONTRACT_ADDRESS")?)?,
            chain_id,
            relayer_url: get("RELAYER_URL").unwrap_or_else(|| DEFAULT_RELAYER_URL.to_string()),
            token_uri: get("TOKEN_URI").unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            explorer_url: get("EXPLORER_URL").unwrap_or_else(|| DEFAULT_EXPLORER_URL.to_string()),
            fhevm: FhevmParams {
                acl_contract_address: address_or("ACL_CONTRACT_ADDRESS", DEFAULT_ACL)?,
                kms_contract_address: address_or("KMS_CONTRACT_ADDRESS", DEFAULT_KMS)?,
                input_verifier_contract_address: address_or(
                    "INPUT_VERIFIER_CONTRACT_ADDRESS",
                    DEFAULT_INPUT_VERIFIER,
                )?,
                verifying_contract_address_decryption: address_or(
                    "DECRYPTION_VERIFIER_ADDRESS",
                    DEFAULT_DECRYPTION_VERIFIER,
                )?,
                verifying_contract_address_input_verification: address_or(
                    "INPUT_VERIFICATION_VERIFIER_ADDRESS",
                    DEFAULT_INPUT_VERIFICATION_VERIFIER,
                )?,
                chain_id,
                gateway_chain_id: u64_or("GATEWAY_CHAIN_ID", DEFAULT_GATEWAY_CHAIN_ID)?,
            },
        })
    }

    /// The configured signer, bound to the configured chain id.
    pub fn wallet(&self) -> Result<Option<LocalWallet>> {
        self.private_key
            .as_deref()
            .map(|pk| wallet_from_key(pk, self.chain_id))
            .transpose()
    }

    /// Like [`Config::wallet`], but a missing key is an error.
    pub fn require_wallet(&self) -> Result<LocalWallet> {
        self.wallet()?
            .ok_or_else(|| TrophyError::Config("PRIVATE_KEY is not set".into()))
    }
}

pub fn wallet_from_key(key: &str, chain_id: u64) -> Result<LocalWallet> {
    LocalWallet::from_str(key.trim())
        .map(|w| w.with_chain_id(chain_id))
        .map_err(|e| TrophyError::Config(format!("invalid private key: {e}")))
}

fn parse_address(key: &str, raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .map_err(|e| TrophyError::Config(format!("{key}: invalid address `{raw}`: {e}")))
}
