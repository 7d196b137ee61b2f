use clap::{Parser, Subcommand};
use ethers::types::{Address, U256};

use crate::error::TrophyError;

/// Mint, inspect and decrypt confidential trophy NFTs.
///
/// Connection settings come from the environment (or `.env`): `RPC_URL`, `CONTRACT_ADDRESS`,
/// `PRIVATE_KEY` (needed by `mint`), `RELAYER_URL`, `CHAIN_ID`, `TOKEN_URI`.
#[derive(Parser, Debug)]
#[command(name = "trophy", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Mint an NFT with an encrypted score (recipient defaults to the signer)
    Mint {
        score: u32,
        #[arg(value_parser = parse_address)]
        recipient: Option<Address>,
    },
    /// Check the NFT balance of an address
    Balance {
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// Decrypt a token's score (owner only)
    Decrypt {
        #[arg(value_parser = parse_token_id)]
        token_id: U256,
        owner_private_key: String,
    },
    /// Show a token's owner and metadata URI
    Info {
        #[arg(value_parser = parse_token_id)]
        token_id: U256,
    },
}

pub fn parse_address(s: &str) -> Result<Address, String> {
    s.parse::<Address>()
        .map_err(|e| format!("`{s}` is not an address: {e}"))
}

/// Token ids are decimal on the command line (`U256::from_str` would read hex).
pub fn parse_token_id(s: &str) -> Result<U256, String> {
    U256::from_dec_str(s).map_err(|e| format!("`{s}` is not a token id: {e}"))
}

/// Text printed to stderr when a command fails: the error chain, any diagnostic payload and,
/// for ownership failures, a hint.
pub fn error_report(err: &anyhow::Error) -> String {
    let mut out = format!("Error: {err:#}");
    if let Some(err) = err.downcast_ref::<TrophyError>() {
        if let Some(data) = err.data() {
            out.push_str(&format!("\nError data: {data}"));
        }
        if matches!(err, TrophyError::Authorization(_)) {
            out.push_str("\nHint: only the NFT owner can decrypt the score");
        }
    }
    out
}
