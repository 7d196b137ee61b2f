//! Client tooling for the `ConfidentialTrophyNFT` contract on an FHEVM chain.
//!
//! Scores are encrypted through the relayer bridge ([`relayer`]), normalised into contract
//! arguments (`trophy_types::bytes`) and minted through typed bindings ([`contract`]). The
//! [`driver`] sequences those steps for each CLI command.

pub mod cli;
pub mod config;
pub mod contract;
pub mod driver;
pub mod error;
pub mod relayer;

pub use config::Config;
pub use contract::{EthTrophyContract, MintReceipt, MintRequest, Minted, TrophyContract};
pub use driver::{MintOutcome, TokenInfo, TrophyContext};
pub use error::{Result, TrophyError};
pub use relayer::{FheService, RawEncryptedInput, RelayerClient};
