//! The four CLI operations, each a straight sequence of awaited calls.
//!
//! Progress is printed as it happens; the return values carry the same facts for callers
//! and tests. The first failing step ends the operation.

use ethers::{
    signers::{LocalWallet, Signer},
    types::{Address, H256, U256, U64},
};
use tracing::{debug, info};
use trophy_types::{gas_limit_for, CiphertextHandle, InputProof};

use crate::{
    contract::{find_minted, MintRequest, TrophyContract},
    error::{Result, TrophyError},
    relayer::FheService,
};

const RULE: &str = "═══════════════════════════════════════════════════════";

/// Everything an operation needs, built once at start-up.
pub struct TrophyContext<C, F> {
    pub contract: C,
    pub fhe: F,
    /// Address of the configured signer, if a private key was provided.
    pub signer: Option<Address>,
    pub token_uri: String,
    pub explorer_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintOutcome {
    pub tx_hash: H256,
    pub gas_limit: u64,
    pub block_number: Option<U64>,
    pub gas_used: Option<U256>,
    /// Token id and owner from the `Transfer` event, if one was found.
    pub token_id: Option<U256>,
    pub owner: Option<Address>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    pub token_id: U256,
    pub owner: Address,
    pub uri: String,
}

pub fn banner(title: &str) {
    println!("{RULE}");
    println!("   {title}");
    println!("{RULE}\n");
}

/// `0x1234abcd...89abcdef`: the first ten and last eight characters.
pub fn preview(hex: &str) -> String {
    if hex.len() <= 18 {
        return hex.to_string();
    }
    format!("{}...{}", &hex[..10], &hex[hex.len() - 8..])
}

impl<C: TrophyContract, F: FheService> TrophyContext<C, F> {
    fn require_signer(&self) -> Result<Address> {
        self.signer
            .ok_or_else(|| TrophyError::Config("PRIVATE_KEY is not set".into()))
    }

    /// Encrypt `score`, mint it to `recipient` (default: the signer) and report the token id.
    pub async fn mint(&self, score: u32, recipient: Option<Address>) -> Result<MintOutcome> {
        let signer = self.require_signer()?;
        let recipient = recipient.unwrap_or(signer);
        let contract = self.contract.address();

        banner("MINTING CONFIDENTIAL TROPHY NFT");

        println!("Encrypting score: {score}");
        let raw = self.fhe.encrypt_u32(contract, signer, score).await?;
        println!("Score encrypted\n");

        let first = raw
            .handles
            .first()
            .ok_or_else(|| TrophyError::transaction("relayer returned no handles"))?;
        let handle = CiphertextHandle::try_from(first)?;
        let proof = InputProof::try_from(&raw.input_proof)?;
        debug!(handle = %handle, proof_len = proof.len(), "normalised encrypted input");

        let proof_hex = proof.to_hex();
        println!("Transaction data:");
        println!("   Recipient: {recipient:?}");
        println!("   URI: {}", self.token_uri);
        println!("   Encrypted Score: {}", preview(&handle.to_hex()));
        println!("   Proof length: {} chars\n", proof_hex.len());

        let req = MintRequest {
            to: recipient,
            uri: self.token_uri.clone(),
            handle,
            proof,
        };

        println!("Estimating gas...");
        let estimate = self.contract.estimate_mint(&req).await?;
        let gas_limit = checked_gas_limit(estimate)?;
        println!("   Estimated: {estimate}");
        println!("   Using limit: {gas_limit}\n");

        println!("Sending transaction...");
        let tx_hash = self.contract.send_mint(&req, U256::from(gas_limit)).await?;
        info!(?tx_hash, gas_limit, "mint submitted");
        println!("Transaction sent!");
        println!("   Hash: {tx_hash:?}");
        println!(
            "   Explorer: {}/tx/{tx_hash:?}\n",
            self.explorer_url.trim_end_matches('/')
        );

        println!("Waiting for confirmation...");
        let receipt = self.contract.wait_for_receipt(tx_hash).await?;
        println!("Transaction confirmed!");
        if let Some(block) = receipt.block_number {
            println!("   Block: {block}");
        }
        if let Some(used) = receipt.gas_used {
            println!("   Gas used: {used}");
        }
        println!();

        let minted = find_minted(contract, &receipt.logs);
        match minted {
            Some(m) => {
                println!("NFT Minted!");
                println!("   Token ID: {}", m.token_id);
                println!("   Owner: {:?}", m.to);
            }
            None => println!("No Transfer event found in the receipt"),
        }
        println!("\n{RULE}");

        Ok(MintOutcome {
            tx_hash: receipt.tx_hash,
            gas_limit,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            token_id: minted.map(|m| m.token_id),
            owner: minted.map(|m| m.to),
        })
    }

    pub async fn balance(&self, owner: Address) -> Result<U256> {
        banner("CHECKING NFT BALANCE");

        let balance = self.contract.balance_of(owner).await?;
        println!("Address: {owner:?}");
        println!("Balance: {balance} NFTs\n");
        if !balance.is_zero() {
            // The contract has no enumeration extension.
            println!("Token ids are not enumerable on this contract; use `info <tokenId>`.\n");
        }
        println!("{RULE}");
        Ok(balance)
    }

    pub async fn info(&self, token_id: U256) -> Result<TokenInfo> {
        banner("NFT INFO");

        let owner = self.contract.owner_of(token_id).await?;
        let uri = self.contract.token_uri(token_id).await?;
        println!("Token ID: {token_id}");
        println!("Owner: {owner:?}");
        println!("URI: {uri}");
        println!("\nTo decrypt the score, use:");
        println!("   trophy decrypt {token_id} <owner_private_key>\n");
        println!("{RULE}");

        Ok(TokenInfo {
            token_id,
            owner,
            uri,
        })
    }

    /// Fetch the owner's handle for `token_id` and decrypt it through the relayer.
    pub async fn decrypt(&self, token_id: U256, owner: &LocalWallet) -> Result<u64> {
        banner("DECRYPTING SCORE");

        println!("Token ID: {token_id}");
        println!("Owner: {:?}\n", owner.address());

        println!("Getting encrypted score...");
        let handle = self
            .contract
            .encrypted_score(token_id, owner.address())
            .await?;
        if handle.is_zero() {
            return Err(TrophyError::transaction(format!(
                "token {token_id} has no encrypted score"
            )));
        }
        println!("Encrypted score retrieved: {handle}\n");

        println!("Decrypting...");
        let score = self
            .fhe
            .user_decrypt(&handle, self.contract.address(), owner)
            .await?;

        println!("{RULE}");
        println!("   DECRYPTED SCORE: {score}");
        println!("{RULE}\n");
        Ok(score)
    }
}

fn checked_gas_limit(estimate: U256) -> Result<u64> {
    let estimate = if estimate > U256::from(u64::MAX) {
        u64::MAX
    } else {
        estimate.as_u64()
    };
    Ok(gas_limit_for(estimate)?)
}
