use std::{fs, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dotenv::dotenv;
use ethers::{
    contract::ContractFactory,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod artifact;
mod deployments;

use deployments::Deployment;

const CONTRACT_NAME: &str = "ConfidentialTrophyNFT";

/// Deploy `ConfidentialTrophyNFT` from its compiled artifact, then write/update a deployments
/// JSON.
///
/// The contract takes no constructor arguments. The artifact is produced by the contract
/// toolchain (Hardhat `artifacts/` or Foundry `out/`).
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Compiled artifact containing `abi` and `bytecode`.
    #[arg(
        long,
        default_value = "artifacts/contracts/ConfidentialTrophyNFT.sol/ConfidentialTrophyNFT.json"
    )]
    artifact: PathBuf,

    /// RPC URL of the FHEVM chain.
    #[arg(long, env = "RPC_URL")]
    rpc_url: String,

    /// Path to a file containing the deployer private key.
    #[arg(long, env = "PRIV_KEY_PATH", conflicts_with = "private_key")]
    private_key_path: Option<PathBuf>,

    /// Private key (hex string, 0x...).
    #[arg(long, env = "PRIVATE_KEY", conflicts_with = "private_key_path")]
    private_key: Option<String>,

    /// Chain id for signing. Queried from the node when omitted.
    #[arg(long, env = "CHAIN_ID")]
    chain_id: Option<u64>,

    /// Blocks to wait for after the deployment is mined (6 is safe on Sepolia).
    #[arg(long, default_value_t = 6)]
    confirmations: usize,

    /// Path to write deployment info (eg, deployments.sepolia.json).
    #[arg(long, default_value = "deployments.sepolia.json")]
    deployments_path: PathBuf,

    /// Key under `deployments` to store this contract.
    #[arg(long, default_value = CONTRACT_NAME)]
    contract_key: String,

    /// Network name recorded in the deployments file (eg, sepolia, localhost).
    #[arg(long, default_value = "sepolia")]
    network: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let deployment = deploy(&cli).await?;
    deployments::record(
        &cli.deployments_path,
        &cli.network,
        &cli.contract_key,
        &cli.rpc_url,
        &deployment,
    )?;

    println!("{CONTRACT_NAME} deployed at: {:?}", deployment.address);
    Ok(())
}

async fn deploy(cli: &Cli) -> Result<Deployment> {
    let (abi, bytecode) = artifact::load(&cli.artifact)?;

    let provider = Provider::<Http>::try_from(cli.rpc_url.as_str()).context("invalid --rpc-url")?;
    let chain_id = match cli.chain_id {
        Some(id) => id,
        None => provider
            .get_chainid()
            .await
            .context("failed querying chain id")?
            .as_u64(),
    };

    let wallet = LocalWallet::from_str(read_private_key(cli)?.trim())
        .context("invalid deployer private key")?
        .with_chain_id(chain_id);
    let deployer = wallet.address();
    let client = Arc::new(SignerMiddleware::new(provider, wallet));

    info!(?deployer, chain_id, confirmations = cli.confirmations, "deploying {CONTRACT_NAME}");
    let factory = ContractFactory::new(abi, bytecode, client);
    let (contract, receipt) = factory
        .deploy(())?
        .confirmations(cli.confirmations)
        .send_with_receipt()
        .await
        .context("deployment transaction failed")?;
    info!(tx = ?receipt.transaction_hash, block = ?receipt.block_number, "deployed");

    Ok(Deployment {
        address: contract.address(),
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number.map(|b| b.as_u64()),
        deployer,
        chain_id,
    })
}

fn read_private_key(cli: &Cli) -> Result<String> {
    if let Some(ref pk_path) = cli.private_key_path {
        fs::read_to_string(pk_path)
            .with_context(|| format!("failed reading {}", pk_path.display()))
    } else if let Some(ref pk) = cli.private_key {
        Ok(pk.clone())
    } else {
        Err(anyhow!(
            "missing deployer key: provide --private-key-path or --private-key (or set PRIV_KEY_PATH/PRIVATE_KEY)"
        ))
    }
}
