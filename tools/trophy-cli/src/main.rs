use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Provider},
    signers::Signer,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use trophy_cli::{
    cli::{error_report, Cli, Command},
    config::wallet_from_key,
    Config, EthTrophyContract, FheService, RelayerClient, TrophyContext, TrophyContract,
    TrophyError,
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\n{}", error_report(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let provider =
        Provider::<Http>::try_from(config.rpc_url.as_str()).context("invalid RPC_URL")?;
    let fhe = RelayerClient::new(&config.relayer_url, config.fhevm.clone())?;
    debug!(contract = ?config.contract_address, relayer = %config.relayer_url, "configured");

    // Read-only commands work without a key; `mint` checks for the signer itself.
    match config.wallet()? {
        Some(wallet) => {
            let signer = wallet.address();
            let client = Arc::new(SignerMiddleware::new(provider, wallet));
            let ctx = TrophyContext {
                contract: EthTrophyContract::new(config.contract_address, client),
                fhe,
                signer: Some(signer),
                token_uri: config.token_uri.clone(),
                explorer_url: config.explorer_url.clone(),
            };
            execute(&ctx, cli.command, config.chain_id).await?;
        }
        None => {
            let ctx = TrophyContext {
                contract: EthTrophyContract::new(config.contract_address, Arc::new(provider)),
                fhe,
                signer: None,
                token_uri: config.token_uri.clone(),
                explorer_url: config.explorer_url.clone(),
            };
            execute(&ctx, cli.command, config.chain_id).await?;
        }
    }
    Ok(())
}

async fn execute<C: TrophyContract, F: FheService>(
    ctx: &TrophyContext<C, F>,
    command: Command,
    chain_id: u64,
) -> Result<(), TrophyError> {
    match command {
        Command::Mint { score, recipient } => ctx.mint(score, recipient).await.map(drop),
        Command::Balance { address } => ctx.balance(address).await.map(drop),
        Command::Decrypt {
            token_id,
            owner_private_key,
        } => {
            let owner = wallet_from_key(&owner_private_key, chain_id)?;
            ctx.decrypt(token_id, &owner).await.map(drop)
        }
        Command::Info { token_id } => ctx.info(token_id).await.map(drop),
    }
}

