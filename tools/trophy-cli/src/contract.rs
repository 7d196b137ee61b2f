//! Typed access to the deployed `ConfidentialTrophyNFT`.
//!
//! [`TrophyContract`] is the seam between the transaction driver and the chain: the ethers
//! binding implements it for a live node, tests implement it in memory.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    contract::{abigen, parse_log, ContractError, EthEvent},
    providers::{Middleware, PendingTransaction},
    types::{Address, Bytes, Log, TransactionReceipt, H256, U256, U64},
};
use tracing::debug;
use trophy_types::{CiphertextHandle, InputProof};

use crate::error::{Result, TrophyError};

abigen!(
    ConfidentialTrophyNFT,
    r#"[
        function mintWithConfidentialScore(address to, string uri, bytes32 encryptedScore, bytes inputProof)
        function getEncryptedScore(uint256 tokenId) view returns (bytes32)
        function balanceOf(address owner) view returns (uint256)
        function ownerOf(uint256 tokenId) view returns (address)
        function tokenURI(uint256 tokenId) view returns (string)
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId)
    ]"#
);

/// Arguments of `mintWithConfidentialScore`, already normalised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintRequest {
    pub to: Address,
    pub uri: String,
    pub handle: CiphertextHandle,
    pub proof: InputProof,
}

/// What the driver needs from a mined mint transaction.
#[derive(Clone, Debug, Default)]
pub struct MintReceipt {
    pub tx_hash: H256,
    pub block_number: Option<U64>,
    pub gas_used: Option<U256>,
    pub logs: Vec<Log>,
}

impl From<TransactionReceipt> for MintReceipt {
    fn from(r: TransactionReceipt) -> Self {
        Self {
            tx_hash: r.transaction_hash,
            block_number: r.block_number,
            gas_used: r.gas_used,
            logs: r.logs,
        }
    }
}

/// A `Transfer` emitted by the trophy contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Minted {
    pub from: Address,
    pub to: Address,
    pub token_id: U256,
}

#[async_trait]
pub trait TrophyContract: Send + Sync {
    fn address(&self) -> Address;

    async fn estimate_mint(&self, req: &MintRequest) -> Result<U256>;

    /// Submit the mint and return its hash without waiting for inclusion.
    async fn send_mint(&self, req: &MintRequest, gas_limit: U256) -> Result<H256>;

    /// Wait for a submitted transaction to be mined. A reverted receipt is an error.
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<MintReceipt>;

    async fn balance_of(&self, owner: Address) -> Result<U256>;

    async fn owner_of(&self, token_id: U256) -> Result<Address>;

    async fn token_uri(&self, token_id: U256) -> Result<String>;

    /// `getEncryptedScore` as seen by `caller`; only the owner is answered.
    async fn encrypted_score(&self, token_id: U256, caller: Address) -> Result<CiphertextHandle>;
}

/// First `Transfer` in `logs` emitted by `contract`.
pub fn find_minted(contract: Address, logs: &[Log]) -> Option<Minted> {
    logs.iter()
        .filter(|log| log.address == contract)
        .filter(|log| log.topics.first() == Some(&TransferFilter::signature()))
        .find_map(|log| parse_log::<TransferFilter>(log.clone()).ok())
        .map(|ev| Minted {
            from: ev.from,
            to: ev.to,
            token_id: ev.token_id,
        })
}

/// Contract binding over any ethers middleware.
pub struct EthTrophyContract<M> {
    inner: ConfidentialTrophyNFT<M>,
    client: Arc<M>,
}

impl<M: Middleware + 'static> EthTrophyContract<M> {
    pub fn new(address: Address, client: Arc<M>) -> Self {
        Self {
            inner: ConfidentialTrophyNFT::new(address, client.clone()),
            client,
        }
    }

    fn mint_call(&self, req: &MintRequest) -> ethers::contract::builders::ContractCall<M, ()> {
        self.inner.mint_with_confidential_score(
            req.to,
            req.uri.clone(),
            req.handle.to_array(),
            Bytes::from(req.proof.as_slice().to_vec()),
        )
    }
}

#[async_trait]
impl<M: Middleware + 'static> TrophyContract for EthTrophyContract<M> {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn estimate_mint(&self, req: &MintRequest) -> Result<U256> {
        self.mint_call(req).estimate_gas().await.map_err(|e| {
            let err = classify(e);
            match err {
                TrophyError::Transaction { message, data } => {
                    TrophyError::GasEstimation { message, data }
                }
                other => other,
            }
        })
    }

    async fn send_mint(&self, req: &MintRequest, gas_limit: U256) -> Result<H256> {
        let call = self.mint_call(req).gas(gas_limit);
        let pending = call.send().await.map_err(classify)?;
        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<MintReceipt> {
        let receipt = PendingTransaction::new(tx_hash, self.client.provider())
            .await
            .map_err(|e| TrophyError::transaction(format!("waiting for {tx_hash:?}: {e}")))?
            .ok_or_else(|| {
                TrophyError::transaction(format!("transaction {tx_hash:?} dropped or not mined"))
            })?;
        debug!(?tx_hash, status = ?receipt.status, "receipt");
        if receipt.status != Some(U64::from(1)) {
            return Err(TrophyError::transaction(format!(
                "transaction {tx_hash:?} reverted (status {:?})",
                receipt.status
            )));
        }
        Ok(receipt.into())
    }

    async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.inner.balance_of(owner).call().await.map_err(classify)
    }

    async fn owner_of(&self, token_id: U256) -> Result<Address> {
        self.inner.owner_of(token_id).call().await.map_err(classify)
    }

    async fn token_uri(&self, token_id: U256) -> Result<String> {
        self.inner.token_uri(token_id).call().await.map_err(classify)
    }

    async fn encrypted_score(&self, token_id: U256, caller: Address) -> Result<CiphertextHandle> {
        self.inner
            .get_encrypted_score(token_id)
            .from(caller)
            .call()
            .await
            .map(CiphertextHandle::new)
            .map_err(classify)
    }
}

/// Turn an ethers error into a [`TrophyError`], decoding `Error(string)` reverts.
fn classify<M: Middleware>(err: ContractError<M>) -> TrophyError {
    let data = err.as_revert().map(|b| b.to_string());
    match err.decode_revert::<String>() {
        Some(reason) => TrophyError::from_revert(reason, data),
        None => TrophyError::Transaction {
            message: err.to_string(),
            data,
        },
    }
}

#[cfg(test)]
mod tests {
    use ethers::{
        abi::{self, Token},
        providers::{JsonRpcError, MockResponse, Provider},
    };
    use serde_json::json;
    use trophy_types::RawBytes;

    use super::*;

    fn error_string_revert(reason: &str) -> Bytes {
        let mut data = vec![0x08, 0xc3, 0x79, 0xa0];
        data.extend(abi::encode(&[Token::String(reason.to_string())]));
        data.into()
    }

    fn mint_request() -> MintRequest {
        MintRequest {
            to: Address::repeat_byte(0xa1),
            uri: "ipfs://trophy".to_string(),
            handle: CiphertextHandle::new([7; 32]),
            proof: InputProof::from_raw(RawBytes::Sequence(vec![1, 2, 3])).unwrap(),
        }
    }

    #[tokio::test]
    async fn estimate_revert_becomes_gas_estimation_error() {
        let (provider, mock) = Provider::mocked();
        let revert = error_string_revert("paused");
        mock.push_response(MockResponse::Error(JsonRpcError {
            code: 3,
            message: "execution reverted: paused".to_string(),
            data: Some(json!(revert.to_string())),
        }));
        let contract = EthTrophyContract::new(Address::repeat_byte(0x11), Arc::new(provider));

        let err = contract.estimate_mint(&mint_request()).await.unwrap_err();
        match &err {
            TrophyError::GasEstimation { message, .. } => {
                assert_eq!(message, "execution reverted: paused")
            }
            other => panic!("expected GasEstimation, got {other:?}"),
        }
        assert_eq!(err.data(), Some(revert.to_string().as_str()));
    }

    #[tokio::test]
    async fn estimate_not_owner_stays_an_authorization_error() {
        let (provider, mock) = Provider::mocked();
        mock.push_response(MockResponse::Error(JsonRpcError {
            code: 3,
            message: "execution reverted: Not owner".to_string(),
            data: Some(json!(error_string_revert(crate::error::NOT_OWNER_REASON).to_string())),
        }));
        let contract = EthTrophyContract::new(Address::repeat_byte(0x11), Arc::new(provider));

        let err = contract.estimate_mint(&mint_request()).await.unwrap_err();
        assert!(matches!(err, TrophyError::Authorization(_)), "{err:?}");
    }

    fn word(addr: Address) -> H256 {
        H256::from(addr)
    }

    fn transfer_log(contract: Address, from: Address, to: Address, token_id: u64) -> Log {
        let mut id = [0u8; 32];
        U256::from(token_id).to_big_endian(&mut id);
        Log {
            address: contract,
            topics: vec![TransferFilter::signature(), word(from), word(to), H256::from(id)],
            ..Default::default()
        }
    }

    #[test]
    fn transfer_signature_matches_erc721() {
        assert_eq!(
            format!("{:?}", TransferFilter::signature()),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn finds_mint_from_contract() {
        let contract = Address::repeat_byte(0x11);
        let alice = Address::repeat_byte(0xa1);
        let logs = vec![
            Log {
                address: contract,
                topics: vec![H256::repeat_byte(0x99)],
                ..Default::default()
            },
            transfer_log(contract, Address::zero(), alice, 7),
        ];
        let minted = find_minted(contract, &logs).unwrap();
        assert_eq!(minted.from, Address::zero());
        assert_eq!(minted.to, alice);
        assert_eq!(minted.token_id, U256::from(7));
    }

    #[test]
    fn ignores_transfers_from_other_contracts() {
        let contract = Address::repeat_byte(0x11);
        let other = Address::repeat_byte(0x22);
        let logs = vec![transfer_log(other, Address::zero(), Address::repeat_byte(1), 0)];
        assert_eq!(find_minted(contract, &logs), None);
    }
}
