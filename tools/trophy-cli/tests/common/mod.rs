//! In-memory stand-ins for the trophy contract and the relayer bridge.

#![allow(dead_code)]

use std::{collections::HashMap, str::FromStr, sync::Mutex};

use async_trait::async_trait;
use ethers::{
    contract::EthEvent,
    signers::{LocalWallet, Signer},
    types::{Address, Log, H256, U256, U64},
    utils::keccak256,
};
use serde_json::{json, Map, Value};
use trophy_cli::{
    contract::TransferFilter, FheService, MintReceipt, MintRequest, RawEncryptedInput, Result,
    TrophyContext, TrophyContract, TrophyError,
};
use trophy_types::CiphertextHandle;

// Anvil dev accounts.
pub const DEPLOYER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const ALICE_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub const TOKEN_URI: &str = "ipfs://QmTestMetadata/trophy.json";

pub fn wallet(key: &str) -> LocalWallet {
    LocalWallet::from_str(key).unwrap().with_chain_id(31337u64)
}

struct Token {
    owner: Address,
    uri: String,
    handle: CiphertextHandle,
}

#[derive(Default)]
struct TrophyState {
    tokens: Vec<Token>,
    pending: HashMap<H256, MintReceipt>,
    estimate: u64,
    /// When set, `estimate_mint` fails as the node would: `(message, revert data)`.
    estimate_failure: Option<(String, Option<String>)>,
    estimates: usize,
    gas_limits: Vec<U256>,
}

/// Mirrors the contract's observable behaviour: sequential token ids from 0, owner-only
/// access to the encrypted score, `Not owner` revert otherwise.
pub struct MockTrophy {
    address: Address,
    /// `msg.sender` of submitted transactions.
    sender: Address,
    state: Mutex<TrophyState>,
}

impl MockTrophy {
    pub fn new(sender: Address, estimate: u64) -> Self {
        Self {
            address: Address::repeat_byte(0xc0),
            sender,
            state: Mutex::new(TrophyState {
                estimate,
                ..Default::default()
            }),
        }
    }

    pub fn fail_estimate(&self, message: &str, data: Option<&str>) {
        self.state.lock().unwrap().estimate_failure =
            Some((message.to_string(), data.map(str::to_string)));
    }

    pub fn estimates(&self) -> usize {
        self.state.lock().unwrap().estimates
    }

    pub fn gas_limits(&self) -> Vec<U256> {
        self.state.lock().unwrap().gas_limits.clone()
    }

    fn token<T>(&self, token_id: U256, f: impl FnOnce(&Token) -> T) -> Result<T> {
        let state = self.state.lock().unwrap();
        if token_id >= U256::from(state.tokens.len()) {
            return Err(TrophyError::from_revert(
                format!("ERC721NonexistentToken({token_id})"),
                None,
            ));
        }
        Ok(f(&state.tokens[token_id.as_usize()]))
    }
}

fn topic(addr: Address) -> H256 {
    H256::from(addr)
}

fn transfer_log(contract: Address, from: Address, to: Address, token_id: U256) -> Log {
    let mut id = [0u8; 32];
    token_id.to_big_endian(&mut id);
    Log {
        address: contract,
        topics: vec![TransferFilter::signature(), topic(from), topic(to), H256::from(id)],
        ..Default::default()
    }
}

#[async_trait]
impl TrophyContract for MockTrophy {
    fn address(&self) -> Address {
        self.address
    }

    async fn estimate_mint(&self, _req: &MintRequest) -> Result<U256> {
        let mut state = self.state.lock().unwrap();
        state.estimates += 1;
        if let Some((message, data)) = state.estimate_failure.clone() {
            return Err(TrophyError::GasEstimation { message, data });
        }
        Ok(U256::from(state.estimate))
    }

    async fn send_mint(&self, req: &MintRequest, gas_limit: U256) -> Result<H256> {
        let mut state = self.state.lock().unwrap();
        if req.proof.is_empty() {
            return Err(TrophyError::from_revert("InvalidInputProof".into(), None));
        }
        state.gas_limits.push(gas_limit);

        let token_id = U256::from(state.tokens.len());
        state.tokens.push(Token {
            owner: req.to,
            uri: req.uri.clone(),
            handle: req.handle,
        });

        let mut seed = self.sender.as_bytes().to_vec();
        seed.extend_from_slice(&(state.tokens.len() as u64).to_be_bytes());
        let tx_hash = H256::from(keccak256(seed));
        let receipt = MintReceipt {
            tx_hash,
            block_number: Some(U64::from(100 + state.tokens.len() as u64)),
            gas_used: Some(gas_limit * U256::from(2) / U256::from(3)),
            logs: vec![transfer_log(self.address, Address::zero(), req.to, token_id)],
        };
        state.pending.insert(tx_hash, receipt);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<MintReceipt> {
        self.state
            .lock()
            .unwrap()
            .pending
            .remove(&tx_hash)
            .ok_or_else(|| TrophyError::transaction(format!("unknown transaction {tx_hash:?}")))
    }

    async fn balance_of(&self, owner: Address) -> Result<U256> {
        let state = self.state.lock().unwrap();
        Ok(U256::from(state.tokens.iter().filter(|t| t.owner == owner).count()))
    }

    async fn owner_of(&self, token_id: U256) -> Result<Address> {
        self.token(token_id, |t| t.owner)
    }

    async fn token_uri(&self, token_id: U256) -> Result<String> {
        self.token(token_id, |t| t.uri.clone())
    }

    async fn encrypted_score(&self, token_id: U256, caller: Address) -> Result<CiphertextHandle> {
        let (owner, handle) = self.token(token_id, |t| (t.owner, t.handle))?;
        if owner != caller {
            return Err(TrophyError::from_revert("Not owner".into(), None));
        }
        Ok(handle)
    }
}

/// How the fake relayer serialises handles and proofs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Hex,
    Sequence,
    Indexed,
    /// A 31-byte handle.
    Truncated,
}

fn render(bytes: &[u8], shape: Shape) -> Value {
    match shape {
        Shape::Hex => json!(format!("0x{}", hex::encode(bytes))),
        Shape::Sequence => json!(bytes),
        Shape::Indexed => Value::Object(
            bytes
                .iter()
                .enumerate()
                .map(|(i, b)| (i.to_string(), json!(b)))
                .collect::<Map<String, Value>>(),
        ),
        Shape::Truncated => json!(&bytes[..bytes.len() - 1]),
    }
}

#[derive(Default)]
struct FheState {
    plaintexts: HashMap<CiphertextHandle, u64>,
    encrypt_calls: Vec<(Address, Address, u32)>,
}

pub struct MockFhe {
    shape: Shape,
    state: Mutex<FheState>,
}

impl MockFhe {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            state: Mutex::new(FheState::default()),
        }
    }

    /// `(contract, user, value)` of every encryption request.
    pub fn encrypt_calls(&self) -> Vec<(Address, Address, u32)> {
        self.state.lock().unwrap().encrypt_calls.clone()
    }
}

#[async_trait]
impl FheService for MockFhe {
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        value: u32,
    ) -> Result<RawEncryptedInput> {
        let mut state = self.state.lock().unwrap();
        state.encrypt_calls.push((contract, user, value));

        let mut seed = Vec::new();
        seed.extend_from_slice(contract.as_bytes());
        seed.extend_from_slice(user.as_bytes());
        seed.extend_from_slice(&value.to_be_bytes());
        seed.extend_from_slice(&(state.encrypt_calls.len() as u64).to_be_bytes());
        let handle = keccak256(&seed);
        state
            .plaintexts
            .insert(CiphertextHandle::new(handle), u64::from(value));

        let proof: Vec<u8> = keccak256(handle).iter().chain(handle.iter()).copied().collect();
        let proof_shape = if self.shape == Shape::Truncated {
            Shape::Sequence
        } else {
            self.shape
        };
        Ok(RawEncryptedInput {
            handles: vec![render(&handle, self.shape)],
            input_proof: render(&proof, proof_shape),
        })
    }

    async fn user_decrypt(
        &self,
        handle: &CiphertextHandle,
        _contract: Address,
        _owner: &LocalWallet,
    ) -> Result<u64> {
        self.state
            .lock()
            .unwrap()
            .plaintexts
            .get(handle)
            .copied()
            .ok_or_else(|| TrophyError::transaction(format!("unknown handle {handle}")))
    }
}

pub fn context(
    signer: Option<&LocalWallet>,
    estimate: u64,
    shape: Shape,
) -> TrophyContext<MockTrophy, MockFhe> {
    let sender = signer.map(|w| w.address()).unwrap_or_default();
    TrophyContext {
        contract: MockTrophy::new(sender, estimate),
        fhe: MockFhe::new(shape),
        signer: signer.map(|w| w.address()),
        token_uri: TOKEN_URI.to_string(),
        explorer_url: "https://explorer.invalid".to_string(),
    }
}
