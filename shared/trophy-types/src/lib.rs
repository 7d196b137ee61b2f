//! Shared types for encrypted inputs and the mint gas policy.

pub mod bytes;
pub mod gas;

pub use bytes::{CiphertextHandle, InputProof, RawBytes, ShapeMismatch, HANDLE_LEN};
pub use gas::{gas_limit_for, GasLimitExceeded, GAS_LIMIT_CAP};
