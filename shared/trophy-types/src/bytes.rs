//! Canonical encoding of ciphertext handles and input proofs.
//!
//! The relayer returns binary payloads in whichever shape survived its transport: a `0x` hex
//! string, a JSON array of bytes, or an object keyed by stringified indices
//! (`{"0": 18, "1": 255, ...}`). [`RawBytes::parse`] tags the shape, and the typed wrappers
//! apply the length rules and render the lowercase hex passed as a contract call argument.

use std::{collections::BTreeMap, fmt, str::FromStr};

use alloy_primitives::{Bytes, B256};
use serde_json::Value;
use thiserror::Error;

/// Length of a ciphertext handle in bytes.
pub const HANDLE_LEN: usize = 32;

/// A handle or proof representation that cannot be turned into bytes.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("malformed {kind}: {reason}")]
pub struct ShapeMismatch {
    pub kind: &'static str,
    pub reason: String,
}

impl ShapeMismatch {
    fn new(kind: &'static str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Binary payload as received, tagged by representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawBytes {
    /// Hex string, validated on conversion.
    Hex(String),
    /// Ordered byte sequence.
    Sequence(Vec<u8>),
    /// Bytes keyed by their position. Order is reconstructed from the keys.
    Indexed(BTreeMap<usize, u8>),
}

impl RawBytes {
    /// Tag a JSON value by shape. Rejects any value that is not one of the three accepted
    /// representations, including out-of-range byte values and non-numeric keys.
    pub fn parse(value: &Value, kind: &'static str) -> Result<Self, ShapeMismatch> {
        match value {
            Value::String(s) => Ok(Self::Hex(s.clone())),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| byte_at(v, kind, i))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Sequence),
            Value::Object(map) => {
                let mut indexed = BTreeMap::new();
                for (key, v) in map {
                    let index = parse_index(key).ok_or_else(|| {
                        ShapeMismatch::new(kind, format!("key `{key}` is not a decimal index"))
                    })?;
                    indexed.insert(index, byte_at(v, kind, index)?);
                }
                Ok(Self::Indexed(indexed))
            }
            Value::Null => Err(ShapeMismatch::new(kind, "value is null")),
            Value::Bool(_) => Err(ShapeMismatch::new(kind, "value is a boolean")),
            Value::Number(_) => Err(ShapeMismatch::new(kind, "value is a bare number")),
        }
    }

    /// Decode into an ordered byte vector.
    pub fn into_bytes(self, kind: &'static str) -> Result<Vec<u8>, ShapeMismatch> {
        match self {
            Self::Hex(s) => decode_hex(&s, kind),
            Self::Sequence(bytes) => Ok(bytes),
            Self::Indexed(map) => {
                let mut out = Vec::with_capacity(map.len());
                for (expected, (index, byte)) in map.into_iter().enumerate() {
                    if index != expected {
                        return Err(ShapeMismatch::new(
                            kind,
                            format!("indices are not consecutive: missing {expected}"),
                        ));
                    }
                    out.push(byte);
                }
                Ok(out)
            }
        }
    }
}

fn byte_at(value: &Value, kind: &'static str, index: usize) -> Result<u8, ShapeMismatch> {
    value
        .as_u64()
        .and_then(|b| u8::try_from(b).ok())
        .ok_or_else(|| ShapeMismatch::new(kind, format!("value at index {index} is not a byte: {value}")))
}

/// Only the canonical decimal form is accepted (`"7"`, not `"07"` or `"+7"`).
fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse().ok()
}

fn decode_hex(s: &str, kind: &'static str) -> Result<Vec<u8>, ShapeMismatch> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| ShapeMismatch::new(kind, "hex string is missing the 0x prefix"))?;
    if digits.len() % 2 != 0 {
        return Err(ShapeMismatch::new(kind, format!("odd number of hex digits ({})", digits.len())));
    }
    hex::decode(digits).map_err(|e| ShapeMismatch::new(kind, format!("invalid hex: {e}")))
}

/// 32-byte reference to an encrypted value held by the coprocessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CiphertextHandle(B256);

impl CiphertextHandle {
    const KIND: &'static str = "ciphertext handle";

    pub const fn new(bytes: [u8; HANDLE_LEN]) -> Self {
        Self(B256::new(bytes))
    }

    pub fn from_raw(raw: RawBytes) -> Result<Self, ShapeMismatch> {
        let bytes = raw.into_bytes(Self::KIND)?;
        if bytes.len() != HANDLE_LEN {
            return Err(ShapeMismatch::new(
                Self::KIND,
                format!("expected {HANDLE_LEN} bytes, got {}", bytes.len()),
            ));
        }
        Ok(Self(B256::from_slice(&bytes)))
    }

    pub fn to_array(&self) -> [u8; HANDLE_LEN] {
        self.0 .0
    }

    /// `0x` followed by 64 lowercase hex digits.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// The contract returns the zero handle for uninitialised scores.
    pub fn is_zero(&self) -> bool {
        self.0 == B256::ZERO
    }
}

impl TryFrom<&Value> for CiphertextHandle {
    type Error = ShapeMismatch;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_raw(RawBytes::parse(value, Self::KIND)?)
    }
}

impl FromStr for CiphertextHandle {
    type Err = ShapeMismatch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_raw(RawBytes::Hex(s.to_owned()))
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Variable-length attestation accompanying an encrypted input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputProof(Bytes);

impl InputProof {
    const KIND: &'static str = "input proof";

    pub fn from_raw(raw: RawBytes) -> Result<Self, ShapeMismatch> {
        raw.into_bytes(Self::KIND).map(|b| Self(Bytes::from(b)))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl TryFrom<&Value> for InputProof {
    type Error = ShapeMismatch;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_raw(RawBytes::parse(value, Self::KIND)?)
    }
}

impl FromStr for InputProof {
    type Err = ShapeMismatch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_raw(RawBytes::Hex(s.to_owned()))
    }
}

impl fmt::Display for InputProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
