//! Conversion between the external representations of scalar block fields
//! (`0x`-prefixed hex strings and native JSON integers) and their canonical
//! big-endian byte strings.
//!
//! Every field is encoded under a [`ScalarKind`] policy:
//! - [`ScalarKind::Integer`] values are stripped of leading zero bytes, so `0`
//!   becomes the empty byte string.
//! - [`ScalarKind::Bytes`] values are taken verbatim from the hex payload.
//! - [`ScalarKind::Bloom`] values are left-padded to exactly
//!   [`BLOOM_BYTE_LEN`] bytes.

use std::fmt::{self, Display};

use block_rlp_common::BLOOM_BYTE_LEN;
use bytes::Bytes;
use ethereum_types::U256;
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error raised when a scalar cannot be normalized into canonical bytes.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
#[error("Could not encode field `{field}` (value: {value}): {reason}")]
pub struct EncodingError {
    /// Name of the field being encoded.
    pub field: String,

    /// The raw value as it appeared in the input.
    pub value: String,

    /// Why the value was rejected.
    pub reason: String,
}

/// Logs the offending field and value, then builds the error for it.
pub(crate) fn reject(field: &str, value: impl Display, reason: impl Into<String>) -> EncodingError {
    let err = EncodingError {
        field: field.to_owned(),
        value: value.to_string(),
        reason: reason.into(),
    };
    error!(
        "Failed to encode field `{}` with value {}: {}",
        err.field, err.value, err.reason
    );

    err
}

/// An error raised when canonical integer bytes cannot be read back.
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
pub enum IntDecodeError {
    /// Canonical integers never start with a zero byte.
    #[error("integer has a leading zero byte")]
    LeadingZero,

    /// The value is wider than the integer type it is decoded into.
    #[error("integer is {0} bytes wide, which overflows the target type")]
    Overflow(usize),
}

/// A scalar as it appears in block JSON.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// A native JSON integer.
    ///
    /// Only integers up to `u64::MAX` are read natively: wider JSON numbers
    /// lose precision in the parser and are rejected with an
    /// [`EncodingError`]. Larger values must be given as hex strings, which
    /// are accepted up to 256 bits.
    Int(u64),

    /// A `0x`-prefixed hex string.
    Hex(String),

    /// JSON `null`.
    #[default]
    Null,

    /// Anything else. Kept so that the codec, not the JSON parser, reports
    /// the offending field.
    Other(serde_json::Value),
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(n) => write!(f, "{}", n),
            ScalarValue::Hex(s) => write!(f, "\"{}\"", s),
            ScalarValue::Null => write!(f, "null"),
            ScalarValue::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<u64> for ScalarValue {
    fn from(v: u64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::Hex(v.to_owned())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::Hex(v)
    }
}

/// Encoding policy applied to a field.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ScalarKind {
    /// A number, encoded as minimal big-endian bytes.
    Integer,

    /// An opaque byte string, encoded as-is.
    Bytes,

    /// A 256 byte logs bloom.
    Bloom,
}

impl ScalarKind {
    /// Picks the policy for a header field by its JSON name.
    ///
    /// Names shared between headers and transactions resolve to the header
    /// meaning (a header `nonce` is 8 opaque bytes). Transaction fields are
    /// encoded through [`encode_scalar_as`] with an explicit kind instead.
    pub fn of_field(field: &str) -> Self {
        match field {
            "logsBloom" | "bloom" => Self::Bloom,
            "difficulty" | "number" | "gasLimit" | "gasUsed" | "timestamp" | "time"
            | "baseFeePerGas" | "blobGasUsed" | "excessBlobGas" | "gasPrice" | "gas" | "value"
            | "v" | "r" | "s" => Self::Integer,
            _ => Self::Bytes,
        }
    }
}

/// Encodes a scalar into canonical bytes, using the policy registered for
/// `field`.
///
/// | Input | Output |
/// |---|---|
/// | `null` or `""` | empty |
/// | hex, `logsBloom` | 256 bytes, left-zero-padded |
/// | hex, integer field | minimal big-endian bytes |
/// | hex, other field | raw payload bytes |
/// | integer | minimal big-endian bytes (`0` is empty) |
/// | anything else | [`EncodingError`] |
pub fn encode_scalar(value: &ScalarValue, field: &str) -> Result<Bytes, EncodingError> {
    encode_scalar_as(value, field, ScalarKind::of_field(field))
}

/// Same as [`encode_scalar`], but with an explicit policy.
pub fn encode_scalar_as(
    value: &ScalarValue,
    field: &str,
    kind: ScalarKind,
) -> Result<Bytes, EncodingError> {
    match value {
        ScalarValue::Null => Ok(Bytes::new()),
        ScalarValue::Hex(s) if s.is_empty() => Ok(Bytes::new()),
        ScalarValue::Hex(s) => {
            let raw = decode_hex(s).map_err(|reason| reject(field, value, reason))?;

            match kind {
                ScalarKind::Bytes => Ok(raw.into()),
                ScalarKind::Bloom => pad_left(&raw, BLOOM_BYTE_LEN).ok_or_else(|| {
                    reject(
                        field,
                        value,
                        format!(
                            "bloom is {} bytes, expected at most {}",
                            raw.len(),
                            BLOOM_BYTE_LEN
                        ),
                    )
                }),
                ScalarKind::Integer => {
                    let trimmed = trim_leading_zeros(&raw);
                    match trimmed.len() > 32 {
                        false => Ok(Bytes::copy_from_slice(trimmed)),
                        true => Err(reject(field, value, "integer does not fit in 256 bits")),
                    }
                }
            }
        }
        ScalarValue::Int(n) => Ok(u64_to_bytes(*n)),
        ScalarValue::Other(serde_json::Value::Number(n)) if is_wide_integer(n) => Err(reject(
            field,
            value,
            "native integers are limited to 64 bits, use a hex string",
        )),
        ScalarValue::Other(_) => Err(reject(field, value, "unsupported scalar type")),
    }
}

/// Integers past `u64::MAX` are parsed into whole, non-negative floats.
fn is_wide_integer(n: &serde_json::Number) -> bool {
    n.as_f64()
        .is_some_and(|f| n.is_f64() && f.fract() == 0.0 && f >= u64::MAX as f64)
}

/// Strips every `0x` prefix and left-pads odd-length payloads with a zero
/// nibble. Upstream data occasionally carries `0x0x...` or `0x123`.
pub fn normalize_hex(s: &str) -> Result<String, &'static str> {
    let mut payload = s
        .strip_prefix("0x")
        .ok_or("expected a 0x-prefixed hex string")?;
    while let Some(rest) = payload.strip_prefix("0x") {
        payload = rest;
    }

    Ok(match payload.len() % 2 {
        0 => payload.to_owned(),
        _ => format!("0{}", payload),
    })
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let payload = normalize_hex(s)?;
    hex::decode(payload).map_err(|e| e.to_string())
}

fn pad_left(bytes: &[u8], width: usize) -> Option<Bytes> {
    let padding = width.checked_sub(bytes.len())?;
    let mut buf = vec![0; padding];
    buf.extend_from_slice(bytes);

    Some(buf.into())
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Minimal big-endian bytes of `v`. `0` maps to the empty byte string.
pub fn u64_to_bytes(v: u64) -> Bytes {
    let leading_empty_bytes = v.leading_zeros() as usize / 8;
    Bytes::copy_from_slice(&v.to_be_bytes()[leading_empty_bytes..])
}

/// Minimal big-endian bytes of `v`. `0` maps to the empty byte string.
pub fn u256_to_bytes(v: U256) -> Bytes {
    let mut buf = [0; 32];
    let leading_empty_bytes = v.leading_zeros() as usize / 8;
    v.to_big_endian(&mut buf);

    Bytes::copy_from_slice(&buf[leading_empty_bytes..])
}

/// Reads back the output of [`u64_to_bytes`], rejecting non-canonical input.
pub fn bytes_to_u64(bytes: &[u8]) -> Result<u64, IntDecodeError> {
    check_canonical_int(bytes, 8)?;
    Ok(bytes.iter().fold(0, |acc, b| (acc << 8) | *b as u64))
}

/// Reads back the output of [`u256_to_bytes`], rejecting non-canonical input.
pub fn bytes_to_u256(bytes: &[u8]) -> Result<U256, IntDecodeError> {
    check_canonical_int(bytes, 32)?;
    Ok(U256::from_big_endian(bytes))
}

fn check_canonical_int(bytes: &[u8], max_width: usize) -> Result<(), IntDecodeError> {
    match bytes {
        [0, ..] => Err(IntDecodeError::LeadingZero),
        _ if bytes.len() > max_width => Err(IntDecodeError::Overflow(bytes.len())),
        _ => Ok(()),
    }
}

/// `0x` followed by the lowercase hex of `bytes`.
pub fn to_hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// JSON-RPC quantity formatting (`0x0`, `0x1a`) of minimal big-endian bytes.
pub fn to_hex_quantity(bytes: &[u8]) -> String {
    let digits = hex::encode(bytes);
    match digits.trim_start_matches('0') {
        "" => "0x0".to_owned(),
        trimmed => format!("0x{}", trimmed),
    }
}

/// Encodes an integer field and reads it back as a `u64`.
pub fn scalar_to_u64(value: &ScalarValue, field: &str) -> Result<u64, EncodingError> {
    let bytes = encode_scalar_as(value, field, ScalarKind::Integer)?;
    bytes_to_u64(&bytes).map_err(|e| reject(field, value, e.to_string()))
}

/// Encodes an integer field and reads it back as a [`U256`].
pub fn scalar_to_u256(value: &ScalarValue, field: &str) -> Result<U256, EncodingError> {
    let bytes = encode_scalar_as(value, field, ScalarKind::Integer)?;
    bytes_to_u256(&bytes).map_err(|e| reject(field, value, e.to_string()))
}

/// Encodes a fixed-width value that is not part of the block encoding, such
/// as a stored block hash. The value must be exactly `N` bytes wide.
pub fn scalar_to_fixed<const N: usize>(
    value: &ScalarValue,
    field: &str,
    kind: ScalarKind,
) -> Result<[u8; N], EncodingError> {
    let bytes = encode_scalar_as(value, field, kind)?;
    bytes[..].try_into().map_err(|_| {
        reject(
            field,
            value,
            format!("value is {} bytes, expected {}", bytes.len(), N),
        )
    })
}
