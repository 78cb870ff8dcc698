#![forbid(unsafe_code)]

//! Value codecs: typed value ⇄ stored string.
//!
//! A [`Codec`] is a pure encode/decode pair. [`JsonCodec`] is the default,
//! backed by serde_json; [`FnCodec`] wraps a pair of closures for
//! per-binding overrides (fixed-format strings, compression, encryption,
//! anything that round-trips).
//!
//! Absence is not a codec concern: a binding represents "no value" as
//! `Option::None` and an absent storage entry, so codecs only ever see a
//! concrete `&T` or a stored string.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Binding behavior |
//! |---------|-------|------------------|
//! | [`CodecError::Decode`] | Corrupt or foreign stored text | Keep cached value, log |
//! | [`CodecError::Encode`] | Value the codec cannot serialize | Abort write, log |
//! | Decode-test failure on write | Asymmetric custom codec | Abort write, log |
//!
//! Round-trip fidelity (`decode(encode(v)) == v`) is an obligation on
//! custom codecs, not something this crate can enforce statically; the
//! binding's decode-test on every write catches violations early.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error raised by a codec operation.
#[derive(Clone, Debug)]
pub enum CodecError {
    /// The value could not be serialized to a stored string.
    Encode {
        /// Human-readable failure detail.
        detail: String,
    },
    /// The stored string could not be parsed back into a value.
    Decode {
        /// Human-readable failure detail.
        detail: String,
    },
}

impl CodecError {
    /// Build an encode error from any displayable cause.
    pub fn encode(cause: impl std::fmt::Display) -> Self {
        Self::Encode {
            detail: cause.to_string(),
        }
    }

    /// Build a decode error from any displayable cause.
    pub fn decode(cause: impl std::fmt::Display) -> Self {
        Self::Decode {
            detail: cause.to_string(),
        }
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode { detail } => write!(f, "encode failed: {detail}"),
            Self::Decode { detail } => write!(f, "decode failed: {detail}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Converts a typed value to and from its stored string form.
///
/// Both directions must be pure: no I/O, no shared state.
pub trait Codec<T> {
    /// Serialize `value` to the string stored in the area.
    fn encode(&self, value: &T) -> Result<String, CodecError>;

    /// Parse a stored string back into a value.
    fn decode(&self, raw: &str) -> Result<T, CodecError>;
}

/// The default codec: serde_json text.
///
/// Zero-sized; `JsonCodec::default()` is the usual way to get one.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    /// Create the JSON codec.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec<T> {
    fn encode(&self, value: &T) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(CodecError::encode)
    }

    fn decode(&self, raw: &str) -> Result<T, CodecError> {
        serde_json::from_str(raw).map_err(CodecError::decode)
    }
}

/// A codec built from a pair of closures.
///
/// ```
/// use tabstore::codec::{Codec, CodecError, FnCodec};
///
/// let codec = FnCodec::new(
///     |v: &u32| Ok::<_, CodecError>(v.to_string()),
///     |raw: &str| raw.parse::<u32>().map_err(CodecError::decode),
/// );
/// assert_eq!(codec.encode(&7).unwrap(), "7");
/// assert_eq!(codec.decode("7").unwrap(), 7);
/// ```
pub struct FnCodec<E, D> {
    encode: E,
    decode: D,
}

impl<E, D> FnCodec<E, D> {
    /// Pair two closures into a codec.
    pub fn new(encode: E, decode: D) -> Self {
        Self { encode, decode }
    }
}

impl<T, E, D> Codec<T> for FnCodec<E, D>
where
    E: Fn(&T) -> Result<String, CodecError>,
    D: Fn(&str) -> Result<T, CodecError>,
{
    fn encode(&self, value: &T) -> Result<String, CodecError> {
        (self.encode)(value)
    }

    fn decode(&self, raw: &str) -> Result<T, CodecError> {
        (self.decode)(raw)
    }
}

impl<E, D> std::fmt::Debug for FnCodec<E, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnCodec")
    }
}
