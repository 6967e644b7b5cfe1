//! MessagePack row codec.
//!
//! Rows are written with named fields (`rmp_serde::to_vec_named`) so that
//! adding a field to an entity keeps older rows readable.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a row as named-field MessagePack.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn encode_row<T: Serialize>(row: &T) -> anyhow::Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(row)?)
}

/// Decodes a row written by [`encode_row`].
///
/// # Errors
///
/// Returns an error if the bytes are not a valid encoding of `T`.
pub fn decode_row<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}
