mod binary;
mod run;

pub use binary::*;
pub use run::*;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;

/// Reads a JSON value from a reader.
///
/// # Errors
/// - If the reader fails or the document does not describe the value.
pub fn deserialize<T: DeserializeOwned>(input: &mut impl Read) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(input)?)
}

/// Reads a JSON value from standard input.
///
/// # Errors
/// - If standard input fails or the document does not describe the value.
pub fn from_stdin<T: DeserializeOwned>() -> anyhow::Result<T> {
    deserialize(&mut std::io::stdin().lock())
}

/// Serialises a value to a pretty-printed JSON string.
///
/// # Errors
/// - If the value cannot be serialised.
pub fn to_string<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
