//! Tolerant decoding of stored documents. A value that cannot be decoded is
//! treated as "no prior state" instead of failing startup.

use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub fn decode_or_default<T>(key: &str, raw: Option<String>) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = raw else {
        return T::default();
    };

    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!("Discarding malformed '{key}' document: {err}");
        T::default()
    })
}

/// Decode a JSON array element by element, dropping the entries that do not
/// match `T` so one bad record does not take the rest of the list with it.
pub fn decode_list<T>(key: &str, raw: Option<String>) -> Vec<T>
where
    T: DeserializeOwned,
{
    let items: Vec<Value> = decode_or_default(key, raw);
    let total = items.len();

    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if decoded.len() != total {
        warn!(
            "Dropped {} malformed entries from '{key}'",
            total - decoded.len()
        );
    }

    decoded
}
