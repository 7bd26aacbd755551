//! Provider amounts arrive as JSON numbers, numeric strings, or not at all.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

pub(crate) fn parse(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .ok()
        .or_else(|| Decimal::from_scientific(raw).ok())
}

/// `Option<Decimal>` from a number, a numeric string, `null`, or `""`.
pub(crate) fn flexible<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Option::<RawAmount>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(RawAmount::Number(n)) => n.to_string(),
        Some(RawAmount::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(RawAmount::Text(s)) => s,
    };
    parse(&text)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid amount '{text}'")))
}

/// Provider ids are sometimes numbers, sometimes strings.
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            return Err(de::Error::custom(format!("unexpected id value {other}")));
        }
    })
}
