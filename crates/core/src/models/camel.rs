//! Key normalization: snake_case JSON keys to camelCase.
//!
//! Lake objects are stored with snake_case field names; everything
//! downstream of the fetch path expects camelCase. The transform is
//! applied while the document is being parsed - [`CamelCased`] is a
//! `Deserialize` implementation whose map visitor renames each key as it
//! is visited, so a document is read exactly once with no second walk
//! over the finished tree.
//!
//! Arrays and primitive values pass through unchanged. Keys without
//! underscores pass through verbatim. The transform is total: it is
//! defined for every JSON document and cannot fail beyond ordinary parse
//! errors.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};

/// Convert one snake_case key to camelCase.
///
/// Each `_` followed by another character is dropped and that character
/// uppercased; a trailing `_` is kept. Keys without underscores are
/// returned as-is.
pub fn to_camel_case(key: &str) -> String {
    if !key.contains('_') {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars();
    while let Some(c) = chars.next() {
        if c == '_' {
            match chars.next() {
                Some(next) => out.extend(next.to_uppercase()),
                None => out.push('_'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// A JSON value whose object keys were camelCased during deserialization.
#[derive(Debug, Clone, PartialEq)]
pub struct CamelCased(pub Value);

impl<'de> Deserialize<'de> for CamelCased {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(CamelVisitor).map(CamelCased)
    }
}

struct CamelVisitor;

impl<'de> Visitor<'de> for CamelVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(v))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Number::from_f64(v).map_or(Value::Null, Value::Number))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::String(v))
    }

    fn visit_unit<E>(self) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        CamelCased::deserialize(deserializer).map(|camel| camel.0)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(CamelCased(value)) = seq.next_element()? {
            values.push(value);
        }
        Ok(Value::Array(values))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut object = Map::new();
        while let Some((key, CamelCased(value))) = map.next_entry::<String, CamelCased>()? {
            object.insert(to_camel_case(&key), value);
        }
        Ok(Value::Object(object))
    }
}

/// Parse a JSON document from bytes, normalizing keys in the same pass.
pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Value> {
    serde_json::from_slice::<CamelCased>(bytes).map(|camel| camel.0)
}

/// Parse a JSON document from a string, normalizing keys in the same pass.
pub fn from_str(raw: &str) -> serde_json::Result<Value> {
    serde_json::from_str::<CamelCased>(raw).map(|camel| camel.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// No key at any depth may still contain an underscore-separated word.
    fn assert_no_snake_keys(value: &Value) {
        match value {
            Value::Object(map) => {
                for (key, nested) in map {
                    let has_snake_pair = key
                        .as_bytes()
                        .windows(2)
                        .any(|w| w[0] == b'_' && w[1].is_ascii_alphanumeric());
                    assert!(!has_snake_pair, "key {key:?} still snake_case");
                    assert_no_snake_keys(nested);
                }
            }
            Value::Array(items) => items.iter().for_each(assert_no_snake_keys),
            _ => {}
        }
    }

    #[test]
    fn converts_simple_keys() {
        assert_eq!(to_camel_case("block_height"), "blockHeight");
        assert_eq!(to_camel_case("receipt_execution_outcomes"), "receiptExecutionOutcomes");
        assert_eq!(to_camel_case("shard_id"), "shardId");
    }

    #[test]
    fn keys_without_underscores_pass_verbatim() {
        assert_eq!(to_camel_case("height"), "height");
        assert_eq!(to_camel_case("alreadyCamel"), "alreadyCamel");
    }

    #[test]
    fn trailing_underscore_is_kept() {
        assert_eq!(to_camel_case("odd_"), "odd_");
    }

    #[test]
    fn normalizes_nested_documents_in_one_parse() {
        let raw = r#"{
            "block_header": {
                "prev_hash": "abc",
                "chunk_mask": [true, false],
                "validator_proposals": [{"account_id": "a.near", "stake": "1"}]
            },
            "shard_id": 3,
            "plain": 1
        }"#;
        let value = from_str(raw).unwrap();
        assert_no_snake_keys(&value);
        // Les valeurs ne sont jamais modifiées, seules les clés le sont
        assert_eq!(value["blockHeader"]["prevHash"], json!("abc"));
        assert_eq!(value["blockHeader"]["chunkMask"], json!([true, false]));
        assert_eq!(
            value["blockHeader"]["validatorProposals"][0]["accountId"],
            json!("a.near")
        );
        assert_eq!(value["shardId"], json!(3));
        assert_eq!(value["plain"], json!(1));
    }

    #[test]
    fn arrays_and_primitives_pass_through() {
        let value = from_str(r#"[1, "two_words", null, 4.5]"#).unwrap();
        // Une chaîne n'est pas une clé: elle reste intacte
        assert_eq!(value, json!([1, "two_words", null, 4.5]));
    }

    #[test]
    fn values_containing_underscores_are_untouched() {
        let value = from_str(r#"{"function_name": "social_feed"}"#).unwrap();
        assert_eq!(value, json!({"functionName": "social_feed"}));
    }
}
