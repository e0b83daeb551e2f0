//! Flattens nested JSON payloads into a case-insensitive attribute store.
//!
//! Task payloads reach the executor wrapped in whatever envelope the
//! orchestration layer chose. Nested objects are flattened into dotted
//! keys (`a.c.d`) so callers can ask for a parameter by name without
//! knowing the shape. Scalars are kept as their raw JSON text; quoting is
//! only undone when a value is read back.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while decoding a payload
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unable to parse input as JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Input must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Attribute '{key}' is nested deeper than {limit} levels")]
    TooDeep { key: String, limit: usize },

    #[error("Input has more than {limit} attributes")]
    TooManyKeys { limit: usize },
}

/// Ceilings applied while flattening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeLimits {
    /// Maximum object nesting, counting the top-level object as 1
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum number of distinct attributes
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
}

fn default_max_depth() -> usize {
    32
}
fn default_max_keys() -> usize {
    4096
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_keys: default_max_keys(),
        }
    }
}

/// Flattened, read-only view of a payload
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    /// Lower-cased dotted key -> raw JSON text of the scalar
    values: HashMap<String, String>,
}

impl AttributeStore {
    /// Decode with the default limits
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        Self::decode_with(raw, DecodeLimits::default())
    }

    /// Decode a JSON object, flattening nested objects breadth-first.
    ///
    /// Objects are walked in the map's key order; when two keys differ
    /// only in case, the one written last wins. JSON strings are never
    /// re-parsed, even when their text is itself JSON.
    pub fn decode_with(raw: &str, limits: DecodeLimits) -> Result<Self, DecodeError> {
        let root = match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            other => return Err(DecodeError::NotAnObject(json_kind(&other))),
        };

        let mut values: HashMap<String, String> = HashMap::new();
        let mut pending: VecDeque<(Option<String>, usize, Map<String, Value>)> = VecDeque::new();
        pending.push_back((None, 1, root));

        while let Some((prefix, depth, object)) = pending.pop_front() {
            for (key, value) in object {
                let path = match &prefix {
                    Some(parent) => format!("{}.{}", parent, key),
                    None => key,
                };

                match value {
                    Value::Object(child) => {
                        if depth + 1 > limits.max_depth {
                            return Err(DecodeError::TooDeep {
                                key: path,
                                limit: limits.max_depth,
                            });
                        }
                        pending.push_back((Some(path), depth + 1, child));
                    }
                    scalar => {
                        let key = path.to_lowercase();
                        if values.len() >= limits.max_keys && !values.contains_key(&key) {
                            return Err(DecodeError::TooManyKeys {
                                limit: limits.max_keys,
                            });
                        }
                        values.insert(key, scalar.to_string());
                    }
                }
            }
        }

        Ok(Self { values })
    }

    /// Look up an attribute by name, ignoring case.
    ///
    /// String values come back without their JSON quoting; other values
    /// come back as their JSON text.
    pub fn get(&self, name: &str) -> Option<String> {
        self.raw(name).map(unquote)
    }

    /// Like [`get`](Self::get) but yields an empty string when absent
    pub fn get_or_default(&self, name: &str) -> String {
        self.get(name).unwrap_or_default()
    }

    /// The stored JSON text, quotes included
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.values.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_lowercase())
    }

    /// Every known key, sorted
    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pretty JSON of the flattened store, sorted by key
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let sorted: BTreeMap<&String, &String> = self.values.iter().collect();
        serde_json::to_string_pretty(&sorted)
    }
}

/// Strip JSON quoting from a stored value
fn unquote(raw: &str) -> String {
    serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.trim_matches('"').to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flattens_nested_objects() {
        let store = AttributeStore::decode(r#"{"a":{"b":"1","c":{"d":"2"}}}"#).unwrap();

        assert_eq!(store.get("a.b").as_deref(), Some("1"));
        assert_eq!(store.get("a.c.d").as_deref(), Some("2"));
        assert_eq!(store.list_keys(), vec!["a.b", "a.c.d"]);
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_top_level_scalar() {
        let store = AttributeStore::decode(r#"{"x":"y"}"#).unwrap();
        assert_eq!(store.get("x").as_deref(), Some("y"));
        assert_eq!(store.raw("x"), Some("\"y\""));
    }

    #[test]
    fn test_non_string_scalars_keep_json_text() {
        let store =
            AttributeStore::decode(r#"{"n": 42, "ok": true, "none": null, "list": ["a", 1]}"#)
                .unwrap();

        assert_eq!(store.get("n").as_deref(), Some("42"));
        assert_eq!(store.get("ok").as_deref(), Some("true"));
        assert_eq!(store.get("none").as_deref(), Some("null"));
        assert_eq!(store.get("list").as_deref(), Some(r#"["a",1]"#));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let store = AttributeStore::decode(r#"{"ReqType":"amicreate","Outer":{"Inner":"v"}}"#)
            .unwrap();

        assert_eq!(store.get("REQTYPE"), store.get("reqtype"));
        assert_eq!(store.get("reqType").as_deref(), Some("amicreate"));
        assert_eq!(store.get("OUTER.inner").as_deref(), Some("v"));
        assert_eq!(store.list_keys(), vec!["outer.inner", "reqtype"]);
    }

    #[test]
    fn test_string_holding_json_is_not_flattened() {
        let store = AttributeStore::decode(r#"{"ReqInput":"{\"a\":\"b\"}"}"#).unwrap();

        assert_eq!(store.get("reqinput").as_deref(), Some(r#"{"a":"b"}"#));
        assert!(!store.contains("reqinput.a"));
    }

    #[test]
    fn test_absent_key_fails_open() {
        let store = AttributeStore::decode(r#"{"x":"y"}"#).unwrap();
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.get_or_default("missing"), "");
    }

    #[test]
    fn test_empty_nested_object_adds_nothing() {
        let store = AttributeStore::decode(r#"{"a":{}}"#).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(matches!(
            AttributeStore::decode("[1,2]"),
            Err(DecodeError::NotAnObject("an array"))
        ));
        assert!(matches!(
            AttributeStore::decode("not json"),
            Err(DecodeError::Parse(_))
        ));
    }

    #[test]
    fn test_depth_ceiling() {
        let limits = DecodeLimits {
            max_depth: 3,
            ..Default::default()
        };

        let ok = r#"{"a":{"b":{"c":"1"}}}"#;
        assert_eq!(
            AttributeStore::decode_with(ok, limits).unwrap().get("a.b.c").as_deref(),
            Some("1")
        );

        let too_deep = r#"{"a":{"b":{"c":{"d":"1"}}}}"#;
        match AttributeStore::decode_with(too_deep, limits) {
            Err(DecodeError::TooDeep { key, limit }) => {
                assert_eq!(key, "a.b.c");
                assert_eq!(limit, 3);
            }
            other => panic!("expected TooDeep, got {:?}", other),
        }
    }

    #[test]
    fn test_key_ceiling() {
        let limits = DecodeLimits {
            max_keys: 2,
            ..Default::default()
        };

        assert!(AttributeStore::decode_with(r#"{"a":"1","b":"2"}"#, limits).is_ok());
        assert!(matches!(
            AttributeStore::decode_with(r#"{"a":"1","b":"2","c":"3"}"#, limits),
            Err(DecodeError::TooManyKeys { limit: 2 })
        ));
    }

    #[test]
    fn test_to_json_is_sorted() {
        let store = AttributeStore::decode(r#"{"b":"2","a":{"z":1}}"#).unwrap();
        let json = store.to_json().unwrap();
        let a = json.find("a.z").unwrap();
        let b = json.find("\"b\"").unwrap();
        assert!(a < b);
    }
}
