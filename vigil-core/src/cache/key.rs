use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::{Debug, Write};

/// Derive a stable cache key for an operation invocation.
///
/// Hashes the operation name, the positional arguments and the keyword
/// arguments sorted by name. Object keys inside the arguments are sorted
/// too, so maps with string keys give the same key whatever their
/// iteration order.
///
/// Arguments that cannot be represented as JSON (maps with non-string keys,
/// for one) fall back to their `Debug` rendering. That rendering follows
/// iteration order, so such arguments must use ordered containers like
/// `BTreeMap`; a `HashMap` there can yield a different key per instance.
pub fn derive_key<A>(operation: &str, args: &A, kwargs: &[(&str, serde_json::Value)]) -> String
where
    A: Serialize + Debug + ?Sized,
{
    let mut sorted: Vec<(&str, &serde_json::Value)> =
        kwargs.iter().map(|(name, value)| (*name, value)).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let canonical = serde_json::to_value(args).and_then(|args| {
        serde_json::to_string(&serde_json::json!({
            "op": operation,
            "args": sort_objects(args),
            "kwargs": &sorted,
        }))
    });

    match canonical {
        Ok(document) => hex_digest(document.as_bytes()),
        Err(_) => hex_digest(format!("{}:{:?}:{:?}", operation, args, sorted).as_bytes()),
    }
}

fn sort_objects(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_objects(v)))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_objects).collect())
        }
        other => other,
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_key_is_stable() {
        let a = derive_key("summarize", &("main.rs", 3), &[]);
        let b = derive_key("summarize", &("main.rs", 3), &[]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_key_depends_on_operation_and_args() {
        let base = derive_key("summarize", &["main.rs"], &[]);
        assert_ne!(base, derive_key("explain", &["main.rs"], &[]));
        assert_ne!(base, derive_key("summarize", &["lib.rs"], &[]));
    }

    #[test]
    fn test_kwargs_order_does_not_matter() {
        let a = derive_key(
            "search",
            &["query"],
            &[("limit", json!(10)), ("fuzzy", json!(true))],
        );
        let b = derive_key(
            "search",
            &["query"],
            &[("fuzzy", json!(true)), ("limit", json!(10))],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_unserializable_args_fall_back() {
        // JSON object keys must be strings, so tuple keys fail to serialize
        let mut args: HashMap<(u8, u8), u8> = HashMap::new();
        args.insert((1, 2), 3);

        let a = derive_key("grid", &args, &[]);
        let b = derive_key("grid", &args, &[]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_string_keyed_maps_ignore_insertion_order() {
        let names: Vec<String> = (0..32).map(|i| format!("file_{i}.rs")).collect();

        let mut forward: HashMap<String, usize> = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            forward.insert(name.clone(), i);
        }
        let mut backward: HashMap<String, usize> = HashMap::with_capacity(256);
        for (i, name) in names.iter().enumerate().rev() {
            backward.insert(name.clone(), i);
        }

        assert_eq!(
            derive_key("index", &forward, &[]),
            derive_key("index", &backward, &[])
        );
    }

    #[test]
    fn test_ordered_fallback_is_stable_across_instances() {
        let pairs: Vec<((u8, u8), u8)> = (0..16).map(|i| ((i, i * 2), i)).collect();

        let forward: BTreeMap<(u8, u8), u8> = pairs.iter().copied().collect();
        let backward: BTreeMap<(u8, u8), u8> = pairs.iter().rev().copied().collect();

        let a = derive_key("grid", &forward, &[]);
        assert_eq!(a, derive_key("grid", &backward, &[]));
        assert_ne!(a, derive_key("grid", &BTreeMap::<(u8, u8), u8>::new(), &[]));
    }
}
