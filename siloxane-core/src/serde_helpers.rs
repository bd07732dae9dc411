//! Serde helpers for siloxane-specific encodings.
//!
//! These modules provide custom serialization for types that need
//! non-default CBOR representations.

/// Serialize an `IndexMap<K, V>` as a sequence of `[key, value]` pairs.
///
/// CBOR allows arbitrary map keys, but serde's derived `Key` enum is not a
/// valid key in every self-describing format. Pairs keep entry order too.
pub mod map_as_pairs {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::hash::Hash;

    pub fn serialize<K, V, S>(map: &IndexMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<IndexMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Eq + Hash,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs: Vec<(K, V)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
