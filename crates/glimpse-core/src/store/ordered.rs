//! JSON objects that keep their key order.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

/// A JSON object read back as `(key, value)` pairs in file order.
#[derive(Debug)]
pub(crate) struct OrderedMap<V>(pub Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object keyed by catalog id")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    pairs.push((key, value));
                }
                Ok(OrderedMap(pairs))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Serialize `(key, value)` pairs as a JSON object in iteration order.
pub(crate) fn to_json_object<'a, V, I>(pairs: I) -> Result<Vec<u8>>
where
    V: Serialize + 'a,
    I: IntoIterator<Item = (&'a str, V)>,
{
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::new(&mut buf);
    ser.collect_map(pairs)?;
    Ok(buf)
}

/// Fold `incoming` into `existing`: known keys are overwritten in place,
/// new keys are appended. Duplicate keys within either side collapse to
/// the last value.
pub(crate) fn merge_by_key<V>(
    existing: Vec<(String, V)>,
    incoming: impl IntoIterator<Item = (String, V)>,
) -> Vec<(String, V)> {
    let mut merged: Vec<(String, V)> = Vec::with_capacity(existing.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (key, value) in existing.into_iter().chain(incoming) {
        if let Some(&pos) = positions.get(&key) {
            merged[pos].1 = value;
        } else {
            positions.insert(key.clone(), merged.len());
            merged.push((key, value));
        }
    }

    merged
}
