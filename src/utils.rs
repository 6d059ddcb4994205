use std::fmt;
use std::iter;
use std::marker::PhantomData;

use serde::de::{Deserialize, MapAccess, Visitor};

/// Collects a serialised map into any `FromIterator<(K, V)>`, inserting
/// entries one at a time in the order they were written.
pub struct MapCollector<T, K, V>(PhantomData<(T, K, V)>);

impl<T, K, V> MapCollector<T, K, V> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<'de, T, K, V> Visitor<'de> for MapCollector<T, K, V>
where
    T: FromIterator<(K, V)>,
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        iter::from_fn(|| access.next_entry().transpose()).collect()
    }
}
