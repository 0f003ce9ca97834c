use core::cmp::Ord;

/// A map kept as a sorted vector. Iteration is in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VecMap<K, V> {
    items: Vec<(K, V)>,
}

impl<K, V> VecMap<K, V> {
    pub const fn new() -> Self {
        Self { items: vec![] }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.items.iter().map(|(k, v)| (k, v))
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.iter().map(|(k, _)| k)
    }
}

impl<K: Ord, V> VecMap<K, V> {
    pub fn insert(&mut self, k: K, v: V) {
        match self.items.binary_search_by_key(&&k, |(k2, _)| k2) {
            Ok(index) => self.items[index] = (k, v),
            Err(index) => self.items.insert(index, (k, v)),
        }
    }

    pub fn get(&self, k: &K) -> Option<&V> {
        self.items
            .binary_search_by_key(&k, |(k2, _)| k2)
            .ok()
            .and_then(|i| self.items.get(i))
            .map(|(_, v)| v)
    }

    pub fn get_or_insert_with(&mut self, k: K, f: impl FnOnce() -> V) -> &mut V {
        let index = match self.items.binary_search_by_key(&&k, |(k2, _)| k2) {
            Ok(index) => index,
            Err(index) => {
                self.items.insert(index, (k, f()));
                index
            }
        };
        &mut self.items[index].1
    }

    #[cfg(test)]
    pub fn contains_key(&self, k: &K) -> bool {
        self.get(k).is_some()
    }

    pub fn remove(&mut self, k: &K) -> Option<V> {
        self.items
            .binary_search_by_key(&k, |(k2, _)| k2)
            .ok()
            .map(|index| self.items.remove(index).1)
    }

    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        self.items.retain_mut(|(k, v)| f(k, v));
    }
}

impl<K, V> Default for VecMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for VecMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut items: Vec<(K, V)> = iter.into_iter().collect();
        items.sort_by(|(a, _), (b, _)| a.cmp(b));
        // the last duplicate wins, as with repeated inserts
        items.reverse();
        items.dedup_by(|(a, _), (b, _)| a == b);
        items.reverse();
        Self { items }
    }
}

impl<K: serde::Serialize, V: serde::Serialize> serde::Serialize for VecMap<K, V> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de, K, V> serde::Deserialize<'de> for VecMap<K, V>
where
    K: Ord + serde::Deserialize<'de>,
    V: serde::Deserialize<'de>,
{
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = std::collections::BTreeMap::<K, V>::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sorted_and_unique() {
        let map: VecMap<u8, &str> = [(3, "c"), (1, "a"), (3, "d"), (2, "b")].into_iter().collect();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(map.get(&3), Some(&"d"));
    }

    #[test]
    fn get_or_insert() {
        let mut map = VecMap::new();
        *map.get_or_insert_with(5, || 0) += 1;
        *map.get_or_insert_with(5, || 0) += 1;
        *map.get_or_insert_with(1, || 10) += 1;
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(&1, &11), (&5, &2)]);
        assert_eq!(map.remove(&5), Some(2));
        assert!(!map.contains_key(&5));
    }
}
