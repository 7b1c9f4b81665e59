use super::object::{Obj, StrRef};

const MIN_CAPACITY: usize = 256;
const MAX_LOAD: f64 = 0.75;

/// 32-bit FNV-1a.
pub fn hash_string(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

#[derive(Debug, Clone)]
enum Bucket<V> {
    Empty,
    /// A removed entry. Probing walks past it; inserts may reuse it.
    Tombstone,
    Live { key: StrRef, value: V },
}

/// Open-addressing hash map keyed by string handle identity.
///
/// `count` includes tombstones, so a table that churns keys still grows
/// before its collision chains fill up.
#[derive(Debug, Clone)]
pub struct Table<V> {
    buckets: Vec<Bucket<V>>,
    count: usize,
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Table { buckets: Vec::new(), count: 0 }
    }
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Live entries only.
    pub fn len(&self) -> usize {
        self.buckets.iter().filter(|b| matches!(b, Bucket::Live { .. })).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket where `key` lives, or where it should be inserted.
    /// Must only be called on a table with capacity.
    fn find_entry(buckets: &[Bucket<V>], key: StrRef) -> usize {
        let capacity = buckets.len();
        let mut index = key.hash as usize % capacity;
        let mut tombstone = None;
        loop {
            match &buckets[index] {
                Bucket::Empty => return tombstone.unwrap_or(index),
                Bucket::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Bucket::Live { key: k, .. } if *k == key => return index,
                Bucket::Live { .. } => {}
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self) {
        let capacity = if self.buckets.is_empty() { MIN_CAPACITY } else { self.buckets.len() * 2 };
        let mut buckets: Vec<Bucket<V>> = Vec::with_capacity(capacity);
        buckets.resize_with(capacity, || Bucket::Empty);

        // Tombstones are dropped here, so count restarts from the live entries.
        self.count = 0;
        for bucket in std::mem::take(&mut self.buckets) {
            if let Bucket::Live { key, value } = bucket {
                let dest = Self::find_entry(&buckets, key);
                buckets[dest] = Bucket::Live { key, value };
                self.count += 1;
            }
        }
        self.buckets = buckets;
    }

    /// Insert or update. Returns `true` when `key` was not present before.
    pub fn set(&mut self, key: StrRef, value: V) -> bool {
        if (self.count + 1) as f64 > self.buckets.len() as f64 * MAX_LOAD {
            self.grow();
        }
        let index = Self::find_entry(&self.buckets, key);
        let is_new = !matches!(self.buckets[index], Bucket::Live { .. });
        if matches!(self.buckets[index], Bucket::Empty) {
            self.count += 1;
        }
        self.buckets[index] = Bucket::Live { key, value };
        is_new
    }

    pub fn get(&self, key: StrRef) -> Option<&V> {
        if self.buckets.is_empty() {
            return None;
        }
        match &self.buckets[Self::find_entry(&self.buckets, key)] {
            Bucket::Live { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Remove `key`, leaving a tombstone. Returns whether it was present.
    pub fn remove(&mut self, key: StrRef) -> bool {
        if self.buckets.is_empty() {
            return false;
        }
        let index = Self::find_entry(&self.buckets, key);
        if !matches!(self.buckets[index], Bucket::Live { .. }) {
            return false;
        }
        self.buckets[index] = Bucket::Tombstone;
        true
    }

    /// Look a string up by content rather than handle. This is how the
    /// interner avoids allocating a duplicate.
    pub fn find_string(&self, chars: &str, hash: u32, objects: &[Obj]) -> Option<StrRef> {
        if self.buckets.is_empty() {
            return None;
        }
        let capacity = self.buckets.len();
        let mut index = hash as usize % capacity;
        loop {
            match &self.buckets[index] {
                Bucket::Empty => return None,
                Bucket::Tombstone => {}
                Bucket::Live { key, .. } => {
                    if key.hash == hash {
                        if let Some(Obj::String(s)) = objects.get(key.handle.index()) {
                            if s.chars.len() == chars.len() && &*s.chars == chars {
                                return Some(*key);
                            }
                        }
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    /// Live entries in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (StrRef, &V)> {
        self.buckets.iter().filter_map(|b| match b {
            Bucket::Live { key, value } => Some((*key, value)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::object::Heap;

    fn keys(heap: &mut Heap, n: usize) -> Vec<StrRef> {
        (0..n).map(|i| heap.intern(&format!("key{i}"))).collect()
    }

    #[test]
    fn fnv1a_known_vectors() {
        assert_eq!(hash_string(b""), 2166136261);
        assert_eq!(hash_string(b"a"), 0xe40c292c);
        assert_eq!(hash_string(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn set_reports_new_keys() {
        let mut heap = Heap::new();
        let k = heap.intern("x");
        let mut table = Table::new();
        assert!(table.set(k, 1));
        assert!(!table.set(k, 2));
        assert_eq!(table.get(k), Some(&2));
    }

    #[test]
    fn first_insert_allocates_minimum_capacity() {
        let mut heap = Heap::new();
        let k = heap.intern("x");
        let mut table: Table<i32> = Table::new();
        assert_eq!(table.capacity(), 0);
        assert!(table.get(k).is_none());
        table.set(k, 0);
        assert_eq!(table.capacity(), 256);
    }

    #[test]
    fn growth_doubles_once_and_keeps_entries() {
        let mut heap = Heap::new();
        // 192 entries fit at 75% of 256; the 193rd forces one doubling.
        let ks = keys(&mut heap, 193);
        let mut table = Table::new();
        for (i, k) in ks.iter().take(192).enumerate() {
            table.set(*k, i);
        }
        assert_eq!(table.capacity(), 256);
        table.set(ks[192], 192);
        assert_eq!(table.capacity(), 512);

        let mut seen: Vec<usize> = table.iter().map(|(_, v)| *v).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..193).collect::<Vec<_>>());
        for (i, k) in ks.iter().enumerate() {
            assert_eq!(table.get(*k), Some(&i));
        }
    }

    #[test]
    fn remove_leaves_collision_chain_intact() {
        let mut heap = Heap::new();
        let ks = keys(&mut heap, 50);
        let mut table = Table::new();
        for (i, k) in ks.iter().enumerate() {
            table.set(*k, i);
        }
        for k in ks.iter().step_by(2) {
            assert!(table.remove(*k));
        }
        assert!(!table.remove(ks[0]));
        for (i, k) in ks.iter().enumerate() {
            if i % 2 == 0 {
                assert!(table.get(*k).is_none());
            } else {
                assert_eq!(table.get(*k), Some(&i));
            }
        }
        assert_eq!(table.len(), 25);
    }

    #[test]
    fn tombstone_is_reused_without_growing_count() {
        let mut heap = Heap::new();
        let a = heap.intern("a");
        let mut table = Table::new();
        table.set(a, 1);
        let before = table.count;
        table.remove(a);
        assert!(table.set(a, 2));
        assert_eq!(table.count, before);
        assert_eq!(table.get(a), Some(&2));
    }

    #[test]
    fn colliding_keys_scan_linearly() {
        let mut heap = Heap::new();
        let a = heap.intern("a");
        let b = heap.intern("b");
        // Force both keys into the same home bucket.
        let a = StrRef { hash: 7, ..a };
        let b = StrRef { hash: 7 + 256, ..b };
        let mut table = Table::new();
        table.set(a, "a");
        table.set(b, "b");
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.get(b), Some(&"b"));
        table.remove(a);
        assert_eq!(table.get(b), Some(&"b"));
    }

    #[test]
    fn find_string_compares_content() {
        let mut heap = Heap::new();
        let k = heap.intern("needle");
        assert_eq!(heap.find_interned("needle").map(|s| s.handle), Some(k.handle));
        assert!(heap.find_interned("needles").is_none());
    }
}
