//! Deterministic hashing. The hashing data structures in the standard library are randomly
//! seeded, which would make iteration order (and therefore any sampling that iterates a map)
//! differ between runs with the same random seed. Everything in this crate uses the `FxHash`
//! based `HashMap` and `HashSet` defined here instead.
//!
//! `HashMap<K, V, S>` has no `new` method for a non-default hasher. Bring `HashMapExt` (or
//! `HashSetExt`) into scope to get one, or use `HashMap::default()`.

use std::hash::Hash;

use rustc_hash::FxBuildHasher;
use xxhash_rust::xxh3::xxh3_64;

pub type HashMap<K, V> = std::collections::HashMap<K, V, FxBuildHasher>;
pub type HashSet<T> = std::collections::HashSet<T, FxBuildHasher>;
pub type IndexSet<T> = indexmap::IndexSet<T, FxBuildHasher>;

pub trait HashMapExt {
    fn new() -> Self;
}

impl<K: Hash + Eq, V> HashMapExt for HashMap<K, V> {
    fn new() -> Self {
        HashMap::default()
    }
}

pub trait HashSetExt {
    fn new() -> Self;
}

impl<T: Hash + Eq> HashSetExt for HashSet<T> {
    fn new() -> Self {
        HashSet::default()
    }
}

/// Stable 64-bit hash of a string, used to derive per-stream seeds from stream names.
#[must_use]
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}
