//! Iteration helpers polymorphic over sequences and string-keyed mappings.
//!
//! Sequences are visited in index order, mappings in their own key
//! enumeration order (insertion order for `serde_json::Map`, sorted order for
//! `BTreeMap`).

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

/// Position of an item within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    /// Index into a sequence
    Index(usize),
    /// Key of a mapping entry
    Name(&'a str),
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{}", index),
            Key::Name(name) => write!(f, "{}", name),
        }
    }
}

/// A collection whose items can be visited together with their [`Key`].
pub trait Traverse {
    type Item;

    fn entries(&self) -> Box<dyn Iterator<Item = (Key<'_>, &Self::Item)> + '_>;
}

impl<T> Traverse for [T] {
    type Item = T;

    fn entries(&self) -> Box<dyn Iterator<Item = (Key<'_>, &T)> + '_> {
        Box::new(self.iter().enumerate().map(|(i, item)| (Key::Index(i), item)))
    }
}

impl<T> Traverse for Vec<T> {
    type Item = T;

    fn entries(&self) -> Box<dyn Iterator<Item = (Key<'_>, &T)> + '_> {
        self.as_slice().entries()
    }
}

impl<T> Traverse for BTreeMap<String, T> {
    type Item = T;

    fn entries(&self) -> Box<dyn Iterator<Item = (Key<'_>, &T)> + '_> {
        Box::new(self.iter().map(|(k, v)| (Key::Name(k.as_str()), v)))
    }
}

impl Traverse for Map<String, Value> {
    type Item = Value;

    fn entries(&self) -> Box<dyn Iterator<Item = (Key<'_>, &Value)> + '_> {
        Box::new(self.iter().map(|(k, v)| (Key::Name(k.as_str()), v)))
    }
}

/// Arrays by index, objects by key; scalars have no entries.
impl Traverse for Value {
    type Item = Value;

    fn entries(&self) -> Box<dyn Iterator<Item = (Key<'_>, &Value)> + '_> {
        match self {
            Value::Array(items) => items.entries(),
            Value::Object(map) => map.entries(),
            _ => Box::new(std::iter::empty()),
        }
    }
}

/// Map every item to a new value, collecting the results in visit order.
///
/// # Examples
///
/// ```rust
/// use tempo::collections::map;
/// use serde_json::json;
///
/// let doubled = map(&vec![1, 2, 3], |n, _| n * 2);
/// assert_eq!(doubled, vec![2, 4, 6]);
///
/// let keys = map(&json!({"a": 1, "b": 2}), |_, key| key.to_string());
/// assert_eq!(keys, vec!["a", "b"]);
/// ```
pub fn map<C, U, F>(collection: &C, mut iteratee: F) -> Vec<U>
where
    C: Traverse + ?Sized,
    F: FnMut(&C::Item, Key<'_>) -> U,
{
    collection
        .entries()
        .map(|(key, item)| iteratee(item, key))
        .collect()
}

/// Visit every item for its side effects.
pub fn each<C, F>(collection: &C, mut iteratee: F)
where
    C: Traverse + ?Sized,
    F: FnMut(&C::Item, Key<'_>),
{
    for (key, item) in collection.entries() {
        iteratee(item, key);
    }
}

/// Fold all items into an accumulator starting from `seed`.
pub fn fold<C, Acc, F>(collection: &C, seed: Acc, mut iteratee: F) -> Acc
where
    C: Traverse + ?Sized,
    F: FnMut(Acc, &C::Item, Key<'_>) -> Acc,
{
    collection
        .entries()
        .fold(seed, |acc, (key, item)| iteratee(acc, item, key))
}

/// Fold without a seed: the first item becomes the accumulator.
///
/// Returns `None` for an empty collection.
///
/// # Examples
///
/// ```rust
/// use tempo::collections::reduce;
///
/// assert_eq!(reduce(&vec![1, 2, 3], |acc, n, _| acc + n), Some(6));
/// assert_eq!(reduce(&Vec::<i32>::new(), |acc, n, _| acc + n), None);
/// ```
pub fn reduce<C, F>(collection: &C, mut iteratee: F) -> Option<C::Item>
where
    C: Traverse + ?Sized,
    C::Item: Clone,
    F: FnMut(C::Item, &C::Item, Key<'_>) -> C::Item,
{
    let mut entries = collection.entries();
    let (_, first) = entries.next()?;
    Some(entries.fold(first.clone(), |acc, (key, item)| iteratee(acc, item, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_sequence_with_indices() {
        let items = vec!["a", "b", "c"];
        let result = map(&items, |item, key| format!("{}{}", key, item));
        assert_eq!(result, vec!["0a", "1b", "2c"]);
    }

    #[test]
    fn test_map_empty() {
        let empty: Vec<i32> = Vec::new();
        assert!(map(&empty, |n, _| n + 1).is_empty());
        assert!(map(&json!([]), |v, _| v.clone()).is_empty());
    }

    #[test]
    fn test_map_object_uses_values_in_insertion_order() {
        let value = json!({"zeta": 1, "alpha": 2});
        let result = map(&value, |v, key| format!("{}={}", key, v));
        assert_eq!(result, vec!["zeta=1", "alpha=2"]);
    }

    #[test]
    fn test_map_scalar_has_no_entries() {
        assert!(map(&json!(42), |v, _| v.clone()).is_empty());
    }

    #[test]
    fn test_each_btreemap_in_key_order() {
        let mut scores = BTreeMap::new();
        scores.insert("bob".to_string(), 3);
        scores.insert("alice".to_string(), 5);

        let mut seen = Vec::new();
        each(&scores, |score, key| seen.push((key.to_string(), *score)));
        assert_eq!(seen, vec![("alice".to_string(), 5), ("bob".to_string(), 3)]);
    }

    #[test]
    fn test_reduce_without_seed() {
        let items = [4, 5, 6];
        assert_eq!(reduce(&items[..], |acc, n, _| acc * n), Some(120));
    }

    #[test]
    fn test_reduce_empty_is_none() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(reduce(&empty, |acc, _, _| acc), None);
    }

    #[test]
    fn test_reduce_single_item_skips_iteratee() {
        let mut calls = 0;
        let result = reduce(&vec![7], |acc, n, _| {
            calls += 1;
            acc + n
        });
        assert_eq!(result, Some(7));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_fold_with_seed() {
        let value = json!({"a": 1, "b": 2, "c": 3});
        let total = fold(&value, 10, |acc, v, _| acc + v.as_i64().unwrap_or(0));
        assert_eq!(total, 16);

        let empty: Vec<i32> = Vec::new();
        assert_eq!(fold(&empty, 10, |acc, n, _| acc + n), 10);
    }
}
