//! Sortable items and the k-way merge that orders them.
//!
//! A sortable item pairs a cheap ordering key with a value. The merge only
//! ever looks at keys; values are built when the consumer asks for them, so
//! stopping early never pays for occurrences that were not consumed.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;

/// A value with an ordering key known before the value is built.
pub trait SortableItem {
    type Key: Ord + Clone;
    type Value;

    fn key(&self) -> &Self::Key;

    /// Builds (or hands over) the value.
    fn into_value(self) -> Self::Value;
}

/// A sortable item whose value already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortableItemValue<K, V> {
    key: K,
    value: V,
}

impl<K, V> SortableItemValue<K, V> {
    #[must_use]
    pub const fn new(key: K, value: V) -> Self {
        Self { key, value }
    }
}

impl<K: Ord + Clone, V> SortableItem for SortableItemValue<K, V> {
    type Key = K;
    type Value = V;

    fn key(&self) -> &K {
        &self.key
    }

    fn into_value(self) -> V {
        self.value
    }
}

/// A sortable item whose value is built on demand.
pub struct LazySortableItem<K, V> {
    key: K,
    builder: Box<dyn FnOnce() -> V>,
}

impl<K, V> LazySortableItem<K, V> {
    #[must_use]
    pub fn new(key: K, builder: impl FnOnce() -> V + 'static) -> Self {
        Self {
            key,
            builder: Box::new(builder),
        }
    }

    /// Wraps an already built value.
    #[must_use]
    pub fn ready(key: K, value: V) -> Self
    where
        V: 'static,
    {
        Self::new(key, move || value)
    }
}

impl<K: Ord + Clone, V> SortableItem for LazySortableItem<K, V> {
    type Key = K;
    type Value = V;

    fn key(&self) -> &K {
        &self.key
    }

    fn into_value(self) -> V {
        (self.builder)()
    }
}

impl<K: fmt::Debug, V> fmt::Debug for LazySortableItem<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySortableItem")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// A source of sortable items, ascending by key.
pub type SortedSource<S, E> = Box<dyn Iterator<Item = Result<S, E>>>;

struct Cursor<S, E> {
    /// `None` once the source has failed.
    source: Option<SortedSource<S, E>>,
    peeked: Option<S>,
}

/// Lazy k-way merge of ascending sources into one ascending stream.
///
/// Each source is read one element ahead. The smallest peeked key wins;
/// on equal keys the source registered first wins. A source that yields an
/// error has that error passed through and is then closed.
pub struct MergedIterable<S: SortableItem, E> {
    cursors: Vec<Cursor<S, E>>,
    heap: BinaryHeap<Reverse<(S::Key, usize)>>,
    errors: VecDeque<E>,
}

impl<S: SortableItem, E> MergedIterable<S, E> {
    /// Creates the merge and peeks the first element of every source.
    #[must_use]
    pub fn new(sources: Vec<SortedSource<S, E>>) -> Self {
        let mut merged = Self {
            cursors: Vec::with_capacity(sources.len()),
            heap: BinaryHeap::with_capacity(sources.len()),
            errors: VecDeque::new(),
        };
        for source in sources {
            merged.cursors.push(Cursor {
                source: Some(source),
                peeked: None,
            });
            merged.advance(merged.cursors.len() - 1);
        }
        tracing::trace!(sources = merged.cursors.len(), "Merging sorted sources");
        merged
    }

    /// Number of sources that still have elements.
    #[must_use]
    pub fn live_sources(&self) -> usize {
        self.heap.len()
    }

    /// Key of the smallest element still queued, if any.
    ///
    /// A pending error is returned by `next` before that element.
    #[must_use]
    pub fn peek_key(&self) -> Option<&S::Key> {
        self.heap.peek().map(|Reverse((key, _))| key)
    }

    /// Whether the next call to `next` yields a source error.
    #[must_use]
    pub fn has_pending_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Consumes the merge, building each value as it is reached.
    pub fn values(self) -> impl Iterator<Item = Result<S::Value, E>> {
        self.map(|item| item.map(SortableItem::into_value))
    }

    fn advance(&mut self, index: usize) {
        let Some(cursor) = self.cursors.get_mut(index) else {
            return;
        };
        let Some(source) = cursor.source.as_mut() else {
            return;
        };
        match source.next() {
            Some(Ok(item)) => {
                self.heap.push(Reverse((item.key().clone(), index)));
                cursor.peeked = Some(item);
            }
            Some(Err(err)) => {
                cursor.source = None;
                self.errors.push_back(err);
            }
            None => {}
        }
    }
}

impl<S: SortableItem, E> Iterator for MergedIterable<S, E> {
    type Item = Result<S, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.errors.pop_front() {
            return Some(Err(err));
        }
        let Reverse((_, index)) = self.heap.pop()?;
        let item = self.cursors.get_mut(index)?.peeked.take()?;
        self.advance(index);
        Some(Ok(item))
    }
}

impl<S: SortableItem, E> fmt::Debug for MergedIterable<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergedIterable")
            .field("sources", &self.cursors.len())
            .field("live", &self.heap.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::convert::Infallible;
    use std::rc::Rc;

    fn source(values: Vec<i32>) -> SortedSource<SortableItemValue<i32, i32>, Infallible> {
        Box::new(values.into_iter().map(|v| Ok(SortableItemValue::new(v, v))))
    }

    #[test]
    fn merges_interleaved_sources() {
        let merged = MergedIterable::new(vec![source(vec![1, 3, 5]), source(vec![2, 4, 6])]);
        let values: Vec<i32> = merged.values().map(Result::unwrap).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn empty_and_uneven_sources() {
        let merged = MergedIterable::new(vec![
            source(vec![]),
            source(vec![4]),
            source(vec![1, 2, 3, 7]),
        ]);
        let values: Vec<i32> = merged.values().map(Result::unwrap).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 7]);

        let nothing = MergedIterable::<SortableItemValue<i32, i32>, Infallible>::new(vec![]);
        assert_eq!(nothing.count(), 0);
    }

    #[test]
    fn ties_prefer_earlier_source() {
        let first: SortedSource<SortableItemValue<i32, &str>, Infallible> =
            Box::new(std::iter::once(Ok(SortableItemValue::new(1, "first"))));
        let second: SortedSource<SortableItemValue<i32, &str>, Infallible> =
            Box::new(std::iter::once(Ok(SortableItemValue::new(1, "second"))));
        let values: Vec<&str> = MergedIterable::new(vec![first, second])
            .values()
            .map(Result::unwrap)
            .collect();
        assert_eq!(values, vec!["first", "second"]);
    }

    #[test]
    fn infinite_sources_are_consumed_lazily() {
        let built = Rc::new(Cell::new(0));
        let lazy = |step: i32, offset: i32| -> SortedSource<LazySortableItem<i32, i32>, Infallible> {
            let built = Rc::clone(&built);
            Box::new((0..).map(move |n| {
                let key = n * step + offset;
                let built = Rc::clone(&built);
                Ok(LazySortableItem::new(key, move || {
                    built.set(built.get() + 1);
                    key
                }))
            }))
        };

        let merged = MergedIterable::new(vec![lazy(2, 0), lazy(3, 1)]);
        let values: Vec<i32> = merged.values().take(5).map(Result::unwrap).collect();
        assert_eq!(values, vec![0, 1, 2, 4, 4]);
        assert_eq!(built.get(), 5);
    }

    #[test]
    fn source_errors_are_yielded_and_close_the_source() {
        let failing: SortedSource<SortableItemValue<i32, i32>, String> = Box::new(
            vec![Ok(SortableItemValue::new(2, 2)), Err("boom".to_string())].into_iter(),
        );
        let healthy: SortedSource<SortableItemValue<i32, i32>, String> =
            Box::new(vec![1, 3].into_iter().map(|v| Ok(SortableItemValue::new(v, v))));

        let results: Vec<Result<i32, String>> =
            MergedIterable::new(vec![failing, healthy]).values().collect();
        assert_eq!(
            results,
            vec![Ok(1), Ok(2), Err("boom".to_string()), Ok(3)]
        );
    }

    #[test]
    fn pending_error_is_reported_before_the_next_key() {
        let failing: SortedSource<SortableItemValue<i32, i32>, String> = Box::new(
            vec![Ok(SortableItemValue::new(1, 1)), Err("boom".to_string())].into_iter(),
        );
        let later: SortedSource<SortableItemValue<i32, i32>, String> =
            Box::new(std::iter::once(Ok(SortableItemValue::new(10, 10))));

        let mut merged = MergedIterable::new(vec![failing, later]);
        assert!(!merged.has_pending_error());
        assert_eq!(merged.next().map(|item| item.map(SortableItem::into_value)), Some(Ok(1)));
        assert!(merged.has_pending_error());
        assert_eq!(merged.peek_key(), Some(&10));
        assert!(matches!(merged.next(), Some(Err(err)) if err == "boom"));
        assert!(!merged.has_pending_error());
    }
}
