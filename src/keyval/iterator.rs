//! Iterators over list results.
//!
//! The whole result batch is fetched by the list call; iteration never talks
//! to the store. Both iterators are single-pass: they cannot be cloned or
//! rewound, and `None` from `next()` means the last item was reached.

use std::vec;

use super::KeyVal;
use super::Revision;

/// Records returned by `list_values` and `list_values_range`
#[derive(Debug)]
pub struct KeyValIterator {
    inner: vec::IntoIter<KeyVal>,
}

impl KeyValIterator {
    pub(crate) fn new(batch: Vec<KeyVal>) -> Self {
        Self {
            inner: batch.into_iter(),
        }
    }
}

impl Iterator for KeyValIterator {
    type Item = KeyVal;

    fn next(&mut self) -> Option<KeyVal> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for KeyValIterator {}

/// Keys and their revisions returned by `list_keys`
#[derive(Debug)]
pub struct KeyIterator {
    inner: vec::IntoIter<KeyVal>,
}

impl KeyIterator {
    pub(crate) fn new(batch: Vec<KeyVal>) -> Self {
        Self {
            inner: batch.into_iter(),
        }
    }
}

impl Iterator for KeyIterator {
    type Item = (String, Revision);

    fn next(&mut self) -> Option<(String, Revision)> {
        self.inner.next().map(|kv| {
            let revision = kv.revision();
            (kv.key().to_string(), revision)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for KeyIterator {}
