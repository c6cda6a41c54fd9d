//! Set difference between desired and observed state.

use serde::Serialize;
use std::collections::BTreeSet;

/// Changes needed to turn `observed` into `desired`.
///
/// `to_add` and `to_remove` are always disjoint, and neither contains an
/// element present in both inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delta<T: Ord> {
    pub to_add: BTreeSet<T>,
    pub to_remove: BTreeSet<T>,
}

impl<T: Ord> Default for Delta<T> {
    fn default() -> Self {
        Self {
            to_add: BTreeSet::new(),
            to_remove: BTreeSet::new(),
        }
    }
}

impl<T: Ord> Delta<T> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Total number of changes.
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// `to_add = desired − observed`, `to_remove = observed − desired`.
pub fn delta<T: Ord + Clone>(desired: &BTreeSet<T>, observed: &BTreeSet<T>) -> Delta<T> {
    Delta {
        to_add: desired.difference(observed).cloned().collect(),
        to_remove: observed.difference(desired).cloned().collect(),
    }
}

/// [`delta`] over arbitrary collections; duplicates collapse.
pub fn delta_of<T, D, O>(desired: D, observed: O) -> Delta<T>
where
    T: Ord + Clone,
    D: IntoIterator<Item = T>,
    O: IntoIterator<Item = T>,
{
    let desired: BTreeSet<T> = desired.into_iter().collect();
    let observed: BTreeSet<T> = observed.into_iter().collect();
    delta(&desired, &observed)
}
