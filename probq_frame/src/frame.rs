// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The backend interface.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use crate::{FrameError, Outcome, Predicate, Schema, Value};

/// A table that can be filtered, grouped and counted.
///
/// This is the only surface the query layer depends on. Implementations can be:
/// - an owned columnar table ([`ColumnFrame`](crate::ColumnFrame)), or
/// - an adapter over an external dataframe engine (e.g. Arrow record batches).
///
/// Implementations must agree on predicate semantics: three-valued logic, with a row
/// selected only when the predicate is `true`, and numeric comparisons across `Int64` and
/// `Float64` following IEEE 754 `totalOrder`.
pub trait Frame: fmt::Debug {
    /// A short backend name used in logs and errors.
    fn backend(&self) -> &'static str;

    /// Column names and types.
    fn schema(&self) -> &Schema;

    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Returns the rows for which `predicate` is `true`.
    fn filter(&self, predicate: &Predicate) -> Result<Selection, FrameError>;

    /// Counts rows per distinct key tuple over `columns`.
    ///
    /// When `selection` is given only selected rows are counted. Missing cells group under
    /// [`Value::Null`].
    fn group_count(
        &self,
        columns: &[Arc<str>],
        selection: Option<&Selection>,
    ) -> Result<GroupCounts, FrameError>;

    /// Number of rows in `selection`, or all rows.
    fn count(&self, selection: Option<&Selection>) -> usize {
        selection.map_or_else(|| self.row_count(), Selection::count)
    }
}

/// A row mask produced by [`Frame::filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    mask: Vec<bool>,
    selected: usize,
}

impl Selection {
    /// Selects all `rows`.
    #[must_use]
    pub fn all(rows: usize) -> Self {
        Self {
            mask: alloc::vec![true; rows],
            selected: rows,
        }
    }

    /// Builds a selection from a boolean mask.
    #[must_use]
    pub fn from_mask(mask: Vec<bool>) -> Self {
        let selected = mask.iter().filter(|&&m| m).count();
        Self { mask, selected }
    }

    /// Builds a selection from three-valued results; unknown rows are not selected.
    pub fn from_kleene(results: impl IntoIterator<Item = Option<bool>>) -> Self {
        Self::from_mask(
            results
                .into_iter()
                .map(|r| r.unwrap_or(false))
                .collect(),
        )
    }

    /// Number of rows the mask covers (the frame's row count).
    #[must_use]
    pub fn len(&self) -> usize {
        self.mask.len()
    }

    /// Number of selected rows.
    #[must_use]
    pub fn count(&self) -> usize {
        self.selected
    }

    /// Returns `true` if no row is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected == 0
    }

    /// Returns `true` if `row` is selected.
    #[must_use]
    pub fn contains(&self, row: usize) -> bool {
        self.mask.get(row).copied().unwrap_or(false)
    }

    /// The mask, one entry per row.
    #[must_use]
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Indices of selected rows.
    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
    }

    /// Rows selected by both masks.
    pub fn intersect(&self, other: &Self) -> Result<Self, FrameError> {
        if self.len() != other.len() {
            return Err(FrameError::SelectionMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok(Self::from_mask(
            self.mask
                .iter()
                .zip(&other.mask)
                .map(|(&a, &b)| a && b)
                .collect(),
        ))
    }

    /// Checks the selection was built for a frame with `rows` rows.
    pub fn check_len(&self, rows: usize) -> Result<(), FrameError> {
        if self.len() == rows {
            Ok(())
        } else {
            Err(FrameError::SelectionMismatch {
                expected: rows,
                actual: self.len(),
            })
        }
    }
}

/// Row counts per distinct key tuple, sorted by key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCounts {
    columns: Vec<Arc<str>>,
    groups: Vec<(Outcome, u64)>,
    total: u64,
}

impl GroupCounts {
    /// Key columns, in order.
    #[must_use]
    pub fn columns(&self) -> &[Arc<str>] {
        &self.columns
    }

    /// `(key, count)` pairs sorted by key.
    #[must_use]
    pub fn groups(&self) -> &[(Outcome, u64)] {
        &self.groups
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if no row was counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Consumes the counts, returning the `(key, count)` pairs.
    #[must_use]
    pub fn into_groups(self) -> Vec<(Outcome, u64)> {
        self.groups
    }
}

/// Accumulates [`GroupCounts`] row by row.
///
/// Backends that have no native group-by feed extracted key values through this.
#[derive(Debug)]
pub struct GroupCounter {
    columns: Vec<Arc<str>>,
    counts: HashMap<Outcome, u64>,
}

impl GroupCounter {
    /// Creates a counter for the given key columns.
    pub fn new(columns: &[Arc<str>]) -> Result<Self, FrameError> {
        if columns.is_empty() {
            return Err(FrameError::EmptyGroupBy);
        }
        Ok(Self {
            columns: columns.to_vec(),
            counts: HashMap::new(),
        })
    }

    /// Counts one row with the given key values.
    pub fn add(&mut self, key: impl IntoIterator<Item = Value>) {
        *self.counts.entry(Outcome::new(key)).or_insert(0) += 1;
    }

    /// Sorts the groups and returns them.
    #[must_use]
    pub fn finish(self) -> GroupCounts {
        let mut groups: Vec<(Outcome, u64)> = self.counts.into_iter().collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        let total = groups.iter().map(|(_, c)| c).sum();
        GroupCounts {
            columns: self.columns,
            groups,
            total,
        }
    }
}
