// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Owned columnar table, the built-in [`Frame`] backend.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::frame::GroupCounter;
use crate::predicate::{kleene_and, kleene_or};
use crate::{
    DType, Field, Frame, FrameError, GroupCounts, Predicate, Schema, Selection, Value,
};

/// A typed column. Missing cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Booleans.
    Boolean(Vec<Option<bool>>),
    /// Integers.
    Int64(Vec<Option<i64>>),
    /// Floats.
    Float64(Vec<Option<f64>>),
    /// Strings.
    Utf8(Vec<Option<Arc<str>>>),
    /// Dictionary-encoded strings.
    Categorical {
        /// Distinct categories, indexed by code.
        categories: Vec<Arc<str>>,
        /// One code per row.
        codes: Vec<Option<u32>>,
    },
    /// Microseconds since the Unix epoch.
    Datetime(Vec<Option<i64>>),
}

impl Column {
    /// Dictionary-encodes string values into a categorical column.
    ///
    /// Categories are numbered in first-appearance order.
    pub fn categorical<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let mut categories: Vec<Arc<str>> = Vec::new();
        let mut index: HashMap<Arc<str>, u32> = HashMap::new();
        let codes = values
            .into_iter()
            .map(|v| {
                v.map(|s| {
                    if let Some(&code) = index.get(s) {
                        return code;
                    }
                    #[allow(
                        clippy::cast_possible_truncation,
                        reason = "more than u32::MAX categories is not a realistic table"
                    )]
                    let code = categories.len() as u32;
                    let name: Arc<str> = Arc::from(s);
                    categories.push(name.clone());
                    index.insert(name, code);
                    code
                })
            })
            .collect();
        Self::Categorical { categories, codes }
    }

    /// A datetime column from microseconds since the Unix epoch.
    #[must_use]
    pub fn datetime_micros(values: Vec<i64>) -> Self {
        Self::Datetime(values.into_iter().map(Some).collect())
    }

    /// The column type.
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Boolean(_) => DType::Boolean,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
            Self::Categorical { .. } => DType::Categorical,
            Self::Datetime(_) => DType::Datetime,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int64(v) | Self::Datetime(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Utf8(v) => v.len(),
            Self::Categorical { codes, .. } => codes.len(),
        }
    }

    /// Returns `true` if the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cell at `row`; out-of-range rows read as [`Value::Null`].
    #[must_use]
    pub fn value(&self, row: usize) -> Value {
        let cell = match self {
            Self::Boolean(v) => v.get(row).copied().flatten().map(Value::Boolean),
            Self::Int64(v) => v.get(row).copied().flatten().map(Value::Int),
            Self::Float64(v) => v.get(row).copied().flatten().map(Value::Float),
            Self::Utf8(v) => v.get(row).cloned().flatten().map(Value::Str),
            Self::Categorical { categories, codes } => codes
                .get(row)
                .copied()
                .flatten()
                .and_then(|c| categories.get(c as usize).cloned())
                .map(Value::Str),
            Self::Datetime(v) => v.get(row).copied().flatten().map(Value::Datetime),
        };
        cell.unwrap_or(Value::Null)
    }
}

impl From<Vec<bool>> for Column {
    fn from(values: Vec<bool>) -> Self {
        Self::Boolean(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<bool>>> for Column {
    fn from(values: Vec<Option<bool>>) -> Self {
        Self::Boolean(values)
    }
}

impl From<Vec<i64>> for Column {
    fn from(values: Vec<i64>) -> Self {
        Self::Int64(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<i64>>> for Column {
    fn from(values: Vec<Option<i64>>) -> Self {
        Self::Int64(values)
    }
}

impl From<Vec<f64>> for Column {
    fn from(values: Vec<f64>) -> Self {
        Self::Float64(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<f64>>> for Column {
    fn from(values: Vec<Option<f64>>) -> Self {
        Self::Float64(values)
    }
}

impl<'a> From<Vec<&'a str>> for Column {
    fn from(values: Vec<&'a str>) -> Self {
        Self::Utf8(values.into_iter().map(|s| Some(Arc::from(s))).collect())
    }
}

impl<'a> From<Vec<Option<&'a str>>> for Column {
    fn from(values: Vec<Option<&'a str>>) -> Self {
        Self::Utf8(values.into_iter().map(|s| s.map(Arc::from)).collect())
    }
}

impl From<Vec<String>> for Column {
    fn from(values: Vec<String>) -> Self {
        Self::Utf8(values.into_iter().map(|s| Some(Arc::from(s))).collect())
    }
}

/// An owned columnar table.
///
/// This is a deliberately small representation: a schema plus one typed [`Column`] per
/// field, all of the same length.
#[derive(Debug, Clone, Default)]
pub struct ColumnFrame {
    schema: Schema,
    columns: Vec<Column>,
    rows: usize,
}

impl ColumnFrame {
    /// Create an empty frame (no columns, no rows).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, builder style.
    pub fn with_column(
        mut self,
        name: impl Into<Arc<str>>,
        column: impl Into<Column>,
    ) -> Result<Self, FrameError> {
        self.push_column(name, column)?;
        Ok(self)
    }

    /// Appends a column.
    ///
    /// The first column fixes the row count; later columns must match it.
    pub fn push_column(
        &mut self,
        name: impl Into<Arc<str>>,
        column: impl Into<Column>,
    ) -> Result<(), FrameError> {
        let name = name.into();
        let column = column.into();
        if self.schema.index_of(&name).is_some() {
            return Err(FrameError::DuplicateColumn(name));
        }
        if self.columns.is_empty() {
            self.rows = column.len();
        } else if column.len() != self.rows {
            return Err(FrameError::LengthMismatch {
                column: name,
                expected: self.rows,
                actual: column.len(),
            });
        }
        self.schema.push(Field::new(name, column.dtype()));
        self.columns.push(column);
        Ok(())
    }

    /// Returns a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        let idx = self.schema.index_of(name)?;
        self.columns.get(idx)
    }

    /// Gets a cell if both the row and the column exist.
    #[must_use]
    pub fn value(&self, row: usize, name: &str) -> Option<Value> {
        if row >= self.rows {
            return None;
        }
        Some(self.column(name)?.value(row))
    }

    fn column_or_err(&self, name: &Arc<str>) -> Result<&Column, FrameError> {
        self.column(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.clone()))
    }

    /// Evaluates `predicate` column-at-a-time into three-valued results.
    fn evaluate(&self, predicate: &Predicate) -> Result<Vec<Option<bool>>, FrameError> {
        match predicate {
            Predicate::Test { column, test } => {
                let col = self.column_or_err(column)?;
                Ok((0..self.rows).map(|row| test.eval(&col.value(row))).collect())
            }
            Predicate::And(parts) => self.fold(parts, Some(true), kleene_and),
            Predicate::Or(parts) => self.fold(parts, Some(false), kleene_or),
            Predicate::Not(inner) => Ok(self
                .evaluate(inner)?
                .into_iter()
                .map(|r| r.map(|b| !b))
                .collect()),
        }
    }

    fn fold(
        &self,
        parts: &[Predicate],
        identity: Option<bool>,
        combine: fn(Option<bool>, Option<bool>) -> Option<bool>,
    ) -> Result<Vec<Option<bool>>, FrameError> {
        let mut acc = alloc::vec![identity; self.rows];
        for part in parts {
            let next = self.evaluate(part)?;
            for (a, b) in acc.iter_mut().zip(next) {
                *a = combine(*a, b);
            }
        }
        Ok(acc)
    }
}

impl Frame for ColumnFrame {
    fn backend(&self) -> &'static str {
        "column"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count(&self) -> usize {
        self.rows
    }

    fn filter(&self, predicate: &Predicate) -> Result<Selection, FrameError> {
        predicate.validate(&self.schema)?;
        let selection = Selection::from_kleene(self.evaluate(predicate)?);
        tracing::trace!(
            backend = self.backend(),
            %predicate,
            selected = selection.count(),
            rows = self.rows,
            "filter"
        );
        Ok(selection)
    }

    fn group_count(
        &self,
        columns: &[Arc<str>],
        selection: Option<&Selection>,
    ) -> Result<GroupCounts, FrameError> {
        let mut counter = GroupCounter::new(columns)?;
        let keys = columns
            .iter()
            .map(|c| self.column_or_err(c))
            .collect::<Result<Vec<_>, _>>()?;
        match selection {
            Some(selection) => {
                selection.check_len(self.rows)?;
                for row in selection.rows() {
                    counter.add(keys.iter().map(|c| c.value(row)));
                }
            }
            None => {
                for row in 0..self.rows {
                    counter.add(keys.iter().map(|c| c.value(row)));
                }
            }
        }
        let counts = counter.finish();
        tracing::trace!(
            backend = self.backend(),
            groups = counts.len(),
            counted = counts.total(),
            "group_count"
        );
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::vec;

    use super::*;
    use crate::{CompareOp, Outcome};

    fn people() -> ColumnFrame {
        ColumnFrame::new()
            .with_column("age", vec![25_i64, 30, 25, 40])
            .unwrap()
            .with_column("score", vec![Some(1.5), None, Some(3.0), Some(0.5)])
            .unwrap()
            .with_column(
                "color",
                Column::categorical([Some("red"), Some("blue"), Some("red"), None]),
            )
            .unwrap()
    }

    #[test]
    fn builder_rejects_ragged_and_duplicate_columns() {
        let frame = ColumnFrame::new().with_column("a", vec![1_i64, 2]).unwrap();
        assert_eq!(
            frame.clone().with_column("b", vec![true]).unwrap_err(),
            FrameError::LengthMismatch {
                column: "b".into(),
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(
            frame.with_column("a", vec![3_i64, 4]).unwrap_err(),
            FrameError::DuplicateColumn("a".into())
        );
    }

    #[test]
    fn categorical_codes_follow_first_appearance() {
        let col = Column::categorical([Some("b"), Some("a"), Some("b"), None]);
        let Column::Categorical { categories, codes } = &col else {
            panic!("expected categorical column");
        };
        assert_eq!(categories.len(), 2);
        assert_eq!(codes, &vec![Some(0), Some(1), Some(0), None]);
        assert_eq!(col.value(1), Value::from("a"));
        assert_eq!(col.value(3), Value::Null);
        assert_eq!(col.value(99), Value::Null);
    }

    #[test]
    fn filter_treats_missing_cells_as_unknown() {
        let frame = people();
        let gt = Predicate::compare("score", CompareOp::Gt, 1.0);
        assert_eq!(frame.filter(&gt).unwrap().count(), 2);
        // `!(score > 1)` must not pick up the missing score either.
        assert_eq!(frame.filter(&gt.clone().negate()).unwrap().count(), 1);
        let either = gt.or(Predicate::is_null("score"));
        assert_eq!(frame.filter(&either).unwrap().count(), 3);
    }

    #[test]
    fn filter_validates_against_schema() {
        let frame = people();
        let err = frame
            .filter(&Predicate::compare("color", CompareOp::Gt, "red"))
            .unwrap_err();
        assert!(matches!(err, FrameError::TypeMismatch { .. }));
    }

    #[test]
    fn group_count_over_selection() {
        let frame = people();
        let cols: Vec<Arc<str>> = vec!["age".into()];
        let all = frame.group_count(&cols, None).unwrap();
        assert_eq!(
            all.groups(),
            &[
                (Outcome::from(25_i64), 2),
                (Outcome::from(30_i64), 1),
                (Outcome::from(40_i64), 1)
            ]
        );

        let red = frame
            .filter(&Predicate::compare("color", CompareOp::Eq, "red"))
            .unwrap();
        let counts = frame.group_count(&cols, Some(&red)).unwrap();
        assert_eq!(counts.groups(), &[(Outcome::from(25_i64), 2)]);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn group_count_keeps_missing_cells_as_null_group() {
        let frame = people();
        let cols: Vec<Arc<str>> = vec!["color".into()];
        let counts = frame.group_count(&cols, None).unwrap();
        assert_eq!(counts.groups()[0], (Outcome::from(Value::Null), 1));
        assert_eq!(counts.len(), 3);
    }
}
