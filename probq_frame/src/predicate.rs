// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Row predicate IR.
//!
//! Predicates are plain data: they are built by the query layer and evaluated by a
//! [`Frame`](crate::Frame) backend. Evaluation uses three-valued (Kleene) logic: a test on a
//! missing cell is *unknown*, and a row is selected only when the whole predicate is *true*.

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

use crate::{FrameError, Schema, Value};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Returns `true` for `<`, `<=`, `>` and `>=`.
    #[must_use]
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    /// The operator as written in expressions.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// Interprets `cell.compare(operand)` for this operator.
    #[must_use]
    pub fn holds(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }
}

/// A test applied to the cells of a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Test {
    /// `cell <op> value`.
    Compare {
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand constant.
        value: Value,
    },
    /// `low <= cell <= high`.
    Between {
        /// Inclusive lower bound.
        low: Value,
        /// Inclusive upper bound.
        high: Value,
    },
    /// `cell` equals one of the values.
    In(Vec<Value>),
    /// `cell` is missing. Never unknown.
    IsNull,
}

impl Test {
    /// Evaluates the test against one cell.
    ///
    /// Returns `None` (unknown) when the cell is missing, except for [`Test::IsNull`].
    #[must_use]
    pub fn eval(&self, cell: &Value) -> Option<bool> {
        if let Self::IsNull = self {
            return Some(cell.is_null());
        }
        if cell.is_null() {
            return None;
        }
        match self {
            Self::Compare { op, value } => cell.compare(value).map(|ord| op.holds(ord)),
            Self::Between { low, high } => {
                let lo = cell.compare(low)?;
                let hi = cell.compare(high)?;
                Some(lo != Ordering::Less && hi != Ordering::Greater)
            }
            Self::In(values) => Some(
                values
                    .iter()
                    .any(|v| cell.compare(v) == Some(Ordering::Equal)),
            ),
            Self::IsNull => Some(false),
        }
    }

    fn check(&self, column: &Arc<str>, schema: &Schema) -> Result<(), FrameError> {
        let field = schema
            .field(column)
            .ok_or_else(|| FrameError::UnknownColumn(column.clone()))?;
        let mismatch = |op: &'static str, operand: &Value| FrameError::TypeMismatch {
            column: column.clone(),
            dtype: field.dtype,
            op,
            operand: operand.type_name(),
        };
        match self {
            Self::Compare { op, value } => {
                if (op.is_ordering() && !field.dtype.is_orderable()) || !field.dtype.accepts(value)
                {
                    return Err(mismatch(op.symbol(), value));
                }
            }
            Self::Between { low, high } => {
                for bound in [low, high] {
                    if !field.dtype.is_orderable() || !field.dtype.accepts(bound) {
                        return Err(mismatch("between", bound));
                    }
                }
            }
            Self::In(values) => {
                if let Some(bad) = values.iter().find(|v| !field.dtype.accepts(v)) {
                    return Err(mismatch("in", bad));
                }
            }
            Self::IsNull => {}
        }
        Ok(())
    }
}

/// A row predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// A test on one column.
    Test {
        /// Column to read.
        column: Arc<str>,
        /// Test applied to each cell.
        test: Test,
    },
    /// All of the predicates hold. An empty conjunction is `true`.
    And(Vec<Predicate>),
    /// Any of the predicates holds. An empty disjunction is `false`.
    Or(Vec<Predicate>),
    /// The predicate does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// `column <op> value`.
    pub fn compare(column: impl Into<Arc<str>>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Test {
            column: column.into(),
            test: Test::Compare {
                op,
                value: value.into(),
            },
        }
    }

    /// `low <= column <= high`.
    pub fn between(
        column: impl Into<Arc<str>>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::Test {
            column: column.into(),
            test: Test::Between {
                low: low.into(),
                high: high.into(),
            },
        }
    }

    /// `column in [values]`.
    pub fn is_in<V: Into<Value>>(
        column: impl Into<Arc<str>>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Test {
            column: column.into(),
            test: Test::In(values.into_iter().map(Into::into).collect()),
        }
    }

    /// `column is null`.
    pub fn is_null(column: impl Into<Arc<str>>) -> Self {
        Self::Test {
            column: column.into(),
            test: Test::IsNull,
        }
    }

    /// Conjunction, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        let mut parts = match self {
            Self::And(parts) => parts,
            p => alloc::vec![p],
        };
        match other {
            Self::And(more) => parts.extend(more),
            p => parts.push(p),
        }
        Self::And(parts)
    }

    /// Disjunction, flattening nested `Or`s.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        let mut parts = match self {
            Self::Or(parts) => parts,
            p => alloc::vec![p],
        };
        match other {
            Self::Or(more) => parts.extend(more),
            p => parts.push(p),
        }
        Self::Or(parts)
    }

    /// Negation. Double negations cancel.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            p => Self::Not(Box::new(p)),
        }
    }

    /// Conjunction of all predicates, or `None` if there are none.
    pub fn all(predicates: impl IntoIterator<Item = Self>) -> Option<Self> {
        predicates.into_iter().reduce(Self::and)
    }

    /// Columns referenced by this predicate, in first-use order.
    #[must_use]
    pub fn columns(&self) -> Vec<Arc<str>> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<Arc<str>>) {
        match self {
            Self::Test { column, .. } => {
                if !out.contains(column) {
                    out.push(column.clone());
                }
            }
            Self::And(parts) | Self::Or(parts) => {
                for p in parts {
                    p.collect_columns(out);
                }
            }
            Self::Not(inner) => inner.collect_columns(out),
        }
    }

    /// Checks that every referenced column exists and every test fits its column type.
    pub fn validate(&self, schema: &Schema) -> Result<(), FrameError> {
        match self {
            Self::Test { column, test } => test.check(column, schema),
            Self::And(parts) | Self::Or(parts) => parts.iter().try_for_each(|p| p.validate(schema)),
            Self::Not(inner) => inner.validate(schema),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test { column, test } => match test {
                Test::Compare { op, value } => write!(f, "{column} {} {value}", op.symbol()),
                Test::Between { low, high } => write!(f, "{low} <= {column} <= {high}"),
                Test::In(values) => {
                    write!(f, "{column} in [")?;
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{v}")?;
                    }
                    f.write_str("]")
                }
                Test::IsNull => write!(f, "{column} is null"),
            },
            Self::And(parts) => write_joined(f, parts, " & ", "true"),
            Self::Or(parts) => write_joined(f, parts, " | ", "false"),
            Self::Not(inner) => write!(f, "!({inner})"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    parts: &[Predicate],
    sep: &str,
    empty: &str,
) -> fmt::Result {
    if parts.is_empty() {
        return f.write_str(empty);
    }
    f.write_str("(")?;
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{p}")?;
    }
    f.write_str(")")
}

/// Kleene conjunction.
pub(crate) fn kleene_and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// Kleene disjunction.
pub(crate) fn kleene_or(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}
