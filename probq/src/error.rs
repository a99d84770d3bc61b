// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use probq_frame::{DType, FrameError};

use crate::FrameId;

/// Any error returned by `probq`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Variables or conditions from different frames were mixed.
    #[error(transparent)]
    Provenance(#[from] ProvenanceError),
    /// A variable name did not resolve to a column.
    #[error(transparent)]
    Variable(#[from] VariableError),
    /// The data cannot answer the query.
    #[error(transparent)]
    Data(#[from] DataError),
    /// A comparison does not fit the variable's type.
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    /// The API was called with arguments that make no sense.
    #[error(transparent)]
    Usage(#[from] UsageError),
}

impl From<FrameError> for Error {
    fn from(err: FrameError) -> Self {
        Self::Data(DataError::Frame(err))
    }
}

/// Variables bound to different frames were used in one query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "variables from different frames cannot be mixed: `{anchor}` belongs to {expected}, but `{}` belong to {found}",
    .offending.join("`, `")
)]
pub struct ProvenanceError {
    /// A variable bound to the frame the query runs against.
    pub anchor: Arc<str>,
    /// The frame the query runs against.
    pub expected: FrameId,
    /// The variables bound elsewhere.
    pub offending: Vec<Arc<str>>,
    /// The frame the first offending variable is bound to.
    pub found: FrameId,
}

/// Requested columns do not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "columns not found: {}. Available columns: {}",
    .missing.join(", "),
    .available.join(", ")
)]
pub struct VariableError {
    /// Names that did not match a column.
    pub missing: Vec<Arc<str>>,
    /// All column names of the frame, in order.
    pub available: Vec<Arc<str>>,
}

/// The data cannot answer a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    /// The frame has no rows.
    #[error("frame is empty: cannot estimate probabilities from zero rows")]
    EmptyFrame,
    /// The frame has no columns.
    #[error("frame has no columns")]
    NoColumns,
    /// No row satisfies the conditioning event.
    #[error("conditioning event {condition} matches no rows")]
    ZeroProbability {
        /// The conditioning event, as an expression.
        condition: String,
    },
    /// The backend failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// A comparison does not fit the variable's type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    /// The operand has the wrong kind for the column.
    #[error("cannot apply `{op}` to `{variable}` ({dtype}) with a {operand} operand")]
    IncompatibleOperand {
        /// The variable.
        variable: Arc<str>,
        /// The variable's type.
        dtype: DType,
        /// The operator.
        op: &'static str,
        /// The kind of the operand.
        operand: &'static str,
    },
    /// Ordering operators on a nominal type.
    #[error("`{op}` is not defined for `{variable}` of nominal type {dtype}")]
    Unordered {
        /// The variable.
        variable: Arc<str>,
        /// The variable's type.
        dtype: DType,
        /// The operator.
        op: &'static str,
    },
    /// A null operand; missing cells are matched with `is_null`.
    #[error("cannot compare `{variable}` with null, use `is_null` instead")]
    NullOperand {
        /// The variable.
        variable: Arc<str>,
    },
    /// `is_in` with no values.
    #[error("`is_in` on `{variable}` requires at least one value")]
    EmptyIn {
        /// The variable.
        variable: Arc<str>,
    },
}

/// The API was called with arguments that make no sense.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    /// `p` was called with nothing to compute.
    #[error("p() requires at least one variable or condition")]
    EmptyQuery,
    /// `given` was called without conditions.
    #[error("given() requires at least one condition")]
    EmptyGiven,
    /// `given_each` was called without variables.
    #[error("given_each() requires at least one variable")]
    EmptyGivenEach,
    /// A distribution with other than one outcome was converted to a scalar.
    #[error("only a distribution with exactly one outcome converts to a scalar, this one has {outcomes}")]
    NotScalar {
        /// Number of outcomes in the distribution.
        outcomes: usize,
    },
}
