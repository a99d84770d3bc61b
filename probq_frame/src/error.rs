// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;

use crate::DType;

/// Errors returned by [`Frame`](crate::Frame) implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A predicate or group-by referenced a column the frame does not have.
    #[error("column `{0}` not found")]
    UnknownColumn(Arc<str>),
    /// A test does not fit the type of its column.
    #[error("cannot apply `{op}` to column `{column}` of type {dtype} with a {operand} operand")]
    TypeMismatch {
        /// The column being tested.
        column: Arc<str>,
        /// The column type.
        dtype: DType,
        /// The operator.
        op: &'static str,
        /// The kind of the offending operand.
        operand: &'static str,
    },
    /// The backend stores a column type that has no [`DType`] mapping.
    #[error("column `{column}` has unsupported type {dtype}")]
    UnsupportedType {
        /// The column.
        column: Arc<str>,
        /// The backend's name for the type.
        dtype: String,
    },
    /// A column does not have as many rows as the frame.
    #[error("column `{column}` has {actual} rows, expected {expected}")]
    LengthMismatch {
        /// The column.
        column: Arc<str>,
        /// Row count of the frame.
        expected: usize,
        /// Row count of the column.
        actual: usize,
    },
    /// Two columns share a name.
    #[error("duplicate column `{0}`")]
    DuplicateColumn(Arc<str>),
    /// A selection was built for a frame with a different row count.
    #[error("selection covers {actual} rows but the frame has {expected}")]
    SelectionMismatch {
        /// Row count of the frame.
        expected: usize,
        /// Row count of the selection.
        actual: usize,
    },
    /// A group-by was requested without key columns.
    #[error("group-by requires at least one column")]
    EmptyGroupBy,
    /// The backend failed for its own reasons.
    #[error("{backend} backend error: {message}")]
    Backend {
        /// Backend name, see [`Frame::backend`](crate::Frame::backend).
        backend: &'static str,
        /// Backend error message.
        message: String,
    },
}
