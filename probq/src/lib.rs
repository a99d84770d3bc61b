// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Probability queries over dataframes, written the way they are written on paper.
//!
//! Bind a frame with [`VariableBuilder::from_data`], take [`Variable`]s for its columns and
//! ask [`p`] for:
//! - marginal and joint distributions: `p(&x)`, `p((&x, &y))`,
//! - probabilities of events: `p(x.gt(5)?)`, `p(x.eq(1)? & y.is_in(["a", "b"])?)`,
//! - conditionals: `p(&x)?.given(y.eq(true)?)`, `p(&x)?.given_each(&y)`.
//!
//! Estimates are plain relative frequencies. The computation itself (filtering, grouping,
//! counting) is delegated to a [`Frame`] backend: [`ColumnFrame`] from `probq_frame`, or
//! `ArrowFrame` from `probq_arrow`.
//!
//! Missing cells never satisfy a comparison (three-valued logic); match them with
//! [`Variable::is_null`]. In distributions they form their own outcome, [`Value::Null`].
//!
//! ## Features
//!
//! - `std`: implements `std`-dependent parts of `thiserror` and `tracing`. The crate itself
//!   only needs `alloc`.

#![no_std]

extern crate alloc;

mod condition;
mod distribution;
mod error;
mod probability;
mod query;
mod variable;

pub use condition::{Condition, IntoConditions};
pub use distribution::{ConditionalDistribution, DEFAULT_TOLERANCE, Distribution, Entry};
pub use error::{DataError, Error, ExpressionError, ProvenanceError, UsageError, VariableError};
pub use probability::Probability;
pub use query::{IntoQuery, IntoVariables, p};
pub use variable::{FrameId, Variable, VariableBuilder};

pub use probq_frame::{Column, ColumnFrame, DType, Frame, FrameError, Outcome, Value};
