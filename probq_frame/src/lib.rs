// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend-agnostic frame interface for `probq`.
//!
//! This crate provides:
//! - a small predicate IR ([`Predicate`]) that the query layer builds and backends evaluate,
//! - the [`Frame`] trait: schema, row count, filter and group-count, and
//! - [`ColumnFrame`], an owned columnar table implementing [`Frame`].
//!
//! Other engines plug in by implementing [`Frame`]; see `probq_arrow` for an Arrow adapter.

#![no_std]

extern crate alloc;

mod error;
mod frame;
mod predicate;
mod schema;
mod table;
mod value;

pub use error::FrameError;
pub use frame::{Frame, GroupCounter, GroupCounts, Selection};
pub use predicate::{CompareOp, Predicate, Test};
pub use schema::{Field, Schema};
pub use table::{Column, ColumnFrame};
pub use value::{DType, Outcome, Value};
