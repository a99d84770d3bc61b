// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conditions: predicates that remember which variables they read.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::ops::{BitAnd, BitOr, Not};

use probq_frame::Predicate;
use smallvec::SmallVec;

use crate::variable::Source;
use crate::{Error, FrameId, ProvenanceError, Variable};

/// A boolean condition on the rows of a frame.
///
/// Built by comparison methods on [`Variable`] and combined with `&`, `|` and `!`. Combining
/// conditions from different frames is allowed here but fails when a query runs; use
/// [`Condition::try_and`]/[`Condition::try_or`] to check eagerly.
#[derive(Debug, Clone)]
pub struct Condition<'f> {
    predicate: Predicate,
    source: Source<'f>,
    refs: SmallVec<[Variable<'f>; 2]>,
}

impl<'f> Condition<'f> {
    pub(crate) fn leaf(var: &Variable<'f>, predicate: Predicate) -> Self {
        Self {
            predicate,
            source: var.source,
            refs: smallvec::smallvec![var.clone()],
        }
    }

    /// The predicate a backend evaluates.
    #[must_use]
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Variables this condition reads, in first-use order.
    #[must_use]
    pub fn variables(&self) -> &[Variable<'f>] {
        &self.refs
    }

    /// The frame of the first variable this condition reads.
    #[must_use]
    pub fn frame_id(&self) -> FrameId {
        self.source.id
    }

    pub(crate) fn source(&self) -> Source<'f> {
        self.source
    }

    /// `self & other`, failing if they read different frames.
    pub fn try_and(self, other: Self) -> Result<Self, Error> {
        let combined = self & other;
        combined.check_provenance()?;
        Ok(combined)
    }

    /// `self | other`, failing if they read different frames.
    pub fn try_or(self, other: Self) -> Result<Self, Error> {
        let combined = self | other;
        combined.check_provenance()?;
        Ok(combined)
    }

    /// Checks that every variable read here is bound to this condition's frame.
    pub(crate) fn check_provenance(&self) -> Result<(), ProvenanceError> {
        check(
            self.source.id,
            self.refs.first().map(Variable::name_arc),
            self.refs.iter(),
        )
    }

    fn merge(self, other: Self, combine: fn(Predicate, Predicate) -> Predicate) -> Self {
        let mut refs = self.refs;
        for var in other.refs {
            if !refs.iter().any(|v| v.same_as(&var)) {
                refs.push(var);
            }
        }
        Self {
            predicate: combine(self.predicate, other.predicate),
            source: self.source,
            refs,
        }
    }
}

/// Checks that every variable is bound to `expected`.
///
/// `anchor` names a variable of the expected frame for the error message.
pub(crate) fn check<'a, 'f: 'a>(
    expected: FrameId,
    anchor: Option<&Arc<str>>,
    vars: impl IntoIterator<Item = &'a Variable<'f>>,
) -> Result<(), ProvenanceError> {
    let mut offending: Vec<Arc<str>> = Vec::new();
    let mut found = None;
    for var in vars {
        if var.frame_id() != expected {
            found.get_or_insert(var.frame_id());
            if !offending.contains(var.name_arc()) {
                offending.push(var.name_arc().clone());
            }
        }
    }
    match found {
        None => Ok(()),
        Some(found) => Err(ProvenanceError {
            anchor: anchor.cloned().unwrap_or_else(|| Arc::from("?")),
            expected,
            offending,
            found,
        }),
    }
}

impl BitAnd for Condition<'_> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.merge(rhs, Predicate::and)
    }
}

impl<'f> BitAnd<&Condition<'f>> for &Condition<'f> {
    type Output = Condition<'f>;

    fn bitand(self, rhs: &Condition<'f>) -> Condition<'f> {
        self.clone() & rhs.clone()
    }
}

impl BitOr for Condition<'_> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.merge(rhs, Predicate::or)
    }
}

impl<'f> BitOr<&Condition<'f>> for &Condition<'f> {
    type Output = Condition<'f>;

    fn bitor(self, rhs: &Condition<'f>) -> Condition<'f> {
        self.clone() | rhs.clone()
    }
}

impl Not for Condition<'_> {
    type Output = Self;

    fn not(self) -> Self {
        Self {
            predicate: self.predicate.negate(),
            ..self
        }
    }
}

impl<'f> Not for &Condition<'f> {
    type Output = Condition<'f>;

    fn not(self) -> Condition<'f> {
        !self.clone()
    }
}

impl fmt::Display for Condition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.predicate)
    }
}

/// Things that can be used as a list of conditions: a single [`Condition`], an array, a slice
/// or a `Vec` of them.
pub trait IntoConditions<'f> {
    /// Converts into an owned list.
    fn into_conditions(self) -> Vec<Condition<'f>>;
}

impl<'f> IntoConditions<'f> for Condition<'f> {
    fn into_conditions(self) -> Vec<Condition<'f>> {
        alloc::vec![self]
    }
}

impl<'f> IntoConditions<'f> for &Condition<'f> {
    fn into_conditions(self) -> Vec<Condition<'f>> {
        alloc::vec![self.clone()]
    }
}

impl<'f> IntoConditions<'f> for &[Condition<'f>] {
    fn into_conditions(self) -> Vec<Condition<'f>> {
        self.to_vec()
    }
}

impl<'f, const N: usize> IntoConditions<'f> for [Condition<'f>; N] {
    fn into_conditions(self) -> Vec<Condition<'f>> {
        self.into()
    }
}

impl<'f, const N: usize> IntoConditions<'f> for &[Condition<'f>; N] {
    fn into_conditions(self) -> Vec<Condition<'f>> {
        self.to_vec()
    }
}

impl<'f> IntoConditions<'f> for Vec<Condition<'f>> {
    fn into_conditions(self) -> Vec<Condition<'f>> {
        self
    }
}
