// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scalar probabilities of events.

extern crate alloc;

use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;

use crate::condition::{IntoConditions, check};
use crate::query::{conjunction, ratio, select};
use crate::{Condition, DataError, Error, UsageError, Variable};

/// The probability that an event holds, possibly conditioned.
#[derive(Debug, Clone)]
pub struct Probability<'f> {
    value: f64,
    numerator: u64,
    denominator: u64,
    event: Vec<Condition<'f>>,
    conditions: Vec<Condition<'f>>,
}

impl<'f> Probability<'f> {
    pub(crate) fn compute(
        event: Vec<Condition<'f>>,
        conditions: Vec<Condition<'f>>,
    ) -> Result<Self, Error> {
        let Some(first) = event.first() else {
            return Err(UsageError::EmptyQuery.into());
        };
        let source = first.source();
        check(
            source.id,
            first.variables().first().map(Variable::name_arc),
            event
                .iter()
                .chain(&conditions)
                .flat_map(Condition::variables),
        )?;

        let given = select(source, &conditions)?;
        let denominator = source.frame.count(given.as_ref()) as u64;
        if denominator == 0 {
            return Err(match conjunction(&conditions) {
                Some(predicate) => DataError::ZeroProbability {
                    condition: predicate.to_string(),
                },
                None => DataError::EmptyFrame,
            }
            .into());
        }
        let hits = select(source, &event)?;
        let matched = match (hits, &given) {
            (Some(hits), Some(given)) => hits.intersect(given)?.count(),
            (Some(hits), None) => hits.count(),
            (None, _) => 0,
        };
        let numerator = matched as u64;
        let value = ratio(numerator, denominator);
        tracing::debug!(
            frame = %source.id,
            backend = source.frame.backend(),
            events = event.len(),
            conditions = conditions.len(),
            numerator,
            denominator,
            value,
            "probability"
        );
        Ok(Self {
            value,
            numerator,
            denominator,
            event,
            conditions,
        })
    }

    /// Restricts to the rows satisfying `conditions` (and all earlier ones) and recomputes.
    ///
    /// Fails with [`DataError::ZeroProbability`] if no row satisfies them.
    pub fn given(&self, conditions: impl IntoConditions<'f>) -> Result<Self, Error> {
        let added = conditions.into_conditions();
        if added.is_empty() {
            return Err(UsageError::EmptyGiven.into());
        }
        let mut all = self.conditions.clone();
        all.extend(added);
        Self::compute(self.event.clone(), all)
    }

    /// The probability, in `[0, 1]`.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Rows satisfying the event and all conditions.
    #[must_use]
    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    /// Rows satisfying all conditions (all rows if there are none).
    #[must_use]
    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    /// The event conditions.
    #[must_use]
    pub fn event(&self) -> &[Condition<'f>] {
        &self.event
    }

    /// The accumulated conditioning conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Condition<'f>] {
        &self.conditions
    }

    /// Returns `true` if the value is within `tolerance` of `other`.
    #[must_use]
    pub fn approx_eq(&self, other: f64, tolerance: f64) -> bool {
        let d = self.value - other;
        d <= tolerance && -d <= tolerance
    }
}

impl From<Probability<'_>> for f64 {
    fn from(p: Probability<'_>) -> Self {
        p.value
    }
}

impl From<&Probability<'_>> for f64 {
    fn from(p: &Probability<'_>) -> Self {
        p.value
    }
}

impl fmt::Display for Probability<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.value)
    }
}
