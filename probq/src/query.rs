// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `p(...)` entry point and the plumbing shared by query results.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;

use probq_frame::{Predicate, Selection};

use crate::condition::{IntoConditions, check};
use crate::variable::Source;
use crate::{Condition, Distribution, Error, FrameId, Probability, ProvenanceError, Variable};

/// Computes a probability.
///
/// The kind of result follows from the argument:
/// - one or more [`Variable`]s give the empirical [`Distribution`] of their values,
/// - one or more [`Condition`]s give the scalar [`Probability`] that all of them hold.
///
/// Every argument must come from the same [`VariableBuilder`](crate::VariableBuilder),
/// otherwise a [`ProvenanceError`] is returned before anything is computed.
///
/// ```
/// use probq::{p, ColumnFrame, VariableBuilder};
///
/// let df = ColumnFrame::new()
///     .with_column("age", vec![25_i64, 30, 25])?
///     .with_column("purchased", vec![true, true, false])?;
/// let vb = VariableBuilder::from_data(&df)?;
/// let age = vb.variable("age")?;
/// let purchased = vb.variable("purchased")?;
///
/// let dist = p(&age)?;
/// assert_eq!(dist.get(25), Some(2.0 / 3.0));
///
/// let bought = p(purchased.eq(true)?)?;
/// assert_eq!(bought.value(), 2.0 / 3.0);
///
/// let joint = p((&age, &purchased))?;
/// assert_eq!(joint.get((25, false)), Some(1.0 / 3.0));
/// # Ok::<(), Box<dyn core::error::Error>>(())
/// ```
pub fn p<'f, Q: IntoQuery<'f>>(query: Q) -> Result<Q::Output, Error> {
    query.into_query()
}

/// Arguments accepted by [`p`].
pub trait IntoQuery<'f> {
    /// [`Distribution`] for variables, [`Probability`] for conditions.
    type Output;

    /// Runs the query.
    fn into_query(self) -> Result<Self::Output, Error>;
}

/// Things that can be used as a list of variables: a single [`Variable`], a slice, an array,
/// a `Vec` or a tuple of references.
pub trait IntoVariables<'f> {
    /// Converts into an owned list.
    fn into_variables(self) -> Vec<Variable<'f>>;
}

impl<'f> IntoVariables<'f> for Variable<'f> {
    fn into_variables(self) -> Vec<Variable<'f>> {
        alloc::vec![self]
    }
}

impl<'f> IntoVariables<'f> for &Variable<'f> {
    fn into_variables(self) -> Vec<Variable<'f>> {
        alloc::vec![self.clone()]
    }
}

impl<'f> IntoVariables<'f> for &[Variable<'f>] {
    fn into_variables(self) -> Vec<Variable<'f>> {
        self.to_vec()
    }
}

impl<'f, const N: usize> IntoVariables<'f> for &[Variable<'f>; N] {
    fn into_variables(self) -> Vec<Variable<'f>> {
        self.to_vec()
    }
}

impl<'f> IntoVariables<'f> for &Vec<Variable<'f>> {
    fn into_variables(self) -> Vec<Variable<'f>> {
        self.clone()
    }
}

impl<'f> IntoVariables<'f> for Vec<Variable<'f>> {
    fn into_variables(self) -> Vec<Variable<'f>> {
        self
    }
}

impl<'f> IntoVariables<'f> for (&Variable<'f>, &Variable<'f>) {
    fn into_variables(self) -> Vec<Variable<'f>> {
        alloc::vec![self.0.clone(), self.1.clone()]
    }
}

impl<'f> IntoVariables<'f> for (&Variable<'f>, &Variable<'f>, &Variable<'f>) {
    fn into_variables(self) -> Vec<Variable<'f>> {
        alloc::vec![self.0.clone(), self.1.clone(), self.2.clone()]
    }
}

macro_rules! variable_query {
    ($([$($generics:tt)*] $ty:ty),* $(,)?) => {
        $(
            impl<$($generics)*> IntoQuery<'f> for $ty {
                type Output = Distribution<'f>;

                fn into_query(self) -> Result<Distribution<'f>, Error> {
                    Distribution::compute(self.into_variables(), Vec::new())
                }
            }
        )*
    };
}

variable_query!(
    ['f] Variable<'f>,
    ['f] &Variable<'f>,
    ['f] &[Variable<'f>],
    ['f, const N: usize] &[Variable<'f>; N],
    ['f] &Vec<Variable<'f>>,
    ['f] Vec<Variable<'f>>,
    ['f] (&Variable<'f>, &Variable<'f>),
    ['f] (&Variable<'f>, &Variable<'f>, &Variable<'f>),
);

macro_rules! condition_query {
    ($([$($generics:tt)*] $ty:ty),* $(,)?) => {
        $(
            impl<$($generics)*> IntoQuery<'f> for $ty {
                type Output = Probability<'f>;

                fn into_query(self) -> Result<Probability<'f>, Error> {
                    Probability::compute(self.into_conditions(), Vec::new())
                }
            }
        )*
    };
}

condition_query!(
    ['f] Condition<'f>,
    ['f] &Condition<'f>,
    ['f] &[Condition<'f>],
    ['f, const N: usize] [Condition<'f>; N],
    ['f, const N: usize] &[Condition<'f>; N],
    ['f] Vec<Condition<'f>>,
);

/// Checks that all variables and the variables read by all conditions are bound to
/// `expected`.
pub(crate) fn check_scope<'f>(
    expected: FrameId,
    anchor: Option<&Arc<str>>,
    variables: &[Variable<'f>],
    conditions: &[Condition<'f>],
) -> Result<(), ProvenanceError> {
    check(
        expected,
        anchor,
        variables
            .iter()
            .chain(conditions.iter().flat_map(Condition::variables)),
    )
}

/// The conjunction of all conditions, or `None` if there are none.
pub(crate) fn conjunction(conditions: &[Condition<'_>]) -> Option<Predicate> {
    Predicate::all(conditions.iter().map(|c| c.predicate().clone()))
}

/// Rows satisfying every condition, or `None` (all rows) if there are none.
pub(crate) fn select(
    source: Source<'_>,
    conditions: &[Condition<'_>],
) -> Result<Option<Selection>, Error> {
    let Some(predicate) = conjunction(conditions) else {
        return Ok(None);
    };
    let selection = source.frame.filter(&predicate)?;
    tracing::trace!(
        frame = %source.id,
        %predicate,
        selected = selection.count(),
        "selected rows"
    );
    Ok(Some(selection))
}

/// `count / total`, or `0.0` when `total` is zero.
#[allow(clippy::cast_precision_loss, reason = "counts are far below 2^53")]
pub(crate) fn ratio(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::vec;

    use probq_frame::ColumnFrame;

    use super::*;
    use crate::{UsageError, VariableBuilder};

    fn frame() -> ColumnFrame {
        ColumnFrame::new()
            .with_column("x", vec![1_i64, 2, 2, 3])
            .unwrap()
            .with_column("y", vec![true, false, true, true])
            .unwrap()
    }

    #[test]
    fn empty_queries_are_usage_errors() {
        let no_vars: &[Variable<'_>] = &[];
        assert_eq!(p(no_vars).unwrap_err(), Error::Usage(UsageError::EmptyQuery));
        let no_conds: Vec<Condition<'_>> = Vec::new();
        assert_eq!(p(no_conds).unwrap_err(), Error::Usage(UsageError::EmptyQuery));
    }

    #[test]
    fn argument_shape_selects_result_kind() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let vars = vb.get_variables(&["x", "y"]).unwrap();
        let (x, y) = (&vars[0], &vars[1]);

        let marginal: Distribution<'_> = p(x).unwrap();
        assert_eq!(marginal.len(), 3);
        let joint: Distribution<'_> = p(&vars).unwrap();
        assert_eq!(joint.len(), 4);
        assert_eq!(p((x, y)).unwrap().len(), 4);
        assert_eq!(p(&[y.clone()]).unwrap().len(), 2);

        let scalar: Probability<'_> = p(x.eq(2).unwrap()).unwrap();
        assert_eq!(scalar.value(), 0.5);
        let both = p([x.eq(2).unwrap(), y.eq(true).unwrap()]).unwrap();
        assert_eq!(both.value(), 0.25);
    }

    #[test]
    fn mixed_frames_fail_before_computing() {
        let f = frame();
        let g = frame();
        let x = VariableBuilder::from_data(&f).unwrap().variable("x").unwrap();
        let y = VariableBuilder::from_data(&g).unwrap().variable("y").unwrap();

        assert!(matches!(p((&x, &y)), Err(Error::Provenance(_))));
        assert!(matches!(
            p([x.eq(1).unwrap(), y.eq(true).unwrap()]),
            Err(Error::Provenance(_))
        ));
        assert!(matches!(
            p(x.eq(1).unwrap() & y.eq(true).unwrap()),
            Err(Error::Provenance(_))
        ));
    }

    #[test]
    fn ratio_of_zero_total_is_zero() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(1, 4), 0.25);
    }
}
