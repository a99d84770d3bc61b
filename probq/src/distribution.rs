// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Empirical distributions.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use probq_frame::{Column, ColumnFrame, CompareOp, DType, Outcome, Predicate, Value};

use crate::condition::IntoConditions;
use crate::query::{IntoVariables, check_scope, ratio, select};
use crate::variable::Source;
use crate::{Condition, Error, UsageError, Variable};

/// Default tolerance for [`Distribution::approx_eq`].
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Rows printed by `Display` before the rest is summarised.
const DISPLAY_ROWS: usize = 10;

/// One outcome of a [`Distribution`].
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// The values of the queried variables.
    pub outcome: Outcome,
    /// Number of rows with this outcome.
    pub count: u64,
    /// `count / total`.
    pub probability: f64,
}

/// The empirical distribution of one or more variables, possibly conditioned.
///
/// Entries are sorted by outcome. Probabilities sum to one, except for a *degenerate*
/// distribution: one conditioned on an event no row satisfies, which has no outcomes.
#[derive(Debug, Clone)]
pub struct Distribution<'f> {
    variables: Vec<Variable<'f>>,
    conditions: Vec<Condition<'f>>,
    entries: Vec<Entry>,
    total: u64,
}

impl<'f> Distribution<'f> {
    pub(crate) fn compute(
        variables: Vec<Variable<'f>>,
        conditions: Vec<Condition<'f>>,
    ) -> Result<Self, Error> {
        let Some(first) = variables.first() else {
            return Err(UsageError::EmptyQuery.into());
        };
        let source = first.source;
        check_scope(source.id, Some(first.name_arc()), &variables, &conditions)?;

        let selection = select(source, &conditions)?;
        let columns: Vec<Arc<str>> = variables.iter().map(|v| v.name_arc().clone()).collect();
        let counts = source.frame.group_count(&columns, selection.as_ref())?;
        let total = counts.total();
        let entries = counts
            .into_groups()
            .into_iter()
            .map(|(outcome, count)| Entry {
                outcome,
                count,
                probability: ratio(count, total),
            })
            .collect::<Vec<_>>();
        tracing::debug!(
            frame = %source.id,
            backend = source.frame.backend(),
            variables = %Names(&variables),
            conditions = conditions.len(),
            outcomes = entries.len(),
            total,
            "distribution"
        );
        Ok(Self {
            variables,
            conditions,
            entries,
            total,
        })
    }

    fn source(&self) -> Option<Source<'f>> {
        self.variables.first().map(|v| v.source)
    }

    /// Restricts to the rows satisfying `conditions` (and all earlier ones) and recomputes.
    ///
    /// If no row satisfies them the result is [degenerate](Self::is_degenerate).
    pub fn given(&self, conditions: impl IntoConditions<'f>) -> Result<Self, Error> {
        let added = conditions.into_conditions();
        if added.is_empty() {
            return Err(UsageError::EmptyGiven.into());
        }
        let mut all = self.conditions.clone();
        all.extend(added);
        Self::compute(self.variables.clone(), all)
    }

    /// The distribution of these variables for every observed value of `given`.
    ///
    /// This is `P(self | given)`: one distribution per distinct value (or value tuple) of the
    /// `given` variables among the rows this distribution covers.
    pub fn given_each(
        &self,
        given: impl IntoVariables<'f>,
    ) -> Result<ConditionalDistribution<'f>, Error> {
        let given = given.into_variables();
        let Some(source) = self.source() else {
            return Err(UsageError::EmptyQuery.into());
        };
        if given.is_empty() {
            return Err(UsageError::EmptyGivenEach.into());
        }
        check_scope(
            source.id,
            self.variables.first().map(Variable::name_arc),
            &given,
            &[],
        )?;

        let selection = select(source, &self.conditions)?;
        let columns: Vec<Arc<str>> = given
            .iter()
            .chain(&self.variables)
            .map(|v| v.name_arc().clone())
            .collect();
        let counts = source.frame.group_count(&columns, selection.as_ref())?;

        // Groups are sorted, so rows sharing a `given` prefix are adjacent.
        let split = given.len();
        let mut parts: Vec<(Outcome, Self)> = Vec::new();
        for (outcome, count) in counts.into_groups() {
            let values = outcome.values();
            let key = Outcome::new(values.get(..split).unwrap_or_default().iter().cloned());
            let rest = Outcome::new(values.get(split..).unwrap_or_default().iter().cloned());
            let entry = Entry {
                outcome: rest,
                count,
                probability: 0.0,
            };
            match parts.last_mut() {
                Some((last, dist)) if *last == key => dist.entries.push(entry),
                _ => {
                    let mut conditions = self.conditions.clone();
                    conditions.extend(
                        given
                            .iter()
                            .zip(key.values())
                            .map(|(var, value)| value_condition(var, value)),
                    );
                    let dist = Self {
                        variables: self.variables.clone(),
                        conditions,
                        entries: alloc::vec![entry],
                        total: 0,
                    };
                    parts.push((key, dist));
                }
            }
        }
        for (_, dist) in &mut parts {
            dist.total = dist.entries.iter().map(|e| e.count).sum();
            for e in &mut dist.entries {
                e.probability = ratio(e.count, dist.total);
            }
        }
        tracing::debug!(
            frame = %source.id,
            variables = %Names(&self.variables),
            given = %Names(&given),
            parts = parts.len(),
            "conditional distribution"
        );
        Ok(ConditionalDistribution {
            target: self.variables.clone(),
            given,
            parts,
        })
    }

    /// The probability of `outcome`, or `None` if it was not observed.
    ///
    /// A single variable's outcome can be given as a plain value, several variables' as a
    /// tuple.
    pub fn get(&self, outcome: impl Into<Outcome>) -> Option<f64> {
        self.entry(outcome).map(|e| e.probability)
    }

    /// The entry for `outcome`, or `None` if it was not observed.
    ///
    /// Numeric keys are matched by value, so `get(2)` finds `2.0` in a float column.
    pub fn entry(&self, outcome: impl Into<Outcome>) -> Option<&Entry> {
        let outcome = lookup_key(&self.variables, outcome.into());
        self.entries
            .binary_search_by(|e| e.outcome.cmp(&outcome))
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    /// `(outcome, probability)` pairs in outcome order.
    pub fn iter(&self) -> impl Iterator<Item = (&Outcome, f64)> + '_ {
        self.entries.iter().map(|e| (&e.outcome, e.probability))
    }

    /// All entries in outcome order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of observed outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no outcomes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if no row satisfied the conditions.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.total == 0
    }

    /// The queried variables.
    #[must_use]
    pub fn variables(&self) -> &[Variable<'f>] {
        &self.variables
    }

    /// The accumulated conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Condition<'f>] {
        &self.conditions
    }

    /// Number of rows the distribution was computed over.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// The probability of the only outcome.
    ///
    /// Fails with [`UsageError::NotScalar`] unless there is exactly one outcome.
    pub fn to_f64(&self) -> Result<f64, Error> {
        match self.entries.as_slice() {
            [only] => Ok(only.probability),
            entries => Err(UsageError::NotScalar {
                outcomes: entries.len(),
            }
            .into()),
        }
    }

    /// Returns `true` if both have the same outcomes with probabilities within `tolerance`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().zip(&other.entries).all(|(a, b)| {
                let d = a.probability - b.probability;
                a.outcome == b.outcome && d <= tolerance && -d <= tolerance
            })
    }

    /// The distribution as a table: one column per variable, then `count` and `probability`.
    pub fn to_frame(&self) -> Result<ColumnFrame, Error> {
        let mut frame = ColumnFrame::new();
        for (i, var) in self.variables.iter().enumerate() {
            let cells: Vec<Value> = self
                .entries
                .iter()
                .map(|e| e.outcome.values().get(i).cloned().unwrap_or(Value::Null))
                .collect();
            frame.push_column(var.name_arc().clone(), column_of(var.dtype(), &cells))?;
        }
        frame.push_column(
            "count",
            self.entries
                .iter()
                .map(|e| Some(i64::try_from(e.count).unwrap_or(i64::MAX)))
                .collect::<Vec<_>>(),
        )?;
        frame.push_column(
            "probability",
            self.entries
                .iter()
                .map(|e| e.probability)
                .collect::<Vec<_>>(),
        )?;
        Ok(frame)
    }
}

impl TryFrom<&Distribution<'_>> for f64 {
    type Error = Error;

    fn try_from(dist: &Distribution<'_>) -> Result<Self, Error> {
        dist.to_f64()
    }
}

impl fmt::Display for Distribution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Distribution over {}", Names(&self.variables))?;
        if !self.conditions.is_empty() {
            write!(f, " given ")?;
            for (i, c) in self.conditions.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{c}")?;
            }
        }
        f.write_str(":")?;
        if self.entries.is_empty() {
            return f.write_str("\n  (no outcomes)");
        }
        for e in self.entries.iter().take(DISPLAY_ROWS) {
            write!(f, "\n  {}: {:.6}", e.outcome, e.probability)?;
        }
        if self.entries.len() > DISPLAY_ROWS {
            write!(f, "\n  ... and {} more", self.entries.len() - DISPLAY_ROWS)?;
        }
        Ok(())
    }
}

/// A distribution per observed value of the conditioning variables.
///
/// Returned by [`Distribution::given_each`].
#[derive(Debug, Clone)]
pub struct ConditionalDistribution<'f> {
    target: Vec<Variable<'f>>,
    given: Vec<Variable<'f>>,
    parts: Vec<(Outcome, Distribution<'f>)>,
}

impl<'f> ConditionalDistribution<'f> {
    /// The distribution for one value (or value tuple) of the conditioning variables.
    pub fn get(&self, given: impl Into<Outcome>) -> Option<&Distribution<'f>> {
        let given = lookup_key(&self.given, given.into());
        self.parts
            .binary_search_by(|(k, _)| k.cmp(&given))
            .ok()
            .and_then(|i| self.parts.get(i))
            .map(|(_, d)| d)
    }

    /// `(conditioning value, distribution)` pairs in value order.
    pub fn iter(&self) -> impl Iterator<Item = (&Outcome, &Distribution<'f>)> + '_ {
        self.parts.iter().map(|(k, d)| (k, d))
    }

    /// Number of observed conditioning values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` if no conditioning value was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The variables whose distribution is given.
    #[must_use]
    pub fn target(&self) -> &[Variable<'f>] {
        &self.target
    }

    /// The conditioning variables.
    #[must_use]
    pub fn given(&self) -> &[Variable<'f>] {
        &self.given
    }
}

impl fmt::Display for ConditionalDistribution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Conditional distribution of {} given {}:",
            Names(&self.target),
            Names(&self.given)
        )?;
        for (key, dist) in &self.parts {
            write!(f, "\n  {} = {key}:", Names(&self.given))?;
            for e in dist.entries.iter().take(DISPLAY_ROWS) {
                write!(f, "\n    {}: {:.6}", e.outcome, e.probability)?;
            }
            if dist.entries.len() > DISPLAY_ROWS {
                write!(f, "\n    ... and {} more", dist.entries.len() - DISPLAY_ROWS)?;
            }
        }
        Ok(())
    }
}

/// `outcome` with each component in the representation its variable's column stores.
fn lookup_key(variables: &[Variable<'_>], outcome: Outcome) -> Outcome {
    Outcome::new(
        outcome
            .values()
            .iter()
            .enumerate()
            .map(|(i, v)| match variables.get(i) {
                Some(var) => v.clone().coerce_to(var.dtype()),
                None => v.clone(),
            }),
    )
}

/// `var == value`, or `var is null` for a missing value.
fn value_condition<'f>(var: &Variable<'f>, value: &Value) -> Condition<'f> {
    if value.is_null() {
        var.is_null()
    } else {
        Condition::leaf(
            var,
            Predicate::compare(var.name_arc().clone(), CompareOp::Eq, value.clone()),
        )
    }
}

/// Rebuilds a typed column from group keys.
fn column_of(dtype: DType, cells: &[Value]) -> Column {
    match dtype {
        DType::Boolean => Column::Boolean(
            cells
                .iter()
                .map(|v| match v {
                    Value::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect(),
        ),
        DType::Int64 => Column::Int64(
            cells
                .iter()
                .map(|v| match v {
                    Value::Int(i) => Some(*i),
                    _ => None,
                })
                .collect(),
        ),
        DType::Float64 => Column::Float64(cells.iter().map(Value::as_f64).collect()),
        DType::Utf8 => Column::Utf8(
            cells
                .iter()
                .map(|v| match v {
                    Value::Str(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
        ),
        DType::Categorical => Column::categorical(cells.iter().map(|v| match v {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        })),
        DType::Datetime => Column::Datetime(
            cells
                .iter()
                .map(|v| match v {
                    Value::Datetime(t) => Some(*t),
                    _ => None,
                })
                .collect(),
        ),
    }
}

/// Displays variable names separated by commas.
struct Names<'a, 'f>(&'a [Variable<'f>]);

impl fmt::Display for Names<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(v.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::string::ToString;
    use alloc::vec;

    use probq_frame::Frame;

    use super::*;
    use crate::{VariableBuilder, p};

    fn frame() -> ColumnFrame {
        ColumnFrame::new()
            .with_column("age", vec![25_i64, 30, 25])
            .unwrap()
            .with_column("purchased", vec![true, true, false])
            .unwrap()
            .with_column(
                "color",
                Column::categorical([Some("red"), Some("blue"), None]),
            )
            .unwrap()
    }

    #[test]
    fn marginal_matches_relative_frequencies() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let age = vb.variable("age").unwrap();
        let dist = p(&age).unwrap();
        assert_eq!(dist.get(25), Some(2.0 / 3.0));
        assert_eq!(dist.get(30), Some(1.0 / 3.0));
        assert_eq!(dist.get(40), None);
        assert_eq!(dist.total(), 3);
        let sum: f64 = dist.iter().map(|(_, p)| p).sum();
        assert!((sum - 1.0).abs() < DEFAULT_TOLERANCE);
    }

    #[test]
    fn missing_values_are_an_outcome() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let color = vb.variable("color").unwrap();
        let dist = p(&color).unwrap();
        assert_eq!(dist.get(Value::Null), Some(1.0 / 3.0));
        assert_eq!(dist.get("red"), Some(1.0 / 3.0));
    }

    #[test]
    fn given_restricts_and_accumulates() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let age = vb.variable("age").unwrap();
        let purchased = vb.variable("purchased").unwrap();

        let dist = p(&age).unwrap().given(purchased.eq(true).unwrap()).unwrap();
        assert_eq!(dist.get(25), Some(0.5));
        assert_eq!(dist.total(), 2);

        let narrower = dist.given(age.lt(30).unwrap()).unwrap();
        assert_eq!(narrower.conditions().len(), 2);
        assert_eq!(narrower.to_f64().unwrap(), 1.0);
    }

    #[test]
    fn empty_conditioning_subset_is_degenerate() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let age = vb.variable("age").unwrap();
        let dist = p(&age).unwrap().given(age.gt(100).unwrap()).unwrap();
        assert!(dist.is_degenerate());
        assert!(dist.is_empty());
        assert_eq!(dist.get(25), None);
        assert!(dist.to_string().ends_with("(no outcomes)"));
    }

    #[test]
    fn given_requires_conditions() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let age = vb.variable("age").unwrap();
        let none: Vec<Condition<'_>> = Vec::new();
        assert_eq!(
            p(&age).unwrap().given(none).unwrap_err(),
            Error::Usage(UsageError::EmptyGiven)
        );
    }

    #[test]
    fn scalar_conversion_needs_one_outcome() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let age = vb.variable("age").unwrap();
        let dist = p(&age).unwrap();
        assert_eq!(
            f64::try_from(&dist).unwrap_err(),
            Error::Usage(UsageError::NotScalar { outcomes: 2 })
        );
    }

    #[test]
    fn given_each_splits_by_conditioning_value() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let age = vb.variable("age").unwrap();
        let purchased = vb.variable("purchased").unwrap();

        let cond = p(&purchased).unwrap().given_each(&age).unwrap();
        assert_eq!(cond.len(), 2);
        let at_25 = cond.get(25).unwrap();
        assert_eq!(at_25.get(true), Some(0.5));
        assert_eq!(at_25.get(false), Some(0.5));
        assert_eq!(cond.get(30).unwrap().get(true), Some(1.0));

        // Each part agrees with an explicit `given`.
        let explicit = p(&purchased).unwrap().given(age.eq(25).unwrap()).unwrap();
        assert!(at_25.approx_eq(&explicit, DEFAULT_TOLERANCE));
        assert_eq!(at_25.conditions().len(), 1);
    }

    #[test]
    fn to_frame_has_counts_and_probabilities() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let vars = vb.get_variables(&["age", "purchased"]).unwrap();
        let table = p(&vars).unwrap().to_frame().unwrap();
        let names: Vec<&str> = table.schema().names().map(|n| &**n).collect();
        assert_eq!(names, vec!["age", "purchased", "count", "probability"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.value(0, "age"), Some(Value::Int(25)));
        assert_eq!(table.value(0, "purchased"), Some(Value::Boolean(false)));
        assert_eq!(table.value(0, "count"), Some(Value::Int(1)));
    }

    #[test]
    fn numeric_lookups_match_across_int_and_float() {
        let f = ColumnFrame::new()
            .with_column("f", vec![1.0, 2.0, 2.0])
            .unwrap()
            .with_column("i", vec![1_i64, 2, 2])
            .unwrap();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let fv = vb.variable("f").unwrap();
        let iv = vb.variable("i").unwrap();

        assert_eq!(p(&fv).unwrap().get(2), Some(2.0 / 3.0));
        assert_eq!(p(&iv).unwrap().get(2.0), Some(2.0 / 3.0));
        assert_eq!(p(&iv).unwrap().get(2.5), None);
        assert_eq!(p((&fv, &iv)).unwrap().get((1, 1.0)), Some(1.0 / 3.0));
        assert_eq!(
            p(fv.eq(2).unwrap()).unwrap().value(),
            p(&fv).unwrap().get(2).unwrap()
        );

        let cond = p(&fv).unwrap().given_each(&iv).unwrap();
        assert_eq!(cond.get(2.0).unwrap().get(2), Some(1.0));
    }

    #[test]
    fn signed_zero_parts_stay_consistent_when_conditioned_again() {
        let f = ColumnFrame::new()
            .with_column("x", vec![0.0, -0.0, 1.0])
            .unwrap()
            .with_column("y", vec![true, false, true])
            .unwrap();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let x = vb.variable("x").unwrap();
        let y = vb.variable("y").unwrap();

        assert_eq!(p(&x).unwrap().get(0.0), Some(2.0 / 3.0));
        assert_eq!(p(x.eq(0.0).unwrap()).unwrap().value(), 2.0 / 3.0);

        let cond = p(&y).unwrap().given_each(&x).unwrap();
        let zero = cond.get(0.0).unwrap();
        assert_eq!(zero.total(), 2);
        let again = zero.given(x.le(5).unwrap()).unwrap();
        assert_eq!(again.total(), 2);
        assert!(again.approx_eq(zero, DEFAULT_TOLERANCE));
    }

    #[test]
    fn display_summarises_long_distributions() {
        let f = ColumnFrame::new()
            .with_column("n", (0_i64..12).collect::<Vec<_>>())
            .unwrap()
            .with_column("g", (0_i64..12).map(|n| n % 2).collect::<Vec<_>>())
            .unwrap();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let n = vb.variable("n").unwrap();
        let g = vb.variable("g").unwrap();

        let text = p(&n).unwrap().to_string();
        assert_eq!(text.lines().count(), 1 + DISPLAY_ROWS + 1);
        assert!(text.ends_with("\n  ... and 2 more"));

        let text = p(&n).unwrap().given_each(&g).unwrap().to_string();
        assert_eq!(text.matches("... and").count(), 0);
        let wide = ColumnFrame::new()
            .with_column("n", (0_i64..24).collect::<Vec<_>>())
            .unwrap()
            .with_column("g", (0_i64..24).map(|n| n % 2).collect::<Vec<_>>())
            .unwrap();
        let vb = VariableBuilder::from_data(&wide).unwrap();
        let n = vb.variable("n").unwrap();
        let g = vb.variable("g").unwrap();
        let text = p(&n).unwrap().given_each(&g).unwrap().to_string();
        assert_eq!(text.matches("\n    ... and 2 more").count(), 2);
        assert!(text.starts_with("Conditional distribution of n given g:\n  g = 0:"));
    }

    #[test]
    fn display_lists_outcomes() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let age = vb.variable("age").unwrap();
        assert_eq!(
            p(&age).unwrap().to_string(),
            "Distribution over age:\n  25: 0.666667\n  30: 0.333333"
        );
    }
}
