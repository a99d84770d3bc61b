// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Variables and the builder that binds them to a frame.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use probq_frame::{CompareOp, DType, Frame, Predicate, Value};

use crate::{Condition, DataError, Error, ExpressionError, VariableError};

static NEXT_FRAME_ID: AtomicUsize = AtomicUsize::new(1);

/// Identity of a frame binding.
///
/// Every [`VariableBuilder::from_data`] call mints a fresh id, so two builders over the same
/// frame are distinct identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(usize);

impl FrameId {
    fn next() -> Self {
        Self(NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id.
    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame #{}", self.0)
    }
}

/// A bound frame: its identity plus a borrow of the data.
#[derive(Clone, Copy)]
pub(crate) struct Source<'f> {
    pub(crate) id: FrameId,
    pub(crate) frame: &'f dyn Frame,
}

impl fmt::Debug for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id)
            .field("backend", &self.frame.backend())
            .finish_non_exhaustive()
    }
}

/// Creates [`Variable`]s for the columns of one frame.
#[derive(Debug, Clone)]
pub struct VariableBuilder<'f> {
    source: Source<'f>,
}

impl<'f> VariableBuilder<'f> {
    /// Binds to `frame`.
    ///
    /// The frame is borrowed, not copied. Fails with [`DataError`] if it has no rows or no
    /// columns.
    pub fn from_data(frame: &'f dyn Frame) -> Result<Self, Error> {
        if frame.schema().is_empty() {
            return Err(DataError::NoColumns.into());
        }
        if frame.row_count() == 0 {
            return Err(DataError::EmptyFrame.into());
        }
        let id = FrameId::next();
        tracing::debug!(
            %id,
            backend = frame.backend(),
            rows = frame.row_count(),
            columns = frame.schema().len(),
            "bound frame"
        );
        Ok(Self {
            source: Source { id, frame },
        })
    }

    /// The identity shared by every variable this builder creates.
    #[must_use]
    pub fn frame_id(&self) -> FrameId {
        self.source.id
    }

    /// The bound frame.
    #[must_use]
    pub fn frame(&self) -> &'f dyn Frame {
        self.source.frame
    }

    /// Returns one variable per name, in order.
    ///
    /// An empty list returns every column in schema order. Fails with [`VariableError`]
    /// naming every missing column.
    pub fn get_variables<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Variable<'f>>, Error> {
        if names.is_empty() {
            return Ok(self.variables());
        }
        let schema = self.source.frame.schema();
        let mut out = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match schema.field(name.as_ref()) {
                Some(field) => out.push(Variable {
                    name: field.name.clone(),
                    dtype: field.dtype,
                    source: self.source,
                }),
                None => missing.push(Arc::from(name.as_ref())),
            }
        }
        if !missing.is_empty() {
            return Err(VariableError {
                missing,
                available: schema.names().cloned().collect(),
            }
            .into());
        }
        Ok(out)
    }

    /// Returns every column as a variable, in schema order.
    #[must_use]
    pub fn variables(&self) -> Vec<Variable<'f>> {
        self.source
            .frame
            .schema()
            .fields()
            .iter()
            .map(|field| Variable {
                name: field.name.clone(),
                dtype: field.dtype,
                source: self.source,
            })
            .collect()
    }

    /// Returns the variable for one column.
    pub fn variable(&self, name: &str) -> Result<Variable<'f>, Error> {
        let mut vars = self.get_variables(&[name])?;
        vars.pop().ok_or_else(|| {
            VariableError {
                missing: alloc::vec![Arc::from(name)],
                available: self.source.frame.schema().names().cloned().collect(),
            }
            .into()
        })
    }
}

/// A named, typed handle to one column of a bound frame.
///
/// Comparison methods build [`Condition`]s; nothing is evaluated until a query runs.
#[derive(Debug, Clone)]
pub struct Variable<'f> {
    name: Arc<str>,
    dtype: DType,
    pub(crate) source: Source<'f>,
}

impl<'f> Variable<'f> {
    /// The column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// The column type.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// The identity of the frame this variable is bound to.
    #[must_use]
    pub fn frame_id(&self) -> FrameId {
        self.source.id
    }

    /// Returns `true` if both handles refer to the same column of the same binding.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.source.id == other.source.id && self.name == other.name
    }

    /// `self == value`.
    pub fn eq(&self, value: impl Into<Value>) -> Result<Condition<'f>, Error> {
        self.compare(CompareOp::Eq, value.into())
    }

    /// `self != value`.
    ///
    /// Missing cells satisfy neither `eq` nor `ne`.
    pub fn ne(&self, value: impl Into<Value>) -> Result<Condition<'f>, Error> {
        self.compare(CompareOp::Ne, value.into())
    }

    /// `self < value`.
    pub fn lt(&self, value: impl Into<Value>) -> Result<Condition<'f>, Error> {
        self.compare(CompareOp::Lt, value.into())
    }

    /// `self <= value`.
    pub fn le(&self, value: impl Into<Value>) -> Result<Condition<'f>, Error> {
        self.compare(CompareOp::Le, value.into())
    }

    /// `self > value`.
    pub fn gt(&self, value: impl Into<Value>) -> Result<Condition<'f>, Error> {
        self.compare(CompareOp::Gt, value.into())
    }

    /// `self >= value`.
    pub fn ge(&self, value: impl Into<Value>) -> Result<Condition<'f>, Error> {
        self.compare(CompareOp::Ge, value.into())
    }

    /// `low <= self <= high`.
    pub fn between(
        &self,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Result<Condition<'f>, Error> {
        let (low, high) = (low.into(), high.into());
        self.check_orderable("between")?;
        self.check_operand("between", &low)?;
        self.check_operand("between", &high)?;
        Ok(Condition::leaf(
            self,
            Predicate::between(self.name.clone(), low, high),
        ))
    }

    /// `self` equals one of `values`.
    pub fn is_in<V: Into<Value>>(
        &self,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Condition<'f>, Error> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(ExpressionError::EmptyIn {
                variable: self.name.clone(),
            }
            .into());
        }
        for v in &values {
            self.check_operand("in", v)?;
        }
        Ok(Condition::leaf(
            self,
            Predicate::is_in(self.name.clone(), values),
        ))
    }

    /// The cell is missing.
    #[must_use]
    pub fn is_null(&self) -> Condition<'f> {
        Condition::leaf(self, Predicate::is_null(self.name.clone()))
    }

    /// The cell is present.
    #[must_use]
    pub fn is_not_null(&self) -> Condition<'f> {
        Condition::leaf(self, Predicate::is_null(self.name.clone()).negate())
    }

    fn compare(&self, op: CompareOp, value: Value) -> Result<Condition<'f>, Error> {
        if op.is_ordering() {
            self.check_orderable(op.symbol())?;
        }
        self.check_operand(op.symbol(), &value)?;
        Ok(Condition::leaf(
            self,
            Predicate::compare(self.name.clone(), op, value),
        ))
    }

    fn check_orderable(&self, op: &'static str) -> Result<(), ExpressionError> {
        if self.dtype.is_orderable() {
            Ok(())
        } else {
            Err(ExpressionError::Unordered {
                variable: self.name.clone(),
                dtype: self.dtype,
                op,
            })
        }
    }

    fn check_operand(&self, op: &'static str, value: &Value) -> Result<(), ExpressionError> {
        if value.is_null() {
            return Err(ExpressionError::NullOperand {
                variable: self.name.clone(),
            });
        }
        if !self.dtype.accepts(value) {
            return Err(ExpressionError::IncompatibleOperand {
                variable: self.name.clone(),
                dtype: self.dtype,
                op,
                operand: value.type_name(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Variable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::string::ToString;
    use alloc::vec;

    use probq_frame::{Column, ColumnFrame};

    use super::*;

    fn frame() -> ColumnFrame {
        ColumnFrame::new()
            .with_column("age", vec![25_i64, 30, 25])
            .unwrap()
            .with_column("purchased", vec![true, true, false])
            .unwrap()
            .with_column("color", Column::categorical([Some("red"), None, Some("blue")]))
            .unwrap()
    }

    #[test]
    fn rejects_empty_frames() {
        let no_columns = ColumnFrame::new();
        assert_eq!(
            VariableBuilder::from_data(&no_columns).unwrap_err(),
            Error::Data(DataError::NoColumns)
        );
        let no_rows = ColumnFrame::new()
            .with_column("x", Vec::<i64>::new())
            .unwrap();
        assert_eq!(
            VariableBuilder::from_data(&no_rows).unwrap_err(),
            Error::Data(DataError::EmptyFrame)
        );
    }

    #[test]
    fn builders_mint_distinct_identities() {
        let f = frame();
        let a = VariableBuilder::from_data(&f).unwrap();
        let b = VariableBuilder::from_data(&f).unwrap();
        assert_ne!(a.frame_id(), b.frame_id());
        let x = a.variable("age").unwrap();
        assert_eq!(x.frame_id(), a.frame_id());
        assert!(!x.same_as(&b.variable("age").unwrap()));
    }

    #[test]
    fn get_variables_keeps_order_and_infers_types() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let vars = vb.get_variables(&["purchased", "age"]).unwrap();
        assert_eq!(vars[0].name(), "purchased");
        assert_eq!(vars[0].dtype(), DType::Boolean);
        assert_eq!(vars[1].dtype(), DType::Int64);

        let all = vb.get_variables::<&str>(&[]).unwrap();
        let names: Vec<&str> = all.iter().map(Variable::name).collect();
        assert_eq!(names, vec!["age", "purchased", "color"]);
    }

    #[test]
    fn get_variables_reports_every_missing_column() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let err = vb.get_variables(&["age", "height", "weight"]).unwrap_err();
        let Error::Variable(err) = err else {
            panic!("expected a VariableError, got {err:?}");
        };
        assert_eq!(err.missing, vec![Arc::from("height"), Arc::from("weight")]);
        assert_eq!(err.available.len(), 3);
        assert!(err.to_string().contains("height, weight"));
    }

    #[test]
    fn comparisons_check_types() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let age = vb.variable("age").unwrap();
        let color = vb.variable("color").unwrap();
        let purchased = vb.variable("purchased").unwrap();

        assert!(age.gt(2.5).is_ok());
        assert!(age.between(20, 30).is_ok());
        assert!(color.eq("red").is_ok());
        assert!(purchased.eq(true).is_ok());

        assert!(matches!(
            age.eq("old"),
            Err(Error::Expression(ExpressionError::IncompatibleOperand { op: "==", .. }))
        ));
        assert!(matches!(
            color.lt("red"),
            Err(Error::Expression(ExpressionError::Unordered { op: "<", .. }))
        ));
        assert!(matches!(
            purchased.between(false, true),
            Err(Error::Expression(ExpressionError::Unordered { .. }))
        ));
        assert!(matches!(
            age.eq(Value::Null),
            Err(Error::Expression(ExpressionError::NullOperand { .. }))
        ));
        assert!(matches!(
            age.is_in(Vec::<i64>::new()),
            Err(Error::Expression(ExpressionError::EmptyIn { .. }))
        ));
        assert!(color.is_in(["red", "blue"]).is_ok());
    }

    #[test]
    fn conditions_render_as_expressions() {
        let f = frame();
        let vb = VariableBuilder::from_data(&f).unwrap();
        let age = vb.variable("age").unwrap();
        assert_eq!(age.ge(18).unwrap().to_string(), "age >= 18");
        assert_eq!(age.is_not_null().to_string(), "!(age is null)");
    }
}
