// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arrow-backed frame adapter.
//!
//! This crate implements [`probq_frame::Frame`] over an Arrow [`RecordBatch`], so probability
//! queries can run directly against Arrow data. Filters are evaluated with Arrow's comparison
//! and Kleene boolean kernels.
//!
//! Columns are mapped to `probq` types as follows:
//! - signed integers and `UInt8`..`UInt32` → `Int64`,
//! - `Float16`/`Float32`/`Float64` → `Float64`,
//! - `Utf8`/`LargeUtf8`/`Utf8View` → `Utf8`,
//! - string dictionaries → `Categorical`,
//! - `Timestamp`/`Date32`/`Date64` → `Datetime` (microseconds).
//!
//! Other column types are rejected by [`ArrowFrame::try_new`].

#![no_std]

extern crate alloc;

use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, Scalar, StringArray,
};
use arrow::compute::kernels::cmp;
use arrow::compute::{and_kleene, cast, is_null, not, or_kleene};
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use probq_frame::{
    CompareOp, DType, Field, Frame, FrameError, GroupCounter, GroupCounts, Predicate, Schema,
    Selection, Test, Value,
};

const BACKEND: &str = "arrow";

/// A [`Frame`] over an Arrow [`RecordBatch`].
#[derive(Debug, Clone)]
pub struct ArrowFrame {
    batch: RecordBatch,
    schema: Schema,
}

impl ArrowFrame {
    /// Wraps a record batch, mapping its column types.
    ///
    /// Fails with [`FrameError::UnsupportedType`] for columns that have no `probq` type.
    pub fn try_new(batch: RecordBatch) -> Result<Self, FrameError> {
        let fields = batch
            .schema()
            .fields()
            .iter()
            .map(|f| {
                let dtype = dtype_of(f.data_type()).ok_or_else(|| FrameError::UnsupportedType {
                    column: Arc::from(f.name().as_str()),
                    dtype: f.data_type().to_string(),
                })?;
                Ok(Field::new(f.name().as_str(), dtype))
            })
            .collect::<Result<Vec<_>, FrameError>>()?;
        tracing::debug!(
            backend = BACKEND,
            columns = fields.len(),
            rows = batch.num_rows(),
            "wrapped record batch"
        );
        Ok(Self {
            batch,
            schema: Schema::new(fields),
        })
    }

    /// The wrapped record batch.
    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Consumes the frame, returning the record batch.
    #[must_use]
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    fn raw_column(&self, name: &Arc<str>) -> Result<(&ArrayRef, DType), FrameError> {
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.clone()))?;
        let array = self
            .batch
            .column_by_name(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.clone()))?;
        Ok((array, field.dtype))
    }

    /// Returns the column cast to its canonical Arrow type.
    fn column(&self, name: &Arc<str>) -> Result<(ArrayRef, DType), FrameError> {
        let (array, dtype) = self.raw_column(name)?;
        Ok((canonical(array, dtype).map_err(backend_err)?, dtype))
    }

    fn evaluate(&self, predicate: &Predicate) -> Result<BooleanArray, FrameError> {
        let rows = self.batch.num_rows();
        match predicate {
            Predicate::Test { column, test } => self.evaluate_test(column, test),
            Predicate::And(parts) => {
                let mut acc = BooleanArray::from(vec![true; rows]);
                for part in parts {
                    acc = and_kleene(&acc, &self.evaluate(part)?).map_err(backend_err)?;
                }
                Ok(acc)
            }
            Predicate::Or(parts) => {
                let mut acc = BooleanArray::from(vec![false; rows]);
                for part in parts {
                    acc = or_kleene(&acc, &self.evaluate(part)?).map_err(backend_err)?;
                }
                Ok(acc)
            }
            Predicate::Not(inner) => not(&self.evaluate(inner)?).map_err(backend_err),
        }
    }

    fn evaluate_test(&self, column: &Arc<str>, test: &Test) -> Result<BooleanArray, FrameError> {
        if let Test::IsNull = test {
            let (array, _) = self.raw_column(column)?;
            return is_null(array.as_ref()).map_err(backend_err);
        }
        let (array, dtype) = self.column(column)?;
        match test {
            Test::Compare { op, value } => compare(column, &array, dtype, *op, value),
            Test::Between { low, high } => {
                let lo = compare(column, &array, dtype, CompareOp::Ge, low)?;
                let hi = compare(column, &array, dtype, CompareOp::Le, high)?;
                and_kleene(&lo, &hi).map_err(backend_err)
            }
            Test::In(values) => {
                let mut acc: Option<BooleanArray> = None;
                for v in values {
                    let hit = compare(column, &array, dtype, CompareOp::Eq, v)?;
                    acc = Some(match acc {
                        Some(prev) => or_kleene(&prev, &hit).map_err(backend_err)?,
                        None => hit,
                    });
                }
                match acc {
                    Some(acc) => Ok(acc),
                    // Nothing matches an empty list; missing cells stay unknown.
                    None => Ok(array
                        .logical_nulls()
                        .map_or_else(
                            || BooleanArray::from(vec![false; array.len()]),
                            |nulls| nulls.iter().map(|valid| valid.then_some(false)).collect(),
                        )),
                }
            }
            Test::IsNull => is_null(array.as_ref()).map_err(backend_err),
        }
    }
}

impl TryFrom<RecordBatch> for ArrowFrame {
    type Error = FrameError;

    fn try_from(batch: RecordBatch) -> Result<Self, Self::Error> {
        Self::try_new(batch)
    }
}

impl Frame for ArrowFrame {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count(&self) -> usize {
        self.batch.num_rows()
    }

    fn filter(&self, predicate: &Predicate) -> Result<Selection, FrameError> {
        predicate.validate(&self.schema)?;
        let mask = self.evaluate(predicate)?;
        let selection = Selection::from_kleene(mask.iter());
        tracing::trace!(
            backend = BACKEND,
            %predicate,
            selected = selection.count(),
            rows = self.batch.num_rows(),
            "filter"
        );
        Ok(selection)
    }

    fn group_count(
        &self,
        columns: &[Arc<str>],
        selection: Option<&Selection>,
    ) -> Result<GroupCounts, FrameError> {
        let mut counter = GroupCounter::new(columns)?;
        let arrays = columns
            .iter()
            .map(|c| self.column(c))
            .collect::<Result<Vec<_>, _>>()?;
        let cells = arrays
            .iter()
            .map(|(array, dtype)| Cells::new(array, *dtype))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self.batch.num_rows();
        match selection {
            Some(selection) => {
                selection.check_len(rows)?;
                for row in selection.rows() {
                    counter.add(cells.iter().map(|c| c.value(row)));
                }
            }
            None => {
                for row in 0..rows {
                    counter.add(cells.iter().map(|c| c.value(row)));
                }
            }
        }
        let counts = counter.finish();
        tracing::trace!(
            backend = BACKEND,
            groups = counts.len(),
            counted = counts.total(),
            "group_count"
        );
        Ok(counts)
    }
}

fn dtype_of(data_type: &DataType) -> Option<DType> {
    match data_type {
        DataType::Boolean => Some(DType::Boolean),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => Some(DType::Int64),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Some(DType::Float64),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Some(DType::Utf8),
        DataType::Dictionary(_, value)
            if matches!(**value, DataType::Utf8 | DataType::LargeUtf8) =>
        {
            Some(DType::Categorical)
        }
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => Some(DType::Datetime),
        _ => None,
    }
}

/// Casts a column to the Arrow type its [`DType`] is evaluated with.
///
/// Categoricals are compared as plain strings; datetimes as `Int64` microseconds.
fn canonical(array: &ArrayRef, dtype: DType) -> Result<ArrayRef, ArrowError> {
    match dtype {
        DType::Boolean => cast(array, &DataType::Boolean),
        DType::Int64 => cast(array, &DataType::Int64),
        DType::Float64 => cast(array, &DataType::Float64),
        DType::Utf8 | DType::Categorical => cast(array, &DataType::Utf8),
        DType::Datetime => {
            let tz = match array.data_type() {
                DataType::Timestamp(_, tz) => tz.clone(),
                _ => None,
            };
            let micros = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, tz))?;
            cast(&micros, &DataType::Int64)
        }
    }
}

/// `column <op> value`, with the operand built to match the canonical column type.
fn compare(
    name: &Arc<str>,
    array: &ArrayRef,
    dtype: DType,
    op: CompareOp,
    value: &Value,
) -> Result<BooleanArray, FrameError> {
    let (lhs, rhs): (ArrayRef, ArrayRef) = match (dtype, value) {
        (DType::Boolean, Value::Boolean(b)) => {
            (array.clone(), Arc::new(BooleanArray::from(vec![*b])) as ArrayRef)
        }
        (DType::Int64 | DType::Datetime, Value::Int(v) | Value::Datetime(v))
            if dtype.accepts(value) =>
        {
            (array.clone(), Arc::new(Int64Array::from(vec![*v])) as ArrayRef)
        }
        (DType::Int64, Value::Float(_)) | (DType::Float64, Value::Int(_) | Value::Float(_)) => {
            return compare_rows(array, dtype, op, value);
        }
        (DType::Utf8 | DType::Categorical, Value::Str(s)) => {
            (array.clone(), Arc::new(StringArray::from(vec![s.as_ref()])) as ArrayRef)
        }
        _ => {
            return Err(FrameError::TypeMismatch {
                column: name.clone(),
                dtype,
                op: op.symbol(),
                operand: value.type_name(),
            });
        }
    };
    let rhs = Scalar::new(rhs);
    let out = match op {
        CompareOp::Eq => cmp::eq(&lhs, &rhs),
        CompareOp::Ne => cmp::neq(&lhs, &rhs),
        CompareOp::Lt => cmp::lt(&lhs, &rhs),
        CompareOp::Le => cmp::lt_eq(&lhs, &rhs),
        CompareOp::Gt => cmp::gt(&lhs, &rhs),
        CompareOp::Ge => cmp::gt_eq(&lhs, &rhs),
    };
    out.map_err(backend_err)
}

/// Row by row through [`Value::compare`], which handles signed zeros, NaN and exact int/float
/// ordering the same way `ColumnFrame` does.
fn compare_rows(
    array: &ArrayRef,
    dtype: DType,
    op: CompareOp,
    value: &Value,
) -> Result<BooleanArray, FrameError> {
    let cells = Cells::new(array, dtype)?;
    Ok((0..array.len())
        .map(|row| cells.value(row).compare(value).map(|ord| op.holds(ord)))
        .collect())
}

fn backend_err(err: ArrowError) -> FrameError {
    FrameError::Backend {
        backend: BACKEND,
        message: err.to_string(),
    }
}

/// Typed view of a canonical column, for reading group keys.
#[derive(Debug)]
enum Cells<'a> {
    Boolean(&'a BooleanArray),
    Int(&'a Int64Array),
    Float(&'a Float64Array),
    Str(&'a StringArray),
    Datetime(&'a Int64Array),
}

impl<'a> Cells<'a> {
    fn new(array: &'a ArrayRef, dtype: DType) -> Result<Self, FrameError> {
        let cells = match dtype {
            DType::Boolean => array.as_boolean_opt().map(Self::Boolean),
            DType::Int64 => array.as_primitive_opt::<Int64Type>().map(Self::Int),
            DType::Float64 => array.as_primitive_opt::<Float64Type>().map(Self::Float),
            DType::Utf8 | DType::Categorical => array.as_string_opt::<i32>().map(Self::Str),
            DType::Datetime => array.as_primitive_opt::<Int64Type>().map(Self::Datetime),
        };
        cells.ok_or_else(|| FrameError::Backend {
            backend: BACKEND,
            message: alloc::format!("unexpected array type {} for {dtype}", array.data_type()),
        })
    }

    fn value(&self, row: usize) -> Value {
        match self {
            Self::Boolean(a) if a.is_valid(row) => Value::Boolean(a.value(row)),
            Self::Int(a) if a.is_valid(row) => Value::Int(a.value(row)),
            Self::Float(a) if a.is_valid(row) => Value::Float(a.value(row)),
            Self::Str(a) if a.is_valid(row) => Value::from(a.value(row)),
            Self::Datetime(a) if a.is_valid(row) => Value::Datetime(a.value(row)),
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use arrow::array::{
        BinaryArray, Date32Array, DictionaryArray, Int32Array, TimestampMillisecondArray,
    };
    use arrow::datatypes::Int32Type;
    use probq_frame::Outcome;

    use super::*;

    fn batch() -> RecordBatch {
        let color: DictionaryArray<Int32Type> =
            ["red", "blue", "red", "red"].into_iter().collect();
        RecordBatch::try_from_iter(vec![
            (
                "age",
                Arc::new(Int32Array::from(vec![25, 30, 25, 40])) as ArrayRef,
            ),
            (
                "score",
                Arc::new(Float64Array::from(vec![Some(1.5), None, Some(3.0), Some(0.5)])) as ArrayRef,
            ),
            ("color", Arc::new(color) as ArrayRef),
            (
                "seen",
                Arc::new(TimestampMillisecondArray::from(vec![1_000, 2_000, 1_000, 3_000]))
                    as ArrayRef,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn maps_arrow_types() {
        let frame = ArrowFrame::try_new(batch()).unwrap();
        let dtypes: Vec<DType> = frame.schema().fields().iter().map(|f| f.dtype).collect();
        assert_eq!(
            dtypes,
            vec![DType::Int64, DType::Float64, DType::Categorical, DType::Datetime]
        );
        assert_eq!(frame.row_count(), 4);
    }

    #[test]
    fn rejects_unsupported_columns() {
        let bytes = BinaryArray::from(vec![&b"a"[..], &b"b"[..]]);
        let batch =
            RecordBatch::try_from_iter(vec![("blob", Arc::new(bytes) as ArrayRef)]).unwrap();
        assert!(matches!(
            ArrowFrame::try_new(batch),
            Err(FrameError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn filter_uses_kleene_logic() {
        let frame = ArrowFrame::try_new(batch()).unwrap();
        let gt = Predicate::compare("score", CompareOp::Gt, 1);
        assert_eq!(frame.filter(&gt).unwrap().count(), 2);
        assert_eq!(frame.filter(&gt.clone().negate()).unwrap().count(), 1);
        assert_eq!(
            frame
                .filter(&gt.or(Predicate::is_null("score")))
                .unwrap()
                .count(),
            3
        );
    }

    #[test]
    fn filter_mixes_int_columns_with_float_operands() {
        let frame = ArrowFrame::try_new(batch()).unwrap();
        let p = Predicate::between("age", 24.5, 30);
        assert_eq!(frame.filter(&p).unwrap().rows().collect::<Vec<_>>(), vec![0, 1, 2]);
        let p = Predicate::is_in("color", ["blue", "green"]);
        assert_eq!(frame.filter(&p).unwrap().rows().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn empty_in_matches_nothing_and_keeps_missing_unknown() {
        let frame = ArrowFrame::try_new(batch()).unwrap();
        let none = Predicate::is_in("score", Vec::<Value>::new());
        assert_eq!(frame.filter(&none).unwrap().count(), 0);
        assert_eq!(
            frame.filter(&none.negate()).unwrap().rows().collect::<Vec<_>>(),
            vec![0, 2, 3]
        );
    }

    #[test]
    fn float_filters_treat_signed_zeros_alike() {
        let zeros = Float64Array::from(vec![Some(0.0), Some(-0.0), Some(1.0), None]);
        let batch =
            RecordBatch::try_from_iter(vec![("x", Arc::new(zeros) as ArrayRef)]).unwrap();
        let frame = ArrowFrame::try_new(batch).unwrap();
        let eq = Predicate::compare("x", CompareOp::Eq, 0.0);
        assert_eq!(frame.filter(&eq).unwrap().count(), 2);
        let lt = Predicate::compare("x", CompareOp::Lt, 0);
        assert_eq!(frame.filter(&lt).unwrap().count(), 0);
    }

    #[test]
    fn large_ints_compare_exactly_with_floats() {
        let ints = Int64Array::from(vec![9_007_199_254_740_993, 9_007_199_254_740_992]);
        let batch = RecordBatch::try_from_iter(vec![("i", Arc::new(ints) as ArrayRef)]).unwrap();
        let frame = ArrowFrame::try_new(batch).unwrap();
        let eq = Predicate::compare("i", CompareOp::Eq, 9_007_199_254_740_992.0);
        assert_eq!(frame.filter(&eq).unwrap().rows().collect::<Vec<_>>(), vec![1]);
        let gt = Predicate::compare("i", CompareOp::Gt, 9_007_199_254_740_992.0);
        assert_eq!(frame.filter(&gt).unwrap().rows().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn groups_datetimes_as_microseconds() {
        let frame = ArrowFrame::try_new(batch()).unwrap();
        let cols: Vec<Arc<str>> = vec!["seen".into()];
        let counts = frame.group_count(&cols, None).unwrap();
        assert_eq!(
            counts.groups(),
            &[
                (Outcome::from(Value::Datetime(1_000_000)), 2),
                (Outcome::from(Value::Datetime(2_000_000)), 1),
                (Outcome::from(Value::Datetime(3_000_000)), 1)
            ]
        );
    }

    #[test]
    fn groups_categoricals_by_string() {
        let frame = ArrowFrame::try_new(batch()).unwrap();
        let cols: Vec<Arc<str>> = vec!["color".into(), "age".into()];
        let red = frame
            .filter(&Predicate::compare("color", CompareOp::Eq, "red"))
            .unwrap();
        let counts = frame.group_count(&cols, Some(&red)).unwrap();
        assert_eq!(
            counts.groups(),
            &[(Outcome::from(("red", 25)), 2), (Outcome::from(("red", 40)), 1)]
        );
    }

    #[test]
    fn dates_map_to_midnight_micros() {
        let days = Date32Array::from(vec![0, 1]);
        let batch = RecordBatch::try_from_iter(vec![("day", Arc::new(days) as ArrayRef)]).unwrap();
        let frame = ArrowFrame::try_new(batch).unwrap();
        let cols: Vec<Arc<str>> = vec!["day".into()];
        let counts = frame.group_count(&cols, None).unwrap();
        assert_eq!(
            counts.groups()[1].0,
            Outcome::from(Value::Datetime(86_400_000_000))
        );
    }
}
