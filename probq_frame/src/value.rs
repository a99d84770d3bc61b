// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cell values, column types and outcome keys.

extern crate alloc;

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

use smallvec::SmallVec;

/// Column data types understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// `true`/`false`.
    Boolean,
    /// Signed integers (narrower integer columns are widened).
    Int64,
    /// Floating point numbers.
    Float64,
    /// Free-form strings, ordered lexicographically.
    Utf8,
    /// Dictionary-encoded strings with nominal (unordered) semantics.
    Categorical,
    /// Timestamps, stored as microseconds since the Unix epoch.
    Datetime,
}

impl DType {
    /// Returns `true` for `Int64` and `Float64`.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }

    /// Returns `true` if ordering comparisons (`<`, `between`, ...) are meaningful.
    ///
    /// Booleans and categoricals are nominal.
    #[must_use]
    pub fn is_orderable(self) -> bool {
        matches!(
            self,
            Self::Int64 | Self::Float64 | Self::Utf8 | Self::Datetime
        )
    }

    /// Returns `true` if `value` can be compared against a column of this type.
    ///
    /// `Null` is never accepted; missing cells are matched with [`Test::IsNull`].
    ///
    /// [`Test::IsNull`]: crate::Test::IsNull
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Boolean, Value::Boolean(_))
                | (Self::Int64 | Self::Float64, Value::Int(_) | Value::Float(_))
                | (Self::Utf8 | Self::Categorical, Value::Str(_))
                | (Self::Datetime, Value::Datetime(_))
        )
    }

    /// A short lowercase name, used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Utf8 => "utf8",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell or literal.
///
/// `Value` has a total order and hash so it can be used as a group key. Floats are
/// normalised for that purpose: `-0.0` equals `0.0` and all NaNs are equal.
#[derive(Debug, Clone)]
pub enum Value {
    /// A missing cell.
    Null,
    /// A boolean.
    Boolean(bool),
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A string (used for both `Utf8` and `Categorical` columns).
    Str(Arc<str>),
    /// Microseconds since the Unix epoch.
    Datetime(i64),
}

impl Value {
    /// Creates a datetime value from microseconds since the Unix epoch.
    #[must_use]
    pub fn datetime_micros(micros: i64) -> Self {
        Self::Datetime(micros)
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// A short name of the value's kind, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Datetime(_) => "datetime",
        }
    }

    /// Returns the value as `f64` if it is numeric.
    ///
    /// Integers beyond 2^53 are rounded; [`Value::compare`] does not go through this.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            #[allow(clippy::cast_precision_loss, reason = "mixed int/float comparison")]
            Self::Int(v) => Some(v as f64),
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Compares two non-null values the way predicates do.
    ///
    /// Integers and floats compare exactly by numeric value. Floats follow IEEE 754
    /// `totalOrder` after the same normalisation as group keys, so `-0.0` equals `0.0`
    /// and NaN equals NaN and sorts above every number.
    /// Returns `None` when either side is null or the kinds are incomparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => Some(canonical(*a).total_cmp(&canonical(*b))),
            (Self::Int(a), Self::Float(b)) => Some(cmp_int_float(*a, *b)),
            (Self::Float(a), Self::Int(b)) => Some(cmp_int_float(*b, *a).reverse()),
            (Self::Str(a), Self::Str(b)) => Some(a.as_ref().cmp(b.as_ref())),
            (Self::Datetime(a), Self::Datetime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Converts a number to the representation a column of `dtype` stores, if that is exact.
    ///
    /// An integral float becomes `Int` for `Int64`, an integer becomes `Float` for `Float64`
    /// when no rounding is involved. Anything else is returned unchanged.
    #[must_use]
    pub fn coerce_to(self, dtype: DType) -> Self {
        match (dtype, self) {
            (DType::Int64, Self::Float(f)) => exact_int(f).map_or(Self::Float(f), Self::Int),
            (DType::Float64, Self::Int(i)) => {
                #[allow(clippy::cast_precision_loss, reason = "checked to round-trip below")]
                let f = i as f64;
                if exact_int(f) == Some(i) {
                    Self::Float(f)
                } else {
                    Self::Int(i)
                }
            }
            (_, v) => v,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::Str(_) => 4,
            Self::Datetime(_) => 5,
        }
    }
}

fn canonical(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// 2^63: `i64` covers `[-BOUND, BOUND)`.
const BOUND: f64 = 9_223_372_036_854_775_808.0;

/// `f` as an `i64`, if it is integral and in range.
fn exact_int(f: f64) -> Option<i64> {
    if !(-BOUND..BOUND).contains(&f) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, reason = "in range, truncates toward zero")]
    let whole = f as i64;
    #[allow(clippy::cast_precision_loss, reason = "`whole` came from an f64")]
    let back = whole as f64;
    (back == f).then_some(whole)
}

/// Exact ordering of an integer against a float, without widening the integer.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    let f = canonical(f);
    if f.is_nan() || f >= BOUND {
        return Ordering::Less;
    }
    if f < -BOUND {
        return Ordering::Greater;
    }
    #[allow(clippy::cast_possible_truncation, reason = "in range, truncates toward zero")]
    let whole = f as i64;
    #[allow(clippy::cast_precision_loss, reason = "`whole` came from an f64")]
    let back = whole as f64;
    i.cmp(&whole).then_with(|| back.total_cmp(&f))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => canonical(*a).total_cmp(&canonical(*b)),
            (Self::Str(a), Self::Str(b)) => a.as_ref().cmp(b.as_ref()),
            (Self::Datetime(a), Self::Datetime(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Boolean(v) => v.hash(state),
            Self::Int(v) | Self::Datetime(v) => v.hash(state),
            Self::Float(v) => canonical(*v).to_bits().hash(state),
            Self::Str(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::Datetime(v) => write!(f, "datetime({v}us)"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(Arc::from(value))
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// The key of a distribution entry: one value per queried variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Outcome(SmallVec<[Value; 2]>);

impl Outcome {
    /// Creates an outcome from its values, in variable order.
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self(values.into_iter().collect())
    }

    /// The values, in variable order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Number of values (the number of queried variables).
    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Returns the value of a single-variable outcome.
    #[must_use]
    pub fn single(&self) -> Option<&Value> {
        match self.0.as_slice() {
            [v] => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = self.single() {
            return write!(f, "{v}");
        }
        f.write_str("(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}

macro_rules! outcome_from_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Outcome {
                fn from(value: $t) -> Self {
                    Self::new([Value::from(value)])
                }
            }
        )*
    };
}

outcome_from_scalar!(Value, bool, i64, i32, u32, f64, f32, &str, String, Arc<str>);

impl From<Vec<Value>> for Outcome {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl<const N: usize> From<[Value; N]> for Outcome {
    fn from(values: [Value; N]) -> Self {
        Self::new(values)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Outcome {
    fn from((a, b): (A, B)) -> Self {
        Self::new([a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Outcome {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self::new([a.into(), b.into(), c.into()])
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::vec;

    use hashbrown::HashSet;

    use super::*;

    #[test]
    fn float_keys_normalise_signed_zero_and_nan() {
        assert_eq!(Value::Float(-0.0), Value::Float(0.0));
        assert_eq!(Value::Float(f64::NAN), Value::Float(-f64::NAN));

        let mut set = HashSet::new();
        set.insert(Value::Float(0.0));
        set.insert(Value::Float(-0.0));
        assert_eq!(set.len(), 1, "signed zeros should hash alike");
    }

    #[test]
    fn compare_mixes_ints_and_floats_numerically() {
        assert_eq!(
            Value::Int(2).compare(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Int(3).compare(&Value::Float(3.0)), Some(Ordering::Equal));
        assert_eq!(Value::Float(-1.5).compare(&Value::Int(-1)), Some(Ordering::Less));
        assert_eq!(Value::Str("a".into()).compare(&Value::Int(1)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn compare_agrees_with_key_equality_on_floats() {
        assert_eq!(
            Value::Float(-0.0).compare(&Value::Float(0.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Int(0).compare(&Value::Float(-0.0)), Some(Ordering::Equal));
        assert_eq!(
            Value::Float(f64::NAN).compare(&Value::Float(-f64::NAN)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Float(f64::NAN).compare(&Value::Float(f64::INFINITY)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Int(i64::MAX).compare(&Value::Float(f64::NAN)), Some(Ordering::Less));
    }

    #[test]
    fn compare_large_ints_with_floats_exactly() {
        let two_53 = 9_007_199_254_740_992_i64;
        let f = Value::Float(9_007_199_254_740_992.0);
        assert_eq!(Value::Int(two_53).compare(&f), Some(Ordering::Equal));
        assert_eq!(Value::Int(two_53 + 1).compare(&f), Some(Ordering::Greater));
        assert_eq!(Value::Int(two_53 - 1).compare(&f), Some(Ordering::Less));
        assert_eq!(
            Value::Int(i64::MAX).compare(&Value::Float(9_223_372_036_854_775_808.0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Int(i64::MIN).compare(&Value::Float(-9_223_372_036_854_775_808.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Int(i64::MIN).compare(&Value::Float(f64::NEG_INFINITY)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn coerce_to_is_exact_or_identity() {
        assert_eq!(Value::Float(2.0).coerce_to(DType::Int64), Value::Int(2));
        assert_eq!(Value::Float(2.5).coerce_to(DType::Int64), Value::Float(2.5));
        assert_eq!(Value::Float(f64::NAN).coerce_to(DType::Int64), Value::Float(f64::NAN));
        assert_eq!(Value::Int(2).coerce_to(DType::Float64), Value::Float(2.0));
        let big = 9_007_199_254_740_993_i64;
        assert_eq!(Value::Int(big).coerce_to(DType::Float64), Value::Int(big));
        assert_eq!(Value::Str("a".into()).coerce_to(DType::Int64), Value::Str("a".into()));
    }

    #[test]
    fn dtype_accepts_only_compatible_operands() {
        assert!(DType::Float64.accepts(&Value::Int(1)));
        assert!(DType::Categorical.accepts(&Value::from("x")));
        assert!(!DType::Utf8.accepts(&Value::Int(1)));
        assert!(!DType::Boolean.accepts(&Value::Null));
        assert!(!DType::Categorical.is_orderable());
        assert!(DType::Utf8.is_orderable());
    }

    #[test]
    fn outcomes_order_by_values() {
        let mut keys = vec![Outcome::from((2, "b")), Outcome::from((1, "z")), Outcome::from((2, "a"))];
        keys.sort();
        assert_eq!(
            keys,
            vec![Outcome::from((1, "z")), Outcome::from((2, "a")), Outcome::from((2, "b"))]
        );
        assert_eq!(std::format!("{}", keys[0]), "(1, \"z\")");
        assert_eq!(std::format!("{}", Outcome::from(25)), "25");
    }
}
