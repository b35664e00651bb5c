//! SQL data types and evaluation-type categories.
//!
//! This module defines the data types used by the NexusDB planner, the
//! collations attached to string types, and the coarse [`EvalType`]
//! categories expression matching works with.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// SQL data types supported by NexusDB.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean type.
    Boolean,
    /// 8-bit signed integer.
    TinyInt,
    /// 16-bit signed integer.
    SmallInt,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    BigInt,
    /// 32-bit floating point.
    Float,
    /// 64-bit floating point.
    Double,
    /// Arbitrary precision decimal.
    Decimal {
        /// Total number of digits.
        precision: Option<u8>,
        /// Digits after decimal point.
        scale: Option<u8>,
    },
    /// Fixed-length string.
    Char(Option<u32>),
    /// Variable-length string.
    Varchar(Option<u32>),
    /// Unlimited text.
    Text,
    /// Binary data.
    Blob,
    /// Date (year, month, day).
    Date,
    /// Time (hour, minute, second).
    Time,
    /// Timestamp (date + time).
    Timestamp,
    /// Timestamp with timezone.
    TimestampTz,
    /// Interval type.
    Interval,
    /// UUID type.
    Uuid,
    /// JSON type.
    Json,
    /// JSONB (binary JSON).
    Jsonb,
    /// Array of another type.
    Array(Box<DataType>),
    /// Type of an untyped NULL literal.
    Null,
}

impl DataType {
    /// Returns true if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt
                | DataType::SmallInt
                | DataType::Int
                | DataType::BigInt
                | DataType::Float
                | DataType::Double
                | DataType::Decimal { .. }
        )
    }

    /// Returns true if this type is a string type.
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            DataType::Char(_) | DataType::Varchar(_) | DataType::Text
        )
    }

    /// Returns true if this type is a temporal type.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            DataType::Date
                | DataType::Time
                | DataType::Timestamp
                | DataType::TimestampTz
                | DataType::Interval
        )
    }

    /// Returns the evaluation category values of this type are computed in.
    pub fn eval_type(&self) -> EvalType {
        match self {
            DataType::Boolean
            | DataType::TinyInt
            | DataType::SmallInt
            | DataType::Int
            | DataType::BigInt
            | DataType::Null => EvalType::Int,
            DataType::Float | DataType::Double => EvalType::Real,
            DataType::Decimal { .. } => EvalType::Decimal,
            DataType::Char(_)
            | DataType::Varchar(_)
            | DataType::Text
            | DataType::Blob
            | DataType::Uuid => EvalType::String,
            DataType::Date | DataType::Timestamp | DataType::TimestampTz => EvalType::Datetime,
            DataType::Time | DataType::Interval => EvalType::Duration,
            DataType::Json | DataType::Jsonb | DataType::Array(_) => EvalType::Json,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => write!(f, "DECIMAL({}, {})", p, s),
                (Some(p), None) => write!(f, "DECIMAL({})", p),
                _ => write!(f, "DECIMAL"),
            },
            DataType::Char(len) => match len {
                Some(l) => write!(f, "CHAR({})", l),
                None => write!(f, "CHAR"),
            },
            DataType::Varchar(len) => match len {
                Some(l) => write!(f, "VARCHAR({})", l),
                None => write!(f, "VARCHAR"),
            },
            DataType::Text => write!(f, "TEXT"),
            DataType::Blob => write!(f, "BLOB"),
            DataType::Date => write!(f, "DATE"),
            DataType::Time => write!(f, "TIME"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::TimestampTz => write!(f, "TIMESTAMPTZ"),
            DataType::Interval => write!(f, "INTERVAL"),
            DataType::Uuid => write!(f, "UUID"),
            DataType::Json => write!(f, "JSON"),
            DataType::Jsonb => write!(f, "JSONB"),
            DataType::Array(inner) => write!(f, "{}[]", inner),
            DataType::Null => write!(f, "NULL"),
        }
    }
}

/// Coarse evaluation category of an expression.
///
/// Two expressions with different exact types can share an evaluation
/// category (e.g. `INT` and `BIGINT` both evaluate as [`EvalType::Int`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvalType {
    /// Integer arithmetic (booleans included).
    Int,
    /// Floating point.
    Real,
    /// Fixed point decimal.
    Decimal,
    /// Strings and binary strings.
    String,
    /// Dates and timestamps.
    Datetime,
    /// Times and intervals.
    Duration,
    /// JSON documents.
    Json,
}

impl fmt::Display for EvalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvalType::Int => "int",
            EvalType::Real => "real",
            EvalType::Decimal => "decimal",
            EvalType::String => "string",
            EvalType::Datetime => "datetime",
            EvalType::Duration => "duration",
            EvalType::Json => "json",
        };
        write!(f, "{}", name)
    }
}

/// String collation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collation {
    /// Byte-wise comparison.
    Binary,
    /// Code point comparison, trailing spaces ignored.
    Utf8Bin,
    /// Case-insensitive comparison, trailing spaces ignored.
    Utf8GeneralCi,
}

impl Collation {
    /// Returns true if comparisons under this collation ignore case.
    pub fn is_case_insensitive(&self) -> bool {
        matches!(self, Collation::Utf8GeneralCi)
    }

    /// Returns true if trailing spaces are insignificant.
    pub fn is_pad_space(&self) -> bool {
        matches!(self, Collation::Utf8Bin | Collation::Utf8GeneralCi)
    }

    /// Compares two strings under this collation.
    pub fn compare_eq(&self, a: &str, b: &str) -> bool {
        match self {
            Collation::Binary => a == b,
            Collation::Utf8Bin => a.trim_end_matches(' ') == b.trim_end_matches(' '),
            Collation::Utf8GeneralCi => {
                let a = a.trim_end_matches(' ');
                let b = b.trim_end_matches(' ');
                a.chars().count() == b.chars().count()
                    && a.chars()
                        .zip(b.chars())
                        .all(|(x, y)| x.to_lowercase().eq(y.to_lowercase()))
            }
        }
    }
}

impl fmt::Display for Collation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collation::Binary => write!(f, "binary"),
            Collation::Utf8Bin => write!(f, "utf8mb4_bin"),
            Collation::Utf8GeneralCi => write!(f, "utf8mb4_general_ci"),
        }
    }
}

/// Exact type of a column or expression.
///
/// Equality is exact: width, precision, scale and collation all take part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    /// Data type.
    pub data_type: DataType,
    /// Collation, meaningful for string types.
    pub collation: Collation,
}

impl FieldType {
    /// Creates a field type with the default collation for the data type.
    pub fn new(data_type: DataType) -> Self {
        let collation = if data_type.is_string() {
            Collation::Utf8Bin
        } else {
            Collation::Binary
        };
        Self {
            data_type,
            collation,
        }
    }

    /// Sets the collation.
    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    /// Creates a BOOLEAN type.
    pub fn boolean() -> Self {
        Self::new(DataType::Boolean)
    }

    /// Creates an INT type.
    pub fn int() -> Self {
        Self::new(DataType::Int)
    }

    /// Creates a BIGINT type.
    pub fn bigint() -> Self {
        Self::new(DataType::BigInt)
    }

    /// Creates a DOUBLE type.
    pub fn double() -> Self {
        Self::new(DataType::Double)
    }

    /// Creates a VARCHAR type with the given maximum length.
    pub fn varchar(len: u32) -> Self {
        Self::new(DataType::Varchar(Some(len)))
    }

    /// Creates a TEXT type.
    pub fn text() -> Self {
        Self::new(DataType::Text)
    }

    /// Returns the evaluation category.
    pub fn eval_type(&self) -> EvalType {
        self.data_type.eval_type()
    }
}

impl From<DataType> for FieldType {
    fn from(data_type: DataType) -> Self {
        Self::new(data_type)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.data_type.is_string() && self.collation != Collation::Utf8Bin {
            write!(f, "{} COLLATE {}", self.data_type, self.collation)
        } else {
            write!(f, "{}", self.data_type)
        }
    }
}

/// A literal value in SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// NULL value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
    /// Binary data.
    Blob(Vec<u8>),
}

impl Literal {
    /// Returns true if this is a NULL value.
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Returns the type a constant of this value gets when none is given.
    pub fn default_type(&self) -> FieldType {
        match self {
            Literal::Null => FieldType::new(DataType::Null),
            Literal::Boolean(_) => FieldType::boolean(),
            Literal::Integer(_) => FieldType::bigint(),
            Literal::Float(_) => FieldType::double(),
            Literal::String(_) => FieldType::new(DataType::Varchar(None)),
            Literal::Blob(_) => FieldType::new(DataType::Blob),
        }
    }

    /// Compares two literals as SQL values under the given collation.
    ///
    /// Integers and booleans compare exactly, booleans as 0/1. A float
    /// equals an integer only if it holds exactly that integer. NULL only
    /// equals NULL.
    pub fn equal(&self, other: &Literal, collation: Collation) -> bool {
        match (self, other) {
            (Literal::Null, Literal::Null) => true,
            (Literal::Null, _) | (_, Literal::Null) => false,
            (Literal::String(a), Literal::String(b)) => collation.compare_eq(a, b),
            (Literal::Blob(a), Literal::Blob(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a == b,
            (Literal::Float(f), other) | (other, Literal::Float(f)) => {
                match (other.as_i64(), float_as_i64(*f)) {
                    (Some(i), Some(j)) => i == j,
                    _ => false,
                }
            }
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Boolean(b) => Some(i64::from(*b)),
            Literal::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// Returns the integer a float holds exactly, if any.
fn float_as_i64(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX is not.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

/// Values that [`Literal::equal`] treats as equal under binary collation
/// hash identically: booleans and integral floats hash as integers.
impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Literal::Null => 0u8.hash(state),
            Literal::Boolean(_) | Literal::Integer(_) => {
                1u8.hash(state);
                self.as_i64().hash(state);
            }
            Literal::Float(v) => match float_as_i64(*v) {
                Some(i) => {
                    1u8.hash(state);
                    Some(i).hash(state);
                }
                None => {
                    2u8.hash(state);
                    v.to_bits().hash(state);
                }
            },
            Literal::String(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Literal::Blob(b) => {
                4u8.hash(state);
                b.hash(state);
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Blob(b) => write!(f, "X'{}'", bytes_to_hex(b)),
        }
    }
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Context expression comparison runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    /// Whether string comparison honours the declared collation. When
    /// disabled every collation compares as binary.
    pub new_collation_enabled: bool,
}

impl EvalContext {
    /// Creates a context with the given collation mode.
    pub fn new(new_collation_enabled: bool) -> Self {
        Self {
            new_collation_enabled,
        }
    }

    /// Returns the collation actually used for a value of the given type.
    pub fn effective_collation(&self, field_type: &FieldType) -> Collation {
        if self.new_collation_enabled {
            field_type.collation
        } else {
            Collation::Binary
        }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new(true)
    }
}
