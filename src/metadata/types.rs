//! Value and descriptor types exchanged with a data source.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A single cell value read from a source database.
///
/// Floats compare and hash by bit pattern so samples can live in hash sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value the way classifier inputs expect it.
    ///
    /// NULL becomes the empty string; numbers use their decimal form.
    pub fn to_sample_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A column of a table together with its declared SQL type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Owning table name
    pub table: String,
    /// Column name
    pub name: String,
    /// Declared SQL type, normalized to uppercase
    pub sql_type: String,
}

impl ColumnDescriptor {
    pub fn new(
        table: impl Into<String>,
        name: impl Into<String>,
        sql_type: impl AsRef<str>,
    ) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            sql_type: sql_type.as_ref().trim().to_uppercase(),
        }
    }

    /// Get fully qualified name (table.column).
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

/// Sampled rows of a table alongside the field names, in select order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSample {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSample {
    pub fn new(fields: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { fields, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Extract one column of the sample by field name.
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let idx = self.fields.iter().position(|f| f == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }
}

/// Row ordering used when sampling column values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SampleOrder {
    /// Uniform random order.
    #[default]
    Random,
    /// Random order biased towards rows with a high value in `column`.
    Weighted { column: String },
}
