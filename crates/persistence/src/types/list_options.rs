//! List options: filtering, sorting and windowing.
//!
//! [`ListQuery`] is the raw, string-typed form parsed from URL query
//! parameters (`num[gt]=3`, `_sort=-num,text`, `_limit=10`). A
//! [`RecordKind`](crate::registry::RecordKind) resolves it into typed
//! [`ListOptions`], which backends evaluate.
//!
//! # Examples
//!
//! ```
//! use stowage_persistence::types::{Filter, FilterOp, ListOptions, SortField};
//!
//! let options = ListOptions::new()
//!     .filter(Filter::new("num", FilterOp::Gte, 3))
//!     .sort(SortField::desc("num"))
//!     .limit(10);
//!
//! assert_eq!(options.filters.len(), 1);
//! assert_eq!(options.limit, Some(10));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StorageError, StorageResult, ValidationError};
use crate::types::StoredRecord;

/// Comparison operator of a list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    /// Equal.
    Eq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// String has prefix.
    #[serde(rename = "hp")]
    HasPrefix,
    /// Equal to any of a set of values.
    In,
}

impl FilterOp {
    /// Returns the operator as written in a query string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::HasPrefix => "hp",
            FilterOp::In => "in",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(FilterOp::Eq),
            "gt" => Ok(FilterOp::Gt),
            "gte" => Ok(FilterOp::Gte),
            "lt" => Ok(FilterOp::Lt),
            "lte" => Ok(FilterOp::Lte),
            "hp" => Ok(FilterOp::HasPrefix),
            "in" => Ok(FilterOp::In),
            other => Err(invalid_option(other, "unknown filter operator")),
        }
    }
}

/// JSON type of a record field, used to parse filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// JSON string.
    String,
    /// JSON number without a fractional part.
    Integer,
    /// Any other JSON number.
    Float,
    /// JSON boolean.
    Boolean,
}

impl FieldType {
    /// Infers the type of a field from its zero value.
    ///
    /// Objects, arrays and nulls are not filterable.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(FieldType::String),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(FieldType::Integer),
            Value::Number(_) => Some(FieldType::Float),
            Value::Bool(_) => Some(FieldType::Boolean),
            _ => None,
        }
    }

    /// Parses a query-string value as this type.
    pub fn parse(&self, raw: &str) -> Option<Value> {
        match self {
            FieldType::String => Some(Value::String(raw.to_string())),
            FieldType::Integer => raw.parse::<i64>().ok().map(Value::from),
            FieldType::Float => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            FieldType::Boolean => raw.parse::<bool>().ok().map(Value::Bool),
        }
    }
}

/// A typed filter on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field name; `id` and `generation` address metadata.
    pub field: String,
    /// Operator.
    pub op: FilterOp,
    /// Operands. Exactly one except for [`FilterOp::In`].
    pub values: Vec<Value>,
}

impl Filter {
    /// Creates a single-operand filter.
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            values: vec![value.into()],
        }
    }

    /// Creates an [`FilterOp::In`] filter.
    pub fn one_of<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::In,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `record` satisfies this filter.
    pub fn matches(&self, record: &StoredRecord) -> bool {
        let Some(actual) = record.field(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::In => self
                .values
                .iter()
                .any(|v| compare_values(&actual, v) == Some(Ordering::Equal)),
            FilterOp::HasPrefix => match (&actual, self.values.first()) {
                (Value::String(a), Some(Value::String(prefix))) => a.starts_with(prefix.as_str()),
                _ => false,
            },
            op => {
                let Some(target) = self.values.first() else {
                    return false;
                };
                match compare_values(&actual, target) {
                    Some(ord) => match op {
                        FilterOp::Eq => ord == Ordering::Equal,
                        FilterOp::Gt => ord == Ordering::Greater,
                        FilterOp::Gte => ord != Ordering::Less,
                        FilterOp::Lt => ord == Ordering::Less,
                        FilterOp::Lte => ord != Ordering::Greater,
                        FilterOp::HasPrefix | FilterOp::In => false,
                    },
                    None => false,
                }
            }
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Field name.
    pub field: String,
    /// Sort descending instead of ascending.
    pub descending: bool,
}

impl SortField {
    /// Ascending sort on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending sort on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parses `field`, `+field` or `-field`.
    pub fn parse(s: &str) -> Self {
        if let Some(field) = s.strip_prefix('-') {
            Self::desc(field)
        } else {
            Self::asc(s.strip_prefix('+').unwrap_or(s))
        }
    }
}

/// Typed list options evaluated by storage backends.
///
/// Filters are combined with AND. Records are ordered by the sort keys in
/// turn and finally by `id` ascending, then `offset` records are skipped and
/// at most `limit` returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Filters, all of which must match.
    pub filters: Vec<Filter>,
    /// Sort keys, most significant first.
    pub sort: Vec<SortField>,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
    /// Number of matching records to skip.
    pub offset: usize,
}

impl ListOptions {
    /// Options that return every record ordered by `id`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a sort key.
    pub fn sort(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    /// Sets the limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the offset.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Returns true if `record` passes every filter.
    pub fn matches(&self, record: &StoredRecord) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Orders two records by the sort keys, then by `id`.
    pub fn compare(&self, a: &StoredRecord, b: &StoredRecord) -> Ordering {
        for key in &self.sort {
            let ord = match (a.field(&key.field), b.field(&key.field)) {
                (Some(x), Some(y)) => compare_values(&x, &y).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id().cmp(b.id())
    }

    /// Filters, sorts and windows a set of records in memory.
    pub fn apply<I>(&self, records: I) -> Vec<StoredRecord>
    where
        I: IntoIterator<Item = StoredRecord>,
    {
        let mut matched: Vec<StoredRecord> = records.into_iter().filter(|r| self.matches(r)).collect();
        matched.sort_by(|a, b| self.compare(a, b));

        let window = matched.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => window.take(limit).collect(),
            None => window.collect(),
        }
    }
}

/// Untyped list options as they arrive in a URL query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// `(field, operator, raw value)` triples.
    pub filters: Vec<(String, FilterOp, String)>,
    /// Sort keys.
    pub sort: Vec<SortField>,
    /// `_limit`.
    pub limit: Option<usize>,
    /// `_offset`.
    pub offset: Option<usize>,
}

impl ListQuery {
    /// Parses query-string pairs.
    ///
    /// Recognized keys are `_limit`, `_offset`, `_sort` (comma separated,
    /// `-` prefix for descending), `field=value` and `field[op]=value`.
    /// Other keys starting with `_` are rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = ListQuery::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "_limit" => query.limit = Some(parse_count(key, value)?),
                "_offset" => query.offset = Some(parse_count(key, value)?),
                "_sort" => query.sort.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(SortField::parse),
                ),
                k if k.starts_with('_') => {
                    return Err(invalid_option(k, "unknown list parameter"));
                }
                k => {
                    let (field, op) = match k.split_once('[') {
                        Some((field, rest)) => {
                            let op = rest
                                .strip_suffix(']')
                                .ok_or_else(|| invalid_option(k, "unterminated operator"))?;
                            (field, op.parse::<FilterOp>()?)
                        }
                        None => (k, FilterOp::Eq),
                    };
                    query
                        .filters
                        .push((field.to_string(), op, value.to_string()));
                }
            }
        }

        Ok(query)
    }
}

/// Compares two JSON scalars of the same kind.
///
/// Integers compare exactly, mixed numbers as `f64`. Values of different
/// kinds are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn parse_count(key: &str, value: &str) -> StorageResult<usize> {
    value
        .parse::<usize>()
        .map_err(|_| invalid_option(key, format!("expected a non-negative integer, got {value:?}")))
}

pub(crate) fn invalid_option(option: impl Into<String>, message: impl Into<String>) -> StorageError {
    StorageError::Validation(ValidationError::InvalidListOption {
        option: option.into(),
        message: message.into(),
    })
}
