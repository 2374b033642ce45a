//! Record type registry.
//!
//! The registry maps a type name (the path segment in `/testtype/{id}`) to a
//! [`RecordKind`], which turns arbitrary caller JSON into the complete data
//! document that storage backends persist.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{StorageError, StorageResult, ValidationError};
use crate::types::{
    FieldType, Filter, FilterOp, ListOptions, ListQuery, METADATA_FIELDS, Record, TestType,
    invalid_option,
};

/// Type-erased knowledge about one record type.
pub trait RecordKind: Send + Sync {
    /// The registered type name.
    fn type_name(&self) -> &str;

    /// The data document of a record with every field at its zero value.
    fn zero_value(&self) -> Value;

    /// Turns caller input into a complete data document.
    ///
    /// Server-owned metadata keys are dropped and every field the input
    /// omits is set to its zero value. An explicit `null` counts as omitted.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidRecord` if the input is not an
    /// object or a field has the wrong type.
    fn normalize(&self, input: Value) -> StorageResult<Value>;

    /// Returns the type of a filterable field.
    fn field_type(&self, field: &str) -> Option<FieldType> {
        match field {
            "id" => Some(FieldType::String),
            "generation" => Some(FieldType::Integer),
            _ => self.zero_value().get(field).and_then(FieldType::of),
        }
    }

    /// Resolves a raw query into typed list options.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidListOption` for unknown fields,
    /// values that don't parse as the field's type, and `hp` on non-string
    /// fields.
    fn resolve_list(&self, query: &ListQuery) -> StorageResult<ListOptions> {
        let mut options = ListOptions {
            sort: query.sort.clone(),
            limit: query.limit,
            offset: query.offset.unwrap_or(0),
            ..Default::default()
        };

        for (field, op, raw) in &query.filters {
            let field_type = self.filterable(field, *op)?;
            let parse = |raw: &str| {
                field_type.parse(raw).ok_or_else(|| {
                    invalid_option(
                        field.as_str(),
                        format!("cannot parse {raw:?} as {field_type:?}"),
                    )
                })
            };

            let values = if *op == FilterOp::In {
                raw.split(',').map(parse).collect::<StorageResult<Vec<_>>>()?
            } else {
                vec![parse(raw)?]
            };

            options.filters.push(Filter {
                field: field.clone(),
                op: *op,
                values,
            });
        }

        self.check_list(&options)?;
        Ok(options)
    }

    /// Validates typed list options against this record type.
    fn check_list(&self, options: &ListOptions) -> StorageResult<()> {
        for filter in &options.filters {
            self.filterable(&filter.field, filter.op)?;
            if filter.op != FilterOp::In && filter.values.len() != 1 {
                return Err(invalid_option(
                    filter.field.as_str(),
                    format!("{} takes exactly one value", filter.op),
                ));
            }
        }
        for key in &options.sort {
            if self.field_type(&key.field).is_none() {
                return Err(invalid_option(format!("_sort={}", key.field), "unknown field"));
            }
        }
        Ok(())
    }

    #[doc(hidden)]
    fn filterable(&self, field: &str, op: FilterOp) -> StorageResult<FieldType> {
        let field_type = self
            .field_type(field)
            .ok_or_else(|| invalid_option(field, "unknown field"))?;
        if op == FilterOp::HasPrefix && field_type != FieldType::String {
            return Err(invalid_option(field, "hp applies to string fields only"));
        }
        Ok(field_type)
    }
}

/// [`RecordKind`] for a Rust type implementing [`Record`].
pub struct TypedKind<T>(PhantomData<fn() -> T>);

impl<T> TypedKind<T> {
    /// Creates the kind.
    pub fn new() -> Self {
        TypedKind(PhantomData)
    }
}

impl<T> Default for TypedKind<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> RecordKind for TypedKind<T> {
    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    fn zero_value(&self) -> Value {
        serde_json::to_value(T::default()).unwrap_or(Value::Object(Map::new()))
    }

    fn normalize(&self, input: Value) -> StorageResult<Value> {
        let mut map = match input {
            Value::Object(map) => map,
            other => {
                return Err(StorageError::invalid_record(
                    T::TYPE_NAME,
                    format!("expected a JSON object, got {}", json_kind(&other)),
                ));
            }
        };

        for key in METADATA_FIELDS {
            map.remove(key);
        }
        map.retain(|_, v| !v.is_null());

        let record: T = serde_json::from_value(Value::Object(map))
            .map_err(|e| StorageError::invalid_record(T::TYPE_NAME, e.to_string()))?;

        Ok(serde_json::to_value(&record)?)
    }
}

/// Registry of record types by name.
#[derive(Clone, Default)]
pub struct RecordRegistry {
    kinds: HashMap<String, Arc<dyn RecordKind>>,
}

impl RecordRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in record types.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<TestType>();
        registry
    }

    /// Registers a typed record under `T::TYPE_NAME`.
    pub fn register<T: Record>(&mut self) -> &mut Self {
        self.register_kind(Arc::new(TypedKind::<T>::new()))
    }

    /// Registers a type-erased kind, replacing any kind with the same name.
    pub fn register_kind(&mut self, kind: Arc<dyn RecordKind>) -> &mut Self {
        self.kinds.insert(kind.type_name().to_string(), kind);
        self
    }

    /// Looks up a kind by name.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownType` if nothing is registered under
    /// `type_name`.
    pub fn get(&self, type_name: &str) -> StorageResult<Arc<dyn RecordKind>> {
        self.kinds.get(type_name).cloned().ok_or_else(|| {
            StorageError::Validation(ValidationError::UnknownType {
                type_name: type_name.to_string(),
            })
        })
    }

    /// Returns true if `type_name` is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.kinds.contains_key(type_name)
    }

    /// Returns the registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.kinds.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for RecordRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
