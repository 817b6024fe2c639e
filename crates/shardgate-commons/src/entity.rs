//! Typed entities and their runtime descriptors.
//!
//! An [`Entity`] is a typed record with a mandatory integer `id`. Drivers never
//! see entity types directly: they operate on [`Row`]s guided by an
//! [`EntitySchema`], which carries the field descriptors, the defaults and the
//! indexes declared by the owning repository.
//!
//! Entities are normally declared with the [`entity!`](crate::entity) macro:
//!
//! ```rust,ignore
//! shardgate_commons::entity! {
//!     pub struct Action {
//!         pub kind: String as "type",
//!         pub owner_id: i64 = 0,
//!     }
//! }
//! ```

use crate::errors::{Result, ValueError};
use crate::index::Index;
use crate::row::{Row, BUCKET_ID};
use crate::schema::{BucketStatus, FieldType, StorageClass, StorageDriver};
use crate::value::Value;
use rust_decimal::prelude::ToPrimitive;
use std::fmt;

/// Name and domain type of one entity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
}

impl FieldDef {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty }
    }
}

/// Conversion between a Rust field type and a [`Value`].
pub trait FieldValue: Sized {
    const TYPE: FieldType;

    fn from_value(field: &str, value: &Value) -> Result<Self>;

    fn to_value(&self) -> Value;
}

fn mismatch(field: &str, expected: &'static str, value: &Value) -> ValueError {
    ValueError::TypeMismatch {
        field: field.to_string(),
        expected,
        found: value.kind().to_string(),
    }
}

impl FieldValue for i64 {
    const TYPE: FieldType = FieldType::Int;

    fn from_value(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Int(v) => Ok(*v),
            Value::Decimal(d) => d.to_i64().ok_or_else(|| mismatch(field, "int", value)),
            Value::Str(s) => s.parse().map_err(|_| ValueError::InvalidNumber {
                value: s.clone(),
                target: "int",
            }),
            _ => Err(mismatch(field, "int", value)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl FieldValue for u64 {
    const TYPE: FieldType = FieldType::Int;

    fn from_value(field: &str, value: &Value) -> Result<Self> {
        let v = i64::from_value(field, value)?;
        u64::try_from(v).map_err(|_| mismatch(field, "unsigned int", value))
    }

    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl FieldValue for f64 {
    const TYPE: FieldType = FieldType::Float;

    fn from_value(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::Decimal(d) => d.to_f64().ok_or_else(|| mismatch(field, "float", value)),
            Value::Str(s) => s.parse().map_err(|_| ValueError::InvalidNumber {
                value: s.clone(),
                target: "float",
            }),
            _ => Err(mismatch(field, "float", value)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FieldValue for String {
    const TYPE: FieldType = FieldType::Str;

    fn from_value(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Str(s) | Value::Type(s) => Ok(s.clone()),
            Value::Int(v) => Ok(v.to_string()),
            _ => Err(mismatch(field, "string", value)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

macro_rules! enum_field_value {
    ($($ty:ty),+) => {
        $(
            impl FieldValue for $ty {
                const TYPE: FieldType = FieldType::Enum;

                fn from_value(field: &str, value: &Value) -> Result<Self> {
                    match value.as_str() {
                        Some(s) => s.parse(),
                        None => Err(mismatch(field, "enum name", value)),
                    }
                }

                fn to_value(&self) -> Value {
                    Value::Str(self.as_str().to_string())
                }
            }
        )+
    };
}

enum_field_value!(StorageClass, StorageDriver, BucketStatus);

/// Read a typed field from `row`, falling back to `defaults`.
///
/// A `Null` in the row counts as absent.
pub fn read_field<T: FieldValue>(row: &Row, defaults: &Row, name: &str) -> Result<T> {
    match row
        .get(name)
        .filter(|v| !v.is_null())
        .or_else(|| defaults.get(name))
    {
        Some(value) => T::from_value(name, value),
        None => Err(ValueError::MissingField(name.to_string())),
    }
}

/// A typed domain record with an integer identity.
pub trait Entity: fmt::Debug + Send + Sync + Sized + 'static {
    /// Storage namespace name (space / collection) of this entity.
    const NAME: &'static str;

    /// Column descriptors, `id` first. Never includes `bucket_id`.
    fn fields() -> &'static [FieldDef];

    /// Default values applied to fields omitted from creation data.
    fn defaults() -> Row {
        Row::new()
    }

    fn id(&self) -> u64;

    /// Build an instance from a stored row. Extra columns are ignored.
    fn from_row(row: &Row) -> Result<Self>;

    fn to_row(&self) -> Row;

    /// Overwrite this instance's fields with the values present in `row`.
    fn apply(&mut self, row: &Row) -> Result<()> {
        let mut merged = self.to_row();
        for (key, value) in row.iter() {
            if key != BUCKET_ID {
                merged.insert(key.clone(), value.clone());
            }
        }
        *self = Self::from_row(&merged)?;
        Ok(())
    }
}

/// Runtime descriptor handed to drivers in place of an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
    pub defaults: Row,
    /// Indexes declared by the owning repository, without the `bucket_id` prefix
    pub indexes: Vec<Index>,
}

impl EntitySchema {
    pub fn of<E: Entity>() -> Self {
        Self {
            name: E::NAME,
            fields: E::fields(),
            defaults: E::defaults(),
            indexes: Vec::new(),
        }
    }

    /// Attach the declared indexes that belong to this entity.
    pub fn with_indexes<'a>(mut self, indexes: impl IntoIterator<Item = &'a Index>) -> Self {
        self.indexes.extend(
            indexes
                .into_iter()
                .filter(|index| index.entity == self.name)
                .cloned(),
        );
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The implicit `(bucket_id, id)` index followed by every declared index
    /// widened with a leading `bucket_id`.
    pub fn effective_indexes(&self) -> Vec<Index> {
        let mut indexes = vec![Index::primary(self.name)];
        indexes.extend(self.indexes.iter().map(Index::widened));
        indexes
    }

    /// Insert default values for every field absent from `data`.
    pub fn fill_defaults(&self, data: &mut Row) {
        for (key, value) in self.defaults.iter() {
            if !data.contains_key(key) {
                data.insert(key.clone(), value.clone());
            }
        }
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __entity_column {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident $column:literal) => {
        $column
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __entity_default {
    ($row:ident, $column:expr, $ty:ty) => {};
    ($row:ident, $column:expr, $ty:ty, $default:expr) => {{
        let value: $ty = $default;
        $row.insert($column, $crate::FieldValue::to_value(&value));
    }};
}

/// Declare an entity struct together with its [`Entity`] implementation.
///
/// Every entity gets a leading `pub id: u64`. A field may rename its column
/// with `as "column"` and declare a default with `= expr`.
#[macro_export]
macro_rules! entity {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty $(as $column:literal)? $(= $default:expr)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name {
            pub id: u64,
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::Entity for $name {
            const NAME: &'static str = stringify!($name);

            fn fields() -> &'static [$crate::FieldDef] {
                const FIELDS: &[$crate::FieldDef] = &[
                    $crate::FieldDef::new($crate::ID, $crate::FieldType::Int),
                    $(
                        $crate::FieldDef::new(
                            $crate::__entity_column!($field $($column)?),
                            <$ty as $crate::FieldValue>::TYPE,
                        ),
                    )*
                ];
                FIELDS
            }

            fn defaults() -> $crate::Row {
                #[allow(unused_mut)]
                let mut row = $crate::Row::new();
                $(
                    $crate::__entity_default!(
                        row,
                        $crate::__entity_column!($field $($column)?),
                        $ty
                        $(, $default)?
                    );
                )*
                row
            }

            fn id(&self) -> u64 {
                self.id
            }

            fn from_row(row: &$crate::Row) -> $crate::ValueResult<Self> {
                let defaults = <Self as $crate::Entity>::defaults();
                Ok(Self {
                    id: $crate::read_field(row, &defaults, $crate::ID)?,
                    $(
                        $field: $crate::read_field(
                            row,
                            &defaults,
                            $crate::__entity_column!($field $($column)?),
                        )?,
                    )*
                })
            }

            fn to_row(&self) -> $crate::Row {
                let mut row = $crate::Row::new();
                row.insert($crate::ID, $crate::FieldValue::to_value(&self.id));
                $(
                    row.insert(
                        $crate::__entity_column!($field $($column)?),
                        $crate::FieldValue::to_value(&self.$field),
                    );
                )*
                row
            }
        }
    };
}
