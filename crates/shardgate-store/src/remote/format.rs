//! Mapping between entity schemas and remote space layouts.

use super::coerce::convert;
use super::store::{FieldFormat, IndexMeta, RemoteType, SpaceMeta, Tuple};
use crate::error::{Result, StoreError};
use shardgate_commons::{EntitySchema, FieldType, Row, BUCKET_ID};

pub fn remote_type(ty: FieldType) -> RemoteType {
    match ty {
        FieldType::Float => RemoteType::Number,
        FieldType::Int => RemoteType::Unsigned,
        FieldType::Str | FieldType::Enum => RemoteType::String,
    }
}

/// `bucket_id` followed by one column per entity field.
pub fn desired_format(schema: &EntitySchema) -> Vec<FieldFormat> {
    let mut format = Vec::with_capacity(schema.fields.len() + 1);
    format.push(FieldFormat::new(BUCKET_ID, RemoteType::Unsigned));
    format.extend(
        schema
            .fields
            .iter()
            .map(|field| FieldFormat::new(field.name, remote_type(field.ty))),
    );
    format
}

/// Pick the index serving a query over `keys`.
///
/// No keys selects the primary index. Otherwise the first index whose leading
/// `keys.len()` parts are exactly the key set, in any order.
pub fn cast_index<'a>(space: &'a SpaceMeta, keys: &[&str]) -> Result<&'a IndexMeta> {
    let not_found = || StoreError::IndexNotFound {
        space: space.name.clone(),
        keys: keys.iter().map(|k| k.to_string()).collect(),
    };

    if keys.is_empty() {
        return space.primary().ok_or_else(not_found);
    }

    let mut wanted: Vec<&str> = keys.to_vec();
    wanted.sort_unstable();

    space
        .indexes
        .iter()
        .find(|index| {
            if index.parts.len() < wanted.len() {
                return false;
            }
            let mut leading: Vec<&str> = index.parts[..wanted.len()]
                .iter()
                .map(|part| part.name.as_str())
                .collect();
            leading.sort_unstable();
            leading == wanted
        })
        .ok_or_else(not_found)
}

/// Probe key for `clause`: coerced values of the leading index parts present
/// in the clause.
pub fn index_tuple(index: &IndexMeta, clause: &Row) -> Result<Tuple> {
    let mut key = Vec::new();
    for part in &index.parts {
        match clause.get(&part.name) {
            Some(value) => key.push(convert(part.ty, Some(value))?),
            None => break,
        }
    }
    Ok(key)
}

/// `clause` with every value coerced to its column's type, so it can be
/// matched against decoded rows. Keys outside the format are kept as given
/// and never match.
pub fn coerce_clause(format: &[FieldFormat], clause: &Row) -> Result<Row> {
    let mut coerced = Row::new();
    for (key, value) in clause.iter() {
        let value = match format.iter().find(|field| &field.name == key) {
            Some(field) => convert(field.ty, Some(value))?,
            None => value.clone(),
        };
        coerced.insert(key.clone(), value);
    }
    Ok(coerced)
}

/// Positional tuple for `data` in `format` order; absent fields get the
/// column's zero value.
pub fn row_tuple(format: &[FieldFormat], data: &Row) -> Result<Tuple> {
    format
        .iter()
        .map(|field| convert(field.ty, data.get(&field.name)).map_err(StoreError::from))
        .collect()
}
