use super::store::{FieldFormat, Tuple};
use shardgate_commons::Row;

/// Positional-to-named decoder for one space's tuples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowConstructor {
    columns: Vec<String>,
}

impl RowConstructor {
    pub fn from_format(format: &[FieldFormat]) -> Self {
        Self {
            columns: format.iter().map(|f| f.name.clone()).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Name each tuple position. Positions past the format are dropped.
    pub fn build(&self, tuple: Tuple) -> Row {
        self.columns.iter().cloned().zip(tuple).collect()
    }
}
