//! Column descriptors: a name, a declared type, and an extractor closure.
//!
//! Extractors take the row and the state provider, so cross-entity columns
//! (a host's comment ids, a service's host state) can resolve without the
//! row carrying back-pointers.

use crate::row::Row;
use crate::state::LivestatusState;
use crate::value::{ColumnType, Value};

type Extractor = Box<dyn Fn(&Row, &LivestatusState) -> Value + Send + Sync>;

/// One column of a table.
pub struct Column {
    pub name: &'static str,
    pub ctype: ColumnType,
    pub description: &'static str,
    extract: Extractor,
}

impl Column {
    pub fn new(
        name: &'static str,
        ctype: ColumnType,
        description: &'static str,
        extract: impl Fn(&Row, &LivestatusState) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            ctype,
            description,
            extract: Box::new(extract),
        }
    }

    /// Extract this column's value from a row. A row of the wrong variant
    /// yields the type's empty value rather than an error.
    pub fn value(&self, row: &Row, state: &LivestatusState) -> Value {
        (self.extract)(row, state)
    }

    /// The neutral value for a column type, used for foreign row variants
    /// and absent data.
    pub fn empty(ctype: ColumnType) -> Value {
        match ctype {
            ColumnType::Int | ColumnType::Time => Value::Int(0),
            ColumnType::Float => Value::Float(0.0),
            ColumnType::Str => Value::Str(String::new()),
            ColumnType::List => Value::List(Vec::new()),
        }
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("ctype", &self.ctype)
            .finish_non_exhaustive()
    }
}
