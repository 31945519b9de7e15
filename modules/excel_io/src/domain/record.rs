use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::domain::error::InterchangeError;

/// Cell type of a column; drives both how a value is written and how a cell is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    /// `chrono::NaiveDateTime` in its serde (ISO 8601) form.
    DateTime,
    /// `chrono::NaiveDate` in its serde (ISO 8601) form.
    Date,
}

/// One column: serde field name of the record and the header shown in the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub field: String,
    pub header: String,
    pub kind: ColumnKind,
}

/// Ordered column layout of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    name: String,
    columns: Vec<Column>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(
        mut self,
        field: impl Into<String>,
        header: impl Into<String>,
        kind: ColumnKind,
    ) -> Self {
        self.columns.push(Column {
            field: field.into(),
            header: header.into(),
            kind,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column for a sheet header; matches the header text first, then the field name.
    pub fn column_for_header(&self, header: &str) -> Option<&Column> {
        let header = header.trim();
        self.columns
            .iter()
            .find(|c| c.header == header)
            .or_else(|| self.columns.iter().find(|c| c.field == header))
    }
}

/// A record type that can travel through a spreadsheet.
///
/// Records cross the codec as JSON objects keyed by [`Column::field`], so the
/// serde representation of the type must use those field names.
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct UserDto { id: i64, username: String }
///
/// impl Tabular for UserDto {
///     fn schema() -> RecordSchema {
///         RecordSchema::new("UserDto")
///             .column("id", "User ID", ColumnKind::Integer)
///             .column("username", "Username", ColumnKind::Text)
///     }
/// }
/// ```
pub trait Tabular: Serialize + DeserializeOwned + Send + 'static {
    fn schema() -> RecordSchema;
}

/// Convert decoded rows into typed records.
pub fn records_into<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, InterchangeError> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            serde_json::from_value(row).map_err(|e| {
                // +2: one for the header row, one for 1-based numbering
                InterchangeError::decode(format!("row {} does not match the record type", i + 2), e)
            })
        })
        .collect()
}
