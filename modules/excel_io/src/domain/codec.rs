//! Codec port: translation between record lists and spreadsheet bytes.
//!
//! The interchange core only talks to [`TableCodec`]; [`XlsxCodec`] is the
//! built-in Office Open XML implementation (written with `rust_xlsxwriter`,
//! read back with `calamine`).

use std::fmt::Write as _;
use std::io::Cursor;

use bytes::Bytes;
use calamine::{Data, DataType as _, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::record::{Column, ColumnKind, RecordSchema};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const ISO_DATE: &str = "%Y-%m-%d";
const ISO_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Largest magnitude an `f64` cell holds without losing integer precision.
const MAX_EXACT_INT: u64 = 1 << 53;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Write(#[from] rust_xlsxwriter::XlsxError),
    #[error(transparent)]
    Read(#[from] calamine::XlsxError),
    #[error("workbook has no worksheet")]
    NoWorksheet,
    #[error("row {row}, column '{column}': {message}")]
    Cell {
        row: usize,
        column: String,
        message: String,
    },
    #[error("record {0} is not a JSON object")]
    NotAnObject(usize),
    #[error("too many rows or columns for a worksheet")]
    OutOfBounds,
}

/// Spreadsheet encoder/decoder.
pub trait TableCodec: Send + Sync {
    /// Media type of the encoded payload.
    fn content_type(&self) -> &'static str;

    /// Canonical file extension, without the dot.
    fn extension(&self) -> &'static str;

    /// Encode records (JSON objects keyed by column field) into one sheet.
    fn encode(
        &self,
        records: &[Value],
        schema: &RecordSchema,
        sheet: &str,
    ) -> Result<Bytes, CodecError>;

    /// Decode the first sheet into records keyed by column field.
    fn decode(&self, bytes: &[u8], schema: &RecordSchema) -> Result<Vec<Value>, CodecError>;
}

/// `.xlsx` codec with a bold header row and auto-fitted column widths.
#[derive(Debug, Clone)]
pub struct XlsxCodec {
    date_format: String,
}

impl XlsxCodec {
    pub fn new(date_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
        }
    }

    fn write_cell(
        &self,
        sheet: &mut Worksheet,
        row: u32,
        col: u16,
        column: &Column,
        value: &Value,
    ) -> Result<(), CodecError> {
        let bad = |message: String| CodecError::Cell {
            row: row as usize + 1,
            column: column.header.clone(),
            message,
        };

        if value.is_null() {
            return Ok(());
        }

        match column.kind {
            ColumnKind::Text => match value {
                Value::String(s) => sheet.write_string(row, col, s)?,
                other => sheet.write_string(row, col, other.to_string())?,
            },
            // Integers past 2^53 go out as text so no digit is lost.
            ColumnKind::Integer => match (value.as_i64(), value.as_u64()) {
                (Some(i), _) if i.unsigned_abs() <= MAX_EXACT_INT => {
                    sheet.write_number(row, col, i as f64)?
                }
                (Some(i), _) => sheet.write_string(row, col, i.to_string())?,
                (None, Some(u)) => sheet.write_string(row, col, u.to_string())?,
                (None, None) => {
                    let n = value
                        .as_f64()
                        .ok_or_else(|| bad(format!("expected a number, got {value}")))?;
                    sheet.write_number(row, col, n)?
                }
            },
            ColumnKind::Float => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| bad(format!("expected a number, got {value}")))?;
                sheet.write_number(row, col, n)?
            }
            ColumnKind::Boolean => {
                let b = value
                    .as_bool()
                    .ok_or_else(|| bad(format!("expected a boolean, got {value}")))?;
                sheet.write_boolean(row, col, b)?
            }
            ColumnKind::DateTime => {
                let dt = value
                    .as_str()
                    .and_then(|s| s.parse::<NaiveDateTime>().ok())
                    .ok_or_else(|| bad(format!("expected a date-time, got {value}")))?;
                sheet.write_string(row, col, self.render_date_time(dt))?
            }
            ColumnKind::Date => {
                let d = value
                    .as_str()
                    .and_then(|s| s.parse::<NaiveDate>().ok())
                    .ok_or_else(|| bad(format!("expected a date, got {value}")))?;
                sheet.write_string(row, col, d.format(ISO_DATE).to_string())?
            }
        };
        Ok(())
    }

    fn read_cell(&self, cell: &Data, kind: ColumnKind) -> Result<Value, String> {
        if matches!(cell, Data::Empty) {
            return Ok(match kind {
                ColumnKind::Text => Value::String(String::new()),
                _ => Value::Null,
            });
        }

        match kind {
            ColumnKind::Text => Ok(Value::String(match cell {
                Data::String(s) => s.clone(),
                Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
                other => other.to_string(),
            })),
            ColumnKind::Integer => match cell {
                Data::Int(i) => Ok(Value::from(*i)),
                Data::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT as f64 => {
                    Ok(Value::from(*f as i64))
                }
                Data::Float(f) if f.fract() == 0.0 => {
                    Err(format!("{f} is too large to be read as an exact integer"))
                }
                Data::String(s) => {
                    let s = s.trim();
                    s.parse::<i64>()
                        .map(Value::from)
                        .or_else(|_| s.parse::<u64>().map(Value::from))
                        .map_err(|_| format!("'{s}' is not an integer"))
                }
                other => Err(format!("'{other}' is not an integer")),
            },
            ColumnKind::Float => {
                let f = match cell {
                    Data::Float(f) => Some(*f),
                    Data::Int(i) => Some(*i as f64),
                    Data::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                f.and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("'{cell}' is not a number"))
            }
            ColumnKind::Boolean => match cell {
                Data::Bool(b) => Ok(Value::Bool(*b)),
                Data::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Data::String(s) if s.trim().eq_ignore_ascii_case("false") => {
                    Ok(Value::Bool(false))
                }
                other => Err(format!("'{other}' is not a boolean")),
            },
            ColumnKind::DateTime => {
                let dt = match cell {
                    Data::String(s) | Data::DateTimeIso(s) => self.parse_date_time(s),
                    other => other.as_datetime(),
                };
                dt.map(|dt| Value::String(dt.format(ISO_DATE_TIME).to_string()))
                    .ok_or_else(|| format!("'{cell}' is not a date-time"))
            }
            ColumnKind::Date => {
                let d = match cell {
                    Data::String(s) | Data::DateTimeIso(s) => {
                        let s = s.trim();
                        NaiveDate::parse_from_str(s, ISO_DATE)
                            .ok()
                            .or_else(|| self.parse_date_time(s).map(|dt| dt.date()))
                    }
                    other => other.as_date(),
                };
                d.map(|d| Value::String(d.format(ISO_DATE).to_string()))
                    .ok_or_else(|| format!("'{cell}' is not a date"))
            }
        }
    }

    /// `dt` in the configured format, or ISO 8601 when that format would not
    /// read back to the same instant (sub-second parts, date-only formats).
    fn render_date_time(&self, dt: NaiveDateTime) -> String {
        let mut text = String::new();
        if write!(text, "{}", dt.format(&self.date_format)).is_ok()
            && self.parse_date_time(&text) == Some(dt)
        {
            return text;
        }
        dt.format(ISO_DATE_TIME).to_string()
    }

    fn parse_date_time(&self, s: &str) -> Option<NaiveDateTime> {
        let s = s.trim();
        NaiveDateTime::parse_from_str(s, &self.date_format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, &self.date_format)
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
            .or_else(|| s.parse::<NaiveDateTime>().ok())
    }
}

impl Default for XlsxCodec {
    fn default() -> Self {
        Self::new("%Y-%m-%d %H:%M:%S")
    }
}

impl TableCodec for XlsxCodec {
    fn content_type(&self) -> &'static str {
        XLSX_CONTENT_TYPE
    }

    fn extension(&self) -> &'static str {
        "xlsx"
    }

    fn encode(
        &self,
        records: &[Value],
        schema: &RecordSchema,
        sheet_name: &str,
    ) -> Result<Bytes, CodecError> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();

        {
            let sheet = workbook.add_worksheet();
            sheet.set_name(sheet_name)?;

            for (c, column) in schema.columns().iter().enumerate() {
                let col = u16::try_from(c).map_err(|_| CodecError::OutOfBounds)?;
                sheet.write_string_with_format(0, col, &column.header, &header)?;
            }

            for (r, record) in records.iter().enumerate() {
                let row = u32::try_from(r + 1).map_err(|_| CodecError::OutOfBounds)?;
                let obj = record.as_object().ok_or(CodecError::NotAnObject(r))?;
                for (c, column) in schema.columns().iter().enumerate() {
                    let col = u16::try_from(c).map_err(|_| CodecError::OutOfBounds)?;
                    if let Some(value) = obj.get(&column.field) {
                        self.write_cell(sheet, row, col, column, value)?;
                    }
                }
            }

            sheet.autofit();
        }

        Ok(Bytes::from(workbook.save_to_buffer()?))
    }

    fn decode(&self, bytes: &[u8], schema: &RecordSchema) -> Result<Vec<Value>, CodecError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(CodecError::NoWorksheet)??;

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(Vec::new());
        };
        let mapping: Vec<Option<&Column>> = header_row
            .iter()
            .map(|cell| schema.column_for_header(&cell.to_string()))
            .collect();

        let mut records = Vec::new();
        for (i, row) in rows.enumerate() {
            if row.iter().all(|c| matches!(c, Data::Empty)) {
                continue;
            }

            let mut obj = Map::with_capacity(schema.columns().len());
            for (cell, column) in row.iter().zip(&mapping) {
                let Some(column) = column else { continue };
                let value = self
                    .read_cell(cell, column.kind)
                    .map_err(|message| CodecError::Cell {
                        // header is row 1
                        row: i + 2,
                        column: column.header.clone(),
                        message,
                    })?;
                obj.insert(column.field.clone(), value);
            }
            for column in schema.columns() {
                obj.entry(column.field.clone()).or_insert(Value::Null);
            }
            records.push(Value::Object(obj));
        }

        Ok(records)
    }
}
