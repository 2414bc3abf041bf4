//! Typed cell storage.
//!
//! A column stores exactly one representation at a time. Reads are tolerant:
//! a row past the end, or a read for another type, yields the type default.

use chrono::{NaiveDateTime, SubsecRound};

use crate::error::{ColumnError, ColumnResult};
use crate::types::ColumnDataType;

/// A single cell, tagged with its representation.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Double(f64),
    Text(String),
    DateTime(Option<NaiveDateTime>),
}

impl CellValue {
    pub fn data_type(&self) -> ColumnDataType {
        match self {
            CellValue::Double(_) => ColumnDataType::Double,
            CellValue::Text(_) => ColumnDataType::Text,
            CellValue::DateTime(_) => ColumnDataType::DateTime,
        }
    }

    pub fn default_for(data_type: ColumnDataType) -> CellValue {
        match data_type {
            ColumnDataType::Double => CellValue::Double(0.0),
            ColumnDataType::Text => CellValue::Text(String::new()),
            ColumnDataType::DateTime => CellValue::DateTime(None),
        }
    }
}

/// Cell buffer of a column; `None` date-times are null timestamps.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    Double(Vec<f64>),
    Text(Vec<String>),
    DateTime(Vec<Option<NaiveDateTime>>),
}

macro_rules! each_vec {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ColumnData::Double($v) => $body,
            ColumnData::Text($v) => $body,
            ColumnData::DateTime($v) => $body,
        }
    };
}

fn replace_vec<T: Clone + Default>(dst: &mut Vec<T>, first: usize, src: &[T]) {
    let end = first + src.len();
    if dst.len() < end {
        dst.resize(end, T::default());
    }
    dst[first..end].clone_from_slice(src);
}

fn clamp_range(len: usize, first: usize, count: usize) -> std::ops::Range<usize> {
    let start = first.min(len);
    let end = first.saturating_add(count).min(len);
    start..end
}

impl ColumnData {
    pub fn new(data_type: ColumnDataType) -> Self {
        match data_type {
            ColumnDataType::Double => ColumnData::Double(Vec::new()),
            ColumnDataType::Text => ColumnData::Text(Vec::new()),
            ColumnDataType::DateTime => ColumnData::DateTime(Vec::new()),
        }
    }

    /// Builds storage of `data_type` from cells; cells of another type become defaults.
    pub fn from_cells(data_type: ColumnDataType, cells: Vec<CellValue>) -> Self {
        let mut data = ColumnData::new(data_type);
        for cell in cells {
            data.push(cell);
        }
        data
    }

    pub fn data_type(&self) -> ColumnDataType {
        match self {
            ColumnData::Double(_) => ColumnDataType::Double,
            ColumnData::Text(_) => ColumnDataType::Text,
            ColumnData::DateTime(_) => ColumnDataType::DateTime,
        }
    }

    pub fn len(&self) -> usize {
        each_vec!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value_at(&self, row: usize) -> f64 {
        match self {
            ColumnData::Double(v) => v.get(row).copied().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn text_at(&self, row: usize) -> &str {
        match self {
            ColumnData::Text(v) => v.get(row).map(String::as_str).unwrap_or(""),
            _ => "",
        }
    }

    pub fn date_time_at(&self, row: usize) -> Option<NaiveDateTime> {
        match self {
            ColumnData::DateTime(v) => v.get(row).copied().flatten(),
            _ => None,
        }
    }

    pub fn cell_at(&self, row: usize) -> CellValue {
        match self {
            ColumnData::Double(_) => CellValue::Double(self.value_at(row)),
            ColumnData::Text(_) => CellValue::Text(self.text_at(row).to_string()),
            ColumnData::DateTime(_) => CellValue::DateTime(self.date_time_at(row)),
        }
    }

    /// Appends one cell; a cell of another type appends the type default.
    pub fn push(&mut self, cell: CellValue) {
        match (self, cell) {
            (ColumnData::Double(v), CellValue::Double(x)) => v.push(x),
            (ColumnData::Text(v), CellValue::Text(x)) => v.push(x),
            (ColumnData::DateTime(v), CellValue::DateTime(x)) => v.push(x),
            (me, _) => me.resize(me.len() + 1),
        }
    }

    /// Overwrites `[first, first + values.len())`, growing storage if needed.
    pub fn replace_range(&mut self, first: usize, values: &ColumnData) -> ColumnResult<()> {
        match (self, values) {
            (ColumnData::Double(dst), ColumnData::Double(src)) => replace_vec(dst, first, src),
            (ColumnData::Text(dst), ColumnData::Text(src)) => replace_vec(dst, first, src),
            (ColumnData::DateTime(dst), ColumnData::DateTime(src)) => replace_vec(dst, first, src),
            (me, other) => {
                return Err(ColumnError::TypeMismatch {
                    expected: me.data_type(),
                    found: other.data_type(),
                })
            }
        }
        Ok(())
    }

    /// Copy of the rows `[first, first + count)` that exist.
    pub fn slice(&self, first: usize, count: usize) -> ColumnData {
        let range = clamp_range(self.len(), first, count);
        match self {
            ColumnData::Double(v) => ColumnData::Double(v[range].to_vec()),
            ColumnData::Text(v) => ColumnData::Text(v[range].to_vec()),
            ColumnData::DateTime(v) => ColumnData::DateTime(v[range].to_vec()),
        }
    }

    pub fn insert_empty_rows(&mut self, before: usize, count: usize) {
        let at = before.min(self.len());
        each_vec!(self, v => {
            v.splice(at..at, std::iter::repeat(Default::default()).take(count));
        })
    }

    pub fn insert_data(&mut self, before: usize, data: ColumnData) -> ColumnResult<()> {
        let at = before.min(self.len());
        match (self, data) {
            (ColumnData::Double(dst), ColumnData::Double(src)) => {
                dst.splice(at..at, src);
            }
            (ColumnData::Text(dst), ColumnData::Text(src)) => {
                dst.splice(at..at, src);
            }
            (ColumnData::DateTime(dst), ColumnData::DateTime(src)) => {
                dst.splice(at..at, src);
            }
            (me, other) => {
                return Err(ColumnError::TypeMismatch {
                    expected: me.data_type(),
                    found: other.data_type(),
                })
            }
        }
        Ok(())
    }

    /// Removes the existing rows of `[first, first + count)` and returns them.
    pub fn remove_rows(&mut self, first: usize, count: usize) -> ColumnData {
        let range = clamp_range(self.len(), first, count);
        match self {
            ColumnData::Double(v) => ColumnData::Double(v.drain(range).collect()),
            ColumnData::Text(v) => ColumnData::Text(v.drain(range).collect()),
            ColumnData::DateTime(v) => ColumnData::DateTime(v.drain(range).collect()),
        }
    }

    /// Grows with type defaults or shrinks to `len` rows.
    pub fn resize(&mut self, len: usize) {
        each_vec!(self, v => v.resize(len, Default::default()))
    }

    pub fn truncate(&mut self, len: usize) {
        each_vec!(self, v => v.truncate(len))
    }

    pub fn clear(&mut self) {
        each_vec!(self, v => v.clear())
    }

    /// Drops sub-millisecond precision from timestamps, the finest
    /// resolution the persisted format keeps.
    pub fn truncate_to_millis(&mut self) {
        if let ColumnData::DateTime(v) = self {
            for dt in v.iter_mut().flatten() {
                *dt = dt.trunc_subsecs(3);
            }
        }
    }
}
