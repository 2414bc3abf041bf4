//! Conversion filters between display text and typed cells.
//!
//! Every column mode owns one input filter (text to cell) and one output
//! filter (cell to text). The set of filters is closed, so they are plain
//! enums selected by `ColumnMode`.

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Duration, Month, NaiveDate, NaiveDateTime, SubsecRound, Weekday};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;

use crate::error::{XmlError, XmlResult};
use crate::interval::{Interval, IntervalSet};
use crate::storage::{CellValue, ColumnData};
use crate::types::{ColumnDataType, ColumnMode};

/// Element name both filters serialise themselves as.
pub const FILTER_ELEMENT: &str = "simple_filter";

/// Julian day number of 1970-01-01 00:00.
pub const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

pub const DEFAULT_NUMERIC_DIGITS: usize = 6;
/// Upper bound on the `digits` of a numeric output filter.
pub const MAX_NUMERIC_DIGITS: usize = 16;
pub const DATE_TIME_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
pub const MONTH_DISPLAY_FORMAT: &str = "%B";
pub const DAY_DISPLAY_FORMAT: &str = "%A";

/// Fixed timestamp layout of persisted columns (`yyyy-dd-MM hh:mm:ss:zzz`).
pub const PERSISTED_DATE_TIME_FORMAT: &str = "%Y-%d-%m %H:%M:%S:%3f";

const DATE_TIME_INPUT_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    PERSISTED_DATE_TIME_FORMAT,
];

const DATE_INPUT_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y"];

/// Notation used by the numeric output filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericFormat {
    Scientific,
    Fixed,
    Automatic,
}

impl NumericFormat {
    pub fn as_char(self) -> char {
        match self {
            NumericFormat::Scientific => 'e',
            NumericFormat::Fixed => 'f',
            NumericFormat::Automatic => 'g',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'e' | 'E' => Some(NumericFormat::Scientific),
            'f' | 'F' => Some(NumericFormat::Fixed),
            'g' | 'G' => Some(NumericFormat::Automatic),
            _ => None,
        }
    }
}

/// Text to cell conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFilter {
    String2Double,
    StringIdentity,
    String2Month,
    String2DayOfWeek,
    String2DateTime,
}

/// Cell to display text conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFilter {
    Double2String { format: NumericFormat, digits: usize },
    StringIdentity,
    DateTime2String { format: String },
}

impl InputFilter {
    pub fn for_mode(mode: ColumnMode) -> Self {
        match mode {
            ColumnMode::Numeric => InputFilter::String2Double,
            ColumnMode::Text => InputFilter::StringIdentity,
            ColumnMode::Month => InputFilter::String2Month,
            ColumnMode::Day => InputFilter::String2DayOfWeek,
            ColumnMode::DateTime => InputFilter::String2DateTime,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InputFilter::String2Double => "String2DoubleFilter",
            InputFilter::StringIdentity => "SimpleCopyThroughFilter",
            InputFilter::String2Month => "String2MonthFilter",
            InputFilter::String2DayOfWeek => "String2DayOfWeekFilter",
            InputFilter::String2DateTime => "String2DateTimeFilter",
        }
    }

    pub fn output_type(&self) -> ColumnDataType {
        match self {
            InputFilter::String2Double => ColumnDataType::Double,
            InputFilter::StringIdentity => ColumnDataType::Text,
            _ => ColumnDataType::DateTime,
        }
    }

    /// Parses `text`; `None` when the text does not describe a value.
    pub fn convert(&self, text: &str) -> Option<CellValue> {
        let trimmed = text.trim();
        match self {
            InputFilter::String2Double => trimmed.parse::<f64>().ok().map(CellValue::Double),
            InputFilter::StringIdentity => Some(CellValue::Text(text.to_string())),
            InputFilter::String2Month => parse_month(trimmed).map(|dt| CellValue::DateTime(Some(dt))),
            InputFilter::String2DayOfWeek => {
                parse_day_of_week(trimmed).map(|dt| CellValue::DateTime(Some(dt)))
            }
            InputFilter::String2DateTime => {
                parse_date_time(trimmed).map(|dt| CellValue::DateTime(Some(dt)))
            }
        }
    }

    pub fn save<W: std::io::Write>(&self, writer: &mut Writer<W>) -> XmlResult<()> {
        let mut elem = BytesStart::new(FILTER_ELEMENT);
        elem.push_attribute(("filter_name", self.name()));
        writer.write_event(Event::Empty(elem))?;
        Ok(())
    }

    /// Checks a persisted filter element against this filter.
    pub fn load(&self, elem: &BytesStart) -> XmlResult<()> {
        check_filter_name(elem, self.name())
    }
}

impl OutputFilter {
    pub fn for_mode(mode: ColumnMode) -> Self {
        match mode {
            ColumnMode::Numeric => OutputFilter::Double2String {
                format: NumericFormat::Automatic,
                digits: DEFAULT_NUMERIC_DIGITS,
            },
            ColumnMode::Text => OutputFilter::StringIdentity,
            ColumnMode::Month => OutputFilter::DateTime2String {
                format: MONTH_DISPLAY_FORMAT.to_string(),
            },
            ColumnMode::Day => OutputFilter::DateTime2String {
                format: DAY_DISPLAY_FORMAT.to_string(),
            },
            ColumnMode::DateTime => OutputFilter::DateTime2String {
                format: DATE_TIME_DISPLAY_FORMAT.to_string(),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFilter::Double2String { .. } => "Double2StringFilter",
            OutputFilter::StringIdentity => "SimpleCopyThroughFilter",
            OutputFilter::DateTime2String { .. } => "DateTime2StringFilter",
        }
    }

    pub fn input_type(&self) -> ColumnDataType {
        match self {
            OutputFilter::Double2String { .. } => ColumnDataType::Double,
            OutputFilter::StringIdentity => ColumnDataType::Text,
            OutputFilter::DateTime2String { .. } => ColumnDataType::DateTime,
        }
    }

    pub fn fits_mode(&self, mode: ColumnMode) -> bool {
        self.input_type() == mode.data_type()
    }

    pub fn format_cell(&self, cell: &CellValue) -> String {
        match (self, cell) {
            (OutputFilter::Double2String { format, digits }, CellValue::Double(v)) => {
                format_number(*v, *format, *digits)
            }
            (OutputFilter::StringIdentity, CellValue::Text(s)) => s.clone(),
            (OutputFilter::DateTime2String { format }, CellValue::DateTime(Some(dt))) => {
                format_date_time(dt, format)
            }
            _ => String::new(),
        }
    }

    pub fn save<W: std::io::Write>(&self, writer: &mut Writer<W>) -> XmlResult<()> {
        let mut elem = BytesStart::new(FILTER_ELEMENT);
        elem.push_attribute(("filter_name", self.name()));
        match self {
            OutputFilter::Double2String { format, digits } => {
                elem.push_attribute(("format", format.as_char().to_string().as_str()));
                elem.push_attribute(("digits", digits.to_string().as_str()));
            }
            OutputFilter::DateTime2String { format } => {
                elem.push_attribute(("format", format.as_str()));
            }
            OutputFilter::StringIdentity => {}
        }
        writer.write_event(Event::Empty(elem))?;
        Ok(())
    }

    /// Reads the parameters of a persisted filter of the same kind as `self`.
    pub fn load(&self, elem: &BytesStart) -> XmlResult<OutputFilter> {
        check_filter_name(elem, self.name())?;
        match self {
            OutputFilter::Double2String { format, digits } => {
                let format = match attribute(elem, "format")? {
                    Some(s) => {
                        let mut chars = s.chars();
                        match (chars.next().and_then(NumericFormat::from_char), chars.next()) {
                            (Some(f), None) => f,
                            _ => {
                                return Err(XmlError::InvalidFilterParameter {
                                    name: "format",
                                    value: s,
                                })
                            }
                        }
                    }
                    None => *format,
                };
                let digits = match attribute(elem, "digits")? {
                    Some(s) => match s.parse::<usize>() {
                        Ok(n) if n <= MAX_NUMERIC_DIGITS => n,
                        _ => {
                            return Err(XmlError::InvalidFilterParameter {
                                name: "digits",
                                value: s,
                            })
                        }
                    },
                    None => *digits,
                };
                Ok(OutputFilter::Double2String { format, digits })
            }
            OutputFilter::DateTime2String { format } => {
                let format = match attribute(elem, "format")? {
                    Some(s) if is_valid_date_time_format(&s) => s,
                    Some(s) => {
                        return Err(XmlError::InvalidFilterParameter {
                            name: "format",
                            value: s,
                        })
                    }
                    None => format.clone(),
                };
                Ok(OutputFilter::DateTime2String { format })
            }
            OutputFilter::StringIdentity => Ok(OutputFilter::StringIdentity),
        }
    }
}

pub(crate) fn attribute(elem: &BytesStart, name: &str) -> XmlResult<Option<String>> {
    match elem.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn check_filter_name(elem: &BytesStart, expected: &'static str) -> XmlResult<()> {
    let found = attribute(elem, "filter_name")?.unwrap_or_default();
    if found != expected {
        return Err(XmlError::FilterMismatch { expected, found });
    }
    Ok(())
}

/// True when `format` is a usable strftime pattern.
pub fn is_valid_date_time_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

pub fn format_date_time(dt: &NaiveDateTime, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", dt.format(format)).is_err() {
        out.clear();
    }
    out
}

/// Scientific notation with `digits` decimals and a signed two-digit exponent,
/// e.g. `1.5000e+02`.
pub fn format_scientific(v: f64, digits: usize) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let raw = format!("{:.*e}", digits, v);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => raw,
    }
}

fn trim_fraction(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub fn format_number(v: f64, format: NumericFormat, digits: usize) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let digits = digits.min(MAX_NUMERIC_DIGITS);
    match format {
        NumericFormat::Scientific => format_scientific(v, digits),
        NumericFormat::Fixed => format!("{:.*}", digits, v),
        NumericFormat::Automatic => {
            if v == 0.0 {
                return "0".to_string();
            }
            let precision = digits.max(1);
            let exp = v.abs().log10().floor() as i32;
            if exp < -4 || exp >= precision as i32 {
                let sci = format_scientific(v, precision - 1);
                match sci.split_once('e') {
                    Some((mantissa, exp)) => format!("{}e{}", trim_fraction(mantissa), exp),
                    None => sci,
                }
            } else {
                let decimals = (precision as i32 - 1 - exp).max(0) as usize;
                trim_fraction(&format!("{:.*}", decimals, v))
            }
        }
    }
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    for fmt in DATE_TIME_INPUT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.trunc_subsecs(3));
        }
    }
    for fmt in DATE_INPUT_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parses a timestamp in the persisted layout.
pub fn parse_persisted_date_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, PERSISTED_DATE_TIME_FORMAT).ok()
}

fn parse_month(text: &str) -> Option<NaiveDateTime> {
    let month = match text.parse::<u32>() {
        Ok(n) if (1..=12).contains(&n) => n,
        Ok(_) => return None,
        Err(_) => text.parse::<Month>().ok()?.number_from_month(),
    };
    NaiveDate::from_ymd_opt(1900, month, 1)?.and_hms_opt(0, 0, 0)
}

// 1900-01-01 is a Monday, so the first week of 1900 holds every weekday.
fn parse_day_of_week(text: &str) -> Option<NaiveDateTime> {
    let offset = match text.parse::<u32>() {
        Ok(n) if (1..=7).contains(&n) => n - 1,
        Ok(_) => return None,
        Err(_) => text.parse::<Weekday>().ok()?.num_days_from_monday(),
    };
    let date = NaiveDate::from_ymd_opt(1900, 1, 1)? + Duration::days(i64::from(offset));
    debug_assert_eq!(date.weekday().num_days_from_monday(), offset);
    date.and_hms_opt(0, 0, 0)
}

pub fn julian_day(dt: &NaiveDateTime) -> f64 {
    let utc = dt.and_utc();
    let seconds = utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) / 1e9;
    UNIX_EPOCH_JULIAN_DAY + seconds / SECONDS_PER_DAY
}

pub fn from_julian_day(jd: f64) -> Option<NaiveDateTime> {
    if !jd.is_finite() {
        return None;
    }
    let seconds = (jd - UNIX_EPOCH_JULIAN_DAY) * SECONDS_PER_DAY;
    // Millisecond resolution; sub-millisecond noise from the float is dropped.
    let millis = (seconds * 1000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    let millis = millis as i64;
    let nanos = (millis.rem_euclid(1000) * 1_000_000) as u32;
    DateTime::from_timestamp(millis.div_euclid(1000), nanos).map(|d| d.naive_utc())
}

/// Re-derives stored cells for a mode change.
///
/// Returns the converted storage and the rows whose value could not be
/// converted; those hold type defaults and are to be marked invalid.
pub fn derive_data(
    data: &ColumnData,
    old_output: &OutputFilter,
    new_input: &InputFilter,
) -> (ColumnData, IntervalSet) {
    let target = new_input.output_type();
    let mut failed = IntervalSet::new();
    if data.data_type() == target {
        return (data.clone(), failed);
    }
    let mut cells = Vec::with_capacity(data.len());
    for row in 0..data.len() {
        let converted = match (data, target) {
            (_, ColumnDataType::Text) => Some(CellValue::Text(old_output.format_cell(&data.cell_at(row)))),
            (ColumnData::Text(_), _) => new_input.convert(data.text_at(row)),
            (ColumnData::Double(_), ColumnDataType::DateTime) => {
                from_julian_day(data.value_at(row)).map(|dt| CellValue::DateTime(Some(dt)))
            }
            (ColumnData::DateTime(_), ColumnDataType::Double) => {
                data.date_time_at(row).map(|dt| CellValue::Double(julian_day(&dt)))
            }
            _ => None,
        };
        match converted {
            Some(cell) => cells.push(cell),
            None => {
                failed.insert(Interval::single(row));
                cells.push(CellValue::default_for(target));
            }
        }
    }
    (ColumnData::from_cells(target, cells), failed)
}
