//! XML persistence of a column.
//!
//! ```text
//! <column creation_time=".." caption_spec=".." label=".." type=".." mode=".." plot_designation="..">
//!   <input_filter><simple_filter .../></input_filter>
//!   <output_filter><simple_filter .../></output_filter>
//!   <comment>..</comment>
//!   <mask start_row="N" end_row="M"/>
//!   <formula start_row="N" end_row="M">expr</formula>
//!   <row type=".." index="N" invalid="yes|no">value</row>
//! </column>
//! ```

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, warn};

use crate::column::Column;
use crate::error::{XmlError, XmlResult};
use crate::filter::{
    attribute, format_date_time, format_scientific, parse_persisted_date_time, OutputFilter,
    FILTER_ELEMENT, PERSISTED_DATE_TIME_FORMAT,
};
use crate::interval::{Interval, IntervalSet};
use crate::storage::{CellValue, ColumnData};
use crate::types::{ColumnDataType, ColumnMode, PlotDesignation};

/// Digits after the decimal point of persisted numbers.
pub const NUMERIC_DIGITS: usize = 16;

/// Row indices at or past this bound are rejected on load.
pub const MAX_ROWS: usize = 1 << 24;

// Children of <column>, applied once the closing tag has been read.
#[derive(Default)]
struct Staged {
    comment: Option<String>,
    output_filter: Option<OutputFilter>,
    masks: Vec<Interval>,
    formulas: Vec<(Interval, String)>,
    rows: Vec<(usize, CellValue)>,
    invalid: IntervalSet,
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    elem: BytesStart,
    text: &str,
) -> XmlResult<()> {
    let end = BytesEnd::new(String::from_utf8_lossy(elem.name().as_ref()).into_owned());
    writer.write_event(Event::Start(elem))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(end))?;
    Ok(())
}

fn interval_element(name: &str, iv: &Interval) -> BytesStart<'static> {
    let mut elem = BytesStart::new(name.to_string());
    elem.push_attribute(("start_row", iv.start().to_string().as_str()));
    elem.push_attribute(("end_row", iv.end().to_string().as_str()));
    elem
}

fn cell_text(column: &Column, row: usize) -> String {
    match column.data_type() {
        ColumnDataType::Double => format_scientific(column.value_at(row), NUMERIC_DIGITS),
        ColumnDataType::Text => column.text_at(row).to_string(),
        ColumnDataType::DateTime => column
            .date_time_at(row)
            .map(|dt| format_date_time(&dt, PERSISTED_DATE_TIME_FORMAT))
            .unwrap_or_default(),
    }
}

// Text content of the element whose start tag was just read, up to its end tag.
fn read_text(reader: &mut Reader<&[u8]>) -> XmlResult<String> {
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Text(t) if depth == 0 => text.push_str(&t.unescape()?),
            Event::CData(c) if depth == 0 => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()))
            }
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                if depth == 0 {
                    return Ok(text);
                }
                depth -= 1;
            }
            Event::Eof => return Err(XmlError::UnexpectedEof),
            _ => {}
        }
    }
}

fn element_text(reader: &mut Reader<&[u8]>, empty: bool) -> XmlResult<String> {
    if empty {
        Ok(String::new())
    } else {
        read_text(reader)
    }
}

fn skip_element(reader: &mut Reader<&[u8]>) -> XmlResult<()> {
    read_text(reader).map(|_| ())
}

// The <simple_filter> inside an <input_filter>/<output_filter> wrapper.
fn read_filter<'i>(reader: &mut Reader<&'i [u8]>) -> XmlResult<Option<BytesStart<'i>>> {
    let mut found = None;
    loop {
        match reader.read_event()? {
            Event::Empty(e) if found.is_none() && e.name().as_ref() == FILTER_ELEMENT.as_bytes() => {
                found = Some(e);
            }
            Event::Start(e) => {
                skip_element(reader)?;
                if found.is_none() && e.name().as_ref() == FILTER_ELEMENT.as_bytes() {
                    found = Some(e);
                }
            }
            Event::End(_) => return Ok(found),
            Event::Eof => return Err(XmlError::UnexpectedEof),
            _ => {}
        }
    }
}

fn read_interval(elem: &BytesStart, element: &'static str) -> XmlResult<Interval> {
    let start = attribute(elem, "start_row")?.unwrap_or_default();
    let end = attribute(elem, "end_row")?.unwrap_or_default();
    if start.is_empty() || end.is_empty() {
        return Err(XmlError::MissingInterval { element });
    }
    match (start.trim().parse::<usize>(), end.trim().parse::<usize>()) {
        (Ok(start), Ok(end)) => Ok(Interval::new(start, end)),
        _ => Err(XmlError::InvalidInterval { element }),
    }
}

fn parse_cell(data_type: ColumnDataType, text: String) -> XmlResult<CellValue> {
    match data_type {
        ColumnDataType::Double => text
            .trim()
            .parse::<f64>()
            .map(CellValue::Double)
            .map_err(|_| XmlError::InvalidRowValue { value: text }),
        ColumnDataType::Text => Ok(CellValue::Text(text)),
        ColumnDataType::DateTime => {
            if text.is_empty() {
                return Ok(CellValue::DateTime(None));
            }
            parse_persisted_date_time(&text)
                .map(|dt| CellValue::DateTime(Some(dt)))
                .ok_or(XmlError::InvalidRowValue { value: text })
        }
    }
}

impl Column {
    /// Writes this column as one `<column>` element.
    pub fn save<W: Write>(&self, writer: &mut Writer<W>) -> XmlResult<()> {
        let mut start = BytesStart::new("column");
        let creation_time = format_date_time(&self.creation_time(), PERSISTED_DATE_TIME_FORMAT);
        start.push_attribute(("creation_time", creation_time.as_str()));
        start.push_attribute(("caption_spec", self.caption_spec()));
        start.push_attribute(("label", self.name()));
        start.push_attribute(("type", self.data_type().as_str()));
        start.push_attribute(("mode", self.column_mode().as_str()));
        start.push_attribute(("plot_designation", self.plot_designation().as_str()));
        writer.write_event(Event::Start(start))?;

        writer.write_event(Event::Start(BytesStart::new("input_filter")))?;
        self.input_filter().save(writer)?;
        writer.write_event(Event::End(BytesEnd::new("input_filter")))?;
        writer.write_event(Event::Start(BytesStart::new("output_filter")))?;
        self.output_filter().save(writer)?;
        writer.write_event(Event::End(BytesEnd::new("output_filter")))?;

        write_text_element(writer, BytesStart::new("comment"), self.comment())?;

        for iv in self.masked_intervals() {
            writer.write_event(Event::Empty(interval_element("mask", &iv)))?;
        }
        for iv in self.formula_intervals() {
            let formula = self.formula(iv.start()).unwrap_or_default();
            write_text_element(writer, interval_element("formula", &iv), formula)?;
        }

        let type_name = self.data_type().as_str();
        for row in 0..self.row_count() {
            let mut elem = BytesStart::new("row");
            elem.push_attribute(("type", type_name));
            elem.push_attribute(("index", row.to_string().as_str()));
            elem.push_attribute(("invalid", if self.is_invalid(row) { "yes" } else { "no" }));
            write_text_element(writer, elem, &cell_text(self, row))?;
        }

        writer.write_event(Event::End(BytesEnd::new("column")))?;
        Ok(())
    }

    pub fn to_xml_string(&self) -> XmlResult<String> {
        let mut writer = Writer::new(Vec::new());
        self.save(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    /// Builds a column from a document whose root is a `<column>` element.
    pub fn from_xml_str(xml: &str) -> XmlResult<Column> {
        let mut column = Column::new("", ColumnMode::Numeric);
        let mut reader = Reader::from_str(xml);
        column.load(&mut reader)?;
        column.clear_undo_stack();
        Ok(column)
    }

    /// Replaces this column's state with the next `<column>` element of `reader`.
    ///
    /// The column is reset first; on error it stays reset and partially
    /// described, and the whole load is one undo step either way.
    pub fn load(&mut self, reader: &mut Reader<&[u8]>) -> XmlResult<()> {
        self.begin_macro("load column");
        let result = self.load_column(reader);
        self.end_macro();
        match &result {
            Ok(()) => debug!(column = %self.name(), rows = self.row_count(), "column loaded"),
            Err(err) => warn!(%err, "column load failed"),
        }
        result
    }

    fn load_column(&mut self, reader: &mut Reader<&[u8]>) -> XmlResult<()> {
        self.clear();
        self.clear_validity();
        self.clear_formulas();
        self.clear_masks();
        self.set_comment("");

        let (start, has_children) = loop {
            match reader.read_event()? {
                Event::Start(e) => break (e, true),
                Event::Empty(e) => break (e, false),
                Event::Eof => return Err(XmlError::NoColumnElement),
                _ => {}
            }
        };
        if start.name().as_ref() != b"column" {
            return Err(XmlError::NoColumnElement);
        }
        self.read_column_attributes(&start)?;

        let mut staged = Staged::default();
        if has_children {
            self.read_children(reader, &mut staged)?;
        }
        self.apply(staged)
    }

    fn read_column_attributes(&mut self, start: &BytesStart) -> XmlResult<()> {
        let label = attribute(start, "label")?.unwrap_or_default();
        if label.is_empty() {
            return Err(XmlError::MissingLabel);
        }
        self.set_name(&label);

        if let Some(time) = attribute(start, "creation_time")? {
            match parse_persisted_date_time(&time) {
                Some(time) => self.set_creation_time(time),
                None => warn!(value = %time, "unreadable creation time ignored"),
            }
        }
        self.set_caption_spec(&attribute(start, "caption_spec")?.unwrap_or_default());

        let type_name = attribute(start, "type")?.unwrap_or_default();
        if type_name.is_empty() {
            return Err(XmlError::MissingType);
        }
        let data_type: ColumnDataType = type_name.parse()?;

        let mode_name = attribute(start, "mode")?.unwrap_or_default();
        if mode_name.is_empty() {
            return Err(XmlError::MissingMode);
        }
        let mode: ColumnMode = mode_name.parse()?;
        self.set_column_mode(mode);
        if data_type != self.data_type() {
            return Err(XmlError::TypeModeMismatch);
        }

        let pd_name = attribute(start, "plot_designation")?.unwrap_or_default();
        let pd = if pd_name.is_empty() {
            PlotDesignation::None
        } else {
            pd_name.parse()?
        };
        self.set_plot_designation(pd);
        Ok(())
    }

    fn read_children(&mut self, reader: &mut Reader<&[u8]>, staged: &mut Staged) -> XmlResult<()> {
        loop {
            let (elem, empty) = match reader.read_event()? {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                Event::End(_) => return Ok(()),
                Event::Eof => return Err(XmlError::UnexpectedEof),
                _ => continue,
            };
            match elem.name().as_ref() {
                b"comment" => staged.comment = Some(element_text(reader, empty)?),
                b"input_filter" => {
                    if !empty {
                        if let Some(filter) = read_filter(reader)? {
                            self.input_filter().load(&filter)?;
                        }
                    }
                }
                b"output_filter" => {
                    if !empty {
                        if let Some(filter) = read_filter(reader)? {
                            staged.output_filter = Some(self.output_filter().load(&filter)?);
                        }
                    }
                }
                b"mask" => {
                    let iv = read_interval(&elem, "mask")?;
                    element_text(reader, empty)?;
                    staged.masks.push(iv);
                }
                b"formula" => {
                    let iv = read_interval(&elem, "formula")?;
                    staged.formulas.push((iv, element_text(reader, empty)?));
                }
                b"row" => {
                    let (index, invalid) = self.read_row_attributes(&elem)?;
                    let cell = parse_cell(self.data_type(), element_text(reader, empty)?)?;
                    if invalid {
                        staged.invalid.insert(Interval::single(index));
                    }
                    staged.rows.push((index, cell));
                }
                _ => {
                    element_text(reader, empty)?;
                }
            }
        }
    }

    fn read_row_attributes(&self, elem: &BytesStart) -> XmlResult<(usize, bool)> {
        let type_name = attribute(elem, "type")?.unwrap_or_default();
        match type_name.parse::<ColumnDataType>() {
            Ok(t) if t == self.data_type() => {}
            _ => return Err(XmlError::InvalidRowType),
        }
        let index = attribute(elem, "index")?
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|index| *index < MAX_ROWS)
            .ok_or(XmlError::InvalidRowIndex)?;
        let invalid = attribute(elem, "invalid")?.as_deref() == Some("yes");
        Ok((index, invalid))
    }

    fn apply(&mut self, staged: Staged) -> XmlResult<()> {
        let data_type = self.data_type();
        let mut len = 0;
        for (index, _) in staged.rows.iter() {
            len = len.max(index.checked_add(1).ok_or(XmlError::InvalidRowIndex)?);
        }
        let mut data = ColumnData::new(data_type);
        data.resize(len);
        for (index, cell) in staged.rows {
            data.replace_range(index, &ColumnData::from_cells(data_type, vec![cell]))?;
        }
        self.replace_data("load rows", 0, data)?;

        for iv in staged.invalid.iter() {
            self.set_invalid_interval(*iv, true);
        }
        for iv in staged.masks {
            self.set_masked_interval(iv, true);
        }
        for (iv, formula) in staged.formulas {
            self.set_formula_interval(iv, &formula);
        }
        if let Some(comment) = staged.comment {
            self.set_comment(&comment);
        }
        if let Some(filter) = staged.output_filter {
            self.set_output_filter(filter)?;
        }
        Ok(())
    }
}
