pub mod column;
pub mod error;
pub mod filter;
pub mod interval;
pub mod storage;
pub mod types;
pub mod undo;
pub mod xml;

pub use column::{AbstractColumn, Column, ColumnCommand, ColumnEvent};
pub use error::{ColumnError, ColumnResult, XmlError, XmlResult};
pub use filter::{InputFilter, NumericFormat, OutputFilter};
pub use interval::{Interval, IntervalMap, IntervalSet};
pub use storage::{CellValue, ColumnData};
pub use types::{ColumnDataType, ColumnMode, PlotDesignation};
pub use undo::{UndoCommand, UndoStack};

// Line-oriented editor over a single column, shared by the binary and tests
#[cfg(feature = "cli_app")]
pub mod cli_app {
    use std::fmt::Write as _;
    use std::fs;

    use tracing::info;

    use crate::column::Column;
    use crate::interval::Interval;
    use crate::types::{ColumnMode, PlotDesignation};
    use crate::xml::MAX_ROWS;

    /// Rows shown per screen.
    pub const DISPLAY_ROWS: usize = 10;

    /// A column together with its viewport.
    #[derive(Debug)]
    pub struct Session {
        pub column: Column,
        pub top_row: usize,
    }

    impl Session {
        pub fn new(column: Column) -> Self {
            Session { column, top_row: 0 }
        }
    }

    /// Keeps the viewport inside the column; a short column shows from row 0.
    pub fn clamp_viewport(total_rows: usize, top_row: &mut usize) {
        let max_top = total_rows.saturating_sub(DISPLAY_ROWS);
        if *top_row > max_top {
            *top_row = max_top;
        }
    }

    /// Case-insensitive mode name, e.g. `numeric` or `DateTime`.
    pub fn parse_mode(name: &str) -> Option<ColumnMode> {
        ColumnMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }

    pub fn parse_designation(name: &str) -> Option<PlotDesignation> {
        if name.eq_ignore_ascii_case("none") {
            return Some(PlotDesignation::None);
        }
        name.parse().ok()
    }

    fn row_flags(column: &Column, row: usize) -> String {
        let mut flags = String::new();
        flags.push(if column.is_masked(row) { 'M' } else { '-' });
        flags.push(if column.is_invalid(row) { 'I' } else { '-' });
        flags.push(if column.formula(row).is_some() { 'F' } else { '-' });
        flags
    }

    /// Renders the header line and the visible rows.
    pub fn render(session: &Session) -> String {
        let column = &session.column;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} [{}, {}] rows={}",
            column.name(),
            column.column_mode(),
            column.plot_designation(),
            column.row_count()
        );
        let end = (session.top_row + DISPLAY_ROWS).min(column.row_count());
        for row in session.top_row..end {
            let _ = writeln!(
                out,
                "{:<5} {:<4} {:<12}",
                row + 1,
                row_flags(column, row),
                column.display_text(row)
            );
        }
        out
    }

    pub fn display_grid(session: &Session) {
        print!("{}", render(session));
    }

    fn parse_row(text: &str) -> Option<usize> {
        text.parse::<usize>().ok().filter(|r| *r >= 1).map(|r| r - 1)
    }

    // `<start> [end]`, one-based and inclusive.
    fn parse_span(parts: &[&str]) -> Option<Interval> {
        match parts {
            [start] => parse_row(start).map(Interval::single),
            [start, end] => Some(Interval::new(parse_row(start)?, parse_row(end)?)),
            _ => None,
        }
    }

    fn save_to(column: &Column, path: &str) -> Result<(), String> {
        let xml = column.to_xml_string().map_err(|e| e.to_string())?;
        fs::write(path, xml).map_err(|e| e.to_string())
    }

    fn load_from(column: &mut Column, path: &str) -> Result<(), String> {
        let xml = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let mut reader = quick_xml::Reader::from_str(&xml);
        column.load(&mut reader).map_err(|e| e.to_string())
    }

    /// Executes one editor command. Rows are one-based on the command line.
    pub fn process_command(session: &mut Session, cmd: &str, status_msg: &mut String) {
        let (word, rest) = match cmd.split_once(' ') {
            Some((word, rest)) => (word, rest.trim()),
            None => (cmd, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();
        let column = &mut session.column;

        if cmd == "w" {
            session.top_row = session.top_row.saturating_sub(DISPLAY_ROWS);
        } else if cmd == "s" {
            session.top_row += DISPLAY_ROWS;
            clamp_viewport(column.row_count(), &mut session.top_row);
        } else if word == "scroll_to" {
            match args.as_slice() {
                [row] => match parse_row(row) {
                    Some(row) if row < column.row_count() => session.top_row = row,
                    Some(_) => *status_msg = "Row out of bounds".to_string(),
                    None => *status_msg = "Invalid row".to_string(),
                },
                _ => *status_msg = "Invalid command".to_string(),
            }
        } else if word == "set" {
            match rest.split_once(' ').map(|(r, t)| (parse_row(r), t)) {
                // one row past the end appends
                Some((Some(row), _)) if row > column.row_count() => {
                    *status_msg = "Row out of bounds".to_string()
                }
                Some((Some(row), text)) => {
                    column.set_text_input(row, text);
                    if column.is_invalid(row) {
                        *status_msg = "Invalid value".to_string();
                    }
                }
                Some((None, _)) => *status_msg = "Invalid row".to_string(),
                None => *status_msg = "Invalid command".to_string(),
            }
        } else if word == "insert" || word == "remove" {
            let parsed = match args.as_slice() {
                [row, count] => parse_row(row).zip(count.parse::<usize>().ok()),
                _ => None,
            };
            match parsed {
                Some((_, count))
                    if word == "insert" && count > MAX_ROWS.saturating_sub(column.row_count()) =>
                {
                    *status_msg = "Too many rows".to_string()
                }
                Some((row, count)) if word == "insert" => column.insert_rows(row, count),
                Some((row, count)) => {
                    column.remove_rows(row, count);
                    clamp_viewport(column.row_count(), &mut session.top_row);
                }
                None => *status_msg = "Invalid command".to_string(),
            }
        } else if matches!(word, "mask" | "unmask" | "invalid" | "valid") {
            match parse_span(&args) {
                Some(span) => match word {
                    "mask" => column.set_masked_interval(span, true),
                    "unmask" => column.set_masked_interval(span, false),
                    "invalid" => column.set_invalid_interval(span, true),
                    _ => column.set_invalid_interval(span, false),
                },
                None => *status_msg = "Invalid range".to_string(),
            }
        } else if word == "formula" {
            let mut parts = rest.splitn(3, ' ');
            let span = match (parts.next(), parts.next()) {
                (Some(start), Some(end)) => parse_span(&[start, end]),
                _ => None,
            };
            match span {
                Some(span) => column.set_formula_interval(span, parts.next().unwrap_or("")),
                None => *status_msg = "Invalid range".to_string(),
            }
        } else if word == "mode" {
            match parse_mode(rest) {
                Some(mode) => column.set_column_mode(mode),
                None => *status_msg = "Unknown mode".to_string(),
            }
        } else if word == "pd" {
            match parse_designation(rest) {
                Some(pd) => column.set_plot_designation(pd),
                None => *status_msg = "Unknown designation".to_string(),
            }
        } else if word == "comment" {
            column.set_comment(rest);
        } else if cmd == "clear" {
            column.clear();
            session.top_row = 0;
        } else if cmd == "clear_masks" {
            column.clear_masks();
        } else if cmd == "clear_validity" {
            column.clear_validity();
        } else if cmd == "clear_formulas" {
            column.clear_formulas();
        } else if cmd == "undo" {
            if !column.undo() {
                *status_msg = "Nothing to undo".to_string();
            }
            clamp_viewport(column.row_count(), &mut session.top_row);
        } else if cmd == "redo" {
            if !column.redo() {
                *status_msg = "Nothing to redo".to_string();
            }
            clamp_viewport(column.row_count(), &mut session.top_row);
        } else if word == "save" && !rest.is_empty() {
            match save_to(column, rest) {
                Ok(()) => {
                    info!(path = rest, "column saved");
                    *status_msg = "Saved".to_string();
                }
                Err(err) => *status_msg = err,
            }
        } else if word == "load" && !rest.is_empty() {
            match load_from(column, rest) {
                Ok(()) => {
                    info!(path = rest, "column loaded");
                    *status_msg = "Loaded".to_string();
                }
                Err(err) => *status_msg = err,
            }
            session.top_row = 0;
        } else {
            *status_msg = "unrecognized cmd".to_string();
        }
    }
}
