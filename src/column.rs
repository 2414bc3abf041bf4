//! The column aspect: typed cells plus masking, validity and formula tags.
//!
//! All state lives in `ColumnPrivate`. `Column` never edits it in place;
//! every mutation is a `ColumnCommand` pushed through the column's
//! `UndoStack`. Applied commands schedule notifications, which `Column`
//! delivers to its subscribers once the command has run.

use std::mem;
use std::sync::mpsc::{channel, Receiver, Sender};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};
use tracing::{trace, warn};

use crate::error::{ColumnError, ColumnResult};
use crate::filter::{derive_data, InputFilter, OutputFilter, MAX_NUMERIC_DIGITS};
use crate::interval::{Interval, IntervalMap, IntervalSet};
use crate::storage::{CellValue, ColumnData};
use crate::types::{ColumnDataType, ColumnMode, PlotDesignation};
use crate::undo::{UndoCommand, UndoStack};

/// Notifications delivered to column subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnEvent {
    DataChanged,
    MaskingChanged,
    DescriptionChanged,
    PlotDesignationChanged,
    ModeChanged,
    AboutToBeReplaced { replacement: String },
}

/// Read-only view of a column, as consumed by `Column::copy`.
pub trait AbstractColumn {
    fn name(&self) -> &str;
    fn data_type(&self) -> ColumnDataType;
    fn row_count(&self) -> usize;
    fn value_at(&self, row: usize) -> f64;
    fn text_at(&self, row: usize) -> &str;
    fn date_time_at(&self, row: usize) -> Option<NaiveDateTime>;
    fn is_invalid(&self, row: usize) -> bool;
    fn formula(&self, row: usize) -> Option<&str>;
    fn invalid_intervals(&self) -> Vec<Interval>;
    fn masked_intervals(&self) -> Vec<Interval>;
    fn formula_intervals(&self) -> Vec<Interval>;
}

/// Cells together with everything indexed by row.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnContent {
    pub data: ColumnData,
    pub invalid: IntervalSet,
    pub masked: IntervalSet,
    pub formulas: IntervalMap<String>,
}

impl ColumnContent {
    pub fn empty(data_type: ColumnDataType) -> Self {
        ColumnContent {
            data: ColumnData::new(data_type),
            invalid: IntervalSet::new(),
            masked: IntervalSet::new(),
            formulas: IntervalMap::new(),
        }
    }

    /// Snapshot of everything `source` holds.
    pub fn from_source(source: &dyn AbstractColumn) -> Self {
        let mut formulas = IntervalMap::new();
        for iv in source.formula_intervals() {
            let text = source.formula(iv.start()).unwrap_or_default().to_string();
            formulas.set(iv, text);
        }
        ColumnContent {
            data: read_rows(source, 0, source.row_count()),
            invalid: source.invalid_intervals().into_iter().collect(),
            masked: source.masked_intervals().into_iter().collect(),
            formulas,
        }
    }
}

fn read_rows(source: &dyn AbstractColumn, first: usize, count: usize) -> ColumnData {
    let rows = first..first + count;
    let mut data = match source.data_type() {
        ColumnDataType::Double => ColumnData::Double(rows.map(|r| source.value_at(r)).collect()),
        ColumnDataType::Text => {
            ColumnData::Text(rows.map(|r| source.text_at(r).to_string()).collect())
        }
        ColumnDataType::DateTime => {
            ColumnData::DateTime(rows.map(|r| source.date_time_at(r)).collect())
        }
    };
    data.truncate_to_millis();
    data
}

/// Row-indexed state saved by commands that shift or rewrite rows.
#[derive(Clone, Debug)]
pub struct RowsSnapshot {
    row_count: usize,
    data: ColumnData,
    invalid: IntervalSet,
    masked: IntervalSet,
    formulas: IntervalMap<String>,
}

/// Descriptive text fields of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextField {
    Name,
    Comment,
    CaptionSpec,
}

/// The column's state. Only commands mutate it.
#[derive(Clone, Debug)]
pub struct ColumnPrivate {
    name: String,
    comment: String,
    caption_spec: String,
    creation_time: NaiveDateTime,
    mode: ColumnMode,
    plot_designation: PlotDesignation,
    data: ColumnData,
    invalid: IntervalSet,
    masked: IntervalSet,
    formulas: IntervalMap<String>,
    input_filter: InputFilter,
    output_filter: OutputFilter,
    pending: Vec<ColumnEvent>,
}

impl ColumnPrivate {
    fn new(name: &str, mode: ColumnMode, data: ColumnData, invalid: IntervalSet) -> Self {
        let mut invalid = invalid;
        invalid.truncate(data.len());
        ColumnPrivate {
            name: name.to_string(),
            comment: String::new(),
            caption_spec: String::new(),
            creation_time: Local::now().naive_local().trunc_subsecs(3),
            mode,
            plot_designation: PlotDesignation::None,
            data,
            invalid,
            masked: IntervalSet::new(),
            formulas: IntervalMap::new(),
            input_filter: InputFilter::for_mode(mode),
            output_filter: OutputFilter::for_mode(mode),
            pending: Vec::new(),
        }
    }

    fn schedule(&mut self, event: ColumnEvent) {
        if !self.pending.contains(&event) {
            self.pending.push(event);
        }
    }

    fn swap_content(&mut self, content: &mut ColumnContent) {
        mem::swap(&mut self.data, &mut content.data);
        mem::swap(&mut self.invalid, &mut content.invalid);
        mem::swap(&mut self.masked, &mut content.masked);
        mem::swap(&mut self.formulas, &mut content.formulas);
    }

    fn text_field(&mut self, field: TextField) -> &mut String {
        match field {
            TextField::Name => &mut self.name,
            TextField::Comment => &mut self.comment,
            TextField::CaptionSpec => &mut self.caption_spec,
        }
    }

    fn snapshot_rows(&self, first: usize, count: usize) -> RowsSnapshot {
        RowsSnapshot {
            row_count: self.data.len(),
            data: self.data.slice(first, count),
            invalid: self.invalid.clone(),
            masked: self.masked.clone(),
            formulas: self.formulas.clone(),
        }
    }

    fn restore_intervals(&mut self, saved: &RowsSnapshot) {
        self.invalid = saved.invalid.clone();
        self.masked = saved.masked.clone();
        self.formulas = saved.formulas.clone();
    }

    // Content this column holds after switching its input filter to `input`.
    fn derive_content(&self, input: &InputFilter) -> ColumnContent {
        let (data, failed) = derive_data(&self.data, &self.output_filter, input);
        let mut invalid = self.invalid.clone();
        for iv in failed.iter() {
            invalid.insert(*iv);
        }
        ColumnContent {
            data,
            invalid,
            masked: self.masked.clone(),
            formulas: self.formulas.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn caption_spec(&self) -> &str {
        &self.caption_spec
    }

    pub fn creation_time(&self) -> NaiveDateTime {
        self.creation_time
    }

    pub fn mode(&self) -> ColumnMode {
        self.mode
    }

    pub fn plot_designation(&self) -> PlotDesignation {
        self.plot_designation
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn invalid(&self) -> &IntervalSet {
        &self.invalid
    }

    pub fn masked(&self) -> &IntervalSet {
        &self.masked
    }

    pub fn formulas(&self) -> &IntervalMap<String> {
        &self.formulas
    }

    pub fn input_filter(&self) -> &InputFilter {
        &self.input_filter
    }

    pub fn output_filter(&self) -> &OutputFilter {
        &self.output_filter
    }
}

/// One recorded column mutation.
///
/// Variants holding a value that is exchanged with the column state use
/// swap semantics: `redo` and `undo` both swap, so the variant always holds
/// whatever is not currently applied.
#[derive(Clone, Debug)]
pub enum ColumnCommand {
    SetMode {
        mode: ColumnMode,
        input: InputFilter,
        output: OutputFilter,
        content: Option<ColumnContent>,
    },
    FullCopy {
        content: ColumnContent,
    },
    Replace {
        label: &'static str,
        first: usize,
        data: ColumnData,
        invalid: Option<Vec<bool>>,
        saved: Option<RowsSnapshot>,
    },
    InsertRows {
        before: usize,
        count: usize,
        saved: Option<RowsSnapshot>,
    },
    RemoveRows {
        first: usize,
        count: usize,
        saved: Option<RowsSnapshot>,
    },
    SetPlotDesignation(PlotDesignation),
    Clear {
        content: ColumnContent,
    },
    ClearValidity(IntervalSet),
    ClearMasks(IntervalSet),
    ClearFormulas(IntervalMap<String>),
    SetInvalid {
        interval: Interval,
        invalid: bool,
        saved: Option<IntervalSet>,
    },
    SetMasked {
        interval: Interval,
        masked: bool,
        saved: Option<IntervalSet>,
    },
    SetFormula {
        interval: Interval,
        formula: String,
        saved: Option<IntervalMap<String>>,
    },
    SetText {
        field: TextField,
        value: String,
    },
    SetCreationTime(NaiveDateTime),
    SetOutputFilter(OutputFilter),
}

impl ColumnCommand {
    fn swap_mode(
        target: &mut ColumnPrivate,
        mode: &mut ColumnMode,
        input: &mut InputFilter,
        output: &mut OutputFilter,
        content: &mut ColumnContent,
    ) {
        mem::swap(&mut target.mode, mode);
        mem::swap(&mut target.input_filter, input);
        mem::swap(&mut target.output_filter, output);
        target.swap_content(content);
    }

    fn apply_invalid_flags(target: &mut ColumnPrivate, first: usize, flags: &[bool]) {
        for (offset, flag) in flags.iter().enumerate() {
            let row = Interval::single(first + offset);
            if *flag {
                target.invalid.insert(row);
            } else {
                target.invalid.remove(row);
            }
        }
    }

    fn schedule(&self, target: &mut ColumnPrivate) {
        match self {
            ColumnCommand::SetMode { .. } => {
                target.schedule(ColumnEvent::ModeChanged);
                target.schedule(ColumnEvent::DescriptionChanged);
                target.schedule(ColumnEvent::DataChanged);
            }
            ColumnCommand::FullCopy { .. }
            | ColumnCommand::Clear { .. }
            | ColumnCommand::InsertRows { .. }
            | ColumnCommand::RemoveRows { .. } => {
                target.schedule(ColumnEvent::DataChanged);
                target.schedule(ColumnEvent::MaskingChanged);
            }
            ColumnCommand::ClearMasks(_) | ColumnCommand::SetMasked { .. } => {
                target.schedule(ColumnEvent::MaskingChanged);
            }
            ColumnCommand::SetPlotDesignation(_) => {
                target.schedule(ColumnEvent::PlotDesignationChanged);
            }
            ColumnCommand::SetText { .. } | ColumnCommand::SetCreationTime(_) => {
                target.schedule(ColumnEvent::DescriptionChanged);
            }
            ColumnCommand::Replace { .. }
            | ColumnCommand::ClearValidity(_)
            | ColumnCommand::ClearFormulas(_)
            | ColumnCommand::SetInvalid { .. }
            | ColumnCommand::SetFormula { .. }
            | ColumnCommand::SetOutputFilter(_) => {
                target.schedule(ColumnEvent::DataChanged);
            }
        }
    }
}

impl UndoCommand for ColumnCommand {
    type Target = ColumnPrivate;

    fn redo(&mut self, target: &mut ColumnPrivate) {
        match self {
            ColumnCommand::SetMode {
                mode,
                input,
                output,
                content,
            } => {
                if content.is_none() {
                    *content = Some(target.derive_content(input));
                }
                if let Some(content) = content {
                    Self::swap_mode(target, mode, input, output, content);
                }
            }
            ColumnCommand::FullCopy { content } | ColumnCommand::Clear { content } => {
                target.swap_content(content);
            }
            ColumnCommand::Replace {
                first,
                data,
                invalid,
                saved,
                ..
            } => {
                *saved = Some(target.snapshot_rows(*first, data.len()));
                if let Err(err) = target.data.replace_range(*first, data) {
                    warn!(%err, "replace skipped");
                }
                if let Some(flags) = invalid {
                    Self::apply_invalid_flags(target, *first, flags);
                }
            }
            ColumnCommand::InsertRows {
                before,
                count,
                saved,
            } => {
                *saved = Some(target.snapshot_rows(0, 0));
                target.data.insert_empty_rows(*before, *count);
                target.invalid.insert_rows(*before, *count);
                target.masked.insert_rows(*before, *count);
                target.formulas.insert_rows(*before, *count);
            }
            ColumnCommand::RemoveRows {
                first,
                count,
                saved,
            } => {
                *saved = Some(target.snapshot_rows(*first, *count));
                target.data.remove_rows(*first, *count);
                target.invalid.remove_rows(*first, *count);
                target.masked.remove_rows(*first, *count);
                target.formulas.remove_rows(*first, *count);
            }
            ColumnCommand::SetPlotDesignation(pd) => mem::swap(&mut target.plot_designation, pd),
            ColumnCommand::ClearValidity(set) => mem::swap(&mut target.invalid, set),
            ColumnCommand::ClearMasks(set) => mem::swap(&mut target.masked, set),
            ColumnCommand::ClearFormulas(map) => mem::swap(&mut target.formulas, map),
            ColumnCommand::SetInvalid {
                interval,
                invalid,
                saved,
            } => {
                *saved = Some(target.invalid.clone());
                if *invalid {
                    target.invalid.insert(*interval);
                } else {
                    target.invalid.remove(*interval);
                }
            }
            ColumnCommand::SetMasked {
                interval,
                masked,
                saved,
            } => {
                *saved = Some(target.masked.clone());
                if *masked {
                    target.masked.insert(*interval);
                } else {
                    target.masked.remove(*interval);
                }
            }
            ColumnCommand::SetFormula {
                interval,
                formula,
                saved,
            } => {
                *saved = Some(target.formulas.clone());
                if formula.is_empty() {
                    target.formulas.remove(*interval);
                } else {
                    target.formulas.set(*interval, formula.clone());
                }
            }
            ColumnCommand::SetText { field, value } => mem::swap(target.text_field(*field), value),
            ColumnCommand::SetCreationTime(time) => mem::swap(&mut target.creation_time, time),
            ColumnCommand::SetOutputFilter(filter) => mem::swap(&mut target.output_filter, filter),
        }
        self.schedule(target);
    }

    fn undo(&mut self, target: &mut ColumnPrivate) {
        match self {
            ColumnCommand::SetMode {
                mode,
                input,
                output,
                content,
            } => {
                if let Some(content) = content {
                    Self::swap_mode(target, mode, input, output, content);
                }
            }
            ColumnCommand::Replace { first, saved, .. } => {
                if let Some(saved) = saved.take() {
                    if let Err(err) = target.data.replace_range(*first, &saved.data) {
                        warn!(%err, "undo of replace skipped");
                    }
                    target.data.truncate(saved.row_count);
                    target.restore_intervals(&saved);
                }
            }
            ColumnCommand::InsertRows { before, count, saved } => {
                if let Some(saved) = saved.take() {
                    target.data.remove_rows(*before, *count);
                    target.restore_intervals(&saved);
                }
            }
            ColumnCommand::RemoveRows { first, saved, .. } => {
                if let Some(saved) = saved.take() {
                    target.restore_intervals(&saved);
                    if let Err(err) = target.data.insert_data(*first, saved.data) {
                        warn!(%err, "undo of remove skipped");
                    }
                }
            }
            ColumnCommand::SetInvalid { saved, .. } => {
                if let Some(saved) = saved.take() {
                    target.invalid = saved;
                }
            }
            ColumnCommand::SetMasked { saved, .. } => {
                if let Some(saved) = saved.take() {
                    target.masked = saved;
                }
            }
            ColumnCommand::SetFormula { saved, .. } => {
                if let Some(saved) = saved.take() {
                    target.formulas = saved;
                }
            }
            // Swap commands: undoing is swapping back.
            ColumnCommand::FullCopy { content } | ColumnCommand::Clear { content } => {
                target.swap_content(content);
            }
            ColumnCommand::SetPlotDesignation(pd) => mem::swap(&mut target.plot_designation, pd),
            ColumnCommand::ClearValidity(set) => mem::swap(&mut target.invalid, set),
            ColumnCommand::ClearMasks(set) => mem::swap(&mut target.masked, set),
            ColumnCommand::ClearFormulas(map) => mem::swap(&mut target.formulas, map),
            ColumnCommand::SetText { field, value } => mem::swap(target.text_field(*field), value),
            ColumnCommand::SetCreationTime(time) => mem::swap(&mut target.creation_time, time),
            ColumnCommand::SetOutputFilter(filter) => mem::swap(&mut target.output_filter, filter),
        }
        self.schedule(target);
    }

    fn text(&self) -> String {
        match self {
            ColumnCommand::SetMode { mode, .. } => format!("change column mode to {}", mode),
            ColumnCommand::FullCopy { .. } => "copy column".to_string(),
            ColumnCommand::Replace { label, first, data, .. } => {
                format!("{} (rows {}..{})", label, first, first + data.len())
            }
            ColumnCommand::InsertRows { before, count, .. } => {
                format!("insert {} rows before {}", count, before)
            }
            ColumnCommand::RemoveRows { first, count, .. } => {
                format!("remove {} rows from {}", count, first)
            }
            ColumnCommand::SetPlotDesignation(_) => "set plot designation".to_string(),
            ColumnCommand::Clear { .. } => "clear column".to_string(),
            ColumnCommand::ClearValidity(_) => "mark all cells valid".to_string(),
            ColumnCommand::ClearMasks(_) => "unmask all cells".to_string(),
            ColumnCommand::ClearFormulas(_) => "clear all formulas".to_string(),
            ColumnCommand::SetInvalid { interval, invalid, .. } => {
                let state = if *invalid { "invalid" } else { "valid" };
                format!("mark {} {}", interval, state)
            }
            ColumnCommand::SetMasked { interval, masked, .. } => {
                let verb = if *masked { "mask" } else { "unmask" };
                format!("{} {}", verb, interval)
            }
            ColumnCommand::SetFormula { interval, .. } => format!("set formula of {}", interval),
            ColumnCommand::SetText { field, .. } => match field {
                TextField::Name => "rename column".to_string(),
                TextField::Comment => "change comment".to_string(),
                TextField::CaptionSpec => "change caption".to_string(),
            },
            ColumnCommand::SetCreationTime(_) => "set creation time".to_string(),
            ColumnCommand::SetOutputFilter(filter) => format!("set output filter {}", filter.name()),
        }
    }
}

/// A named, typed, undoable column of cells.
#[derive(Debug)]
pub struct Column {
    d: ColumnPrivate,
    undo_stack: UndoStack<ColumnCommand>,
    observers: Vec<Sender<ColumnEvent>>,
}

impl Column {
    pub fn new(name: &str, mode: ColumnMode) -> Self {
        Self::from_parts(name, mode, ColumnData::new(mode.data_type()), IntervalSet::new())
    }

    pub fn with_values(name: &str, values: Vec<f64>, invalid: IntervalSet) -> Self {
        Self::from_parts(name, ColumnMode::Numeric, ColumnData::Double(values), invalid)
    }

    pub fn with_texts(name: &str, texts: Vec<String>, invalid: IntervalSet) -> Self {
        Self::from_parts(name, ColumnMode::Text, ColumnData::Text(texts), invalid)
    }

    pub fn with_date_times(
        name: &str,
        values: Vec<Option<NaiveDateTime>>,
        invalid: IntervalSet,
    ) -> Self {
        Self::from_parts(name, ColumnMode::DateTime, ColumnData::DateTime(values), invalid)
    }

    fn from_parts(
        name: &str,
        mode: ColumnMode,
        mut data: ColumnData,
        invalid: IntervalSet,
    ) -> Self {
        data.truncate_to_millis();
        Column {
            d: ColumnPrivate::new(name, mode, data, invalid),
            undo_stack: UndoStack::new(),
            observers: Vec::new(),
        }
    }

    // --- notifications ---

    /// Registers an observer; it receives every event scheduled from now on.
    pub fn subscribe(&mut self) -> Receiver<ColumnEvent> {
        let (tx, rx) = channel();
        self.observers.push(tx);
        rx
    }

    fn deliver(&mut self, events: Vec<ColumnEvent>) {
        for event in events {
            trace!(column = %self.d.name, ?event, "notify");
            self.observers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    fn flush_events(&mut self) {
        let events = mem::take(&mut self.d.pending);
        self.deliver(events);
    }

    /// Tells subscribers this column is about to be replaced by `replacement`.
    pub fn notify_replacement(&mut self, replacement: &str) {
        self.deliver(vec![ColumnEvent::AboutToBeReplaced {
            replacement: replacement.to_string(),
        }]);
    }

    // --- undo ---

    fn exec(&mut self, command: ColumnCommand) {
        self.undo_stack.push(command, &mut self.d);
        self.flush_events();
    }

    pub fn undo(&mut self) -> bool {
        let done = self.undo_stack.undo(&mut self.d);
        self.flush_events();
        done
    }

    pub fn redo(&mut self) -> bool {
        let done = self.undo_stack.redo(&mut self.d);
        self.flush_events();
        done
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_stack.can_redo()
    }

    pub fn begin_macro(&mut self, label: &str) {
        self.undo_stack.begin_macro(label);
    }

    pub fn end_macro(&mut self) {
        self.undo_stack.end_macro();
    }

    pub fn undo_stack(&self) -> &UndoStack<ColumnCommand> {
        &self.undo_stack
    }

    /// Forgets the undo history; the current state becomes the baseline.
    pub fn clear_undo_stack(&mut self) {
        self.undo_stack.clear();
    }

    fn check_type(&self, found: ColumnDataType) -> ColumnResult<()> {
        let expected = self.data_type();
        if expected != found {
            warn!(column = %self.d.name, %expected, %found, "type mismatch");
            return Err(ColumnError::TypeMismatch { expected, found });
        }
        Ok(())
    }

    // --- structure ---

    pub fn set_column_mode(&mut self, mode: ColumnMode) {
        if mode == self.d.mode {
            return;
        }
        let label = format!("{}: change column type", self.d.name);
        self.begin_macro(&label);
        self.exec(ColumnCommand::SetMode {
            mode,
            input: InputFilter::for_mode(mode),
            output: OutputFilter::for_mode(mode),
            content: None,
        });
        self.end_macro();
    }

    /// Replaces the output filter; it must format this column's data type.
    pub fn set_output_filter(&mut self, filter: OutputFilter) -> ColumnResult<()> {
        if !filter.fits_mode(self.d.mode) {
            return Err(ColumnError::FilterMismatch {
                mode: self.d.mode,
                filter: filter.name(),
            });
        }
        if let OutputFilter::Double2String { digits, .. } = &filter {
            if *digits > MAX_NUMERIC_DIGITS {
                return Err(ColumnError::TooManyDigits {
                    digits: *digits,
                    max: MAX_NUMERIC_DIGITS,
                });
            }
        }
        if filter != self.d.output_filter {
            self.exec(ColumnCommand::SetOutputFilter(filter));
        }
        Ok(())
    }

    /// Copies cells, validity, masks and formulas of `other`.
    pub fn copy(&mut self, other: &dyn AbstractColumn) -> ColumnResult<()> {
        self.check_type(other.data_type())?;
        self.exec(ColumnCommand::FullCopy {
            content: ColumnContent::from_source(other),
        });
        Ok(())
    }

    /// Copies `num_rows` cells and their validity from `source`, starting at
    /// `source_start`, into this column starting at `dest_start`.
    ///
    /// Rows the source does not have are not copied.
    pub fn copy_rows(
        &mut self,
        source: &dyn AbstractColumn,
        source_start: usize,
        dest_start: usize,
        num_rows: usize,
    ) -> ColumnResult<()> {
        self.check_type(source.data_type())?;
        let count = num_rows.min(source.row_count().saturating_sub(source_start));
        if count == 0 {
            return Ok(());
        }
        let invalid = (source_start..source_start + count)
            .map(|row| source.is_invalid(row))
            .collect();
        self.exec(ColumnCommand::Replace {
            label: "copy rows",
            first: dest_start,
            data: read_rows(source, source_start, count),
            invalid: Some(invalid),
            saved: None,
        });
        Ok(())
    }

    pub fn insert_rows(&mut self, before: usize, count: usize) {
        if count == 0 {
            return;
        }
        self.exec(ColumnCommand::InsertRows {
            before: before.min(self.row_count()),
            count,
            saved: None,
        });
    }

    pub fn remove_rows(&mut self, first: usize, count: usize) {
        let rows = self.row_count();
        if count == 0 || first >= rows {
            return;
        }
        self.exec(ColumnCommand::RemoveRows {
            first,
            count: count.min(rows - first),
            saved: None,
        });
    }

    pub fn set_plot_designation(&mut self, pd: PlotDesignation) {
        if pd != self.d.plot_designation {
            self.exec(ColumnCommand::SetPlotDesignation(pd));
        }
    }

    /// Removes every row; intervals go with the rows.
    pub fn clear(&mut self) {
        self.exec(ColumnCommand::Clear {
            content: ColumnContent::empty(self.data_type()),
        });
    }

    pub fn clear_validity(&mut self) {
        self.exec(ColumnCommand::ClearValidity(IntervalSet::new()));
    }

    pub fn clear_masks(&mut self) {
        self.exec(ColumnCommand::ClearMasks(IntervalSet::new()));
    }

    pub fn clear_formulas(&mut self) {
        self.exec(ColumnCommand::ClearFormulas(IntervalMap::new()));
    }

    // --- row attributes ---

    pub fn set_invalid_interval(&mut self, interval: Interval, invalid: bool) {
        if let Some(interval) = interval.clamp_to(self.row_count()) {
            self.exec(ColumnCommand::SetInvalid {
                interval,
                invalid,
                saved: None,
            });
        }
    }

    pub fn set_invalid(&mut self, row: usize, invalid: bool) {
        self.set_invalid_interval(Interval::single(row), invalid);
    }

    pub fn set_masked_interval(&mut self, interval: Interval, masked: bool) {
        if let Some(interval) = interval.clamp_to(self.row_count()) {
            self.exec(ColumnCommand::SetMasked {
                interval,
                masked,
                saved: None,
            });
        }
    }

    pub fn set_masked(&mut self, row: usize, masked: bool) {
        self.set_masked_interval(Interval::single(row), masked);
    }

    /// Tags every row of `interval` with `formula`; an empty formula removes the tag.
    pub fn set_formula_interval(&mut self, interval: Interval, formula: &str) {
        if let Some(interval) = interval.clamp_to(self.row_count()) {
            self.exec(ColumnCommand::SetFormula {
                interval,
                formula: formula.to_string(),
                saved: None,
            });
        }
    }

    pub fn set_formula(&mut self, row: usize, formula: &str) {
        self.set_formula_interval(Interval::single(row), formula);
    }

    // --- description ---

    fn set_text_field(&mut self, field: TextField, value: &str) {
        let current = match field {
            TextField::Name => &self.d.name,
            TextField::Comment => &self.d.comment,
            TextField::CaptionSpec => &self.d.caption_spec,
        };
        if current != value {
            self.exec(ColumnCommand::SetText {
                field,
                value: value.to_string(),
            });
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.set_text_field(TextField::Name, name);
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.set_text_field(TextField::Comment, comment);
    }

    pub fn set_caption_spec(&mut self, caption_spec: &str) {
        self.set_text_field(TextField::CaptionSpec, caption_spec);
    }

    pub fn set_creation_time(&mut self, time: NaiveDateTime) {
        let time = time.trunc_subsecs(3);
        if time != self.d.creation_time {
            self.exec(ColumnCommand::SetCreationTime(time));
        }
    }

    // --- cells ---

    pub(crate) fn replace_data(
        &mut self,
        label: &'static str,
        first: usize,
        mut data: ColumnData,
    ) -> ColumnResult<()> {
        self.check_type(data.data_type())?;
        data.truncate_to_millis();
        if !data.is_empty() {
            self.exec(ColumnCommand::Replace {
                label,
                first,
                data,
                invalid: None,
                saved: None,
            });
        }
        Ok(())
    }

    pub fn set_value_at(&mut self, row: usize, value: f64) -> ColumnResult<()> {
        self.replace_data("set value", row, ColumnData::Double(vec![value]))
    }

    pub fn replace_values(&mut self, first: usize, values: Vec<f64>) -> ColumnResult<()> {
        self.replace_data("replace values", first, ColumnData::Double(values))
    }

    pub fn set_text_at(&mut self, row: usize, text: &str) -> ColumnResult<()> {
        self.replace_data("set text", row, ColumnData::Text(vec![text.to_string()]))
    }

    pub fn replace_texts(&mut self, first: usize, texts: Vec<String>) -> ColumnResult<()> {
        self.replace_data("replace texts", first, ColumnData::Text(texts))
    }

    pub fn set_date_time_at(&mut self, row: usize, value: NaiveDateTime) -> ColumnResult<()> {
        self.replace_data("set date/time", row, ColumnData::DateTime(vec![Some(value)]))
    }

    pub fn replace_date_times(
        &mut self,
        first: usize,
        values: Vec<Option<NaiveDateTime>>,
    ) -> ColumnResult<()> {
        self.replace_data("replace dates/times", first, ColumnData::DateTime(values))
    }

    /// Sets the date of `row`, keeping its time of day (midnight if unset).
    pub fn set_date_at(&mut self, row: usize, date: NaiveDate) -> ColumnResult<()> {
        let time = self.time_at(row).unwrap_or_default();
        self.set_date_time_at(row, date.and_time(time))
    }

    /// Sets the time of day of `row`, keeping its date (1970-01-01 if unset).
    pub fn set_time_at(&mut self, row: usize, time: NaiveTime) -> ColumnResult<()> {
        let date = self.date_at(row).unwrap_or_default();
        self.set_date_time_at(row, date.and_time(time))
    }

    /// Feeds `text` through the input filter into `row`.
    ///
    /// Text the filter cannot convert stores the default cell and marks the
    /// row invalid; converted text marks it valid.
    pub fn set_text_input(&mut self, row: usize, text: &str) {
        let data_type = self.data_type();
        let (cell, valid) = match self.d.input_filter.convert(text) {
            Some(cell) => (cell, true),
            None => (CellValue::default_for(data_type), false),
        };
        let mut data = ColumnData::from_cells(data_type, vec![cell]);
        data.truncate_to_millis();
        self.exec(ColumnCommand::Replace {
            label: "enter text",
            first: row,
            data,
            invalid: Some(vec![!valid]),
            saved: None,
        });
    }

    // --- reads ---

    pub fn name(&self) -> &str {
        &self.d.name
    }

    pub fn comment(&self) -> &str {
        &self.d.comment
    }

    pub fn caption_spec(&self) -> &str {
        &self.d.caption_spec
    }

    pub fn creation_time(&self) -> NaiveDateTime {
        self.d.creation_time
    }

    pub fn data_type(&self) -> ColumnDataType {
        self.d.data.data_type()
    }

    pub fn column_mode(&self) -> ColumnMode {
        self.d.mode
    }

    pub fn plot_designation(&self) -> PlotDesignation {
        self.d.plot_designation
    }

    pub fn input_filter(&self) -> &InputFilter {
        &self.d.input_filter
    }

    pub fn output_filter(&self) -> &OutputFilter {
        &self.d.output_filter
    }

    pub fn row_count(&self) -> usize {
        self.d.data.len()
    }

    pub fn value_at(&self, row: usize) -> f64 {
        self.d.data.value_at(row)
    }

    pub fn text_at(&self, row: usize) -> &str {
        self.d.data.text_at(row)
    }

    pub fn date_time_at(&self, row: usize) -> Option<NaiveDateTime> {
        self.d.data.date_time_at(row)
    }

    pub fn date_at(&self, row: usize) -> Option<NaiveDate> {
        self.date_time_at(row).map(|dt| dt.date())
    }

    pub fn time_at(&self, row: usize) -> Option<NaiveTime> {
        self.date_time_at(row).map(|dt| dt.time())
    }

    /// The cell of `row` rendered by the output filter.
    pub fn display_text(&self, row: usize) -> String {
        if row >= self.row_count() {
            return String::new();
        }
        self.d.output_filter.format_cell(&self.d.data.cell_at(row))
    }

    pub fn is_invalid(&self, row: usize) -> bool {
        self.d.invalid.contains(row)
    }

    pub fn is_invalid_interval(&self, interval: &Interval) -> bool {
        self.d.invalid.contains_all(interval)
    }

    pub fn is_masked(&self, row: usize) -> bool {
        self.d.masked.contains(row)
    }

    pub fn is_masked_interval(&self, interval: &Interval) -> bool {
        self.d.masked.contains_all(interval)
    }

    pub fn formula(&self, row: usize) -> Option<&str> {
        self.d.formulas.value_at(row).map(String::as_str)
    }

    pub fn invalid_intervals(&self) -> Vec<Interval> {
        self.d.invalid.intervals().to_vec()
    }

    pub fn masked_intervals(&self) -> Vec<Interval> {
        self.d.masked.intervals().to_vec()
    }

    pub fn formula_intervals(&self) -> Vec<Interval> {
        self.d.formulas.intervals()
    }

    /// Full internal state, for inspection.
    pub fn state(&self) -> &ColumnPrivate {
        &self.d
    }
}

impl AbstractColumn for Column {
    fn name(&self) -> &str {
        Column::name(self)
    }

    fn data_type(&self) -> ColumnDataType {
        Column::data_type(self)
    }

    fn row_count(&self) -> usize {
        Column::row_count(self)
    }

    fn value_at(&self, row: usize) -> f64 {
        Column::value_at(self, row)
    }

    fn text_at(&self, row: usize) -> &str {
        Column::text_at(self, row)
    }

    fn date_time_at(&self, row: usize) -> Option<NaiveDateTime> {
        Column::date_time_at(self, row)
    }

    fn is_invalid(&self, row: usize) -> bool {
        Column::is_invalid(self, row)
    }

    fn formula(&self, row: usize) -> Option<&str> {
        Column::formula(self, row)
    }

    fn invalid_intervals(&self) -> Vec<Interval> {
        Column::invalid_intervals(self)
    }

    fn masked_intervals(&self) -> Vec<Interval> {
        Column::masked_intervals(self)
    }

    fn formula_intervals(&self) -> Vec<Interval> {
        Column::formula_intervals(self)
    }
}
