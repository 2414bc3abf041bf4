//! Undo/redo log with macro grouping.
//!
//! Commands live in one arena (`commands`); `groups` partitions the arena
//! into contiguous ranges that are undone and redone as a unit. A plain
//! command forms a group of one, a macro forms a group of everything
//! executed between the outermost `begin_macro`/`end_macro` pair.
//! `cursor` counts the groups that are currently applied.

use std::ops::Range;

use tracing::{debug, warn};

/// A reversible mutation of `Target`.
pub trait UndoCommand {
    type Target;

    /// Applies (or re-applies) the mutation.
    fn redo(&mut self, target: &mut Self::Target);

    /// Reverts exactly what the last `redo` did.
    fn undo(&mut self, target: &mut Self::Target);

    /// Short description shown in undo menus and logs.
    fn text(&self) -> String;
}

#[derive(Clone, Debug)]
struct Group {
    label: String,
    range: Range<usize>,
}

#[derive(Debug)]
struct OpenMacro {
    label: String,
    start: usize,
    depth: usize,
}

#[derive(Debug)]
pub struct UndoStack<C> {
    commands: Vec<C>,
    groups: Vec<Group>,
    cursor: usize,
    open: Option<OpenMacro>,
}

impl<C> Default for UndoStack<C> {
    fn default() -> Self {
        UndoStack {
            commands: Vec::new(),
            groups: Vec::new(),
            cursor: 0,
            open: None,
        }
    }
}

impl<C: UndoCommand> UndoStack<C> {
    pub fn new() -> Self {
        Self::default()
    }

    // Discards every undone group; nothing can be redone afterwards.
    fn truncate_undone(&mut self) {
        if self.cursor < self.groups.len() {
            let keep = self.groups[self.cursor].range.start;
            self.groups.truncate(self.cursor);
            self.commands.truncate(keep);
        }
    }

    /// Applies `command` to `target` and records it.
    pub fn push(&mut self, mut command: C, target: &mut C::Target) {
        if self.open.is_none() {
            self.truncate_undone();
        }
        command.redo(target);
        debug!(command = %command.text(), "executed");
        let index = self.commands.len();
        self.commands.push(command);
        if self.open.is_none() {
            let label = self.commands[index].text();
            self.groups.push(Group {
                label,
                range: index..index + 1,
            });
            self.cursor = self.groups.len();
        }
    }

    pub fn begin_macro(&mut self, label: &str) {
        match self.open.as_mut() {
            Some(open) => open.depth += 1,
            None => {
                self.truncate_undone();
                debug!(label, "macro started");
                self.open = Some(OpenMacro {
                    label: label.to_string(),
                    start: self.commands.len(),
                    depth: 1,
                });
            }
        }
    }

    pub fn end_macro(&mut self) {
        let Some(open) = self.open.as_mut() else {
            warn!("end_macro without matching begin_macro ignored");
            return;
        };
        open.depth -= 1;
        if open.depth > 0 {
            return;
        }
        if let Some(open) = self.open.take() {
            let range = open.start..self.commands.len();
            debug!(label = %open.label, commands = range.len(), "macro finished");
            if !range.is_empty() {
                self.groups.push(Group {
                    label: open.label,
                    range,
                });
                self.cursor = self.groups.len();
            }
        }
    }

    pub fn in_macro(&self) -> bool {
        self.open.is_some()
    }

    /// Reverts the last applied group. Returns false when there was nothing to undo.
    pub fn undo(&mut self, target: &mut C::Target) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor -= 1;
        let group = self.groups[self.cursor].clone();
        for command in self.commands[group.range].iter_mut().rev() {
            command.undo(target);
        }
        debug!(label = %group.label, "undone");
        true
    }

    /// Re-applies the first undone group. Returns false when there was nothing to redo.
    pub fn redo(&mut self, target: &mut C::Target) -> bool {
        if !self.can_redo() {
            return false;
        }
        let group = self.groups[self.cursor].clone();
        for command in self.commands[group.range].iter_mut() {
            command.redo(target);
        }
        self.cursor += 1;
        debug!(label = %group.label, "redone");
        true
    }

    pub fn can_undo(&self) -> bool {
        self.open.is_none() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.open.is_none() && self.cursor < self.groups.len()
    }

    /// Number of recorded groups, applied or not.
    pub fn count(&self) -> usize {
        self.groups.len()
    }

    /// Number of applied groups.
    pub fn index(&self) -> usize {
        self.cursor
    }

    pub fn undo_text(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .map(|i| self.groups[i].label.as_str())
    }

    pub fn redo_text(&self) -> Option<&str> {
        self.groups.get(self.cursor).map(|g| g.label.as_str())
    }

    /// Forgets the whole history without touching the target.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.groups.clear();
        self.cursor = 0;
        self.open = None;
    }
}
