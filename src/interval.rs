//! Row intervals and the sets built from them.
//!
//! `IntervalSet` tracks masked and invalid rows, `IntervalMap` tracks rows
//! tagged with a formula. Both keep their intervals sorted and disjoint and
//! re-index themselves when rows are inserted or removed, so an interval
//! keeps pointing at the same logical rows.

use std::fmt;

/// Inclusive row range `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Interval {
    start: usize,
    end: usize,
}

impl Interval {
    /// Builds `[start, end]`; bounds given in the wrong order are swapped.
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Interval { start, end }
        } else {
            Interval { start: end, end: start }
        }
    }

    pub fn single(row: usize) -> Self {
        Interval { start: row, end: row }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, row: usize) -> bool {
        self.start <= row && row <= self.end
    }

    pub fn contains_interval(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Overlapping or directly adjacent.
    pub fn touches(&self, other: &Interval) -> bool {
        self.start <= other.end.saturating_add(1) && other.start <= self.end.saturating_add(1)
    }

    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        if self.intersects(other) {
            Some(Interval::new(self.start.max(other.start), self.end.min(other.end)))
        } else {
            None
        }
    }

    /// Restricts the interval to rows `[0, len)`.
    pub fn clamp_to(&self, len: usize) -> Option<Interval> {
        if len == 0 || self.start >= len {
            None
        } else {
            Some(Interval::new(self.start, self.end.min(len - 1)))
        }
    }

    /// The parts of `self` not covered by `other` (zero, one or two pieces).
    pub fn subtract(&self, other: &Interval) -> Vec<Interval> {
        if !self.intersects(other) {
            return vec![*self];
        }
        let mut pieces = Vec::with_capacity(2);
        if self.start < other.start {
            pieces.push(Interval::new(self.start, other.start - 1));
        }
        if self.end > other.end {
            pieces.push(Interval::new(other.end + 1, self.end));
        }
        pieces
    }

    fn hull(&self, other: &Interval) -> Interval {
        Interval::new(self.start.min(other.start), self.end.max(other.end))
    }

    fn shifted_down(&self, count: usize) -> Interval {
        Interval::new(self.start + count, self.end + count)
    }

    fn shifted_up(&self, count: usize) -> Interval {
        Interval::new(self.start - count, self.end - count)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

// Splits an interval around an insertion point and shifts what follows it.
fn reindex_for_insert(iv: &Interval, before: usize, count: usize) -> Vec<Interval> {
    if iv.end < before {
        vec![*iv]
    } else if iv.start >= before {
        vec![iv.shifted_down(count)]
    } else {
        vec![
            Interval::new(iv.start, before - 1),
            Interval::new(before + count, iv.end + count),
        ]
    }
}

// Drops the removed rows from an interval and shifts the survivors up.
fn reindex_for_remove(iv: &Interval, removed: &Interval, count: usize) -> Vec<Interval> {
    iv.subtract(removed)
        .into_iter()
        .map(|piece| {
            if piece.start > removed.end {
                piece.shifted_up(count)
            } else {
                piece
            }
        })
        .collect()
}

/// Sorted set of disjoint, non-adjacent intervals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        IntervalSet { intervals: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter()
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    pub fn contains(&self, row: usize) -> bool {
        self.intervals
            .binary_search_by(|iv| {
                if iv.end < row {
                    std::cmp::Ordering::Less
                } else if iv.start > row {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// True when every row of `interval` is a member.
    pub fn contains_all(&self, interval: &Interval) -> bool {
        self.intervals.iter().any(|iv| iv.contains_interval(interval))
    }

    /// Union-insert; overlapping and adjacent intervals are merged.
    pub fn insert(&mut self, interval: Interval) {
        let mut merged = interval;
        let mut placed = false;
        let mut result = Vec::with_capacity(self.intervals.len() + 1);
        for iv in self.intervals.drain(..) {
            if iv.touches(&merged) {
                merged = merged.hull(&iv);
            } else if iv.end < merged.start {
                result.push(iv);
            } else {
                if !placed {
                    result.push(merged);
                    placed = true;
                }
                result.push(iv);
            }
        }
        if !placed {
            result.push(merged);
        }
        self.intervals = result;
    }

    pub fn remove(&mut self, interval: Interval) {
        self.intervals = self
            .intervals
            .iter()
            .flat_map(|iv| iv.subtract(&interval))
            .collect();
    }

    pub fn insert_rows(&mut self, before: usize, count: usize) {
        if count == 0 {
            return;
        }
        self.intervals = self
            .intervals
            .iter()
            .flat_map(|iv| reindex_for_insert(iv, before, count))
            .collect();
    }

    pub fn remove_rows(&mut self, first: usize, count: usize) {
        if count == 0 {
            return;
        }
        let removed = Interval::new(first, first + count - 1);
        let survivors: Vec<Interval> = self
            .intervals
            .iter()
            .flat_map(|iv| reindex_for_remove(iv, &removed, count))
            .collect();
        self.intervals.clear();
        for iv in survivors {
            self.insert(iv);
        }
    }

    /// Drops every row at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.intervals = self.intervals.iter().filter_map(|iv| iv.clamp_to(len)).collect();
    }
}

impl FromIterator<Interval> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = Interval>>(iter: I) -> Self {
        let mut set = IntervalSet::new();
        for iv in iter {
            set.insert(iv);
        }
        set
    }
}

/// Disjoint intervals each carrying a value, e.g. formula text.
///
/// Adjacent intervals are merged only when their values are equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntervalMap<T> {
    entries: Vec<(Interval, T)>,
}

impl<T> Default for IntervalMap<T> {
    fn default() -> Self {
        IntervalMap { entries: Vec::new() }
    }
}

impl<T: Clone + PartialEq> IntervalMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn intervals(&self) -> Vec<Interval> {
        self.entries.iter().map(|(iv, _)| *iv).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Interval, &T)> {
        self.entries.iter().map(|(iv, value)| (iv, value))
    }

    pub fn value_at(&self, row: usize) -> Option<&T> {
        self.entries
            .iter()
            .find(|(iv, _)| iv.contains(row))
            .map(|(_, value)| value)
    }

    /// Tags every row of `interval` with `value`, overriding earlier tags.
    pub fn set(&mut self, interval: Interval, value: T) {
        self.remove(interval);
        let pos = self
            .entries
            .iter()
            .position(|(iv, _)| iv.start > interval.start)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, (interval, value));
        self.coalesce();
    }

    pub fn remove(&mut self, interval: Interval) {
        self.entries = self
            .entries
            .iter()
            .flat_map(|(iv, value)| {
                iv.subtract(&interval)
                    .into_iter()
                    .map(move |piece| (piece, value.clone()))
            })
            .collect();
    }

    pub fn insert_rows(&mut self, before: usize, count: usize) {
        if count == 0 {
            return;
        }
        self.entries = self
            .entries
            .iter()
            .flat_map(|(iv, value)| {
                reindex_for_insert(iv, before, count)
                    .into_iter()
                    .map(move |piece| (piece, value.clone()))
            })
            .collect();
    }

    pub fn remove_rows(&mut self, first: usize, count: usize) {
        if count == 0 {
            return;
        }
        let removed = Interval::new(first, first + count - 1);
        self.entries = self
            .entries
            .iter()
            .flat_map(|(iv, value)| {
                reindex_for_remove(iv, &removed, count)
                    .into_iter()
                    .map(move |piece| (piece, value.clone()))
            })
            .collect();
        self.coalesce();
    }

    pub fn truncate(&mut self, len: usize) {
        self.entries = self
            .entries
            .iter()
            .filter_map(|(iv, value)| iv.clamp_to(len).map(|piece| (piece, value.clone())))
            .collect();
    }

    fn coalesce(&mut self) {
        let mut merged: Vec<(Interval, T)> = Vec::with_capacity(self.entries.len());
        for (iv, value) in self.entries.drain(..) {
            match merged.last_mut() {
                Some((last, last_value)) if *last_value == value && last.touches(&iv) => {
                    *last = last.hull(&iv);
                }
                _ => merged.push((iv, value)),
            }
        }
        self.entries = merged;
    }
}
