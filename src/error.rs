//! Error types for column mutation and persistence.
//!
//! Reads never fail (out-of-range reads return defaults), so only mutations
//! that can be rejected up front and the XML loader report errors.

use thiserror::Error;

use crate::types::{ColumnDataType, ColumnMode};

/// Rejected column mutations. A rejected call leaves the column untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColumnError {
    /// Value or source column does not carry the column's data type
    #[error("type mismatch: column holds {expected}, got {found}")]
    TypeMismatch {
        expected: ColumnDataType,
        found: ColumnDataType,
    },

    /// Filter cannot serve the column's mode
    #[error("filter {filter} cannot be used in {mode} mode")]
    FilterMismatch { mode: ColumnMode, filter: &'static str },

    /// Numeric output filter asks for more digits than can be displayed
    #[error("{digits} digits requested, at most {max} supported")]
    TooManyDigits { digits: usize, max: usize },
}

/// Result type alias for column mutations
pub type ColumnResult<T> = Result<T, ColumnError>;

/// Errors raised while reading a persisted column.
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML read error: malformed document: {0} (loading failed)")]
    Malformed(#[from] quick_xml::Error),

    #[error("XML read error: malformed attribute: {0} (loading failed)")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("XML write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML read error: {0} (loading failed)")]
    Rejected(#[from] ColumnError),

    #[error("XML read error: no column element found (loading failed)")]
    NoColumnElement,

    #[error("XML read error: unexpected end of document (loading failed)")]
    UnexpectedEof,

    #[error("XML read error: column label missing (loading failed)")]
    MissingLabel,

    #[error("XML read error: column type missing (loading failed)")]
    MissingType,

    #[error("XML read error: column mode missing (loading failed)")]
    MissingMode,

    #[error("XML read error: {kind} invalid: '{value}' (loading failed)")]
    UnknownEnumerant { kind: &'static str, value: String },

    #[error("XML read error: column type or mode invalid (loading failed)")]
    TypeModeMismatch,

    #[error("XML read error: unexpected filter '{found}', expected '{expected}' (loading failed)")]
    FilterMismatch { expected: &'static str, found: String },

    #[error("XML read error: invalid filter parameter {name}='{value}' (loading failed)")]
    InvalidFilterParameter { name: &'static str, value: String },

    #[error("XML read error: missing start or end row in <{element}> (loading failed)")]
    MissingInterval { element: &'static str },

    #[error("XML read error: invalid start or end row in <{element}> (loading failed)")]
    InvalidInterval { element: &'static str },

    #[error("XML read error: invalid or missing row type (loading failed)")]
    InvalidRowType,

    #[error("XML read error: invalid or missing row index (loading failed)")]
    InvalidRowIndex,

    #[error("XML read error: invalid row value '{value}' (loading failed)")]
    InvalidRowValue { value: String },
}

/// Result type alias for XML persistence
pub type XmlResult<T> = Result<T, XmlError>;
