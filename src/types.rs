use std::fmt;
use std::str::FromStr;

use crate::error::XmlError;

/// Storage representation of a column's cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnDataType {
    Double,
    Text,
    DateTime,
}

const DATA_TYPE_NAMES: [(ColumnDataType, &str); 3] = [
    (ColumnDataType::Double, "Double"),
    (ColumnDataType::Text, "QString"),
    (ColumnDataType::DateTime, "QDateTime"),
];

/// How a column's cells are interpreted and displayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnMode {
    Numeric,
    Text,
    Month,
    Day,
    DateTime,
}

const MODE_NAMES: [(ColumnMode, &str); 5] = [
    (ColumnMode::Numeric, "Numeric"),
    (ColumnMode::Text, "Text"),
    (ColumnMode::Month, "Month"),
    (ColumnMode::Day, "Day"),
    (ColumnMode::DateTime, "DateTime"),
];

/// Role a column plays when it is plotted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlotDesignation {
    #[default]
    None,
    X,
    Y,
    Z,
    XError,
    YError,
    Label,
}

const DESIGNATION_NAMES: [(PlotDesignation, &str); 7] = [
    (PlotDesignation::None, "noDesignation"),
    (PlotDesignation::X, "X"),
    (PlotDesignation::Y, "Y"),
    (PlotDesignation::Z, "Z"),
    (PlotDesignation::XError, "xErr"),
    (PlotDesignation::YError, "yErr"),
    (PlotDesignation::Label, "Label"),
];

fn name_of<T: PartialEq + Copy>(table: &[(T, &'static str)], value: T) -> &'static str {
    table
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, name)| *name)
        .unwrap_or("")
}

fn value_of<T: Copy>(table: &[(T, &'static str)], name: &str) -> Option<T> {
    table.iter().find(|(_, n)| *n == name).map(|(v, _)| *v)
}

impl ColumnDataType {
    pub fn as_str(self) -> &'static str {
        name_of(&DATA_TYPE_NAMES, self)
    }
}

impl ColumnMode {
    pub const ALL: [ColumnMode; 5] = [
        ColumnMode::Numeric,
        ColumnMode::Text,
        ColumnMode::Month,
        ColumnMode::Day,
        ColumnMode::DateTime,
    ];

    pub fn as_str(self) -> &'static str {
        name_of(&MODE_NAMES, self)
    }

    /// The storage type a column in this mode holds.
    pub fn data_type(self) -> ColumnDataType {
        match self {
            ColumnMode::Numeric => ColumnDataType::Double,
            ColumnMode::Text => ColumnDataType::Text,
            ColumnMode::Month | ColumnMode::Day | ColumnMode::DateTime => ColumnDataType::DateTime,
        }
    }
}

impl PlotDesignation {
    pub fn as_str(self) -> &'static str {
        name_of(&DESIGNATION_NAMES, self)
    }
}

impl FromStr for ColumnDataType {
    type Err = XmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        value_of(&DATA_TYPE_NAMES, s).ok_or_else(|| XmlError::UnknownEnumerant {
            kind: "column type",
            value: s.to_string(),
        })
    }
}

impl FromStr for ColumnMode {
    type Err = XmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        value_of(&MODE_NAMES, s).ok_or_else(|| XmlError::UnknownEnumerant {
            kind: "column mode",
            value: s.to_string(),
        })
    }
}

impl FromStr for PlotDesignation {
    type Err = XmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        value_of(&DESIGNATION_NAMES, s).ok_or_else(|| XmlError::UnknownEnumerant {
            kind: "column plot designation",
            value: s.to_string(),
        })
    }
}

impl fmt::Display for ColumnDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ColumnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PlotDesignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
