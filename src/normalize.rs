use serde::Serialize;

use crate::domain::FileResult;

pub const UNKNOWN_NAME: &str = "Unknown";

/// Colour family a resource type is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleKey {
    Red,
    Green,
    Blue,
    Purple,
    Orange,
    Gray,
    Yellow,
    Teal,
    Neutral,
}

/// A selectable entry of the file type picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeOption {
    pub label: &'static str,
    pub value: &'static str,
}

/// Picker order, which is not the same as the styling order below.
pub const FILE_TYPES: &[TypeOption] = &[
    TypeOption { label: "MU Sheet", value: "mu_sheet" },
    TypeOption { label: "Cut File", value: "cut_file" },
    TypeOption { label: "Low Res", value: "low_res" },
    TypeOption { label: "Assembly Instructions", value: "assembly_instructions" },
    TypeOption { label: "Print File", value: "print_files" },
    TypeOption { label: "Pictures", value: "pics" },
    TypeOption { label: "Set Up Instructions", value: "set_up" },
    TypeOption { label: "Technical Drawings", value: "technical_drawings" },
];

const STYLES: &[(&str, StyleKey)] = &[
    ("cut_file", StyleKey::Red),
    ("assembly_instructions", StyleKey::Green),
    ("print_files", StyleKey::Blue),
    ("low_res", StyleKey::Purple),
    ("mu_sheet", StyleKey::Orange),
    ("pics", StyleKey::Gray),
    ("set_up", StyleKey::Yellow),
    ("technical_drawings", StyleKey::Teal),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayCategory {
    pub label: String,
    pub style: StyleKey,
}

/// Name shown for a record: `filename`, else the last `abs_path` segment.
pub fn display_name(record: &FileResult) -> String {
    known_name(record).unwrap_or(UNKNOWN_NAME).to_string()
}

/// Name a downloaded record is saved under.
pub fn download_name(record: &FileResult) -> String {
    known_name(record)
        .map(str::to_string)
        .unwrap_or_else(|| fallback_download_name(record.id))
}

pub fn fallback_download_name(id: i64) -> String {
    format!("file_{id}")
}

pub fn display_category(record: &FileResult) -> DisplayCategory {
    DisplayCategory {
        label: record.resource_type.to_uppercase(),
        style: style_for(&record.resource_type),
    }
}

pub fn style_for(resource_type: &str) -> StyleKey {
    let lowered = resource_type.to_lowercase();
    STYLES
        .iter()
        .find(|(tag, _)| *tag == lowered)
        .map(|(_, style)| *style)
        .unwrap_or(StyleKey::Neutral)
}

/// Friendly picker label for a tag, or the tag itself when unregistered.
pub fn type_label(tag: &str) -> &str {
    FILE_TYPES
        .iter()
        .find(|option| option.value == tag)
        .map(|option| option.label)
        .unwrap_or(tag)
}

fn known_name(record: &FileResult) -> Option<&str> {
    if let Some(filename) = record.filename.as_deref().filter(|name| !name.is_empty()) {
        return Some(filename);
    }
    record
        .abs_path
        .rsplit(['/', '\\'])
        .next()
        .filter(|segment| !segment.is_empty())
}
