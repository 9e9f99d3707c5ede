//! Output formatting for CLI

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON, or `{}` if the value cannot be serialized
pub fn to_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

pub fn table<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl FieldRow {
    pub fn new(field: &str, value: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

/// One requested entry and how it resolved
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct EntryRow {
    #[tabled(rename = "Entry")]
    pub entry_id: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Title")]
    pub title: String,
    #[tabled(rename = "Detail")]
    pub detail: String,
}

/// Session snapshot after one navigation command
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct StepRow {
    #[tabled(rename = "#")]
    pub step: usize,
    #[tabled(rename = "Command")]
    pub command: String,
    #[tabled(rename = "Outcome")]
    pub outcome: String,
    #[tabled(rename = "Active")]
    pub active: String,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Service")]
    pub service: String,
}
