//! Output formatting

use crate::dump::StoreDump;
use crate::output::human::format_human;
use crate::output::json::format_json;
use crate::persist::{LoadReport, SaveReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Result of one CLI command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub data: OutputData,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub enum OutputData {
    /// Everything a save holds
    Dump(StoreDump),
    /// Counts and repairs from loading a save
    Check(LoadReport),
    /// A save written from a JSON dump
    Pack(SaveReport),
    /// A save loaded with some modules missing and written again
    Prune { load: LoadReport, save: SaveReport },
}

impl CommandOutput {
    pub fn new(data: OutputData) -> Self {
        Self { data, message: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

pub fn format_output(result: &CommandOutput, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_human(result),
        OutputFormat::Json => format_json(result),
    }
}
