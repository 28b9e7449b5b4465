//! JSON output formatting

use crate::output::formatter::{CommandOutput, OutputData};
use serde_json::{json, Value};

pub fn format_json(result: &CommandOutput) -> String {
    let mut data: Value = match &result.data {
        OutputData::Dump(dump) => serde_json::to_value(dump).unwrap_or(json!(null)),
        OutputData::Check(report) => json!({ "check": report }),
        OutputData::Pack(report) => json!({ "saved": report }),
        OutputData::Prune { load, save } => json!({ "loaded": load, "saved": save }),
    };

    if let (Some(message), Value::Object(map)) = (&result.message, &mut data) {
        map.insert("message".to_string(), json!(message));
    }

    serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
}
