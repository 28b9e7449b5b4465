//! Human-readable output formatting

use std::fmt::Write as _;

use crate::dump::{ArrayDump, StoreDump};
use crate::output::formatter::{CommandOutput, OutputData};
use crate::persist::{LoadReport, SaveReport};

pub fn format_human(result: &CommandOutput) -> String {
    let mut output = match &result.data {
        OutputData::Dump(dump) => format_dump(dump),
        OutputData::Check(report) => format_load(report),
        OutputData::Pack(report) => format_save(report),
        OutputData::Prune { load, save } => format!("{}\n{}", format_load(load), format_save(save)),
    };
    if let Some(ref message) = result.message {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(message);
    }
    output
}

fn format_array(out: &mut String, array: &ArrayDump) {
    let refs: Vec<String> = array.refs.iter().map(|m| format!("{:02X}", m)).collect();
    let _ = write!(
        out,
        "Array #{} ({}, owner {:02X}, refs [{}])",
        array.id,
        array.kind,
        array.owner,
        refs.join(", ")
    );
    if array.temporary {
        out.push_str(" temporary");
    }
    out.push('\n');
    for entry in &array.elements {
        let _ = writeln!(out, "  [{}] : {}", entry.key, entry.value);
    }
}

fn format_dump(dump: &StoreDump) -> String {
    if dump.arrays.is_empty() && dump.strings.is_empty() {
        return "No variables".to_string();
    }
    let mut output = String::new();
    for array in &dump.arrays {
        format_array(&mut output, array);
    }
    if !dump.strings.is_empty() {
        output.push_str("Strings\n-------\n");
        for string in &dump.strings {
            let _ = writeln!(output, "  #{:<6} owner {:02X} : \"{}\"", string.id, string.owner, string.data);
        }
    }
    output
}

fn format_load(report: &LoadReport) -> String {
    format!(
        "Load Summary\n\
         ------------\n\
         Version:        {}\n\
         Arrays:         {} ({} dropped)\n\
         Strings:        {} ({} dropped)\n\
         Nulled forms:   {}\n\
         Nulled arrays:  {}",
        report.version,
        report.arrays,
        report.dropped_arrays,
        report.strings,
        report.dropped_strings,
        report.nulled_forms,
        report.nulled_arrays
    )
}

fn format_save(report: &SaveReport) -> String {
    format!(
        "Save Summary\n\
         ------------\n\
         Arrays:         {} ({} pending skipped)\n\
         Strings:        {}",
        report.arrays, report.skipped, report.strings
    )
}
