//! Command line front end

mod args;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

pub use args::{Args, SubCommand};

use crate::config::Config;
use crate::context::Session;
use crate::dump::StoreDump;
use crate::output::{CommandOutput, OutputData};
use crate::persist::{LoadReport, MemoryStream, ModuleMap, SaveReport};

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn module_map(list: Option<&str>) -> Result<ModuleMap> {
    match list {
        Some(list) => ModuleMap::parse(list).with_context(|| format!("invalid --modules {:?}", list)),
        None => Ok(ModuleMap::identity()),
    }
}

fn read_save(session: &Session, path: &Path, modules: &ModuleMap) -> Result<LoadReport> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "loading save");
    let mut stream = MemoryStream::from_bytes(bytes);
    session
        .load(&mut stream, modules)
        .with_context(|| format!("failed to load {}", path.display()))
}

fn write_save(session: &Session, path: &Path) -> Result<SaveReport> {
    let mut stream = MemoryStream::new();
    let report = session.save(&mut stream)?;
    fs::write(path, stream.into_bytes()).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(report)
}

/// Execute one command against a fresh session
pub fn run(args: &Args) -> Result<CommandOutput> {
    let session = Session::new(load_config(args.config.as_deref())?);

    match &args.command {
        SubCommand::Dump { save, modules } => {
            read_save(&session, save, &module_map(modules.as_deref())?)?;
            Ok(CommandOutput::new(OutputData::Dump(StoreDump::capture(&session))))
        }

        SubCommand::Check { save, modules } => {
            let report = read_save(&session, save, &module_map(modules.as_deref())?)?;
            Ok(CommandOutput::new(OutputData::Check(report)))
        }

        SubCommand::Pack { input, output } => {
            let content = fs::read_to_string(input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let dump: StoreDump = serde_json::from_str(&content)
                .with_context(|| format!("{} is not a valid dump", input.display()))?;
            dump.apply(&session)?;
            let report = write_save(&session, output)?;
            Ok(CommandOutput::new(OutputData::Pack(report)).with_message(format!("Wrote {}", output.display())))
        }

        SubCommand::Prune { save, output, modules } => {
            let load = read_save(&session, save, &module_map(Some(modules))?)?;
            let saved = write_save(&session, output)?;
            Ok(CommandOutput::new(OutputData::Prune { load, save: saved }).with_message(format!("Wrote {}", output.display())))
        }
    }
}
