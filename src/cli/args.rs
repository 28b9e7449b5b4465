//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "dynvar")]
#[command(author, version, about = "Inspect and rewrite array variable saves", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON config file
    #[arg(long, global = true, env = "DYNVAR_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Print every array and string in a save
    Dump {
        save: PathBuf,

        /// Loaded modules as `old` or `old=new`, comma separated (default: all)
        #[arg(long, value_name = "LIST")]
        modules: Option<String>,
    },

    /// Build a save from a JSON dump
    Pack {
        /// JSON dump, as printed by `dump --json`
        input: PathBuf,

        /// Save file to write
        output: PathBuf,
    },

    /// Load a save with only the listed modules present and write it again
    Prune {
        save: PathBuf,

        output: PathBuf,

        /// Modules to keep as `old` or `old=new`, comma separated
        #[arg(long, value_name = "LIST")]
        modules: String,
    },

    /// Load a save and report what it holds
    Check {
        save: PathBuf,

        /// Loaded modules as `old` or `old=new`, comma separated (default: all)
        #[arg(long, value_name = "LIST")]
        modules: Option<String>,
    },
}
