pub mod assemble;
pub mod cli;
pub mod column;
pub mod config;
pub mod describe;
pub mod emit;
pub mod error;
pub mod extract;
pub mod generate;
pub mod io_utils;
pub mod registry;
pub mod schema;
pub mod workbook;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

fn init_logging(verbosity: u8) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_tables", level_for(verbosity));
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!("Command line: {cli:?}");
    match cli.command {
        Commands::Generate(args) => generate::execute(&args),
        Commands::Describe(args) => describe::execute(&args),
    }
}
