//! `column-recon` command-line entry point.

use clap::{ColorChoice, Parser};
use recon_cli::logging::{LogConfig, LogFormat, init_logging};
use std::io::{self, IsTerminal};
use tracing::level_filters::LevelFilter;

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg, OverrideCommand};
use crate::commands::{
    list_mappings, load_config, run_override_clear, run_override_set, run_parity, run_reconcile,
    run_sources, run_types,
};
use crate::summary::{
    print_mappings, print_parity, print_record, print_run_summary, print_sources, print_types,
};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run_command(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run_command(cli: &Cli) -> anyhow::Result<i32> {
    let config = load_config(&cli.config)?;
    match &cli.command {
        Command::Run => {
            let report = run_reconcile(&config)?;
            print_run_summary(&report);
            Ok(i32::from(report.has_failures()))
        }
        Command::Mappings(args) => {
            print_mappings(&list_mappings(&config, args)?);
            Ok(0)
        }
        Command::Override(OverrideCommand::Set(args)) => {
            print_record(&run_override_set(&config, args)?);
            Ok(0)
        }
        Command::Override(OverrideCommand::Clear(args)) => {
            print_record(&run_override_clear(&config, args)?);
            Ok(0)
        }
        Command::Types => {
            print_types(&run_types(&config)?);
            Ok(0)
        }
        Command::Sources => {
            let report = run_sources(&config)?;
            print_sources(&report);
            Ok(i32::from(!report.is_complete()))
        }
        Command::Parity(args) => {
            let report = run_parity(&config, args)?;
            print_parity(&report);
            Ok(i32::from(!report.is_clean()))
        }
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
