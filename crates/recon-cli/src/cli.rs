//! CLI argument definitions for `column-recon`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use recon_model::{MappingStatus, ObjectKind};

#[derive(Parser)]
#[command(
    name = "column-recon",
    version,
    about = "Reconcile documented columns against physical warehouse columns",
    long_about = "Reconcile documented columns against the physical columns of warehouse \
                  tables and views.\n\n\
                  Each run matches every documented column per environment, keeps manual \
                  overrides, skips objects whose definition did not change, and retires \
                  mappings whose column left the documentation."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file; relative input paths resolve against its directory.
    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        default_value = "column-recon.toml",
        global = true
    )]
    pub config: PathBuf,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a reconciliation over every page and environment.
    Run,

    /// List stored mapping records.
    Mappings(MappingsArgs),

    /// Set or clear a manual override.
    #[command(subcommand)]
    Override(OverrideCommand),

    /// Show how documented types resolve to warehouse types.
    Types,

    /// Check documented source tables against the resolver file.
    Sources,

    /// Compare definition snapshots between two environments.
    Parity(ParityArgs),
}

#[derive(Args)]
pub struct ParityArgs {
    /// Environment treated as the reference.
    #[arg(long = "source-env", value_name = "ENV", default_value = "DEV")]
    pub source_env: String,

    /// Environment compared against the reference.
    #[arg(long = "target-env", value_name = "ENV", default_value = "DEV")]
    pub target_env: String,

    /// Also write the report as Markdown to this file.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct MappingsArgs {
    /// Only records of this documentation page.
    #[arg(long, value_name = "ID")]
    pub page: Option<String>,

    /// Only records of this environment.
    #[arg(long = "env", value_name = "ENV")]
    pub environment: Option<String>,

    /// Only records with this status (e.g. MAPPED_FUZZY).
    #[arg(long, value_name = "STATUS")]
    pub status: Option<MappingStatus>,

    /// Include deactivated records.
    #[arg(long = "include-inactive")]
    pub include_inactive: bool,
}

#[derive(Subcommand)]
pub enum OverrideCommand {
    /// Pin a documented column to a physical column.
    Set(SetOverrideArgs),

    /// Remove a manual override so the next run re-evaluates the column.
    Clear(KeyArgs),
}

/// The five parts identifying a mapping record.
#[derive(Args)]
pub struct KeyArgs {
    #[arg(long, value_name = "ID")]
    pub page: String,

    /// Documented target field name.
    #[arg(long, value_name = "NAME")]
    pub target: String,

    /// Fully-qualified physical object name.
    #[arg(long, value_name = "FQDN")]
    pub fqdn: String,

    #[arg(long = "env", value_name = "ENV")]
    pub environment: String,

    /// Physical object kind (TABLE, VIEW, MATERIALIZED_VIEW, ...).
    #[arg(long, value_name = "KIND", default_value = "TABLE")]
    pub kind: ObjectKind,
}

#[derive(Args)]
pub struct SetOverrideArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Physical column to map to.
    #[arg(long, value_name = "COLUMN")]
    pub column: String,

    /// Rationale stored with the record.
    #[arg(long, value_name = "TEXT")]
    pub note: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn override_set_parses_key_and_column() {
        let cli = Cli::try_parse_from([
            "column-recon",
            "override",
            "set",
            "--page",
            "9001",
            "--target",
            "CUSIP",
            "--fqdn",
            "DB.S.T",
            "--env",
            "dev",
            "--kind",
            "view",
            "--column",
            "cusip_id",
        ])
        .unwrap();
        let Command::Override(OverrideCommand::Set(args)) = cli.command else {
            panic!("expected override set");
        };
        assert_eq!(args.key.kind, ObjectKind::View);
        assert_eq!(args.column, "cusip_id");
        assert!(args.note.is_none());
    }

    #[test]
    fn mappings_status_filter_is_parsed() {
        let cli = Cli::try_parse_from(["column-recon", "mappings", "--status", "mapped_fuzzy"])
            .unwrap();
        let Command::Mappings(args) = cli.command else {
            panic!("expected mappings");
        };
        assert_eq!(args.status, Some(MappingStatus::MappedFuzzy));
        assert_eq!(cli.config, PathBuf::from("column-recon.toml"));
    }

    #[test]
    fn parity_environments_are_parsed() {
        let cli = Cli::try_parse_from([
            "column-recon",
            "parity",
            "--source-env",
            "dev",
            "--target-env",
            "prod",
            "-o",
            "parity.md",
        ])
        .unwrap();
        let Command::Parity(args) = cli.command else {
            panic!("expected parity");
        };
        assert_eq!(args.source_env, "dev");
        assert_eq!(args.target_env, "prod");
        assert_eq!(args.output, Some(PathBuf::from("parity.md")));
    }
}
