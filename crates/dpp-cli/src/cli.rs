use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dpp",
    about = "Panel passport reconciler: ledger ingestion, tiered disclosure, integrity checks",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file (defaults to ./dpp.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the disclosure API with the reconciliation engine in the background
    Serve(ServeArgs),
    /// Reconcile pending ledger events once and exit
    Sync(SyncArgs),
    /// Register passports from JSON files
    Register(RegisterArgs),
    /// Show a passport at a disclosure tier
    Show(ShowArgs),
    /// Recompute section hashes and compare them with recorded commitments
    Verify(VerifyArgs),
    /// Show the ledger cursor
    Cursor,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Serve reads only; do not start the engine
    #[arg(long)]
    pub no_engine: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Stop after this many cycles even if the ledger has more
    #[arg(long, default_value = "100")]
    pub max_cycles: u32,
}

#[derive(Args)]
pub struct RegisterArgs {
    /// Passport files; the entity id is the file stem unless --id is given
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Entity id (single file only)
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub entity_id: String,
    #[arg(short, long, default_value = "public")]
    pub tier: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Verify one entity instead of every registered one
    pub entity_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["dpp", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:8080".parse().unwrap()));
            assert!(!args.no_engine);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_register_many() {
        let cli = Cli::try_parse_from(["dpp", "register", "a.json", "b.json"]).unwrap();
        if let Command::Register(args) = cli.command {
            assert_eq!(args.paths.len(), 2);
            assert_eq!(args.id, None);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn register_requires_a_path() {
        assert!(Cli::try_parse_from(["dpp", "register"]).is_err());
    }

    #[test]
    fn parse_show_with_tier() {
        let cli = Cli::try_parse_from(["dpp", "show", "P1", "-t", "tier2"]).unwrap();
        if let Command::Show(args) = cli.command {
            assert_eq!(args.entity_id, "P1");
            assert_eq!(args.tier, "tier2");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_verify_all() {
        let cli = Cli::try_parse_from(["dpp", "verify"]).unwrap();
        assert!(matches!(cli.command, Command::Verify(VerifyArgs { entity_id: None })));
    }

    #[test]
    fn parse_global_flags() {
        let cli =
            Cli::try_parse_from(["dpp", "--format", "json", "-c", "x.toml", "cursor"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Command::Cursor));
    }
}
