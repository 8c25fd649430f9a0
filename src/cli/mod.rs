//! Command-line interface definitions.
//!
//! Defines the CLI structure for the tagdb binary using `clap`. Every
//! command except `delete-file` reads the configuration file and connects
//! the databases it lists before running.

pub mod config;
pub mod database;
pub mod output;
pub mod status;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tagged database connections and key/value helpers.
#[derive(Parser, Debug)]
#[command(name = "tagdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "tagdb.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the tagdb CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the configuration file and summarise its databases
    Config,

    /// Connect every configured database and show pool state
    Status,

    /// Check that configured databases answer a query
    Ping(PingArgs),

    /// Run a raw SQL statement on a tag
    Exec(ExecArgs),

    /// Create a database file beside a tag's database
    CreateDatabase(CreateDatabaseArgs),

    /// Drop a database created with create-database
    DropDatabase(DropDatabaseArgs),

    /// Delete a file-backed database
    DeleteFile(DeleteFileArgs),
}

/// Arguments for the `ping` subcommand.
#[derive(Parser, Debug)]
pub struct PingArgs {
    /// Only ping this tag (default: all configured tags)
    #[arg(long)]
    pub tag: Option<String>,
}

/// Arguments for the `exec` subcommand.
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Connection tag to run the statement on
    #[arg(long)]
    pub tag: String,

    /// SQL statement
    pub sql: String,
}

/// Arguments for the `create-database` subcommand.
#[derive(Parser, Debug)]
pub struct CreateDatabaseArgs {
    /// Connection tag to run the statement on
    #[arg(long)]
    pub tag: String,

    /// Name of the database to create
    pub name: String,

    /// Role owning the new database
    #[arg(long)]
    pub owner: String,
}

/// Arguments for the `drop-database` subcommand.
#[derive(Parser, Debug)]
pub struct DropDatabaseArgs {
    /// Connection tag to run the statement on
    #[arg(long)]
    pub tag: String,

    /// Name of the database to drop
    pub name: String,
}

/// Arguments for the `delete-file` subcommand.
#[derive(Parser, Debug)]
pub struct DeleteFileArgs {
    /// Database file to remove
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_command_with_default_path() {
        let cli = Cli::try_parse_from(["tagdb", "config"]).unwrap();
        assert!(matches!(cli.command, Commands::Config));
        assert_eq!(cli.config, PathBuf::from("tagdb.toml"));
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["tagdb", "status", "--config", "other.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }

    #[test]
    fn parse_ping_with_tag() {
        let cli = Cli::try_parse_from(["tagdb", "ping", "--tag", "main"]).unwrap();
        if let Commands::Ping(args) = cli.command {
            assert_eq!(args.tag.as_deref(), Some("main"));
        } else {
            panic!("Expected Ping command");
        }
    }

    #[test]
    fn parse_exec_statement() {
        let cli = Cli::try_parse_from(["tagdb", "exec", "--tag", "main", "VACUUM"]).unwrap();
        if let Commands::Exec(args) = cli.command {
            assert_eq!(args.tag, "main");
            assert_eq!(args.sql, "VACUUM");
        } else {
            panic!("Expected Exec command");
        }
    }

    #[test]
    fn create_database_requires_owner() {
        assert!(Cli::try_parse_from(["tagdb", "create-database", "--tag", "main", "app"]).is_err());
        let cli = Cli::try_parse_from([
            "tagdb",
            "create-database",
            "--tag",
            "main",
            "app",
            "--owner",
            "app_user",
        ])
        .unwrap();
        if let Commands::CreateDatabase(args) = cli.command {
            assert_eq!(args.name, "app");
            assert_eq!(args.owner, "app_user");
        } else {
            panic!("Expected CreateDatabase command");
        }
    }

    #[test]
    fn parse_delete_file() {
        let cli = Cli::try_parse_from(["tagdb", "delete-file", "old.db"]).unwrap();
        if let Commands::DeleteFile(args) = cli.command {
            assert_eq!(args.path, PathBuf::from("old.db"));
        } else {
            panic!("Expected DeleteFile command");
        }
    }
}
