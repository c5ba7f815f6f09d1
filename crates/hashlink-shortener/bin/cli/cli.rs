use clap::{Parser, Subcommand, ValueEnum};
use hashlink_core::{CorrelationId, User};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORAGE_BACKEND_ENV: &str = "HASHLINK_STORAGE_BACKEND";
pub const FILE_STORAGE_PATH_ENV: &str = "HASHLINK_FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "HASHLINK_DATABASE_DSN";
pub const BASE_URL_ENV: &str = "HASHLINK_BASE_URL";
pub const LOG_FORMAT_ENV: &str = "HASHLINK_LOG_FORMAT";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "hashlink", about = "Content-addressed URL shortener")]
pub struct Cli {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory,
        global = true
    )]
    pub storage: StorageBackendArg,

    #[arg(
        long,
        env = FILE_STORAGE_PATH_ENV,
        required_if_eq("storage", "file"),
        global = true
    )]
    pub file_storage_path: Option<PathBuf>,

    #[arg(
        long,
        env = DATABASE_DSN_ENV,
        required_if_eq("storage", "postgres"),
        global = true
    )]
    pub database_dsn: Option<String>,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten a single URL.
    Shorten {
        url: String,
        #[arg(long, default_value_t = User::ANONYMOUS)]
        user: User,
    },
    /// Shorten several URLs given as CORRELATION=URL pairs.
    Batch {
        #[arg(required = true, value_parser = parse_batch_item)]
        items: Vec<(CorrelationId, String)>,
        #[arg(long, default_value_t = User::ANONYMOUS)]
        user: User,
    },
    /// Print the URL behind a short id.
    Resolve { short_id: String },
    /// List the URLs owned by a user.
    List {
        #[arg(long)]
        user: User,
    },
    /// Soft-delete short ids owned by a user.
    Delete {
        #[arg(long)]
        user: User,
        #[arg(required = true)]
        short_ids: Vec<String>,
    },
    /// Allocate a new user id.
    NewUser,
    /// Check that the storage backend is reachable.
    Ping,
}

fn parse_batch_item(value: &str) -> Result<(CorrelationId, String), String> {
    let (correlation_id, url) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CORRELATION=URL, got '{value}'"))?;
    if correlation_id.is_empty() {
        return Err(format!("empty correlation id in '{value}'"));
    }
    Ok((CorrelationId::new(correlation_id), url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_items() {
        let (id, url) = parse_batch_item("c1=http://a?x=1").unwrap();
        assert_eq!(id.as_str(), "c1");
        assert_eq!(url, "http://a?x=1");
        assert!(parse_batch_item("no-separator").is_err());
        assert!(parse_batch_item("=http://a").is_err());
    }

    #[test]
    fn file_backend_requires_path() {
        let err = Cli::try_parse_from(["hashlink", "--storage", "file", "ping"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_user_option() {
        let cli = Cli::try_parse_from(["hashlink", "list", "--user", "7"]).unwrap();
        match cli.command {
            Command::List { user } => assert_eq!(user.get(), 7),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["hashlink", "list", "--user", "-7"]).is_err());
    }
}
