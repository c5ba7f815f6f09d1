mod cli;

use crate::cli::{Cli, Command, LogFormat, StorageBackendArg};
use anyhow::Context;
use clap::Parser;
use hashlink_shortener::ShortenerService;
use hashlink_storage::{FileStorageConfig, PostgresConfig, Storage, StorageConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse();
    init_tracing(config.log_format);

    info!(
        storage_backend = %config.storage,
        base_url = %config.base_url,
        "starting hashlink"
    );

    let storage = hashlink_storage::open(storage_config(&config)?)
        .await
        .context("failed to open storage")?;
    let service = ShortenerService::from_arc(storage, config.base_url);

    run(&service, config.command).await?;
    service.flush().await.context("failed to flush storage")
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn storage_config(config: &Cli) -> anyhow::Result<StorageConfig> {
    Ok(match config.storage {
        StorageBackendArg::InMemory => StorageConfig::InMemory,
        StorageBackendArg::File => {
            let path = config
                .file_storage_path
                .clone()
                .context("file storage path is required when storage backend is file")?;
            StorageConfig::File(FileStorageConfig::builder().path(path).build())
        }
        StorageBackendArg::Postgres => {
            let dsn = config
                .database_dsn
                .clone()
                .context("database dsn is required when storage backend is postgres")?;
            StorageConfig::Postgres(PostgresConfig::builder().dsn(dsn).build())
        }
    })
}

async fn run(service: &ShortenerService<dyn Storage>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url, user } => {
            println!("{}", service.shorten(user, &url).await?);
        }
        Command::Batch { items, user } => {
            for (correlation_id, short_url) in service.shorten_batch(user, items).await? {
                println!("{correlation_id}\t{short_url}");
            }
        }
        Command::Resolve { short_id } => {
            println!("{}", service.resolve(&short_id).await?);
        }
        Command::List { user } => {
            for pair in service.list(user).await? {
                println!("{}\t{}", pair.short_url, pair.original_url);
            }
        }
        Command::Delete { user, short_ids } => {
            service.delete(user, &short_ids).await?;
            println!("accepted");
        }
        Command::NewUser => {
            println!("{}", service.new_user().await?);
        }
        Command::Ping => {
            if !service.ping().await {
                anyhow::bail!("storage is not reachable");
            }
            println!("ok");
        }
    }

    Ok(())
}
