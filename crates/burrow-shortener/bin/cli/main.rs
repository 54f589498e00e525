mod cli;

use crate::cli::{Command, LogFormat, StorageBackendArg, CLI};
use anyhow::Context;
use burrow_core::{
    Alphabet, KvStore, Mapping, Metadata, ShortenRequest, ShortenResponse, Shortener,
};
use burrow_redirector::RedirectorService;
use burrow_shortener::{AllocatorConfig, ShortenerService};
use burrow_storage::{InMemoryStore, MySqlStore, MySqlStoreConfig, RedisStore, RedisStoreConfig};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = CLI::parse();
    init_tracing(cli.log_format);

    info!(
        storage_backend = %cli.storage,
        code_length = cli.code_length,
        max_attempts = cli.max_attempts,
        "starting burrow"
    );

    match cli.storage {
        StorageBackendArg::InMemory => run(&cli, InMemoryStore::new()).await,
        StorageBackendArg::Mysql => {
            let dsn = cli
                .mysql_dsn
                .clone()
                .context("mysql dsn is required when storage backend is mysql")?;
            let config = MySqlStoreConfig::builder().database_url(dsn).build();
            let store = MySqlStore::connect(&config)
                .await
                .context("failed to connect to mysql")?;
            store
                .ensure_schema()
                .await
                .context("failed to prepare mysql schema")?;
            run(&cli, store).await
        }
        StorageBackendArg::Redis => {
            let url = cli
                .redis_url
                .clone()
                .context("redis url is required when storage backend is redis")?;
            let config = RedisStoreConfig::builder()
                .url(url)
                .namespace(cli.redis_namespace.clone())
                .build();
            let store = RedisStore::connect(&config)
                .await
                .context("failed to connect to redis")?;
            run(&cli, store).await
        }
    }
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

async fn run<S: KvStore>(cli: &CLI, store: S) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Command::Shorten { url, meta } => {
            let response = shorten(cli, store, url, meta).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Resolve { code } => match resolve(cli, store, code).await? {
            Some(mapping) => {
                println!("{}", mapping.target);
                Ok(ExitCode::SUCCESS)
            }
            None => {
                debug!(code = %code, "short code not found");
                eprintln!("no mapping for {code}");
                Ok(ExitCode::FAILURE)
            }
        },
    }
}

async fn shorten<S: KvStore>(
    cli: &CLI,
    store: S,
    url: &str,
    meta: &[(String, String)],
) -> anyhow::Result<ShortenResponse> {
    let service = ShortenerService::new(store, allocator_config(cli))?;
    let request = meta
        .iter()
        .fold(ShortenRequest::new(url), |request, (key, value)| {
            request.with_metadata(key.clone(), value.clone())
        });
    Ok(service.shorten(request).await?)
}

async fn resolve<S: KvStore>(cli: &CLI, store: S, code: &str) -> anyhow::Result<Option<Mapping>> {
    let redirector =
        RedirectorService::with_code_format(store, Alphabet::default(), cli.code_length);
    Ok(redirector.resolve_str(code).await?)
}

fn allocator_config(cli: &CLI) -> AllocatorConfig {
    let mut config = AllocatorConfig::builder()
        .code_length(cli.code_length)
        .max_attempts(cli.max_attempts)
        .default_metadata(default_metadata())
        .build();
    config.public_base_url = cli.public_base_url.clone();
    config
}

/// Metadata every mapping created from the command line carries.
fn default_metadata() -> Metadata {
    Metadata::from([("content-type".to_string(), "text/plain".to_string())])
}
