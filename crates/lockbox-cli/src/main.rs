mod cli;
mod client;
mod config;
mod storage;

use std::path::Path;

use crate::cli::ConfigCommand;
use clap::Parser;
use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use lockbox_core::records::MetadataStore;
use lockbox_storage::{cipher, sqlite_metadata::SqliteMetadataStore};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    match cli.command {
        cli::Command::Serve => run_serve(&config).await?,
        cli::Command::Health => run_health_check(&config).await?,
        cli::Command::Version => print_version(),
        cli::Command::Config(ConfigCommand::Init) => init_config(cli.config.as_deref())?,
        cli::Command::Push { path, name } => {
            let client = client::VaultClient::new(config.endpoint());
            let uploaded = client::push(&client, &path, name).await?;
            println!("{}: {}", uploaded.message, uploaded.file_url);
        }
        cli::Command::Pull { name, output } => {
            let client = client::VaultClient::new(config.endpoint());
            let written = client::pull(&client, &name, output).await?;
            println!("Saved {name} to {}", written.display());
        }
    }

    Ok(())
}

fn init_tracing() {
    // RUST_LOG wins; otherwise info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("lockbox {}", env!("CARGO_PKG_VERSION"));
}

async fn run_serve(config: &config::Config) -> Result<()> {
    let vault = storage::vault_from_config(config).await?;
    let app = lockbox_http::router(vault, &config.http_settings());
    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(%bind_addr, "starting lockbox server");
    lockbox_http::serve(listener, app)
        .await
        .map_err(|e| eyre!(Box::<dyn std::error::Error + Send + Sync>::from(e)))
        .wrap_err("lockbox server failed")
}

/// Checks the cipher, the metadata database and the data directory.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let data_dir = storage::data_dir_from_config(config)?;
    let url = storage::database_url(config, &data_dir);
    run_health(&data_dir, &url).await?;
    println!("Cipher: ok");
    println!("Metadata: ok");
    println!("Data dir: ok ({})", data_dir.display());
    Ok(())
}

async fn run_health(data_dir: &Path, database_url: &str) -> Result<()> {
    let key = cipher::generate_key();
    let payload = b"ok";
    let sealed = cipher::encrypt(payload, &key).wrap_err("cipher encrypt failed")?;
    let opened = cipher::decrypt(&sealed, &key).wrap_err("cipher decrypt failed")?;
    if opened != payload {
        color_eyre::eyre::bail!("cipher round-trip failed");
    }

    std::fs::create_dir_all(data_dir)?;
    let records = SqliteMetadataStore::connect(database_url)
        .await
        .wrap_err_with(|| format!("failed to open metadata database {database_url}"))?;
    records
        .find_by_name("health/probe")
        .await
        .wrap_err("metadata lookup failed")?;

    tempfile::NamedTempFile::new_in(data_dir)
        .wrap_err_with(|| format!("data dir {} is not writable", data_dir.display()))?;
    Ok(())
}

fn init_config(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config::default_path()?,
    };
    let path = config::write_default_if_missing(&config::Config::defaults(), &path)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
