use clap::{Parser, Subcommand};
use dispatchdesk::application::{Desk, Stores};
use dispatchdesk::config::Config;
use dispatchdesk::domain::booking::BookingStatus;
use dispatchdesk::domain::ports::BookingStore;
use dispatchdesk::interfaces::csv::booking_writer::BookingWriter;
use dispatchdesk::interfaces::http;
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP and websocket server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Write bookings as CSV to stdout
    ExportBookings {
        /// Only export bookings in this status
        #[arg(long)]
        status: Option<BookingStatus>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env().into_diagnostic()?;
    if cli.db_path.is_some() {
        config.db_path = cli.db_path;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let stores = open_stores(&config)?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config, stores).await
        }
        Command::ExportBookings { status } => {
            let mut bookings = stores.bookings.all().await.into_diagnostic()?;
            if let Some(status) = status {
                bookings.retain(|b| b.status == status);
            }
            let stdout = io::stdout();
            let mut writer = BookingWriter::new(stdout.lock());
            writer.write_bookings(&bookings).into_diagnostic()?;
            Ok(())
        }
    }
}

async fn serve(config: Config, stores: Stores) -> Result<()> {
    let desk = Desk::from_config(&config, stores).into_diagnostic()?;
    let app = http::router(desk);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .into_diagnostic()?;
    info!(%addr, "Dispatch desk listening");
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(config: &Config) -> Result<Stores> {
    match &config.db_path {
        Some(db_path) => Stores::rocksdb(db_path).into_diagnostic(),
        None => Ok(Stores::in_memory()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(config: &Config) -> Result<Stores> {
    if config.db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Stores::in_memory())
}
