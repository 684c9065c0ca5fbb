//! azblob-adapter: HTTP adapter for one Azure Blob Storage container.

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use azblob_adapter::{AdapterServer, Args, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug {
        Level::DEBUG
    } else if args.silent {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Environment is read once, here
    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };

    let server = AdapterServer::new(config);
    println!("Starting server at port {}", server.config().port);

    server.run().await
}
