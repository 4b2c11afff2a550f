//! # portico CLI Entry Point
//!
//! Composes the reference movie-review deployment and either prints its
//! route table or activates and serves it.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use portico_cli::{handlers, movies};
use portico_gateway::{serve, Gateway};
use portico_store::MemoryStore;

/// Resource-composition gateway for the reference movie-review API.
#[derive(Parser, Debug)]
#[command(name = "portico", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the composed route table.
    Routes,
    /// Activate the deployment and serve it over HTTP.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Routes => print_routes(),
        Commands::Serve { addr } => {
            let gateway = Gateway::activate(
                movies::compose()?,
                &handlers::registry(),
                Arc::new(MemoryStore::new()),
            )?;
            tracing::info!(
                routes = gateway.deployment().routes().routes().len(),
                "reference deployment activated"
            );
            serve::run(Arc::new(gateway), addr).await?;
            Ok(())
        }
    }
}

fn print_routes() -> anyhow::Result<()> {
    let deployment = movies::compose()?;
    for entry in deployment.routes().routes() {
        let binding = match entry.binding {
            Some(index) => deployment.bindings()[index].name.as_str(),
            None => "(stub)",
        };
        let auth = match entry.authorizer {
            Some(index) => deployment.authorizers()[index].name.as_str(),
            None => "-",
        };
        println!("{:6} {:45} -> {:35} auth: {}", entry.verb, entry.path, binding, auth);
    }
    Ok(())
}
