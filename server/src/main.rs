use clap::Parser;
use duel_server::config::ServerConfig;
use duel_server::network::Server;
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "duel-server")]
#[command(about = "Authoritative server for two-player arena duels")]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Simulation ticks per second
    #[arg(short, long)]
    tick_rate: Option<u32>,

    /// Maximum simultaneous connections
    #[arg(short, long)]
    max_players: Option<usize>,

    /// TOML file with server settings and combat tuning
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    /// File values first, then flags on top.
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(max_players) = self.max_players {
            config.max_players = max_players;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Args::parse().into_config()?;
    info!(
        "Starting duel server on {} at {} Hz",
        config.bind_address(),
        config.tick_rate
    );

    let server = Server::bind(config).await?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
