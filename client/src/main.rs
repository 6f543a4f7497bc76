use clap::Parser;
use duel_client::autopilot::Autopilot;
use duel_client::network::{Client, DEFAULT_HEARTBEAT};
use duel_client::presentation::LogSink;
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Let the built-in autopilot fight instead of only spectating
    #[arg(short = 'a', long)]
    autopilot: bool,

    /// Seed for the autopilot's decisions
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Input samples per second
    #[arg(short = 'r', long, default_value = "60")]
    input_rate: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let mut client = Client::connect(&args.server, LogSink).await?;
    if args.autopilot {
        info!("Autopilot engaged (seed {})", args.seed);
        client = client.with_autopilot(Autopilot::new(args.seed));
    } else {
        info!("No autopilot: spectating");
    }

    tokio::select! {
        result = client.run(args.input_rate, DEFAULT_HEARTBEAT) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving");
            if let Err(e) = client.disconnect().await {
                warn!("Failed to send disconnect: {}", e);
            }
        }
    }

    Ok(())
}
