//! # Duel Client Library
//!
//! The non-authoritative half of the arena duel. A client connects, is told
//! which connection and role it has, asks to spawn, and from then on sends
//! intents while rebuilding the arena from the events the server replicates.
//!
//! ## Trust Model
//!
//! Nothing here can change combat state. The [`mirror::ClientMirror`] only
//! applies server events, and the [`presentation::PresentationSink`] it
//! reports to gets a read-only view. Health for other fighters is never
//! known on this side.
//!
//! ## Module Organization
//!
//! ### Mirror Module (`mirror`)
//! - Per-entity copy of replicated state
//! - Owned fighter keeps its locally presented pose
//! - Unknown entities are ignored
//!
//! ### Presentation Module (`presentation`)
//! - `PresentationSink` trait for whatever shows the fight
//! - `LogSink`, the headless implementation
//!
//! ### Input Module (`input`)
//! - Per-frame control state
//! - Edge detection into `Move`, `StopMove`, `Jump`, `Attack`, `Block`
//!
//! ### Autopilot Module (`autopilot`)
//! - Seeded controller that closes in, swings and blocks
//!
//! ### Network Module (`network`)
//! - TCP session with handshake and heartbeats
//! - Reader task feeding the session loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use duel_client::autopilot::Autopilot;
//! use duel_client::network::{Client, DEFAULT_HEARTBEAT};
//! use duel_client::presentation::LogSink;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:8080", LogSink)
//!         .await?
//!         .with_autopilot(Autopilot::new(42));
//!
//!     // Plays until the server disconnects us
//!     client.run(60, DEFAULT_HEARTBEAT).await?;
//!     Ok(())
//! }
//! ```

pub mod autopilot;
pub mod input;
pub mod mirror;
pub mod network;
pub mod presentation;
