//! # Duel Server Library
//!
//! The authoritative half of a two-player arena brawler. Clients send
//! intents (move, jump, attack, block); the server validates them, owns every
//! piece of combat state, and replicates the results as ordered events.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Combat
//! Health, invincibility, death, attack cooldowns and combo stages live only
//! here. A client can ask to attack; whether the attack lands, and for how
//! much, is decided by the simulation step.
//!
//! ### Structural Trust Boundary
//! Every state mutator in the registry is crate-private. The network layer
//! resolves the entity from the connection that sent a command, and
//! [`simulation::Simulation::submit`] rejects commands whose origin does not
//! own the entity. Nothing a client sends can address another fighter.
//!
//! ### Replication
//! Each accepted change queues an event. A tick's events are routed per
//! connection and delivered together, so an observer never sees
//! `HurtTriggered` without the `HealthChanged` that caused it. Health values
//! are only ever sent to the entity's owner.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Tick Loop
//! One task owns the [`simulation::Simulation`] and the
//! [`session::SessionManager`]. Connection tasks only decode frames and
//! forward them through a channel, so commands for a fighter apply in the
//! order they arrived and hits against a target resolve one at a time without
//! any locking.
//!
//! ### TCP Transport
//! Reliable ordered delivery matters more than latency for discrete combat
//! events. Each connection has a reader task and a writer task around
//! length-prefixed bincode frames (see `duel_shared::framing`).
//!
//! ## Module Organization
//!
//! ### Simulation (`simulation`, `intake`, `combat`, `timers`, `physics`)
//! - Command validation and immediate application
//! - Queued hit resolution against axis-aligned boxes
//! - Damage and invincibility state machine
//! - Per-entity invincibility deadlines
//! - Pluggable physics seam with a flat-floor arena default
//!
//! ### State (`registry`, `replication`)
//! - Entity storage, id assignment, owner lookup
//! - Event audiences and per-connection tick reports
//!
//! ### Transport (`session`, `network`)
//! - Capacity, role assignment, liveness
//! - Handshake, command routing, tick broadcast
//!
//! ### Configuration (`config`, `error`)
//! - TOML-backed server settings and combat tuning
//! - Error and rejection types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use duel_server::config::ServerConfig;
//! use duel_server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 8080,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Accepts two fighters and runs the tick loop forever
//!     let server = Server::bind(config).await?;
//!     server.run().await;
//!
//!     Ok(())
//! }
//! ```

pub mod combat;
pub mod config;
pub mod error;
pub mod intake;
pub mod network;
pub mod physics;
pub mod registry;
pub mod replication;
pub mod session;
pub mod simulation;
pub mod timers;
