use duel_shared::{ConnectionId, EntityId};
use thiserror::Error;

/// Why a command was refused. Rejected commands never touch state and are
/// not reported back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("entity is blocking")]
    Blocking,
    #[error("entity is not grounded")]
    Airborne,
    #[error("attack cooldown has not elapsed")]
    Cooldown,
    #[error("entity is dead")]
    Dead,
    #[error("connection does not own the entity")]
    NotOwner,
    #[error("move axis is not a finite number")]
    InvalidAxis,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("{0} already controls {1}")]
    AlreadySpawned(ConnectionId, EntityId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
