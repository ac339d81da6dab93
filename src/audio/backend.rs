use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;
use tokio::sync::mpsc;

use super::track::{BackendHandle, Track};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("could not connect to the voice channel: {0}")]
    Connect(String),
    #[error("track is not playable: {0}")]
    Unplayable(String),
    #[error("backend rejected the command: {0}")]
    Command(String),
}

/// Por qué terminó un track, con la misma semántica que Lavalink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl TrackEndReason {
    /// Sólo los finales que no provoca la propia sesión avanzan la cola.
    pub fn may_start_next(self) -> bool {
        matches!(self, TrackEndReason::Finished | TrackEndReason::LoadFailed)
    }
}

/// Asynchronous playback callbacks raised by the audio backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    TrackEnd {
        track_id: String,
        reason: TrackEndReason,
    },
    TrackStuck {
        track_id: String,
        threshold_ms: u64,
    },
    TrackException {
        track_id: String,
        message: String,
    },
}

impl BackendEvent {
    pub fn track_id(&self) -> &str {
        match self {
            BackendEvent::TrackEnd { track_id, .. }
            | BackendEvent::TrackStuck { track_id, .. }
            | BackendEvent::TrackException { track_id, .. } => track_id,
        }
    }
}

/// Backend callback tagged with the guild it belongs to.
#[derive(Debug, Clone)]
pub struct GuildEvent {
    pub guild_id: GuildId,
    pub event: BackendEvent,
}

pub type BackendEventSender = mpsc::UnboundedSender<GuildEvent>;

/// Narrow interface over a Lavalink-like audio node.
///
/// Every call is keyed by guild; a session only ever touches its own
/// guild, which is what gives it exclusive ownership of the connection.
/// Callbacks are not returned from these methods: implementations push
/// [`GuildEvent`]s into the sender they were built with.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BackendError>;

    /// Turns a track into something playable. Failing here means the
    /// track is unplayable and should be skipped.
    async fn resolve(&self, track: &Track) -> Result<BackendHandle, BackendError>;

    /// Starts a track that already carries a handle, replacing whatever
    /// was playing.
    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), BackendError>;

    async fn stop(&self, guild_id: GuildId) -> Result<(), BackendError>;

    async fn set_pause(&self, guild_id: GuildId, paused: bool) -> Result<(), BackendError>;

    async fn set_volume(&self, guild_id: GuildId, volume: u8) -> Result<(), BackendError>;

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), BackendError>;
}
