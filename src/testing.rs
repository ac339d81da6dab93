//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crate::{
    audio::{
        backend::{AudioBackend, BackendError},
        track::{BackendHandle, Track},
    },
    session::presence::{PresenceSource, VoiceSnapshot},
};

pub const BOT: u64 = 1;

pub fn user(id: u64) -> UserId {
    UserId::new(id)
}

pub fn guild(id: u64) -> GuildId {
    GuildId::new(id)
}

pub fn channel(id: u64) -> ChannelId {
    ChannelId::new(id)
}

pub fn track(id: &str) -> Track {
    Track::stream(id, format!("Track {id}"), format!("https://example.com/{id}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Connect(ChannelId),
    Resolve(String),
    Play(String),
    Stop,
    Pause(bool),
    Volume(u8),
    Disconnect,
}

/// Records every call; resolution fails for ids marked unplayable.
/// Disconnects can be slowed down to widen the draining window.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<(GuildId, BackendCall)>>,
    unplayable: Mutex<HashSet<String>>,
    refuse_connect: AtomicBool,
    disconnect_delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn mark_unplayable(&self, id: &str) {
        self.unplayable.lock().insert(id.to_string());
    }

    pub fn refuse_connections(&self) {
        self.refuse_connect.store(true, Ordering::SeqCst);
    }

    /// Cada desconexión tarda `delay` en completarse.
    pub fn slow_disconnect(&self, delay: Duration) {
        *self.disconnect_delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().iter().map(|(_, call)| call.clone()).collect()
    }

    pub fn played(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Play(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &BackendCall) -> usize {
        self.calls().iter().filter(|call| *call == wanted).count()
    }

    fn record(&self, guild_id: GuildId, call: BackendCall) {
        self.calls.lock().push((guild_id, call));
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BackendError> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(BackendError::Connect("refused".into()));
        }
        self.record(guild_id, BackendCall::Connect(channel_id));
        Ok(())
    }

    async fn resolve(&self, track: &Track) -> Result<BackendHandle, BackendError> {
        // Sin guild: la radio resuelve fuera de cualquier sesión
        self.record(GuildId::new(u64::MAX), BackendCall::Resolve(track.id().to_string()));
        if self.unplayable.lock().contains(track.id()) {
            return Err(BackendError::Unplayable(track.id().to_string()));
        }
        Ok(BackendHandle::new(format!("fake:{}", track.id())))
    }

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), BackendError> {
        if track.handle().is_none() {
            return Err(BackendError::Unplayable("unresolved".into()));
        }
        self.record(guild_id, BackendCall::Play(track.id().to_string()));
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), BackendError> {
        self.record(guild_id, BackendCall::Stop);
        Ok(())
    }

    async fn set_pause(&self, guild_id: GuildId, paused: bool) -> Result<(), BackendError> {
        self.record(guild_id, BackendCall::Pause(paused));
        Ok(())
    }

    async fn set_volume(&self, guild_id: GuildId, volume: u8) -> Result<(), BackendError> {
        self.record(guild_id, BackendCall::Volume(volume));
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), BackendError> {
        let delay = *self.disconnect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record(guild_id, BackendCall::Disconnect);
        Ok(())
    }
}

/// Voice states of a single channel, editable from the test body.
#[derive(Default)]
pub struct StaticPresence {
    states: RwLock<Vec<VoiceSnapshot>>,
}

impl StaticPresence {
    /// Bot plus the given listeners, nobody deafened.
    pub fn with_listeners(listeners: &[u64]) -> Self {
        let presence = Self::default();
        presence.set_listeners(listeners);
        presence
    }

    pub fn set_listeners(&self, listeners: &[u64]) {
        let mut states = vec![VoiceSnapshot::new(user(BOT))];
        states.extend(listeners.iter().map(|id| VoiceSnapshot::new(user(*id))));
        *self.states.write() = states;
    }

    pub fn set(&self, states: Vec<VoiceSnapshot>) {
        *self.states.write() = states;
    }
}

impl PresenceSource for StaticPresence {
    fn voice_states(&self, _channel_id: ChannelId) -> Vec<VoiceSnapshot> {
        self.states.read().clone()
    }
}
