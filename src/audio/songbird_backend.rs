use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{File, HttpRequest, Input, YoutubeDl},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::{
    backend::{AudioBackend, BackendError, BackendEvent, BackendEventSender, GuildEvent, TrackEndReason},
    track::{BackendHandle, Track, TrackSource},
};

/// Why the session itself ended the current track, if it did.
type EndOverride = Arc<Mutex<Option<TrackEndReason>>>;

struct PlayingTrack {
    handle: TrackHandle,
    ended_by: EndOverride,
}

struct GuildPlayer {
    call: Arc<tokio::sync::Mutex<Call>>,
    current: Option<PlayingTrack>,
    volume: f32,
}

/// [`AudioBackend`] over an in-process songbird driver.
///
/// Streams go through yt-dlp, attachments through plain HTTP and local
/// files straight from disk. Track callbacks are pushed into the
/// [`BackendEventSender`] the backend was built with.
pub struct SongbirdBackend {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    events: BackendEventSender,
    players: DashMap<GuildId, GuildPlayer>,
}

impl SongbirdBackend {
    pub fn new(manager: Arc<Songbird>, events: BackendEventSender) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            manager,
            http,
            events,
            players: DashMap::new(),
        }
    }

    fn input_for(&self, source: &TrackSource) -> Input {
        match source {
            TrackSource::Stream { url, .. } => YoutubeDl::new(self.http.clone(), url.clone()).into(),
            TrackSource::Attachment { url, .. } => HttpRequest::new(self.http.clone(), url.clone()).into(),
            TrackSource::LocalFile { path } => File::new(path.clone()).into(),
        }
    }

    /// Marca el track actual como terminado por la sesión y lo devuelve
    fn take_current(&self, guild_id: GuildId, reason: TrackEndReason) -> Option<TrackHandle> {
        let mut player = self.players.get_mut(&guild_id)?;
        let playing = player.current.take()?;
        *playing.ended_by.lock() = Some(reason);
        Some(playing.handle)
    }

    fn current_handle(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.players
            .get(&guild_id)?
            .current
            .as_ref()
            .map(|playing| playing.handle.clone())
    }
}

#[async_trait]
impl AudioBackend for SongbirdBackend {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BackendError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| BackendError::Connect(e.to_string()))?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        self.players.insert(
            guild_id,
            GuildPlayer {
                call,
                current: None,
                volume: 0.5,
            },
        );
        Ok(())
    }

    async fn resolve(&self, track: &Track) -> Result<BackendHandle, BackendError> {
        match track.source() {
            TrackSource::Stream { url, .. } => {
                // yt-dlp confirma que el stream existe antes de reproducirlo
                let mut input: Input = YoutubeDl::new(self.http.clone(), url.clone()).into();
                input
                    .aux_metadata()
                    .await
                    .map_err(|e| BackendError::Unplayable(format!("{}: {e:?}", track.title())))?;
                Ok(BackendHandle::new(url.clone()))
            }
            TrackSource::Attachment { url, .. } => {
                self.http
                    .head(url)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(|e| BackendError::Unplayable(format!("{}: {e}", track.title())))?;
                Ok(BackendHandle::new(url.clone()))
            }
            TrackSource::LocalFile { path } => {
                let metadata = tokio::fs::metadata(path)
                    .await
                    .map_err(|e| BackendError::Unplayable(format!("{}: {e}", path.display())))?;
                if !metadata.is_file() {
                    return Err(BackendError::Unplayable(format!(
                        "{} is not a file",
                        path.display()
                    )));
                }
                Ok(BackendHandle::new(path.display().to_string()))
            }
        }
    }

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), BackendError> {
        if track.handle().is_none() {
            return Err(BackendError::Unplayable(format!("{} was never resolved", track.title())));
        }

        let (call, volume) = {
            let player = self
                .players
                .get(&guild_id)
                .ok_or_else(|| BackendError::Command(format!("no voice connection in guild {guild_id}")))?;
            (player.call.clone(), player.volume)
        };
        self.take_current(guild_id, TrackEndReason::Replaced);

        let input = self.input_for(track.source());
        let handle = call.lock().await.play_only_input(input);
        if let Err(e) = handle.set_volume(volume) {
            warn!("No se pudo fijar el volumen del track en guild {}: {}", guild_id, e);
        }

        let ended_by: EndOverride = Arc::new(Mutex::new(None));
        let notifier = TrackNotifier {
            guild_id,
            track_id: track.id().to_string(),
            ended_by: ended_by.clone(),
            events: self.events.clone(),
        };
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| BackendError::Command(format!("could not watch track: {e}")))?;
        }

        if let Some(mut player) = self.players.get_mut(&guild_id) {
            player.current = Some(PlayingTrack { handle, ended_by });
        }
        debug!("▶️ {} enviado a songbird (guild {})", track.title(), guild_id);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), BackendError> {
        if let Some(handle) = self.take_current(guild_id, TrackEndReason::Stopped) {
            handle
                .stop()
                .map_err(|e| BackendError::Command(e.to_string()))?;
        }
        Ok(())
    }

    async fn set_pause(&self, guild_id: GuildId, paused: bool) -> Result<(), BackendError> {
        let Some(handle) = self.current_handle(guild_id) else {
            return Ok(());
        };
        let result = if paused { handle.pause() } else { handle.play() };
        result.map_err(|e| BackendError::Command(e.to_string()))
    }

    async fn set_volume(&self, guild_id: GuildId, volume: u8) -> Result<(), BackendError> {
        let volume = f32::from(volume.min(100)) / 100.0;
        if let Some(mut player) = self.players.get_mut(&guild_id) {
            player.volume = volume;
        }
        if let Some(handle) = self.current_handle(guild_id) {
            handle
                .set_volume(volume)
                .map_err(|e| BackendError::Command(e.to_string()))?;
        }
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), BackendError> {
        if let Some(handle) = self.take_current(guild_id, TrackEndReason::Cleanup) {
            let _ = handle.stop();
        }
        self.players.remove(&guild_id);

        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| BackendError::Command(e.to_string()))?;
        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }
}

/// Reenvía el final de un track a la sesión como [`GuildEvent`]
#[derive(Clone)]
struct TrackNotifier {
    guild_id: GuildId,
    track_id: String,
    ended_by: EndOverride,
    events: BackendEventSender,
}

impl TrackNotifier {
    fn event_for(&self, errors: &[String]) -> BackendEvent {
        if let Some(message) = errors.first() {
            return BackendEvent::TrackException {
                track_id: self.track_id.clone(),
                message: message.clone(),
            };
        }
        let ended_by = *self.ended_by.lock();
        BackendEvent::TrackEnd {
            track_id: self.track_id.clone(),
            reason: ended_by.unwrap_or(TrackEndReason::Finished),
        }
    }
}

#[async_trait]
impl VoiceEventHandler for TrackNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let EventContext::Track(tracks) = ctx else {
            return None;
        };

        let errors: Vec<String> = tracks
            .iter()
            .filter_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{e:?}")),
                _ => None,
            })
            .collect();

        let event = self.event_for(&errors);
        if let BackendEvent::TrackException { message, .. } = &event {
            warn!("❌ Error en track para guild {}: {}", self.guild_id, message);
        }

        let routed = GuildEvent {
            guild_id: self.guild_id,
            event,
        };
        if self.events.send(routed).is_err() {
            debug!("Canal de eventos cerrado, evento descartado");
        }
        None
    }
}
