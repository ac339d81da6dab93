//! # Session Module
//!
//! Per-guild playback orchestration.
//!
//! Each guild with an active player owns exactly one [`Session`], running
//! as its own tokio task. Everything that can happen to a session (user
//! requests, votes, presence changes, backend callbacks) arrives as a
//! [`SessionEvent`] on a private channel and is handled strictly in
//! arrival order, so no two code paths ever touch the queue, the vote
//! box or the backend connection at the same time.
//!
//! ## States
//!
//! ```text
//! Connecting ──▶ Playing ◀──▶ Paused
//!                   │            │
//!                   └──▶ Draining ◀┘──▶ Terminated
//! ```
//!
//! The rest of the process talks to a session through a cloneable
//! [`SessionHandle`]; sessions are created and looked up through the
//! [`registry::SessionRegistry`].

pub mod presence;
pub mod registry;
pub mod votes;

use serde::Serialize;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{collections::HashMap, fmt, pin::Pin, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Sleep,
};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        backend::{AudioBackend, BackendError, BackendEvent, TrackEndReason},
        queue::{FallbackSource, Queue, Radio, TrackQueue},
        track::Track,
    },
    error::SessionError,
    notify::{Notification, NotificationSink},
};

use self::{
    presence::PresenceTracker,
    votes::{QuorumRule, VoteBox, VoteKind, VoteTally},
};

pub const DEFAULT_VOLUME: u8 = 50;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Espera entre un track irreproducible y el siguiente intento
const RESOLVE_BACKOFF: Duration = Duration::from_millis(500);
/// Fallos seguidos antes de rendirse y cerrar la sesión
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Playing,
    Paused,
    Draining,
    Terminated,
}

/// Opciones con las que se construye una sesión.
#[derive(Clone)]
pub struct SessionOptions {
    /// 0-100
    pub default_volume: u8,
    pub idle_timeout: Duration,
    pub quorum_overrides: HashMap<VoteKind, QuorumRule>,
    /// Las sesiones fijadas por un administrador no se pueden detener por
    /// votación y nunca expiran.
    pub stoppable: bool,
    /// Convierte la cola en una radio alimentada por esta fuente.
    pub radio: Option<Arc<dyn FallbackSource>>,
    pub log_sink: Option<Arc<dyn NotificationSink>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_volume: DEFAULT_VOLUME,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            quorum_overrides: HashMap::new(),
            stoppable: true,
            radio: None,
            log_sink: None,
        }
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("default_volume", &self.default_volume)
            .field("idle_timeout", &self.idle_timeout)
            .field("quorum_overrides", &self.quorum_overrides)
            .field("stoppable", &self.stoppable)
            .field("radio", &self.radio.is_some())
            .field("log_sink", &self.log_sink.is_some())
            .finish()
    }
}

/// Confirmación de una petición aceptada. `position` 0 significa que el
/// track empezó a sonar enseguida.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAck {
    pub track: Track,
    pub position: usize,
}

/// Vista de solo lectura de una sesión, para mostrar lo que suena y la cola.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub state: SessionState,
    pub current_track: Option<Track>,
    pub requests: Vec<Track>,
    pub volume: u8,
    pub listeners: Vec<UserId>,
    pub stoppable: bool,
    pub radio: bool,
    /// Duración conocida de las peticiones pendientes
    pub queued_ms: u64,
}

impl SessionSnapshot {
    pub fn requests_by(&self, user: UserId) -> usize {
        self.requests
            .iter()
            .filter(|track| track.requester() == Some(user))
            .count()
    }
}

enum SessionEvent {
    Request {
        track: Track,
        reply: oneshot::Sender<RequestAck>,
    },
    Vote {
        kind: VoteKind,
        voter: UserId,
        reply: oneshot::Sender<Result<VoteTally, SessionError>>,
    },
    Force {
        kind: VoteKind,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Volume {
        volume: i32,
        reply: oneshot::Sender<u8>,
    },
    RemoveRequest {
        position: usize,
        reply: oneshot::Sender<Result<Track, SessionError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
    PresenceChanged,
    Backend(BackendEvent),
}

/// Dirección clonable de una sesión en marcha.
///
/// Cada método falla con [`SessionError::Terminated`] cuando la sesión ya
/// no existe; los avisos sin respuesta simplemente se descartan.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    guild_id: GuildId,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn is_terminated(&self) -> bool {
        self.events.is_closed()
    }

    /// Se completa cuando la sesión terminó.
    pub async fn closed(&self) {
        self.events.closed().await
    }

    async fn ask<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionEvent,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(build(reply))
            .map_err(|_| SessionError::Terminated)?;
        response.await.map_err(|_| SessionError::Terminated)
    }

    /// Agrega un track a la cola; empieza a reproducir si no suena nada.
    pub async fn request_track(&self, track: Track) -> Result<RequestAck, SessionError> {
        self.ask(|reply| SessionEvent::Request { track, reply }).await
    }

    /// Registra un voto. La acción se ejecuta en cuanto hay quórum.
    pub async fn vote(&self, kind: VoteKind, voter: UserId) -> Result<VoteTally, SessionError> {
        self.ask(|reply| SessionEvent::Vote { kind, voter, reply })
            .await?
    }

    /// Aplica una acción sin pasar por la votación. Quien llama ya
    /// comprobó que el usuario tiene permiso.
    pub async fn force(&self, kind: VoteKind) -> Result<(), SessionError> {
        self.ask(|reply| SessionEvent::Force { kind, reply }).await?
    }

    /// Limita a `[0, 100]` y devuelve el volumen aplicado.
    pub async fn change_volume(&self, volume: i32) -> Result<u8, SessionError> {
        self.ask(|reply| SessionEvent::Volume { volume, reply }).await
    }

    /// Elimina la petición pendiente en `position` (desde 1, como se lista).
    pub async fn remove_request(&self, position: usize) -> Result<Track, SessionError> {
        self.ask(|reply| SessionEvent::RemoveRequest { position, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.ask(|reply| SessionEvent::Snapshot { reply }).await
    }

    /// Cierra la sesión aunque no sea `stoppable`. Se usa al apagar el
    /// proceso.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.ask(|reply| SessionEvent::Shutdown { reply }).await
    }

    pub fn presence_changed(&self) {
        if self.events.send(SessionEvent::PresenceChanged).is_err() {
            debug!("Cambio de presencia para sesión {} ya terminada", self.id);
        }
    }

    pub fn backend_event(&self, event: BackendEvent) {
        if self.events.send(SessionEvent::Backend(event)).is_err() {
            debug!("Evento tardío del backend ignorado (sesión {})", self.id);
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("guild_id", &self.guild_id)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

enum Wake {
    Event(Option<SessionEvent>),
    IdleTimeout,
}

/// Máquina de estados de un guild. Solo la mueve su propia tarea.
pub struct Session {
    id: SessionId,
    guild_id: GuildId,
    backend: Arc<dyn AudioBackend>,
    queue: TrackQueue,
    votes: VoteBox,
    presence: PresenceTracker,
    current: Option<Track>,
    volume: u8,
    stoppable: bool,
    idle_timeout: Duration,
    log_sink: Option<Arc<dyn NotificationSink>>,
    state: SessionState,
    paused_by_vote: bool,
    /// Fallos de reproducción seguidos, se reinicia con un track terminado
    failures: u32,
    idle_deadline: Option<Pin<Box<Sleep>>>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Session {
    /// Conecta al canal de voz y lanza la tarea de la sesión.
    ///
    /// Si la conexión falla se devuelve el error y no se lanza nada.
    pub(crate) async fn start(
        id: SessionId,
        guild_id: GuildId,
        presence: PresenceTracker,
        options: SessionOptions,
        backend: Arc<dyn AudioBackend>,
    ) -> Result<(SessionHandle, JoinHandle<()>), SessionError> {
        let channel_id = presence.channel_id();
        info!(
            "🔌 Conectando sesión {} en guild {} (canal {})",
            id, guild_id, channel_id
        );

        if let Err(e) = backend.connect(guild_id, channel_id).await {
            error!("❌ No se pudo conectar en guild {}: {}", guild_id, e);
            return Err(e.into());
        }

        let volume = options.default_volume.min(100);
        if let Err(e) = backend.set_volume(guild_id, volume).await {
            warn!("No se pudo fijar el volumen inicial en guild {}: {}", guild_id, e);
        }

        let queue = match &options.radio {
            Some(fallback) => TrackQueue::Radio(Radio::new(fallback.clone(), backend.clone())),
            None => TrackQueue::Plain(Queue::new()),
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let session = Session {
            id,
            guild_id,
            backend,
            queue,
            votes: VoteBox::with_rules(options.quorum_overrides),
            presence,
            current: None,
            volume,
            stoppable: options.stoppable,
            idle_timeout: options.idle_timeout,
            log_sink: options.log_sink,
            state: SessionState::Connecting,
            paused_by_vote: false,
            failures: 0,
            idle_deadline: None,
            events: receiver,
        };

        let task = tokio::spawn(session.run());
        let handle = SessionHandle {
            id,
            guild_id,
            events: sender,
        };
        Ok((handle, task))
    }

    async fn run(mut self) {
        // La radio empieza a sonar en cuanto conecta
        if self.queue.is_radio() {
            self.advance().await;
        }
        self.on_presence_changed().await;

        while !self.is_finished() {
            let wake = match self.idle_deadline.as_mut() {
                Some(deadline) => tokio::select! {
                    biased;
                    event = self.events.recv() => Wake::Event(event),
                    () = deadline.as_mut() => Wake::IdleTimeout,
                },
                None => Wake::Event(self.events.recv().await),
            };

            match wake {
                Wake::Event(Some(event)) => self.handle(event).await,
                Wake::Event(None) => self.drain("sin handles vivos").await,
                Wake::IdleTimeout => {
                    self.idle_deadline = None;
                    info!("⏰ Tiempo de inactividad agotado en guild {}", self.guild_id);
                    self.drain("inactividad").await;
                }
            }
        }

        debug!("Sesión {} finalizada", self.id);
    }

    async fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Request { track, reply } => {
                let ack = self.request_track(track).await;
                let _ = reply.send(ack);
            }
            SessionEvent::Vote { kind, voter, reply } => {
                let result = self.vote(kind, voter).await;
                let _ = reply.send(result);
            }
            SessionEvent::Force { kind, reply } => {
                let result = self.force(kind).await;
                let _ = reply.send(result);
            }
            SessionEvent::Volume { volume, reply } => {
                let applied = self.change_volume(volume).await;
                let _ = reply.send(applied);
            }
            SessionEvent::RemoveRequest { position, reply } => {
                let result = self.remove_request(position);
                let _ = reply.send(result);
            }
            SessionEvent::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            SessionEvent::Shutdown { reply } => {
                self.drain("apagado").await;
                let _ = reply.send(());
            }
            SessionEvent::PresenceChanged => {
                self.on_presence_changed().await;
                self.apply_ripe_votes().await;
            }
            SessionEvent::Backend(event) => self.on_backend_event(event).await,
        }
    }

    fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Draining | SessionState::Terminated)
    }

    async fn request_track(&mut self, track: Track) -> RequestAck {
        let position = self.queue.add_request(track.clone(), false);
        info!(
            "➕ Petición en guild {}: {} (posición {})",
            self.guild_id,
            track.title(),
            position
        );

        let mut ack = RequestAck { track, position };
        if self.current.is_none() {
            self.advance().await;
            if self
                .current
                .as_ref()
                .is_some_and(|current| current.id() == ack.track.id())
            {
                ack.position = 0;
            }
        }

        self.notify(Notification::TrackAdded {
            track: ack.track.clone(),
            position: ack.position,
        });
        ack
    }

    async fn vote(&mut self, kind: VoteKind, voter: UserId) -> Result<VoteTally, SessionError> {
        if kind == VoteKind::Stop && !self.stoppable {
            return Err(SessionError::NotStoppable);
        }

        let listeners = self.presence.listeners();
        if kind == VoteKind::Stop && listeners.is_empty() {
            // Nadie escucha: no hay a quién preguntar
            self.apply(kind).await;
            return Ok(VoteTally::approved(kind));
        }
        if !listeners.contains(&voter) {
            return Err(SessionError::NotListening);
        }

        let tally = self.votes.record_vote(kind, voter, listeners.len())?;
        if tally.passed {
            info!(
                "✅ Votación {} aprobada en guild {} ({}/{})",
                kind, self.guild_id, tally.votes, tally.required
            );
            self.apply(kind).await;
        } else {
            info!(
                "🗳️ Votación {} en guild {}: faltan {} votos",
                kind,
                self.guild_id,
                tally.remaining()
            );
        }
        Ok(tally)
    }

    async fn force(&mut self, kind: VoteKind) -> Result<(), SessionError> {
        if kind == VoteKind::Stop && !self.stoppable {
            return Err(SessionError::NotStoppable);
        }
        info!("⚡ {} forzado en guild {}", kind, self.guild_id);
        self.apply(kind).await;
        Ok(())
    }

    /// Lo que ocurre cuando se aprueba una acción, por voto o forzada.
    async fn apply(&mut self, kind: VoteKind) {
        self.votes.clear(kind);

        match kind {
            VoteKind::Skip => {
                if self.current.is_none() {
                    return;
                }
                self.failures = 0;
                if let Err(e) = self.backend.stop(self.guild_id).await {
                    warn!("Error al detener el track en guild {}: {}", self.guild_id, e);
                }
                self.advance().await;
            }
            VoteKind::Stop => self.drain("stop").await,
            VoteKind::Repeat => {
                if let Some(track) = self.current.clone() {
                    info!("🔂 Repitiendo: {}", track.title());
                    self.queue.add_request(track, true);
                }
            }
            VoteKind::Pause => {
                self.paused_by_vote = true;
                if self.state == SessionState::Playing {
                    self.set_paused(true).await;
                    self.state = SessionState::Paused;
                }
            }
            VoteKind::Resume => {
                self.paused_by_vote = false;
                if self.state == SessionState::Paused && !self.presence.is_alone() {
                    self.idle_deadline = None;
                    self.set_paused(false).await;
                    self.state = SessionState::Playing;
                }
            }
            VoteKind::Shuffle => self.queue.pending_mut().shuffle(),
        }
    }

    async fn change_volume(&mut self, volume: i32) -> u8 {
        let volume = volume.clamp(0, 100) as u8;
        if let Err(e) = self.backend.set_volume(self.guild_id, volume).await {
            warn!("No se pudo cambiar el volumen en guild {}: {}", self.guild_id, e);
        }
        self.volume = volume;
        info!("🔊 Volumen en guild {}: {}%", self.guild_id, volume);
        volume
    }

    fn remove_request(&mut self, position: usize) -> Result<Track, SessionError> {
        let track = position
            .checked_sub(1)
            .and_then(|index| self.queue.pending_mut().remove(index))
            .ok_or(SessionError::NoSuchRequest(position))?;
        info!("❌ Petición {} eliminada: {}", position, track.title());
        Ok(track)
    }

    fn snapshot(&self) -> SessionSnapshot {
        let pending = self.queue.pending();
        let mut listeners: Vec<UserId> = self.presence.listeners().into_iter().collect();
        listeners.sort();

        SessionSnapshot {
            guild_id: self.guild_id,
            channel_id: self.presence.channel_id(),
            state: self.state,
            current_track: self.current.clone(),
            requests: pending.requests().cloned().collect(),
            volume: self.volume,
            listeners,
            stoppable: self.stoppable,
            radio: self.queue.is_radio(),
            queued_ms: pending.total_duration().as_millis() as u64,
        }
    }

    async fn on_presence_changed(&mut self) {
        if self.is_finished() {
            return;
        }

        let listeners = self.presence.listeners();
        self.votes.retain_listeners(&listeners);

        if listeners.is_empty() {
            self.votes.clear(VoteKind::Stop);
            if self.stoppable && self.idle_deadline.is_none() {
                info!(
                    "⏳ Solo en guild {}, desconexión en {:?}",
                    self.guild_id, self.idle_timeout
                );
                self.idle_deadline = Some(Box::pin(tokio::time::sleep(self.idle_timeout)));
            }
            if self.state == SessionState::Playing {
                self.set_paused(true).await;
                self.state = SessionState::Paused;
                info!("⏸️ Nadie escucha en guild {}, pausado", self.guild_id);
            }
        } else {
            // Cancelar el temporizador antes de cualquier await
            if self.idle_deadline.take().is_some() {
                info!("👋 Oyentes de vuelta en guild {}, temporizador cancelado", self.guild_id);
            }
            if self.state == SessionState::Paused && !self.paused_by_vote && self.current.is_some() {
                self.set_paused(false).await;
                self.state = SessionState::Playing;
                info!("▶️ Reanudado en guild {}", self.guild_id);
            }
        }
    }

    /// Ejecuta las votaciones que ya alcanzan el quórum con los oyentes
    /// actuales. Un voto pendiente puede bastar cuando se va quien no votó.
    async fn apply_ripe_votes(&mut self) {
        let listeners = self.presence.listeners().len();
        if listeners == 0 {
            return;
        }

        for kind in VoteKind::ALL {
            if self.is_finished() {
                return;
            }
            let votes = self.votes.votes(kind);
            let required = self.votes.rule(kind).required(listeners);
            if votes > 0 && votes >= required {
                info!(
                    "✅ Votación {} aprobada en guild {} tras cambio de oyentes ({}/{})",
                    kind, self.guild_id, votes, required
                );
                self.apply(kind).await;
            }
        }
    }

    async fn on_backend_event(&mut self, event: BackendEvent) {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|track| track.id() == event.track_id());
        if !is_current {
            debug!("Evento de un track que ya no suena: {:?}", event);
            return;
        }

        let failure = match event {
            BackendEvent::TrackEnd { reason, .. } if !reason.may_start_next() => {
                debug!("Fin de track provocado por la sesión ({:?})", reason);
                return;
            }
            BackendEvent::TrackEnd {
                reason: TrackEndReason::LoadFailed,
                ..
            } => Some("load failed".to_string()),
            BackendEvent::TrackEnd { .. } => {
                self.failures = 0;
                None
            }
            BackendEvent::TrackStuck { threshold_ms, .. } => {
                warn!("🧊 Track atascado más de {}ms en guild {}", threshold_ms, self.guild_id);
                Some(format!("stuck for {threshold_ms}ms"))
            }
            BackendEvent::TrackException { message, .. } => {
                warn!("💥 Excepción del backend en guild {}: {}", self.guild_id, message);
                Some(message)
            }
        };

        if let Some(reason) = failure {
            let Some(track) = self.current.take() else {
                return;
            };
            if self.record_failure(track, reason) {
                self.drain("demasiados fallos").await;
                return;
            }
            tokio::time::sleep(RESOLVE_BACKOFF).await;
        }

        self.advance().await;
    }

    /// Cuenta un fallo de reproducción y avisa al sink. Devuelve `true`
    /// cuando se alcanzó `MAX_CONSECUTIVE_FAILURES`.
    fn record_failure(&mut self, track: Track, reason: String) -> bool {
        self.failures += 1;
        warn!(
            "❌ No se pudo reproducir {} ({}/{}): {}",
            track.title(),
            self.failures,
            MAX_CONSECUTIVE_FAILURES,
            reason
        );
        self.notify(Notification::TrackFailed { track, reason });

        if self.failures >= MAX_CONSECUTIVE_FAILURES {
            error!(
                "🚨 {} fallos seguidos en guild {}, cerrando sesión",
                self.failures, self.guild_id
            );
            return true;
        }
        false
    }

    /// Pasa al siguiente track reproducible, o cierra la sesión si no hay.
    ///
    /// Los tracks irreproducibles se descartan sin reintentarlos; tras
    /// `MAX_CONSECUTIVE_FAILURES` seguidos la sesión se rinde.
    async fn advance(&mut self) {
        loop {
            self.votes.clear_on_track_change();
            self.current = None;

            let Some(track) = self.queue.next_track().await else {
                info!("📭 Cola vacía en guild {}", self.guild_id);
                self.drain("cola agotada").await;
                return;
            };

            match self.start_track(&track).await {
                Ok(()) => {
                    info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title());
                    self.notify(Notification::NowPlaying {
                        track: track.clone(),
                    });
                    self.current = Some(track);

                    if self.paused_by_vote || self.presence.is_alone() {
                        self.set_paused(true).await;
                        self.state = SessionState::Paused;
                    } else {
                        self.state = SessionState::Playing;
                    }
                    self.on_presence_changed().await;
                    return;
                }
                Err(e) => {
                    if self.record_failure(track, e.to_string()) {
                        self.drain("demasiados fallos").await;
                        return;
                    }
                    tokio::time::sleep(RESOLVE_BACKOFF).await;
                }
            }
        }
    }

    async fn start_track(&self, track: &Track) -> Result<(), BackendError> {
        if track.handle().is_none() {
            let handle = self.backend.resolve(track).await?;
            track.attach_handle(handle);
        }
        self.backend.play(self.guild_id, track).await
    }

    async fn set_paused(&self, paused: bool) {
        if let Err(e) = self.backend.set_pause(self.guild_id, paused).await {
            warn!("No se pudo cambiar la pausa en guild {}: {}", self.guild_id, e);
        }
    }

    /// Limpieza en lo posible; siempre termina en `Terminated`.
    async fn drain(&mut self, reason: &str) {
        if self.is_finished() {
            return;
        }

        info!("🛑 Cerrando sesión {} en guild {}: {}", self.id, self.guild_id, reason);
        self.state = SessionState::Draining;
        self.idle_deadline = None;
        self.current = None;

        if let Err(e) = self.backend.stop(self.guild_id).await {
            debug!("Error al detener en guild {}: {}", self.guild_id, e);
        }
        if let Err(e) = self.backend.disconnect(self.guild_id).await {
            warn!("Error al desconectar en guild {}: {}", self.guild_id, e);
        }

        self.votes.clear_all();
        self.notify(Notification::SessionEnded);
        self.events.close();
        self.state = SessionState::Terminated;
    }

    fn notify(&self, notification: Notification) {
        if let Some(sink) = &self.log_sink {
            sink.notify(self.guild_id, &notification);
        }
    }
}
