use dashmap::DashMap;
use serenity::model::id::{GuildId, UserId};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::{
    sync::{mpsc, OnceCell},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use super::{
    presence::PresenceTracker, RequestAck, Session, SessionHandle, SessionId, SessionOptions,
};
use crate::{
    audio::{
        backend::{AudioBackend, GuildEvent},
        track::Track,
    },
    error::SessionError,
};

type Slot = Arc<OnceCell<SessionHandle>>;

/// Mapa de todo el proceso: guild → su sesión viva.
///
/// La creación es idempotente por guild: llamadas concurrentes para el
/// mismo guild comparten una sola inicialización, y una conexión fallida
/// no deja ninguna entrada.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    sessions: DashMap<GuildId, Slot>,
    backend: Arc<dyn AudioBackend>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: DashMap::new(),
                backend,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Sesión viva de `guild_id`, si existe.
    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        let slot = self.inner.sessions.get(&guild_id)?;
        slot.value()
            .get()
            .filter(|handle| !handle.is_terminated())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .sessions
            .iter()
            .filter(|slot| slot.value().get().is_some_and(|handle| !handle.is_terminated()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Devuelve la sesión del guild, creándola y conectándola si hace falta.
    ///
    /// `presence` y `options` solo se usan si de verdad se crea una sesión
    /// nueva.
    pub async fn get_or_create(
        &self,
        guild_id: GuildId,
        presence: PresenceTracker,
        options: SessionOptions,
    ) -> Result<SessionHandle, SessionError> {
        let slot = {
            let mut entry = self
                .inner
                .sessions
                .entry(guild_id)
                .or_insert_with(|| Arc::new(OnceCell::new()));
            // Una sesión terminada cuyo vigilante aún no la quitó
            if entry.value().get().is_some_and(SessionHandle::is_terminated) {
                *entry.value_mut() = Arc::new(OnceCell::new());
            }
            entry.value().clone()
        };

        let created = slot
            .get_or_try_init(|| self.spawn_session(guild_id, presence, options))
            .await;

        match created {
            Ok(handle) => Ok(handle.clone()),
            Err(e) => {
                self.inner
                    .sessions
                    .remove_if(&guild_id, |_, current| {
                        Arc::ptr_eq(current, &slot) && !current.initialized()
                    });
                Err(e)
            }
        }
    }

    /// Agrega una petición, creando la sesión si no existe.
    ///
    /// Con `max_requests`, a quien ya tiene esa cantidad de peticiones
    /// pendientes se le rechaza antes de encolar nada. Si la sesión
    /// encontrada estaba cerrándose, se reintenta una vez con una nueva.
    pub async fn request_track(
        &self,
        guild_id: GuildId,
        presence: PresenceTracker,
        options: SessionOptions,
        track: Track,
        max_requests: Option<usize>,
    ) -> Result<RequestAck, SessionError> {
        let handle = self
            .get_or_create(guild_id, presence.clone(), options.clone())
            .await?;

        match Self::request_on(&handle, track.clone(), max_requests).await {
            Err(SessionError::Terminated) => {
                debug!(
                    "Sesión {} cerrándose en guild {}, se crea otra",
                    handle.id(),
                    guild_id
                );
                let handle = self.get_or_create(guild_id, presence, options).await?;
                Self::request_on(&handle, track, max_requests).await
            }
            result => result,
        }
    }

    async fn request_on(
        handle: &SessionHandle,
        track: Track,
        max_requests: Option<usize>,
    ) -> Result<RequestAck, SessionError> {
        let guild_id = handle.guild_id();
        if let (Some(max), Some(requester)) = (max_requests, track.requester()) {
            let pending = handle.snapshot().await?.requests_by(requester);
            if pending >= max {
                info!("🚫 {} ya tiene {} peticiones en guild {}", requester, pending, guild_id);
                return Err(SessionError::TooManyRequests(max));
            }
        }

        handle.request_track(track).await
    }

    /// Peticiones pendientes de `user` en `guild_id`; 0 si no hay sesión.
    pub async fn requests_by(&self, guild_id: GuildId, user: UserId) -> usize {
        match self.get(guild_id) {
            Some(handle) => handle
                .snapshot()
                .await
                .map_or(0, |snapshot| snapshot.requests_by(user)),
            None => 0,
        }
    }

    pub fn presence_changed(&self, guild_id: GuildId) {
        if let Some(handle) = self.get(guild_id) {
            handle.presence_changed();
        }
    }

    /// Entrega un evento del backend a la sesión de su guild.
    pub fn route(&self, event: GuildEvent) {
        match self.get(event.guild_id) {
            Some(handle) => handle.backend_event(event.event),
            None => debug!(
                "Evento del backend para guild {} sin sesión: {:?}",
                event.guild_id, event.event
            ),
        }
    }

    pub fn spawn_event_router(
        &self,
        mut events: mpsc::UnboundedReceiver<GuildEvent>,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                registry.route(event);
            }
            debug!("Canal de eventos del backend cerrado");
        })
    }

    /// Cierra todas las sesiones vivas.
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self
            .inner
            .sessions
            .iter()
            .filter_map(|slot| slot.value().get().cloned())
            .collect();

        info!("🧹 Cerrando {} sesiones", handles.len());
        for handle in handles {
            if handle.shutdown().await.is_err() {
                debug!("Sesión {} ya estaba cerrada", handle.id());
            }
        }
    }

    async fn spawn_session(
        &self,
        guild_id: GuildId,
        presence: PresenceTracker,
        options: SessionOptions,
    ) -> Result<SessionHandle, SessionError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (handle, task) =
            Session::start(id, guild_id, presence, options, self.inner.backend.clone()).await?;
        info!("📋 Sesión {} registrada para guild {}", id, guild_id);

        let registry = self.clone();
        tokio::spawn(async move {
            if let Err(e) = task.await {
                error!("💥 La sesión {} terminó de forma anómala: {}", id, e);
            }
            registry.remove(guild_id, id);
        });

        Ok(handle)
    }

    fn remove(&self, guild_id: GuildId, id: SessionId) {
        let removed = self.inner.sessions.remove_if(&guild_id, |_, slot| {
            slot.get().is_some_and(|handle| handle.id() == id)
        });
        if removed.is_some() {
            info!("🗑️ Sesión {} eliminada del registro (guild {})", id, guild_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::backend::{BackendEvent, TrackEndReason},
        testing::{channel, guild, track, user, BackendCall, FakeBackend, StaticPresence, BOT},
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn setup(listeners: &[u64]) -> (SessionRegistry, Arc<FakeBackend>, Arc<StaticPresence>) {
        let backend = Arc::new(FakeBackend::default());
        let presence = Arc::new(StaticPresence::with_listeners(listeners));
        (SessionRegistry::new(backend.clone()), backend, presence)
    }

    fn tracker(presence: &Arc<StaticPresence>) -> PresenceTracker {
        PresenceTracker::new(channel(5), user(BOT), presence.clone())
    }

    #[tokio::test]
    async fn one_session_per_guild() {
        let (registry, backend, presence) = setup(&[10]);

        let (first, second) = tokio::join!(
            registry.get_or_create(guild(1), tracker(&presence), SessionOptions::default()),
            registry.get_or_create(guild(1), tracker(&presence), SessionOptions::default()),
        );

        assert_eq!(first.unwrap().id(), second.unwrap().id());
        assert_eq!(backend.count(&BackendCall::Connect(channel(5))), 1);
        assert_eq!(registry.len(), 1);

        registry
            .get_or_create(guild(2), tracker(&presence), SessionOptions::default())
            .await
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn failed_connect_leaves_no_entry() {
        let (registry, backend, presence) = setup(&[10]);
        backend.refuse_connections();

        let err = registry
            .get_or_create(guild(1), tracker(&presence), SessionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Backend(_)));
        assert!(registry.get(guild(1)).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn terminated_sessions_are_replaced() {
        let (registry, _backend, presence) = setup(&[10]);
        let first = registry
            .get_or_create(guild(1), tracker(&presence), SessionOptions::default())
            .await
            .unwrap();

        first.shutdown().await.unwrap();
        first.closed().await;
        assert!(registry.get(guild(1)).is_none());

        let second = registry
            .get_or_create(guild(1), tracker(&presence), SessionOptions::default())
            .await
            .unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test]
    async fn caps_pending_requests_per_user() {
        let (registry, _backend, presence) = setup(&[10]);
        let request = |id: &str| {
            registry.request_track(
                guild(1),
                tracker(&presence),
                SessionOptions::default(),
                track(id).requested_by(user(10)),
                Some(1),
            )
        };

        // La primera suena enseguida, la segunda queda pendiente
        assert_eq!(request("a").await.unwrap().position, 0);
        assert_eq!(request("b").await.unwrap().position, 1);

        let err = request("c").await.unwrap_err();
        assert!(matches!(err, SessionError::TooManyRequests(1)));
        assert_eq!(registry.requests_by(guild(1), user(10)).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn request_during_drain_gets_a_new_session() {
        let (registry, backend, presence) = setup(&[10]);
        let request = |id: &str| {
            registry.request_track(
                guild(1),
                tracker(&presence),
                SessionOptions::default(),
                track(id),
                None,
            )
        };
        request("a").await.unwrap();
        let first = registry.get(guild(1)).unwrap();

        // La sesión se queda esperando a la desconexión mientras llega "b"
        backend.slow_disconnect(Duration::from_secs(2));
        first.backend_event(BackendEvent::TrackEnd {
            track_id: "a".into(),
            reason: TrackEndReason::Finished,
        });

        let ack = request("b").await.unwrap();
        assert_eq!(ack.position, 0);
        assert!(first.is_terminated());

        let second = registry.get(guild(1)).unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(backend.count(&BackendCall::Connect(channel(5))), 2);
        assert_eq!(backend.played(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn routes_backend_events_by_guild() {
        let (registry, backend, presence) = setup(&[10]);
        let (events, receiver) = mpsc::unbounded_channel();
        let router = registry.spawn_event_router(receiver);

        let handle = registry
            .get_or_create(guild(1), tracker(&presence), SessionOptions::default())
            .await
            .unwrap();
        handle.request_track(track("a")).await.unwrap();
        handle.request_track(track("b")).await.unwrap();

        events
            .send(GuildEvent {
                guild_id: guild(1),
                event: BackendEvent::TrackEnd {
                    track_id: "a".into(),
                    reason: TrackEndReason::Finished,
                },
            })
            .unwrap();
        // Un guild sin sesión no debe afectar a nadie
        events
            .send(GuildEvent {
                guild_id: guild(9),
                event: BackendEvent::TrackEnd {
                    track_id: "b".into(),
                    reason: TrackEndReason::Finished,
                },
            })
            .unwrap();

        drop(events);
        router.await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.current_track.map(|t| t.id().to_string()), Some("b".into()));
        assert_eq!(backend.played(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn shutdown_closes_every_session() {
        let (registry, backend, presence) = setup(&[10]);
        for id in [1, 2] {
            registry
                .get_or_create(guild(id), tracker(&presence), SessionOptions::default())
                .await
                .unwrap();
        }

        registry.shutdown().await;

        assert!(registry.is_empty());
        assert_eq!(backend.count(&BackendCall::Disconnect), 2);
    }
}
