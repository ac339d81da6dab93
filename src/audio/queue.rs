use async_trait::async_trait;
use rand::seq::SliceRandom;
use serenity::model::id::UserId;
use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{backend::AudioBackend, track::Track};

/// Fallos seguidos tolerados antes de esperar entre candidatos de radio
const FALLBACK_BURST: u32 = 5;
const FALLBACK_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Peticiones pendientes, FIFO con inserción explícita al frente.
///
/// Aquí no hay deduplicación ni límites: el tope por usuario lo revisa
/// quien llama antes de que la petición llegue a la cola.
#[derive(Debug, Default)]
pub struct Queue {
    requests: VecDeque<Track>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega una petición y devuelve su posición (1 = la siguiente)
    pub fn add_request(&mut self, track: Track, at_start: bool) -> usize {
        if at_start {
            debug!("⏮️ Agregado al principio de la cola: {}", track.title());
            self.requests.push_front(track);
            1
        } else {
            debug!("➕ Agregado a la cola: {}", track.title());
            self.requests.push_back(track);
            self.requests.len()
        }
    }

    /// Obtiene el siguiente track (FIFO)
    pub fn next_track(&mut self) -> Option<Track> {
        self.requests.pop_front()
    }

    pub fn requests(&self) -> impl Iterator<Item = &Track> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Cuántas peticiones pendientes tiene un usuario
    pub fn requests_by(&self, user: UserId) -> usize {
        self.requests
            .iter()
            .filter(|track| track.requester() == Some(user))
            .count()
    }

    /// Elimina la petición en `index` (base 0)
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        self.requests.remove(index)
    }

    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.requests.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada ({} peticiones)", self.requests.len());
    }

    pub fn total_duration(&self) -> Duration {
        self.requests.iter().filter_map(Track::duration).sum()
    }
}

/// Fuente de candidatos para la radio cuando se acaban las peticiones.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FallbackSource: Send + Sync {
    /// Elige un candidato nuevo, o `None` si ahora no hay nada.
    async fn candidate(&self) -> Option<Track>;
}

/// Un `.mp3` al azar de un directorio local, como la radio fija clásica.
pub struct DirectoryFallback {
    directory: PathBuf,
}

impl DirectoryFallback {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    async fn mp3_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_mp3 = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
            if is_mp3 {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl FallbackSource for DirectoryFallback {
    async fn candidate(&self) -> Option<Track> {
        let files = match self.mp3_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!("📁 No se pudo leer {}: {}", self.directory.display(), e);
                return None;
            }
        };

        let path = files.choose(&mut rand::thread_rng())?.clone();
        Some(Track::local_file(path))
    }
}

/// Una cola que nunca se vacía.
///
/// Las peticiones pendientes siempre van primero. Cuando no hay, la radio
/// entrega un track de respaldo que una tarea en segundo plano ya
/// resolvió, así la latencia de resolución nunca se oye como silencio.
pub struct Radio {
    queue: Queue,
    fallback: Arc<dyn FallbackSource>,
    backend: Arc<dyn AudioBackend>,
    next_fallback: Option<JoinHandle<Track>>,
}

impl Radio {
    /// Debe llamarse dentro de un runtime de tokio: la primera resolución
    /// anticipada arranca enseguida.
    pub fn new(fallback: Arc<dyn FallbackSource>, backend: Arc<dyn AudioBackend>) -> Self {
        let mut radio = Self {
            queue: Queue::new(),
            fallback,
            backend,
            next_fallback: None,
        };
        radio.next_fallback = Some(radio.spawn_prefetch());
        radio
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut Queue {
        &mut self.queue
    }

    /// Siguiente track; nunca devuelve vacío
    pub async fn next_track(&mut self) -> Track {
        if let Some(track) = self.queue.next_track() {
            return track;
        }

        // Sólo la primera vez esperamos a que termine la resolución inicial
        let track = match self.next_fallback.take() {
            Some(prefetch) => match prefetch.await {
                Ok(track) => track,
                Err(e) => {
                    warn!("📻 Prefetch de radio abortado: {}", e);
                    resolve_fallback(self.fallback.as_ref(), self.backend.as_ref()).await
                }
            },
            None => resolve_fallback(self.fallback.as_ref(), self.backend.as_ref()).await,
        };

        self.next_fallback = Some(self.spawn_prefetch());
        info!("📻 Radio: {}", track.title());
        track
    }

    fn spawn_prefetch(&self) -> JoinHandle<Track> {
        let fallback = self.fallback.clone();
        let backend = self.backend.clone();
        tokio::spawn(async move { resolve_fallback(fallback.as_ref(), backend.as_ref()).await })
    }
}

impl Drop for Radio {
    fn drop(&mut self) {
        if let Some(prefetch) = self.next_fallback.take() {
            prefetch.abort();
        }
    }
}

/// Pide candidatos hasta que uno se resuelva. Los fallos se registran en
/// el log y nunca se propagan: quien llama recibe otro track.
async fn resolve_fallback(fallback: &dyn FallbackSource, backend: &dyn AudioBackend) -> Track {
    let mut failures = 0u32;
    loop {
        match fallback.candidate().await {
            Some(track) => match backend.resolve(&track).await {
                Ok(handle) => {
                    track.attach_handle(handle);
                    return track;
                }
                Err(e) => warn!("📻 Candidato de radio descartado ({}): {}", track.title(), e),
            },
            None => warn!("📻 La fuente de radio no devolvió candidatos"),
        }

        failures += 1;
        if failures % FALLBACK_BURST == 0 {
            tokio::time::sleep(FALLBACK_RETRY_DELAY).await;
        }
    }
}

/// Cola simple o radio; la sesión solo ve esto.
pub enum TrackQueue {
    Plain(Queue),
    Radio(Radio),
}

impl TrackQueue {
    pub fn is_radio(&self) -> bool {
        matches!(self, TrackQueue::Radio(_))
    }

    pub fn pending(&self) -> &Queue {
        match self {
            TrackQueue::Plain(queue) => queue,
            TrackQueue::Radio(radio) => radio.queue(),
        }
    }

    pub fn pending_mut(&mut self) -> &mut Queue {
        match self {
            TrackQueue::Plain(queue) => queue,
            TrackQueue::Radio(radio) => radio.queue_mut(),
        }
    }

    pub fn add_request(&mut self, track: Track, at_start: bool) -> usize {
        self.pending_mut().add_request(track, at_start)
    }

    pub async fn next_track(&mut self) -> Option<Track> {
        match self {
            TrackQueue::Plain(queue) => queue.next_track(),
            TrackQueue::Radio(radio) => Some(radio.next_track().await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{track, user, BackendCall, FakeBackend};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ids(queue: &Queue) -> Vec<&str> {
        queue.requests().map(Track::id).collect()
    }

    #[test]
    fn requests_come_out_in_fifo_order() {
        let mut queue = Queue::new();
        for id in ["a", "b", "c"] {
            queue.add_request(track(id), false);
        }

        let order: Vec<String> = std::iter::from_fn(|| queue.next_track())
            .map(|t| t.id().to_string())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(queue.next_track().is_none());
    }

    #[test]
    fn front_insertion_is_next() {
        let mut queue = Queue::new();
        queue.add_request(track("a"), false);
        queue.add_request(track("b"), false);
        assert_eq!(queue.add_request(track("again"), true), 1);

        assert_eq!(ids(&queue), vec!["again", "a", "b"]);
        assert_eq!(queue.next_track().map(|t| t.id().to_string()), Some("again".into()));
    }

    #[test]
    fn counts_and_removes_requests() {
        let mut queue = Queue::new();
        queue.add_request(track("a").requested_by(user(10)), false);
        queue.add_request(track("b").requested_by(user(11)), false);
        queue.add_request(track("c").requested_by(user(10)), false);

        assert_eq!(queue.requests_by(user(10)), 2);
        assert_eq!(queue.requests_by(user(12)), 0);

        let removed = queue.remove(1).map(|t| t.id().to_string());
        assert_eq!(removed, Some("b".to_string()));
        assert_eq!(ids(&queue), vec!["a", "c"]);
        assert!(queue.remove(5).is_none());
    }

    #[test]
    fn shuffle_keeps_every_request() {
        let mut queue = Queue::new();
        for id in ["a", "b", "c", "d", "e"] {
            queue.add_request(track(id), false);
        }
        queue.shuffle();

        let mut shuffled = ids(&queue);
        shuffled.sort_unstable();
        assert_eq!(shuffled, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn total_duration_skips_unknown_lengths() {
        let mut queue = Queue::new();
        queue.add_request(track("a").with_duration(Duration::from_secs(60)), false);
        queue.add_request(track("b"), false);
        queue.add_request(track("c").with_duration(Duration::from_secs(30)), false);
        assert_eq!(queue.total_duration(), Duration::from_secs(90));
    }

    fn numbered_source() -> MockFallbackSource {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut source = MockFallbackSource::new();
        source.expect_candidate().returning(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Some(track(&format!("radio-{n}")))
        });
        source
    }

    #[tokio::test]
    async fn radio_never_runs_dry() {
        let backend = Arc::new(FakeBackend::default());
        let mut radio = Radio::new(Arc::new(numbered_source()), backend);

        for _ in 0..3 {
            let track = radio.next_track().await;
            assert!(track.id().starts_with("radio-"));
            assert!(track.handle().is_some(), "fallback tracks arrive resolved");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn radio_resolves_the_next_fallback_ahead_of_time() {
        let backend = Arc::new(FakeBackend::default());
        let mut radio = Radio::new(Arc::new(numbered_source()), backend.clone());

        assert_eq!(radio.next_track().await.id(), "radio-0");
        tokio::time::sleep(Duration::from_millis(10)).await;

        // radio-1 ya está resuelto antes de pedirlo
        assert_eq!(backend.count(&BackendCall::Resolve("radio-1".into())), 1);
        let calls_before = backend.calls().len();

        let next = radio.next_track().await;
        assert_eq!(next.id(), "radio-1");
        assert!(next.handle().is_some());
        let calls = backend.calls();
        assert!(!calls[calls_before..].contains(&BackendCall::Resolve("radio-1".into())));
    }

    #[tokio::test]
    async fn radio_prefers_pending_requests() {
        let backend = Arc::new(FakeBackend::default());
        let mut radio = Radio::new(Arc::new(numbered_source()), backend);
        radio.queue_mut().add_request(track("wanted"), false);

        assert_eq!(radio.next_track().await.id(), "wanted");
        assert!(radio.next_track().await.id().starts_with("radio-"));
    }

    #[tokio::test]
    async fn radio_hides_unplayable_candidates() {
        let backend = Arc::new(FakeBackend::default());
        backend.mark_unplayable("radio-0");
        backend.mark_unplayable("radio-1");
        let mut radio = Radio::new(Arc::new(numbered_source()), backend);

        let track = radio.next_track().await;
        assert_eq!(track.id(), "radio-2");
    }

    #[tokio::test(start_paused = true)]
    async fn radio_keeps_retrying_an_empty_source() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut source = MockFallbackSource::new();
        source.expect_candidate().returning(move || {
            // Vacía durante las primeras rondas
            let n = seen.fetch_add(1, Ordering::SeqCst);
            (n >= 7).then(|| track("late"))
        });

        let mut radio = Radio::new(Arc::new(source), Arc::new(FakeBackend::default()));
        assert_eq!(radio.next_track().await.id(), "late");
        assert!(calls.load(Ordering::SeqCst) >= 8);
    }

    #[tokio::test]
    async fn plain_queue_returns_none_when_empty() {
        let mut queue = TrackQueue::Plain(Queue::new());
        assert!(!queue.is_radio());
        assert!(queue.next_track().await.is_none());
        queue.add_request(track("a"), false);
        assert_eq!(queue.next_track().await.map(|t| t.id().to_string()), Some("a".into()));
    }

    #[tokio::test]
    async fn directory_fallback_only_picks_mp3_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("theme.mp3"), b"").await.unwrap();
        tokio::fs::write(dir.path().join("cover.jpg"), b"").await.unwrap();

        let source = DirectoryFallback::new(dir.path());
        for _ in 0..5 {
            let candidate = source.candidate().await.unwrap();
            assert_eq!(candidate.title(), "theme");
        }

        dir.close().unwrap();
        assert!(source.candidate().await.is_none());
    }
}
