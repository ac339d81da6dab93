use chrono::{DateTime, Utc};
use serde::Serialize;
use serenity::model::id::UserId;
use std::{path::PathBuf, sync::OnceLock, time::Duration};

/// Origen de un track. Conjunto cerrado: la sesión y la cola nunca
/// ramifican sobre esta variante, sólo el backend al resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackSource {
    Stream {
        url: String,
        thumbnail: Option<String>,
    },
    LocalFile {
        path: PathBuf,
    },
    Attachment {
        url: String,
        filename: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Stream,
    LocalFile,
    Attachment,
}

impl TrackSource {
    pub fn kind(&self) -> TrackKind {
        match self {
            TrackSource::Stream { .. } => TrackKind::Stream,
            TrackSource::LocalFile { .. } => TrackKind::LocalFile,
            TrackSource::Attachment { .. } => TrackKind::Attachment,
        }
    }

    /// URL o ruta que el backend usa para resolver el track
    pub fn location(&self) -> String {
        match self {
            TrackSource::Stream { url, .. } | TrackSource::Attachment { url, .. } => url.clone(),
            TrackSource::LocalFile { path } => path.display().to_string(),
        }
    }
}

/// Referencia opaca que devuelve el backend al resolver un track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendHandle(String);

impl BackendHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An immutable playable unit plus the identity of whoever asked for it.
///
/// Tracks are built by the command layer at request time. The only
/// mutation ever allowed is [`Track::attach_handle`], which the session
/// (or the radio prefetcher) performs once right before playback.
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    id: String,
    title: String,
    author: Option<String>,
    duration_ms: u64,
    source: TrackSource,
    requester: Option<UserId>,
    requested_at: DateTime<Utc>,
    #[serde(skip)]
    handle: OnceLock<BackendHandle>,
}

impl Track {
    fn new(id: String, title: String, source: TrackSource) -> Self {
        Self {
            id,
            title,
            author: None,
            duration_ms: 0,
            source,
            requester: None,
            requested_at: Utc::now(),
            handle: OnceLock::new(),
        }
    }

    pub fn stream(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(
            id.into(),
            title.into(),
            TrackSource::Stream {
                url: url.into(),
                thumbnail: None,
            },
        )
    }

    /// Track local; el título sale del nombre del fichero
    pub fn local_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown".to_string());
        let id = path.display().to_string();
        Self::new(id, title, TrackSource::LocalFile { path })
    }

    pub fn attachment(url: impl Into<String>, filename: impl Into<String>) -> Self {
        let url = url.into();
        let filename = filename.into();
        Self::new(
            url.clone(),
            filename.clone(),
            TrackSource::Attachment { url, filename },
        )
    }

    // Getters
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        (self.duration_ms > 0).then(|| Duration::from_millis(self.duration_ms))
    }
    pub fn source(&self) -> &TrackSource {
        &self.source
    }
    pub fn kind(&self) -> TrackKind {
        self.source.kind()
    }
    pub fn requester(&self) -> Option<UserId> {
        self.requester
    }
    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }
    pub fn handle(&self) -> Option<&BackendHandle> {
        self.handle.get()
    }

    // Setters estilo builder
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        if let TrackSource::Stream { thumbnail: slot, .. } = &mut self.source {
            *slot = Some(thumbnail.into());
        }
        self
    }

    pub fn requested_by(mut self, user: UserId) -> Self {
        self.requester = Some(user);
        self
    }

    /// Attaches the backend handle. Returns `false` when the track was
    /// already resolved; the first handle always wins.
    pub fn attach_handle(&self, handle: BackendHandle) -> bool {
        self.handle.set(handle).is_ok()
    }
}
