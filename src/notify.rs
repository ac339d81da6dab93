use serde::Serialize;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audio::track::Track;

/// Structured messages for an external presenter. Rendering (embeds,
/// colours, text) is not this crate's concern.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    TrackAdded { track: Track, position: usize },
    NowPlaying { track: Track },
    TrackFailed { track: Track, reason: String },
    SessionEnded,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, guild_id: GuildId, notification: &Notification);
}

/// Escribe cada notificación como JSON en el log
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, guild_id: GuildId, notification: &Notification) {
        match serde_json::to_string(notification) {
            Ok(json) => info!(guild = %guild_id, "📣 {}", json),
            Err(e) => warn!("No se pudo serializar la notificación: {}", e),
        }
    }
}

/// Reparte cada notificación entre varios sinks, en orden
pub struct FanOut {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanOut {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

impl NotificationSink for FanOut {
    fn notify(&self, guild_id: GuildId, notification: &Notification) {
        for sink in &self.sinks {
            sink.notify(guild_id, notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{guild, track};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Counter {
        seen: Mutex<Vec<GuildId>>,
    }

    impl NotificationSink for Counter {
        fn notify(&self, guild_id: GuildId, _notification: &Notification) {
            self.seen.lock().push(guild_id);
        }
    }

    #[test]
    fn fan_out_reaches_every_sink() {
        let first = Arc::new(Counter::default());
        let second = Arc::new(Counter::default());
        let fan_out = FanOut::new(vec![first.clone(), second.clone(), Arc::new(TracingSink)]);

        fan_out.notify(guild(3), &Notification::SessionEnded);

        assert_eq!(*first.seen.lock(), vec![guild(3)]);
        assert_eq!(*second.seen.lock(), vec![guild(3)]);
    }

    #[test]
    fn notifications_serialize_as_tagged_data() {
        let added = Notification::TrackAdded {
            track: track("abc").with_author("Someone"),
            position: 2,
        };
        let json: serde_json::Value = serde_json::to_value(&added).unwrap();

        assert_eq!(json["type"], "track_added");
        assert_eq!(json["position"], 2);
        assert_eq!(json["track"]["id"], "abc");
        assert_eq!(json["track"]["author"], "Someone");
        assert_eq!(json["track"]["source"]["kind"], "stream");

        let ended = serde_json::to_value(Notification::SessionEnded).unwrap();
        assert_eq!(ended["type"], "session_ended");
    }
}
