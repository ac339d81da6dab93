use parking_lot::RwLock;
use serenity::all::{ActivityData, Context, GuildId};
use tracing::debug;

use crate::notify::{Notification, NotificationSink};

/// Cambio del estado "Jugando a ..." del bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Playing(String),
    Clear,
}

impl StatusUpdate {
    pub fn for_notification(notification: &Notification) -> Option<Self> {
        match notification {
            Notification::NowPlaying { track } => Some(match track.author() {
                Some(author) => Self::Playing(format!("{} - {}", track.title(), author)),
                None => Self::Playing(track.title().to_string()),
            }),
            Notification::SessionEnded => Some(Self::Clear),
            Notification::TrackAdded { .. } | Notification::TrackFailed { .. } => None,
        }
    }

    fn into_activity(self) -> Option<ActivityData> {
        match self {
            StatusUpdate::Playing(name) => Some(ActivityData::playing(name)),
            StatusUpdate::Clear => None,
        }
    }
}

/// Shows what one chosen guild is playing as the bot's own activity.
///
/// Discord only displays a single activity per bot user, so every other
/// guild's notifications are ignored. Updates sent before the gateway is
/// ready are dropped.
pub struct PlayingStatus {
    guild_id: GuildId,
    ctx: RwLock<Option<Context>>,
}

impl PlayingStatus {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            ctx: RwLock::new(None),
        }
    }

    /// Se llama en `ready`, cuando ya hay shard al que avisar
    pub fn attach(&self, ctx: &Context) {
        *self.ctx.write() = Some(ctx.clone());
    }

    fn update_for(&self, guild_id: GuildId, notification: &Notification) -> Option<StatusUpdate> {
        if guild_id != self.guild_id {
            return None;
        }
        StatusUpdate::for_notification(notification)
    }
}

impl NotificationSink for PlayingStatus {
    fn notify(&self, guild_id: GuildId, notification: &Notification) {
        let Some(update) = self.update_for(guild_id, notification) else {
            return;
        };

        match self.ctx.read().as_ref() {
            Some(ctx) => {
                debug!("🎮 Estado del bot: {:?}", update);
                ctx.set_activity(update.into_activity());
            }
            None => debug!("Gateway sin conectar, estado {:?} descartado", update),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{guild, track};
    use pretty_assertions::assert_eq;

    #[test]
    fn now_playing_sets_and_session_end_clears() {
        let playing = Notification::NowPlaying {
            track: track("a").with_author("Someone"),
        };
        assert_eq!(
            StatusUpdate::for_notification(&playing),
            Some(StatusUpdate::Playing("Track a - Someone".into()))
        );

        let untitled = Notification::NowPlaying { track: track("b") };
        assert_eq!(
            StatusUpdate::for_notification(&untitled),
            Some(StatusUpdate::Playing("Track b".into()))
        );

        assert_eq!(
            StatusUpdate::for_notification(&Notification::SessionEnded),
            Some(StatusUpdate::Clear)
        );
        let added = Notification::TrackAdded {
            track: track("c"),
            position: 1,
        };
        assert_eq!(StatusUpdate::for_notification(&added), None);
    }

    #[test]
    fn only_the_configured_guild_drives_the_status() {
        let status = PlayingStatus::new(guild(7));

        assert_eq!(
            status.update_for(guild(7), &Notification::SessionEnded),
            Some(StatusUpdate::Clear)
        );
        assert_eq!(status.update_for(guild(8), &Notification::SessionEnded), None);

        // Sin gateway todavía: no hace nada
        status.notify(guild(7), &Notification::SessionEnded);
    }

    #[test]
    fn activity_is_a_playing_entry_or_nothing() {
        let activity = StatusUpdate::Playing("Track a".into())
            .into_activity()
            .unwrap();
        assert_eq!(activity.name, "Track a");
        assert_eq!(activity.kind, serenity::all::ActivityType::Playing);

        assert!(StatusUpdate::Clear.into_activity().is_none());
    }
}
