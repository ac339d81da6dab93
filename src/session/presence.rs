use serenity::{
    cache::Cache,
    model::{
        id::{ChannelId, GuildId, UserId},
        voice::VoiceState,
    },
};
use std::{collections::HashSet, sync::Arc};

/// The part of a member's voice state that decides whether they listen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSnapshot {
    pub user_id: UserId,
    pub deaf: bool,
    pub self_deaf: bool,
}

impl VoiceSnapshot {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            deaf: false,
            self_deaf: false,
        }
    }

    pub fn deafened(mut self) -> Self {
        self.deaf = true;
        self
    }

    pub fn self_deafened(mut self) -> Self {
        self.self_deaf = true;
        self
    }
}

impl From<&VoiceState> for VoiceSnapshot {
    fn from(state: &VoiceState) -> Self {
        Self {
            user_id: state.user_id,
            deaf: state.deaf,
            self_deaf: state.self_deaf,
        }
    }
}

/// Live voice-state snapshot of a channel, supplied by the chat platform.
pub trait PresenceSource: Send + Sync {
    fn voice_states(&self, channel_id: ChannelId) -> Vec<VoiceSnapshot>;
}

/// Reads voice states straight out of serenity's cache.
pub struct CachePresence {
    cache: Arc<Cache>,
    guild_id: GuildId,
}

impl CachePresence {
    pub fn new(cache: Arc<Cache>, guild_id: GuildId) -> Self {
        Self { cache, guild_id }
    }
}

impl PresenceSource for CachePresence {
    fn voice_states(&self, channel_id: ChannelId) -> Vec<VoiceSnapshot> {
        let Some(guild) = self.cache.guild(self.guild_id) else {
            return Vec::new();
        };

        guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel_id))
            .map(VoiceSnapshot::from)
            .collect()
    }
}

/// Projection of a channel's voice states onto the set of listeners.
///
/// Nothing is cached: every call asks the source again, so a platform
/// reconnect can never leave a stale listener set behind.
#[derive(Clone)]
pub struct PresenceTracker {
    channel_id: ChannelId,
    bot_id: UserId,
    source: Arc<dyn PresenceSource>,
}

impl PresenceTracker {
    pub fn new(channel_id: ChannelId, bot_id: UserId, source: Arc<dyn PresenceSource>) -> Self {
        Self {
            channel_id,
            bot_id,
            source,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Members of the channel that are not the bot and not deafened.
    pub fn listeners(&self) -> HashSet<UserId> {
        self.source
            .voice_states(self.channel_id)
            .into_iter()
            .filter(|state| state.user_id != self.bot_id && !(state.deaf || state.self_deaf))
            .map(|state| state.user_id)
            .collect()
    }

    pub fn is_alone(&self) -> bool {
        self.listeners().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{channel, user, StaticPresence, BOT};

    fn tracker(source: Arc<StaticPresence>) -> PresenceTracker {
        PresenceTracker::new(channel(7), user(BOT), source)
    }

    #[test]
    fn deafened_members_are_not_listeners() {
        let source = Arc::new(StaticPresence::default());
        source.set(vec![
            VoiceSnapshot::new(user(BOT)),
            VoiceSnapshot::new(user(10)),
            VoiceSnapshot::new(user(11)).self_deafened(),
            VoiceSnapshot::new(user(12)).deafened(),
        ]);

        let listeners = tracker(source).listeners();
        assert_eq!(listeners, [user(10)].into_iter().collect());
    }

    #[test]
    fn bot_alone_counts_as_alone() {
        let source = Arc::new(StaticPresence::with_listeners(&[]));
        let tracker = tracker(source.clone());
        assert!(tracker.is_alone());
        assert!(!tracker.listeners().contains(&user(BOT)));

        source.set_listeners(&[10]);
        assert!(!tracker.is_alone());
    }

    #[test]
    fn recomputed_on_every_call() {
        let source = Arc::new(StaticPresence::with_listeners(&[10, 11]));
        let tracker = tracker(source.clone());
        assert_eq!(tracker.listeners().len(), 2);

        source.set(vec![VoiceSnapshot::new(user(BOT)), VoiceSnapshot::new(user(11))]);
        assert_eq!(tracker.listeners(), [user(11)].into_iter().collect());
    }
}
