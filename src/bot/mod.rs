//! # Bot Module
//!
//! Discord glue around the session registry.
//!
//! [`MeloettaBot`] implements Serenity's [`EventHandler`]. It starts the
//! configured always-on radios once the gateway is ready and forwards
//! voice state changes to the session of the affected guild so its
//! listener set is recomputed.
//!
//! With `PLAYING_STATUS_GUILD` set, [`status::PlayingStatus`] mirrors
//! that guild's current track in the bot's activity.
//!
//! Command parsing and authorization live outside this crate; they talk
//! to sessions through [`SessionRegistry`].

use serenity::{
    all::{ChannelId, Context, EventHandler, Guild, GuildId, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    config::{AlwaysOnInstance, Config},
    notify::{FanOut, NotificationSink},
    session::{
        presence::{CachePresence, PresenceTracker},
        registry::SessionRegistry,
        SessionOptions,
    },
};

pub mod status;

use self::status::PlayingStatus;

pub struct MeloettaBot {
    config: Arc<Config>,
    registry: SessionRegistry,
    status: Option<Arc<PlayingStatus>>,
}

impl MeloettaBot {
    pub fn new(config: Arc<Config>, registry: SessionRegistry) -> Self {
        let status = config
            .playing_status_guild
            .map(|guild_id| Arc::new(PlayingStatus::new(guild_id)));
        Self {
            config,
            registry,
            status,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Opciones para sesiones pedidas por usuarios.
    pub fn session_options(&self) -> SessionOptions {
        self.with_status(self.config.session_options())
    }

    /// Agrega el estado del bot a los sinks de la sesión, si está activo
    fn with_status(&self, options: SessionOptions) -> SessionOptions {
        let Some(status) = &self.status else {
            return options;
        };

        let mut sinks: Vec<Arc<dyn NotificationSink>> = options.log_sink.into_iter().collect();
        sinks.push(status.clone());
        SessionOptions {
            log_sink: Some(Arc::new(FanOut::new(sinks))),
            ..options
        }
    }

    /// Presence tracker for a voice channel, backed by the gateway cache.
    pub fn presence(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> PresenceTracker {
        let source = CachePresence::new(ctx.cache.clone(), guild_id);
        PresenceTracker::new(channel_id, ctx.cache.current_user().id, Arc::new(source))
    }

    async fn start_instance(&self, ctx: &Context, instance: AlwaysOnInstance) {
        let options = match self.config.instance_options() {
            Ok(options) => self.with_status(options),
            Err(e) => {
                error!("❌ No se pudo preparar la radio fija: {:?}", e);
                return;
            }
        };

        let presence = Self::presence(ctx, instance.guild_id, instance.channel_id);
        match self.registry.get_or_create(instance.guild_id, presence, options).await {
            Ok(handle) => info!(
                "📻 Radio fija iniciada en guild {} (sesión {})",
                instance.guild_id,
                handle.id()
            ),
            Err(e) => error!(
                "❌ Error al iniciar la radio fija en guild {}: {}",
                instance.guild_id, e
            ),
        }
    }
}

#[async_trait]
impl EventHandler for MeloettaBot {
    /// Starts every always-on radio and hooks up the playing status.
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Some(status) = &self.status {
            status.attach(&ctx);
        }

        for instance in self.config.always_on.iter().copied() {
            self.start_instance(&ctx, instance).await;
        }
    }

    /// The cache only knows a guild's voice states after its
    /// `GUILD_CREATE`, so sessions started earlier re-check here.
    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        self.registry.presence_changed(guild.id);
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        // Detectar si el bot fue desconectado desde fuera
        let bot_id = ctx.cache.current_user().id;
        if new.user_id == bot_id && old.is_some() && new.channel_id.is_none() {
            if let Some(handle) = self.registry.get(guild_id) {
                warn!("🔌 Bot desconectado en guild {}, cerrando sesión", guild_id);
                if let Err(e) = handle.shutdown().await {
                    error!("Error al cerrar la sesión: {}", e);
                }
            }
            return;
        }

        self.registry.presence_changed(guild_id);
    }
}
