use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use crate::{
    audio::queue::DirectoryFallback,
    notify::TracingSink,
    session::{
        votes::{QuorumRule, VoteKind},
        SessionOptions, DEFAULT_IDLE_TIMEOUT, DEFAULT_VOLUME,
    },
};

/// A radio pinned to a voice channel from startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AlwaysOnInstance {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,

    // Audio
    pub default_volume: u8,
    pub idle_timeout: Duration,

    // Radio
    pub radio_directory: Option<PathBuf>,
    pub always_on: Vec<AlwaysOnInstance>,

    // Límites y votaciones
    pub max_requests_per_user: Option<usize>,
    pub quorum_overrides: HashMap<VoteKind, QuorumRule>,

    // Estado del bot
    pub playing_status_guild: Option<GuildId>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,

            // Audio
            default_volume: var("DEFAULT_VOLUME", &DEFAULT_VOLUME.to_string())
                .parse()
                .context("DEFAULT_VOLUME must be an integer between 0 and 100")?,
            idle_timeout: humantime::parse_duration(&var(
                "IDLE_TIMEOUT",
                &humantime::format_duration(DEFAULT_IDLE_TIMEOUT).to_string(),
            ))
            .context("IDLE_TIMEOUT must be a duration such as 5m")?,

            // Radio
            radio_directory: lookup("RADIO_DIRECTORY")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            always_on: parse_always_on(&var("ALWAYS_ON", ""))?,

            // Límites y votaciones (0 = sin límite)
            max_requests_per_user: match var("MAX_CONCURRENT_REQUESTS", "0").parse::<usize>()? {
                0 => None,
                max => Some(max),
            },
            quorum_overrides: parse_quorums(&var("VOTE_QUORUMS", ""))?,

            // Estado del bot
            playing_status_guild: lookup("PLAYING_STATUS_GUILD")
                .filter(|id| !id.trim().is_empty())
                .map(|id| parse_id(&id, "guild").map(GuildId::new))
                .transpose()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0 and 100
    /// - Idle timeout must be greater than zero
    /// - Always-on radios need a radio directory
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 100 {
            anyhow::bail!("Default volume must be between 0 and 100, got: {}", self.default_volume);
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if !self.always_on.is_empty() && self.radio_directory.is_none() {
            anyhow::bail!("ALWAYS_ON instances require RADIO_DIRECTORY");
        }

        Ok(())
    }

    /// Options for sessions created on user request.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            default_volume: self.default_volume,
            idle_timeout: self.idle_timeout,
            quorum_overrides: self.quorum_overrides.clone(),
            stoppable: true,
            radio: None,
            log_sink: Some(Arc::new(TracingSink)),
        }
    }

    /// Options for the pinned always-on radios: fed from the radio
    /// directory and impossible to stop by vote.
    pub fn instance_options(&self) -> Result<SessionOptions> {
        let directory = self
            .radio_directory
            .clone()
            .context("RADIO_DIRECTORY is not set")?;

        Ok(SessionOptions {
            stoppable: false,
            radio: Some(Arc::new(DirectoryFallback::new(directory))),
            ..self.session_options()
        })
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary: {}% vol, idle {}, radio dir {}, {} always-on, max {} requests/user, {} quorum overrides, status from {}",
            self.default_volume,
            humantime::format_duration(self.idle_timeout),
            self.radio_directory
                .as_ref()
                .map_or("none".to_string(), |dir| dir.display().to_string()),
            self.always_on.len(),
            self.max_requests_per_user
                .map_or("unlimited".to_string(), |max| max.to_string()),
            self.quorum_overrides.len(),
            self.playing_status_guild
                .map_or("none".to_string(), |guild_id| guild_id.to_string()),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin valor por defecto)
            discord_token: String::new(),

            default_volume: DEFAULT_VOLUME,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,

            radio_directory: None,
            always_on: Vec::new(),

            max_requests_per_user: None,
            quorum_overrides: HashMap::new(),

            playing_status_guild: None,
        }
    }
}

fn parse_id(value: &str, what: &str) -> Result<u64> {
    let id: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid {what} id: {value:?}"))?;
    if id == 0 {
        anyhow::bail!("{what} id cannot be 0");
    }
    Ok(id)
}

/// `guild:channel[,guild:channel...]`
fn parse_always_on(value: &str) -> Result<Vec<AlwaysOnInstance>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<AlwaysOnInstance> {
            let (guild, channel) = entry
                .split_once(':')
                .with_context(|| format!("ALWAYS_ON entry must be guild:channel, got {entry:?}"))?;
            Ok(AlwaysOnInstance {
                guild_id: GuildId::new(parse_id(guild, "guild")?),
                channel_id: ChannelId::new(parse_id(channel, "channel")?),
            })
        })
        .collect()
}

/// `kind=rule[,kind=rule...]`, e.g. `skip=majority,stop=all`
fn parse_quorums(value: &str) -> Result<HashMap<VoteKind, QuorumRule>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<(VoteKind, QuorumRule)> {
            let (kind, rule) = entry
                .split_once('=')
                .with_context(|| format!("VOTE_QUORUMS entry must be kind=rule, got {entry:?}"))?;
            let kind = kind.parse::<VoteKind>().map_err(anyhow::Error::msg)?;
            let rule = rule.parse::<QuorumRule>().map_err(anyhow::Error::msg)?;
            Ok((kind, rule))
        })
        .collect()
}
