//! # Meloetta
//!
//! Per-guild playback orchestration for a Discord music bot.
//!
//! Every guild with an active player gets one [`session::Session`]: a
//! single tokio task that owns the guild's queue (or radio), its vote
//! box and its voice connection, and processes requests, votes,
//! presence changes and backend callbacks strictly in order. Sessions
//! are created, looked up and forgotten through the
//! [`session::registry::SessionRegistry`].
//!
//! The audio side is abstracted behind [`audio::backend::AudioBackend`];
//! [`audio::songbird_backend::SongbirdBackend`] is the production
//! implementation.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod notify;
pub mod session;

#[cfg(test)]
mod testing;
