//! # Audio Module
//!
//! Tracks, queues and the audio backend a session drives.
//!
//! ## Architecture
//!
//! ### [`track`] - Track
//! - Immutable request metadata plus the backend handle, set once
//!   resolution succeeds
//!
//! ### [`queue`] - Queue Management
//! - FIFO request queue with front insertion, shuffle and removal
//! - [`queue::Radio`]: a queue that never runs dry, fed by a
//!   [`queue::FallbackSource`] and prefetched in the background
//!
//! ### [`backend`] - Backend Interface
//! - [`backend::AudioBackend`]: connect, resolve, play, pause, volume
//! - Typed callbacks ([`backend::BackendEvent`]) routed per guild
//!
//! ### [`songbird_backend`] - Songbird Driver
//! - Production implementation over songbird and yt-dlp

pub mod backend;
pub mod queue;
pub mod songbird_backend;
pub mod track;
