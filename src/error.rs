use thiserror::Error;

use crate::{audio::backend::BackendError, session::votes::VoteKind};

/// Rejections a session hands back to the command layer.
///
/// None of these change the session's internal state; they are the
/// user-visible "no" answers.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("you have already voted to {0}")]
    AlreadyVoted(VoteKind),
    #[error("you are not listening to the player")]
    NotListening,
    #[error("this player session cannot be stopped")]
    NotStoppable,
    #[error("you already have too many requests in the queue (max {0})")]
    TooManyRequests(usize),
    #[error("there is no request at position {0}")]
    NoSuchRequest(usize),
    #[error("the player session has already ended")]
    Terminated,
    #[error(transparent)]
    Backend(#[from] BackendError),
}
