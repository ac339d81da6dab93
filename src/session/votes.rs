use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
};
use tracing::debug;

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    Skip,
    Stop,
    Repeat,
    Pause,
    Resume,
    Shuffle,
}

impl VoteKind {
    pub const ALL: [VoteKind; 6] = [
        VoteKind::Skip,
        VoteKind::Stop,
        VoteKind::Repeat,
        VoteKind::Pause,
        VoteKind::Resume,
        VoteKind::Shuffle,
    ];

    /// Votes that only make sense for the track they were cast on.
    pub fn clears_on_track_change(self) -> bool {
        matches!(
            self,
            VoteKind::Skip | VoteKind::Repeat | VoteKind::Pause | VoteKind::Resume
        )
    }

    pub fn default_rule(self) -> QuorumRule {
        match self {
            VoteKind::Stop => QuorumRule::Unanimous,
            _ => QuorumRule::Majority,
        }
    }
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoteKind::Skip => "skip",
            VoteKind::Stop => "stop",
            VoteKind::Repeat => "repeat",
            VoteKind::Pause => "pause",
            VoteKind::Resume => "resume",
            VoteKind::Shuffle => "shuffle",
        };
        f.write_str(name)
    }
}

impl FromStr for VoteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoteKind::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown vote kind: {s}"))
    }
}

/// How many distinct voters a kind needs, given the current listener count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumRule {
    /// `floor(listeners / 2) + 1`
    Majority,
    /// Every current listener.
    Unanimous,
    Fixed(usize),
}

impl QuorumRule {
    pub fn required(self, listeners: usize) -> usize {
        match self {
            QuorumRule::Majority => listeners / 2 + 1,
            QuorumRule::Unanimous => listeners,
            QuorumRule::Fixed(votes) => votes.max(1),
        }
    }
}

impl FromStr for QuorumRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "majority" => Ok(QuorumRule::Majority),
            "unanimous" | "all" => Ok(QuorumRule::Unanimous),
            other => other
                .parse::<usize>()
                .map(QuorumRule::Fixed)
                .map_err(|_| format!("invalid quorum rule: {s}")),
        }
    }
}

/// Result of a recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub kind: VoteKind,
    pub votes: usize,
    pub required: usize,
    pub passed: bool,
}

impl VoteTally {
    /// Tally for an action approved without any vote (override, empty room).
    pub fn approved(kind: VoteKind) -> Self {
        Self {
            kind,
            votes: 0,
            required: 0,
            passed: true,
        }
    }

    pub fn remaining(&self) -> usize {
        self.required.saturating_sub(self.votes)
    }
}

/// Per-kind voter sets. Quorum policy is looked up per kind, so the
/// set bookkeeping is shared by every control.
#[derive(Debug, Default)]
pub struct VoteBox {
    votes: HashMap<VoteKind, HashSet<UserId>>,
    rules: HashMap<VoteKind, QuorumRule>,
}

impl VoteBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: HashMap<VoteKind, QuorumRule>) -> Self {
        Self {
            votes: HashMap::new(),
            rules,
        }
    }

    pub fn rule(&self, kind: VoteKind) -> QuorumRule {
        self.rules
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_rule())
    }

    /// Records `voter` for `kind` and evaluates quorum against the
    /// listener count the caller sees right now.
    pub fn record_vote(
        &mut self,
        kind: VoteKind,
        voter: UserId,
        listeners: usize,
    ) -> Result<VoteTally, SessionError> {
        let voters = self.votes.entry(kind).or_default();
        if !voters.insert(voter) {
            return Err(SessionError::AlreadyVoted(kind));
        }

        let votes = voters.len();
        let required = self.rule(kind).required(listeners);
        debug!("🗳️ Voto {} de {}: {}/{}", kind, voter, votes, required);

        Ok(VoteTally {
            kind,
            votes,
            required,
            passed: votes >= required,
        })
    }

    pub fn votes(&self, kind: VoteKind) -> usize {
        self.votes.get(&kind).map_or(0, HashSet::len)
    }

    pub fn has_voted(&self, kind: VoteKind, voter: UserId) -> bool {
        self.votes
            .get(&kind)
            .is_some_and(|voters| voters.contains(&voter))
    }

    pub fn clear(&mut self, kind: VoteKind) {
        if let Some(voters) = self.votes.get_mut(&kind) {
            voters.clear();
        }
    }

    /// Once per track transition. Stop and Shuffle survive.
    pub fn clear_on_track_change(&mut self) {
        for kind in VoteKind::ALL.into_iter().filter(|k| k.clears_on_track_change()) {
            self.clear(kind);
        }
    }

    pub fn clear_all(&mut self) {
        self.votes.clear();
    }

    /// Drops the votes of anyone who stopped listening.
    pub fn retain_listeners(&mut self, listeners: &HashSet<UserId>) {
        for voters in self.votes.values_mut() {
            voters.retain(|voter| listeners.contains(voter));
        }
    }
}
