use std::fmt;

use crate::content::ContentRecord;
use crate::error::ServiceError;
use crate::payout;
use crate::storage::LocalStore;

pub const DEFAULT_VOTE_PERCENT: u8 = 100;

/// Ledger weight of a vote, in basis points. Zero removes an existing vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteIntent {
    Vote { weight: u16 },
    Unvote,
}

impl VoteIntent {
    pub fn from_weight(weight: u32) -> Result<Self, VoteError> {
        match weight {
            0 => Ok(VoteIntent::Unvote),
            1..=10_000 => Ok(VoteIntent::Vote {
                weight: weight as u16,
            }),
            _ => Err(VoteError::InvalidWeight(weight)),
        }
    }

    pub fn weight(self) -> u16 {
        match self {
            VoteIntent::Vote { weight } => weight,
            VoteIntent::Unvote => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Voted { weight: u16 },
    Unvoted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteError {
    #[error("Please log in to vote.")]
    LoginRequired,

    #[error("Vote weight {0} is out of range (0-10000)")]
    InvalidWeight(u32),

    #[error("There is no vote to remove.")]
    NotVoted,

    #[error("{0}")]
    Failed(#[from] ServiceError),
}

/// Signs and broadcasts votes to the ledger on behalf of the viewer.
///
/// Signing needs the viewer's keys, so the binary has no implementation;
/// embedders supply one and call [`cast_vote`].
#[allow(async_fn_in_trait)]
pub trait VoteBroadcaster {
    async fn broadcast(
        &self,
        voter: &str,
        author: &str,
        permlink: &str,
        weight: u16,
    ) -> Result<(), ServiceError>;
}

/// Casts (or removes, for weight 0) the viewer's vote on `target`.
pub async fn cast_vote<B: VoteBroadcaster>(
    broadcaster: &B,
    viewer: Option<&str>,
    target: &ContentRecord,
    weight: u32,
) -> Result<VoteOutcome, VoteError> {
    let voter = viewer.ok_or(VoteError::LoginRequired)?;
    let intent = VoteIntent::from_weight(weight)?;
    if intent == VoteIntent::Unvote && !target.has_voted(voter) {
        return Err(VoteError::NotVoted);
    }

    broadcaster
        .broadcast(voter, &target.author, &target.permlink, intent.weight())
        .await
        .inspect_err(|e| {
            tracing::warn!(voter, target = %target.key(), error = %e, "vote broadcast failed");
        })?;

    Ok(match intent {
        VoteIntent::Vote { weight } => VoteOutcome::Voted { weight },
        VoteIntent::Unvote => VoteOutcome::Unvoted,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum VoteKind {
    Post,
    Comment,
}

impl VoteKind {
    fn storage_key(self) -> &'static str {
        match self {
            VoteKind::Post => "vote-weight-post",
            VoteKind::Comment => "vote-weight-comment",
        }
    }
}

/// Last slider position for this kind of vote, or 100 when none (or zero) was saved.
pub fn load_vote_percent(store: &LocalStore, kind: VoteKind) -> anyhow::Result<u8> {
    let saved = store
        .get_item(kind.storage_key())?
        .and_then(|s| s.trim().parse::<u8>().ok())
        .filter(|p| (1..=100).contains(p));
    Ok(saved.unwrap_or(DEFAULT_VOTE_PERCENT))
}

pub fn save_vote_percent(store: &LocalStore, kind: VoteKind, percent: u8) -> anyhow::Result<()> {
    store.set_item(kind.storage_key(), &percent.min(100).to_string())
}

/// Text shown beside the vote slider.
#[derive(Debug, Clone, PartialEq)]
pub struct VotePreview {
    pub percent: u8,
    pub value: f64,
    /// Only posts earn platform score.
    pub score_increment: Option<f64>,
}

impl fmt::Display for VotePreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.score_increment {
            Some(score) => write!(
                f,
                "{}% (+{}, {})",
                self.percent,
                payout::format_number(score),
                payout::format_amount(self.value)
            ),
            None => write!(f, "{}% ({})", self.percent, payout::format_amount(self.value)),
        }
    }
}
