use std::collections::HashSet;
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

/// Read-only lookup of platform roles by username.
pub trait RoleResolver {
    fn is_admin(&self, username: &str) -> bool;
    fn is_moderator(&self, username: &str) -> bool;
    fn is_influencer(&self, username: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Team,
    Moderator,
    Influencer,
}

impl Badge {
    pub fn label(self) -> &'static str {
        match self {
            Badge::Team => "TEAM",
            Badge::Moderator => "MODERATOR",
            Badge::Influencer => "INFLUENCER",
        }
    }

    pub fn class(self) -> &'static str {
        match self {
            Badge::Team => "team",
            Badge::Moderator => "moderator",
            Badge::Influencer => "influencer",
        }
    }
}

/// Role registry loaded from `{"admins": [..], "moderators": [..], "influencers": [..]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleRegistry {
    #[serde(default)]
    admins: HashSet<String>,
    #[serde(default)]
    moderators: HashSet<String>,
    #[serde(default)]
    influencers: HashSet<String>,
}

impl RoleRegistry {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
    }

    pub fn with_admin(mut self, username: &str) -> Self {
        self.admins.insert(username.to_string());
        self
    }

    pub fn with_moderator(mut self, username: &str) -> Self {
        self.moderators.insert(username.to_string());
        self
    }

    pub fn with_influencer(mut self, username: &str) -> Self {
        self.influencers.insert(username.to_string());
        self
    }
}

impl RoleResolver for RoleRegistry {
    fn is_admin(&self, username: &str) -> bool {
        self.admins.contains(username)
    }

    fn is_moderator(&self, username: &str) -> bool {
        self.moderators.contains(username)
    }

    fn is_influencer(&self, username: &str) -> bool {
        self.influencers.contains(username)
    }
}

/// Badge shown next to an author; admin outranks moderator outranks influencer.
pub fn badge<R: RoleResolver + ?Sized>(roles: &R, username: &str) -> Option<Badge> {
    if roles.is_admin(username) {
        Some(Badge::Team)
    } else if roles.is_moderator(username) {
        Some(Badge::Moderator)
    } else if roles.is_influencer(username) {
        Some(Badge::Influencer)
    } else {
        None
    }
}

/// Whether `viewer` may see a comment written by `comment_author` under a post by `post_author`.
///
/// Moderator comments are only shown to their author, the post author, and staff.
pub fn visible<R: RoleResolver + ?Sized>(
    roles: &R,
    comment_author: &str,
    post_author: &str,
    viewer: Option<&str>,
) -> bool {
    if !roles.is_moderator(comment_author) {
        return true;
    }
    match viewer {
        Some(v) => {
            v == comment_author || v == post_author || roles.is_moderator(v) || roles.is_admin(v)
        }
        None => false,
    }
}

/// Flagged comments are downvoted or written by low-reputation authors. Moderators are never flagged.
pub fn flagged<R: RoleResolver + ?Sized>(
    roles: &R,
    author: &str,
    net_rshares: i64,
    author_reputation: i64,
) -> bool {
    !roles.is_moderator(author) && (net_rshares < 0 || author_reputation < 0)
}
