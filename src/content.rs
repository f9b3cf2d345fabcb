use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// `author/permlink` identifier of a post or comment on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn new(author: &str, permlink: &str) -> Self {
        Self(format!("{author}/{permlink}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn author(&self) -> &str {
        self.0.split_once('/').map(|(a, _)| a).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Flat content mapping as returned by one ledger state fetch.
pub type ContentMap = BTreeMap<ContentKey, ContentRecord>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveVote {
    pub voter: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub percent: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub rshares: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: u64,
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub parent_author: String,
    #[serde(default)]
    pub parent_permlink: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created: Option<NaiveDateTime>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub net_rshares: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub author_reputation: i64,
    #[serde(default)]
    pub pending_payout_value: String,
    #[serde(default)]
    pub total_payout_value: String,
    #[serde(default)]
    pub curator_payout_value: String,
    #[serde(default)]
    pub active_votes: Vec<ActiveVote>,
    /// Ranking value from the scoring service; not part of the ledger payload.
    #[serde(default)]
    pub score: f64,
}

impl ContentRecord {
    pub fn key(&self) -> ContentKey {
        ContentKey::new(&self.author, &self.permlink)
    }

    /// Key of the record this one replies to. Top-level posts have no parent author.
    pub fn parent_key(&self) -> Option<ContentKey> {
        if self.parent_author.is_empty() {
            None
        } else {
            Some(ContentKey::new(&self.parent_author, &self.parent_permlink))
        }
    }

    pub fn is_found(&self) -> bool {
        self.id != 0
    }

    pub fn voters(&self) -> Vec<String> {
        self.active_votes.iter().map(|v| v.voter.clone()).collect()
    }

    /// Whether `username` holds a live (non-zero) vote on this record.
    pub fn has_voted(&self, username: &str) -> bool {
        self.active_votes
            .iter()
            .any(|v| v.voter == username && v.percent > 0)
    }
}

/// The ledger encodes large integers as strings and small ones as numbers.
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(i64),
        Float(f64),
        Str(String),
    }

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Float(f) => Ok(f as i64),
        NumOrStr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ledger_record_with_string_integers() {
        let raw = r#"{
            "id": 42,
            "author": "bob",
            "permlink": "re-alice-post",
            "parent_author": "alice",
            "parent_permlink": "post",
            "created": "2018-03-01T10:00:00",
            "net_rshares": "-123456789012",
            "author_reputation": 5500,
            "active_votes": [{"voter": "carol", "percent": "10000", "rshares": 12}]
        }"#;
        let record: ContentRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.net_rshares, -123_456_789_012);
        assert_eq!(record.author_reputation, 5500);
        assert_eq!(record.key().as_str(), "bob/re-alice-post");
        assert_eq!(record.parent_key(), Some(ContentKey::from("alice/post")));
        assert!(record.has_voted("carol"));
        assert!(!record.has_voted("dave"));
    }

    #[test]
    fn top_level_post_has_no_parent() {
        let raw = r#"{"id": 1, "author": "alice", "permlink": "post", "parent_permlink": "hunt"}"#;
        let record: ContentRecord = serde_json::from_str(raw).unwrap();
        assert!(record.parent_key().is_none());
        assert_eq!(record.score, 0.0);
    }
}
