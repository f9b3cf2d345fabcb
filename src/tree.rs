use std::collections::BTreeMap;

use crate::content::{ContentKey, ContentMap, ContentRecord};
use crate::error::FetchError;
use crate::roles::{self, RoleResolver};

/// Parent key → direct child keys, grouped in mapping order.
#[derive(Debug, Clone, Default)]
pub struct ThreadIndex {
    children: BTreeMap<ContentKey, Vec<ContentKey>>,
}

impl ThreadIndex {
    pub fn build(post_key: &ContentKey, content: &ContentMap) -> Self {
        let mut children: BTreeMap<ContentKey, Vec<ContentKey>> = BTreeMap::new();
        for (key, record) in content {
            if key == post_key {
                continue;
            }
            if !record.is_found() {
                tracing::warn!(%key, "skipping content record missing from the ledger");
                continue;
            }
            let Some(parent) = record.parent_key() else {
                tracing::debug!(%key, "skipping unrelated top-level post");
                continue;
            };
            if !content.contains_key(&parent) {
                tracing::debug!(%key, %parent, "comment parent not in fetched state");
            }
            children.entry(parent).or_default().push(key.clone());
        }
        Self { children }
    }

    pub fn children(&self, key: &ContentKey) -> &[ContentKey] {
        self.children.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn lists_mut(&mut self) -> impl Iterator<Item = &mut Vec<ContentKey>> {
        self.children.values_mut()
    }
}

/// Orders keys by score, highest first. Equal scores keep their relative order.
pub fn sort_by_score(keys: &mut [ContentKey], content: &ContentMap) {
    let score = |k: &ContentKey| content.get(k).map(|r| r.score).unwrap_or(0.0);
    keys.sort_by(|a, b| score(b).total_cmp(&score(a)));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit<'a> {
    pub key: &'a ContentKey,
    /// 1 for root comments.
    pub depth: usize,
}

/// A post and its comments as fetched in one ledger state read.
#[derive(Debug, Clone)]
pub struct Thread {
    post_key: ContentKey,
    content: ContentMap,
    index: ThreadIndex,
}

impl Thread {
    /// Groups and sorts the fetched content. Fails when the post itself is absent or
    /// reported with id 0.
    pub fn assemble(post_key: ContentKey, content: ContentMap) -> Result<Self, FetchError> {
        match content.get(&post_key) {
            Some(post) if post.is_found() => {}
            _ => return Err(FetchError::NotFound(post_key)),
        }

        let mut index = ThreadIndex::build(&post_key, &content);
        for list in index.lists_mut() {
            sort_by_score(list, &content);
        }

        Ok(Self {
            post_key,
            content,
            index,
        })
    }

    pub fn post_key(&self) -> &ContentKey {
        &self.post_key
    }

    pub fn post(&self) -> &ContentRecord {
        // Presence is checked in `assemble` and records are never removed.
        &self.content[&self.post_key]
    }

    pub fn record(&self, key: &ContentKey) -> Option<&ContentRecord> {
        self.content.get(key)
    }

    pub fn content(&self) -> &ContentMap {
        &self.content
    }

    pub fn roots(&self) -> &[ContentKey] {
        self.index.children(&self.post_key)
    }

    pub fn children(&self, key: &ContentKey) -> &[ContentKey] {
        self.index.children(key)
    }

    /// Replaces the score of one record in place. Order is left untouched so a vote
    /// does not make comments jump around.
    pub fn set_score(&mut self, key: &ContentKey, score: f64) -> bool {
        match self.content.get_mut(key) {
            Some(record) => {
                record.score = score;
                true
            }
            None => false,
        }
    }

    /// Pre-order walk over the comments, roots first, without recursion.
    ///
    /// A comment rejected by `keep` hides its whole subtree. Comments deeper than
    /// `max_depth` are not visited.
    pub fn walk<F>(&self, max_depth: usize, keep: F) -> Vec<Visit<'_>>
    where
        F: Fn(&ContentRecord) -> bool,
    {
        let mut out = Vec::new();
        let mut stack: Vec<(&ContentKey, usize)> =
            self.roots().iter().rev().map(|k| (k, 1)).collect();

        while let Some((key, depth)) = stack.pop() {
            if depth > max_depth {
                continue;
            }
            let Some(record) = self.content.get(key) else {
                continue;
            };
            if !keep(record) {
                continue;
            }
            out.push(Visit { key, depth });
            stack.extend(self.children(key).iter().rev().map(|k| (k, depth + 1)));
        }
        out
    }

    /// Comments `viewer` can see, following the moderator visibility rule.
    pub fn visible_walk<'a, R: RoleResolver + ?Sized>(
        &'a self,
        max_depth: usize,
        roles: &R,
        viewer: Option<&str>,
    ) -> Vec<Visit<'a>> {
        let post_author = self.post().author.as_str();
        self.walk(max_depth, |c| {
            roles::visible(roles, &c.author, post_author, viewer)
        })
    }

    /// Number of comments shown to `viewer`; replaces the server-side reply count, which
    /// also counts hidden moderator comments.
    pub fn visible_comment_count<R: RoleResolver + ?Sized>(
        &self,
        roles: &R,
        viewer: Option<&str>,
    ) -> usize {
        self.visible_walk(usize::MAX, roles, viewer).len()
    }
}
