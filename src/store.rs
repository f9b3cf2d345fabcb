use std::collections::{BTreeMap, HashMap};

use crate::api::ApiClient;
use crate::content::ContentKey;
use crate::error::FetchError;
use crate::ledger::{LedgerClient, PostPath};
use crate::tree::Thread;

/// Reads the post's full state from the ledger, attaches ranking scores and assembles
/// the comment tree.
pub async fn fetch_thread(
    ledger: &LedgerClient,
    api: &ApiClient,
    path: &PostPath,
) -> Result<Thread, FetchError> {
    let post_key = path.key();
    let mut state = ledger.get_state(path).await?;

    match state.content.get(&post_key) {
        Some(post) if post.is_found() => {}
        _ => return Err(FetchError::NotFound(post_key)),
    }

    let active_voters: BTreeMap<String, Vec<String>> = state
        .content
        .values()
        .map(|record| (record.id.to_string(), record.voters()))
        .collect();
    let score_table = api.scores(&active_voters).await?;

    for record in state.content.values_mut() {
        record.score = score_table
            .get(&record.id.to_string())
            .copied()
            .unwrap_or(0.0);
    }

    tracing::info!(
        post = %post_key,
        records = state.content.len(),
        scored = score_table.len(),
        "fetched thread state"
    );
    Thread::assemble(post_key, state.content)
}

/// Identifies one in-flight fetch; only the latest ticket for a post may land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: ContentKey,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// A newer fetch started or the post was released; the response was dropped.
    Stale,
}

#[derive(Debug, Default)]
struct Entry {
    generation: u64,
    loading: bool,
    thread: Option<Thread>,
}

/// Fetched threads by post key. All mutation goes through the methods below.
#[derive(Debug, Default)]
pub struct ThreadStore {
    entries: HashMap<ContentKey, Entry>,
    next_generation: u64,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_fetch(&mut self, key: ContentKey) -> FetchTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        let entry = self.entries.entry(key.clone()).or_default();
        entry.generation = generation;
        entry.loading = true;
        FetchTicket { key, generation }
    }

    /// Lands a fetch result. The previous thread survives a failed refresh.
    pub fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Thread, FetchError>,
    ) -> Result<FetchOutcome, FetchError> {
        let Some(entry) = self
            .entries
            .get_mut(&ticket.key)
            .filter(|e| e.generation == ticket.generation)
        else {
            tracing::debug!(post = %ticket.key, "dropping stale fetch result");
            return Ok(FetchOutcome::Stale);
        };

        entry.loading = false;
        let thread = result?;
        entry.thread = Some(thread);
        Ok(FetchOutcome::Applied)
    }

    /// Forgets a post; fetches still in flight for it will be dropped when they land.
    pub fn release(&mut self, key: &ContentKey) {
        self.entries.remove(key);
    }

    pub fn thread(&self, key: &ContentKey) -> Option<&Thread> {
        self.entries.get(key).and_then(|e| e.thread.as_ref())
    }

    pub fn is_loading(&self, key: &ContentKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.loading)
    }

    /// Applies a new ranking score to one comment of a loaded thread.
    ///
    /// For long-lived embedders that keep threads open across votes; the
    /// comment keeps its position.
    pub fn apply_vote_score(&mut self, post: &ContentKey, comment: &ContentKey, score: f64) -> bool {
        self.entries
            .get_mut(post)
            .and_then(|e| e.thread.as_mut())
            .is_some_and(|t| t.set_score(comment, score))
    }
}
