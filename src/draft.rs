use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, UploadedImage, UrlCheck};
use crate::storage::LocalStore;

pub const DRAFT_KEY: &str = "draft";
pub const PLACEHOLDER_URL: &str = "#";
pub const PLACEHOLDER_TITLE: &str = "Title";
pub const PLACEHOLDER_TAGLINE: &str = "Short Description";

pub const MAX_TAGS: usize = 4;
pub const MAX_TITLE_CHARS: usize = 30;
pub const MAX_TAGLINE_CHARS: usize = 60;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;
/// Upper bound of the summed beneficiary share, in percent.
pub const MAX_BENEFICIARY_PERCENT: u32 = 85;

/// Prefix the image proxy puts in front of uploaded links.
pub const IMAGE_PROXY_PREFIX: &str = "https://steemitimages.com/0x0/";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("space regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftImage {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub account: String,
    /// Basis points.
    pub weight: u32,
}

/// A not-yet-published post, persisted locally between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Draft {
    pub author: String,
    pub permlink: String,
    pub url: String,
    pub title: String,
    pub tagline: String,
    pub description: String,
    pub tags: Vec<String>,
    pub images: Vec<DraftImage>,
    pub beneficiaries: Vec<Beneficiary>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            author: String::new(),
            permlink: String::new(),
            url: PLACEHOLDER_URL.to_string(),
            title: PLACEHOLDER_TITLE.to_string(),
            tagline: PLACEHOLDER_TAGLINE.to_string(),
            description: String::new(),
            tags: Vec::new(),
            images: Vec::new(),
            beneficiaries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DraftField {
    Author,
    Permlink,
    Url,
    Title,
    Tagline,
    Description,
    Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftIssue {
    #[error("Product link cannot be empty")]
    MissingUrl,
    #[error("Name cannot be empty")]
    MissingTitle,
    #[error("Name must be at most 30 characters")]
    TitleTooLong,
    #[error("Short description cannot be empty")]
    MissingTagline,
    #[error("Short description must be at most 60 characters")]
    TaglineTooLong,
    #[error("Description must be at most 1000 characters")]
    DescriptionTooLong,
    #[error("You must upload at least one image")]
    NoImages,
    #[error("Please use only 4 tags")]
    TooManyTags,
    #[error("Beneficiary {account} must get between 1% and 85%, got {percent}%")]
    BeneficiaryOutOfRange { account: String, percent: i64 },
    #[error("Beneficiary weights must add up to between 0% and 85%, got {0}%")]
    BeneficiariesOutOfRange(i64),
    #[error("This product has already been posted: {0}")]
    DuplicateUrl(String),
    #[error("{0}")]
    UrlRejected(String),
    #[error("{0}")]
    UrlCheckUnavailable(String),
}

impl Draft {
    /// Saved draft, if any. A corrupt blob is treated as no draft.
    pub fn load(store: &LocalStore) -> anyhow::Result<Option<Self>> {
        let Some(raw) = store.get_item(DRAFT_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(draft) => Ok(Some(draft)),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable draft");
                Ok(None)
            }
        }
    }

    /// Saved draft only when it belongs to the post being edited.
    pub fn load_for_edit(
        store: &LocalStore,
        author: &str,
        permlink: &str,
    ) -> anyhow::Result<Option<Self>> {
        Ok(Self::load(store)?.filter(|d| d.author == author && d.permlink == permlink))
    }

    pub fn save(&self, store: &LocalStore) -> anyhow::Result<()> {
        let raw = serde_json::to_string(self)?;
        store.set_item(DRAFT_KEY, &raw)
    }

    pub fn reset(store: &LocalStore) -> anyhow::Result<()> {
        store.remove_item(DRAFT_KEY)
    }

    /// Applies a form edit. Free text is sanitized and blank values fall back to the
    /// placeholders.
    pub fn set(&mut self, field: DraftField, value: &str) {
        match field {
            DraftField::Author => self.author = value.trim().to_string(),
            DraftField::Permlink => self.permlink = value.trim().to_string(),
            DraftField::Url => {
                let v = value.trim();
                self.url = if v.is_empty() { PLACEHOLDER_URL } else { v }.to_string();
            }
            DraftField::Title => self.title = or_placeholder(sanitize_text(value, true), PLACEHOLDER_TITLE),
            DraftField::Tagline => {
                self.tagline = or_placeholder(sanitize_text(value, true), PLACEHOLDER_TAGLINE)
            }
            DraftField::Description => self.description = sanitize_text(value, false),
            DraftField::Tags => self.tags = split_tags(value),
        }
    }

    pub fn add_image(&mut self, image: &UploadedImage) {
        self.images.push(DraftImage {
            name: image.name.clone(),
            link: strip_cached_url(&image.link).to_string(),
        });
    }

    pub fn remove_image(&mut self, name: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|i| i.name != name);
        self.images.len() != before
    }

    /// Stores beneficiaries given as `(account, percent)` pairs.
    ///
    /// Nothing is stored unless every entry and the total are in range.
    pub fn set_beneficiaries(&mut self, entries: &[(String, i64)]) -> Result<(), DraftIssue> {
        let mut beneficiaries = Vec::with_capacity(entries.len());
        for (account, percent) in entries {
            let account = account.trim().to_string();
            let weight = beneficiary_weight(&account, *percent)?;
            beneficiaries.push(Beneficiary { account, weight });
        }
        check_beneficiary_sum(percent_sum(&beneficiaries))?;
        self.beneficiaries = beneficiaries;
        Ok(())
    }

    /// Checks the URL against the platform. In edit mode the URL is taken as is.
    ///
    /// Any answer other than "available" resets the URL to the placeholder.
    pub async fn check_url(
        &mut self,
        api: &ApiClient,
        candidate: &str,
        edit_mode: bool,
    ) -> Result<(), DraftIssue> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Ok(());
        }
        if edit_mode {
            self.url = candidate.to_string();
            return Ok(());
        }

        let result = api.check_url(candidate).await;
        if result == Ok(UrlCheck::Available) {
            self.url = candidate.to_string();
            return Ok(());
        }
        self.url = PLACEHOLDER_URL.to_string();
        match result {
            Ok(UrlCheck::Duplicate { url }) => Err(DraftIssue::DuplicateUrl(url)),
            Ok(UrlCheck::Rejected { reason }) => Err(DraftIssue::UrlRejected(reason)),
            Ok(UrlCheck::Available) => Ok(()),
            Err(e) => Err(DraftIssue::UrlCheckUnavailable(e.message().to_string())),
        }
    }

    /// Every local problem that blocks submission.
    pub fn validate(&self) -> Vec<DraftIssue> {
        let mut issues = Vec::new();

        if self.url.trim().is_empty() || self.url == PLACEHOLDER_URL {
            issues.push(DraftIssue::MissingUrl);
        }
        if self.title.trim().is_empty() || self.title == PLACEHOLDER_TITLE {
            issues.push(DraftIssue::MissingTitle);
        } else if self.title.chars().count() > MAX_TITLE_CHARS {
            issues.push(DraftIssue::TitleTooLong);
        }
        if self.tagline.trim().is_empty() || self.tagline == PLACEHOLDER_TAGLINE {
            issues.push(DraftIssue::MissingTagline);
        } else if self.tagline.chars().count() > MAX_TAGLINE_CHARS {
            issues.push(DraftIssue::TaglineTooLong);
        }
        if self.description.chars().count() > MAX_DESCRIPTION_CHARS {
            issues.push(DraftIssue::DescriptionTooLong);
        }
        if self.images.is_empty() {
            issues.push(DraftIssue::NoImages);
        }
        if self.tags.len() > MAX_TAGS {
            issues.push(DraftIssue::TooManyTags);
        }
        for b in &self.beneficiaries {
            let percent = i64::from(b.weight) / 100;
            if let Err(issue) = beneficiary_weight(&b.account, percent) {
                issues.push(issue);
            }
        }
        if let Err(issue) = check_beneficiary_sum(percent_sum(&self.beneficiaries)) {
            issues.push(issue);
        }
        issues
    }
}

fn beneficiary_weight(account: &str, percent: i64) -> Result<u32, DraftIssue> {
    match u32::try_from(percent) {
        Ok(p) if (1..=MAX_BENEFICIARY_PERCENT).contains(&p) => Ok(p * 100),
        _ => Err(DraftIssue::BeneficiaryOutOfRange {
            account: account.to_string(),
            percent,
        }),
    }
}

fn percent_sum(beneficiaries: &[Beneficiary]) -> i64 {
    beneficiaries.iter().map(|b| i64::from(b.weight) / 100).sum()
}

fn check_beneficiary_sum(percent_sum: i64) -> Result<(), DraftIssue> {
    if percent_sum < 0 || percent_sum > i64::from(MAX_BENEFICIARY_PERCENT) {
        Err(DraftIssue::BeneficiariesOutOfRange(percent_sum))
    } else {
        Ok(())
    }
}

fn or_placeholder(value: String, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value
    }
}

/// Drops markup and trims. Single-line text also has its whitespace collapsed.
pub fn sanitize_text(text: &str, single_line: bool) -> String {
    let stripped = TAG_RE.replace_all(text, "");
    if single_line {
        SPACE_RE.replace_all(stripped.trim(), " ").into_owned()
    } else {
        stripped.trim().to_string()
    }
}

/// Space- or comma-separated tags, lowercased, without `#` and duplicates.
pub fn split_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(|c: char| c.is_whitespace() || c == ',') {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

pub fn cached_image_url(link: &str) -> String {
    format!("{IMAGE_PROXY_PREFIX}{}", strip_cached_url(link))
}

pub fn strip_cached_url(link: &str) -> &str {
    link.strip_prefix(IMAGE_PROXY_PREFIX).unwrap_or(link)
}
