use anyhow::Context as _;
use chrono::{Duration, NaiveDateTime};
use kuchiki::traits::TendrilSink as _;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use url::Url;

use crate::builtin;
use crate::content::{ContentKey, ContentRecord};
use crate::payout;
use crate::roles::{self, Badge, RoleResolver};
use crate::tree::Thread;

/// Comments stay editable until the ledger pays them out.
const EDIT_WINDOW_DAYS: i64 = 7;

pub struct RenderOptions<'a> {
    pub viewer: Option<&'a str>,
    pub max_depth: usize,
    /// Avatar service; avatars are omitted when unset.
    pub avatar_host: Option<&'a Url>,
    pub now: NaiveDateTime,
}

pub struct RenderedComment {
    pub key: ContentKey,
    pub author: String,
    pub badge: Option<Badge>,
    pub depth: usize,
    pub created: Option<String>,
    pub time_ago: String,
    pub avatar_src: Option<String>,
    pub body_html: String,
    pub flagged: bool,
    pub editable: bool,
    pub payout: String,
    pub votes: usize,
}

pub fn render_comments<R: RoleResolver + ?Sized>(
    thread: &Thread,
    roles: &R,
    opts: &RenderOptions<'_>,
) -> anyhow::Result<Vec<RenderedComment>> {
    let visits = thread.visible_walk(opts.max_depth, roles, opts.viewer);
    let mut rendered = Vec::with_capacity(visits.len());
    for visit in visits {
        let Some(c) = thread.record(visit.key) else {
            continue;
        };
        let body_html =
            clean_body(&c.body).with_context(|| format!("clean body of {}", visit.key))?;
        rendered.push(RenderedComment {
            key: visit.key.clone(),
            author: c.author.clone(),
            badge: roles::badge(roles, &c.author),
            depth: visit.depth,
            created: c.created.map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            time_ago: c.created.map(|t| time_ago(t, opts.now)).unwrap_or_default(),
            avatar_src: opts.avatar_host.and_then(|host| avatar_url(host, &c.author)),
            body_html,
            flagged: roles::flagged(roles, &c.author, c.net_rshares, c.author_reputation),
            editable: opts.viewer == Some(c.author.as_str()) && is_editable(c, opts.now),
            payout: payout::format_amount(payout::content_payout(c)),
            votes: c.active_votes.len(),
        });
    }
    Ok(rendered)
}

pub fn is_editable(record: &ContentRecord, now: NaiveDateTime) -> bool {
    record
        .created
        .is_some_and(|created| now < created + Duration::days(EDIT_WINDOW_DAYS))
}

pub fn time_ago(then: NaiveDateTime, now: NaiveDateTime) -> String {
    let secs = (now - then).num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }
    let (n, unit) = match secs {
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 30 * 86_400 => (s / 86_400, "day"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

fn avatar_url(host: &Url, author: &str) -> Option<String> {
    let mut url = host.join(&format!("@{author}")).ok()?;
    url.query_pairs_mut().append_pair("s", "64");
    Some(url.to_string())
}

/// Turns a post body into safe HTML: blank-line separated paragraphs, no scripts,
/// styles or event handlers, embeds replaced by plain links.
pub fn clean_body(body: &str) -> anyhow::Result<String> {
    let wrapped: String = body
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{p}</p>"))
        .collect();
    let document = kuchiki::parse_html().one(wrapped);

    for selector in ["script", "style", "object", "embed"] {
        if let Ok(nodes) = document.select(selector) {
            for node in nodes.collect::<Vec<_>>() {
                node.as_node().detach();
            }
        }
    }

    for selector in ["iframe", "audio", "video"] {
        if let Ok(nodes) = document.select(selector) {
            for node in nodes.collect::<Vec<_>>() {
                let href = node
                    .attributes
                    .borrow()
                    .get("src")
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                node.as_node().insert_before(make_link_node(&href));
                node.as_node().detach();
            }
        }
    }

    if let Ok(nodes) = document.select("*") {
        for node in nodes {
            let mut attrs = node.attributes.borrow_mut();
            let handlers: Vec<_> = attrs
                .map
                .keys()
                .filter(|name| name.local.starts_with("on"))
                .cloned()
                .collect();
            for name in handlers {
                attrs.map.remove(&name);
            }
            for attr in ["href", "src"] {
                let unsafe_url = attrs
                    .get(attr)
                    .is_some_and(|v| v.trim().to_ascii_lowercase().starts_with("javascript:"));
                if unsafe_url {
                    attrs.remove(attr);
                }
            }
        }
    }

    let body = document
        .select_first("body")
        .ok()
        .map(|n| n.as_node().clone());

    let mut out = Vec::new();
    if let Some(body) = body {
        for child in body.children() {
            child.serialize(&mut out).context("serialize body child")?;
        }
    }
    String::from_utf8(out).context("body html not utf-8")
}

fn make_link_node(href: &str) -> kuchiki::NodeRef {
    let safe = href.trim();
    let display = if safe.is_empty() { "link" } else { safe };
    let markup = html! {
        a href=(safe) rel="noreferrer noopener" { (display) }
    };
    let doc = kuchiki::parse_html().one(markup.into_string());
    match doc.select_first("a") {
        Ok(a) => a.as_node().clone(),
        Err(()) => kuchiki::NodeRef::new_text(display),
    }
}

pub fn build_html(thread: &Thread, comments: &[RenderedComment], comment_count: usize) -> String {
    let post = thread.post();
    let title = if post.title.is_empty() {
        thread.post_key().as_str()
    } else {
        post.title.as_str()
    };

    let markup: Markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                meta name="color-scheme" content="light dark";
                title { (title) }
                style { (PreEscaped(builtin::BUILTIN_CSS)) }
            }
            body {
                div class="ht-wrap" {
                    header class="ht-header" {
                        h1 class="ht-title" { (title) }
                        div class="ht-meta" {
                            span class="ht-author" { "@" (post.author) }
                            span class="separator" { "·" }
                            span class="ht-payout" { (payout::format_amount(payout::content_payout(post))) }
                        }
                    }
                    section class="ht-comments" {
                        h2 class="ht-comment-count" { (comment_count) " comments" }
                        @for c in comments {
                            (render_comment(c))
                        }
                    }
                }
            }
        }
    };
    markup.into_string()
}

fn render_comment(c: &RenderedComment) -> Markup {
    let class = if c.flagged { "comment flagged" } else { "comment" };
    let style = format!("--depth: {}", c.depth.saturating_sub(1));

    html! {
        article class=(class) data-key=(c.key.as_str()) data-depth=(c.depth) style=(style) {
            header class="comment-title" {
                @if let Some(src) = &c.avatar_src {
                    img class="avatar" width="32" height="32" src=(src) alt="avatar";
                }
                span class="author" { "@" (c.author) }
                @if let Some(badge) = c.badge {
                    span class=(format!("badge {}", badge.class())) { (badge.label()) }
                }
                @if let Some(created) = &c.created {
                    span class="separator" { "·" }
                    time class="date" datetime=(created) { (c.time_ago) }
                }
            }
            div class="comment-body" {
                (PreEscaped(&c.body_html))
            }
            footer class="actions" {
                span class="payout" { (c.payout) }
                span class="separator" { "|" }
                span class="votes" { (c.votes) " votes" }
                @if c.editable {
                    span class="separator" { "|" }
                    span class="edit" { "editable" }
                }
            }
        }
    }
}
