mod builtin;
mod cli;
mod fetcher;
mod progress;

pub mod api;
pub mod content;
pub mod draft;
pub mod error;
pub mod ledger;
pub mod payout;
pub mod render;
pub mod roles;
pub mod storage;
pub mod store;
pub mod tree;
pub mod vote;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;

use api::ApiClient;
use draft::Draft;
use fetcher::Fetcher;
use ledger::LedgerClient;
use roles::RoleRegistry;
use storage::LocalStore;
use store::{FetchOutcome, ThreadStore};

pub use cli::{
    Args as CliArgs, CheckUrlArgs, Command, DraftCommand, ProgressMode, RenderArgs, UploadArgs,
    VoteArgs, VoteValueArgs,
};

struct Services {
    ledger: LedgerClient,
    api: ApiClient,
    local: LocalStore,
    progress: Arc<progress::Progress>,
}

pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    use std::io::IsTerminal as _;

    let progress_enabled = match args.progress {
        ProgressMode::Always => true,
        ProgressMode::Never => false,
        ProgressMode::Auto => std::io::stderr().is_terminal(),
    };
    let progress = progress::Progress::new(progress_enabled);
    let fetcher = Fetcher::new(&args.user_agent, Some(progress.clone()))?;

    let services = Services {
        ledger: LedgerClient::new(fetcher.clone(), args.ledger_url.clone()),
        api: ApiClient::new(fetcher, args.api_url.clone(), args.api_token.clone()),
        local: LocalStore::new(args.data_dir.clone()),
        progress: progress.clone(),
    };

    let res = match args.command {
        Command::Render(a) => render_thread(&services, a).await,
        Command::Vote(a) => vote_comment(&services, a).await,
        Command::VoteValue(a) => vote_value(&services, a).await,
        Command::CheckUrl(a) => check_url(&services, a).await,
        Command::Upload(a) => upload(&services, a).await,
        Command::Draft(c) => draft_command(&services, c).await,
    };
    progress.finish();
    res
}

async fn render_thread(s: &Services, args: RenderArgs) -> anyhow::Result<()> {
    let roles = match &args.roles {
        Some(path) => RoleRegistry::load(path)?,
        None => RoleRegistry::default(),
    };
    let key = args.path.key();

    s.progress.set_stage("fetching thread");
    let mut threads = ThreadStore::new();
    let ticket = threads.begin_fetch(key.clone());
    let fetched = store::fetch_thread(&s.ledger, &s.api, &args.path).await;
    match threads.finish_fetch(ticket, fetched) {
        Ok(FetchOutcome::Applied) => {}
        Ok(FetchOutcome::Stale) => anyhow::bail!("fetch for {key} was superseded"),
        Err(e) => {
            tracing::error!(post = %key, error = %e, "could not load comments");
            return Err(e.into());
        }
    }
    let thread = threads
        .thread(&key)
        .with_context(|| format!("thread {key} missing after fetch"))?;

    s.progress.set_stage("rendering");
    let viewer = args.viewer.as_deref();
    let opts = render::RenderOptions {
        viewer,
        max_depth: args.max_depth,
        avatar_host: args.avatar_host.as_ref(),
        now: chrono::Utc::now().naive_utc(),
    };
    let comments = render::render_comments(thread, &roles, &opts)?;
    let count = thread.visible_comment_count(&roles, viewer);
    let html = render::build_html(thread, &comments, count);

    let out = args.out.clone().unwrap_or_else(|| {
        PathBuf::from(format!("{}-{}.html", args.path.author, args.path.permlink))
    });
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    std::fs::write(&out, html).with_context(|| format!("write {}", out.display()))?;
    tracing::info!(
        post = %key,
        shown = comments.len(),
        visible = count,
        out = %out.display(),
        "rendered thread"
    );
    Ok(())
}

async fn vote_comment(s: &Services, args: VoteArgs) -> anyhow::Result<()> {
    s.progress.set_stage("voting");
    let tally = s.api.vote(args.comment_id, args.direction).await?;
    println!(
        "score {} ({} up, {} down)",
        tally.score,
        tally.upvotes.len(),
        tally.downvotes.len()
    );
    Ok(())
}

async fn vote_value(s: &Services, args: VoteValueArgs) -> anyhow::Result<()> {
    let percent = match args.percent {
        Some(p) => p,
        None => vote::load_vote_percent(&s.local, args.kind)?,
    };
    if args.save {
        vote::save_vote_percent(&s.local, args.kind, percent)?;
    }

    s.progress.set_stage("loading account and reward fund");
    let account = s.ledger.get_account(&args.account).await?;
    let fund = s.ledger.get_reward_fund().await?;
    let price = s.ledger.get_median_price().await?;
    let props = s.ledger.get_global_properties().await?;

    let now = chrono::Utc::now().naive_utc();
    let preview = vote::VotePreview {
        percent,
        value: payout::voting_value(percent, &account, &fund, price.rate(), now),
        score_increment: match args.kind {
            vote::VoteKind::Post => Some(payout::hunt_score_increment(
                percent,
                args.user_score,
                args.boost_score,
            )),
            vote::VoteKind::Comment => None,
        },
    };
    println!("{preview}");
    tracing::info!(
        account = %account.name,
        voting_power = account.current_voting_power(now),
        power = props.vests_to_power(account.effective_vests()),
        "vote estimate"
    );
    Ok(())
}

async fn check_url(s: &Services, args: CheckUrlArgs) -> anyhow::Result<()> {
    let mut draft = Draft::load(&s.local)?.unwrap_or_default();
    let res = draft.check_url(&s.api, &args.url, args.edit).await;
    draft.save(&s.local)?;
    match res {
        Ok(()) => {
            println!("{} is available", draft.url);
            Ok(())
        }
        Err(issue) => Err(issue.into()),
    }
}

async fn upload(s: &Services, args: UploadArgs) -> anyhow::Result<()> {
    s.progress.set_stage("uploading image");
    let image = s.api.upload_image(&args.file).await.map_err(|e| {
        tracing::error!(file = %args.file.display(), error = %e, "upload failed");
        e
    })?;
    let mut draft = Draft::load(&s.local)?.unwrap_or_default();
    draft.add_image(&image);
    draft.save(&s.local)?;
    println!("{} {}", image.name, draft::cached_image_url(&image.link));
    Ok(())
}

async fn draft_command(s: &Services, cmd: DraftCommand) -> anyhow::Result<()> {
    let mut draft = Draft::load(&s.local)?.unwrap_or_default();
    match cmd {
        DraftCommand::Show { edit } => {
            let draft = match edit {
                Some(path) => Draft::load_for_edit(&s.local, &path.author, &path.permlink)?,
                None => Some(draft),
            };
            println!("{}", serde_json::to_string_pretty(&draft)?);
        }
        DraftCommand::Set { field, value, edit } => {
            if let Some(path) = edit {
                draft = Draft::load_for_edit(&s.local, &path.author, &path.permlink)?
                    .unwrap_or_else(|| Draft {
                        author: path.author.clone(),
                        permlink: path.permlink.clone(),
                        ..Draft::default()
                    });
            }
            draft.set(field, &value);
            draft.save(&s.local)?;
        }
        DraftCommand::Beneficiaries { entries } => {
            let parsed = entries
                .iter()
                .map(|e| parse_beneficiary(e))
                .collect::<anyhow::Result<Vec<_>>>()?;
            draft.set_beneficiaries(&parsed)?;
            draft.save(&s.local)?;
        }
        DraftCommand::RemoveImage { name } => {
            if !draft.remove_image(&name) {
                anyhow::bail!("no image named {name} in the draft");
            }
            draft.save(&s.local)?;
        }
        DraftCommand::Reset => {
            Draft::reset(&s.local)?;
        }
        DraftCommand::Check { edit } => {
            let mut issues = draft.validate();
            if issues.is_empty() {
                let url = draft.url.clone();
                if let Err(issue) = draft.check_url(&s.api, &url, edit).await {
                    issues.push(issue);
                    draft.save(&s.local)?;
                }
            }
            if !issues.is_empty() {
                for issue in &issues {
                    println!("- {issue}");
                }
                anyhow::bail!("draft has {} problem(s)", issues.len());
            }
            println!("draft is ready to publish");
        }
    }
    Ok(())
}

fn parse_beneficiary(entry: &str) -> anyhow::Result<(String, i64)> {
    let (account, percent) = entry
        .rsplit_once(':')
        .with_context(|| format!("expected account:percent, got {entry}"))?;
    let percent = percent
        .trim()
        .parse()
        .with_context(|| format!("invalid percent in {entry}"))?;
    Ok((account.to_string(), percent))
}
