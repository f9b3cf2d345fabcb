use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::api::VoteDirection;
use crate::draft::DraftField;
use crate::ledger::PostPath;
use crate::vote::VoteKind;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProgressMode {
    /// Enable progress UI when stderr is a TTY.
    Auto,
    /// Always enable progress UI (even when piped).
    Always,
    /// Never show progress UI.
    Never,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// JSON-RPC endpoint of a ledger node.
    #[arg(long, global = true, env = "HUNT_LEDGER_URL", default_value = "https://api.steemit.com")]
    pub ledger_url: Url,

    /// Root of the platform API (scores, votes, URL checks, uploads).
    #[arg(long, global = true, env = "HUNT_API_URL", default_value = "https://api.steemhunt.com")]
    pub api_url: Url,

    /// Bearer token sent to the platform API.
    #[arg(long, global = true, env = "HUNT_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Directory holding the local draft and vote preferences.
    #[arg(long, global = true, env = "HUNT_DATA_DIR", default_value = ".hunt-thread")]
    pub data_dir: PathBuf,

    /// HTTP User-Agent.
    #[arg(long, global = true, default_value = "hunt-thread/0.1")]
    pub user_agent: String,

    /// Progress display: `auto`, `always`, or `never`.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub progress: ProgressMode,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a post's comments and render the thread the viewer would see.
    Render(RenderArgs),
    /// Up- or downvote a comment's platform score.
    Vote(VoteArgs),
    /// Estimate what a vote from an account is worth.
    VoteValue(VoteValueArgs),
    /// Check that a product URL has not been submitted yet and store it in the draft.
    CheckUrl(CheckUrlArgs),
    /// Upload an image and attach it to the draft.
    Upload(UploadArgs),
    /// Inspect or edit the local draft.
    #[command(subcommand)]
    Draft(DraftCommand),
}

#[derive(Debug, ClapArgs)]
pub struct RenderArgs {
    /// Post location, `/category/@author/permlink`.
    pub path: PostPath,

    /// Username of the viewer; anonymous when omitted.
    #[arg(long)]
    pub viewer: Option<String>,

    /// Role registry JSON (`admins`, `moderators`, `influencers` lists).
    #[arg(long)]
    pub roles: Option<PathBuf>,

    /// Output HTML file. Defaults to `<author>-<permlink>.html`.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Deepest reply level to render.
    #[arg(long, default_value_t = 8)]
    pub max_depth: usize,

    /// Avatar service base URL; avatars are left out when omitted.
    #[arg(long)]
    pub avatar_host: Option<Url>,
}

#[derive(Debug, ClapArgs)]
pub struct VoteArgs {
    /// Numeric content id of the comment.
    pub comment_id: u64,

    #[arg(long, value_enum, default_value = "up")]
    pub direction: VoteDirection,
}

#[derive(Debug, ClapArgs)]
pub struct VoteValueArgs {
    /// Ledger account casting the vote.
    pub account: String,

    /// Vote weight in percent. Defaults to the last saved weight for this kind.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub percent: Option<u8>,

    #[arg(long, value_enum, default_value = "comment")]
    pub kind: VoteKind,

    /// Platform user score (posts only).
    #[arg(long, default_value_t = 0.0)]
    pub user_score: f64,

    /// Platform boost multiplier (posts only).
    #[arg(long, default_value_t = 1.0)]
    pub boost_score: f64,

    /// Remember `--percent` as the default weight for this kind.
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, ClapArgs)]
pub struct CheckUrlArgs {
    pub url: String,

    /// Editing an existing post: skip the duplicate check.
    #[arg(long)]
    pub edit: bool,
}

#[derive(Debug, ClapArgs)]
pub struct UploadArgs {
    pub file: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum DraftCommand {
    /// Print the draft as JSON.
    Show {
        /// Only show the draft if it belongs to this post, `/category/@author/permlink`.
        #[arg(long)]
        edit: Option<PostPath>,
    },
    /// Set one field.
    Set {
        field: DraftField,
        value: String,
        /// Edit the draft of this post, starting fresh if the saved draft is for another one.
        #[arg(long)]
        edit: Option<PostPath>,
    },
    /// Replace beneficiaries with `account:percent` entries.
    Beneficiaries { entries: Vec<String> },
    /// Remove an attached image by name.
    RemoveImage { name: String },
    /// Discard the draft.
    Reset,
    /// Validate the draft for submission, including the URL check.
    Check {
        #[arg(long)]
        edit: bool,
    },
}
