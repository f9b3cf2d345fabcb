use std::path::Path;

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use kuchiki::traits::TendrilSink as _;
use serde_json::json;
use tempfile::tempdir;
use url::Url;

use hunt_thread::api::VoteDirection;
use hunt_thread::draft::{Draft, DraftField, PLACEHOLDER_URL};
use hunt_thread::ledger::PostPath;
use hunt_thread::storage::LocalStore;
use hunt_thread::vote::VoteKind;
use hunt_thread::{
    CheckUrlArgs, CliArgs, Command, DraftCommand, ProgressMode, RenderArgs, UploadArgs, VoteArgs,
    VoteValueArgs,
};

fn args(server: &MockServer, data_dir: &Path, command: Command) -> CliArgs {
    CliArgs {
        ledger_url: Url::parse(&server.url("/rpc")).unwrap(),
        api_url: Url::parse(&server.url("/api")).unwrap(),
        api_token: Some("secret".to_string()),
        data_dir: data_dir.to_path_buf(),
        user_agent: "test-agent".to_string(),
        progress: ProgressMode::Never,
        command,
    }
}

fn render_command(out: &Path, viewer: Option<&str>, roles: Option<&Path>) -> Command {
    Command::Render(RenderArgs {
        path: "/hunt/@alice/widget".parse().unwrap(),
        viewer: viewer.map(str::to_string),
        roles: roles.map(Path::to_path_buf),
        out: Some(out.to_path_buf()),
        max_depth: 8,
        avatar_host: None,
    })
}

fn state_with_post_id(post_id: u64) -> serde_json::Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "content": {
                "alice/widget": {
                    "id": post_id, "author": "alice", "permlink": "widget",
                    "parent_author": "", "parent_permlink": "hunt", "category": "hunt",
                    "title": "Widget", "body": "A widget.", "created": "2018-03-01T10:00:00",
                    "net_rshares": 0, "author_reputation": "4000000000",
                    "pending_payout_value": "1.500 SBD", "total_payout_value": "0.000 SBD",
                    "curator_payout_value": "0.000 SBD",
                    "active_votes": [{"voter": "u2", "percent": 10000, "rshares": "100"}]
                },
                "mod1/re-widget": {
                    "id": 11, "author": "mod1", "permlink": "re-widget",
                    "parent_author": "alice", "parent_permlink": "widget",
                    "body": "Moderator note", "created": "2018-03-01T11:00:00",
                    "net_rshares": 0, "author_reputation": 0, "active_votes": []
                },
                "u2/re-widget": {
                    "id": 12, "author": "u2", "permlink": "re-widget",
                    "parent_author": "alice", "parent_permlink": "widget",
                    "body": "Nice <script>alert(1)</script>", "created": "2018-03-01T12:00:00",
                    "net_rshares": 0, "author_reputation": 0, "active_votes": []
                },
                "u3/re-widget": {
                    "id": 13, "author": "u3", "permlink": "re-widget",
                    "parent_author": "alice", "parent_permlink": "widget",
                    "body": "Spam", "created": "2018-03-01T12:30:00",
                    "net_rshares": "-5000", "author_reputation": 0,
                    "active_votes": [{"voter": "x", "percent": -10000, "rshares": -5000}]
                },
                "u4/re-u2": {
                    "id": 14, "author": "u4", "permlink": "re-u2",
                    "parent_author": "u2", "parent_permlink": "re-widget",
                    "body": "Agreed", "created": "2018-03-01T13:00:00",
                    "net_rshares": 0, "author_reputation": 0, "active_votes": []
                }
            }
        }
    })
}

fn mock_thread(server: &MockServer, post_id: u64) {
    server.mock(|when, then| {
        when.method(POST)
            .path("/rpc")
            .body_contains("condenser_api.get_state")
            .body_contains("/hunt/@alice/widget");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(state_with_post_id(post_id));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/comments/scores.json")
            .header("authorization", "Bearer secret")
            .body_contains("active_voters");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({ "score_table": { "11": 20.0, "12": 5.0, "13": 9.0 } }));
    });
}

fn write_roles(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("roles.json");
    std::fs::write(&path, r#"{"moderators": ["mod1"], "influencers": ["u2"]}"#).unwrap();
    path
}

fn rendered_keys(html: &str) -> Vec<(String, String)> {
    let doc = kuchiki::parse_html().one(html);
    doc.select("article.comment")
        .unwrap()
        .map(|node| {
            let attrs = node.attributes.borrow();
            (
                attrs.get("data-key").unwrap_or_default().to_string(),
                attrs.get("data-depth").unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[tokio::test]
async fn renders_thread_for_ordinary_viewer() {
    let server = MockServer::start();
    mock_thread(&server, 1);
    let tmp = tempdir().unwrap();
    let roles = write_roles(tmp.path());
    let out = tmp.path().join("out/thread.html");

    hunt_thread::run(args(&server, tmp.path(), render_command(&out, Some("u2"), Some(&roles))))
        .await
        .unwrap();

    let html = std::fs::read_to_string(&out).unwrap();
    assert_eq!(
        rendered_keys(&html),
        vec![
            ("u3/re-widget".to_string(), "1".to_string()),
            ("u2/re-widget".to_string(), "1".to_string()),
            ("u4/re-u2".to_string(), "2".to_string()),
        ]
    );
    assert!(html.contains("3 comments"));
    assert!(html.contains("class=\"comment flagged\""));
    assert!(html.contains("INFLUENCER"));
    assert!(!html.contains("Moderator note"));
    assert!(!html.contains("<script>alert"));
    assert!(html.contains("$1.50"));
}

#[tokio::test]
async fn moderator_sees_moderator_comments() {
    let server = MockServer::start();
    mock_thread(&server, 1);
    let tmp = tempdir().unwrap();
    let roles = write_roles(tmp.path());
    let out = tmp.path().join("thread.html");

    hunt_thread::run(args(&server, tmp.path(), render_command(&out, Some("mod1"), Some(&roles))))
        .await
        .unwrap();

    let html = std::fs::read_to_string(&out).unwrap();
    let keys: Vec<String> = rendered_keys(&html).into_iter().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        vec!["mod1/re-widget", "u3/re-widget", "u2/re-widget", "u4/re-u2"]
    );
    assert!(html.contains("MODERATOR"));
    assert!(html.contains("4 comments"));
}

#[tokio::test]
async fn post_missing_from_ledger_fails_the_fetch() {
    let server = MockServer::start();
    mock_thread(&server, 0);
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("thread.html");

    let err = hunt_thread::run(args(&server, tmp.path(), render_command(&out, None, None)))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("No content found"), "{err:#}");
    assert!(!out.exists());
}

#[tokio::test]
async fn ledger_rpc_error_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/rpc");
        then.status(200)
            .json_body(json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "node overloaded"}}));
    });
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("thread.html");

    let err = hunt_thread::run(args(&server, tmp.path(), render_command(&out, None, None)))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("node overloaded"));
}

#[tokio::test]
async fn comment_vote_reports_service_message() {
    let server = MockServer::start();
    let ok = server.mock(|when, then| {
        when.method(POST)
            .path("/api/comments/upvote.json")
            .json_body(json!({"key": 12}));
        then.status(200)
            .json_body(json!({"score": 6.0, "upvotes": {"me": true}, "downvotes": {}}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/comments/downvote.json");
        then.status(422).json_body(json!({"error": "You cannot vote on your own comment"}));
    });
    let tmp = tempdir().unwrap();

    hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::Vote(VoteArgs {
            comment_id: 12,
            direction: VoteDirection::Up,
        }),
    ))
    .await
    .unwrap();
    ok.assert_hits(1);

    let err = hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::Vote(VoteArgs {
            comment_id: 12,
            direction: VoteDirection::Down,
        }),
    ))
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "You cannot vote on your own comment");
}

#[tokio::test]
async fn vote_value_saves_weight_preference() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/rpc").body_contains("condenser_api.get_accounts");
        then.status(200).json_body(json!({"jsonrpc": "2.0", "id": 1, "result": [{
            "name": "voter",
            "voting_power": 9000,
            "last_vote_time": "2018-03-01T10:00:00",
            "vesting_shares": "1000000.000000 VESTS",
            "received_vesting_shares": "0.000000 VESTS",
            "delegated_vesting_shares": "0.000000 VESTS"
        }]}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/rpc").body_contains("condenser_api.get_reward_fund");
        then.status(200).json_body(json!({"jsonrpc": "2.0", "id": 1, "result": {
            "reward_balance": "700000.000 STEEM", "recent_claims": "300000000000000000"
        }}));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/rpc")
            .body_contains("condenser_api.get_current_median_history_price");
        then.status(200).json_body(json!({"jsonrpc": "2.0", "id": 1, "result": {
            "base": "1.200 SBD", "quote": "1.000 STEEM"
        }}));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/rpc")
            .body_contains("condenser_api.get_dynamic_global_properties");
        then.status(200).json_body(json!({"jsonrpc": "2.0", "id": 1, "result": {
            "total_vesting_shares": "400000000000.000000 VESTS",
            "total_vesting_fund_steem": "200000000.000 STEEM"
        }}));
    });
    let tmp = tempdir().unwrap();

    hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::VoteValue(VoteValueArgs {
            account: "voter".to_string(),
            percent: Some(40),
            kind: VoteKind::Post,
            user_score: 2.0,
            boost_score: 1.0,
            save: true,
        }),
    ))
    .await
    .unwrap();

    let store = LocalStore::new(tmp.path());
    assert_eq!(
        hunt_thread::vote::load_vote_percent(&store, VoteKind::Post).unwrap(),
        40
    );
}

#[tokio::test]
async fn duplicate_url_resets_draft_url() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/posts/exists.json")
            .query_param("url", "https://taken.example");
        then.status(200)
            .json_body(json!({"result": "ALREADY_EXISTS", "url": "/@bob/taken"}));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/posts/exists.json")
            .query_param("url", "https://fresh.example");
        then.status(200).json_body(json!({"result": "OK"}));
    });
    let tmp = tempdir().unwrap();
    let store = LocalStore::new(tmp.path());

    hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::CheckUrl(CheckUrlArgs {
            url: "https://fresh.example".to_string(),
            edit: false,
        }),
    ))
    .await
    .unwrap();
    assert_eq!(Draft::load(&store).unwrap().unwrap().url, "https://fresh.example");

    let err = hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::CheckUrl(CheckUrlArgs {
            url: "https://taken.example".to_string(),
            edit: false,
        }),
    ))
    .await
    .unwrap_err();
    assert!(err.to_string().contains("/@bob/taken"));
    assert_eq!(Draft::load(&store).unwrap().unwrap().url, PLACEHOLDER_URL);
}

#[tokio::test]
async fn url_check_outage_is_reported_as_unavailable() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/posts/exists.json");
        then.status(500).body("boom");
    });
    let tmp = tempdir().unwrap();

    let err = hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::CheckUrl(CheckUrlArgs {
            url: "https://any.example".to_string(),
            edit: false,
        }),
    ))
    .await
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        hunt_thread::api::URL_CHECK_UNAVAILABLE_MESSAGE
    );
}

#[tokio::test]
async fn upload_attaches_image_to_draft() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/images/upload.json")
            .body_contains("shot.png");
        then.status(200).json_body(json!({"response": {
            "name": "shot.png",
            "link": "https://img.example/abc.png",
            "uid": "abc"
        }}));
    });
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("shot.png");
    std::fs::write(&file, b"png-bytes").unwrap();

    hunt_thread::run(args(&server, tmp.path(), Command::Upload(UploadArgs { file })))
        .await
        .unwrap();

    let draft = Draft::load(&LocalStore::new(tmp.path())).unwrap().unwrap();
    assert_eq!(draft.images.len(), 1);
    assert_eq!(draft.images[0].link, "https://img.example/abc.png");
}

#[tokio::test]
async fn failed_upload_uses_service_message_and_keeps_draft() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/images/upload.json");
        then.status(413).json_body(json!({"error": "File is too large"}));
    });
    let tmp = tempdir().unwrap();
    let store = LocalStore::new(tmp.path());
    let mut draft = Draft::default();
    draft.set(DraftField::Title, "Kept");
    draft.save(&store).unwrap();

    let file = tmp.path().join("shot.jpg");
    std::fs::write(&file, b"jpeg-bytes").unwrap();
    let err = hunt_thread::run(args(&server, tmp.path(), Command::Upload(UploadArgs { file })))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "File is too large");
    assert_eq!(Draft::load(&store).unwrap().unwrap().title, "Kept");
}

#[tokio::test]
async fn draft_check_blocks_locally_before_url_check() {
    let server = MockServer::start();
    let exists = server.mock(|when, then| {
        when.method(GET).path("/api/posts/exists.json");
        then.status(200).json_body(json!({"result": "OK"}));
    });
    let tmp = tempdir().unwrap();

    for (field, value) in [
        (DraftField::Url, "https://product.example"),
        (DraftField::Title, "Widget"),
        (DraftField::Tagline, "Does things"),
        (DraftField::Tags, "a b c d e"),
    ] {
        hunt_thread::run(args(
            &server,
            tmp.path(),
            Command::Draft(DraftCommand::Set {
                field,
                value: value.to_string(),
                edit: None,
            }),
        ))
        .await
        .unwrap();
    }

    let err = hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::Draft(DraftCommand::Check { edit: false }),
    ))
    .await
    .unwrap_err();
    assert!(err.to_string().contains("2 problem"), "{err}");
    exists.assert_hits(0);

    let err = hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::Draft(DraftCommand::Beneficiaries {
            entries: vec!["x:50".to_string(), "y:40".to_string()],
        }),
    ))
    .await
    .unwrap_err();
    assert!(err.to_string().contains("90%"));

    let err = hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::Draft(DraftCommand::Beneficiaries {
            entries: vec!["x:-5".to_string()],
        }),
    ))
    .await
    .unwrap_err();
    assert!(err.to_string().contains("-5%"), "{err}");

    let store = LocalStore::new(tmp.path());
    let draft = Draft::load(&store).unwrap().unwrap();
    assert!(draft.beneficiaries.is_empty());
}

#[tokio::test]
async fn editing_a_post_starts_a_draft_bound_to_it() {
    let server = MockServer::start();
    let tmp = tempdir().unwrap();
    let store = LocalStore::new(tmp.path());

    let mut other = Draft::default();
    other.author = "bob".to_string();
    other.permlink = "gadget".to_string();
    other.set(DraftField::Title, "Gadget");
    other.save(&store).unwrap();

    let edit: PostPath = "/hunt/@alice/widget".parse().unwrap();
    hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::Draft(DraftCommand::Set {
            field: DraftField::Title,
            value: "Widget".to_string(),
            edit: Some(edit.clone()),
        }),
    ))
    .await
    .unwrap();

    let draft = Draft::load_for_edit(&store, "alice", "widget")
        .unwrap()
        .unwrap();
    assert_eq!(draft.title, "Widget");
    assert!(Draft::load_for_edit(&store, "bob", "gadget").unwrap().is_none());

    hunt_thread::run(args(
        &server,
        tmp.path(),
        Command::Draft(DraftCommand::Set {
            field: DraftField::Tagline,
            value: "Does things".to_string(),
            edit: Some(edit),
        }),
    ))
    .await
    .unwrap();
    let draft = Draft::load(&store).unwrap().unwrap();
    assert_eq!(draft.title, "Widget");
    assert_eq!(draft.tagline, "Does things");
}
