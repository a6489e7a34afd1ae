//! Live events end to end: a real server process, browsers as SSE readers,
//! and the CLI commands that push into the same streams.

mod common;

use anyhow::Result;
use common::env::wait_for_shutdown;
use common::{SseReader, TestEnv};
use serde_json::{json, Value};
use std::fs;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(400);

async fn connected(env: &TestEnv, file: &str) -> Result<SseReader> {
    let mut stream = SseReader::connect(&env.base_url(), &env.project_str(), file).await?;
    let first = stream.next(WAIT).await?.expect("connected event");
    assert_eq!(first.event, "connected");
    Ok(stream)
}

async fn create_comment(env: &TestEnv, file: &str, text: &str) -> Result<i64> {
    let created: Value = reqwest::Client::new()
        .post(format!("{}/api/comments", env.base_url()))
        .json(&json!({
            "project_directory": env.project_str(),
            "file_path": file,
            "line_start": 1,
            "line_end": 1,
            "selected_text": "# Title",
            "comment_text": text,
        }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(created["id"].as_i64().expect("comment id"))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_topic_is_rejected() -> Result<()> {
    let env = TestEnv::new()?;
    let _server = env.start_server().await?;

    let response = reqwest::get(format!("{}/api/events?file_path=test.md", env.base_url())).await?;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_file_write_notifies_every_viewer() -> Result<()> {
    let env = TestEnv::new()?;
    env.write_file("test.md", "# v1\n")?;
    env.write_file("other.md", "# other\n")?;
    let _server = env.start_server().await?;

    let mut first = connected(&env, "test.md").await?;
    let mut second = connected(&env, "test.md").await?;
    let mut sibling = connected(&env, "other.md").await?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    env.write_file("test.md", "# v2\n")?;

    for stream in [&mut first, &mut second] {
        let event = stream.next(WAIT).await?.expect("file_updated");
        assert_eq!(event.event, "file_updated");
        assert_eq!(event.json()["file_path"], "test.md");
        assert_eq!(event.json()["project_directory"], env.project_str());
    }
    sibling.expect_silence(QUIET).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rapid_writes_are_coalesced() -> Result<()> {
    let env = TestEnv::new()?;
    env.write_file("test.md", "v0")?;
    let _server = env.start_server().await?;
    let mut stream = connected(&env, "test.md").await?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    for i in 0..10 {
        env.write_file("test.md", &format!("v{}", i + 1))?;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut updates = 0;
    while let Ok(Some(event)) = stream.next(Duration::from_millis(1500)).await {
        assert_eq!(event.event, "file_updated");
        updates += 1;
    }
    assert!((1..10).contains(&updates), "got {} updates", updates);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_file_created_after_subscribe() -> Result<()> {
    let env = TestEnv::new()?;
    let _server = env.start_server().await?;
    let mut stream = connected(&env, "later.md").await?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    env.write_file("later.md", "# here now\n")?;

    let event = stream.next(WAIT).await?.expect("file_updated");
    assert_eq!(event.event, "file_updated");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deleted_file_keeps_server_up() -> Result<()> {
    let env = TestEnv::new()?;
    let path = env.write_file("gone.md", "# bye\n")?;
    let _server = env.start_server().await?;
    let mut stream = connected(&env, "gone.md").await?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::remove_file(&path)?;
    // Unlink may surface as a metadata change; the stream must not end
    if let Ok(next) = stream.next(QUIET).await {
        assert_eq!(next.expect("stream still open").event, "file_updated");
    }

    // Still serving, and the stream is still open
    let response = reqwest::get(env.base_url()).await?;
    assert!(response.status().is_success());
    let _other = connected(&env, "gone.md").await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resolve_command_broadcasts() -> Result<()> {
    let env = TestEnv::new()?;
    env.write_file("plan.md", "# Title\n")?;
    let _server = env.start_server().await?;

    create_comment(&env, "plan.md", "First").await?;
    create_comment(&env, "plan.md", "Second").await?;
    let mut stream = connected(&env, "plan.md").await?;

    let result = rl!(env, "resolve", "--file", "plan.md").assert_success()?;
    assert!(result.contains("Resolved 2 comment(s) for plan.md"), "{}", result.output());

    let event = stream.next_except("file_updated", WAIT).await?.expect("event");
    assert_eq!(event.event, "comments_resolved");
    assert_eq!(event.json()["file_path"], "plan.md");

    let again = rl!(env, "resolve", "--file", "@plan.md").assert_success()?;
    assert!(again.contains("No unresolved comments found for plan.md"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resolve_one_thread() -> Result<()> {
    let env = TestEnv::new()?;
    let _server = env.start_server().await?;

    let keep = create_comment(&env, "plan.md", "Keep me").await?;
    let done = create_comment(&env, "plan.md", "Resolve me").await?;
    let mut stream = connected(&env, "plan.md").await?;

    let id = done.to_string();
    let result = rl!(env, "resolve", "--comment-id", id.as_str()).assert_success()?;
    assert!(result.contains(&format!("Resolved thread {} (1 comment(s))", done)));
    let event = stream.next(WAIT).await?.expect("event");
    assert_eq!(event.event, "comments_resolved");

    let again = rl!(env, "resolve", "--comment-id", id.as_str()).assert_success()?;
    assert!(again.contains("was already resolved"));

    let open = rl!(env, "address", "--file", "plan.md").assert_success()?;
    assert!(open.contains(&format!("## Comment #{}", keep)));
    assert!(!open.contains(&format!("## Comment #{}", done)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reply_command_reloads_viewers() -> Result<()> {
    let env = TestEnv::new()?;
    let _server = env.start_server().await?;

    let root = create_comment(&env, "plan.md", "Why?").await?;
    let mut stream = connected(&env, "plan.md").await?;

    let id = root.to_string();
    let result = rl!(env, "reply", "--comment-id", id.as_str(), "--message", "Because.").assert_success()?;
    assert!(result.contains(&format!("Reply added to comment {}", root)));

    let event = stream.next(WAIT).await?.expect("event");
    assert_eq!(event.event, "reload");

    let address = rl!(env, "address", "--file", "plan.md").assert_success()?;
    assert!(address.contains("Found 1 unresolved comment(s) for plan.md"));
    assert!(address.contains("> # Title"));
    assert!(address.contains("**User:**"));
    assert!(address.contains("**Reply from Agent:**"));
    assert!(address.contains("Because."));
    Ok(())
}

#[test]
fn test_reply_errors() -> Result<()> {
    let env = TestEnv::new()?;

    let missing = rl!(env, "reply", "--comment-id", "42", "--message", "hi").assert_failure()?;
    assert!(missing.contains("comment 42 not found"), "{}", missing.output());
    Ok(())
}

#[test]
fn test_commands_work_without_server() -> Result<()> {
    let env = TestEnv::new()?;

    let registered = rl!(env, "register").assert_success()?;
    assert!(registered.contains(&format!("Registered project: {}", env.project_str())));

    let address = rl!(env, "address", "--file", "plan.md").assert_success()?;
    assert!(address.contains("No unresolved comments for plan.md"));

    // Nobody to notify; the command itself still succeeds
    let resolve = rl!(env, "resolve", "--file", "plan.md").assert_success()?;
    assert!(resolve.contains("No unresolved comments found for plan.md"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_review_starts_server() -> Result<()> {
    let env = TestEnv::new()?;

    let result = rl!(env, "review", "--file", "@docs/plan.md").assert_success()?;
    assert!(result.contains("Started server (PID"), "{}", result.output());
    assert!(result.contains("Open this URL in your browser to start reviewing docs/plan.md"));
    let url = format!(
        "http://localhost:{}/projects{}/docs/plan.md",
        env.port,
        env.project_str()
    );
    assert!(result.contains(&url), "{}", result.output());

    let home: Value = reqwest::get(env.base_url()).await?.json().await?;
    assert_eq!(home["projects"][0]["directory"], env.project_str());

    rl!(env, "server", "--stop").assert_success()?;
    wait_for_shutdown(&env.base_url(), WAIT).await?;
    Ok(())
}
