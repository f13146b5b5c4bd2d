//! End-to-end tests of the job service against real child processes.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fanout::errors::FanoutError;
use fanout::jobs::{FanoutService, JobRequest, JobTypeStore, ProcessExecutor};
use fanout::{OutputChunk, Token};
use tempfile::TempDir;

const CONFIG: &str = "branch: b\npr-title: t\npr-body: body\n";

/// A patches directory with one job type plus a tool script with `body`.
fn setup(body: &str) -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let patches = dir.path().join("patches");
    fs::create_dir_all(patches.join("example")).unwrap();
    fs::write(patches.join("example").join("config.yml"), CONFIG).unwrap();
    fs::write(patches.join("example").join("patch"), "#!/bin/sh\n").unwrap();

    let tool = dir.path().join("tool.sh");
    fs::write(&tool, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
    (dir, patches, tool)
}

fn service(patches: &Path, tool: &Path, capacity: usize) -> FanoutService {
    FanoutService::new(
        JobTypeStore::new(patches),
        Arc::new(ProcessExecutor::new(tool.to_string_lossy())),
    )
    .with_output_capacity(capacity)
}

fn request() -> JobRequest {
    JobRequest::new("gh-api-token", "gh-org", "example", false)
}

/// Poll until done, collecting every line.
async fn follow(service: &FanoutService, token: &Token) -> Vec<String> {
    let mut lines = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let OutputChunk { lines: chunk, done } = service.output(token).unwrap();
            lines.extend(chunk);
            if done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job never completed");
    lines
}

#[tokio::test]
async fn test_run_returns_before_process_exits() {
    let (_dir, patches, tool) = setup("sleep 1; echo finished");
    let service = service(&patches, &tool, 10);

    let started = std::time::Instant::now();
    let token = service.run(request()).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(900));

    let first = service.output(&token).unwrap();
    assert!(!first.done);

    assert_eq!(follow(&service, &token).await, vec!["finished"]);
    assert!(matches!(
        service.output(&token),
        Err(FanoutError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_streams_keep_their_own_order() {
    let (_dir, patches, tool) = setup(
        "i=0; while [ $i -lt 50 ]; do echo \"out $i\"; echo \"err $i\" >&2; i=$((i+1)); done",
    );
    let service = service(&patches, &tool, 3);
    let token = service.run(request()).await.unwrap();
    let lines = follow(&service, &token).await;

    let expected = |prefix: &str| (0..50).map(|i| format!("{prefix} {i}")).collect::<Vec<_>>();
    let out: Vec<String> = lines.iter().filter(|l| l.starts_with("out ")).cloned().collect();
    let err: Vec<String> = lines.iter().filter(|l| l.starts_with("err ")).cloned().collect();
    assert_eq!(out, expected("out"));
    assert_eq!(err, expected("err"));
}

#[tokio::test]
async fn test_arguments_reach_the_tool() {
    let (_dir, patches, tool) = setup("for a in \"$@\"; do echo \"$a\"; done");
    let service = service(&patches, &tool, 32);
    let token = service
        .run(JobRequest::new("gh-api-token", "gh-org", "example", true))
        .await
        .unwrap();

    let lines = follow(&service, &token).await;
    let job_file = patches.join("example").join("patch");
    let expected: Vec<String> = [
        "run",
        job_file.to_str().unwrap(),
        "--token",
        "gh-api-token",
        "--org",
        "gh-org",
        "--branch",
        "b",
        "--pr-title",
        "t",
        "--pr-body",
        "body",
        "--plain-output",
        "--log-level",
        "debug",
        "--dry-run",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(lines, expected);
}

#[tokio::test]
async fn test_failing_tool_still_completes_with_diagnostics() {
    let (_dir, patches, tool) = setup("echo 'could not find org gh-org' >&2; exit 1");
    let service = service(&patches, &tool, 10);
    let token = service.run(request()).await.unwrap();
    assert_eq!(
        follow(&service, &token).await,
        vec!["could not find org gh-org"]
    );
    assert!(service.registry().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unpolled_job_does_not_delay_another() {
    let (dir, patches, _) = setup("");
    let chatty = dir.path().join("chatty.sh");
    fs::write(
        &chatty,
        "#!/bin/sh\ni=0; while [ $i -lt 100000 ]; do echo spam; i=$((i+1)); done\n",
    )
    .unwrap();
    fs::set_permissions(&chatty, fs::Permissions::from_mode(0o755)).unwrap();
    let quick = dir.path().join("quick.sh");
    fs::write(&quick, "#!/bin/sh\necho done quickly\n").unwrap();
    fs::set_permissions(&quick, fs::Permissions::from_mode(0o755)).unwrap();

    let stuck_service = service(&patches, &chatty, 1);
    let stuck = stuck_service.run(request()).await.unwrap();

    let quick_service = service(&patches, &quick, 1);
    let token = quick_service.run(request()).await.unwrap();
    assert_eq!(follow(&quick_service, &token).await, vec!["done quickly"]);

    // Never drained: still stalled on its full queue.
    assert!(stuck_service.registry().contains(&stuck));
}

#[tokio::test]
async fn test_invalid_patch_never_spawns() {
    let (dir, patches, _) = setup("");
    let marker = dir.path().join("spawned");
    let tool = dir.path().join("marker.sh");
    fs::write(&tool, format!("#!/bin/sh\ntouch '{}'\n", marker.display())).unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

    let service = service(&patches, &tool, 10);
    for name in ["../../x", "..", "example/..", "/etc"] {
        let err = service
            .run(JobRequest::new("t", "o", name, false))
            .await
            .unwrap_err();
        assert!(matches!(err, FanoutError::InvalidJobType { .. }), "{name}: {err}");
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!marker.exists());
    assert!(service.registry().is_empty());
}
