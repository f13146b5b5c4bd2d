//! `fanout run` — submit a patch run in-process and follow its output.

use std::time::Duration;

use anyhow::{Context, Result};

use fanout::config::ServiceConfig;
use fanout::jobs::{FanoutService, JobRequest};

pub async fn cmd_run(
    service_config: &ServiceConfig,
    patch: &str,
    org: &str,
    token: &str,
    dry_run: bool,
    interval_ms: u64,
) -> Result<()> {
    let service = FanoutService::from_config(service_config);
    let request = JobRequest::new(token, org, patch, dry_run);
    let stream = service
        .run(request)
        .await
        .with_context(|| format!("Failed to start patch '{}'", patch))?;
    tracing::debug!(token = %stream, "following output");

    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    loop {
        interval.tick().await;
        let chunk = service.output(&stream).context("Lost track of patch output")?;
        for line in &chunk.lines {
            println!("{}", line);
        }
        if chunk.done {
            break;
        }
    }
    Ok(())
}
