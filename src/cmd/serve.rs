//! HTTP API server command — `fanout serve`.

use anyhow::Result;

use fanout::config::ServiceConfig;
use fanout::server::{ServerConfig, start_server};

pub async fn cmd_serve(
    service_config: &ServiceConfig,
    host: &str,
    port: u16,
    dev: bool,
) -> Result<()> {
    start_server(
        ServerConfig {
            host: host.to_string(),
            port,
            dev_mode: dev,
        },
        service_config,
    )
    .await
}
