//! `fanout patches` — list the patches that can be run.

use anyhow::{Context, Result};

use fanout::config::ServiceConfig;
use fanout::jobs::JobTypeStore;

pub fn cmd_patches(service_config: &ServiceConfig) -> Result<()> {
    let store = JobTypeStore::new(&service_config.patches_dir);
    let patches = store.list().with_context(|| {
        format!(
            "Failed to list patches in {}",
            service_config.patches_dir.display()
        )
    })?;

    if patches.is_empty() {
        println!("No patches found in {}", service_config.patches_dir.display());
        return Ok(());
    }
    for patch in patches {
        println!("{}", patch);
    }
    Ok(())
}
