/**
 * Process Supervisor
 *
 * With `LIVE_PROCESS_COUNT > 1` and no `LIVE_PROCESS_INDEX`, the server
 * binary does not serve; it re-executes itself once per process index and
 * waits. Each child inherits the environment plus its own index.
 */

use crate::shared::LiveConfig;
use tokio::process::Command;

/// Whether this invocation should supervise instead of serve
pub fn should_supervise(config: &LiveConfig, index_from_env: Option<&str>) -> bool {
    config.process_count > 1 && index_from_env.is_none()
}

/// Spawn one child per process index and wait for all of them
///
/// Returns the number of children that exited unsuccessfully.
pub async fn supervise(config: &LiveConfig) -> std::io::Result<usize> {
    let executable = std::env::current_exe()?;
    let mut children = Vec::with_capacity(usize::from(config.process_count));

    for index in 0..config.process_count {
        let child = Command::new(&executable)
            .env("LIVE_PROCESS_INDEX", index.to_string())
            .env("LIVE_PROCESS_COUNT", config.process_count.to_string())
            .env("LIVE_VERSION", &config.version)
            .kill_on_drop(true)
            .spawn()?;
        tracing::info!("[Supervisor] Started process {} (pid {:?})", index, child.id());
        children.push((index, child));
    }

    let mut failed = 0;
    for (index, mut child) in children {
        match child.wait().await {
            Ok(status) if status.success() => {
                tracing::info!("[Supervisor] Process {} exited", index)
            }
            Ok(status) => {
                failed += 1;
                tracing::error!("[Supervisor] Process {} exited with {}", index, status);
            }
            Err(e) => {
                failed += 1;
                tracing::error!("[Supervisor] Failed to wait for process {}: {}", index, e);
            }
        }
    }
    Ok(failed)
}
