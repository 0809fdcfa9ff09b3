//! Store polling loop
//!
//! Stands in for the browser's storage change events: the store is re-read
//! on every tick, changed keys accumulate, and a recompute runs once the
//! burst of edits goes quiet.

use std::future::Future;
use std::time::{Duration, Instant};

use nh_compiler::{ConfigStore, DebouncePolicy, Debouncer, Orchestrator, RuleLayer, Trigger};
use nh_core::{GlobalConfig, StorageKey};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub interval: Duration,
    pub debounce: DebouncePolicy,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            debounce: DebouncePolicy::default(),
        }
    }
}

/// Install rules once, then follow store changes until `shutdown` resolves.
pub async fn watch<S, L, F>(
    orchestrator: &Orchestrator<S, L>,
    options: WatchOptions,
    shutdown: F,
) -> Result<(), String>
where
    S: ConfigStore,
    L: RuleLayer,
    F: Future<Output = ()>,
{
    orchestrator.recompute().await.map_err(|e| e.to_string())?;
    let mut last = orchestrator.store().load().await.map_err(|e| e.to_string())?;

    let mut debouncer = Debouncer::new(options.debounce);
    let mut pending: Vec<StorageKey> = Vec::new();
    let mut ticker = tokio::time::interval(options.interval);
    tokio::pin!(shutdown);

    log::info!("watching for configuration changes");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("watch stopped");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        match orchestrator.store().load().await {
            Ok(current) => {
                let changed = GlobalConfig::changed_keys(&last, &current);
                if !changed.is_empty() {
                    log::debug!("store changed: {:?}", changed);
                    for key in changed {
                        if !pending.contains(&key) {
                            pending.push(key);
                        }
                    }
                    debouncer.record(Instant::now());
                    last = current;
                }
            }
            // A half-written file reads as malformed; the next tick retries.
            Err(e) => log::warn!("{}", e),
        }

        if debouncer.poll(Instant::now()) {
            let trigger = Trigger::ConfigChanged(std::mem::take(&mut pending));
            // Failures are logged by the orchestrator; keep watching.
            let _ = orchestrator.handle(trigger).await;
        }
    }
}
