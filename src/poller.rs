//! The polling loop: fetch new and updated bugs, deduplicate, notify, and
//! advance the watermark.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::api::{Bug, ZentaoClient};
use crate::notify::FeishuNotifier;
use crate::state::{now_watermark, StateStore};

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No webhook configured; nothing was done.
    NoWebhook,
    /// First run: the watermark was recorded, no bugs were pushed.
    FirstRun,
    /// Login or bug listing failed; the watermark was not advanced.
    Failed,
    /// Bugs were fetched and pushed.
    Completed { found: usize, pushed: usize },
}

impl CycleOutcome {
    /// Number of bug cards delivered in this cycle.
    pub fn pushed(&self) -> usize {
        match self {
            CycleOutcome::Completed { pushed, .. } => *pushed,
            _ => 0,
        }
    }
}

/// Drives polling cycles with one long-lived client.
pub struct Poller {
    client: ZentaoClient,
    notifier: Option<FeishuNotifier>,
    store: StateStore,
    product_ids: Option<Vec<String>>,
}

impl Poller {
    /// Create a poller. Without a notifier every cycle is skipped.
    pub fn new(
        client: ZentaoClient,
        notifier: Option<FeishuNotifier>,
        store: StateStore,
        product_ids: Option<Vec<String>>,
    ) -> Self {
        Self {
            client,
            notifier,
            store,
            product_ids,
        }
    }

    /// Run one cycle.
    ///
    /// The first run only records the current time so history is not
    /// replayed. Otherwise bugs touched since the stored watermark are
    /// pushed and the watermark moves to the time the cycle started.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> CycleOutcome {
        let Some(notifier) = &self.notifier else {
            warn!("FEISHU_WEBHOOK_URL is not configured, skipping cycle");
            return CycleOutcome::NoWebhook;
        };

        let cycle_start = now_watermark();
        let Some(since) = self.store.load() else {
            info!("First run, recording check time {} without pushing history", cycle_start);
            self.store.save_or_log(&cycle_start);
            return CycleOutcome::FirstRun;
        };

        let bugs = match self
            .client
            .list_bugs_since(Some(&since), self.product_ids.as_deref())
            .await
        {
            Ok(bugs) => bugs,
            Err(e) => {
                error!("Failed to fetch bugs from ZenTao: {}", e);
                return CycleOutcome::Failed;
            }
        };

        let bugs = dedup_by_id(bugs);
        let mut pushed = 0;
        for bug in &bugs {
            let bug_url = self.client.bug_view_url(&bug.id);
            if notifier.send_bug_card(bug, &bug_url).await {
                pushed += 1;
            }
        }

        self.store.save_or_log(&cycle_start);
        info!(
            "Cycle finished: {} bugs found, {} pushed, next since={}",
            bugs.len(),
            pushed,
            cycle_start
        );
        CycleOutcome::Completed {
            found: bugs.len(),
            pushed,
        }
    }

    /// Run cycles every `interval` until Ctrl-C.
    pub async fn run_forever(&self, interval: Duration) {
        info!("Polling every {} seconds", interval.as_secs());
        loop {
            self.run_once().await;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, exiting");
                    break;
                }
            }
        }
    }
}

/// Drop bugs with an empty or already-seen id, keeping first-seen order.
pub fn dedup_by_id(bugs: Vec<Bug>) -> Vec<Bug> {
    let mut seen = HashSet::new();
    bugs.into_iter()
        .filter(|bug| !bug.id.is_empty() && seen.insert(bug.id.clone()))
        .collect()
}
