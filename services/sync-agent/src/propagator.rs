//! Discovery Cycle Orchestrator
//!
//! Walks every credential in order: scan all inventory pages, dedup,
//! filter and rename, compose keys, then save each item through the sink
//! with bounded retry. Failures stay local to the item or credential that
//! hit them; only configuration errors stop the agent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::account::AccountResolver;
use crate::config::{ConfigError, Credential};
use crate::inventory::{InventoryError, InventorySource};
use crate::pipeline::{dedup, prepare};
use crate::sinks::{GatewaySink, SinkError};
use crate::types::{CyclePhase, CycleReport, DiscoveredItem, SyncItem};

#[derive(Debug, Clone)]
pub struct PropagationOptions {
    /// Save attempts per item, at least 1
    pub retry: u32,
    /// Pause between failed attempts
    pub retry_interval: Duration,
    /// Bound on each external call (scan page, account lookup, save)
    pub call_timeout: Duration,
    /// Run the pipeline without writing to the sink
    pub dry_run: bool,
}

impl Default for PropagationOptions {
    fn default() -> Self {
        Self {
            retry: 3,
            retry_interval: Duration::from_secs(2),
            call_timeout: Duration::from_secs(10),
            dry_run: false,
        }
    }
}

pub struct Propagator {
    inventory: Arc<dyn InventorySource>,
    accounts: Arc<dyn AccountResolver>,
    sink: Arc<dyn GatewaySink>,
    options: PropagationOptions,
}

impl Propagator {
    pub fn new(
        inventory: Arc<dyn InventorySource>,
        accounts: Arc<dyn AccountResolver>,
        sink: Arc<dyn GatewaySink>,
        mut options: PropagationOptions,
    ) -> Self {
        options.retry = options.retry.max(1);
        Self {
            inventory,
            accounts,
            sink,
            options,
        }
    }

    /// Run discovery cycles starting from already validated `credentials`.
    /// With a zero `every` a single cycle runs and its report is returned;
    /// otherwise cycles start `every` apart (measured from the start of the
    /// previous one) until the process is stopped.
    ///
    /// `reload` is called before every cycle after the first. A failed
    /// reload keeps the previous credentials.
    pub async fn run<F>(
        &self,
        every: Duration,
        mut credentials: Vec<Credential>,
        mut reload: F,
    ) -> CycleReport
    where
        F: FnMut() -> Result<Vec<Credential>, ConfigError>,
    {
        if every.is_zero() {
            return self.run_cycle(&credentials).await;
        }

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first = true;

        loop {
            ticker.tick().await;

            if !first {
                match reload() {
                    Ok(fresh) => credentials = fresh,
                    Err(e) => error!(
                        error = %e,
                        "Credential reload failed, keeping previous configuration"
                    ),
                }
            }
            first = false;

            let report = self.run_cycle(&credentials).await;
            if !report.success() {
                warn!(
                    failed = report.failed,
                    scan_errors = report.scan_errors,
                    "Cycle finished with errors"
                );
            }
        }
    }

    /// One pass over every credential
    pub async fn run_cycle(&self, credentials: &[Credential]) -> CycleReport {
        let mut report = CycleReport {
            started_at: chrono::Utc::now(),
            ..CycleReport::default()
        };

        info!(
            credentials = credentials.len(),
            sink = %self.sink.kind(),
            dry_run = self.options.dry_run,
            "Starting discovery cycle"
        );

        for credential in credentials {
            report.credentials += 1;
            self.propagate_credential(credential, &mut report).await;
        }

        info!(
            scanned = report.scanned,
            duplicates = report.duplicates,
            filtered = report.filtered,
            saved = report.saved,
            failed = report.failed,
            scan_errors = report.scan_errors,
            "Discovery cycle complete"
        );
        debug!(phase = %CyclePhase::Done);

        report
    }

    async fn propagate_credential(&self, credential: &Credential, report: &mut CycleReport) {
        let role = credential.role_arn.as_str();

        let lookup = self.accounts.account_id(credential);
        let account_id = match bounded(self.options.call_timeout, lookup).await {
            Some(Ok(id)) => id,
            Some(Err(e)) => {
                error!(
                    credential = %role,
                    error = %e,
                    "Account resolution failed, skipping credential"
                );
                report.scan_errors += 1;
                report.errors.push(format!("{}: {}", role, e));
                return;
            }
            None => {
                error!(credential = %role, "Account resolution timed out, skipping credential");
                report.scan_errors += 1;
                report.errors.push(format!("{}: account resolution timed out", role));
                return;
            }
        };

        debug!(credential = %role, phase = %CyclePhase::Scanning);
        let (scanned, scan_error) = self.scan(credential).await;
        if let Some(e) = scan_error {
            error!(
                credential = %role,
                error = %e,
                partial = scanned.len(),
                "Inventory scan aborted"
            );
            report.scan_errors += 1;
            report.errors.push(format!("{}: {}", role, e));
        }
        report.scanned += scanned.len();

        debug!(credential = %role, phase = %CyclePhase::Deduping);
        let deduped = dedup(scanned);
        report.duplicates += deduped.duplicates.len();

        debug!(credential = %role, phase = %CyclePhase::Filtering);
        let (items, filtered) = prepare(&deduped.unique, credential, &account_id);
        report.filtered += filtered;

        debug!(credential = %role, phase = %CyclePhase::Saving, items = items.len());
        for item in &items {
            if self.options.dry_run {
                info!(gateway = %item.key, gateway_id = %item.id, "Would save");
                report.saved += 1;
                continue;
            }

            match self.save_with_retry(item).await {
                Ok(attempts) => {
                    info!(gateway = %item.key, gateway_id = %item.id, attempts, "Saved gateway");
                    report.saved += 1;
                }
                Err(e) => {
                    error!(
                        gateway = %item.key,
                        attempts = self.options.retry,
                        error = %e,
                        "Abandoning gateway after retries"
                    );
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", item.key, e));
                }
            }
        }
    }

    /// Collect every page for `credential`. A failing page stops the walk
    /// and the items gathered so far are returned with the error.
    async fn scan(&self, credential: &Credential) -> (Vec<DiscoveredItem>, Option<InventoryError>) {
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = match bounded(
                self.options.call_timeout,
                self.inventory.list_page(credential, next_token.as_deref()),
            )
            .await
            {
                Some(Ok(page)) => page,
                Some(Err(e)) => return (items, Some(e)),
                None => return (items, Some(InventoryError::Timeout)),
            };

            items.extend(page.items);
            match page.next_token {
                Some(token) if next_token.as_deref() != Some(token.as_str()) => {
                    next_token = Some(token)
                }
                Some(token) => {
                    return (
                        items,
                        Some(InventoryError::Page {
                            credential: credential.role_arn.clone(),
                            message: format!("page token {:?} repeated", token),
                        }),
                    )
                }
                None => return (items, None),
            }
        }
    }

    /// Save one item, retrying up to `retry` attempts with a fixed pause in
    /// between. Returns the attempt that succeeded.
    pub async fn save_with_retry(&self, item: &SyncItem) -> Result<u32, SinkError> {
        let mut attempt = 1;
        loop {
            let result = bounded(
                self.options.call_timeout,
                self.sink.save(&item.key, &item.id, item.token.as_deref()),
            )
            .await
            .unwrap_or(Err(SinkError::Timeout));

            match result {
                Ok(()) => return Ok(attempt),
                Err(e) if attempt >= self.options.retry => return Err(e),
                Err(e) => {
                    warn!(
                        gateway = %item.key,
                        attempt,
                        retry = self.options.retry,
                        error = %e,
                        "Save failed, retrying"
                    );
                    tokio::time::sleep(self.options.retry_interval).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// `None` when the call outlives `limit`
async fn bounded<T>(limit: Duration, call: impl Future<Output = T>) -> Option<T> {
    timeout(limit, call).await.ok()
}
