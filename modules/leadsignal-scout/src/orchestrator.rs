// Crawl orchestration: drive every schedulable source through fetch and
// assembly, one source and one item at a time, and keep per-source health
// counters current.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use leadsignal_common::{Source, SourceStatus};

use crate::assembler::{AssemblyOutcome, LeadAssembler};
use crate::fetcher::SourceFetcher;
use crate::traits::LeadStore;

/// A source whose error count goes past this is parked in `error` status.
pub const MAX_SOURCE_ERRORS: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlReport {
    pub source_name: String,
    pub items_processed: u32,
    pub leads_created: u32,
    pub duplicates_skipped: u32,
    pub no_signal: u32,
    pub errors: Vec<String>,
}

/// Result of one crawl attempt as far as source governance cares.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlOutcome {
    Success { leads_created: u32 },
    Failure { message: String },
}

/// Apply a crawl attempt to the source's counters.
pub fn record_crawl(source: &mut Source, outcome: &CrawlOutcome, now: DateTime<Utc>) {
    source.last_crawled = Some(now);
    match outcome {
        CrawlOutcome::Success { leads_created } => {
            source.last_success = Some(now);
            source.crawl_count += 1;
            source.leads_generated += leads_created;
            source.last_error = None;
        }
        CrawlOutcome::Failure { message } => {
            source.last_error = Some(message.clone());
            source.last_error_at = Some(now);
            source.error_count += 1;
            if source.error_count > MAX_SOURCE_ERRORS {
                source.status = SourceStatus::Error;
            }
        }
    }
}

pub struct CrawlOrchestrator {
    store: Arc<dyn LeadStore>,
    fetcher: SourceFetcher,
    assembler: LeadAssembler,
    inter_source_delay: Duration,
    cancelled: Arc<AtomicBool>,
}

impl CrawlOrchestrator {
    pub fn new(
        store: Arc<dyn LeadStore>,
        fetcher: SourceFetcher,
        assembler: LeadAssembler,
        inter_source_delay: Duration,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            fetcher,
            assembler,
            inter_source_delay,
            cancelled,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Crawl every active, schedule-enabled, non-error source in listing order.
    pub async fn run_all(&self) -> Result<Vec<CrawlReport>> {
        let sources: Vec<Source> = self
            .store
            .list_active_sources()
            .await?
            .into_iter()
            .filter(Source::is_schedulable)
            .collect();
        info!(sources = sources.len(), "Starting crawl run");

        let mut reports = Vec::with_capacity(sources.len());
        for (i, source) in sources.into_iter().enumerate() {
            if self.is_cancelled() {
                info!("Crawl run cancelled");
                break;
            }
            if i > 0 && !self.inter_source_delay.is_zero() {
                tokio::time::sleep(self.inter_source_delay).await;
                if self.is_cancelled() {
                    info!("Crawl run cancelled");
                    break;
                }
            }
            reports.push(self.run_one(source).await);
        }

        let created: u32 = reports.iter().map(|r| r.leads_created).sum();
        info!(sources = reports.len(), leads_created = created, "Crawl run complete");
        Ok(reports)
    }

    /// Crawl a single active source by name, ignoring its schedule flag.
    pub async fn run_named(&self, name: &str) -> Result<CrawlReport> {
        let source = self
            .store
            .list_active_sources()
            .await?
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name));
        match source {
            Some(source) => Ok(self.run_one(source).await),
            None => bail!("No active source named {name}"),
        }
    }

    pub async fn run_one(&self, mut source: Source) -> CrawlReport {
        let mut report = CrawlReport {
            source_name: source.name.clone(),
            ..Default::default()
        };

        let outcome = match self.fetcher.try_fetch(&source).await {
            Ok(items) => {
                for item in &items {
                    if self.is_cancelled() {
                        break;
                    }
                    report.items_processed += 1;
                    match self.assembler.assemble(item, &source).await {
                        Ok(AssemblyOutcome::Created(_)) => report.leads_created += 1,
                        Ok(AssemblyOutcome::Duplicate { .. }) => report.duplicates_skipped += 1,
                        Ok(AssemblyOutcome::NoSignal) => report.no_signal += 1,
                        Err(e) => {
                            warn!(source = %source.name, url = %item.url, error = %e, "Item failed");
                            report.errors.push(format!("{}: {e:#}", item.url));
                        }
                    }
                }
                CrawlOutcome::Success {
                    leads_created: report.leads_created,
                }
            }
            Err(e) => {
                warn!(source = %source.name, url = %source.url, error = %e, "Source crawl failed");
                report.errors.push(e.to_string());
                CrawlOutcome::Failure {
                    message: e.to_string(),
                }
            }
        };

        record_crawl(&mut source, &outcome, Utc::now());
        if source.status == SourceStatus::Error {
            warn!(source = %source.name, errors = source.error_count, "Source parked after repeated failures");
        }
        if let Err(e) = self.store.save_source(&source).await {
            warn!(source = %source.name, error = %e, "Failed to save source stats");
            report.errors.push(format!("failed to save source stats: {e:#}"));
        }

        info!(
            source = %report.source_name,
            items = report.items_processed,
            leads_created = report.leads_created,
            duplicates = report.duplicates_skipped,
            errors = report.errors.len(),
            "Source crawled"
        );
        report
    }
}
