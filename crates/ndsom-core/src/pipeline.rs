use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use ndsom_warehouse::SchemaStatus;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetcher::Fetcher;
use crate::http_client::HttpClient;
use crate::store::PersistenceStore;
use crate::transform::{Rejection, Transformer};

/// Outcome of one successful ingestion cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub download_timestamp: OffsetDateTime,
    pub fetched: usize,
    pub inserted: usize,
    pub rejections: Vec<Rejection>,
    pub schema_created: bool,
}

fn serialize_rfc3339<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}

/// One fetch, validate, persist pass. Cycles are expected to run serially.
pub struct PipelineRunner {
    fetcher: Fetcher,
    transformer: Transformer,
    store: PersistenceStore,
}

impl PipelineRunner {
    pub fn new(config: &PipelineConfig, http: Arc<dyn HttpClient>) -> Self {
        Self::from_parts(
            Fetcher::new(http, config.endpoint.clone(), config.retry),
            PersistenceStore::new(config.warehouse.clone(), config.retry, config.query_guardrails),
        )
    }

    pub fn from_parts(fetcher: Fetcher, store: PersistenceStore) -> Self {
        Self {
            fetcher,
            transformer: Transformer::new(),
            store,
        }
    }

    pub fn store(&self) -> &PersistenceStore {
        &self.store
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Run one cycle.
    ///
    /// Any fatal stage aborts before the insert, so a half-built batch is never
    /// written. Rows committed by earlier cycles are untouched.
    pub async fn run_once(&self) -> Result<CycleReport, PipelineError> {
        let cycle_id = Uuid::new_v4();
        info!(%cycle_id, "starting ingestion cycle");

        let payload = self.fetcher.fetch_raw().await?;
        let records = self.fetcher.parse_envelope(&payload)?;
        let fetched = records.len();

        let batch = self.transformer.validate_and_transform(records);
        let schema = self.store.ensure_schema_async().await?;
        let inserted = self.store.insert_batch_async(&batch.rows).await?;

        info!(
            %cycle_id,
            fetched,
            rows = inserted,
            rejected = batch.rejections.len(),
            "ingestion cycle complete"
        );
        Ok(CycleReport {
            cycle_id,
            download_timestamp: batch.download_timestamp,
            fetched,
            inserted,
            rejections: batch.rejections,
            schema_created: schema == SchemaStatus::Created,
        })
    }
}

/// Totals for a scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerSummary {
    pub cycles: u64,
    pub failures: u64,
    pub rows_inserted: u64,
}

/// Triggers [`PipelineRunner::run_once`] at a fixed interval.
///
/// The first cycle starts immediately. A slow cycle delays the next tick
/// instead of bunching missed ones, so cycles never overlap.
pub struct Scheduler {
    runner: PipelineRunner,
    interval: Duration,
}

impl Scheduler {
    pub fn new(runner: PipelineRunner, interval: Duration) -> Self {
        Self { runner, interval }
    }

    pub fn runner(&self) -> &PipelineRunner {
        &self.runner
    }

    /// Run cycles until `shutdown` resolves. A failed cycle is logged and the
    /// loop keeps going.
    pub async fn run<F>(&self, shutdown: F) -> SchedulerSummary
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut summary = SchedulerSummary::default();
        info!(interval_secs = self.interval.as_secs(), "scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            summary.cycles += 1;
            match self.runner.run_once().await {
                Ok(report) => summary.rows_inserted += report.inserted as u64,
                Err(failure) => {
                    summary.failures += 1;
                    error!(kind = failure.kind(), error = %failure, "ingestion cycle failed");
                }
            }
        }

        if summary.failures > 0 {
            warn!(failures = summary.failures, cycles = summary.cycles, "scheduler stopped with failed cycles");
        } else {
            info!(cycles = summary.cycles, "scheduler stopped");
        }
        summary
    }
}
