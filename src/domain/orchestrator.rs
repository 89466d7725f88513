//! Pipeline orchestrator.
//!
//! Drives each work item through fetch → transform → evaluate →
//! aggregate, updating the durable ledger after every transition. Items
//! are independent and run with bounded parallelism; stages within one
//! item are strictly sequential because each stage's output feeds the
//! next.

use std::sync::Arc;

use rayon::prelude::*;

use super::alerts;
use super::dedup::{ContentAddressStore, HashClaim, content_digest};
use super::error::PinerankError;
use super::evaluation::EvaluationResult;
use super::record::{PipelineRecord, StageStatus};
use super::score::{CompositeScore, aggregate};
use super::stage::{self, MAX_STAGE_ATTEMPTS, Stage};
use super::work_item::{SourceLocator, WorkItem, slugify};
use crate::ports::evaluate_port::EvaluatePort;
use crate::ports::sink_port::{NotifyPort, PersistencePort};
use crate::ports::source_port::SourcePort;
use crate::ports::state_port::StatePort;
use crate::ports::transform_port::TransformPort;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_SHARPE_ALERT: f64 = 2.0;

/// Terminal outcome of one item in a sweep.
#[derive(Debug)]
pub enum ItemOutcome {
    Evaluated {
        item: WorkItem,
        results: Vec<EvaluationResult>,
        score: Option<CompositeScore>,
    },
    Skipped {
        item_id: String,
        duplicate_of: String,
    },
    Failed {
        item_id: String,
        error: PinerankError,
    },
}

/// What an interactive submission returns. Fetch and transform failures
/// surface as errors instead; per-instrument evaluation failures stay
/// inline in the report.
#[derive(Debug)]
pub enum SubmitOutcome {
    Completed(ItemReport),
    Duplicate {
        item_id: String,
        duplicate_of: String,
    },
}

#[derive(Debug)]
pub struct ItemReport {
    pub item: WorkItem,
    pub results: Vec<EvaluationResult>,
    pub score: Option<CompositeScore>,
}

/// Counts returned by a backlog sweep. `already_done` is how many backlog
/// entries were filtered out because their record was already terminal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub already_done: usize,
}

pub struct Orchestrator {
    source: Arc<dyn SourcePort>,
    transformer: Arc<dyn TransformPort>,
    evaluator: Arc<dyn EvaluatePort>,
    state: Arc<dyn StatePort>,
    dedup: ContentAddressStore,
    sinks: Vec<Arc<dyn PersistencePort>>,
    notifier: Option<Arc<dyn NotifyPort>>,
    instruments: Vec<String>,
    workers: usize,
    sharpe_alert_threshold: f64,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn SourcePort>,
        transformer: Arc<dyn TransformPort>,
        evaluator: Arc<dyn EvaluatePort>,
        state: Arc<dyn StatePort>,
        instruments: Vec<String>,
    ) -> Self {
        let dedup = ContentAddressStore::new(Arc::clone(&state));
        Self {
            source,
            transformer,
            evaluator,
            state,
            dedup,
            sinks: Vec::new(),
            notifier: None,
            instruments,
            workers: DEFAULT_WORKERS,
            sharpe_alert_threshold: DEFAULT_SHARPE_ALERT,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PersistencePort>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotifyPort>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_sharpe_alert(mut self, threshold: f64) -> Self {
        self.sharpe_alert_threshold = threshold;
        self
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    /// Run the full pipeline for one interactively submitted item and
    /// wait for the result.
    pub fn submit(&self, source: &SourceLocator) -> Result<SubmitOutcome, PinerankError> {
        match self.run_item(source)? {
            ItemOutcome::Evaluated {
                item,
                results,
                score,
            } => Ok(SubmitOutcome::Completed(ItemReport {
                item,
                results,
                score,
            })),
            ItemOutcome::Skipped {
                item_id,
                duplicate_of,
            } => Ok(SubmitOutcome::Duplicate {
                item_id,
                duplicate_of,
            }),
            ItemOutcome::Failed { error, .. } => Err(error),
        }
    }

    /// Process every backlog entry that is not already terminal.
    ///
    /// `force` reprocesses regardless of recorded status, resetting
    /// failed records to pending first. Items run with bounded
    /// parallelism; the sweep itself provides no cross-item ordering.
    pub fn run_backlog(
        &self,
        backlog: &[SourceLocator],
        force: bool,
    ) -> Result<SweepSummary, PinerankError> {
        let records = self.state.load_records()?;

        let mut queue: Vec<&SourceLocator> = Vec::new();
        let mut summary = SweepSummary::default();
        for source in backlog {
            let item_id = slugify(&source.name);
            match records.get(&item_id) {
                Some(record) if record.status.is_terminal() && !force => {
                    summary.already_done += 1;
                }
                Some(record) if record.status.is_terminal() => {
                    let mut reset = record.clone();
                    reset.reset();
                    self.state.upsert_record(&reset)?;
                    queue.push(source);
                }
                _ => queue.push(source),
            }
        }

        if queue.is_empty() {
            return Ok(summary);
        }

        tracing::info!(
            items = queue.len(),
            skipped_terminal = summary.already_done,
            workers = self.workers,
            "starting sweep",
        );

        let outcomes: Vec<ItemOutcome> = if self.workers == 1 {
            queue.iter().map(|s| self.process_item(s)).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
                .map_err(|e| PinerankError::Pipeline {
                    reason: format!("failed to build worker pool: {e}"),
                })?;
            pool.install(|| queue.par_iter().map(|s| self.process_item(s)).collect())
        };

        for outcome in &outcomes {
            match outcome {
                ItemOutcome::Evaluated { .. } => summary.processed += 1,
                ItemOutcome::Skipped { .. } => summary.skipped += 1,
                ItemOutcome::Failed { item_id, error } => {
                    tracing::warn!(item = %item_id, error = %error, "item failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Send the end-of-sweep summary through the notification sink, if
    /// one is configured. Best-effort.
    pub fn notify_sweep_summary(&self, summary: &SweepSummary, elapsed_secs: f64) {
        if let Some(notifier) = &self.notifier {
            let message = alerts::sweep_summary(summary, elapsed_secs);
            if let Err(err) = notifier.notify(&message) {
                tracing::warn!(error = %err, "summary notification failed");
            }
        }
    }

    fn process_item(&self, source: &SourceLocator) -> ItemOutcome {
        match self.run_item(source) {
            Ok(outcome) => outcome,
            Err(error) => {
                // ledger write failed mid-item; the record keeps whatever
                // stage it last reached
                let item_id = slugify(&source.name);
                tracing::warn!(item = %item_id, error = %error, "pipeline aborted for item");
                ItemOutcome::Failed { item_id, error }
            }
        }
    }

    fn run_item(&self, source: &SourceLocator) -> Result<ItemOutcome, PinerankError> {
        tracing::info!(item = %source.name, category = %source.category, "processing");

        let fetched = match stage::run(Stage::Fetch, MAX_STAGE_ATTEMPTS, |_| {
            self.source.fetch(source)
        }) {
            Ok(fetched) => fetched,
            Err(error) => {
                let item_id = slugify(&source.name);
                self.record_failure(&item_id, &source.category, &error);
                return Ok(ItemOutcome::Failed { item_id, error });
            }
        };

        let item_id = fetched.item_id.clone();
        let digest = content_digest(&fetched.raw);

        // dedup check runs before the pending -> fetched transition; a
        // duplicate short-circuits to terminal skipped, which is not an
        // error and never reaches scoring
        if let HashClaim::Duplicate { owner } = self.dedup.claim(&fetched.raw, &item_id)? {
            let mut record = self.existing_or_new(&item_id, &source.category)?;
            record.content_hash = Some(digest);
            record.skip();
            self.state.upsert_record(&record)?;
            tracing::info!(item = %item_id, duplicate_of = %owner, "duplicate content, skipping");
            return Ok(ItemOutcome::Skipped {
                item_id,
                duplicate_of: owner,
            });
        }

        let item = WorkItem {
            item_id: item_id.clone(),
            category: source.category.clone(),
            content_hash: digest.clone(),
        };

        let mut record = self.existing_or_new(&item_id, &source.category)?;
        record.content_hash = Some(digest);
        record.advance(StageStatus::Fetched);
        self.state.upsert_record(&record)?;

        let strategy_text = match stage::run(Stage::Transform, MAX_STAGE_ATTEMPTS, |hint| {
            self.transformer.transform(&fetched.raw, hint)
        }) {
            Ok(text) => text,
            Err(error) => {
                record.fail(error.to_string());
                self.state.upsert_record(&record)?;
                // failure rows still reach the sinks so the bulk view
                // shows why the item produced no score
                let failures: Vec<EvaluationResult> = self
                    .instruments
                    .iter()
                    .map(|symbol| EvaluationResult::failure(symbol, error.to_string()))
                    .collect();
                self.dispatch_persistence(&item, &failures, None);
                return Ok(ItemOutcome::Failed { item_id, error });
            }
        };

        record.advance(StageStatus::Transformed);
        self.state.upsert_record(&record)?;

        // every instrument gets an attempt; individual failures become
        // inline failure results and never block the item
        let mut results = Vec::with_capacity(self.instruments.len());
        for symbol in &self.instruments {
            let result = match stage::run(Stage::Evaluate, MAX_STAGE_ATTEMPTS, |_| {
                self.evaluator.evaluate(&strategy_text, symbol)
            }) {
                Ok(result) => result,
                Err(error) => EvaluationResult::failure(symbol, error.to_string()),
            };
            results.push(result);
        }

        record.advance(StageStatus::Evaluated);
        self.state.upsert_record(&record)?;

        let score = aggregate(&results);
        self.dispatch_persistence(&item, &results, score.as_ref());
        self.dispatch_alerts(&item, &results);

        Ok(ItemOutcome::Evaluated {
            item,
            results,
            score,
        })
    }

    fn existing_or_new(
        &self,
        item_id: &str,
        category: &str,
    ) -> Result<PipelineRecord, PinerankError> {
        Ok(self
            .state
            .get_record(item_id)?
            .unwrap_or_else(|| PipelineRecord::new(item_id, category)))
    }

    /// Best-effort terminal-failure record; a ledger error here is logged
    /// rather than masking the stage error.
    fn record_failure(&self, item_id: &str, category: &str, error: &PinerankError) {
        let mut record = match self.state.get_record(item_id) {
            Ok(Some(record)) => record,
            Ok(None) => PipelineRecord::new(item_id, category),
            Err(state_err) => {
                tracing::warn!(item = %item_id, error = %state_err, "could not load record for failure");
                return;
            }
        };
        record.fail(error.to_string());
        if let Err(state_err) = self.state.upsert_record(&record) {
            tracing::warn!(item = %item_id, error = %state_err, "could not persist failure record");
        }
    }

    fn dispatch_persistence(
        &self,
        item: &WorkItem,
        results: &[EvaluationResult],
        score: Option<&CompositeScore>,
    ) {
        for sink in &self.sinks {
            if let Err(err) = sink.store(item, results, score) {
                tracing::warn!(item = %item.item_id, error = %err, "persistence sink failed");
            }
        }
    }

    fn dispatch_alerts(&self, item: &WorkItem, results: &[EvaluationResult]) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        for result in results {
            let sharpe = result
                .metrics
                .as_ref()
                .and_then(|m| m.sharpe_ratio)
                .unwrap_or(f64::NEG_INFINITY);
            if sharpe > self.sharpe_alert_threshold {
                let message = alerts::high_sharpe(&item.item_id, sharpe, &result.symbol);
                if let Err(err) = notifier.notify(&message) {
                    tracing::warn!(item = %item.item_id, error = %err, "alert delivery failed");
                }
            }
        }
    }
}
