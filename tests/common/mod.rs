#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use pinerank::domain::dedup::HashClaim;
use pinerank::domain::error::PinerankError;
use pinerank::domain::evaluation::{EvaluationResult, InstrumentMetrics};
use pinerank::domain::record::PipelineRecord;
use pinerank::domain::work_item::{FetchedSource, SourceLocator, WorkItem, slugify};
use pinerank::domain::score::CompositeScore;
use pinerank::ports::evaluate_port::EvaluatePort;
use pinerank::ports::sink_port::{NotifyPort, PersistencePort};
use pinerank::ports::source_port::SourcePort;
use pinerank::ports::state_port::StatePort;
use pinerank::ports::transform_port::TransformPort;

/// In-memory state port for pipeline tests.
#[derive(Default)]
pub struct MemoryState {
    records: Mutex<HashMap<String, PipelineRecord>>,
    hashes: Mutex<HashMap<String, String>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatePort for MemoryState {
    fn load_records(&self) -> Result<HashMap<String, PipelineRecord>, PinerankError> {
        Ok(self.records.lock().unwrap().clone())
    }

    fn get_record(&self, item_id: &str) -> Result<Option<PipelineRecord>, PinerankError> {
        Ok(self.records.lock().unwrap().get(item_id).cloned())
    }

    fn upsert_record(&self, record: &PipelineRecord) -> Result<(), PinerankError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.item_id.clone(), record.clone());
        Ok(())
    }

    fn lookup_hash(&self, content_hash: &str) -> Result<Option<String>, PinerankError> {
        Ok(self.hashes.lock().unwrap().get(content_hash).cloned())
    }

    fn claim_hash(&self, content_hash: &str, item_id: &str) -> Result<HashClaim, PinerankError> {
        let mut hashes = self.hashes.lock().unwrap();
        match hashes.get(content_hash) {
            None => {
                hashes.insert(content_hash.to_string(), item_id.to_string());
                Ok(HashClaim::Claimed)
            }
            Some(owner) if owner == item_id => Ok(HashClaim::Owned),
            Some(owner) => Ok(HashClaim::Duplicate {
                owner: owner.clone(),
            }),
        }
    }
}

/// Source port serving canned scripts keyed by locator.
#[derive(Default)]
pub struct MockSourcePort {
    scripts: HashMap<String, String>,
    fetch_calls: AtomicUsize,
}

impl MockSourcePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, locator: &str, raw: &str) -> Self {
        self.scripts.insert(locator.to_string(), raw.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl SourcePort for MockSourcePort {
    fn fetch(&self, source: &SourceLocator) -> Result<FetchedSource, PinerankError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(&source.locator) {
            Some(raw) => Ok(FetchedSource {
                item_id: slugify(&source.name),
                name: source.name.clone(),
                raw: raw.clone(),
            }),
            None => Err(PinerankError::SourceNotFound {
                locator: source.locator.clone(),
            }),
        }
    }
}

/// Transform port with a programmable failure budget; records the
/// feedback hint it was given on each call.
pub struct MockTransformPort {
    output: String,
    fail_first: usize,
    always_fail: bool,
    pub hints: Mutex<Vec<Option<String>>>,
}

impl MockTransformPort {
    pub fn new(output: &str) -> Self {
        Self {
            output: output.to_string(),
            fail_first: 0,
            always_fail: false,
            hints: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(mut self, attempts: usize) -> Self {
        self.fail_first = attempts;
        self
    }

    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.hints.lock().unwrap().len()
    }
}

impl TransformPort for MockTransformPort {
    fn transform(
        &self,
        _raw_source: &str,
        previous_error: Option<&str>,
    ) -> Result<String, PinerankError> {
        let mut hints = self.hints.lock().unwrap();
        hints.push(previous_error.map(str::to_string));
        let call_no = hints.len();
        if self.always_fail || call_no <= self.fail_first {
            Err(PinerankError::Transform {
                reason: format!("conversion error {call_no}"),
            })
        } else {
            Ok(self.output.clone())
        }
    }
}

/// Evaluate port returning fixed metrics, with per-symbol overrides for
/// simulator-recorded failures and transport errors.
#[derive(Default)]
pub struct MockEvaluatePort {
    simulator_errors: HashSet<String>,
    transport_errors: HashSet<String>,
    metrics: HashMap<String, InstrumentMetrics>,
    eval_calls: AtomicUsize,
}

impl MockEvaluatePort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulator reports a recorded error for this symbol.
    pub fn with_simulator_error(mut self, symbol: &str) -> Self {
        self.simulator_errors.insert(symbol.to_string());
        self
    }

    /// The evaluation service itself is unreachable for this symbol.
    pub fn with_transport_error(mut self, symbol: &str) -> Self {
        self.transport_errors.insert(symbol.to_string());
        self
    }

    pub fn with_metrics(mut self, symbol: &str, metrics: InstrumentMetrics) -> Self {
        self.metrics.insert(symbol.to_string(), metrics);
        self
    }

    pub fn evaluations(&self) -> usize {
        self.eval_calls.load(Ordering::SeqCst)
    }
}

pub fn default_metrics() -> InstrumentMetrics {
    InstrumentMetrics {
        roi_pct: Some(10.0),
        max_drawdown_pct: Some(-8.0),
        sharpe_ratio: Some(1.5),
        sortino_ratio: Some(1.8),
        win_rate_pct: Some(60.0),
        profit_factor: Some(2.0),
        expectancy_pct: Some(1.0),
        num_trades: Some(12),
    }
}

impl EvaluatePort for MockEvaluatePort {
    fn evaluate(
        &self,
        _strategy_text: &str,
        symbol: &str,
    ) -> Result<EvaluationResult, PinerankError> {
        self.eval_calls.fetch_add(1, Ordering::SeqCst);
        if self.transport_errors.contains(symbol) {
            return Err(PinerankError::Evaluation {
                symbol: symbol.into(),
                reason: "evaluation service unreachable".into(),
            });
        }
        if self.simulator_errors.contains(symbol) {
            return Ok(EvaluationResult::failure(symbol, "insufficient data"));
        }
        let metrics = self
            .metrics
            .get(symbol)
            .cloned()
            .unwrap_or_else(default_metrics);
        Ok(EvaluationResult::success(symbol, metrics))
    }
}

pub struct StoredCall {
    pub item_id: String,
    pub category: String,
    pub results: Vec<EvaluationResult>,
    pub score: Option<f64>,
}

/// Persistence sink that records what it was handed.
#[derive(Default)]
pub struct RecordingSink {
    pub stored: Mutex<Vec<StoredCall>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            stored: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

impl PersistencePort for RecordingSink {
    fn store(
        &self,
        item: &WorkItem,
        results: &[EvaluationResult],
        score: Option<&CompositeScore>,
    ) -> Result<(), PinerankError> {
        if self.fail {
            return Err(PinerankError::Sync {
                reason: "sink offline".into(),
            });
        }
        self.stored.lock().unwrap().push(StoredCall {
            item_id: item.item_id.clone(),
            category: item.category.clone(),
            results: results.to_vec(),
            score: score.map(|s| s.rounded()),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

impl NotifyPort for RecordingNotifier {
    fn notify(&self, message: &str) -> Result<(), PinerankError> {
        if self.fail {
            return Err(PinerankError::Notify {
                reason: "bot offline".into(),
            });
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Backlog entry whose locator doubles as its name.
pub fn backlog_entry(name: &str, category: &str) -> SourceLocator {
    SourceLocator::new(name, name, category)
}
