use crate::application::recurrence::plan_instances;
use crate::domain::models::{Block, RepeatRule, SessionContext};
use crate::domain::overlap::find_overlaps;
use crate::domain::window::DayWindow;
use crate::infrastructure::block_api_client::BlockApiClient;
use crate::infrastructure::block_store::{BlockStoreAdapter, DeleteOutcome, SaveOutcome};
use crate::infrastructure::error::EngineError;
use crate::infrastructure::rule_store::RepeatRuleRepository;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// How long a transient store-failure notice stays visible.
pub const ERROR_DISPLAY_SECONDS: i64 = 5;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Outcome of a save attempt as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveDecision {
    Saved,
    /// The candidate overlaps these blocks; nothing was persisted. The
    /// caller may retry with `save_block_forced` to proceed anyway.
    Conflicts(Vec<Block>),
    /// The optimistic write failed and local state was restored.
    RolledBack { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteDecision {
    Deleted,
    RolledBack { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    pub added: usize,
    pub skipped_existing: usize,
    pub skipped_conflicts: usize,
    pub dropped_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TransientNotice {
    message: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
struct PlannerRuntime {
    blocks: HashMap<String, Block>,
    /// Absolute date per block id, fixed when the block enters the plan.
    /// `day` indices are recomputed from these on window changes; a
    /// block whose date leaves the window is parked at index
    /// `window.len()` until a later window contains it again.
    dates: HashMap<String, NaiveDate>,
    /// Per-block write version. A response only lands if the version it
    /// was issued under is still current, so a slow earlier write can
    /// never clobber a later one.
    versions: HashMap<String, u64>,
    window: DayWindow,
    rules: Vec<RepeatRule>,
    transient_error: Option<TransientNotice>,
}

/// Orchestrates the local block plan against the remote store.
///
/// Mutations apply locally first and persist in the background of the
/// caller's await: on failure the exact prior state is restored and a
/// short-lived notice is raised, on success the server's canonical row
/// replaces the optimistic one. Session context is injected at
/// construction; without a signed-in user the planner holds an empty
/// plan and never touches the store.
pub struct Planner<C, R>
where
    C: BlockApiClient,
    R: RepeatRuleRepository,
{
    store: BlockStoreAdapter<C>,
    rule_repository: Arc<R>,
    session: SessionContext,
    runtime: Mutex<PlannerRuntime>,
    expansion_in_flight: AtomicBool,
    now_provider: NowProvider,
    logs_dir: Option<PathBuf>,
    log_guard: Mutex<()>,
}

impl<C, R> Planner<C, R>
where
    C: BlockApiClient,
    R: RepeatRuleRepository,
{
    pub fn new(
        client: Arc<C>,
        rule_repository: Arc<R>,
        session: SessionContext,
        window: DayWindow,
    ) -> Self {
        Self {
            store: BlockStoreAdapter::new(client),
            rule_repository,
            session,
            runtime: Mutex::new(PlannerRuntime {
                blocks: HashMap::new(),
                dates: HashMap::new(),
                versions: HashMap::new(),
                window,
                rules: Vec::new(),
                transient_error: None,
            }),
            expansion_in_flight: AtomicBool::new(false),
            now_provider: Arc::new(Utc::now),
            logs_dir: None,
            log_guard: Mutex::new(()),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn with_logs_dir(mut self, logs_dir: PathBuf) -> Self {
        self.logs_dir = Some(logs_dir);
        self
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn lock_runtime(&self) -> Result<MutexGuard<'_, PlannerRuntime>, EngineError> {
        self.runtime
            .lock()
            .map_err(|error| EngineError::Store(format!("planner lock poisoned: {error}")))
    }

    /// Replaces the local plan with the store's view. Signed-out
    /// sessions simply clear the plan.
    pub async fn load_blocks(&self) -> Result<usize, EngineError> {
        let Some(user_id) = self.session.user_id().map(ToOwned::to_owned) else {
            let mut runtime = self.lock_runtime()?;
            runtime.blocks.clear();
            runtime.dates.clear();
            runtime.versions.clear();
            return Ok(0);
        };

        let blocks = self.store.load(&user_id).await?;
        let count = blocks.len();
        let mut runtime = self.lock_runtime()?;
        let dates: HashMap<String, NaiveDate> = blocks
            .iter()
            .filter_map(|block| {
                runtime
                    .window
                    .date_for(block.day)
                    .map(|date| (block.id.clone(), date))
            })
            .collect();
        runtime.dates = dates;
        runtime.blocks = blocks
            .into_iter()
            .map(|block| (block.id.clone(), block))
            .collect();
        runtime.versions.clear();
        self.log_info("load_blocks", &format!("loaded {count} blocks"));
        Ok(count)
    }

    pub fn load_rules(&self) -> Result<usize, EngineError> {
        let rules = self.rule_repository.load()?;
        let count = rules.len();
        let mut runtime = self.lock_runtime()?;
        runtime.rules = rules;
        Ok(count)
    }

    pub fn rules(&self) -> Result<Vec<RepeatRule>, EngineError> {
        Ok(self.lock_runtime()?.rules.clone())
    }

    pub fn create_rule(&self, rule: RepeatRule) -> Result<(), EngineError> {
        rule.validate().map_err(EngineError::InvalidInput)?;
        let mut runtime = self.lock_runtime()?;
        runtime.rules.retain(|existing| existing.id != rule.id);
        runtime.rules.push(rule);
        self.rule_repository.save_all(&runtime.rules)?;
        Ok(())
    }

    pub fn delete_rule(&self, rule_id: &str) -> Result<bool, EngineError> {
        let mut runtime = self.lock_runtime()?;
        let before = runtime.rules.len();
        runtime.rules.retain(|rule| rule.id != rule_id);
        let removed = runtime.rules.len() != before;
        if removed {
            self.rule_repository.save_all(&runtime.rules)?;
        }
        Ok(removed)
    }

    pub fn window(&self) -> Result<DayWindow, EngineError> {
        Ok(self.lock_runtime()?.window.clone())
    }

    /// Switches the visible window, re-deriving every block's day index
    /// from its calendar date. Blocks whose date falls outside the new
    /// window are parked at index `window.len()`, leaving the visible
    /// set (and both overlap gates) until a later window contains their
    /// date again.
    pub fn set_window(&self, window: DayWindow) -> Result<(), EngineError> {
        let mut runtime = self.lock_runtime()?;
        let ids: Vec<String> = runtime.blocks.keys().cloned().collect();
        for id in ids {
            let date = runtime.dates.get(&id).copied();
            let Some(date) = date else {
                continue;
            };
            if let Some(block) = runtime.blocks.get_mut(&id) {
                block.day = window.day_for(date).unwrap_or(window.len());
            }
        }
        runtime.window = window;
        Ok(())
    }

    /// Blocks inside the current window, ordered by day then start.
    pub fn visible_blocks(&self) -> Result<Vec<Block>, EngineError> {
        let runtime = self.lock_runtime()?;
        let window_len = runtime.window.len();
        let mut blocks: Vec<Block> = runtime
            .blocks
            .values()
            .filter(|block| block.day < window_len)
            .cloned()
            .collect();
        blocks.sort_by(|a, b| {
            a.day
                .cmp(&b.day)
                .then(a.start_time.total_cmp(&b.start_time))
                .then(a.id.cmp(&b.id))
        });
        Ok(blocks)
    }

    /// The active store-failure notice, if it has not yet expired.
    pub fn current_error(&self) -> Result<Option<String>, EngineError> {
        let now = (self.now_provider)();
        let mut runtime = self.lock_runtime()?;
        match &runtime.transient_error {
            Some(notice) if notice.expires_at > now => Ok(Some(notice.message.clone())),
            Some(_) => {
                runtime.transient_error = None;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Validates and saves a block, gated on overlaps. Conflicting
    /// blocks are returned without persisting anything.
    pub async fn save_block(&self, block: Block) -> Result<SaveDecision, EngineError> {
        block.validate().map_err(EngineError::InvalidInput)?;
        let conflicts = {
            let visible = self.visible_blocks()?;
            find_overlaps(&visible, &block)
        };
        if !conflicts.is_empty() {
            return Ok(SaveDecision::Conflicts(conflicts));
        }
        self.persist_block(block).await
    }

    /// Saves despite known overlaps, after the caller has confirmed.
    pub async fn save_block_forced(&self, block: Block) -> Result<SaveDecision, EngineError> {
        block.validate().map_err(EngineError::InvalidInput)?;
        self.persist_block(block).await
    }

    async fn persist_block(&self, block: Block) -> Result<SaveDecision, EngineError> {
        let Some(user_id) = self.session.user_id().map(ToOwned::to_owned) else {
            return Err(EngineError::InvalidInput(
                "cannot save without a signed-in user".to_string(),
            ));
        };

        let block_id = block.id.clone();
        let (snapshot, prior_date, version) = {
            let mut runtime = self.lock_runtime()?;
            let date = runtime.window.date_for(block.day);
            let snapshot = runtime.blocks.insert(block_id.clone(), block.clone());
            let prior_date = match date {
                Some(date) => runtime.dates.insert(block_id.clone(), date),
                None => runtime.dates.remove(&block_id),
            };
            let version = runtime
                .versions
                .entry(block_id.clone())
                .and_modify(|v| *v += 1)
                .or_insert(1);
            (snapshot, prior_date, *version)
        };

        match self.store.save(&block, &user_id).await {
            Ok(SaveOutcome::Saved { canonical }) => {
                let mut runtime = self.lock_runtime()?;
                if runtime.versions.get(&block_id) == Some(&version) {
                    if let Some(canonical) = canonical {
                        runtime.blocks.insert(block_id.clone(), canonical);
                    }
                }
                drop(runtime);
                self.log_info("save_block", &format!("saved block_id={block_id}"));
                Ok(SaveDecision::Saved)
            }
            Ok(SaveOutcome::Failed { reason }) => {
                self.rollback_block(&block_id, snapshot, prior_date, version, "Failed to save block. Please try again.")?;
                self.log_error("save_block", &reason);
                Ok(SaveDecision::RolledBack { reason })
            }
            Err(error) => {
                self.rollback_block(&block_id, snapshot, prior_date, version, "Failed to save block. Please try again.")?;
                self.log_error("save_block", &error.to_string());
                Err(error)
            }
        }
    }

    /// Removes a block optimistically; a failed delete restores it.
    pub async fn delete_block(&self, block_id: &str) -> Result<DeleteDecision, EngineError> {
        let Some(user_id) = self.session.user_id().map(ToOwned::to_owned) else {
            return Err(EngineError::InvalidInput(
                "cannot delete without a signed-in user".to_string(),
            ));
        };

        let (snapshot, prior_date, version) = {
            let mut runtime = self.lock_runtime()?;
            let snapshot = runtime.blocks.remove(block_id);
            let prior_date = runtime.dates.remove(block_id);
            let version = runtime
                .versions
                .entry(block_id.to_string())
                .and_modify(|v| *v += 1)
                .or_insert(1);
            (snapshot, prior_date, *version)
        };

        match self.store.delete(block_id, &user_id).await {
            Ok(DeleteOutcome::Deleted { rows_affected }) => {
                self.log_info(
                    "delete_block",
                    &format!("deleted block_id={block_id} rows_affected={rows_affected}"),
                );
                Ok(DeleteDecision::Deleted)
            }
            Ok(DeleteOutcome::Failed { reason }) => {
                self.rollback_block(block_id, snapshot, prior_date, version, "Failed to delete block. Please try again.")?;
                self.log_error("delete_block", &reason);
                Ok(DeleteDecision::RolledBack { reason })
            }
            Err(error) => {
                self.rollback_block(block_id, snapshot, prior_date, version, "Failed to delete block. Please try again.")?;
                self.log_error("delete_block", &error.to_string());
                Err(error)
            }
        }
    }

    fn rollback_block(
        &self,
        block_id: &str,
        snapshot: Option<Block>,
        prior_date: Option<NaiveDate>,
        version: u64,
        notice: &str,
    ) -> Result<(), EngineError> {
        let mut runtime = self.lock_runtime()?;
        // A later write already owns this block; leave its state alone.
        if runtime.versions.get(block_id) != Some(&version) {
            return Ok(());
        }
        match snapshot {
            Some(previous) => {
                runtime.blocks.insert(block_id.to_string(), previous);
            }
            None => {
                runtime.blocks.remove(block_id);
            }
        }
        match prior_date {
            Some(date) => {
                runtime.dates.insert(block_id.to_string(), date);
            }
            None => {
                runtime.dates.remove(block_id);
            }
        }
        runtime.transient_error = Some(TransientNotice {
            message: notice.to_string(),
            expires_at: (self.now_provider)() + Duration::seconds(ERROR_DISPLAY_SECONDS),
        });
        Ok(())
    }

    /// Runs one recurrence expansion pass over the current window.
    ///
    /// Returns `None` when a pass is already in flight; the concurrent
    /// trigger is dropped rather than queued. Candidates that fail to
    /// persist are dropped from this pass and will be retried by the
    /// next one, since the plan is recomputed from scratch each time.
    pub async fn expand_recurrences(&self) -> Result<Option<ExpansionReport>, EngineError> {
        if self
            .expansion_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.log_info("expand_recurrences", "pass already in flight, dropped");
            return Ok(None);
        }
        let _latch = LatchGuard(&self.expansion_in_flight);

        let Some(user_id) = self.session.user_id().map(ToOwned::to_owned) else {
            return Ok(Some(ExpansionReport::default()));
        };

        let plan = {
            let runtime = self.lock_runtime()?;
            let existing: Vec<Block> = runtime.blocks.values().cloned().collect();
            plan_instances(&runtime.window, &runtime.rules, &existing)
        };

        let mut report = ExpansionReport {
            added: 0,
            skipped_existing: plan.skipped_existing,
            skipped_conflicts: plan.skipped_conflicts,
            dropped_failures: 0,
        };

        for candidate in plan.candidates {
            let candidate_id = candidate.id.clone();
            match self.store.save(&candidate, &user_id).await {
                Ok(SaveOutcome::Saved { canonical }) => {
                    let mut runtime = self.lock_runtime()?;
                    if let Some(date) = runtime.window.date_for(candidate.day) {
                        runtime.dates.insert(candidate_id.clone(), date);
                    }
                    runtime
                        .blocks
                        .insert(candidate_id, canonical.unwrap_or(candidate));
                    report.added += 1;
                }
                Ok(SaveOutcome::Failed { reason }) => {
                    self.log_error(
                        "expand_recurrences",
                        &format!("dropped instance {candidate_id}: {reason}"),
                    );
                    report.dropped_failures += 1;
                }
                Err(error) => {
                    self.log_error("expand_recurrences", &error.to_string());
                    return Err(error);
                }
            }
        }

        self.log_info(
            "expand_recurrences",
            &format!(
                "added={} skipped_existing={} skipped_conflicts={} dropped={}",
                report.added,
                report.skipped_existing,
                report.skipped_conflicts,
                report.dropped_failures
            ),
        );
        Ok(Some(report))
    }

    pub fn log_info(&self, operation: &str, message: &str) {
        self.append_log("info", operation, message);
    }

    pub fn log_error(&self, operation: &str, message: &str) {
        self.append_log("error", operation, message);
    }

    fn append_log(&self, level: &str, operation: &str, message: &str) {
        let Some(logs_dir) = self.logs_dir.as_ref() else {
            return;
        };
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = logs_dir.join("engine.log");
        let payload = serde_json::json!({
            "timestamp": (self.now_provider)().to_rfc3339(),
            "level": level,
            "operation": operation,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

struct LatchGuard<'a>(&'a AtomicBool);

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
