//! Plan execution.
//!
//! The executor walks an [`InstallationPlan`] in order, runs the remaining
//! steps of each `apply` entry and records every step in the progress
//! record before moving on, so an interrupted run resumes at the first
//! step that did not complete.
//!
//! With one job, entries run strictly in plan (resolver) order. With more,
//! plugins on the same dependency level run on scoped threads and levels run
//! one after another.

pub mod command;
mod steps;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use plinth_manifest::{Manifest, Step};
use serde::Serialize;

use crate::config::DEFAULT_STEP_TIMEOUT_SECS;
use crate::layout::TargetLayout;
use crate::plan::{InstallationPlan, PlanAction, PlanEntry};
use crate::progress::{PluginStatus, ProgressTracker, StepStatus};
use crate::render;
use crate::{Error, Result};

use steps::StepContext;

/// Shared cancellation signal, checked between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one plugin during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum OutcomeKind {
    /// Steps ran and all succeeded.
    Completed,
    /// Already installed; nothing ran.
    Skipped,
    Failed { step: usize, message: String },
    /// A dependency did not complete.
    Blocked { by: String },
    /// Cancelled before finishing.
    Interrupted,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Skipped => f.write_str("skipped"),
            Self::Failed { step, message } => write!(f, "failed at step {step}: {message}"),
            Self::Blocked { by } => write!(f, "blocked by '{by}'"),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginOutcome {
    pub plugin_id: String,
    #[serde(flatten)]
    pub kind: OutcomeKind,
}

impl PluginOutcome {
    /// The plugin ends the run installed.
    pub fn is_satisfied(&self) -> bool {
        matches!(self.kind, OutcomeKind::Completed | OutcomeKind::Skipped)
    }
}

/// Summary of one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// One outcome per plan entry, in plan order.
    pub outcomes: Vec<PluginOutcome>,
    pub warnings: Vec<String>,
    /// Steps attempted
    pub steps_executed: usize,
    /// Steps that changed the target
    pub mutations: usize,
}

impl RunResult {
    pub fn outcome(&self, plugin_id: &str) -> Option<&OutcomeKind> {
        self.outcomes
            .iter()
            .find(|o| o.plugin_id == plugin_id)
            .map(|o| &o.kind)
    }

    /// Every plugin ended installed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(PluginOutcome::is_satisfied)
    }

    pub fn was_interrupted(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.kind == OutcomeKind::Interrupted)
    }

    pub fn failed(&self) -> impl Iterator<Item = &PluginOutcome> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_satisfied() && o.kind != OutcomeKind::Interrupted)
    }
}

/// Result of running a single plan entry.
struct EntryRun {
    kind: OutcomeKind,
    warnings: Vec<String>,
    steps_executed: usize,
    mutations: usize,
}

impl EntryRun {
    fn new(kind: OutcomeKind) -> Self {
        Self {
            kind,
            warnings: Vec::new(),
            steps_executed: 0,
            mutations: 0,
        }
    }
}

type SharedTracker<'t> = Mutex<&'t mut ProgressTracker>;

fn lock<'g, 't>(tracker: &'g SharedTracker<'t>) -> MutexGuard<'g, &'t mut ProgressTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs installation plans against one target.
pub struct Executor<'a> {
    layout: TargetLayout,
    manifest: &'a Manifest,
    step_timeout: Duration,
    jobs: usize,
    cancel: CancelFlag,
}

impl<'a> Executor<'a> {
    pub fn new(root: impl Into<std::path::PathBuf>, manifest: &'a Manifest) -> Self {
        Self {
            layout: TargetLayout::new(root),
            manifest,
            step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            jobs: 1,
            cancel: CancelFlag::default(),
        }
    }

    /// Default timeout of run-command steps without their own.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Number of plugins of one level that may run concurrently.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute `plan`, recording progress in `tracker`.
    ///
    /// Step failures are reported per plugin in the [`RunResult`]. An error
    /// is returned only when progress can no longer be recorded.
    pub fn execute(&self, plan: &InstallationPlan, tracker: &mut ProgressTracker) -> Result<RunResult> {
        let tracker: SharedTracker<'_> = Mutex::new(tracker);
        let mut finished: BTreeMap<String, EntryRun> = BTreeMap::new();

        if self.jobs <= 1 {
            for entry in &plan.entries {
                if self.admit(entry, &tracker, &mut finished)? {
                    let run = self.run_entry(entry, &tracker)?;
                    finished.insert(entry.plugin_id.clone(), run);
                }
            }
        } else {
            for level in plan.levels() {
                let mut pending = Vec::new();
                for entry in level {
                    if self.admit(entry, &tracker, &mut finished)? {
                        pending.push(entry);
                    }
                }
                for batch in pending.chunks(self.jobs) {
                    for (entry, run) in batch.iter().zip(self.run_batch(batch, &tracker)) {
                        finished.insert(entry.plugin_id.clone(), run?);
                    }
                }
            }
        }

        let mut result = RunResult::default();
        result.warnings.extend(plan.warnings.iter().cloned());
        for entry in &plan.entries {
            if let Some(run) = finished.remove(&entry.plugin_id) {
                result.steps_executed += run.steps_executed;
                result.mutations += run.mutations;
                result.warnings.extend(run.warnings);
                result.outcomes.push(PluginOutcome {
                    plugin_id: entry.plugin_id.clone(),
                    kind: run.kind,
                });
            }
        }
        tracing::info!(
            plugins = result.outcomes.len(),
            steps = result.steps_executed,
            mutations = result.mutations,
            "run finished"
        );
        Ok(result)
    }

    /// Decide whether `entry` may run. Entries that may not are recorded in
    /// `finished` as interrupted or blocked and registered for resume.
    fn admit(
        &self,
        entry: &PlanEntry,
        tracker: &SharedTracker<'_>,
        finished: &mut BTreeMap<String, EntryRun>,
    ) -> Result<bool> {
        let kind = if self.cancel.is_cancelled() {
            OutcomeKind::Interrupted
        } else if let Some(by) = self.blocker(entry, finished) {
            tracing::warn!(plugin = %entry.plugin_id, %by, "dependency did not complete, skipping");
            OutcomeKind::Blocked { by }
        } else {
            return Ok(true);
        };
        self.register(entry, tracker)?;
        finished.insert(entry.plugin_id.clone(), EntryRun::new(kind));
        Ok(false)
    }

    /// Run sibling entries on scoped threads, one per entry.
    fn run_batch(&self, batch: &[&PlanEntry], tracker: &SharedTracker<'_>) -> Vec<Result<EntryRun>> {
        if let [entry] = batch {
            return vec![self.run_entry(entry, tracker)];
        }
        std::thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|entry| scope.spawn(move || self.run_entry(entry, tracker)))
                .collect();
            handles
                .into_iter()
                .zip(batch.iter())
                .map(|(handle, entry)| {
                    handle.join().unwrap_or_else(|_| {
                        Ok(EntryRun::new(OutcomeKind::Failed {
                            step: 0,
                            message: format!("worker for '{}' panicked", entry.plugin_id),
                        }))
                    })
                })
                .collect()
        })
    }

    /// First dependency of `entry` that is in the plan and did not end installed.
    fn blocker(&self, entry: &PlanEntry, finished: &BTreeMap<String, EntryRun>) -> Option<String> {
        let plugin = self.manifest.get(&entry.plugin_id)?;
        plugin
            .dependencies
            .iter()
            .find(|dep| {
                finished
                    .get(dep.as_str())
                    .is_some_and(|run| !matches!(run.kind, OutcomeKind::Completed | OutcomeKind::Skipped))
            })
            .cloned()
    }

    /// Put a plugin that will not run into the record so a resume picks it up.
    fn register(&self, entry: &PlanEntry, tracker: &SharedTracker<'_>) -> Result<()> {
        let Some(plugin) = self.manifest.get(&entry.plugin_id) else {
            return Ok(());
        };
        let mut tracker = lock(tracker);
        tracker.prepare_plugin(
            &entry.plugin_id,
            &plugin.definition_checksum(),
            &entry.options,
            entry.requested,
        )?;
        tracker.persist()
    }

    fn run_entry(&self, entry: &PlanEntry, tracker: &SharedTracker<'_>) -> Result<EntryRun> {
        let id = entry.plugin_id.as_str();
        let plugin = self.manifest.get(id).ok_or_else(|| Error::Step {
            plugin: id.to_string(),
            step: 0,
            message: "plugin is not in the catalog".to_string(),
        })?;
        let total = plugin.steps.len();

        let completed = {
            let mut t = lock(tracker);
            t.prepare_plugin(id, &plugin.definition_checksum(), &entry.options, entry.requested)?;

            if entry.action == PlanAction::Skip {
                if t.record().status(id) != PluginStatus::Complete {
                    t.begin(id)?;
                    t.record_all_steps(id, total);
                    t.record_plugin(id, PluginStatus::Complete)?;
                    t.persist()?;
                }
                tracing::info!(plugin = id, "already installed");
                return Ok(EntryRun::new(OutcomeKind::Skipped));
            }

            // Recorded complete but detected otherwise: the target drifted.
            if t.record().status(id) == PluginStatus::Complete {
                t.reset(id)?;
            }
            t.begin(id)?;
            t.persist()?;
            t.record()
                .get(id)
                .map(|p| p.completed_steps.clone())
                .unwrap_or_default()
        };

        tracing::info!(plugin = id, steps = total, resumed = completed.len(), "installing");
        let ctx = StepContext {
            layout: &self.layout,
            manifest: self.manifest,
            plugin,
            options: &entry.options,
            values: render::values(plugin, &entry.options),
            default_timeout: self.step_timeout,
        };
        let mut run = EntryRun::new(OutcomeKind::Completed);

        for (index, step) in plugin.steps.iter().enumerate() {
            if completed.contains(&index) {
                continue;
            }
            if self.cancel.is_cancelled() {
                tracing::warn!(plugin = id, step = index, "cancelled");
                run.kind = OutcomeKind::Interrupted;
                return Ok(run);
            }

            let recorded = match step {
                Step::CopyFile(copy) => lock(tracker)
                    .recorded_checksum(&copy.destination)
                    .map(str::to_string),
                _ => None,
            };
            run.steps_executed += 1;
            let applied = ctx.apply(index, step, recorded.as_deref());

            let mut t = lock(tracker);
            match applied {
                Ok(effect) => {
                    if effect.mutated {
                        run.mutations += 1;
                    }
                    if let Some((destination, checksum)) = effect.checksum {
                        t.record_file_checksum(id, &destination, checksum);
                    }
                    if let Some(warning) = effect.warning {
                        t.add_warning(id, warning.clone());
                        run.warnings.push(warning);
                    }
                    t.record_step(id, index, StepStatus::Complete)?;
                    t.persist()?;
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!(plugin = id, step = index, error = %message, "step failed");
                    t.record_step(id, index, StepStatus::Failed(message.clone()))?;
                    t.persist()?;
                    run.kind = OutcomeKind::Failed {
                        step: index,
                        message,
                    };
                    return Ok(run);
                }
            }
        }

        let mut t = lock(tracker);
        t.record_plugin(id, PluginStatus::Complete)?;
        t.persist()?;
        tracing::info!(plugin = id, "installed");
        Ok(run)
    }
}
