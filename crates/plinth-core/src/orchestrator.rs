//! Top-level operations on one target repository.
//!
//! [`Orchestrator`] owns the catalog and settings for a target and exposes
//! `plan`, `install`, `resume` and `status`. Everything that can be rejected
//! (unknown plugins, cycles, bad options, conflicts) is rejected while
//! planning, before the run lock is taken and before any mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use plinth_manifest::{
    Manifest, OptionAssignment, Plugin, Prompter, check_assignments, parse_assignments,
    resolve_options,
};
use plinth_fs::RunLock;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Settings;
use crate::conflict;
use crate::detector::{DetectedState, Detector};
use crate::executor::{CancelFlag, Executor, RunResult};
use crate::layout::TargetLayout;
use crate::plan::{InstallationPlan, PlanAction, PlanEntry};
use crate::progress::{FailureInfo, PluginStatus, ProgressRecord, ProgressTracker};
use crate::resolver::DependencyGraph;
use crate::{Error, Result};

/// Parameters of an `install` run.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub plugins: Vec<String>,
    /// Raw `name=value` or `plugin.name=value` assignments
    pub options: Vec<String>,
    /// Re-run every step of the named plugins even when they are detected
    /// as installed
    pub force: bool,
    pub dry_run: bool,
    /// Overrides the `jobs` setting
    pub jobs: Option<usize>,
    /// Overrides the `step_timeout_secs` setting
    pub step_timeout: Option<Duration>,
}

impl InstallRequest {
    pub fn new<S: Into<String>>(plugins: impl IntoIterator<Item = S>) -> Self {
        Self {
            plugins: plugins.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn option(mut self, assignment: impl Into<String>) -> Self {
        self.options.push(assignment.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }
}

/// Parameters of a `resume` run.
#[derive(Debug, Clone, Default)]
pub struct ResumeRequest {
    pub dry_run: bool,
    pub jobs: Option<usize>,
    pub step_timeout: Option<Duration>,
}

/// Plan and, unless it was a dry run, the execution result.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub plan: InstallationPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
}

impl RunReport {
    pub fn is_dry_run(&self) -> bool {
        self.result.is_none()
    }

    /// Every planned plugin ended installed (trivially true for dry runs).
    pub fn is_success(&self) -> bool {
        self.result.as_ref().is_none_or(RunResult::is_success)
    }
}

/// One row of `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub plugin_id: String,
    pub status: PluginStatus,
    /// `None` when the plugin is no longer in the catalog
    pub detected: Option<DetectedState>,
    pub completed_steps: usize,
    pub total_steps: Option<usize>,
    /// The recorded definition differs from the catalog
    pub definition_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureInfo>,
    pub warnings: Vec<String>,
}

/// Plugins to plan and which of them count as explicitly requested.
struct PlanInput<'r> {
    roots: &'r [String],
    requested: BTreeSet<String>,
    assignments: Vec<OptionAssignment>,
    force: bool,
    prompt: bool,
}

/// Runs plinth operations against one target repository.
pub struct Orchestrator {
    layout: TargetLayout,
    manifest: Manifest,
    settings: Settings,
    cancel: CancelFlag,
    prompter: Option<Box<dyn Prompter>>,
    probe_timeout: Option<Duration>,
}

impl Orchestrator {
    /// Create an orchestrator for the target at `root`.
    ///
    /// # Errors
    ///
    /// [`Error::Fs`] if `root` does not exist.
    pub fn new(root: impl AsRef<Path>, manifest: Manifest, settings: Settings) -> Result<Self> {
        let root = root.as_ref();
        let root = dunce::canonicalize(root).map_err(|e| plinth_fs::Error::io(root, e))?;
        tracing::debug!(root = %root.display(), manifest = manifest.source(), "opening target");
        Ok(Self {
            layout: TargetLayout::new(root),
            manifest,
            settings,
            cancel: CancelFlag::default(),
            prompter: None,
            probe_timeout: None,
        })
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Ask `prompter` for `ask_user` options without an explicit value.
    pub fn with_prompter(mut self, prompter: Box<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn detector(&self) -> Detector<'_> {
        let detector = Detector::new(self.layout.root(), &self.manifest);
        match self.probe_timeout {
            Some(timeout) => detector.with_probe_timeout(timeout),
            None => detector,
        }
    }

    /// Build the plan for `request` without mutating anything.
    pub fn plan(&self, request: &InstallRequest) -> Result<InstallationPlan> {
        let tracker = ProgressTracker::load(self.layout.root())?;
        self.plan_install(request, tracker.record())
    }

    fn plan_install(&self, request: &InstallRequest, record: &ProgressRecord) -> Result<InstallationPlan> {
        let assignments =
            parse_assignments(&request.options).map_err(|problems| Error::Options { problems })?;
        let input = PlanInput {
            roots: &request.plugins,
            requested: request.plugins.iter().cloned().collect(),
            assignments,
            force: request.force,
            prompt: true,
        };
        self.build_plan(&input, record)
    }

    fn build_plan(&self, input: &PlanInput<'_>, record: &ProgressRecord) -> Result<InstallationPlan> {
        let graph = DependencyGraph::closure(&self.manifest, input.roots)?;
        let order = graph.topological_order()?;
        let levels = graph.levels(&order);

        let planned: Vec<&Plugin> = order
            .iter()
            .filter_map(|id| self.manifest.get(id))
            .collect();

        let mut problems = check_assignments(&input.assignments, &planned);
        let prompter = self.prompter.as_deref().filter(|_| input.prompt);
        let mut resolved = BTreeMap::new();
        for plugin in &planned {
            let recorded = record.get(&plugin.id).map(|p| &p.options);
            match resolve_options(plugin, &input.assignments, recorded, prompter) {
                Ok(options) => {
                    resolved.insert(plugin.id.as_str(), options);
                }
                Err(found) => problems.extend(found),
            }
        }
        if !problems.is_empty() {
            return Err(Error::Options { problems });
        }

        let detector = self.detector();
        let mut plan = InstallationPlan::default();
        for plugin in planned {
            let options = resolved.remove(plugin.id.as_str()).unwrap_or_default();
            let progress = record.get(&plugin.id);
            let detection = detector.detect(plugin, &options, progress);
            plan.warnings.extend(detection.warnings);

            // Force only applies to plugins named on the command line;
            // dependencies keep their recorded state.
            let requested = input.requested.contains(&plugin.id);
            let forced = input.force && requested;
            let action = if forced || detection.state != DetectedState::Installed {
                PlanAction::Apply
            } else {
                PlanAction::Skip
            };
            let total_steps = plugin.steps.len();
            let checksum = plugin.definition_checksum();
            let start_step = match progress {
                Some(p)
                    if !forced
                        && action == PlanAction::Apply
                        && p.status != PluginStatus::Complete
                        && !p.is_stale(&checksum, &options) =>
                {
                    p.next_step(total_steps).unwrap_or(total_steps)
                }
                _ => 0,
            };

            tracing::debug!(plugin = %plugin.id, state = %detection.state, %action, start_step, "planned");
            plan.entries.push(PlanEntry {
                plugin_id: plugin.id.clone(),
                action,
                state: detection.state,
                options,
                requested,
                level: levels.get(&plugin.id).copied().unwrap_or(0),
                start_step,
                total_steps,
            });
        }

        plan.conflicts = conflict::check(&plan, &self.manifest);
        Ok(plan)
    }

    /// Plan and install the requested plugins.
    ///
    /// # Errors
    ///
    /// Validation-class errors and [`Error::LockContention`] are returned
    /// before anything is mutated. Step failures are not errors; they are
    /// reported in the [`RunResult`].
    pub fn install(&self, request: &InstallRequest) -> Result<RunReport> {
        let before = ProgressTracker::load(self.layout.root())?;
        let plan = self.plan_install(request, before.record())?;
        self.run(plan, request.dry_run, request.force, request.jobs, request.step_timeout)
    }

    /// Continue every plugin of the progress record that has not completed,
    /// with the options it was recorded with.
    pub fn resume(&self, request: &ResumeRequest) -> Result<RunReport> {
        let tracker = ProgressTracker::load(self.layout.root())?;
        let record = tracker.record();
        let roots: Vec<String> = record.pending().into_iter().map(str::to_string).collect();
        if roots.is_empty() {
            tracing::info!("nothing to resume");
            return Ok(RunReport {
                plan: InstallationPlan::default(),
                result: (!request.dry_run).then(RunResult::default),
            });
        }

        let input = PlanInput {
            roots: &roots,
            requested: roots
                .iter()
                .filter(|id| record.get(id).is_some_and(|p| p.requested))
                .cloned()
                .collect(),
            assignments: Vec::new(),
            force: false,
            prompt: false,
        };
        let plan = self.build_plan(&input, record)?;
        self.run(plan, request.dry_run, false, request.jobs, request.step_timeout)
    }

    fn run(
        &self,
        plan: InstallationPlan,
        dry_run: bool,
        force: bool,
        jobs: Option<usize>,
        step_timeout: Option<Duration>,
    ) -> Result<RunReport> {
        if !plan.conflicts.is_empty() {
            return Err(Error::Conflict {
                conflicts: plan.conflicts.clone(),
            });
        }
        if dry_run {
            return Ok(RunReport { plan, result: None });
        }

        let _lock = self.acquire_lock()?;
        let mut tracker = ProgressTracker::load(self.layout.root())?;
        tracker.set_manifest(self.manifest.path().map(Path::to_path_buf));
        if force {
            for entry in plan.entries.iter().filter(|e| e.requested) {
                tracker.reset(&entry.plugin_id)?;
            }
        }

        let executor = Executor::new(self.layout.root(), &self.manifest)
            .with_jobs(jobs.unwrap_or(self.settings.jobs))
            .with_step_timeout(step_timeout.unwrap_or_else(|| self.settings.step_timeout()))
            .with_cancel_flag(self.cancel.clone());
        let result = executor.execute(&plan, &mut tracker)?;
        tracker.persist()?;
        Ok(RunReport {
            plan,
            result: Some(result),
        })
    }

    fn acquire_lock(&self) -> Result<RunLock> {
        let run_id = Uuid::new_v4().to_string();
        RunLock::acquire(
            &self.layout.lock_file(),
            &run_id,
            self.settings.lock_stale_after(),
        )
        .map_err(|e| match e {
            plinth_fs::Error::LockHeld {
                path,
                pid,
                host,
                started_at,
            } => Error::LockContention {
                path,
                pid,
                host,
                started_at,
            },
            other => other.into(),
        })
    }

    /// Recorded status and detected state of every known plugin: the whole
    /// catalog plus anything recorded that has since left it.
    pub fn status(&self) -> Result<Vec<StatusEntry>> {
        let tracker = ProgressTracker::load(self.layout.root())?;
        let record = tracker.record();
        let detector = self.detector();

        let ids: BTreeSet<&str> = self
            .manifest
            .ids()
            .chain(record.plugins.keys().map(String::as_str))
            .collect();

        let entries = ids
            .into_iter()
            .map(|id| {
                let progress = record.get(id);
                let plugin = self.manifest.get(id);
                let detected = plugin.map(|plugin| {
                    let options = resolve_options(plugin, &[], progress.map(|p| &p.options), None)
                        .unwrap_or_default();
                    detector.detect(plugin, &options, progress).state
                });
                StatusEntry {
                    plugin_id: id.to_string(),
                    status: record.status(id),
                    detected,
                    completed_steps: progress.map_or(0, |p| p.completed_steps.len()),
                    total_steps: plugin.map(|p| p.steps.len()),
                    definition_changed: match (plugin, progress) {
                        (Some(plugin), Some(p)) => {
                            !p.definition_checksum.is_empty()
                                && p.definition_checksum != plugin.definition_checksum()
                        }
                        _ => false,
                    },
                    last_failure: progress.and_then(|p| p.last_failure.clone()),
                    warnings: progress.map(|p| p.warnings.clone()).unwrap_or_default(),
                }
            })
            .collect();
        Ok(entries)
    }
}
