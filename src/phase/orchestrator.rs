// ABOUTME: Dispatch/suspend/resume state machine driving deployment phases.
// ABOUTME: Holds at most one outstanding task per phase, keyed by correlation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nonempty::NonEmpty;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::context::{
    LevelSource, PhaseContext, PhaseKind, PhasePlan, PhaseSpec, ResizePlan, SetupPlan,
};
use super::rollback::{invert_resize, invert_setup, invert_swap, rollback_applies};
use super::state::PhaseTransition;
use super::PhaseError;
use crate::dispatch::{
    CommandDescriptor, CommandSpec, FetchFilesSpec, FetchRequest, FetchSource, ResizeSpec,
    RouteSwapSpec, SetupSpec, SwapDirection, TaskDispatcher, TaskPayload, TaskResult, TaskStatus,
};
use crate::hooks::{
    ActivityEntry, ActivityLog, ActivityOutcome, ExpressionRenderer, FeatureFlag, FeatureFlags,
    PhaseRegistry,
};
use crate::manifest::{
    check_duplicates, resolve, strip_comment_lines, LevelFiles, ManifestFile, OverrideLevel,
    SourceKind,
};
use crate::resize::{
    compute_target_count, current_running_default, ResizeDirection, ResizeRequest,
    DEFAULT_RUNNING_COUNT,
};
use crate::routes::{resolve_final_routes, resolve_temp_routes};
use crate::snapshot::{PhaseSnapshot, RouteSwapRecord};
use crate::store::{FallbackReader, SnapshotKey, SnapshotStore};
use crate::types::{AppName, CorrelationId};
use crate::unit::UnitTarget;

/// User-visible message when a rollback phase finds no forward state.
pub const ROLLBACK_SKIP_MESSAGE: &str = "No rollback required, skipping rollback";

/// A phase suspended on one outstanding remote task.
struct PendingPhase {
    ctx: PhaseContext,
    rollback: bool,
    timeout: Duration,
    stage: Stage,
}

/// What the outstanding task is expected to produce, plus the snapshot
/// accumulated so far from input resolution.
enum Stage {
    Fetching { plan: SetupPlan },
    AwaitSetup { snapshot: PhaseSnapshot },
    AwaitResize { snapshot: PhaseSnapshot },
    AwaitSwap { snapshot: PhaseSnapshot },
}

/// Drives phases through resolve-dispatch-suspend-resume.
///
/// All remote work goes through the injected `TaskDispatcher`; the
/// orchestrator itself never talks to the platform. Between `begin` and
/// `resume` the only state kept is the pending-phase table, so a single
/// orchestrator serves many concurrent phase executions.
pub struct Orchestrator {
    dispatcher: Arc<dyn TaskDispatcher>,
    store: Arc<dyn SnapshotStore>,
    reader: FallbackReader,
    flags: Arc<dyn FeatureFlags>,
    renderer: Arc<dyn ExpressionRenderer>,
    audit: Arc<dyn ActivityLog>,
    pending: Mutex<HashMap<CorrelationId, PendingPhase>>,
}

impl Orchestrator {
    pub fn new(
        dispatcher: Arc<dyn TaskDispatcher>,
        store: Arc<dyn SnapshotStore>,
        registry: Arc<dyn PhaseRegistry>,
        flags: Arc<dyn FeatureFlags>,
        renderer: Arc<dyn ExpressionRenderer>,
        audit: Arc<dyn ActivityLog>,
    ) -> Self {
        let reader = FallbackReader::new(Arc::clone(&store), registry, Arc::clone(&renderer));
        Self {
            dispatcher,
            store,
            reader,
            flags,
            renderer,
            audit,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Start a phase: resolve its inputs and dispatch the first task.
    ///
    /// Returns `Dispatched` with a correlation id when a task went out, or
    /// `Skipped` when a rollback phase found nothing to undo. Input
    /// resolution failures surface as errors before anything is dispatched.
    pub async fn begin(
        &self,
        ctx: PhaseContext,
        spec: PhaseSpec,
    ) -> Result<PhaseTransition, PhaseError> {
        info!(
            phase = %ctx.phase_name,
            rollback = spec.rollback,
            "beginning phase"
        );
        self.log(
            &ctx,
            ActivityOutcome::Running,
            format!("Starting phase '{}'", ctx.phase_name),
        );

        if spec.rollback {
            return self.begin_rollback(ctx, spec).await;
        }

        let PhaseSpec { timeout, plan, .. } = spec;
        match plan {
            PhasePlan::Setup(plan) => self.begin_setup(ctx, timeout, plan).await,
            PhasePlan::Resize(plan) => self.begin_resize(ctx, timeout, plan).await,
            PhasePlan::SwapRoutes => self.begin_swap(ctx, timeout).await,
        }
    }

    /// Deliver the result of an outstanding task.
    ///
    /// A setup phase with remote manifest sources chains: the fetch result
    /// triggers the actual setup dispatch and a fresh `Dispatched`
    /// transition. Everything else finalizes the phase: the snapshot is
    /// written exactly once and the terminal transition returned.
    pub async fn resume(&self, result: TaskResult) -> Result<PhaseTransition, PhaseError> {
        let pending = self
            .pending
            .lock()
            .remove(&result.correlation)
            .ok_or_else(|| PhaseError::UnknownCorrelation(result.correlation.clone()))?;
        let PendingPhase {
            ctx,
            rollback,
            timeout,
            stage,
        } = pending;

        if result.status == TaskStatus::Failure {
            let message = result
                .error_message
                .unwrap_or_else(|| "task failed without diagnostic".to_string());
            warn!(phase = %ctx.phase_name, %message, "task failed");
            self.log(&ctx, ActivityOutcome::Failure, message.clone());
            return Ok(PhaseTransition::failed(message));
        }

        match (stage, result.payload) {
            (Stage::Fetching { plan }, TaskPayload::Files(levels)) => {
                let fetched: HashMap<OverrideLevel, Vec<ManifestFile>> = levels
                    .into_iter()
                    .map(|l| (l.level, l.files))
                    .collect();
                self.dispatch_setup(ctx, rollback, timeout, plan, fetched).await
            }
            (
                Stage::AwaitSetup { mut snapshot },
                TaskPayload::Setup {
                    new_unit,
                    downsized_units,
                },
            ) => {
                snapshot.new_unit = Some(new_unit);
                snapshot.downsize_units = downsized_units;
                self.complete(&ctx, rollback, snapshot)
            }
            (Stage::AwaitResize { mut snapshot }, TaskPayload::Resize { units }) => {
                snapshot.instance_updates = units;
                self.complete(&ctx, rollback, snapshot)
            }
            (Stage::AwaitSwap { snapshot }, TaskPayload::RouteSwap { bindings }) => {
                debug!(phase = %ctx.phase_name, bindings = bindings.len(), "routes remapped");
                self.complete(&ctx, rollback, snapshot)
            }
            _ => Err(PhaseError::UnexpectedPayload),
        }
    }

    /// Abandon a suspended phase. The remote task may still run to
    /// completion; its late result will be rejected as an unknown
    /// correlation.
    pub fn abort(&self, correlation: &CorrelationId) -> Result<PhaseTransition, PhaseError> {
        let pending = self
            .pending
            .lock()
            .remove(correlation)
            .ok_or_else(|| PhaseError::UnknownCorrelation(correlation.clone()))?;
        warn!(phase = %pending.ctx.phase_name, "phase aborted with task outstanding");
        self.log(&pending.ctx, ActivityOutcome::Failure, "phase aborted");
        Ok(PhaseTransition::failed("phase aborted"))
    }

    /// Number of phases currently suspended on a task.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    async fn begin_setup(
        &self,
        ctx: PhaseContext,
        timeout: Duration,
        plan: SetupPlan,
    ) -> Result<PhaseTransition, PhaseError> {
        if !plan.levels.iter().any(|input| input.source.needs_fetch()) {
            return self
                .dispatch_setup(ctx, false, timeout, plan, HashMap::new())
                .await;
        }

        let requests: Vec<FetchRequest> = plan
            .levels
            .iter()
            .filter_map(|input| {
                let source = match &input.source {
                    LevelSource::Inline(_) => return None,
                    LevelSource::Git {
                        repo,
                        branch,
                        paths,
                    } => FetchSource::Git {
                        repo: repo.clone(),
                        branch: branch.clone(),
                        paths: paths.clone(),
                    },
                    LevelSource::Script {
                        script,
                        output_paths,
                    } => FetchSource::Script {
                        script: strip_comment_lines(script),
                        output_paths: output_paths.clone(),
                    },
                };
                Some(FetchRequest {
                    level: input.level,
                    source,
                })
            })
            .collect();

        debug!(phase = %ctx.phase_name, levels = requests.len(), "fetching manifest files");
        let command = CommandSpec::FetchFiles(FetchFilesSpec { requests });
        let use_autoscaler = plan.use_app_autoscaler;
        self.dispatch(
            ctx,
            false,
            timeout,
            use_autoscaler,
            command,
            Stage::Fetching { plan },
        )
        .await
    }

    /// Resolve manifests and routes, then dispatch the setup command.
    /// Runs either directly from `begin` or chained after a fetch result.
    async fn dispatch_setup(
        &self,
        ctx: PhaseContext,
        rollback: bool,
        timeout: Duration,
        plan: SetupPlan,
        fetched: HashMap<OverrideLevel, Vec<ManifestFile>>,
    ) -> Result<PhaseTransition, PhaseError> {
        let mut level_files = Vec::with_capacity(plan.levels.len());
        for input in &plan.levels {
            let (source, files) = match &input.source {
                LevelSource::Inline(files) => (SourceKind::Inline, files.clone()),
                LevelSource::Git { .. } => {
                    let files = fetched.get(&input.level).cloned().unwrap_or_default();
                    check_duplicates(&files)?;
                    (SourceKind::Remote, files)
                }
                LevelSource::Script { .. } => {
                    let files = fetched.get(&input.level).cloned().unwrap_or_default();
                    check_duplicates(&files)?;
                    (SourceKind::Custom, files)
                }
            };
            level_files.push(LevelFiles {
                level: input.level,
                source,
                files,
            });
        }

        let enforce_single = self
            .flags
            .is_enabled(FeatureFlag::SingleManifestSupport, &ctx.account_id);
        let package = resolve(&level_files, enforce_single)?;

        let prefix = self.renderer.render(&plan.app_name_prefix);
        let raw_name = package.application_name(&prefix)?;
        let app_name = if self
            .flags
            .is_enabled(FeatureFlag::AllowSpecialCharsInAppName, &ctx.account_id)
        {
            AppName::verbatim(&raw_name)?
        } else {
            AppName::normalized(&raw_name)?
        };

        let count_fallback = if plan.match_running_instances {
            current_running_default(plan.current_running_count)
        } else {
            plan.max_instances
        };
        let max_count = package.max_instance_count(count_fallback)?;

        let final_routes =
            resolve_final_routes(&package, &ctx.infra_routes, &plan.extra_routes, plan.blue_green)?;
        let temp_routes = resolve_temp_routes(&plan.temp_routes, &ctx.infra_temp_routes);
        // Under blue/green the unit is created on staging routes; the final
        // ones are only mapped at swap time.
        let push_routes = if plan.blue_green {
            temp_routes.clone()
        } else {
            final_routes.clone()
        };

        let snapshot = PhaseSnapshot {
            max_count: Some(max_count),
            resize_strategy: plan.resize_strategy,
            final_routes,
            temp_routes,
            use_temp_routes: plan.blue_green,
            blue_green: plan.blue_green,
            manifests: Some(package.clone()),
            enforce_ssl_validation: ctx.enforce_ssl_validation,
            use_app_autoscaler: plan.use_app_autoscaler,
            cli_version: ctx.cli_version,
            ..PhaseSnapshot::default()
        };

        info!(
            phase = %ctx.phase_name,
            app = %app_name,
            max_count,
            blue_green = plan.blue_green,
            "setup inputs resolved"
        );

        let command = CommandSpec::Setup(SetupSpec {
            app_name_prefix: app_name,
            manifests: package,
            routes: push_routes,
            max_count,
            resize_strategy: plan.resize_strategy,
            naming: plan.naming,
            blue_green: plan.blue_green,
            old_versions_to_keep: plan.old_versions_to_keep,
            revert: None,
        });
        self.dispatch(
            ctx,
            rollback,
            timeout,
            plan.use_app_autoscaler,
            command,
            Stage::AwaitSetup { snapshot },
        )
        .await
    }

    async fn begin_resize(
        &self,
        ctx: PhaseContext,
        timeout: Duration,
        plan: ResizePlan,
    ) -> Result<PhaseTransition, PhaseError> {
        let base = self.read_base(&ctx)?;
        if !base.completed_successfully() {
            return Err(PhaseError::SetupNotCompleted);
        }
        let new_unit = base.new_unit.clone().ok_or(PhaseError::SetupNotCompleted)?;
        let max_count = base.max_count.unwrap_or(DEFAULT_RUNNING_COUNT);

        let target_count = compute_target_count(&ResizeRequest {
            max_count,
            requested: plan.requested,
            unit: plan.unit,
            direction: ResizeDirection::Upsize,
            downsize_policy_v2: false,
            user_supplied_downsize: false,
        });

        let downsize_to = self
            .flags
            .is_enabled(FeatureFlag::DownsizeToPolicy, &ctx.account_id);
        let old_count = compute_target_count(&ResizeRequest {
            max_count,
            requested: plan.downsize_requested.unwrap_or(plan.requested),
            unit: plan.downsize_unit.unwrap_or(plan.unit),
            direction: ResizeDirection::Downsize,
            downsize_policy_v2: downsize_to,
            user_supplied_downsize: plan.downsize_requested.is_some(),
        });
        let old_unit_targets: Vec<UnitTarget> = base
            .downsize_units
            .iter()
            .map(|unit| UnitTarget {
                name: unit.name.clone(),
                count: old_count,
            })
            .collect();

        info!(
            phase = %ctx.phase_name,
            unit = %new_unit.name,
            target_count,
            old_count,
            "resize targets computed"
        );

        let snapshot = PhaseSnapshot {
            is_success: false,
            updated_at: None,
            desired_count: Some(target_count),
            instance_updates: Vec::new(),
            ..base.clone()
        };
        let use_autoscaler = base.use_app_autoscaler;
        let command = CommandSpec::Resize(ResizeSpec {
            unit: new_unit.name,
            target_count,
            old_unit_targets,
            strategy: base.resize_strategy,
        });
        self.dispatch(
            ctx,
            false,
            timeout,
            use_autoscaler,
            command,
            Stage::AwaitResize { snapshot },
        )
        .await
    }

    async fn begin_swap(
        &self,
        ctx: PhaseContext,
        timeout: Duration,
    ) -> Result<PhaseTransition, PhaseError> {
        let base = self.read_base(&ctx)?;
        if !base.completed_successfully() {
            return Err(PhaseError::SetupNotCompleted);
        }
        if !base.blue_green {
            return Err(PhaseError::NotBlueGreen);
        }
        let new_unit = base.new_unit.clone().ok_or(PhaseError::SetupNotCompleted)?;
        let temp_routes =
            NonEmpty::from_vec(base.temp_routes.clone()).ok_or(PhaseError::EmptyTempRoutes)?;
        let old_units: Vec<AppName> = base
            .downsize_units
            .iter()
            .map(|unit| unit.name.clone())
            .collect();

        let record = RouteSwapRecord {
            new_unit: new_unit.name.clone(),
            old_units: old_units.clone(),
            final_routes: base.final_routes.clone(),
            temp_routes: base.temp_routes.clone(),
            direction: SwapDirection::ToNew,
        };
        let snapshot = PhaseSnapshot {
            is_success: false,
            updated_at: None,
            route_swap: Some(record),
            ..base.clone()
        };
        let use_autoscaler = base.use_app_autoscaler;
        let command = CommandSpec::RouteSwap(RouteSwapSpec {
            new_unit: new_unit.name,
            old_units,
            final_routes: base.final_routes.clone(),
            temp_routes,
            direction: SwapDirection::ToNew,
        });
        self.dispatch(
            ctx,
            false,
            timeout,
            use_autoscaler,
            command,
            Stage::AwaitSwap { snapshot },
        )
        .await
    }

    /// Rollback phases read the forward phase's snapshot and dispatch the
    /// structural inverse, or skip when the forward phase left nothing
    /// behind.
    async fn begin_rollback(
        &self,
        ctx: PhaseContext,
        spec: PhaseSpec,
    ) -> Result<PhaseTransition, PhaseError> {
        let target = ctx
            .rollback_of
            .clone()
            .ok_or(PhaseError::MissingRollbackTarget)?;
        let forward_key = SnapshotKey::forward(ctx.execution_id.clone(), target);
        let forward = self.reader.read_with_fallback(&forward_key)?;

        let kind = spec.kind();
        if !rollback_applies(kind, &forward) {
            info!(phase = %ctx.phase_name, "nothing to roll back");
            self.log(&ctx, ActivityOutcome::Skipped, ROLLBACK_SKIP_MESSAGE);
            return Ok(PhaseTransition::skipped(ROLLBACK_SKIP_MESSAGE));
        }

        let use_autoscaler = forward.use_app_autoscaler;
        let pending = PhaseSnapshot {
            is_success: false,
            updated_at: None,
            ..forward.clone()
        };

        let (command, stage) = match kind {
            PhaseKind::Setup => {
                let revert = invert_setup(&forward)?;
                let manifests = forward
                    .manifests
                    .clone()
                    .ok_or(PhaseError::NothingToInvert("setup"))?;
                let naming = forward
                    .new_unit
                    .as_ref()
                    .map(|unit| unit.naming)
                    .unwrap_or_default();
                let command = CommandSpec::Setup(SetupSpec {
                    app_name_prefix: revert.delete_unit.clone(),
                    manifests,
                    routes: forward.final_routes.clone(),
                    max_count: forward.max_count.unwrap_or(DEFAULT_RUNNING_COUNT),
                    resize_strategy: forward.resize_strategy,
                    naming,
                    blue_green: forward.blue_green,
                    old_versions_to_keep: 0,
                    revert: Some(revert),
                });
                (command, Stage::AwaitSetup { snapshot: pending })
            }
            PhaseKind::Resize => {
                let resize = invert_resize(&forward)?;
                let snapshot = PhaseSnapshot {
                    desired_count: Some(resize.target_count),
                    instance_updates: Vec::new(),
                    ..pending
                };
                (
                    CommandSpec::Resize(resize),
                    Stage::AwaitResize { snapshot },
                )
            }
            PhaseKind::SwapRoutes => {
                let swap = invert_swap(&forward)?;
                let record = RouteSwapRecord {
                    new_unit: swap.new_unit.clone(),
                    old_units: swap.old_units.clone(),
                    final_routes: swap.final_routes.clone(),
                    temp_routes: swap.temp_routes.iter().cloned().collect(),
                    direction: swap.direction,
                };
                let snapshot = PhaseSnapshot {
                    route_swap: Some(record),
                    ..pending
                };
                (
                    CommandSpec::RouteSwap(swap),
                    Stage::AwaitSwap { snapshot },
                )
            }
        };

        self.dispatch(ctx, true, spec.timeout, use_autoscaler, command, stage)
            .await
    }

    /// Base state for resize and swap phases: this phase's own snapshot if
    /// one exists (re-entry), otherwise the preceding compatible phase's.
    fn read_base(&self, ctx: &PhaseContext) -> Result<PhaseSnapshot, PhaseError> {
        let key = SnapshotKey::forward(ctx.execution_id.clone(), ctx.phase_name.clone());
        Ok(self.reader.read_with_fallback(&key)?)
    }

    /// Submit one task and suspend the phase on its correlation id.
    async fn dispatch(
        &self,
        ctx: PhaseContext,
        rollback: bool,
        timeout: Duration,
        use_app_autoscaler: bool,
        command: CommandSpec,
        stage: Stage,
    ) -> Result<PhaseTransition, PhaseError> {
        let descriptor = CommandDescriptor {
            command,
            target: ctx.infra.clone(),
            credential: ctx.credential.clone(),
            timeout,
            cli_version: ctx.cli_version,
            enforce_ssl_validation: ctx.enforce_ssl_validation,
            use_app_autoscaler,
        };
        let correlation = self.dispatcher.submit(descriptor).await?;
        debug!(phase = %ctx.phase_name, correlation = %correlation, "task dispatched");

        self.pending.lock().insert(
            correlation.clone(),
            PendingPhase {
                ctx,
                rollback,
                timeout,
                stage,
            },
        );
        Ok(PhaseTransition::dispatched(correlation))
    }

    /// Finalize: mark success, timestamp, write the snapshot, log.
    fn complete(
        &self,
        ctx: &PhaseContext,
        rollback: bool,
        mut snapshot: PhaseSnapshot,
    ) -> Result<PhaseTransition, PhaseError> {
        snapshot.is_success = true;
        snapshot.updated_at = Some(Utc::now());

        let key = SnapshotKey::forward(ctx.execution_id.clone(), ctx.phase_name.clone());
        let key = if rollback { key.counterpart() } else { key };
        self.store.write(key, snapshot.clone())?;

        info!(phase = %ctx.phase_name, rollback, "phase completed");
        self.log(
            ctx,
            ActivityOutcome::Success,
            format!("Phase '{}' completed", ctx.phase_name),
        );
        Ok(PhaseTransition::completed(snapshot))
    }

    fn log(&self, ctx: &PhaseContext, outcome: ActivityOutcome, message: impl Into<String>) {
        self.audit.record(ActivityEntry {
            activity_id: ctx.activity_id.clone(),
            phase: ctx.phase_name.clone(),
            outcome,
            message: message.into(),
        });
    }
}
