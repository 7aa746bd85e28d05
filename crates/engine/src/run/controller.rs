//! Run lifecycle control.
//!
//! Drives a plan to completion in cooperative rounds: sample the
//! governor, select an eligible batch, resolve inputs against the
//! blackboard, dispatch the batch concurrently, await every outcome,
//! apply state transitions and blackboard writes, checkpoint, repeat.
//! The blackboard and step-state map are mutated only here, between
//! rounds — concurrent handlers never observe partial writes.
//!
//! Pause and cancel are cooperative flags checked between rounds; each
//! dispatched step additionally races a cancellation signal so an
//! in-flight batch resolves promptly when the run is cancelled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinSet;

use taskflow_steps::{HandlerRegistry, StepContext, StepError, StepKind, StepOutput};

use crate::config::RunOptions;
use crate::plan::Plan;
use crate::progress::{NullProgressSink, ProgressSink, ProgressUpdate};
use crate::report::RunReport;
use crate::resolver::VariableResolver;
use crate::run::governor::ResourceGovernor;
use crate::run::scheduler;
use crate::run::state::RunState;
use crate::store::{Checkpoint, PlanStore};

/// Control surface for one run: cooperative pause and cancel flags.
pub struct RunHandle {
    pause_tx: watch::Sender<bool>,
    cancel_tx: watch::Sender<bool>,
}

impl RunHandle {
    /// Create a handle and the receiver half given to the controller.
    pub fn new() -> (RunHandle, RunSignals) {
        let (pause_tx, pause_rx) = watch::channel(false);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        (
            Self { pause_tx, cancel_tx },
            RunSignals {
                pause: pause_rx,
                cancel: cancel_rx,
            },
        )
    }

    /// Request a pause before the next round.
    pub fn pause(&self) {
        self.pause_tx.send_replace(true);
    }

    /// Resume a paused run.
    pub fn resume(&self) {
        self.pause_tx.send_replace(false);
    }

    /// Cancel the run. In-flight steps resolve as failed("cancelled");
    /// no further round dispatches.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// Whether cancel has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Whether a pause is requested.
    pub fn is_paused(&self) -> bool {
        *self.pause_tx.borrow()
    }
}

/// Receiver half of a [`RunHandle`], consumed by the controller.
#[derive(Clone)]
pub struct RunSignals {
    pause: watch::Receiver<bool>,
    cancel: watch::Receiver<bool>,
}

impl RunSignals {
    /// Signals that never pause or cancel.
    pub fn detached() -> Self {
        let (handle, signals) = RunHandle::new();
        // Keeps the channels open for the process lifetime.
        std::mem::forget(handle);
        signals
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn cancel_receiver(&self) -> watch::Receiver<bool> {
        self.cancel.clone()
    }

    /// Block while paused. Returns false when cancelled while waiting.
    async fn wait_while_paused(&mut self) -> bool {
        loop {
            if *self.cancel.borrow() {
                return false;
            }
            if !*self.pause.borrow() {
                return true;
            }
            tokio::select! {
                changed = self.pause.changed() => {
                    // A dropped handle can neither pause nor cancel again.
                    if changed.is_err() {
                        return true;
                    }
                }
                changed = self.cancel.changed() => {
                    if changed.is_err() {
                        return true;
                    }
                }
            }
        }
    }
}

/// Drives plans through the scheduler and state machine to a report.
pub struct RunController {
    registry: Arc<HandlerRegistry>,
    store: Arc<dyn PlanStore>,
    sink: Arc<dyn ProgressSink>,
    governor: ResourceGovernor,
    resolver: VariableResolver,
}

impl RunController {
    /// Create a controller over a handler registry and store, with live
    /// system signals and no progress sink.
    pub fn new(registry: Arc<HandlerRegistry>, store: Arc<dyn PlanStore>) -> Self {
        Self {
            registry,
            store,
            sink: Arc::new(NullProgressSink),
            governor: ResourceGovernor::system(),
            resolver: VariableResolver::new(),
        }
    }

    /// Attach a progress sink.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the resource governor.
    pub fn with_governor(mut self, governor: ResourceGovernor) -> Self {
        self.governor = governor;
        self
    }

    /// Execute a plan to completion.
    ///
    /// Step failures become state transitions, never errors; the report
    /// always comes back and distinguishes completed, partial, and
    /// failed outcomes.
    pub async fn run(
        &self,
        plan: &mut Plan,
        options: &RunOptions,
        signals: RunSignals,
    ) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let state = RunState::for_plan(plan);
        self.drive(plan, state, run_id, options, signals).await
    }

    /// Continue a checkpointed run.
    ///
    /// Steps the checkpoint recorded as running were in flight when the
    /// checkpoint was written; they are reset to pending and re-run.
    pub async fn resume(
        &self,
        checkpoint: Checkpoint,
        options: &RunOptions,
        signals: RunSignals,
    ) -> RunReport {
        let mut plan = checkpoint.plan;
        let mut state = checkpoint.state;
        state.reset_running();

        let run_id = checkpoint
            .run_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        tracing::info!(
            run_id = %run_id,
            plan_id = %plan.id,
            finished = state.terminal_count(),
            "Resuming run from checkpoint"
        );

        self.drive(&mut plan, state, run_id, options, signals).await
    }

    async fn drive(
        &self,
        plan: &mut Plan,
        mut state: RunState,
        run_id: String,
        options: &RunOptions,
        mut signals: RunSignals,
    ) -> RunReport {
        let started = Instant::now();
        let mut rounds: u32 = 0;
        let mut cancelled = false;

        tracing::info!(
            run_id = %run_id,
            plan_id = %plan.id,
            steps = plan.len(),
            max_concurrent = options.max_concurrent_steps,
            "Run started"
        );

        loop {
            // Cooperative flags, checked between rounds.
            if signals.is_cancelled() || !signals.wait_while_paused().await {
                cancelled = true;
                break;
            }

            let snapshot = self.governor.effective_limit(options.max_concurrent_steps);
            let limit = snapshot.effective_limit;

            let eligible = scheduler::eligible_steps(plan, &state);
            if eligible.is_empty() {
                break;
            }

            let batch: Vec<_> = eligible.into_iter().take(limit).collect();
            let batch_len = batch.len();

            // Deferred-retry strengthening: when the policy configures
            // backoff, honor the largest delay owed by the batch.
            let backoff = batch
                .iter()
                .filter_map(|step| {
                    let retry = state.record(&step.id).map(|r| r.retry_count).unwrap_or(0);
                    if retry > 0 {
                        options.retry.delay_for(retry)
                    } else {
                        None
                    }
                })
                .max();
            if let Some(delay) = backoff {
                tokio::time::sleep(delay).await;
            }

            rounds += 1;
            tracing::debug!(
                run_id = %run_id,
                round = rounds,
                batch = batch_len,
                limit,
                "Dispatching round"
            );

            let mut join_set: JoinSet<(String, Result<StepOutput, StepError>, u64)> =
                JoinSet::new();

            for step in &batch {
                let attempt = state
                    .record(&step.id)
                    .map(|r| r.retry_count + 1)
                    .unwrap_or(1);
                if let Some(record) = state.record_mut(&step.id) {
                    record.mark_running();
                }

                // Lazy resolution against the blackboard as of this round.
                let resolved = self
                    .resolver
                    .resolve_value(&step.input, &plan.context.blackboard);
                if !resolved.unresolved.is_empty() {
                    tracing::warn!(
                        step_id = %step.id,
                        tokens = ?resolved.unresolved,
                        "Unresolved references in step input"
                    );
                }

                let mut ctx = StepContext::new(plan.id.clone(), run_id.clone(), step.id.clone())
                    .with_step_name(step.name.clone())
                    .with_task(plan.context.request.clone())
                    .with_attempt(attempt);
                ctx.requirements = plan.context.requirements.clone();
                ctx.constraints = plan.context.constraints.clone();

                let registry = Arc::clone(&self.registry);
                let kind = step.kind;
                let step_id = step.id.clone();
                let input = resolved.value;
                let timeout_secs = step.timeout_secs.unwrap_or(options.step_timeout_secs);
                let cancel = signals.cancel_receiver();

                join_set.spawn(async move {
                    let attempt_started = Instant::now();
                    let result =
                        execute_step(registry, kind, input, ctx, timeout_secs, cancel).await;
                    (
                        step_id,
                        result,
                        attempt_started.elapsed().as_millis() as u64,
                    )
                });
            }
            drop(batch);

            // Fan-in: the whole batch resolves before any state or
            // blackboard mutation.
            let mut outcomes = Vec::with_capacity(batch_len);
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => tracing::error!(run_id = %run_id, error = %e, "Step task panicked"),
                }
            }

            for (step_id, result, duration_ms) in outcomes {
                match result {
                    Ok(output) => {
                        plan.context
                            .blackboard
                            .insert(step_id.clone(), output.data.clone());
                        if let Some(record) = state.record_mut(&step_id) {
                            record.record_success(output, duration_ms);
                        }
                    }
                    Err(err) => {
                        if matches!(err, StepError::Cancelled) {
                            cancelled = true;
                        }
                        let retryable = err.is_retryable();
                        if let Some(record) = state.record_mut(&step_id) {
                            record.record_failure(err.to_string(), retryable, &options.retry);
                        }
                    }
                }
                self.emit_progress(&run_id, plan, &state, &step_id);
            }

            self.checkpoint(plan, &state, &run_id).await;

            if cancelled {
                break;
            }
        }

        let report = RunReport::aggregate(
            plan,
            &state,
            &run_id,
            rounds,
            started.elapsed().as_millis() as u64,
            cancelled,
        );
        self.checkpoint(plan, &state, &run_id).await;

        tracing::info!(
            run_id = %run_id,
            status = %report.status,
            completed = report.metrics.completed_steps,
            failed = report.metrics.failed_steps,
            rounds,
            "Run finished"
        );

        report
    }

    /// Persist the round checkpoint. A store failure degrades
    /// resumability but never aborts the run.
    async fn checkpoint(&self, plan: &Plan, state: &RunState, run_id: &str) {
        let checkpoint = Checkpoint::of_round(plan, state, run_id);
        if let Err(e) = self.store.save(&plan.id, &checkpoint).await {
            tracing::warn!(plan_id = %plan.id, error = %e, "Checkpoint save failed");
        }
    }

    fn emit_progress(&self, run_id: &str, plan: &Plan, state: &RunState, step_id: &str) {
        let Some(record) = state.record(step_id) else {
            return;
        };
        let total = plan.len();
        let finished = state.terminal_count();

        let update = ProgressUpdate {
            run_id: run_id.to_string(),
            plan_id: plan.id.clone(),
            step_id: step_id.to_string(),
            step_name: plan
                .get_step(step_id)
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            status: record.status,
            finished_steps: finished,
            total_steps: total,
            percent_complete: if total > 0 {
                finished as f32 / total as f32 * 100.0
            } else {
                100.0
            },
            error: record.error.clone(),
        };
        self.sink.on_progress(&update);
    }
}

/// Execute one step under the timeout and cancellation contract.
async fn execute_step(
    registry: Arc<HandlerRegistry>,
    kind: StepKind,
    input: serde_json::Value,
    ctx: StepContext,
    timeout_secs: u64,
    cancel: watch::Receiver<bool>,
) -> Result<StepOutput, StepError> {
    let timeout = Duration::from_secs(timeout_secs);
    tokio::select! {
        _ = cancelled_signal(cancel) => Err(StepError::Cancelled),
        result = tokio::time::timeout(timeout, registry.execute(kind, input, &ctx)) => {
            match result {
                Ok(result) => result,
                Err(_) => Err(StepError::Timeout(timeout_secs)),
            }
        }
    }
}

/// Resolves when cancellation is signalled; never resolves once the
/// handle is gone.
async fn cancelled_signal(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
