//! CompletionEngine - completion のライフサイクルを進めるオーケストレーター
//!
//! # セッション完了時のフロー
//! 1. セッションとイベントを読む
//! 2. 候補タスクを絞る（イベントが宣言したもの・event_related のみ）
//! 3. 要件評価 → スコープ判定 → 繰り返しゲート → 逓減倍率
//! 4. open な行があれば completed に反転、なければ新規作成
//!
//! # 設計原則
//! - rejection と要件未達はエラーではない（EvaluationReport に記録して次のタスクへ）
//! - 一意制約の最後の砦は CompletionStore。`Duplicate` は rejection として報告

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::readiness::ReadinessRegistry;
use super::report::{EvaluationReport, TaskOutcome};
use crate::domain::{
    Driver, DriverId, EngineError, Event, EventId, LifecycleState, Participation,
    ParticipationId, Scope, SignatureStamp, StoreError, TaskCompletion, TaskDefinition, TaskId,
    WindowProgress, WindowSpec,
};
use crate::ports::{Catalog, Clock, CompletionStore, IdGenerator};
use crate::rules::{
    self, Admission, Candidate, PastCompletion, Rejection, SIGNATURE_VERSION, WindowStep,
};

/// A session together with the event it ran under.
struct SessionContext {
    participation: Participation,
    event: Event,
}

/// Signatures derived during one call, keyed by event.
type SignatureCache = HashMap<EventId, String>;

pub struct CompletionEngine {
    store: Arc<dyn CompletionStore>,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: EngineConfig,
    readiness: ReadinessRegistry,
}

impl CompletionEngine {
    pub(crate) fn from_parts(
        store: Arc<dyn CompletionStore>,
        catalog: Arc<dyn Catalog>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: EngineConfig,
        readiness: ReadinessRegistry,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            ids,
            config,
            readiness,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Route a session lifecycle transition to the matching operation.
    ///
    /// The catalog must already reflect `new_state`.
    pub async fn on_session_transition(
        &self,
        participation_id: ParticipationId,
        new_state: LifecycleState,
    ) -> Result<EvaluationReport, EngineError> {
        let participation = self
            .catalog
            .participation(participation_id)
            .await?
            .ok_or_else(|| EngineError::not_found("participation", participation_id))?;
        let driver_id = participation.driver_id;

        match new_state {
            LifecycleState::Registered => {
                self.assign_on_registration(driver_id, participation_id)
                    .await
            }
            LifecycleState::Started => {
                debug!(%participation_id, "session started, nothing to evaluate");
                Ok(EvaluationReport::new(Some(participation_id)))
            }
            LifecycleState::Completed => {
                let mut report = self
                    .evaluate_on_completion(driver_id, participation_id)
                    .await?;
                report.merge(
                    self.backfill_participation_linkage(driver_id, participation_id)
                        .await?,
                );
                Ok(report)
            }
            LifecycleState::Withdrawn => self.discard_open_completions(participation_id).await,
        }
    }

    /// Pre-create pending rows for the tasks the session's event declares.
    pub async fn assign_on_registration(
        &self,
        driver_id: DriverId,
        participation_id: ParticipationId,
    ) -> Result<EvaluationReport, EngineError> {
        let ctx = self.load_session(driver_id, participation_id).await?;
        let mut report = EvaluationReport::new(Some(participation_id));

        if ctx.event.task_codes.is_empty() {
            debug!(event_id = %ctx.event.id, "event declares no tasks");
            return Ok(report);
        }

        let driver = self.load_driver(driver_id).await?;
        let now = self.clock.now();

        for code in &ctx.event.task_codes {
            let Some(task) = self.catalog.task_by_code(code).await? else {
                warn!(task_code = %code, event_id = %ctx.event.id, "event declares unknown task");
                continue;
            };

            if let Some(reason) = registration_skip_reason(&task, &ctx.event, &driver) {
                report.push(task.id, &task.code, skipped(&task, reason));
                continue;
            }

            let history = self.store.completions_for(driver_id, task.id).await?;
            if history.iter().any(TaskCompletion::is_completed) {
                report.push(task.id, &task.code, skipped(&task, "already completed"));
                continue;
            }
            if open_row_for(&history, participation_id).is_some() {
                report.push(task.id, &task.code, skipped(&task, "already pending"));
                continue;
            }

            let pending = TaskCompletion::pending(
                self.ids.generate_completion_id(),
                driver_id,
                task.id,
                participation_id,
                now,
            );
            let completion_id = pending.id;
            match self.store.insert(pending).await {
                Ok(()) => {
                    info!(
                        %driver_id, %participation_id, task_code = %task.code, %completion_id,
                        "task assigned"
                    );
                    report.push(task.id, &task.code, TaskOutcome::Assigned { completion_id });
                }
                Err(StoreError::Duplicate(index)) => {
                    warn!(task_code = %task.code, %index, "pending row already exists");
                    report.push(task.id, &task.code, skipped(&task, "already pending"));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(report)
    }

    /// Evaluate every candidate task against a finished session.
    pub async fn evaluate_on_completion(
        &self,
        driver_id: DriverId,
        participation_id: ParticipationId,
    ) -> Result<EvaluationReport, EngineError> {
        let ctx = self.load_session(driver_id, participation_id).await?;
        let mut report = EvaluationReport::new(Some(participation_id));

        if ctx.participation.state != LifecycleState::Completed {
            warn!(
                %participation_id, state = %ctx.participation.state,
                "evaluation requested for a session that has not completed"
            );
            return Ok(report);
        }

        let now = self.clock.now();
        let stamp = rules::stamp(&ctx.event);
        let mut signatures = SignatureCache::from([(ctx.event.id, stamp.signature.clone())]);

        for task in self.candidate_tasks(&ctx.event).await? {
            let outcome = self
                .evaluate_task(&task, &ctx, &stamp, &mut signatures, now)
                .await?;
            report.push(task.id, &task.code, outcome);
        }

        info!(
            %driver_id, %participation_id,
            evaluated = report.tasks.len(), completed = report.completed_count(),
            "session evaluated"
        );
        Ok(report)
    }

    /// Link completed rows that carry no participation to this session when
    /// it satisfies their task's requirements.
    pub async fn backfill_participation_linkage(
        &self,
        driver_id: DriverId,
        participation_id: ParticipationId,
    ) -> Result<EvaluationReport, EngineError> {
        let ctx = self.load_session(driver_id, participation_id).await?;
        let mut report = EvaluationReport::new(Some(participation_id));
        if ctx.participation.state != LifecycleState::Completed {
            return Ok(report);
        }

        let unlinked = self.store.unlinked_completed(driver_id).await?;
        if unlinked.is_empty() {
            return Ok(report);
        }

        let tasks: HashMap<TaskId, TaskDefinition> = self
            .catalog
            .tasks_for_discipline(ctx.event.discipline)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        let stamp = rules::stamp(&ctx.event);
        let now = self.clock.now();

        for mut row in unlinked {
            let Some(task) = tasks.get(&row.task_id) else {
                continue;
            };
            // Rolling-window rows are explained by `achieved_by`; non-event
            // tasks by their readiness check.
            if !task.event_related || matches!(task.scope, Scope::RollingWindow { .. }) {
                continue;
            }
            // A periodic row is only explained by a session of its own period.
            if let Scope::Periodic { period } = task.scope {
                let session_key = rules::period_key(period, ctx.participation.reference_time());
                if row.period_key.as_deref() != Some(session_key.as_str()) {
                    debug!(task_code = %task.code, %session_key, row_key = ?row.period_key, "session is outside the row's period");
                    continue;
                }
            }

            let evaluation = rules::evaluate(task, &ctx.participation, &ctx.event, ctx.event.tier);
            if !evaluation.satisfied {
                debug!(task_code = %task.code, reasons = ?evaluation.reasons, "session does not explain completion");
                continue;
            }

            let completion_id = row.id;
            row.link_participation(participation_id, Some(stamp.clone()), now);
            match self.store.update(row).await {
                Ok(()) => {
                    info!(%driver_id, %participation_id, task_code = %task.code, %completion_id, "completion linked");
                    report.push(task.id, &task.code, TaskOutcome::Linked { completion_id });
                }
                Err(StoreError::Duplicate(index)) => {
                    warn!(task_code = %task.code, %index, "linking would duplicate a completion");
                    report.push(task.id, &task.code, skipped(task, format!("duplicate: {index}")));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(report)
    }

    /// Withdrawal: delete the session's pending and in-progress rows.
    pub async fn discard_open_completions(
        &self,
        participation_id: ParticipationId,
    ) -> Result<EvaluationReport, EngineError> {
        let count = self
            .store
            .delete_open_for_participation(participation_id)
            .await?;
        if count > 0 {
            info!(%participation_id, count, "open completions discarded");
        }
        let mut report = EvaluationReport::new(Some(participation_id));
        report.push_untargeted(TaskOutcome::Discarded { count });
        Ok(report)
    }

    /// Ask the registered readiness checks about a driver's non-event tasks
    /// and grant the ones that are ready.
    pub async fn evaluate_readiness(
        &self,
        driver_id: DriverId,
    ) -> Result<EvaluationReport, EngineError> {
        let driver = self.load_driver(driver_id).await?;
        let tasks = self.catalog.tasks_for_discipline(driver.discipline).await?;
        let mut completed = self.store.completed_for_driver(driver_id).await?;
        let mut report = EvaluationReport::new(None);
        let now = self.clock.now();

        for task in tasks.iter().filter(|t| t.active && !t.event_related) {
            let Some(check) = self.readiness.get(&task.code) else {
                debug!(task_code = %task.code, "no readiness check registered");
                continue;
            };

            let history = self.store.completions_for(driver_id, task.id).await?;
            if !task.policy.repeatable && history.iter().any(TaskCompletion::is_completed) {
                report.push(task.id, &task.code, skipped(task, "already completed"));
                continue;
            }
            if !check.is_ready(&driver, &completed) {
                report.push(task.id, &task.code, skipped(task, "not ready"));
                continue;
            }

            let admission = match rules::can_complete(task, &history, None, None, now) {
                Ok(admission) => admission,
                Err(rejection) => {
                    let outcome = self.reject(task, None, rejection, now).await?;
                    report.push(task.id, &task.code, outcome);
                    continue;
                }
            };

            let past: Vec<PastCompletion> = history
                .iter()
                .filter(|c| c.is_completed())
                .map(|c| PastCompletion {
                    completed_at: c.completed_time(),
                    event_id: c.event_id,
                    signature: None,
                })
                .collect();
            let multiplier = self.multiplier(task, &past, now);

            let row = TaskCompletion::completed(self.ids.generate_completion_id(), driver_id, task.id, now)
                .with_period_key(admission.period_key)
                .with_multiplier(multiplier);
            let outcome = self.write_completed(task, row.clone(), false).await?;
            if matches!(outcome, TaskOutcome::Completed { .. }) {
                completed.push(row);
            }
            report.push(task.id, &task.code, outcome);
        }

        Ok(report)
    }

    // ────────────────────────────────────────────────────────────────────────
    // per-task evaluation
    // ────────────────────────────────────────────────────────────────────────

    async fn evaluate_task(
        &self,
        task: &TaskDefinition,
        ctx: &SessionContext,
        stamp: &SignatureStamp,
        signatures: &mut SignatureCache,
        now: DateTime<Utc>,
    ) -> Result<TaskOutcome, EngineError> {
        let session = &ctx.participation;
        let history = self.store.completions_for(session.driver_id, task.id).await?;

        if !task.policy.repeatable && history.iter().any(TaskCompletion::is_completed) {
            return Ok(skipped(task, "already completed"));
        }
        // Global and periodic rows are linked by backfill; once linked to this
        // session the scope check alone no longer sees them.
        if matches!(task.scope, Scope::Global | Scope::Periodic { .. })
            && history
                .iter()
                .any(|c| c.is_completed() && c.participation_id == Some(session.id))
        {
            return Ok(skipped(task, "already completed for this session"));
        }

        let open_row = open_row_for(&history, session.id).cloned();
        let evaluation = rules::evaluate(task, session, &ctx.event, ctx.event.tier);

        let mut achieved_by = Vec::new();
        if let Scope::RollingWindow { window } = task.scope {
            // Lifetime achievement: stop accumulating once granted.
            if let Err(rejection) = rules::can_complete(task, &history, None, None, now) {
                return self.reject(task, open_row, rejection, now).await;
            }
            match self
                .record_window(task, window, session, evaluation.satisfied, now)
                .await?
            {
                WindowStep::Reached { achieved_by: sessions } => achieved_by = sessions,
                WindowStep::Accumulating { count, needed } => {
                    return Ok(TaskOutcome::Accumulating { count, needed });
                }
                WindowStep::Unchanged { count, needed } if evaluation.satisfied => {
                    return Ok(TaskOutcome::Accumulating { count, needed });
                }
                WindowStep::Unchanged { .. } | WindowStep::Reset => {
                    return Ok(skipped(task, evaluation.reasons.join("; ")));
                }
            }
        } else if !evaluation.satisfied {
            return self
                .requirements_unmet(task, open_row, evaluation.reasons, now)
                .await;
        }

        let participation = matches!(task.scope, Scope::PerParticipation).then_some(session.id);
        let admission = match rules::can_complete(task, &history, participation, None, now) {
            Ok(admission) => admission,
            Err(rejection) => return self.reject(task, open_row, rejection, now).await,
        };

        let past = self.resolve_history(&history, signatures).await?;
        let candidate = Candidate {
            event_id: ctx.event.id,
            signature: &stamp.signature,
        };
        let window = self.config.diversity_window(&task.policy);
        if let Err(rejection) =
            rules::check_repeat_gates(&task.policy, window, &past, candidate, now)
        {
            return self.reject(task, open_row, rejection, now).await;
        }

        let multiplier = self.multiplier(task, &past, now);
        self.finalize(
            task,
            session,
            open_row,
            admission,
            participation,
            achieved_by,
            multiplier,
            stamp.clone(),
            now,
        )
        .await
    }

    async fn requirements_unmet(
        &self,
        task: &TaskDefinition,
        open_row: Option<TaskCompletion>,
        reasons: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<TaskOutcome, EngineError> {
        let Some(mut row) = open_row else {
            return Ok(skipped(task, reasons.join("; ")));
        };
        row.mark_in_progress(reasons.clone(), now);
        let completion_id = row.id;
        self.store.update(row).await?;
        info!(task_code = %task.code, %completion_id, ?reasons, "requirements unmet, completion in progress");
        Ok(TaskOutcome::Progressed { reasons })
    }

    /// Record a rejection. An open row for the session is closed as failed.
    async fn reject(
        &self,
        task: &TaskDefinition,
        open_row: Option<TaskCompletion>,
        rejection: Rejection,
        now: DateTime<Utc>,
    ) -> Result<TaskOutcome, EngineError> {
        info!(task_code = %task.code, code = rejection.code(), %rejection, "completion rejected");
        if let Some(mut row) = open_row {
            row.mark_failed(vec![rejection.to_string()], now);
            self.store.update(row).await?;
        }
        Ok(TaskOutcome::Rejected { rejection })
    }

    #[allow(clippy::too_many_arguments)]
    async fn finalize(
        &self,
        task: &TaskDefinition,
        session: &Participation,
        open_row: Option<TaskCompletion>,
        admission: Admission,
        participation: Option<ParticipationId>,
        achieved_by: Vec<ParticipationId>,
        multiplier: f64,
        stamp: SignatureStamp,
        now: DateTime<Utc>,
    ) -> Result<TaskOutcome, EngineError> {
        match open_row {
            // Flip the pre-created row so its creation time survives.
            Some(mut row) => {
                row.mark_completed(multiplier, Some(stamp), now);
                self.write_completed(task, row, true).await
            }
            None => {
                let row = TaskCompletion::completed(
                    self.ids.generate_completion_id(),
                    session.driver_id,
                    task.id,
                    now,
                )
                .with_participation(participation)
                .with_period_key(admission.period_key)
                .with_achieved_by(achieved_by)
                .with_multiplier(multiplier)
                .with_signature(Some(stamp));
                self.write_completed(task, row, false).await
            }
        }
    }

    async fn write_completed(
        &self,
        task: &TaskDefinition,
        row: TaskCompletion,
        existing: bool,
    ) -> Result<TaskOutcome, EngineError> {
        let completion_id = row.id;
        let multiplier = row.score_multiplier;
        let driver_id = row.driver_id;
        let written = if existing {
            self.store.update(row).await
        } else {
            self.store.insert(row).await
        };

        match written {
            Ok(()) => {
                info!(%driver_id, task_code = %task.code, %completion_id, multiplier, "task completed");
                Ok(TaskOutcome::Completed {
                    completion_id,
                    multiplier,
                })
            }
            Err(StoreError::Duplicate(index)) => {
                warn!(task_code = %task.code, %index, "uniqueness index rejected completion");
                Ok(TaskOutcome::Rejected {
                    rejection: Rejection::DuplicateCompletion,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn multiplier(&self, task: &TaskDefinition, past: &[PastCompletion], now: DateTime<Utc>) -> f64 {
        let window = self.config.diversity_window(&task.policy);
        let recent = rules::recent_count(past, window, now);
        rules::task_multiplier(&task.policy, self.config.diminishing(), recent)
    }

    async fn record_window(
        &self,
        task: &TaskDefinition,
        window: WindowSpec,
        session: &Participation,
        qualifying: bool,
        now: DateTime<Utc>,
    ) -> Result<WindowStep, EngineError> {
        let driver_id = session.driver_id;
        let mut progress = self
            .store
            .window_progress(driver_id, task.id)
            .await?
            .unwrap_or_else(|| WindowProgress::new(driver_id, task.id, now));

        let step = rules::record_session(
            &mut progress,
            window,
            self.config.default_window_size,
            session.id,
            session.reference_time(),
            qualifying,
        );
        if !matches!(step, WindowStep::Unchanged { .. }) {
            self.store.save_window_progress(progress).await?;
        }
        debug!(task_code = %task.code, ?step, "rolling window updated");
        Ok(step)
    }

    /// Completed rows reduced to what the repeat gates read. Signatures that
    /// are missing or from an older version are re-derived from the event.
    async fn resolve_history(
        &self,
        history: &[TaskCompletion],
        signatures: &mut SignatureCache,
    ) -> Result<Vec<PastCompletion>, EngineError> {
        let mut past = Vec::new();
        for row in history.iter().filter(|c| c.is_completed()) {
            let signature = match (&row.event_signature, row.signature_version) {
                (Some(signature), Some(SIGNATURE_VERSION)) => Some(signature.clone()),
                _ => match row.event_id {
                    Some(event_id) => self.signature_of(event_id, signatures).await?,
                    None => None,
                },
            };
            past.push(PastCompletion {
                completed_at: row.completed_time(),
                event_id: row.event_id,
                signature,
            });
        }
        Ok(past)
    }

    async fn signature_of(
        &self,
        event_id: EventId,
        signatures: &mut SignatureCache,
    ) -> Result<Option<String>, EngineError> {
        if let Some(signature) = signatures.get(&event_id) {
            return Ok(Some(signature.clone()));
        }
        let Some(event) = self.catalog.event(event_id).await? else {
            debug!(%event_id, "event of a past completion is gone");
            return Ok(None);
        };
        let signature = rules::signature(&event);
        signatures.insert(event_id, signature.clone());
        Ok(Some(signature))
    }

    // ────────────────────────────────────────────────────────────────────────
    // loading
    // ────────────────────────────────────────────────────────────────────────

    async fn load_session(
        &self,
        driver_id: DriverId,
        participation_id: ParticipationId,
    ) -> Result<SessionContext, EngineError> {
        let participation = self
            .catalog
            .participation(participation_id)
            .await?
            .filter(|p| p.driver_id == driver_id)
            .ok_or_else(|| EngineError::not_found("participation", participation_id))?;
        let event = self
            .catalog
            .event(participation.event_id)
            .await?
            .ok_or_else(|| EngineError::not_found("event", participation.event_id))?;
        Ok(SessionContext {
            participation,
            event,
        })
    }

    async fn load_driver(&self, driver_id: DriverId) -> Result<Driver, EngineError> {
        self.catalog
            .driver(driver_id)
            .await?
            .ok_or_else(|| EngineError::not_found("driver", driver_id))
    }

    /// Active, event-related tasks of the event's discipline, restricted to
    /// the event's declared tasks when it declares any.
    async fn candidate_tasks(&self, event: &Event) -> Result<Vec<TaskDefinition>, EngineError> {
        let tasks = self.catalog.tasks_for_discipline(event.discipline).await?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.active && t.event_related)
            .filter(|t| event.task_codes.is_empty() || event.task_codes.contains(&t.code))
            .collect())
    }
}

fn open_row_for(
    history: &[TaskCompletion],
    participation_id: ParticipationId,
) -> Option<&TaskCompletion> {
    history
        .iter()
        .find(|c| c.participation_id == Some(participation_id) && c.status.is_open())
}

fn registration_skip_reason(task: &TaskDefinition, event: &Event, driver: &Driver) -> Option<String> {
    if !task.active {
        return Some("inactive".to_string());
    }
    if task.discipline != event.discipline {
        return Some(format!(
            "task discipline {} does not match event discipline {}",
            task.discipline, event.discipline
        ));
    }
    if task.scope != Scope::PerParticipation {
        return Some(format!("{} tasks are not pre-assigned", task.scope));
    }
    if let Some(min_tier) = task.requirements.min_tier
        && driver.tier.rank() < min_tier.rank()
    {
        return Some(format!("driver tier {} below minimum {min_tier}", driver.tier));
    }
    None
}

fn skipped(task: &TaskDefinition, reason: impl Into<String>) -> TaskOutcome {
    let reason = reason.into();
    debug!(task_code = %task.code, %reason, "task skipped");
    TaskOutcome::Skipped { reason }
}
