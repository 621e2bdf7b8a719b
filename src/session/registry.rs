// src/session/registry.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use uuid::Uuid;

use super::attempt::{Attempt, Confirmation, Navigation, Phase, SessionError, SessionView, Tick};
use crate::{error::AppError, store::Store};

const TICK: Duration = Duration::from_secs(1);

/// How long a timed-out session whose automatic submit failed stays open for
/// a manual retry before it is dropped.
pub const EXPIRED_GRACE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

#[derive(Debug, Serialize)]
pub struct SubmissionReceipt {
    pub result_id: i64,
    pub score: i64,
    pub total_marks: i64,
    pub percentage: Option<f64>,
    pub trigger: SubmitTrigger,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Submitted(SubmissionReceipt),
    /// Another submission was already in flight; this one was dropped.
    Ignored,
}

struct SessionSlot {
    owner: i64,
    attempt: Mutex<Attempt>,
    countdown: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionSlot {
    fn replace_countdown(&self, handle: JoinHandle<()>) {
        let mut guard = self.countdown.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(old) = guard.replace(handle) {
            old.abort();
        }
    }

    /// Aborts the countdown task, unless `abort` is false (the task is the
    /// caller and will finish on its own).
    fn stop_countdown(&self, abort: bool) {
        let handle = self
            .countdown
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let (Some(handle), true) = (handle, abort) {
            handle.abort();
        }
    }
}

/// In-progress test-taking sessions, keyed by session id.
///
/// Each session owns at most one countdown task. The task is aborted whenever
/// the session leaves `InProgress` and re-armed if a failed submission puts
/// it back with time left.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<StdMutex<HashMap<Uuid, Arc<SessionSlot>>>>,
    store: Arc<dyn Store>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            sessions: Arc::new(StdMutex::new(HashMap::new())),
            store,
        }
    }

    fn lock_map(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<SessionSlot>>> {
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock_map().contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.lock_map().len()
    }

    /// Loads the test once and opens a session on it. A missing test or a
    /// store failure leaves nothing behind.
    pub async fn start(&self, test_id: i64, user_id: i64) -> Result<SessionView, AppError> {
        let test = self
            .store
            .get_test_by_id(test_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Test not found".to_string()))?;

        let id = Uuid::new_v4();
        let attempt = Attempt::new(Arc::new(test), user_id);
        let view = attempt.view(id);

        let slot = Arc::new(SessionSlot {
            owner: user_id,
            attempt: Mutex::new(attempt),
            countdown: StdMutex::new(None),
        });
        self.lock_map().insert(id, slot.clone());
        self.arm_countdown(id, &slot);

        tracing::info!(session = %id, test_id, user_id, "Session started");
        Ok(view)
    }

    fn slot(&self, id: Uuid, user_id: i64) -> Result<Arc<SessionSlot>, AppError> {
        self.lock_map()
            .get(&id)
            .filter(|slot| slot.owner == user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }

    pub async fn view(&self, id: Uuid, user_id: i64) -> Result<SessionView, AppError> {
        let slot = self.slot(id, user_id)?;
        let attempt = slot.attempt.lock().await;
        Ok(attempt.view(id))
    }

    pub async fn select(
        &self,
        id: Uuid,
        user_id: i64,
        question_id: i64,
        option: &str,
    ) -> Result<SessionView, AppError> {
        let slot = self.slot(id, user_id)?;
        let mut attempt = slot.attempt.lock().await;
        attempt.select(question_id, option)?;
        Ok(attempt.view(id))
    }

    pub async fn navigate(
        &self,
        id: Uuid,
        user_id: i64,
        nav: Navigation,
    ) -> Result<SessionView, AppError> {
        let slot = self.slot(id, user_id)?;
        let mut attempt = slot.attempt.lock().await;
        attempt.navigate(nav);
        Ok(attempt.view(id))
    }

    pub async fn confirmation(&self, id: Uuid, user_id: i64) -> Result<Confirmation, AppError> {
        let slot = self.slot(id, user_id)?;
        let attempt = slot.attempt.lock().await;
        Ok(attempt.confirmation())
    }

    pub async fn submit(&self, id: Uuid, user_id: i64) -> Result<SubmitOutcome, AppError> {
        let slot = self.slot(id, user_id)?;
        self.submit_slot(id, &slot, SubmitTrigger::Manual).await
    }

    /// Leaves the session without recording a result.
    pub async fn abandon(&self, id: Uuid, user_id: i64) -> Result<(), AppError> {
        let slot = self.slot(id, user_id)?;
        self.lock_map().remove(&id);
        slot.stop_countdown(true);
        slot.attempt.lock().await.abandon();
        tracing::info!(session = %id, "Session abandoned");
        Ok(())
    }

    async fn submit_slot(
        &self,
        id: Uuid,
        slot: &Arc<SessionSlot>,
        trigger: SubmitTrigger,
    ) -> Result<SubmitOutcome, AppError> {
        let pending = {
            let mut attempt = slot.attempt.lock().await;
            match attempt.begin_submit() {
                Ok(pending) => pending,
                Err(SessionError::SubmitInFlight) => return Ok(SubmitOutcome::Ignored),
                Err(e) => return Err(e.into()),
            }
        };
        slot.stop_countdown(trigger == SubmitTrigger::Manual);

        let stored = self.store.submit_result(pending.result).await;

        let mut attempt = slot.attempt.lock().await;
        match stored {
            Ok(row) => {
                attempt.submission_succeeded();
                drop(attempt);
                self.lock_map().remove(&id);
                tracing::info!(
                    session = %id,
                    result_id = row.id,
                    score = row.score,
                    total_marks = row.total_marks,
                    ?trigger,
                    "Session submitted"
                );
                Ok(SubmitOutcome::Submitted(SubmissionReceipt {
                    result_id: row.id,
                    score: pending.score.score,
                    total_marks: pending.score.total_marks,
                    percentage: pending.score.percentage(),
                    trigger,
                }))
            }
            Err(e) => {
                attempt.submission_failed();
                if attempt.phase() == Phase::InProgress && attempt.remaining_secs() > 0 {
                    self.arm_countdown(id, slot);
                }
                tracing::warn!(session = %id, ?trigger, "Submission failed, answers kept");
                Err(e.into())
            }
        }
    }

    fn arm_countdown(&self, id: Uuid, slot: &Arc<SessionSlot>) {
        let registry = self.clone();
        let task_slot = slot.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            loop {
                interval.tick().await;
                let tick = task_slot.attempt.lock().await.tick();
                match tick {
                    Tick::Running(_) => continue,
                    Tick::Idle => return,
                    Tick::Expired => {
                        tracing::info!(session = %id, "Time is up, submitting automatically");
                        if let Err(e) = registry
                            .submit_slot(id, &task_slot, SubmitTrigger::Timeout)
                            .await
                        {
                            tracing::error!(session = %id, "Automatic submission failed: {}", e);
                            tokio::time::sleep(EXPIRED_GRACE).await;
                            registry.evict_expired(id, &task_slot).await;
                        }
                        return;
                    }
                }
            }
        });

        slot.replace_countdown(handle);
    }

    /// Drops a session left open after a failed automatic submit, unless a
    /// retry is in flight or already went through.
    async fn evict_expired(&self, id: Uuid, slot: &Arc<SessionSlot>) {
        let mut attempt = slot.attempt.lock().await;
        if attempt.phase() != Phase::InProgress {
            return;
        }
        let removed = {
            let mut sessions = self.lock_map();
            match sessions.get(&id) {
                Some(current) if Arc::ptr_eq(current, slot) => sessions.remove(&id).is_some(),
                _ => false,
            }
        };
        if removed {
            attempt.abandon();
            tracing::warn!(session = %id, "Expired session dropped without a result");
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UnknownQuestion(_) | SessionError::UnknownOption { .. } => {
                AppError::BadRequest(err.to_string())
            }
            SessionError::NotInProgress | SessionError::SubmitInFlight => {
                AppError::Conflict(err.to_string())
            }
            SessionError::Finished => AppError::NotFound(err.to_string()),
        }
    }
}
