//! Turns a fresh check result into a status transition and decides whether
//! anyone should be told about it.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::events::EventBroadcaster;
use crate::models::{CheckResult, MonitorConfig, MonitorStatus};
use crate::notifications::NotificationDispatcher;
use crate::repository::{CheckRepository, MonitorRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What one evaluation concluded; mostly useful for callers that want to
/// surface the outcome (manual triggers, tests).
#[derive(Debug, Clone, Copy)]
pub struct Evaluation {
    pub new_status: MonitorStatus,
    pub transitioned: bool,
    pub notified: bool,
}

pub struct StatusEvaluator {
    monitors: Arc<dyn MonitorRepository>,
    checks: Arc<dyn CheckRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    events: EventBroadcaster,
}

impl StatusEvaluator {
    pub fn new(
        monitors: Arc<dyn MonitorRepository>,
        checks: Arc<dyn CheckRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            monitors,
            checks,
            dispatcher,
            events,
        }
    }

    /// Persists the check, applies the status state machine and fires the
    /// notification on a transition. Concurrent checks for the same monitor
    /// may complete out of order; status is last-writer-wins and the
    /// notification decision is best-effort against the persisted history.
    pub async fn process(
        &self,
        monitor: &MonitorConfig,
        check: CheckResult,
    ) -> Result<Evaluation, EvaluatorError> {
        self.checks.save(&check).await?;

        // The tick snapshot can be stale by the time the check completes;
        // re-read the stored status so a transition is judged against the
        // latest write, not against the scan-time view.
        let prior_status = self
            .monitors
            .find_by_id(check.monitor_id)
            .await?
            .map(|m| m.current_status)
            .unwrap_or(monitor.current_status);

        self.events.monitor_update(monitor, &check);

        if prior_status == MonitorStatus::Maintenance {
            debug!(
                monitor_id = check.monitor_id,
                "monitor in maintenance, suppressing transition"
            );
            self.monitors
                .update_status(check.monitor_id, MonitorStatus::Maintenance, check.timestamp)
                .await?;
            return Ok(Evaluation {
                new_status: MonitorStatus::Maintenance,
                transitioned: false,
                notified: false,
            });
        }

        let new_status = check.status();
        let transitioned = new_status != prior_status;
        self.monitors
            .update_status(check.monitor_id, new_status, check.timestamp)
            .await?;

        if transitioned {
            info!(
                monitor_id = check.monitor_id,
                name = %monitor.name,
                from = %prior_status,
                to = %new_status,
                "monitor status transition"
            );
        }

        // The very first completed check always notifies, whatever its
        // outcome; after that, only a flip in is_up does.
        let notify = prior_status == MonitorStatus::Pending
            || self.should_notify(check.monitor_id, &check, transitioned).await;

        if notify {
            // Delivery failures must never bounce back into the check path.
            if let Err(e) = self.dispatcher.notify(monitor, &check, transitioned).await {
                error!(
                    monitor_id = check.monitor_id,
                    error = %e,
                    "failed to send status notification"
                );
            }
        }

        Ok(Evaluation {
            new_status,
            transitioned,
            notified: notify,
        })
    }

    /// Compares the freshly persisted check against its predecessor. Fewer
    /// than two stored checks means this is the first one: notify. A failed
    /// history read falls back to the in-memory transition flag.
    async fn should_notify(&self, monitor_id: i32, check: &CheckResult, transitioned: bool) -> bool {
        match self.checks.recent_checks(monitor_id, 2).await {
            Ok(recent) if recent.len() >= 2 => recent[1].is_up != check.is_up,
            Ok(_) => true,
            Err(e) => {
                warn!(monitor_id, error = %e, "could not read recent checks");
                transitioned
            }
        }
    }
}
