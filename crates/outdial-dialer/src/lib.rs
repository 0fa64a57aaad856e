//! The sequential campaign dialer.
//!
//! Walks a campaign's contact list in order, placing (or simulating) one call
//! per contact with fixed pacing, updating contact and agent status as it
//! goes, and tolerating per-contact failure without losing its place.
//!
//! Campaign runs are not fire-and-forget threads: a [`Dialer`] owns a bounded
//! queue and a fixed pool of worker tasks, keeps an observable registry of
//! queued and dialing runs, and carries a per-run cancellation flag checked
//! between contacts. At most `workers` campaigns dial concurrently; within a
//! campaign, contacts are strictly sequential.
//!
//! Two campaigns sharing an agent may interleave their writes to that agent's
//! `last_call_status`. That race is inherited from the data model
//! (last-writer-wins) and deliberately left unsynchronized.

mod run;

pub use run::{RunInfo, RunState};

use outdial_db::{DbPool, StoreError};
use outdial_providers::TelephonyClient;
use run::RunRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Pacing and outcome policy for campaign runs.
#[derive(Debug, Clone)]
pub struct DialerConfig {
    /// Fabricate call outcomes instead of invoking telephony.
    pub simulation: bool,
    /// Number of worker tasks; at most this many campaigns dial at once.
    pub workers: usize,
    /// Queued runs beyond the active ones.
    pub queue_capacity: usize,
    /// How long a fabricated call "rings" in simulation mode.
    pub simulated_call_duration: Duration,
    /// Pause between contacts in live mode.
    pub inter_call_delay: Duration,
    /// Pause between contacts in simulation mode (shorter: nothing real is
    /// being rate-limited).
    pub simulated_inter_call_delay: Duration,
    /// Probability that a simulated call completes. Illustrative, not
    /// security-sensitive; tests pin it to 1.0 or 0.0.
    pub success_rate: f64,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            simulation: false,
            workers: 2,
            queue_capacity: 32,
            simulated_call_duration: Duration::from_secs(3),
            inter_call_delay: Duration::from_secs(10),
            simulated_inter_call_delay: Duration::from_secs(5),
            success_rate: 0.8,
        }
    }
}

impl DialerConfig {
    fn pacing_delay(&self) -> Duration {
        if self.simulation {
            self.simulated_inter_call_delay
        } else {
            self.inter_call_delay
        }
    }
}

/// Errors surfaced when scheduling a run. Failures *inside* a run are
/// absorbed by the worker (logged, reflected in statuses) — there is nobody
/// left to return them to.
#[derive(Debug, Error)]
pub enum DialerError {
    #[error("campaign {0} is already queued or dialing")]
    AlreadyActive(i64),
    #[error("dial queue is full, campaign {0} not scheduled")]
    QueueFull(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("dialer task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Receipt returned by [`Dialer::enqueue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueReceipt {
    pub campaign_id: i64,
    /// Number of contacts that will be dialed.
    pub contacts: usize,
    /// Whether outcomes will be fabricated.
    pub simulation: bool,
}

/// The campaign dialer: bounded queue, worker pool, run registry.
///
/// Cheap to clone; all clones share the same queue and registry.
#[derive(Clone)]
pub struct Dialer {
    pool: DbPool,
    telephony: Option<Arc<TelephonyClient>>,
    config: Arc<DialerConfig>,
    queue: mpsc::Sender<i64>,
    runs: RunRegistry,
}

impl Dialer {
    /// Builds the dialer and spawns its worker tasks on the current runtime.
    ///
    /// `telephony` may be `None` only in simulation mode; a live dialer
    /// without a telephony client would mark every contact failed, so pass
    /// one whenever `config.simulation` is false.
    pub fn spawn(
        pool: DbPool,
        telephony: Option<Arc<TelephonyClient>>,
        config: DialerConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let dialer = Self {
            pool,
            telephony,
            config: Arc::new(config),
            queue: tx,
            runs: RunRegistry::new(),
        };

        let rx = Arc::new(Mutex::new(rx));
        for worker_id in 0..dialer.config.workers.max(1) {
            let dialer = dialer.clone();
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                loop {
                    let campaign_id = {
                        let mut rx = rx.lock().await;
                        match rx.recv().await {
                            Some(id) => id,
                            None => break,
                        }
                    };

                    tracing::debug!(worker_id, campaign_id, "worker picked up campaign");
                    dialer.runs.mark_dialing(campaign_id);
                    if let Err(e) = run::dial_campaign(&dialer, campaign_id).await {
                        tracing::error!(campaign_id, "campaign run failed: {}", e);
                    }
                    dialer.runs.finish(campaign_id);
                }
                tracing::debug!(worker_id, "dial queue closed, worker exiting");
            });
        }

        dialer
    }

    /// Marks the campaign `running` and schedules it for background dialing.
    ///
    /// Returns immediately after queueing; the run itself happens on a worker
    /// task. Scheduling fails if the campaign does not exist, is already
    /// queued or dialing, or the queue is full.
    pub async fn enqueue(&self, campaign_id: i64) -> Result<EnqueueReceipt, DialerError> {
        if !self.runs.try_register(campaign_id) {
            return Err(DialerError::AlreadyActive(campaign_id));
        }

        let pool = self.pool.clone();
        let prepared = tokio::task::spawn_blocking(move || -> Result<usize, StoreError> {
            let conn = outdial_db::conn(&pool)?;
            let campaign = outdial_db::get_campaign(&conn, campaign_id)?;
            let contacts = outdial_db::list_contacts(&conn, campaign.id)?;
            outdial_db::set_campaign_status(
                &conn,
                campaign.id,
                outdial_types::CampaignStatus::Running,
            )?;
            Ok(contacts.len())
        })
        .await?;

        let contacts = match prepared {
            Ok(count) => count,
            Err(e) => {
                self.runs.finish(campaign_id);
                return Err(e.into());
            }
        };

        if self.queue.try_send(campaign_id).is_err() {
            self.runs.finish(campaign_id);
            // No worker will ever pick this run up; put the status write back
            // so the campaign does not read as a phantom active run.
            let pool = self.pool.clone();
            let rollback = tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
                let conn = outdial_db::conn(&pool)?;
                outdial_db::set_campaign_status(
                    &conn,
                    campaign_id,
                    outdial_types::CampaignStatus::Pending,
                )
            })
            .await;
            match rollback {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(campaign_id, "failed to reset rejected campaign: {}", e)
                }
                Err(e) => tracing::error!(campaign_id, "status reset task failed: {}", e),
            }
            return Err(DialerError::QueueFull(campaign_id));
        }

        tracing::info!(
            campaign_id,
            contacts,
            simulation = self.config.simulation,
            "campaign queued for dialing"
        );
        Ok(EnqueueReceipt {
            campaign_id,
            contacts,
            simulation: self.config.simulation,
        })
    }

    /// Requests cancellation of a queued or dialing run. Takes effect before
    /// the next contact; the contact currently being dialed is not
    /// interrupted. Returns whether the campaign had an active run.
    pub fn cancel(&self, campaign_id: i64) -> bool {
        let found = self.runs.cancel(campaign_id);
        if found {
            tracing::info!(campaign_id, "campaign run cancellation requested");
        }
        found
    }

    /// Snapshot of the queued and dialing runs.
    pub fn active_runs(&self) -> Vec<RunInfo> {
        self.runs.snapshot()
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn telephony(&self) -> Option<&Arc<TelephonyClient>> {
        self.telephony.as_ref()
    }

    pub(crate) fn runs(&self) -> &RunRegistry {
        &self.runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_delay_follows_mode() {
        let mut config = DialerConfig {
            simulation: true,
            simulated_inter_call_delay: Duration::from_secs(5),
            inter_call_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(config.pacing_delay(), Duration::from_secs(5));

        config.simulation = false;
        assert_eq!(config.pacing_delay(), Duration::from_secs(10));
    }
}
