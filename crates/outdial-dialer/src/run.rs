//! Run registry and the per-campaign dial loop.

use crate::{Dialer, DialerError};
use outdial_db::StoreError;
use outdial_types::{Agent, CallStatus, CampaignStatus, Contact, ContactStatus};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Where a campaign run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Accepted, waiting for a worker.
    Queued,
    /// A worker is walking the contact list.
    Dialing,
}

/// Snapshot of one active run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub campaign_id: i64,
    pub state: RunState,
    pub cancel_requested: bool,
}

struct RunEntry {
    state: RunState,
    cancelled: Arc<AtomicBool>,
}

/// Registry of queued and dialing runs.
///
/// A sync mutex is fine here: every access is a brief map operation that
/// never spans an `.await` point.
#[derive(Clone)]
pub(crate) struct RunRegistry {
    runs: Arc<Mutex<HashMap<i64, RunEntry>>>,
}

impl RunRegistry {
    pub(crate) fn new() -> Self {
        Self {
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a run as queued. Returns false if one is already active.
    pub(crate) fn try_register(&self, campaign_id: i64) -> bool {
        let mut runs = self.runs.lock().expect("run registry lock poisoned");
        if runs.contains_key(&campaign_id) {
            return false;
        }
        runs.insert(
            campaign_id,
            RunEntry {
                state: RunState::Queued,
                cancelled: Arc::new(AtomicBool::new(false)),
            },
        );
        true
    }

    pub(crate) fn mark_dialing(&self, campaign_id: i64) {
        if let Some(entry) = self
            .runs
            .lock()
            .expect("run registry lock poisoned")
            .get_mut(&campaign_id)
        {
            entry.state = RunState::Dialing;
        }
    }

    pub(crate) fn finish(&self, campaign_id: i64) {
        self.runs
            .lock()
            .expect("run registry lock poisoned")
            .remove(&campaign_id);
    }

    pub(crate) fn cancel(&self, campaign_id: i64) -> bool {
        match self
            .runs
            .lock()
            .expect("run registry lock poisoned")
            .get(&campaign_id)
        {
            Some(entry) => {
                entry.cancelled.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_cancelled(&self, campaign_id: i64) -> bool {
        self.runs
            .lock()
            .expect("run registry lock poisoned")
            .get(&campaign_id)
            .map(|entry| entry.cancelled.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub(crate) fn snapshot(&self) -> Vec<RunInfo> {
        let runs = self.runs.lock().expect("run registry lock poisoned");
        let mut infos: Vec<RunInfo> = runs
            .iter()
            .map(|(campaign_id, entry)| RunInfo {
                campaign_id: *campaign_id,
                state: entry.state,
                cancel_requested: entry.cancelled.load(Ordering::SeqCst),
            })
            .collect();
        infos.sort_by_key(|info| info.campaign_id);
        infos
    }
}

/// Walks one campaign's contact list. Runs on a worker task; errors that
/// reach the caller are logged there, never raised to an API client.
pub(crate) async fn dial_campaign(dialer: &Dialer, campaign_id: i64) -> Result<(), DialerError> {
    let pool = dialer.pool().clone();
    let loaded = tokio::task::spawn_blocking(
        move || -> Result<Option<(Agent, Vec<Contact>)>, StoreError> {
            let conn = outdial_db::conn(&pool)?;
            let campaign = match outdial_db::get_campaign(&conn, campaign_id) {
                Ok(campaign) => campaign,
                Err(StoreError::NotFound(..)) => return Ok(None),
                Err(e) => return Err(e),
            };
            let agent = match outdial_db::get_agent(&conn, campaign.agent_id) {
                Ok(agent) => agent,
                Err(StoreError::NotFound(..)) => return Ok(None),
                Err(e) => return Err(e),
            };
            let contacts = outdial_db::list_contacts(&conn, campaign.id)?;
            Ok(Some((agent, contacts)))
        },
    )
    .await??;

    let Some((agent, contacts)) = loaded else {
        // Nothing to report to: the run is background work and its owner may
        // have deleted the campaign or agent since it was queued.
        tracing::warn!(campaign_id, "campaign or agent missing, abandoning run");
        return Ok(());
    };

    tracing::info!(
        campaign_id,
        agent_id = agent.id,
        contacts = contacts.len(),
        simulation = dialer.config().simulation,
        llm = agent.llm_provider.as_str(),
        llm_model = %agent.llm_model,
        tts_voice = %agent.tts_voice_id,
        stt = agent.stt_provider.as_str(),
        "starting sequential dialing"
    );

    let total = contacts.len();
    for (index, contact) in contacts.into_iter().enumerate() {
        if dialer.runs().is_cancelled(campaign_id) {
            tracing::info!(
                campaign_id,
                dialed = index,
                remaining = total - index,
                "run cancelled, remaining contacts left pending"
            );
            return finish_run(dialer, campaign_id, agent.id, CampaignStatus::Cancelled).await;
        }

        tracing::info!(
            campaign_id,
            position = index + 1,
            total,
            number = %contact.phone_number,
            "dialing contact"
        );

        if let Err(e) = dial_one(dialer, &agent, &contact).await {
            // Per-contact failures are isolated: mark it failed and move on.
            tracing::warn!(
                campaign_id,
                contact_id = contact.id,
                number = %contact.phone_number,
                "contact processing failed: {}",
                e
            );
            mark_contact_failed(dialer, contact.id).await;
        }

        // Throttle between contacts, not after the last one.
        if index + 1 < total {
            tokio::time::sleep(dialer.config().pacing_delay()).await;
        }
    }

    finish_run(dialer, campaign_id, agent.id, CampaignStatus::Completed).await
}

/// Dials a single contact: status bookkeeping plus the simulated or live call.
async fn dial_one(dialer: &Dialer, agent: &Agent, contact: &Contact) -> Result<(), DialerError> {
    let pool = dialer.pool().clone();
    let (contact_id, agent_id) = (contact.id, agent.id);
    tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
        let conn = outdial_db::conn(&pool)?;
        outdial_db::set_contact_status(&conn, contact_id, ContactStatus::Calling)?;
        outdial_db::update_agent_call_status(&conn, agent_id, CallStatus::Calling)?;
        Ok(())
    })
    .await??;

    if dialer.config().simulation {
        tokio::time::sleep(dialer.config().simulated_call_duration).await;

        let completed = rand::thread_rng().gen::<f64>() < dialer.config().success_rate;
        let status = if completed {
            ContactStatus::Completed
        } else {
            ContactStatus::Failed
        };
        tracing::info!(
            contact_id,
            number = %contact.phone_number,
            outcome = status.as_str(),
            "simulated call finished"
        );

        let pool = dialer.pool().clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = outdial_db::conn(&pool)?;
            outdial_db::set_contact_status(&conn, contact_id, status)?;
            Ok(())
        })
        .await??;
        return Ok(());
    }

    match dialer.telephony() {
        Some(client) => match client.originate(&contact.phone_number, agent_id).await {
            Ok(call_sid) => {
                // The contact stays `calling`; its terminal status arrives on
                // the telephony status callback, outside this loop's control.
                tracing::info!(contact_id, call_sid = %call_sid, "call handed off to telephony");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    contact_id,
                    number = %contact.phone_number,
                    "call origination failed: {}",
                    e
                );
                mark_contact_failed(dialer, contact_id).await;
                Ok(())
            }
        },
        None => {
            tracing::error!(contact_id, "live mode without a telephony client");
            mark_contact_failed(dialer, contact_id).await;
            Ok(())
        }
    }
}

/// Best-effort failure marking; a second store error here is only logged.
async fn mark_contact_failed(dialer: &Dialer, contact_id: i64) {
    let pool = dialer.pool().clone();
    let result = tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
        let conn = outdial_db::conn(&pool)?;
        outdial_db::set_contact_status(&conn, contact_id, ContactStatus::Failed)?;
        Ok(())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(contact_id, "failed to mark contact failed: {}", e),
        Err(e) => tracing::error!(contact_id, "status task join error: {}", e),
    }
}

/// Seals a run: campaign status, and the agent reset to `idle` if no webhook
/// (or simulated outcome) moved it past `calling`.
async fn finish_run(
    dialer: &Dialer,
    campaign_id: i64,
    agent_id: i64,
    status: CampaignStatus,
) -> Result<(), DialerError> {
    let pool = dialer.pool().clone();
    tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
        let conn = outdial_db::conn(&pool)?;
        outdial_db::set_campaign_status(&conn, campaign_id, status)?;

        let agent = outdial_db::get_agent(&conn, agent_id)?;
        if agent.last_call_status == CallStatus::Calling {
            outdial_db::update_agent_call_status(&conn, agent_id, CallStatus::Idle)?;
        }
        Ok(())
    })
    .await??;

    tracing::info!(campaign_id, status = status.as_str(), "campaign run finished");
    Ok(())
}
