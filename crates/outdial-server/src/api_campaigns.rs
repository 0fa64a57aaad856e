//! Campaign CRUD, run scheduling, status, and cancellation.

use crate::api::{run_blocking, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use outdial_db::{NewCampaign, StatusBreakdown};
use outdial_dialer::RunInfo;
use outdial_types::{Campaign, Contact};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for campaign creation.
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub agent_id: i64,
    /// Phone numbers in dial order.
    pub contacts: Vec<String>,
}

/// Campaign plus its contact rows, returned by the detail endpoint.
#[derive(Debug, Serialize)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub contacts: Vec<Contact>,
}

/// Campaign status summary: lifecycle state plus per-contact counts.
#[derive(Debug, Serialize)]
pub struct CampaignStatusResponse {
    pub campaign_id: i64,
    pub status: outdial_types::CampaignStatus,
    pub total_contacts: usize,
    pub breakdown: StatusBreakdown,
}

/// Handler for `POST /api/campaigns`.
pub async fn create_campaign_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignDetail>), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "campaign name must not be empty".into(),
        ));
    }
    if payload.contacts.is_empty() {
        return Err(ApiError::BadRequest(
            "a campaign needs at least one contact number".into(),
        ));
    }
    if payload.contacts.iter().any(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "contact numbers must not be empty".into(),
        ));
    }

    let detail = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        // Surfaces a 404 for an unknown agent before touching the campaign
        // tables; the foreign key would only give an opaque constraint error.
        outdial_db::get_agent(&conn, payload.agent_id)?;

        let campaign = outdial_db::create_campaign(
            &conn,
            &NewCampaign {
                name: payload.name,
                agent_id: payload.agent_id,
                contacts: payload.contacts,
            },
        )?;
        let contacts = outdial_db::list_contacts(&conn, campaign.id)?;
        Ok(CampaignDetail { campaign, contacts })
    })
    .await?;

    tracing::info!(
        campaign_id = detail.campaign.id,
        agent_id = detail.campaign.agent_id,
        contacts = detail.contacts.len(),
        "created campaign"
    );
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Handler for `GET /api/campaigns`.
pub async fn list_campaigns_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Campaign>>, ApiError> {
    let campaigns = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        Ok(outdial_db::list_campaigns(&conn)?)
    })
    .await?;
    Ok(Json(campaigns))
}

/// Handler for `GET /api/campaigns/:campaignId`.
pub async fn get_campaign_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(campaign_id): Path<i64>,
) -> Result<Json<CampaignDetail>, ApiError> {
    let detail = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        let campaign = outdial_db::get_campaign(&conn, campaign_id)?;
        let contacts = outdial_db::list_contacts(&conn, campaign.id)?;
        Ok(CampaignDetail { campaign, contacts })
    })
    .await?;
    Ok(Json(detail))
}

/// Handler for `POST /api/campaigns/:campaignId/run`: queues the campaign for
/// background dialing and returns immediately.
pub async fn run_campaign_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(campaign_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let receipt = state.dialer.enqueue(campaign_id).await?;
    Ok(Json(serde_json::json!({
        "campaign_id": receipt.campaign_id,
        "contacts": receipt.contacts,
        "simulation": receipt.simulation,
        "status": "running",
    })))
}

/// Handler for `GET /api/campaigns/:campaignId/status`: lifecycle state and a
/// per-contact status breakdown.
pub async fn campaign_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(campaign_id): Path<i64>,
) -> Result<Json<CampaignStatusResponse>, ApiError> {
    let response = run_blocking(move || {
        let conn = state.pool.get().map_err(|e| {
            ApiError::InternalServerError(format!("db connection failed: {e}"))
        })?;
        let campaign = outdial_db::get_campaign(&conn, campaign_id)?;
        let breakdown = outdial_db::campaign_status_breakdown(&conn, campaign.id)?;
        Ok(CampaignStatusResponse {
            campaign_id: campaign.id,
            status: campaign.status,
            total_contacts: breakdown.pending
                + breakdown.calling
                + breakdown.completed
                + breakdown.failed,
            breakdown,
        })
    })
    .await?;
    Ok(Json(response))
}

/// Handler for `POST /api/campaigns/:campaignId/cancel`: requests cancellation
/// of a queued or dialing run. Takes effect before the next contact.
pub async fn cancel_campaign_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(campaign_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.dialer.cancel(campaign_id) {
        return Err(ApiError::NotFound(format!(
            "campaign {campaign_id} has no active run"
        )));
    }
    Ok(Json(serde_json::json!({
        "campaign_id": campaign_id,
        "status": "cancelling",
    })))
}

/// Handler for `GET /api/campaigns/runs/active`: the dialer's view of queued
/// and dialing campaigns.
pub async fn active_runs_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Vec<RunInfo>> {
    Json(state.dialer.active_runs())
}
