use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::dto::lead_dto::{LeadCreatedResponse, MiniAppLeadRequest};
use crate::error::{Error, Result};
use crate::models::lead::CreateLead;
use crate::services::lead_service::MINIAPP_SOURCE;
use crate::utils::telegram_auth::check_freshness;
use crate::utils::time::now;
use crate::AppState;

/// `POST /api/leads/miniapp`: stores a lead submitted from the Mini-App once
/// its init data is proven to come from Telegram.
pub async fn create_miniapp_lead(
    State(state): State<AppState>,
    Json(payload): Json<MiniAppLeadRequest>,
) -> Result<impl IntoResponse> {
    let parsed = state
        .init_data_verifier
        .verify(&payload.init_data)
        .map_err(|e| {
            tracing::warn!(error = %e, "rejected Mini-App init data");
            Error::from(e)
        })?;

    if let Some(max_age) = crate::config::get_config().init_data_max_age {
        check_freshness(&parsed, max_age, now()).map_err(|e| {
            tracing::warn!(error = %e, "rejected stale Mini-App init data");
            Error::from(e)
        })?;
    }

    let Some(user) = parsed.user else {
        tracing::warn!("rejected Mini-App init data without a user");
        return Err(Error::Unauthorized("init data has no user".to_string()));
    };

    let form = payload.form.normalized();
    form.validate()?;

    let (lead, is_new_user) = state
        .lead_service
        .record_lead(
            &user.first_name,
            user.username.as_deref(),
            CreateLead {
                telegram_id: user.id,
                name: form.name,
                niche: form.niche,
                contact: form.contact,
                source: MINIAPP_SOURCE.to_string(),
            },
        )
        .await?;

    tracing::info!(
        lead_id = %lead.id,
        user_id = user.id,
        new_user = is_new_user,
        "stored Mini-App lead"
    );

    if state.notification_service.is_enabled() {
        let notifications = state.notification_service.clone();
        let lead = lead.clone();
        tokio::spawn(async move {
            if let Err(e) = notifications.notify_new_lead(&lead, &user).await {
                tracing::warn!("Failed to notify owner about lead {}: {}", lead.id, e);
            }
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(LeadCreatedResponse {
            ok: true,
            lead_id: lead.id,
        }),
    ))
}
