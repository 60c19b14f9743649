use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use cronplane_core::{Error, Result};

use crate::app::AppState;
use crate::http::ApiResult;

/// Header carrying the envelope kind on trigger notifications.
pub const MESSAGE_TYPE_HEADER: &str = "x-amz-sns-message-type";

const SUBSCRIPTION_CONFIRMATION: &str = "SubscriptionConfirmation";
const NOTIFICATION: &str = "Notification";

/// Outer notification envelope. Confirmation requests carry
/// `SubscribeURL`; notifications carry the fired event as a JSON string
/// in `Message`.
#[derive(Debug, Deserialize)]
pub struct TriggerEnvelope {
    #[serde(rename = "SubscribeURL", default)]
    pub subscribe_url: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

/// The rule ARN a scheduled-rule fire carries in its `resources` list.
fn rule_arn(message: &str) -> Result<String> {
    let event: serde_json::Value = serde_json::from_str(message)
        .map_err(|e| Error::InvalidInput(format!("trigger message: {e}")))?;
    event["resources"][0]
        .as_str()
        .map(String::from)
        .ok_or_else(|| Error::InvalidInput("trigger message has no rule ARN".into()))
}

/// POST /crons/trigger
///
/// Notifications arrive as text, not application/json, so the body is
/// decoded by hand. Confirming a subscription twice is a no-op on the
/// notification service side, so re-posts are safe.
pub async fn trigger_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<StatusCode> {
    let message_type = headers
        .get(MESSAGE_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::InvalidInput(format!("missing {MESSAGE_TYPE_HEADER} header")))?;
    let envelope: TriggerEnvelope = serde_json::from_str(&body)
        .map_err(|e| Error::InvalidInput(format!("trigger envelope: {e}")))?;

    match message_type {
        SUBSCRIPTION_CONFIRMATION => {
            let url = envelope
                .subscribe_url
                .ok_or_else(|| Error::InvalidInput("confirmation without SubscribeURL".into()))?;
            confirm_subscription(&state, &url).await?;
            info!("trigger subscription confirmed");
        }
        NOTIFICATION => {
            let message = envelope
                .message
                .ok_or_else(|| Error::InvalidInput("notification without Message".into()))?;
            let arn = rule_arn(&message)?;
            let task_id = state.lifecycle.handle_rule_trigger(&arn).await?;
            info!(rule_arn = %arn, task_id = %task_id, "trigger notification dispatched");
        }
        other => {
            warn!(message_type = other, "unrecognized trigger message type");
            return Err(Error::InvalidInput(format!("unknown message type {other}")).into());
        }
    }
    Ok(StatusCode::OK)
}

async fn confirm_subscription(state: &AppState, url: &str) -> Result<()> {
    let resp = state
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::UpstreamTimeout(format!("subscribe confirmation: {e}")))?;
    if !resp.status().is_success() {
        return Err(Error::UpstreamTimeout(format!(
            "subscribe confirmation returned {}",
            resp.status()
        )));
    }
    Ok(())
}
