//! Database-change webhooks for product reviews.
//!
//! The sender posts the changed row as `{ type, table, record, old_record }`
//! and signs the raw body with the shared `WEBHOOK_SECRET`. A new review
//! triggers a notification email to staff; a deleted review has its images
//! removed from the image store.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use skillsync_shared::constants::WEBHOOK_SIGNATURE_HEADER;
use skillsync_shared::signature::verify_hmac_signature;
use tracing::{info, warn};

use crate::api::{ApiResponse, AppState};
use crate::error::ServerError;
use crate::image_store::is_valid_key;
use crate::mailer::OutgoingEmail;

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewWebhookPayload {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub table: String,
    pub record: Option<ReviewRecord>,
    pub old_record: Option<ReviewRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRecord {
    pub id: String,
    pub product_id: Option<String>,
    pub user_id: Option<String>,
    pub rating: Option<u8>,
    pub title: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub image_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCreatedOutcome {
    pub review_id: String,
    pub notified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDeletedOutcome {
    pub review_id: String,
    pub images_deleted: usize,
    /// Keys that are not image-store keys (e.g. external URLs).
    pub images_skipped: usize,
}

/// Check the signature header, then parse the body.
fn verified_payload(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<ReviewWebhookPayload, ServerError> {
    let Some(secret) = state.config.webhook_secret.as_deref() else {
        return Err(ServerError::Forbidden(
            "Webhooks are disabled (no WEBHOOK_SECRET configured)".into(),
        ));
    };

    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Unauthorized("Missing webhook signature".into()))?;

    verify_hmac_signature(secret.as_bytes(), body, signature).map_err(|e| {
        warn!(error = %e, "Rejected webhook signature");
        ServerError::Unauthorized("Invalid webhook signature".into())
    })?;

    serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("Malformed webhook payload: {e}")))
}

pub async fn review_created(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<ReviewCreatedOutcome>>, ServerError> {
    let payload = verified_payload(&state, &headers, &body)?;
    let review = payload
        .record
        .ok_or_else(|| ServerError::BadRequest("Missing review record".into()))?;

    info!(
        review = %review.id,
        event = %payload.event_type,
        table = %payload.table,
        "Review created"
    );

    let notified = match (&state.mailer, &state.config.notify_email) {
        (Some(mailer), Some(to)) => {
            let email = review_notification(&state.config.email_from, to, &review);
            mailer.send(&email).await?;
            true
        }
        _ => {
            info!(review = %review.id, "Email not configured, skipping review notification");
            false
        }
    };

    Ok(Json(ApiResponse::ok(ReviewCreatedOutcome {
        review_id: review.id,
        notified,
    })))
}

pub async fn review_deleted(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<ReviewDeletedOutcome>>, ServerError> {
    let payload = verified_payload(&state, &headers, &body)?;
    let review = payload
        .old_record
        .or(payload.record)
        .ok_or_else(|| ServerError::BadRequest("Missing review record".into()))?;

    let (keys, skipped): (Vec<&String>, Vec<&String>) =
        review.image_keys.iter().partition(|k| is_valid_key(k));
    let images_skipped = skipped.len();
    for key in &skipped {
        warn!(review = %review.id, key = %key, "Skipping image reference that is not a store key");
    }

    let mut images_deleted = 0;
    for key in keys {
        if state.images.delete_image(key).await? {
            images_deleted += 1;
        }
    }

    info!(
        review = %review.id,
        images_deleted,
        images_skipped,
        "Review deleted, images cleaned up"
    );

    Ok(Json(ApiResponse::ok(ReviewDeletedOutcome {
        review_id: review.id,
        images_deleted,
        images_skipped,
    })))
}

/// Plain-text staff notification for a newly posted review.
pub fn review_notification(from: &str, to: &str, review: &ReviewRecord) -> OutgoingEmail {
    let mut text = String::from("A new review was posted.\n\n");
    text.push_str(&format!("Review: {}\n", review.id));
    if let Some(product) = &review.product_id {
        text.push_str(&format!("Product: {product}\n"));
    }
    if let Some(rating) = review.rating {
        let stars = rating.min(5) as usize;
        text.push_str(&format!(
            "Rating: {}{} ({rating}/5)\n",
            "★".repeat(stars),
            "☆".repeat(5 - stars)
        ));
    }
    if let Some(title) = &review.title {
        text.push_str(&format!("Title: {title}\n"));
    }
    if let Some(comment) = &review.comment {
        text.push_str(&format!("\n{comment}\n"));
    }

    OutgoingEmail {
        from: from.to_string(),
        to: vec![to.to_string()],
        subject: format!("New review posted ({})", review.id),
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_parses_database_webhook() {
        let json = r#"{
            "type": "DELETE",
            "table": "reviews",
            "schema": "public",
            "record": null,
            "old_record": {"id": "r1", "rating": 4, "image_keys": ["abc"]}
        }"#;
        let payload: ReviewWebhookPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.event_type, "DELETE");
        assert!(payload.record.is_none());
        let old = payload.old_record.unwrap();
        assert_eq!(old.rating, Some(4));
        assert_eq!(old.image_keys, vec!["abc".to_string()]);
    }

    #[test]
    fn test_notification_text() {
        let review = ReviewRecord {
            id: "r42".into(),
            product_id: Some("p7".into()),
            user_id: None,
            rating: Some(4),
            title: Some("Great course".into()),
            comment: Some("Learned a lot.".into()),
            image_keys: vec![],
        };
        let email = review_notification("from@x", "staff@x", &review);
        assert_eq!(email.to, vec!["staff@x".to_string()]);
        assert!(email.subject.contains("r42"));
        assert!(email.text.contains("★★★★☆ (4/5)"));
        assert!(email.text.contains("Learned a lot."));
    }
}
