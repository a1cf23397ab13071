//! Transport — performs the HTTP call for one assembled request.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::config::MandrillConfig;
use crate::envelope::{Endpoint, RecipientStatus, SendRequest};
use crate::error::{ConfigError, SendError};

/// Fallback reason when a rejected entry carries no `reject_reason`.
const GENERIC_REJECTION: &str = "Invalid API Request";

/// Posts request bodies to the provider.
///
/// Implementations must resolve exactly once per call, with the decoded
/// per-recipient statuses or an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        endpoint: Endpoint,
        request: &SendRequest,
    ) -> Result<Vec<RecipientStatus>, SendError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &MandrillConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self::with_client(client, &config.endpoint))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        endpoint: Endpoint,
        request: &SendRequest,
    ) -> Result<Vec<RecipientStatus>, SendError> {
        let resp = self
            .client
            .post(self.url(endpoint))
            .json(request)
            .send()
            .await
            .map_err(|e| SendError::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SendError::Http(e.to_string()))?;

        tracing::debug!(status = %status, path = endpoint.path(), "Mandrill responded");

        check_response(status, &body)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Reply {
    Many(Vec<RecipientStatus>),
    One(RecipientStatus),
}

/// Turn a raw provider response into statuses or the first error it carries.
///
/// A non-success status becomes [`SendError::Api`] with the body's `message`.
/// A success body is scanned in order; the first `rejected` / `invalid`
/// entry becomes [`SendError::Rejected`].
pub fn check_response(status: StatusCode, body: &str) -> Result<Vec<RecipientStatus>, SendError> {
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

        tracing::warn!(status = %status, %message, "Mandrill request failed");
        return Err(SendError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let statuses = match serde_json::from_str::<Reply>(body) {
        Ok(Reply::Many(statuses)) => statuses,
        Ok(Reply::One(status)) => vec![status],
        Err(e) => return Err(SendError::InvalidResponse(e.to_string())),
    };

    if let Some(failed) = statuses.iter().find(|s| s.is_failure()) {
        let reason = failed
            .reject_reason
            .clone()
            .unwrap_or_else(|| GENERIC_REJECTION.to_string());
        tracing::warn!(email = ?failed.email, %reason, "Mandrill rejected recipient");
        return Err(SendError::Rejected {
            email: failed.email.clone(),
            reason,
        });
    }

    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_array_is_decoded() {
        let body = r#"[{"email":"a@x.com","status":"sent","_id":"abc"},{"email":"b@x.com","status":"queued"}]"#;
        let statuses = check_response(StatusCode::OK, body).unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].id.as_deref(), Some("abc"));
        assert_eq!(statuses[1].status.as_deref(), Some("queued"));
    }

    #[test]
    fn empty_entry_is_success() {
        let statuses = check_response(StatusCode::OK, "[{}]").unwrap();
        assert_eq!(statuses, vec![RecipientStatus::default()]);
    }

    #[test]
    fn rejected_entry_becomes_error() {
        let body = r#"[{"status":"rejected","reject_reason":"fail"}]"#;
        let err = check_response(StatusCode::OK, body).unwrap_err();
        assert_eq!(err.to_string(), "fail");
    }

    #[test]
    fn first_failure_in_response_order_wins() {
        let body = r#"[
            {"email":"a@x.com","status":"sent"},
            {"email":"b@x.com","status":"invalid"},
            {"email":"c@x.com","status":"rejected","reject_reason":"spam"}
        ]"#;
        let err = check_response(StatusCode::OK, body).unwrap_err();
        assert_eq!(
            err,
            SendError::Rejected {
                email: Some("b@x.com".into()),
                reason: GENERIC_REJECTION.into(),
            }
        );
    }

    #[test]
    fn single_object_body_is_scanned_too() {
        let body = r#"{"status":"rejected","reject_reason":"unsigned"}"#;
        let err = check_response(StatusCode::OK, body).unwrap_err();
        assert_eq!(err.to_string(), "unsigned");
    }

    #[test]
    fn http_failure_uses_body_message() {
        let body = r#"{"status":"error","code":-1,"name":"Invalid_Key","message":"Invalid API key"}"#;
        let err = check_response(StatusCode::INTERNAL_SERVER_ERROR, body).unwrap_err();
        assert_eq!(
            err,
            SendError::Api {
                status: 500,
                message: "Invalid API key".into(),
            }
        );
    }

    #[test]
    fn http_failure_without_body_uses_status_reason() {
        let err = check_response(StatusCode::BAD_GATEWAY, "").unwrap_err();
        assert_eq!(err.to_string(), "Bad Gateway");
    }

    #[test]
    fn garbage_success_body_is_invalid_response() {
        let err = check_response(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, SendError::InvalidResponse(_)));
    }

    #[test]
    fn url_joins_base_and_endpoint() {
        let transport = HttpTransport::with_client(reqwest::Client::new(), "http://localhost:1/api/1.0/");
        assert_eq!(
            transport.url(Endpoint::Send),
            "http://localhost:1/api/1.0/messages/send.json"
        );
    }
}
