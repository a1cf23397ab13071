//! Wire types for the Mandrill `messages/send*` endpoints.
//!
//! A [`SendRequest`] is an owned snapshot: every nested list and map belongs
//! to the request alone, so one request can be rewritten without touching
//! the message it was assembled from or any sibling request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which API method a request is posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `messages/send-template.json` — server-side template rendering.
    SendTemplate,
    /// `messages/send.json` — caller-supplied HTML / text bodies.
    Send,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::SendTemplate => "/messages/send-template.json",
            Self::Send => "/messages/send.json",
        }
    }
}

/// Recipient header kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

/// Template merge syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeLanguage {
    #[default]
    Mailchimp,
    Handlebars,
}

impl MergeLanguage {
    /// `"handlebars"` selects Handlebars; anything else falls back to Mailchimp.
    pub fn from_name(name: &str) -> Self {
        match name {
            "handlebars" => Self::Handlebars,
            _ => Self::Mailchimp,
        }
    }
}

/// One entry of `message.to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: RecipientKind,
}

/// A named merge value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeVar {
    pub name: String,
    pub content: Value,
}

impl MergeVar {
    pub fn new(name: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Merge variables scoped to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientMergeVars {
    pub rcpt: String,
    pub vars: Vec<MergeVar>,
}

/// Metadata scoped to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientMetadata {
    pub rcpt: String,
    pub values: Map<String, Value>,
}

/// An attachment or inline image, base64 content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub mime_type: String,
    pub name: String,
    pub content: String,
}

/// Editable template region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateContent {
    pub name: String,
    pub content: String,
}

/// Raw bodies. Both fields are always sent together; an unset one is `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBody {
    #[serde(with = "content_or_false")]
    pub html: Option<String>,
    #[serde(with = "content_or_false")]
    pub text: Option<String>,
}

/// The `message` object of a send request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaccount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcc_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub to: Vec<Recipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub important: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_text: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_recipients: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_language: Option<MergeLanguage>,
    #[serde(default)]
    pub global_merge_vars: Vec<MergeVar>,
    #[serde(default)]
    pub merge_vars: Vec<RecipientMergeVars>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub images: Vec<Attachment>,
    #[serde(default)]
    pub recipient_metadata: Vec<RecipientMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_clicks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_opens: Option<bool>,
    #[serde(flatten)]
    pub body: Option<RawBody>,
}

/// A complete request body for one API call.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_content: Option<Vec<TemplateContent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<String>,
    pub message: MessagePayload,
}

impl SendRequest {
    /// Raw bodies go to `send.json`, everything else is templated.
    pub fn endpoint(&self) -> Endpoint {
        if self.message.body.is_some() {
            Endpoint::Send
        } else {
            Endpoint::SendTemplate
        }
    }
}

impl std::fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendRequest")
            .field("key", &"[REDACTED]")
            .field("template_name", &self.template_name)
            .field("template_content", &self.template_content)
            .field("send_at", &self.send_at)
            .field("message", &self.message)
            .finish()
    }
}

/// Per-recipient result returned by a successful send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientStatus {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reject_reason: Option<String>,
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
}

impl RecipientStatus {
    /// `rejected` and `invalid` entries count as failures.
    pub fn is_failure(&self) -> bool {
        matches!(self.status.as_deref(), Some("rejected" | "invalid"))
    }
}

/// Serializes `None` as `false`, matching the provider's "unset body" marker.
mod content_or_false {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(content) => s.serialize_str(content),
            None => s.serialize_bool(false),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Content(String),
        Flag(bool),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Wire::deserialize(d)? {
            Wire::Content(content) => Some(content),
            Wire::Flag(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Option<RawBody>) -> SendRequest {
        SendRequest {
            key: "k".into(),
            template_name: None,
            template_content: None,
            send_at: None,
            message: MessagePayload {
                body,
                ..Default::default()
            },
        }
    }

    #[test]
    fn unset_body_serializes_as_false() {
        let req = request(Some(RawBody {
            html: Some("<h1>Hi</h1>".into()),
            text: None,
        }));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["message"]["html"], json!("<h1>Hi</h1>"));
        assert_eq!(value["message"]["text"], json!(false));
        assert!(value.get("template_name").is_none());
        assert_eq!(req.endpoint(), Endpoint::Send);
    }

    #[test]
    fn templated_request_has_no_body_fields() {
        let req = request(None);
        let value = serde_json::to_value(&req).unwrap();
        assert!(value["message"].get("html").is_none());
        assert!(value["message"].get("text").is_none());
        assert!(value["message"].get("subject").is_none());
        assert_eq!(req.endpoint(), Endpoint::SendTemplate);
        assert_eq!(req.endpoint().path(), "/messages/send-template.json");
    }

    #[test]
    fn recipient_kind_serializes_as_type() {
        let rcpt = Recipient {
            email: "a@b.c".into(),
            name: None,
            kind: RecipientKind::Bcc,
        };
        assert_eq!(
            serde_json::to_value(&rcpt).unwrap(),
            json!({"email": "a@b.c", "type": "bcc"})
        );
    }

    #[test]
    fn body_false_marker_deserializes_to_none() {
        let body: RawBody =
            serde_json::from_value(json!({"html": false, "text": "plain"})).unwrap();
        assert_eq!(body.html, None);
        assert_eq!(body.text.as_deref(), Some("plain"));
    }

    #[test]
    fn merge_language_falls_back_to_mailchimp() {
        assert_eq!(MergeLanguage::from_name("handlebars"), MergeLanguage::Handlebars);
        assert_eq!(MergeLanguage::from_name("some-wrong-language"), MergeLanguage::Mailchimp);
    }

    #[test]
    fn recipient_status_failure_detection() {
        let statuses: Vec<RecipientStatus> = serde_json::from_value(json!([
            {"email": "a@b.c", "status": "sent", "_id": "1"},
            {"email": "d@e.f", "status": "rejected", "reject_reason": "hard-bounce"},
            {"status": "invalid"},
            {}
        ]))
        .unwrap();
        let failures: Vec<bool> = statuses.iter().map(RecipientStatus::is_failure).collect();
        assert_eq!(failures, vec![false, true, true, false]);
        assert_eq!(statuses[0].id.as_deref(), Some("1"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut req = request(None);
        req.key = "secret-key".into();
        assert!(!format!("{req:?}").contains("secret-key"));
    }
}
