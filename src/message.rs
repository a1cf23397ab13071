//! Message draft — chained configuration and request assembly.
//!
//! A [`Message`] only accumulates state. [`Message::assemble`] turns it into
//! an owned [`SendRequest`] and never mutates the draft, so a message can be
//! assembled (and sent) any number of times.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::address::{Address, parse_address};
use crate::envelope::{
    Attachment, MergeLanguage, MergeVar, MessagePayload, RawBody, Recipient, RecipientKind,
    RecipientMergeVars, RecipientMetadata, SendRequest, TemplateContent,
};
use crate::recipients::{Admission, RecipientLedger};

/// Format the provider expects for `send_at` (always UTC).
const SEND_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Per-recipient data supplied alongside a `to`/`cc`/`bcc` call.
///
/// An explicitly empty set (`vars([])`) still registers the recipient in the
/// side-table; an untouched one does not.
#[derive(Debug, Clone, Default)]
pub struct RecipientData {
    vars: Option<Vec<MergeVar>>,
    metadata: Option<Map<String, Value>>,
}

impl RecipientData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var(mut self, name: impl Into<String>, content: impl Into<Value>) -> Self {
        self.vars
            .get_or_insert_with(Vec::new)
            .push(MergeVar::new(name, content));
        self
    }

    pub fn vars(mut self, vars: impl IntoIterator<Item = MergeVar>) -> Self {
        self.vars.get_or_insert_with(Vec::new).extend(vars);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// A message being configured for sending.
#[derive(Clone, Default)]
pub struct Message {
    api_key: String,
    template: Option<String>,
    template_content: Vec<TemplateContent>,
    html: Option<String>,
    text: Option<String>,
    subject: Option<String>,
    from: Option<Address>,
    intercept: Option<Address>,
    skip: bool,
    subaccount: Option<String>,
    bcc_address: Option<String>,
    headers: BTreeMap<String, String>,
    important: Option<bool>,
    auto_text: Option<bool>,
    preserve_recipients: Option<bool>,
    track_clicks: Option<bool>,
    track_opens: Option<bool>,
    merge_language: Option<MergeLanguage>,
    global_merge_vars: Vec<MergeVar>,
    ledger: RecipientLedger,
    duplicates: Vec<String>,
    tags: Vec<String>,
    metadata: Map<String, Value>,
    attachments: Vec<Attachment>,
    images: Vec<Attachment>,
    send_at: Option<String>,
}

impl Message {
    /// An empty message in templated mode with no template selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// A message using the named template.
    pub fn with_template(template: impl Into<String>) -> Self {
        Self::new().template(template)
    }

    // ── Content ─────────────────────────────────────────────────────

    /// Select a template. Clears any raw HTML / text body.
    pub fn template(mut self, name: impl Into<String>) -> Self {
        self.template = Some(name.into());
        self.html = None;
        self.text = None;
        self
    }

    pub fn template_content(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.template_content.push(TemplateContent {
            name: name.into(),
            content: content.into(),
        });
        self
    }

    /// Raw HTML body. Switches to raw-content mode and clears the template.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self.template = None;
        self
    }

    /// Plain-text body. Switches to raw-content mode.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn merge_language(mut self, language: &str) -> Self {
        self.merge_language = Some(MergeLanguage::from_name(language));
        self
    }

    // ── Addressing ──────────────────────────────────────────────────

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Sender, as `Name <addr>` or a bare address.
    pub fn from(mut self, from: &str) -> Self {
        self.from = parse_address(from);
        if self.from.is_none() {
            warn!("Ignoring empty from address");
        }
        self
    }

    /// Redirect all delivery of this message to `address`.
    pub fn intercept(mut self, address: &str) -> Self {
        self.intercept = parse_address(address);
        if self.intercept.is_none() {
            warn!("Ignoring empty interception address");
        }
        self
    }

    pub fn to(self, address: &str) -> Self {
        self.add_recipient(address, RecipientKind::To, RecipientData::default())
    }

    pub fn to_with(self, address: &str, data: RecipientData) -> Self {
        self.add_recipient(address, RecipientKind::To, data)
    }

    pub fn cc(self, address: &str) -> Self {
        self.add_recipient(address, RecipientKind::Cc, RecipientData::default())
    }

    pub fn cc_with(self, address: &str, data: RecipientData) -> Self {
        self.add_recipient(address, RecipientKind::Cc, data)
    }

    pub fn bcc(self, address: &str) -> Self {
        self.add_recipient(address, RecipientKind::Bcc, RecipientData::default())
    }

    pub fn bcc_with(self, address: &str, data: RecipientData) -> Self {
        self.add_recipient(address, RecipientKind::Bcc, data)
    }

    fn add_recipient(mut self, address: &str, kind: RecipientKind, data: RecipientData) -> Self {
        if let Admission::Duplicate(email) =
            self.ledger.add(address, kind, data.vars, data.metadata)
        {
            self.duplicates.push(email);
        }
        self
    }

    /// Address that receives a BCC of every message.
    pub fn global_bcc(mut self, email: impl Into<String>) -> Self {
        self.bcc_address = Some(email.into());
        self
    }

    pub fn subaccount(mut self, subaccount: impl Into<String>) -> Self {
        self.subaccount = Some(subaccount.into());
        self
    }

    // ── Merge data ──────────────────────────────────────────────────

    pub fn global_merge_var(mut self, name: impl Into<String>, content: impl Into<Value>) -> Self {
        self.global_merge_vars.push(MergeVar::new(name, content));
        self
    }

    pub fn global_merge_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.global_merge_vars
            .extend(vars.into_iter().map(|(k, v)| MergeVar::new(k, v)));
        self
    }

    /// Append merge vars for `rcpt`.
    pub fn merge_var(mut self, rcpt: &str, name: impl Into<String>, content: impl Into<Value>) -> Self {
        self.ledger
            .push_merge_vars(rcpt, [MergeVar::new(name, content)]);
        self
    }

    pub fn merge_vars<K, V>(mut self, rcpt: &str, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.ledger
            .push_merge_vars(rcpt, vars.into_iter().map(|(k, v)| MergeVar::new(k, v)));
        self
    }

    /// Merge metadata for `rcpt`; existing keys are overwritten.
    pub fn recipient_metadata<K, V>(mut self, rcpt: &str, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.ledger
            .merge_metadata(rcpt, values.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata_map<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.metadata
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    // ── Headers, tags, files ────────────────────────────────────────

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn remove_header(mut self, key: &str) -> Self {
        self.headers.remove(key);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<T: Into<String>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Attach a file; `content` is base64.
    pub fn attach(
        mut self,
        mime_type: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.attachments.push(Attachment {
            mime_type: mime_type.into(),
            name: name.into(),
            content: content.into(),
        });
        self
    }

    /// Inline image referenced from the HTML as `cid:<name>`.
    pub fn image(
        mut self,
        mime_type: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.images.push(Attachment {
            mime_type: mime_type.into(),
            name: name.into(),
            content: content.into(),
        });
        self
    }

    // ── Flags ───────────────────────────────────────────────────────

    pub fn important(mut self, important: bool) -> Self {
        self.important = Some(important);
        self
    }

    pub fn auto_text(mut self, auto_text: bool) -> Self {
        self.auto_text = Some(auto_text);
        self
    }

    pub fn preserve_recipients(mut self, preserve: bool) -> Self {
        self.preserve_recipients = Some(preserve);
        self
    }

    pub fn track_clicks(mut self, track: bool) -> Self {
        self.track_clicks = Some(track);
        self
    }

    pub fn track_opens(mut self, track: bool) -> Self {
        self.track_opens = Some(track);
        self
    }

    /// When set, `send` reports success without calling the API.
    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn send_at(mut self, at: DateTime<Utc>) -> Self {
        self.send_at = Some(at.format(SEND_AT_FORMAT).to_string());
        self
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn recipients(&self) -> &[Recipient] {
        self.ledger.recipients()
    }

    pub fn ledger(&self) -> &RecipientLedger {
        &self.ledger
    }

    /// Addresses that were added more than once, in the order seen.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    pub fn interceptor(&self) -> Option<&Address> {
        self.intercept.as_ref()
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub fn template_name(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Whether a raw HTML or text body has been set.
    pub fn is_raw(&self) -> bool {
        self.html.is_some() || self.text.is_some()
    }

    // ── Assembly ────────────────────────────────────────────────────

    /// Build an owned request body from the current state.
    pub fn assemble(&self) -> SendRequest {
        let raw = self.is_raw();

        let message = MessagePayload {
            subaccount: self.subaccount.clone(),
            subject: self.subject.clone(),
            bcc_address: self.bcc_address.clone(),
            from_email: self.from.as_ref().map(|a| a.email.clone()),
            from_name: self.from.as_ref().and_then(|a| a.name.clone()),
            headers: self.headers.clone(),
            to: self.ledger.recipients().to_vec(),
            important: self.important,
            auto_text: self.auto_text,
            preserve_recipients: self.preserve_recipients,
            merge_language: self.merge_language,
            global_merge_vars: self.global_merge_vars.clone(),
            merge_vars: self.ledger.merge_vars().to_vec(),
            tags: self.tags.clone(),
            metadata: self.metadata.clone(),
            attachments: self.attachments.clone(),
            images: self.images.clone(),
            recipient_metadata: self.ledger.metadata().to_vec(),
            track_clicks: self.track_clicks,
            track_opens: self.track_opens,
            body: raw.then(|| RawBody {
                html: self.html.clone(),
                text: self.text.clone(),
            }),
        };

        SendRequest {
            key: self.api_key.clone(),
            template_name: if raw { None } else { self.template.clone() },
            template_content: (!raw).then(|| self.template_content.clone()),
            send_at: self.send_at.clone(),
            message,
        }
    }

    /// Merge vars recorded for `rcpt`, as they appear on the wire.
    pub fn merge_vars_for(&self, rcpt: &str) -> RecipientMergeVars {
        RecipientMergeVars {
            rcpt: rcpt.to_string(),
            vars: self.ledger.vars_for(rcpt).to_vec(),
        }
    }

    /// Metadata recorded for `rcpt`, if any.
    pub fn metadata_for(&self, rcpt: &str) -> Option<&RecipientMetadata> {
        self.ledger.metadata().iter().find(|m| m.rcpt == rcpt)
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("template", &self.template)
            .field("subject", &self.subject)
            .field("from", &self.from)
            .field("intercept", &self.intercept)
            .field("skip", &self.skip)
            .field("recipients", &self.ledger.recipients())
            .finish_non_exhaustive()
    }
}
