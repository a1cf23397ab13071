//! Recipient ledger — ordered, deduplicated recipients plus the
//! per-recipient merge-variable and metadata side-tables.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::address::parse_address;
use crate::envelope::{MergeVar, Recipient, RecipientKind, RecipientMergeVars, RecipientMetadata};

/// What happened to an `add` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Added,
    /// Address already present; the first recipient and its data were kept.
    Duplicate(String),
    /// The text held no address.
    Invalid,
}

/// Recipients in insertion order, keyed by address.
#[derive(Debug, Clone, Default)]
pub struct RecipientLedger {
    recipients: Vec<Recipient>,
    seen: HashSet<String>,
    merge_vars: Vec<RecipientMergeVars>,
    metadata: Vec<RecipientMetadata>,
}

impl RecipientLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `text` and add it under `kind`.
    ///
    /// The first occurrence of an address wins: a repeat is not inserted and
    /// its merge vars / metadata are ignored.
    pub fn add(
        &mut self,
        text: &str,
        kind: RecipientKind,
        merge_vars: Option<Vec<MergeVar>>,
        metadata: Option<Map<String, Value>>,
    ) -> Admission {
        let Some(address) = parse_address(text) else {
            warn!(input = %text, "Ignoring recipient without an address");
            return Admission::Invalid;
        };

        if self.seen.contains(&address.email) {
            warn!(
                email = %address.email,
                "Attempting to add the same email twice. Using data from first instance"
            );
            return Admission::Duplicate(address.email);
        }

        self.seen.insert(address.email.clone());

        if let Some(vars) = merge_vars {
            self.push_merge_vars(&address.email, vars);
        }
        if let Some(values) = metadata {
            self.merge_metadata(&address.email, values);
        }

        self.recipients.push(Recipient {
            email: address.email,
            name: address.name,
            kind,
        });

        Admission::Added
    }

    /// Append merge vars for `rcpt`, creating its entry on first reference.
    pub fn push_merge_vars(&mut self, rcpt: &str, vars: impl IntoIterator<Item = MergeVar>) {
        let idx = self
            .merge_vars
            .iter()
            .position(|m| m.rcpt == rcpt)
            .unwrap_or_else(|| {
                self.merge_vars.push(RecipientMergeVars {
                    rcpt: rcpt.to_string(),
                    vars: Vec::new(),
                });
                self.merge_vars.len() - 1
            });
        self.merge_vars[idx].vars.extend(vars);
    }

    /// Shallow-merge metadata for `rcpt`; existing keys are overwritten.
    pub fn merge_metadata(&mut self, rcpt: &str, values: impl IntoIterator<Item = (String, Value)>) {
        let idx = self
            .metadata
            .iter()
            .position(|m| m.rcpt == rcpt)
            .unwrap_or_else(|| {
                self.metadata.push(RecipientMetadata {
                    rcpt: rcpt.to_string(),
                    values: Map::new(),
                });
                self.metadata.len() - 1
            });
        self.metadata[idx].values.extend(values);
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn merge_vars(&self) -> &[RecipientMergeVars] {
        &self.merge_vars
    }

    pub fn metadata(&self) -> &[RecipientMetadata] {
        &self.metadata
    }

    /// Merge vars recorded for one address, empty if none.
    pub fn vars_for(&self, rcpt: &str) -> &[MergeVar] {
        self.merge_vars
            .iter()
            .find(|m| m.rcpt == rcpt)
            .map(|m| m.vars.as_slice())
            .unwrap_or_default()
    }

    pub fn contains(&self, email: &str) -> bool {
        self.seen.contains(email)
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn adds_recipient_with_kind_and_name() {
        let mut ledger = RecipientLedger::new();
        let res = ledger.add("Bob <bob@x.com>", RecipientKind::Cc, None, None);
        assert_eq!(res, Admission::Added);
        assert_eq!(ledger.len(), 1);
        let rcpt = &ledger.recipients()[0];
        assert_eq!(rcpt.email, "bob@x.com");
        assert_eq!(rcpt.name.as_deref(), Some("Bob"));
        assert_eq!(rcpt.kind, RecipientKind::Cc);
        assert!(ledger.merge_vars().is_empty());
        assert!(ledger.metadata().is_empty());
    }

    #[test]
    fn duplicate_keeps_first_recipient_and_its_data() {
        let mut ledger = RecipientLedger::new();
        ledger.add(
            "bob@x.com",
            RecipientKind::To,
            Some(vec![MergeVar::new("plan", "pro")]),
            Some(meta(json!({"uid": 1}))),
        );
        let res = ledger.add(
            "Robert <bob@x.com>",
            RecipientKind::Bcc,
            Some(vec![MergeVar::new("plan", "free")]),
            Some(meta(json!({"uid": 2}))),
        );

        assert_eq!(res, Admission::Duplicate("bob@x.com".into()));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.recipients()[0].kind, RecipientKind::To);
        assert!(ledger.recipients()[0].name.is_none());
        assert_eq!(ledger.vars_for("bob@x.com"), &[MergeVar::new("plan", "pro")]);
        assert_eq!(ledger.metadata()[0].values["uid"], json!(1));
    }

    #[test]
    fn dedup_is_case_sensitive() {
        let mut ledger = RecipientLedger::new();
        ledger.add("bob@x.com", RecipientKind::To, None, None);
        let res = ledger.add("Bob@x.com", RecipientKind::To, None, None);
        assert_eq!(res, Admission::Added);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn empty_text_is_rejected() {
        let mut ledger = RecipientLedger::new();
        assert_eq!(ledger.add("", RecipientKind::To, None, None), Admission::Invalid);
        assert!(ledger.is_empty());
    }

    #[test]
    fn empty_vars_still_create_an_entry() {
        let mut ledger = RecipientLedger::new();
        ledger.add("a@x.com", RecipientKind::To, Some(vec![]), None);
        assert_eq!(ledger.merge_vars().len(), 1);
        assert_eq!(ledger.merge_vars()[0].rcpt, "a@x.com");
        assert!(ledger.vars_for("a@x.com").is_empty());
    }

    #[test]
    fn merge_vars_append_without_dedup() {
        let mut ledger = RecipientLedger::new();
        ledger.push_merge_vars("a@x.com", [MergeVar::new("n", 1)]);
        ledger.push_merge_vars("a@x.com", [MergeVar::new("n", 2), MergeVar::new("m", 3)]);
        let names: Vec<_> = ledger.vars_for("a@x.com").iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["n", "n", "m"]);
        assert_eq!(ledger.vars_for("a@x.com")[0].content, json!(1));
        assert_eq!(ledger.merge_vars().len(), 1);
    }

    #[test]
    fn metadata_overwrites_existing_keys() {
        let mut ledger = RecipientLedger::new();
        ledger.merge_metadata("a@x.com", meta(json!({"uid": 1, "plan": "free"})));
        ledger.merge_metadata("a@x.com", meta(json!({"plan": "pro"})));
        let values = &ledger.metadata()[0].values;
        assert_eq!(values["uid"], json!(1));
        assert_eq!(values["plan"], json!("pro"));
        assert_eq!(ledger.metadata().len(), 1);
    }

    #[test]
    fn vars_for_unknown_address_is_empty() {
        let ledger = RecipientLedger::new();
        assert!(ledger.vars_for("ghost@x.com").is_empty());
        assert!(!ledger.contains("ghost@x.com"));
    }
}
