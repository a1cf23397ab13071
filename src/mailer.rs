//! Mailer — client-wide defaults plus the `send` entry points.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::address::{Address, parse_address};
use crate::config::MandrillConfig;
use crate::dispatch::{self, OnComplete};
use crate::envelope::RecipientStatus;
use crate::error::{ConfigError, SendError};
use crate::message::Message;
use crate::transport::{HttpTransport, Transport};

/// How a send finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Skip was active; nothing was sent.
    Skipped,
    /// One request went out; these are the provider's per-recipient statuses.
    Delivered(Vec<RecipientStatus>),
    /// Interception fanned the message out into `dispatched` requests.
    Intercepted { dispatched: usize },
}

/// Builds messages with shared defaults and sends them.
pub struct Mailer {
    transport: Arc<dyn Transport>,
    api_key: SecretString,
    interceptor: Option<Address>,
    skip: bool,
}

impl Mailer {
    pub fn new(transport: Arc<dyn Transport>, api_key: SecretString) -> Self {
        Self {
            transport,
            api_key,
            interceptor: None,
            skip: false,
        }
    }

    /// A mailer talking HTTP to the configured endpoint.
    pub fn from_config(config: &MandrillConfig) -> Result<Self, ConfigError> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config)?);
        let mut mailer = Self::new(transport, config.api_key.clone()).with_skip(config.skip);
        if let Some(interceptor) = &config.interceptor {
            mailer = mailer.with_interceptor(interceptor);
        }
        Ok(mailer)
    }

    /// Intercept every message this mailer creates.
    pub fn with_interceptor(mut self, address: &str) -> Self {
        self.interceptor = parse_address(address);
        self
    }

    /// Skip sending for every message this mailer creates.
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// A new message for `template`, carrying this mailer's defaults.
    pub fn message(&self, template: impl Into<String>) -> Message {
        let mut message = Message::with_template(template)
            .api_key(self.api_key.expose_secret())
            .skip(self.skip);
        if let Some(target) = &self.interceptor {
            message = message.intercept(&target.to_string());
        }
        message
    }

    /// Send `message` and wait for the outcome.
    ///
    /// Skip short-circuits with [`SendOutcome::Skipped`]. An intercepted
    /// message resolves once every copy succeeded or the first one failed.
    pub async fn send(&self, message: &Message) -> Result<SendOutcome, SendError> {
        if message.is_skipped() {
            info!("Skipping send");
            return Ok(SendOutcome::Skipped);
        }

        if let Some(target) = message.interceptor() {
            return dispatch::send_intercepted(Arc::clone(&self.transport), message, target).await;
        }

        let request = message.assemble();
        let endpoint = request.endpoint();
        info!(
            path = endpoint.path(),
            recipients = request.message.to.len(),
            "Sending message"
        );

        let statuses = self.transport.post(endpoint, &request).await?;
        Ok(SendOutcome::Delivered(statuses))
    }

    /// Send `message` and report the outcome through `on_complete`.
    ///
    /// The callback runs exactly once for skip and direct sends and at most
    /// once for intercepted sends. Skip invokes it before returning. Must be
    /// called inside a tokio runtime.
    pub fn send_with<F>(&self, message: &Message, on_complete: F)
    where
        F: FnOnce(Result<SendOutcome, SendError>) + Send + 'static,
    {
        if message.is_skipped() {
            info!("Skipping send");
            on_complete(Ok(SendOutcome::Skipped));
            return;
        }

        if let Some(target) = message.interceptor() {
            let on_complete: OnComplete = Box::new(on_complete);
            dispatch::dispatch_intercepted(Arc::clone(&self.transport), message, target, on_complete);
            return;
        }

        let request = message.assemble();
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let endpoint = request.endpoint();
            info!(path = endpoint.path(), "Sending message");
            let outcome = transport
                .post(endpoint, &request)
                .await
                .map(SendOutcome::Delivered);
            on_complete(outcome);
        });
    }
}
