//! Interception dispatcher — fans one message out into a redirected
//! single-recipient request per original recipient.
//!
//! All requests are issued up front on their own tasks; a [`FanIn`] latch
//! settles the aggregate exactly once: on the first error, or after the last
//! success. Requests already in flight are never retracted; settling only
//! suppresses later notifications.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::envelope::{Recipient, RecipientKind, RecipientMergeVars, SendRequest};
use crate::error::SendError;
use crate::mailer::SendOutcome;
use crate::message::Message;
use crate::transport::Transport;

/// Aggregate completion callback.
pub type OnComplete = Box<dyn FnOnce(Result<SendOutcome, SendError>) + Send + 'static>;

/// A request derived for one original recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    /// Address the request would have gone to without interception.
    pub original: String,
    pub request: SendRequest,
}

/// Build the redirected request for every recipient of `message`.
///
/// Each request is a fresh assembly: subject prefixed with
/// `[<original>] `, `to` replaced by `target`, and `merge_vars` replaced by
/// the original recipient's vars re-keyed to `target`.
pub fn derive_requests(message: &Message, target: &Address) -> Vec<Derived> {
    message
        .recipients()
        .iter()
        .map(|rcpt| {
            let mut request = message.assemble();

            let subject = request.message.subject.take().unwrap_or_default();
            request.message.subject = Some(format!("[{}] {subject}", rcpt.email));

            request.message.to = vec![Recipient {
                email: target.email.clone(),
                name: target.name.clone(),
                kind: RecipientKind::To,
            }];

            request.message.merge_vars = vec![RecipientMergeVars {
                rcpt: target.email.clone(),
                vars: message.ledger().vars_for(&rcpt.email).to_vec(),
            }];

            Derived {
                original: rcpt.email.clone(),
                request,
            }
        })
        .collect()
}

struct FanInState {
    pending: usize,
    dispatched: usize,
    /// `None` once settled.
    on_complete: Option<OnComplete>,
}

/// Countdown latch with first-error-wins settlement.
///
/// The pending count and the settled state share one lock, so completions
/// arriving from parallel tasks observe them consistently. The callback runs
/// outside the lock.
pub struct FanIn {
    state: Mutex<FanInState>,
}

impl FanIn {
    /// A latch waiting for `pending` completions. With zero pending it
    /// settles successfully right away.
    pub fn new(pending: usize, on_complete: OnComplete) -> Arc<Self> {
        let fan_in = Arc::new(Self {
            state: Mutex::new(FanInState {
                pending,
                dispatched: pending,
                on_complete: Some(on_complete),
            }),
        });

        if pending == 0 {
            fan_in.settle(Ok(SendOutcome::Intercepted { dispatched: 0 }));
        }

        fan_in
    }

    /// Record one completion. Anything arriving after settlement is dropped.
    pub fn complete(&self, result: Result<(), SendError>) {
        let fire = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.on_complete.is_none() {
                return;
            }
            match result {
                Err(e) => state.on_complete.take().map(|cb| (cb, Err(e))),
                Ok(()) => {
                    state.pending = state.pending.saturating_sub(1);
                    if state.pending == 0 {
                        let dispatched = state.dispatched;
                        state
                            .on_complete
                            .take()
                            .map(|cb| (cb, Ok(SendOutcome::Intercepted { dispatched })))
                    } else {
                        None
                    }
                }
            }
        };

        if let Some((cb, outcome)) = fire {
            cb(outcome);
        }
    }

    pub fn is_settled(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_complete
            .is_none()
    }

    fn settle(&self, outcome: Result<SendOutcome, SendError>) {
        let cb = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_complete
            .take();
        if let Some(cb) = cb {
            cb(outcome);
        }
    }
}

/// Fan `message` out to `target` and report through `on_complete`.
///
/// Must be called inside a tokio runtime. No timeout is applied here: a
/// transport call that never resolves leaves the aggregate pending.
pub fn dispatch_intercepted(
    transport: Arc<dyn Transport>,
    message: &Message,
    target: &Address,
    on_complete: OnComplete,
) {
    let derived = derive_requests(message, target);

    info!(
        interceptor = %target.email,
        recipients = derived.len(),
        "Intercepting message"
    );

    let fan_in = FanIn::new(derived.len(), on_complete);

    for Derived { original, request } in derived {
        let transport = Arc::clone(&transport);
        let fan_in = Arc::clone(&fan_in);

        let call = tokio::spawn(async move {
            let endpoint = request.endpoint();
            transport.post(endpoint, &request).await
        });

        tokio::spawn(async move {
            let result = match call.await {
                Ok(Ok(_)) => {
                    debug!(original = %original, "Intercepted copy delivered");
                    Ok(())
                }
                Ok(Err(e)) => {
                    warn!(original = %original, error = %e, "Intercepted copy failed");
                    Err(e)
                }
                Err(e) => Err(SendError::Dispatch(e.to_string())),
            };
            fan_in.complete(result);
        });
    }
}

/// Async form of [`dispatch_intercepted`]: resolves with the aggregate outcome.
pub async fn send_intercepted(
    transport: Arc<dyn Transport>,
    message: &Message,
    target: &Address,
) -> Result<SendOutcome, SendError> {
    let (tx, rx) = oneshot::channel();
    dispatch_intercepted(
        transport,
        message,
        target,
        Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }),
    );

    rx.await
        .unwrap_or_else(|_| Err(SendError::Dispatch("aggregate dropped before settling".into())))
}
