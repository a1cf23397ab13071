//! Mandrill builder — fluent request builder for the Mandrill
//! transactional-email API, with recipient interception for testing.

pub mod address;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod mailer;
pub mod message;
pub mod recipients;
pub mod transport;

pub use address::{Address, parse_address};
pub use config::MandrillConfig;
pub use envelope::{Endpoint, MergeVar, RecipientKind, RecipientStatus, SendRequest};
pub use error::{ConfigError, Error, Result, SendError};
pub use mailer::{Mailer, SendOutcome};
pub use message::{Message, RecipientData};
pub use transport::{HttpTransport, Transport};
