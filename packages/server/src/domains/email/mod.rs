//! Email domain - lifecycle emails delivered through the job queue
//!
//! The lifecycle engine only ever talks to [`EmailGateway`]. The worker
//! process runs [`EmailTaskProcessor`] against the same jobs table.

pub mod processor;
pub mod sender;
pub mod tasks;

pub use processor::EmailTaskProcessor;
pub use sender::{BrevoEmailSender, LogEmailSender};
pub use tasks::{
    EmailGateway, EmailPayload, EmailTask, TYPE_EMAIL_FORGOT_PASSWORD, TYPE_EMAIL_VERIFICATION,
};
