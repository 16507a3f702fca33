use crate::domain::claim::{ComposedEmail, DeliveryResult};
use crate::shared::logging::OrchestratorLog;
use crate::shared::time::utc_rfc3339;
use std::path::PathBuf;

/// Outbound mail transport. Delivery failures are reported, not thrown; the
/// pipeline records the outcome either way.
pub trait Mailer: Send + Sync {
    fn transport(&self) -> &str;
    fn send(&self, email: &ComposedEmail) -> Result<(), String>;
}

/// Default transport: appends the outbound email to the orchestrator log.
/// Real SMTP lives behind the same trait when it is wired in.
pub struct LogMailer {
    log: OrchestratorLog,
}

impl LogMailer {
    pub fn new(state_root: PathBuf) -> Self {
        LogMailer {
            log: OrchestratorLog::new(&state_root),
        }
    }
}

impl Mailer for LogMailer {
    fn transport(&self) -> &str {
        "log"
    }

    fn send(&self, email: &ComposedEmail) -> Result<(), String> {
        let line = format!(
            "deliver to={} subject={:?} body_len={}",
            email.recipient_email,
            email.email_subject,
            email.email_body.len()
        );
        self.log.append(&line).map_err(|err| err.to_string())
    }
}

pub fn deliver(mailer: &dyn Mailer, email: &ComposedEmail) -> DeliveryResult {
    match mailer.send(email) {
        Ok(()) => DeliveryResult {
            success: true,
            delivered_to: vec![email.recipient_email.clone()],
            transport: mailer.transport().to_string(),
            errors: Vec::new(),
            timestamp: utc_rfc3339(),
        },
        Err(reason) => DeliveryResult {
            success: false,
            delivered_to: Vec::new(),
            transport: mailer.transport().to_string(),
            errors: vec![reason],
            timestamp: utc_rfc3339(),
        },
    }
}
