//! Lifecycle gate as a pipeline admission stage

use std::sync::Arc;

use warden_core::GuestEvent;
use warden_emit::{AdmissionFilter, Refusal};
use warden_session::{GateDecision, LifecycleGate, SessionDriver};

/// Admits events according to the driver's current lifecycle state
#[derive(Debug)]
pub struct SessionGate {
    driver: Arc<SessionDriver>,
    gate: LifecycleGate,
}

impl SessionGate {
    pub fn new(driver: Arc<SessionDriver>, gate: LifecycleGate) -> Self {
        SessionGate { driver, gate }
    }

    pub fn gate(&self) -> &LifecycleGate {
        &self.gate
    }
}

impl AdmissionFilter for SessionGate {
    fn admit(&self, event: &GuestEvent) -> Result<(), Refusal> {
        // Decide under the read lock, report after releasing it
        let decision = self.driver.inspect(|ctx| self.gate.evaluate(ctx, event));
        self.gate.report(event, &decision);
        match decision {
            GateDecision::Admit => Ok(()),
            GateDecision::Drop { code, reason } => Err(Refusal::new(code.as_str(), reason)),
        }
    }
}
