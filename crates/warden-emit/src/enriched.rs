//! Enriched events

use serde::Serialize;

use warden_core::{GuestEvent, SessionId, Timestamp};

/// A validated event wrapped with host metadata
///
/// Only the pipeline constructs these; a producer cannot forge the metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedEvent {
    event: GuestEvent,
    delivered_at: Timestamp,
    session_id: Option<SessionId>,
    producer_id: String,
    pipeline_version: String,
}

impl EnrichedEvent {
    pub(crate) fn new(
        event: GuestEvent,
        delivered_at: Timestamp,
        session_id: Option<SessionId>,
        producer_id: String,
        pipeline_version: String,
    ) -> Self {
        EnrichedEvent {
            event,
            delivered_at,
            session_id,
            producer_id,
            pipeline_version,
        }
    }

    #[inline]
    pub fn event(&self) -> &GuestEvent {
        &self.event
    }

    #[inline]
    pub fn delivered_at(&self) -> Timestamp {
        self.delivered_at
    }

    /// Session that was active when the event was delivered
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    pub fn pipeline_version(&self) -> &str {
        &self.pipeline_version
    }

    pub fn into_event(self) -> GuestEvent {
        self.event
    }
}
