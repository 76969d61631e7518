//! Scenario harness
//!
//! Wraps a [`GuestHost`] built on a manual clock, with a recording handler
//! and logs of every pipeline and gate drop, so a test can script guest
//! input step by step and inspect what reached the host.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use warden_capability::CapabilityRegistry;
use warden_core::{GuestDescriptor, HandlerError, ManualClock, Preferences, WardenResult};
use warden_emit::{DropReason, DropRecord, EnrichedEvent, EventHandler, PipelineStats};
use warden_runtime::{GuestHost, HostConfig};
use warden_session::DropCode;

/// Handler that keeps every delivered event
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<EnrichedEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EnrichedEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn last(&self) -> Option<EnrichedEvent> {
        self.events.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventHandler for RecordingHandler {
    fn name(&self) -> &str {
        "recording"
    }

    fn handle(&self, event: &EnrichedEvent) -> Result<(), HandlerError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Harness configuration
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub host: HostConfig,
    /// Initial manual clock reading in milliseconds
    pub start_ms: u64,
    pub descriptor: GuestDescriptor,
    pub preferences: Preferences,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            host: HostConfig::default(),
            start_ms: 1_700_000_000_000,
            descriptor: GuestDescriptor::new("harness-guest", "Harness Guest", "0.0.0"),
            preferences: Preferences::default(),
        }
    }
}

impl HarnessConfig {
    pub fn development() -> Self {
        HarnessConfig {
            host: HostConfig::development(),
            ..Default::default()
        }
    }
}

/// Scripted driver for one guest host
pub struct ScenarioHarness {
    host: GuestHost,
    clock: Arc<ManualClock>,
    recorder: Arc<RecordingHandler>,
    drops: Arc<Mutex<Vec<DropRecord>>>,
    gate_codes: Arc<Mutex<Vec<DropCode>>>,
}

impl ScenarioHarness {
    pub fn new(config: HarnessConfig) -> WardenResult<Self> {
        Self::with_capabilities(config, CapabilityRegistry::new())
    }

    pub fn with_capabilities(config: HarnessConfig, registry: CapabilityRegistry) -> WardenResult<Self> {
        let clock = Arc::new(ManualClock::starting_at(config.start_ms));
        let recorder = Arc::new(RecordingHandler::new());
        let drops = Arc::new(Mutex::new(Vec::new()));
        let gate_codes = Arc::new(Mutex::new(Vec::new()));

        let drop_sink = drops.clone();
        let code_sink = gate_codes.clone();
        let host = GuestHost::builder(config.host)
            .descriptor(config.descriptor)
            .preferences(config.preferences)
            .clock(clock.clone())
            .capabilities(registry)
            .handler(recorder.clone())
            .on_drop(move |record| drop_sink.lock().push(record.clone()))
            .on_gate_drop(move |_, _, code| code_sink.lock().push(code))
            .build()?;

        Ok(ScenarioHarness {
            host,
            clock,
            recorder,
            drops,
            gate_codes,
        })
    }

    pub fn host(&self) -> &GuestHost {
        &self.host
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn recorder(&self) -> &RecordingHandler {
        &self.recorder
    }

    pub fn advance_ms(&self, millis: u64) {
        self.clock.advance_ms(millis);
    }

    pub fn emit(&self, raw: Value) {
        self.host.emit(raw);
    }

    /// Emit and report whether the event reached the handlers
    pub fn emit_and_check(&self, raw: Value) -> bool {
        let before = self.recorder.len();
        self.host.emit(raw);
        self.recorder.len() > before
    }

    pub fn delivered(&self) -> Vec<EnrichedEvent> {
        self.recorder.events()
    }

    pub fn drops(&self) -> Vec<DropRecord> {
        self.drops.lock().clone()
    }

    pub fn drops_for(&self, reason: DropReason) -> usize {
        self.drops.lock().iter().filter(|d| d.reason == reason).count()
    }

    pub fn gate_codes(&self) -> Vec<DropCode> {
        self.gate_codes.lock().clone()
    }

    pub fn last_gate_code(&self) -> Option<DropCode> {
        self.gate_codes.lock().last().copied()
    }

    pub fn stats(&self) -> PipelineStats {
        self.host.stats()
    }
}
