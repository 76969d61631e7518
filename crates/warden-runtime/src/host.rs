//! Guest host
//!
//! Builds and owns the boundary for one guest:
//! - `SessionDriver` as the lifecycle source of truth
//! - `EmissionPipeline` with [`SessionGate`] as its admission filter and
//!   the driver as its session provider
//! - `CapabilityGuard` over the declared capabilities

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use warden_capability::{Capability, CapabilityDeclarations, CapabilityGuard, CapabilityRegistry};
use warden_core::{
    CapabilityError, CapabilityName, Clock, GuestDescriptor, GuestEvent, LifecycleContext, Preferences,
    ProgressUpdate, SessionEndReason, SessionId, SystemClock, WardenResult,
};
use warden_emit::{DropRecord, EmissionPipeline, EventHandler, PipelineStats};
use warden_session::{DropCode, LifecycleGate, SessionDriver, Subscription};

use crate::{HostConfig, SessionGate};

type PermissionFn = Box<dyn Fn(&CapabilityName) -> bool + Send + Sync>;
type GateHookFn = Box<dyn Fn(&GuestEvent, &str, DropCode) + Send + Sync>;
type DropHookFn = Box<dyn Fn(&DropRecord) + Send + Sync>;

/// Gated, fire-and-forget emit handle for the rendering adapter
#[derive(Clone)]
pub struct Emitter {
    pipeline: Arc<EmissionPipeline>,
}

impl Emitter {
    pub fn emit(&self, raw: Value) {
        self.pipeline.emit(raw);
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter").finish_non_exhaustive()
    }
}

pub struct GuestHostBuilder {
    config: HostConfig,
    descriptor: GuestDescriptor,
    preferences: Preferences,
    clock: Option<Arc<dyn Clock>>,
    registry: CapabilityRegistry,
    permission: Option<PermissionFn>,
    handlers: Vec<Arc<dyn EventHandler>>,
    gate_hook: Option<GateHookFn>,
    drop_hook: Option<DropHookFn>,
}

impl GuestHostBuilder {
    pub fn new(config: HostConfig) -> Self {
        GuestHostBuilder {
            config,
            descriptor: GuestDescriptor::default(),
            preferences: Preferences::default(),
            clock: None,
            registry: CapabilityRegistry::new(),
            permission: None,
            handlers: Vec::new(),
            gate_hook: None,
            drop_hook: None,
        }
    }

    pub fn descriptor(mut self, descriptor: GuestDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Time source; the system clock when unset
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn capabilities(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn permission<F>(mut self, check: F) -> Self
    where
        F: Fn(&CapabilityName) -> bool + Send + Sync + 'static,
    {
        self.permission = Some(Box::new(check));
        self
    }

    pub fn handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Diagnostic callback for lifecycle gate drops
    pub fn on_gate_drop<F>(mut self, hook: F) -> Self
    where
        F: Fn(&GuestEvent, &str, DropCode) + Send + Sync + 'static,
    {
        self.gate_hook = Some(Box::new(hook));
        self
    }

    /// Diagnostic callback for every pipeline drop
    pub fn on_drop<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DropRecord) + Send + Sync + 'static,
    {
        self.drop_hook = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> WardenResult<GuestHost> {
        self.config.validate()?;
        let declarations = CapabilityDeclarations::parse(self.config.capabilities.iter().cloned())?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let driver = Arc::new(SessionDriver::new(self.descriptor, self.preferences, clock.clone()));

        let mut gate = LifecycleGate::new(self.config.gate);
        if let Some(hook) = self.gate_hook {
            gate = gate.with_on_drop(hook);
        }

        let mut pipeline = EmissionPipeline::new(self.config.pipeline.clone(), clock)
            .with_filter(Arc::new(SessionGate::new(driver.clone(), gate)))
            .with_session_provider(driver.clone());
        if let Some(hook) = self.drop_hook {
            pipeline = pipeline.with_drop_hook(hook);
        }
        for handler in self.handlers {
            pipeline.add_handler(handler);
        }

        let mut guard = CapabilityGuard::new(declarations, self.registry);
        if let Some(check) = self.permission {
            guard = guard.with_permission(check);
        }

        info!(
            mode = %self.config.pipeline.mode,
            producer = %self.config.pipeline.producer_id,
            capabilities = guard.declarations().len(),
            "Guest host ready"
        );

        Ok(GuestHost {
            config: self.config,
            driver,
            pipeline: Arc::new(pipeline),
            guard,
        })
    }
}

/// Boundary for one guest
pub struct GuestHost {
    config: HostConfig,
    driver: Arc<SessionDriver>,
    pipeline: Arc<EmissionPipeline>,
    guard: CapabilityGuard,
}

impl GuestHost {
    pub fn builder(config: HostConfig) -> GuestHostBuilder {
        GuestHostBuilder::new(config)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn driver(&self) -> &Arc<SessionDriver> {
        &self.driver
    }

    pub fn pipeline(&self) -> &Arc<EmissionPipeline> {
        &self.pipeline
    }

    pub fn emitter(&self) -> Emitter {
        Emitter {
            pipeline: self.pipeline.clone(),
        }
    }

    /// Raw guest input; never fails, never blocks
    pub fn emit(&self, raw: Value) {
        self.pipeline.emit(raw);
    }

    pub fn emit_event(&self, event: &GuestEvent) {
        self.pipeline.emit_event(event);
    }

    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.pipeline.add_handler(handler);
    }

    pub fn start_session(&self, session_id: &str) -> WardenResult<()> {
        let session_id = SessionId::new(session_id)?;
        Ok(self.driver.start_session(session_id)?)
    }

    pub fn end_session(&self, reason: SessionEndReason) -> WardenResult<()> {
        Ok(self.driver.end_session(reason)?)
    }

    pub fn abort_session(&self, reason: &str) -> WardenResult<()> {
        Ok(self.driver.abort_session(reason)?)
    }

    pub fn record_progress(&self, update: ProgressUpdate) -> WardenResult<()> {
        Ok(self.driver.record_progress(update)?)
    }

    pub fn save_state(&self, blob: Value) -> WardenResult<()> {
        Ok(self.driver.save_state(blob)?)
    }

    pub fn context(&self) -> LifecycleContext {
        self.driver.context()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LifecycleContext) + Send + Sync + 'static,
    {
        self.driver.subscribe(listener)
    }

    pub fn capability<T>(&self, name: &str) -> Result<Capability<T>, CapabilityError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.guard.get(name)
    }

    pub fn capabilities(&self) -> &CapabilityGuard {
        &self.guard
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }
}

impl fmt::Debug for GuestHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestHost")
            .field("driver", &self.driver)
            .field("pipeline", &self.pipeline)
            .field("guard", &self.guard)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use warden_capability::{FactoryResult, MemoryStorage, StorageApi};
    use warden_core::{LifecyclePhase, ManualClock, WardenError};
    use warden_emit::{DropReason, EnrichedEvent, FnHandler};

    fn host_with(config: HostConfig) -> (GuestHost, Arc<Mutex<Vec<EnrichedEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let host = GuestHost::builder(config)
            .clock(Arc::new(ManualClock::starting_at(100)))
            .handler(Arc::new(FnHandler::new("sink", move |event: &EnrichedEvent| {
                sink.lock().push(event.clone());
                Ok(())
            })))
            .build()
            .unwrap();
        (host, seen)
    }

    fn level_started() -> Value {
        json!({"kind": "LEVEL_STARTED", "sessionId": "s1", "levelId": "intro", "difficulty": 2})
    }

    #[test]
    fn test_gate_wired_into_pipeline() {
        let (host, seen) = host_with(HostConfig::default());

        host.emit(level_started());
        assert_eq!(host.stats().not_admitted, 1);

        host.start_session("s1").unwrap();
        host.emit(level_started());
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].session_id().map(SessionId::as_str), Some("s1"));

        host.end_session(SessionEndReason::Completed).unwrap();
        host.emit(level_started());
        assert_eq!(host.stats().not_admitted, 2);
        assert_eq!(host.context().phase(), LifecyclePhase::Ended);
    }

    #[test]
    fn test_hooks_receive_gate_codes() {
        let codes = Arc::new(Mutex::new(Vec::new()));
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let code_sink = codes.clone();
        let reason_sink = reasons.clone();
        let host = GuestHost::builder(HostConfig::default())
            .clock(Arc::new(ManualClock::new()))
            .on_gate_drop(move |_, _, code| code_sink.lock().push(code))
            .on_drop(move |record| reason_sink.lock().push(record.reason))
            .build()
            .unwrap();

        host.emit(level_started());
        assert_eq!(*codes.lock(), vec![DropCode::BeforeSession]);
        assert_eq!(*reasons.lock(), vec![DropReason::NotAdmitted]);
    }

    #[test]
    fn test_host_errors_surface() {
        let (host, _) = host_with(HostConfig::default());
        assert!(matches!(host.start_session(""), Err(WardenError::Value(_))));
        assert!(matches!(
            host.end_session(SessionEndReason::Completed),
            Err(WardenError::Lifecycle(_))
        ));
        assert!(matches!(
            host.capability::<dyn StorageApi>("storage"),
            Err(CapabilityError::NotDeclared(_))
        ));
    }

    #[test]
    fn test_duplicate_capability_declaration_fails_build() {
        let result = GuestHost::builder(HostConfig::default().with_capabilities(["audio", "audio"])).build();
        assert!(matches!(
            result,
            Err(WardenError::Capability(CapabilityError::DuplicateDeclaration(_)))
        ));
    }

    #[test]
    fn test_capabilities_through_host() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_storage(|| -> FactoryResult<dyn StorageApi> { Ok(Arc::new(MemoryStorage::new())) })
            .unwrap();
        let host = GuestHost::builder(HostConfig::default().with_capabilities(["storage"]))
            .capabilities(registry)
            .permission(|name| name.as_str() != "storage")
            .build()
            .unwrap();

        let storage = host.capability::<dyn StorageApi>("storage").unwrap();
        assert!(!storage.is_available());
        assert_eq!(storage.reason(), Some("permission denied"));
    }

    #[test]
    fn test_emitter_shares_pipeline() {
        let (host, seen) = host_with(HostConfig::development());
        let emitter = host.emitter();
        emitter.emit(json!({"kind": "DEV_LOG", "level": "debug", "message": "booting"}));
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(host.stats().delivered, 1);
    }

    #[test]
    fn test_listeners_through_host() {
        let (host, _) = host_with(HostConfig::default());
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = phases.clone();
        let _sub = host.subscribe(move |ctx| sink.lock().push(ctx.phase()));

        host.start_session("s1").unwrap();
        host.save_state(json!({"turn": 3})).unwrap();
        host.abort_session("renderer lost").unwrap();
        assert_eq!(
            *phases.lock(),
            vec![LifecyclePhase::InSession, LifecyclePhase::Ended]
        );
    }
}
