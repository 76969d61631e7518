//! Capability guard
//!
//! Lookup order for a name:
//! 1. Not declared by the guest: `Err(NotDeclared)`
//! 2. Permission predicate consulted (granted when none is installed)
//! 3. Granted: real factory; its errors and panics fall through to step 4
//! 4. Denied or real factory failed: no-op factory, marked unavailable
//! 5. No-op factory failed: `Err(NoopUnavailable)`
//!
//! A guest therefore never holds a capability object in an undefined state.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::{debug, error, warn};

use warden_core::{contain, CapabilityError, CapabilityName};

use crate::apis::{names, AudioApi, HapticsApi, StorageApi};
use crate::{CapabilityDeclarations, CapabilityRegistry};

/// Runtime permission predicate supplied by the host
pub type PermissionCheck = Arc<dyn Fn(&CapabilityName) -> bool + Send + Sync>;

/// API handle returned to the guest
pub struct Capability<T: ?Sized> {
    api: Arc<T>,
    available: bool,
    reason: Option<String>,
}

impl<T: ?Sized> Capability<T> {
    fn available(api: Arc<T>) -> Self {
        Capability {
            api,
            available: true,
            reason: None,
        }
    }

    fn unavailable(api: Arc<T>, reason: String) -> Self {
        Capability {
            api,
            available: false,
            reason: Some(reason),
        }
    }

    #[inline]
    pub fn api(&self) -> &Arc<T> {
        &self.api
    }

    pub fn into_api(self) -> Arc<T> {
        self.api
    }

    /// False when the handle is the inert fallback
    #[inline]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Why the real API was not provided
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl<T: ?Sized> Deref for Capability<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.api
    }
}

impl<T: ?Sized> Clone for Capability<T> {
    fn clone(&self) -> Self {
        Capability {
            api: Arc::clone(&self.api),
            available: self.available,
            reason: self.reason.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("available", &self.available)
            .field("reason", &self.reason)
            .finish()
    }
}

/// Declaration plus permission policy over a capability registry
pub struct CapabilityGuard {
    declarations: CapabilityDeclarations,
    registry: CapabilityRegistry,
    permission: Option<PermissionCheck>,
}

impl CapabilityGuard {
    pub fn new(declarations: CapabilityDeclarations, registry: CapabilityRegistry) -> Self {
        CapabilityGuard {
            declarations,
            registry,
            permission: None,
        }
    }

    pub fn with_permission<F>(mut self, check: F) -> Self
    where
        F: Fn(&CapabilityName) -> bool + Send + Sync + 'static,
    {
        self.permission = Some(Arc::new(check));
        self
    }

    pub fn declarations(&self) -> &CapabilityDeclarations {
        &self.declarations
    }

    pub fn is_declared(&self, name: &str) -> bool {
        CapabilityName::new(name)
            .map(|name| self.declarations.contains(&name))
            .unwrap_or(false)
    }

    /// Resolve a declared capability to a usable handle
    pub fn get<T>(&self, name: &str) -> Result<Capability<T>, CapabilityError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let Some(name) = CapabilityName::new(name)
            .ok()
            .filter(|name| self.declarations.contains(name))
        else {
            return Err(CapabilityError::NotDeclared(name.to_string()));
        };
        let provider = self.registry.provider::<T>(&name)?;

        let reason = match self.permitted(&name) {
            Ok(true) => match contain(|| (provider.real)()) {
                Ok(Ok(api)) => return Ok(Capability::available(api)),
                Ok(Err(e)) => {
                    warn!(capability = %name, error = %e, "Capability factory failed, using no-op");
                    format!("factory failed: {}", e)
                }
                Err(panic) => {
                    warn!(capability = %name, panic = %panic, "Capability factory panicked, using no-op");
                    format!("factory panicked: {}", panic)
                }
            },
            Ok(false) => {
                debug!(capability = %name, "Capability permission denied");
                "permission denied".to_string()
            }
            Err(panic) => {
                warn!(capability = %name, panic = %panic, "Permission check panicked, denying");
                format!("permission check panicked: {}", panic)
            }
        };

        let failure = match contain(|| (provider.noop)()) {
            Ok(Ok(api)) => return Ok(Capability::unavailable(api, reason)),
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("panicked: {}", panic),
        };
        error!(capability = %name, reason = %failure, "No-op capability factory failed");
        Err(CapabilityError::NoopUnavailable {
            name: name.into(),
            reason: failure,
        })
    }

    pub fn storage(&self) -> Result<Capability<dyn StorageApi>, CapabilityError> {
        self.get(names::STORAGE)
    }

    pub fn haptics(&self) -> Result<Capability<dyn HapticsApi>, CapabilityError> {
        self.get(names::HAPTICS)
    }

    pub fn audio(&self) -> Result<Capability<dyn AudioApi>, CapabilityError> {
        self.get(names::AUDIO)
    }

    fn permitted(&self, name: &CapabilityName) -> Result<bool, String> {
        match &self.permission {
            Some(check) => contain(|| check(name)),
            None => Ok(true),
        }
    }
}

impl fmt::Debug for CapabilityGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityGuard")
            .field("declarations", &self.declarations)
            .field("registry", &self.registry)
            .field("has_permission_check", &self.permission.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FactoryError, FactoryResult, MemoryStorage, NoopHaptics};
    use proptest::prelude::*;

    fn declared(names: &[&str]) -> CapabilityDeclarations {
        CapabilityDeclarations::parse(names.iter().copied()).unwrap()
    }

    fn storage_registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_storage(|| -> FactoryResult<dyn StorageApi> { Ok(Arc::new(MemoryStorage::new())) })
            .unwrap();
        registry
    }

    #[test]
    fn test_granted_capability_is_real() {
        let guard = CapabilityGuard::new(declared(&["storage"]), storage_registry());
        let storage = guard.storage().unwrap();
        assert!(storage.is_available());
        assert!(storage.reason().is_none());

        storage.set("level", "3".into());
        assert_eq!(storage.get("level").as_deref(), Some("3"));
    }

    #[test]
    fn test_undeclared_fails_loudly() {
        let guard = CapabilityGuard::new(declared(&[]), storage_registry());
        assert_eq!(
            guard.storage().unwrap_err(),
            CapabilityError::NotDeclared("storage".into())
        );
        assert!(matches!(
            guard.get::<dyn StorageApi>(""),
            Err(CapabilityError::NotDeclared(_))
        ));
    }

    #[test]
    fn test_denied_returns_inert_fallback() {
        let guard = CapabilityGuard::new(declared(&["storage"]), storage_registry())
            .with_permission(|_| false);
        let storage = guard.storage().unwrap();
        assert!(!storage.is_available());
        assert_eq!(storage.reason(), Some("permission denied"));

        storage.set("level", "3".into());
        assert_eq!(storage.get("level"), None);
    }

    #[test]
    fn test_failing_factory_falls_back() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_haptics(|| -> FactoryResult<dyn HapticsApi> { Err(FactoryError::from("no motor")) })
            .unwrap();
        let guard = CapabilityGuard::new(declared(&["haptics"]), registry);

        let haptics = guard.haptics().unwrap();
        assert!(!haptics.is_available());
        assert!(haptics.reason().unwrap().contains("no motor"));
        assert!(!haptics.is_supported());
    }

    #[test]
    fn test_panicking_factory_falls_back() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_audio(|| -> FactoryResult<dyn AudioApi> { panic!("device lost") })
            .unwrap();
        let guard = CapabilityGuard::new(declared(&["audio"]), registry);

        let audio = guard.audio().unwrap();
        assert!(!audio.is_available());
        assert!(audio.reason().unwrap().contains("device lost"));
        audio.play("click", 1.0);
    }

    #[test]
    fn test_panicking_permission_check_denies() {
        let guard = CapabilityGuard::new(declared(&["storage"]), storage_registry())
            .with_permission(|_| panic!("policy offline"));
        let storage = guard.storage().unwrap();
        assert!(!storage.is_available());
    }

    #[test]
    fn test_broken_noop_is_unrecoverable() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                names::HAPTICS,
                || -> FactoryResult<dyn HapticsApi> { Err("no motor".into()) },
                || -> FactoryResult<dyn HapticsApi> { Err("misconfigured".into()) },
            )
            .unwrap();
        let guard = CapabilityGuard::new(declared(&["haptics"]), registry);

        assert_eq!(
            guard.haptics().unwrap_err(),
            CapabilityError::NoopUnavailable {
                name: "haptics".into(),
                reason: "misconfigured".into(),
            }
        );
    }

    #[test]
    fn test_declared_without_provider() {
        let guard = CapabilityGuard::new(declared(&["haptics"]), storage_registry());
        assert_eq!(
            guard.haptics().unwrap_err(),
            CapabilityError::NotProvided("haptics".into())
        );
    }

    #[test]
    fn test_wrong_api_type() {
        let guard = CapabilityGuard::new(declared(&["storage"]), storage_registry());
        assert!(matches!(
            guard.get::<dyn HapticsApi>(names::STORAGE),
            Err(CapabilityError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_custom_capability_type() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                "vibration-pattern",
                || -> FactoryResult<NoopHaptics> { Ok(Arc::new(NoopHaptics)) },
                || -> FactoryResult<NoopHaptics> { Ok(Arc::new(NoopHaptics)) },
            )
            .unwrap();
        let guard = CapabilityGuard::new(declared(&["vibration-pattern"]), registry);
        assert!(guard.get::<NoopHaptics>("vibration-pattern").unwrap().is_available());
    }

    proptest! {
        #[test]
        fn prop_availability_follows_permission(granted in any::<bool>()) {
            let guard = CapabilityGuard::new(declared(&["storage"]), storage_registry())
                .with_permission(move |_| granted);
            let storage = guard.storage().unwrap();
            prop_assert_eq!(storage.is_available(), granted);
            prop_assert_eq!(storage.reason().is_some(), !granted);
        }
    }
}
