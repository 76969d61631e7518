//! Host-supplied capability factories
//!
//! Each capability name maps to a pair of factories producing the same API
//! type: the real implementation and an inert fallback. Providers are stored
//! type-erased and recovered by API type at lookup.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use warden_core::{CapabilityError, CapabilityName, WardenResult};

use crate::apis::{names, AudioApi, HapticsApi, NoopAudio, NoopHaptics, NoopStorage, StorageApi};

/// A capability factory could not build its API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FactoryError(pub String);

impl FactoryError {
    pub fn new(message: impl Into<String>) -> Self {
        FactoryError(message.into())
    }
}

impl From<&str> for FactoryError {
    fn from(message: &str) -> Self {
        FactoryError(message.to_string())
    }
}

impl From<String> for FactoryError {
    fn from(message: String) -> Self {
        FactoryError(message)
    }
}

pub type FactoryResult<T> = Result<Arc<T>, FactoryError>;

type Factory<T> = Box<dyn Fn() -> FactoryResult<T> + Send + Sync>;

pub(crate) struct Provider<T: ?Sized> {
    pub(crate) real: Factory<T>,
    pub(crate) noop: Factory<T>,
}

/// Capability name to factory pair
#[derive(Default)]
pub struct CapabilityRegistry {
    providers: HashMap<CapabilityName, Box<dyn Any + Send + Sync>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factories for one capability
    pub fn register<T, R, N>(&mut self, name: &str, real: R, noop: N) -> WardenResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        R: Fn() -> FactoryResult<T> + Send + Sync + 'static,
        N: Fn() -> FactoryResult<T> + Send + Sync + 'static,
    {
        let name = CapabilityName::new(name)?;
        if self.providers.contains_key(&name) {
            return Err(CapabilityError::DuplicateProvider(name.into()).into());
        }
        let provider: Provider<T> = Provider {
            real: Box::new(real),
            noop: Box::new(noop),
        };
        self.providers.insert(name, Box::new(provider));
        Ok(())
    }

    /// Storage backed by `real`, falling back to [`NoopStorage`]
    pub fn register_storage<R>(&mut self, real: R) -> WardenResult<()>
    where
        R: Fn() -> FactoryResult<dyn StorageApi> + Send + Sync + 'static,
    {
        self.register(names::STORAGE, real, || -> FactoryResult<dyn StorageApi> {
            Ok(Arc::new(NoopStorage))
        })
    }

    /// Haptics backed by `real`, falling back to [`NoopHaptics`]
    pub fn register_haptics<R>(&mut self, real: R) -> WardenResult<()>
    where
        R: Fn() -> FactoryResult<dyn HapticsApi> + Send + Sync + 'static,
    {
        self.register(names::HAPTICS, real, || -> FactoryResult<dyn HapticsApi> {
            Ok(Arc::new(NoopHaptics))
        })
    }

    /// Audio backed by `real`, falling back to [`NoopAudio`]
    pub fn register_audio<R>(&mut self, real: R) -> WardenResult<()>
    where
        R: Fn() -> FactoryResult<dyn AudioApi> + Send + Sync + 'static,
    {
        self.register(names::AUDIO, real, || -> FactoryResult<dyn AudioApi> {
            Ok(Arc::new(NoopAudio))
        })
    }

    pub fn contains(&self, name: &CapabilityName) -> bool {
        self.providers.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub(crate) fn provider<T: ?Sized + 'static>(
        &self,
        name: &CapabilityName,
    ) -> Result<&Provider<T>, CapabilityError> {
        let erased = self
            .providers
            .get(name)
            .ok_or_else(|| CapabilityError::NotProvided(name.to_string()))?;
        erased
            .downcast_ref::<Provider<T>>()
            .ok_or_else(|| CapabilityError::TypeMismatch(name.to_string()))
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.providers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use warden_core::WardenError;

    #[test]
    fn test_duplicate_provider_rejected() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_storage(|| -> FactoryResult<dyn StorageApi> { Ok(Arc::new(MemoryStorage::new())) })
            .unwrap();
        let err = registry
            .register_storage(|| -> FactoryResult<dyn StorageApi> { Ok(Arc::new(NoopStorage)) })
            .unwrap_err();
        assert!(matches!(
            err,
            WardenError::Capability(CapabilityError::DuplicateProvider(ref n)) if n == "storage"
        ));
    }

    #[test]
    fn test_provider_lookup_checks_type() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_audio(|| -> FactoryResult<dyn AudioApi> { Ok(Arc::new(NoopAudio)) })
            .unwrap();
        let audio = CapabilityName::new(names::AUDIO).unwrap();

        assert!(registry.provider::<dyn AudioApi>(&audio).is_ok());
        assert!(matches!(
            registry.provider::<dyn StorageApi>(&audio),
            Err(CapabilityError::TypeMismatch(_))
        ));

        let haptics = CapabilityName::new(names::HAPTICS).unwrap();
        assert!(matches!(
            registry.provider::<dyn HapticsApi>(&haptics),
            Err(CapabilityError::NotProvided(_))
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = CapabilityRegistry::new();
        let result = registry.register(
            "",
            || -> FactoryResult<dyn AudioApi> { Ok(Arc::new(NoopAudio)) },
            || -> FactoryResult<dyn AudioApi> { Ok(Arc::new(NoopAudio)) },
        );
        assert!(matches!(result, Err(WardenError::Value(_))));
        assert!(registry.is_empty());
    }
}
