//! Capability declaration set

use std::collections::BTreeSet;

use warden_core::{CapabilityError, CapabilityName, WardenError};

/// Fixed set of capability names a guest registered interest in
///
/// Immutable once built; a name listed twice is a declaration error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapabilityDeclarations {
    names: BTreeSet<CapabilityName>,
}

impl CapabilityDeclarations {
    pub fn new(names: impl IntoIterator<Item = CapabilityName>) -> Result<Self, CapabilityError> {
        let mut set = BTreeSet::new();
        for name in names {
            if set.contains(&name) {
                return Err(CapabilityError::DuplicateDeclaration(name.into()));
            }
            set.insert(name);
        }
        Ok(CapabilityDeclarations { names: set })
    }

    /// Build from raw strings, validating each name
    pub fn parse<I, S>(raw: I) -> Result<Self, WardenError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = raw
            .into_iter()
            .map(CapabilityName::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(names)?)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &CapabilityName) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityName> {
        self.names.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
