//! Warden Capability - Guarded access to side-effecting host APIs
//!
//! A guest declares up front which host features it wants. At runtime each
//! lookup goes through [`CapabilityGuard`]:
//! - Undeclared names are a wiring bug and fail loudly
//! - Declared names still pass a host permission predicate
//! - Denied or broken capabilities degrade to an inert no-op API
//! - A broken no-op factory is unrecoverable host misconfiguration

pub mod apis;
pub mod declarations;
pub mod registry;
pub mod guard;

pub use apis::*;
pub use declarations::*;
pub use registry::*;
pub use guard::*;
