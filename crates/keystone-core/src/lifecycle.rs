//! The lifecycle capability every pluggable component implements.
//!
//! A component embeds a [`Lifecycle`] cell (directly, or through a
//! [`ServiceCore`](crate::ServiceCore)) and implements [`Initable`]. The
//! defaults cover the common case: a component that needs no startup data
//! initializes the same way in both phases and has nothing to release on
//! shutdown.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::any::Any;
//! use std::sync::Arc;
//! use keystone_core::{InitData, InitError, Initable, Lifecycle};
//!
//! #[derive(Default)]
//! struct Counter {
//!     lifecycle: Lifecycle,
//! }
//!
//! impl Initable for Counter {
//!     fn lifecycle(&self) -> &Lifecycle {
//!         &self.lifecycle
//!     }
//!
//!     fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
//!         self
//!     }
//!
//!     fn early_init(&self, data: &InitData) -> Result<(), InitError> {
//!         let start = data.get::<u64>().copied().unwrap_or_default();
//!         // ...
//!         self.lifecycle.mark_initialized();
//!         Ok(())
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::broker::Broker;
use crate::error::InitError;

// =============================================================================
// Lifecycle cell
// =============================================================================

/// Status flag and owner back-reference embedded in every component.
///
/// The status is an atomic so that already-initialized components can be
/// checked without taking any lock.
pub struct Lifecycle {
    initialized: AtomicBool,
    owner: RwLock<Option<Weak<dyn Broker>>>,
}

impl Lifecycle {
    /// Creates an uninitialized cell with no owner.
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            owner: RwLock::new(None),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn mark_uninitialized(&self) {
        self.initialized.store(false, Ordering::Release);
    }

    /// Records the broker that owns this component.
    pub fn attach_owner(&self, owner: Weak<dyn Broker>) {
        *self.owner.write() = Some(owner);
    }

    /// Returns the owning broker, if it is attached and still alive.
    pub fn owner(&self) -> Option<Arc<dyn Broker>> {
        self.owner.read().as_ref().and_then(Weak::upgrade)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("initialized", &self.is_initialized())
            .field("attached", &self.owner.read().is_some())
            .finish()
    }
}

// =============================================================================
// Initable trait
// =============================================================================

/// Lifecycle capability of a component managed by a broker.
///
/// After `early_init` or `late_init` returns `Ok`, [`is_initialized`] must read
/// `true`; the broker treats anything else as a fatal initialization failure.
/// After `shutdown`, the broker forces the status back to `false` regardless of
/// what the component did.
///
/// [`is_initialized`]: Initable::is_initialized
pub trait Initable: Send + Sync + 'static {
    /// The embedded lifecycle cell.
    fn lifecycle(&self) -> &Lifecycle;

    /// Upcasts a shared instance for typed downcasting by callers.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Called once by the broker right after construction.
    fn attach_owner(&self, owner: Weak<dyn Broker>) {
        self.lifecycle().attach_owner(owner);
    }

    /// Early initialization with caller-supplied startup data.
    ///
    /// May call back into the owning broker to early-init the components this
    /// one depends on. The default ignores `data` and runs [`late_init`].
    ///
    /// [`late_init`]: Initable::late_init
    fn early_init(&self, _data: &InitData) -> Result<(), InitError> {
        self.late_init()
    }

    /// Late initialization, triggered by the first resolution of the
    /// component when early init did not already complete it.
    fn late_init(&self) -> Result<(), InitError> {
        self.lifecycle().mark_initialized();
        Ok(())
    }

    /// Releases resources and returns to the uninitialized state.
    fn shutdown(&self) {
        self.lifecycle().mark_uninitialized();
    }

    fn is_initialized(&self) -> bool {
        self.lifecycle().is_initialized()
    }
}

impl std::fmt::Debug for dyn Initable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Initable")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// InitData
// =============================================================================

/// Startup data handed to `early_init`.
///
/// A bag of values keyed by their type: the host inserts whatever it has
/// (a config source, an application root, a handle) and each component picks
/// out the values it understands.
#[derive(Clone, Default)]
pub struct InitData {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl InitData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, replacing any previous value of the same type.
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Adds a value, replacing any previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Returns the value of type `T`, if present.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for InitData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitData")
            .field("values", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Plain {
        lifecycle: Lifecycle,
    }

    impl Initable for Plain {
        fn lifecycle(&self) -> &Lifecycle {
            &self.lifecycle
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[test]
    fn test_default_phases_toggle_status() {
        let plain = Plain::default();
        assert!(!plain.is_initialized());

        plain.early_init(&InitData::new()).unwrap();
        assert!(plain.is_initialized());

        plain.shutdown();
        assert!(!plain.is_initialized());

        plain.late_init().unwrap();
        assert!(plain.is_initialized());
    }

    #[test]
    fn test_init_data_lookup_by_type() {
        let data = InitData::new().with(42u64).with(String::from("root"));
        assert_eq!(data.get::<u64>(), Some(&42));
        assert_eq!(data.get::<String>().map(String::as_str), Some("root"));
        assert!(data.get::<i32>().is_none());
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_owner_is_weak() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.owner().is_none());
    }
}
