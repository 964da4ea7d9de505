//! The Initable broker: construction, two-phase initialization and shutdown
//! of singleton components.
//!
//! [`InitableBroker`] owns one instance per key for its whole life. It
//!
//! - constructs instances lazily through a [`FactoryRegistry`] and attaches the
//!   owner back-reference before anyone sees them;
//! - runs **early init** under a broker-wide re-entrant lock, keeping a stack
//!   of keys in flight to detect circular init chains;
//! - runs **late init** on first resolution under a per-key lock, so racing
//!   callers trigger exactly one `late_init()` while unrelated keys proceed in
//!   parallel (construction takes the same per-key lock, never the map lock);
//! - shuts instances down and forces their status back to uninitialized.
//!
//! The broker is generic over the managed capability: `InitableBroker` (the
//! default, `dyn Initable`) is a standalone broker keyed by implementation key,
//! while [`ServiceBroker`](crate::ServiceBroker) drives an
//! `InitableBroker<dyn Service>` keyed by service name.
//!
//! # Example
//!
//! ```rust,ignore
//! let factories = Arc::new(FactoryRegistry::new());
//! factories.register("acme.clock", || Ok(Arc::new(Clock::default())));
//!
//! let broker = InitableBroker::new(factories);
//! broker.early_init("acme.clock", &InitData::new().with(StartTime::now()))?;
//! let clock = broker.resolve_as::<Clock>("acme.clock")?;
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::broker::Broker;
use crate::dependency::DependencyStack;
use crate::diagnostics::Diagnostics;
use crate::error::{BrokerError, BrokerResult, InitError, ResolutionKind, error_chain};
use crate::factory::{Component, FactoryRegistry};
use crate::lifecycle::{InitData, Initable};

/// Registry and factory owning singleton components of capability `C`.
pub struct InitableBroker<C: ?Sized + Component = dyn Initable> {
    /// Back-reference handed to every constructed instance.
    owner: Weak<dyn Broker>,
    factories: Arc<FactoryRegistry<C>>,
    instances: RwLock<HashMap<String, Arc<C>>>,
    dependency_stack: DependencyStack,
    /// Per-key locks serializing construction and late init of one key.
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Keys whose late init failed, with the rendered failure.
    poisoned: RwLock<HashMap<String, String>>,
    diagnostics: Diagnostics,
}

impl InitableBroker<dyn Initable> {
    /// Creates a standalone broker that is its own owner.
    pub fn new(factories: Arc<FactoryRegistry<dyn Initable>>) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let owner: Weak<dyn Broker> = me.clone();
            Self::with_owner(owner, factories)
        })
    }

    /// Resolves `key` and downcasts the ready instance to `T`.
    pub fn resolve_as<T: Any + Send + Sync>(&self, key: &str) -> BrokerResult<Arc<T>> {
        self.resolve(key)?
            .as_any()
            .downcast::<T>()
            .map_err(|_| BrokerError::type_mismatch(key, type_name::<T>()))
    }
}

impl<C: ?Sized + Component> InitableBroker<C> {
    /// Creates a broker whose instances report to `owner`.
    ///
    /// Used by brokers that wrap this one and want components to call back
    /// into the wrapper rather than into the inner broker.
    pub fn with_owner(owner: Weak<dyn Broker>, factories: Arc<FactoryRegistry<C>>) -> Self {
        Self {
            owner,
            factories,
            instances: RwLock::new(HashMap::new()),
            dependency_stack: DependencyStack::new(),
            key_locks: Mutex::new(HashMap::new()),
            poisoned: RwLock::new(HashMap::new()),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn factories(&self) -> &Arc<FactoryRegistry<C>> {
        &self.factories
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    // ─── Construction ────────────────────────────────────────────────────────

    /// Returns the cached instance for `key` without constructing it.
    pub fn instance(&self, key: &str) -> Option<Arc<C>> {
        self.instances.read().get(key).cloned()
    }

    pub fn is_constructed(&self, key: &str) -> bool {
        self.instances.read().contains_key(key)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    /// Keys of all constructed instances, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.instances.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the instance for `key`, constructing it from the factory
    /// registered under the same key on first use.
    pub fn construct_instance(&self, key: &str) -> BrokerResult<Arc<C>> {
        self.instance_or_construct(key, key, |_| {})
    }

    /// Returns the instance cached under `key`, constructing it from the
    /// factory registered under `implementation` on first use.
    ///
    /// `prepare` runs once on a fresh instance, after the owner back-reference
    /// is attached and before the instance becomes visible to other callers.
    /// Failures are normalized into [`BrokerError::Resolution`] and nothing is
    /// cached.
    ///
    /// The factory runs under the per-key lock only; cached instances of
    /// other keys stay readable meanwhile.
    pub fn instance_or_construct<F>(
        &self,
        key: &str,
        implementation: &str,
        prepare: F,
    ) -> BrokerResult<Arc<C>>
    where
        F: FnOnce(&C),
    {
        if let Some(instance) = self.instance(key) {
            return Ok(instance);
        }

        let lock = self.key_lock(key);
        let _guard = lock.lock();
        if let Some(instance) = self.instance(key) {
            return Ok(instance);
        }

        let instance = match self.factories.create(implementation) {
            Some(Ok(instance)) => instance,
            Some(Err(err)) => {
                return Err(BrokerError::from_factory(
                    key,
                    implementation,
                    C::CAPABILITY,
                    err,
                ));
            }
            None => {
                return Err(BrokerError::resolution(
                    key,
                    ResolutionKind::Unavailable,
                    implementation,
                    C::CAPABILITY,
                ));
            }
        };

        instance.attach_owner(self.owner.clone());
        prepare(&*instance);
        self.instances
            .write()
            .insert(key.to_string(), Arc::clone(&instance));
        debug!(key, implementation, "Component instance constructed");
        Ok(instance)
    }

    /// Drops the cached instance for `key` together with its lock and failure
    /// records. The instance is not shut down.
    pub fn evict(&self, key: &str) -> Option<Arc<C>> {
        self.poisoned.write().remove(key);
        self.key_locks.lock().remove(key);
        self.instances.write().remove(key)
    }

    // ─── Early init ──────────────────────────────────────────────────────────

    /// Early-initializes the component registered under `key`.
    ///
    /// No-op when the instance is already initialized. Fails with
    /// [`BrokerError::CircularDependency`] when `key` is reached again from
    /// its own early-init chain.
    pub fn early_init(&self, key: &str, data: &InitData) -> BrokerResult<()> {
        self.early_init_with(key, data, || self.construct_instance(key))
    }

    /// Early-initializes `key`, obtaining the instance from `construct`.
    ///
    /// Everything from construction to the end of the component's
    /// `early_init` runs inside the broker-wide dependency-stack region.
    pub fn early_init_with<F>(&self, key: &str, data: &InitData, construct: F) -> BrokerResult<()>
    where
        F: FnOnce() -> BrokerResult<Arc<C>>,
    {
        let stack = self.dependency_stack.lock();
        let instance = construct()?;
        if instance.is_initialized() {
            return Ok(());
        }

        let _frame = stack.push(key)?;
        debug!(key, "Early init started");
        match instance.early_init(data) {
            Ok(()) if instance.is_initialized() => {
                self.poisoned.write().remove(key);
                debug!(key, "Early init finished");
                Ok(())
            }
            Ok(()) => Err(BrokerError::initialization(
                key,
                InitError::new(format!("early_init() failed to initialize {key}")),
            )),
            Err(InitError::Broker(nested)) => Err(*nested),
            Err(err) => Err(BrokerError::initialization(key, err)),
        }
    }

    // ─── Late init ───────────────────────────────────────────────────────────

    /// Returns a ready instance of `key`, late-initializing it on first use.
    pub fn resolve(&self, key: &str) -> BrokerResult<Arc<C>> {
        self.late_init_with(key, || self.construct_instance(key))
    }

    /// Ensures `key` is initialized.
    pub fn late_init(&self, key: &str) -> BrokerResult<()> {
        self.resolve(key).map(|_| ())
    }

    /// Returns a ready instance of `key`, obtaining it from `construct`.
    ///
    /// Double-checked: already-initialized instances are returned without
    /// locking; otherwise the per-key lock is taken, the status re-checked and
    /// `late_init()` run at most once. A late init that fails, or returns
    /// without initializing the component, poisons the key: the instance
    /// stays cached and every later call reports the same failure.
    pub fn late_init_with<F>(&self, key: &str, construct: F) -> BrokerResult<Arc<C>>
    where
        F: FnOnce() -> BrokerResult<Arc<C>>,
    {
        let instance = construct()?;
        if instance.is_initialized() {
            return Ok(instance);
        }
        self.check_poisoned(key)?;

        let lock = self.key_lock(key);
        let _guard = lock.lock();
        if !instance.is_initialized() {
            self.check_poisoned(key)?;
            info!(key, "Late init started");
            match instance.late_init() {
                Ok(()) => {}
                Err(InitError::Broker(nested)) => {
                    self.poison(key, error_chain(&*nested));
                    return Err(*nested);
                }
                Err(err) => {
                    self.poison(key, error_chain(&err));
                    return Err(BrokerError::initialization(key, err));
                }
            }
            if !instance.is_initialized() {
                let reason = format!("late_init() failed to initialize {key}");
                self.poison(key, reason.clone());
                return Err(BrokerError::initialization(key, InitError::new(reason)));
            }
            info!(key, "Late init finished");
        }
        Ok(instance)
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.key_locks.lock().entry(key.to_string()).or_default())
    }

    fn poison(&self, key: &str, reason: String) {
        self.poisoned.write().insert(key.to_string(), reason);
    }

    fn check_poisoned(&self, key: &str) -> BrokerResult<()> {
        match self.poisoned.read().get(key) {
            Some(reason) => Err(BrokerError::initialization(key, InitError::new(reason.clone()))),
            None => Ok(()),
        }
    }

    /// Returns `true` if a late init of `key` failed permanently.
    pub fn is_poisoned(&self, key: &str) -> bool {
        self.poisoned.read().contains_key(key)
    }

    // ─── Shutdown ────────────────────────────────────────────────────────────

    /// Shuts down the cached instance of `key` if it is initialized, then
    /// forces its status to uninitialized.
    ///
    /// Never constructs. Returns `true` if a shutdown actually ran.
    pub fn shutdown_instance(&self, key: &str) -> bool {
        let Some(instance) = self.instance(key) else {
            return false;
        };
        if !instance.is_initialized() {
            return false;
        }
        instance.shutdown();
        instance.lifecycle().mark_uninitialized();
        info!(key, "Component shut down");
        true
    }

    /// Like [`shutdown_instance`](Self::shutdown_instance), reporting a
    /// diagnostic when `key` is neither constructed nor constructible.
    pub fn shutdown(&self, key: &str) -> bool {
        if !self.is_constructed(key) && !self.factories.contains(key) {
            self.diagnostics.error_message(format!(
                "Shutdown of a nonexistent component {key} was requested"
            ));
            return false;
        }
        self.shutdown_instance(key)
    }
}

impl Broker for InitableBroker<dyn Initable> {
    fn early_init(&self, key: &str, data: &InitData) -> BrokerResult<()> {
        InitableBroker::early_init(self, key, data)
    }

    fn resolve_any(&self, key: &str) -> BrokerResult<Arc<dyn Any + Send + Sync>> {
        self.resolve(key).map(|instance| instance.as_any())
    }

    fn shutdown(&self, key: &str) {
        InitableBroker::shutdown(self, key);
    }

    fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

impl<C: ?Sized + Component> std::fmt::Debug for InitableBroker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitableBroker")
            .field("capability", &C::CAPABILITY)
            .field("instances", &self.keys())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::diagnostics::Diagnostic;
    use crate::error::FactoryError;
    use crate::lifecycle::Lifecycle;

    #[derive(Default)]
    struct Gadget {
        lifecycle: Lifecycle,
        deps: Vec<&'static str>,
        fail_late: bool,
        skip_mark: bool,
        early_calls: AtomicUsize,
        late_calls: AtomicUsize,
        shutdown_calls: AtomicUsize,
    }

    impl Initable for Gadget {
        fn lifecycle(&self) -> &Lifecycle {
            &self.lifecycle
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }

        fn early_init(&self, data: &InitData) -> Result<(), InitError> {
            self.early_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(owner) = self.lifecycle.owner() {
                for dep in &self.deps {
                    owner.early_init(dep, data)?;
                }
            }
            self.lifecycle.mark_initialized();
            Ok(())
        }

        fn late_init(&self) -> Result<(), InitError> {
            self.late_calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            if self.fail_late {
                return Err(InitError::new("backing store offline"));
            }
            if !self.skip_mark {
                self.lifecycle.mark_initialized();
            }
            Ok(())
        }

        // Does not reset the status on purpose; the broker must.
        fn shutdown(&self) {
            self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn boxed(gadget: Gadget) -> Result<Arc<dyn Initable>, FactoryError> {
        Ok(Arc::new(gadget))
    }

    fn counting(
        factories: &FactoryRegistry<dyn Initable>,
        key: &str,
        make: fn() -> Gadget,
    ) -> Arc<AtomicUsize> {
        let constructed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&constructed);
        factories.register(key, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            boxed(make())
        });
        constructed
    }

    #[test]
    fn test_resolve_returns_singleton() {
        let factories = Arc::new(FactoryRegistry::new());
        let constructed = counting(&factories, "gadget", Gadget::default);
        let broker = InitableBroker::new(factories);

        let first = broker.resolve_as::<Gadget>("gadget").unwrap();
        let second = broker.resolve_as::<Gadget>("gadget").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_initialized());
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert_eq!(first.late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_resolve_runs_late_init_once() {
        let factories = Arc::new(FactoryRegistry::new());
        let constructed = counting(&factories, "gadget", Gadget::default);
        let broker = InitableBroker::new(factories);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let broker = Arc::clone(&broker);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    broker.resolve_as::<Gadget>("gadget").unwrap()
                })
            })
            .collect();
        let resolved: Vec<Arc<Gadget>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert_eq!(resolved[0].late_calls.load(Ordering::SeqCst), 1);
        assert!(resolved.iter().all(|gadget| Arc::ptr_eq(gadget, &resolved[0])));
        assert!(resolved.iter().all(|gadget| gadget.is_initialized()));
    }

    #[test]
    fn test_early_init_cycle_reports_chain() {
        let factories = Arc::new(FactoryRegistry::new());
        factories.register("A", || boxed(Gadget { deps: vec!["B"], ..Gadget::default() }));
        factories.register("B", || boxed(Gadget { deps: vec!["C"], ..Gadget::default() }));
        factories.register("C", || boxed(Gadget { deps: vec!["A"], ..Gadget::default() }));
        factories.register("D", || boxed(Gadget::default()));
        let broker = InitableBroker::new(factories);

        let err = broker.early_init("A", &InitData::new()).unwrap_err();
        assert_eq!(err.key(), "A");
        assert_eq!(err.chain().unwrap(), ["A", "B", "C", "A"]);
        assert_eq!(
            err.to_string(),
            "A couldn't be initialized because of circular dependency chain: A->B->C->A"
        );
        for key in ["A", "B", "C"] {
            assert!(!broker.instance(key).unwrap().is_initialized());
        }

        // The stack unwound; unrelated keys still initialize.
        broker.early_init("D", &InitData::new()).unwrap();
        assert!(broker.instance("D").unwrap().is_initialized());
    }

    #[test]
    fn test_early_init_dependencies_and_noop() {
        let factories = Arc::new(FactoryRegistry::new());
        factories.register("app", || boxed(Gadget { deps: vec!["db"], ..Gadget::default() }));
        factories.register("db", || boxed(Gadget::default()));
        let broker = InitableBroker::new(factories);

        broker.early_init("app", &InitData::new()).unwrap();
        broker.early_init("app", &InitData::new()).unwrap();
        broker.early_init("db", &InitData::new()).unwrap();

        let app = broker.resolve_as::<Gadget>("app").unwrap();
        let db = broker.resolve_as::<Gadget>("db").unwrap();
        assert_eq!(app.early_calls.load(Ordering::SeqCst), 1);
        assert_eq!(db.early_calls.load(Ordering::SeqCst), 1);
        assert_eq!(app.late_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_late_init_poisons_key() {
        let factories = Arc::new(FactoryRegistry::new());
        let constructed = counting(&factories, "flaky", || Gadget {
            fail_late: true,
            ..Gadget::default()
        });
        let broker = InitableBroker::new(factories);

        let first = broker.resolve("flaky").unwrap_err();
        assert!(matches!(first, BrokerError::Initialization { ref key, .. } if key == "flaky"));
        let second = broker.resolve("flaky").unwrap_err();
        assert!(error_chain(&second).contains("backing store offline"));

        assert!(broker.is_poisoned("flaky"));
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        let gadget = broker.instance("flaky").unwrap().as_any().downcast::<Gadget>().unwrap();
        assert_eq!(gadget.late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_late_init_must_initialize() {
        let factories = Arc::new(FactoryRegistry::new());
        let constructed = counting(&factories, "lazy", || Gadget {
            skip_mark: true,
            ..Gadget::default()
        });
        let broker = InitableBroker::new(factories);

        let first = broker.resolve("lazy").unwrap_err();
        assert!(error_chain(&first).contains("late_init() failed to initialize lazy"));
        let cached = broker.instance("lazy").unwrap();

        let second = broker.resolve("lazy").unwrap_err();
        assert_eq!(second.to_string(), first.to_string());
        assert!(error_chain(&second).contains("late_init() failed to initialize lazy"));

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&cached, &broker.instance("lazy").unwrap()));
        let gadget = cached.as_any().downcast::<Gadget>().unwrap();
        assert_eq!(gadget.late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_early_init_clears_poison() {
        let factories = Arc::new(FactoryRegistry::new());
        factories.register("flaky", || {
            boxed(Gadget {
                fail_late: true,
                ..Gadget::default()
            })
        });
        let broker = InitableBroker::new(factories);

        assert!(broker.resolve("flaky").is_err());
        assert!(broker.is_poisoned("flaky"));

        broker.early_init("flaky", &InitData::new()).unwrap();
        assert!(!broker.is_poisoned("flaky"));
        let gadget = broker.resolve_as::<Gadget>("flaky").unwrap();

        // After shutdown the next resolution runs late_init again instead of
        // replaying the old failure.
        assert!(broker.shutdown("flaky"));
        assert!(broker.resolve("flaky").is_err());
        assert_eq!(gadget.late_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_slow_construction_does_not_block_other_keys() {
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let factories = Arc::new(FactoryRegistry::new());
        factories.register("fast", || boxed(Gadget::default()));
        factories.register("other", || boxed(Gadget::default()));
        {
            let entered = Arc::clone(&entered);
            let release = Arc::clone(&release);
            factories.register("slow", move || {
                entered.wait();
                release.wait();
                boxed(Gadget::default())
            });
        }
        let broker = InitableBroker::new(factories);
        let fast = broker.resolve("fast").unwrap();

        let slow = {
            let broker = Arc::clone(&broker);
            thread::spawn(move || broker.resolve("slow").is_ok())
        };
        entered.wait();

        let (tx, rx) = std::sync::mpsc::channel();
        {
            let broker = Arc::clone(&broker);
            thread::spawn(move || {
                let fast = broker.resolve("fast").map(|instance| instance.is_initialized());
                let other = broker.resolve("other").is_ok();
                let _ = tx.send((fast.unwrap_or(false), other));
            });
        }
        let during_slow = rx.recv_timeout(Duration::from_secs(5));
        release.wait();

        assert_eq!(during_slow, Ok((true, true)));
        assert!(slow.join().unwrap());
        assert!(Arc::ptr_eq(&fast, &broker.resolve("fast").unwrap()));
        assert_eq!(broker.instance_count(), 3);
    }

    #[test]
    fn test_unknown_key_caches_nothing() {
        let broker = InitableBroker::new(Arc::new(FactoryRegistry::new()));

        let err = broker.resolve("missing").unwrap_err();
        assert_eq!(err.resolution_kind(), Some(ResolutionKind::Unavailable));
        let err = broker.early_init("missing", &InitData::new()).unwrap_err();
        assert_eq!(err.resolution_kind(), Some(ResolutionKind::Unavailable));
        assert_eq!(broker.instance_count(), 0);
    }

    #[test]
    fn test_factory_failures_are_classified() {
        let factories = Arc::new(FactoryRegistry::new());
        factories.register("needs-db", || Err(FactoryError::MissingDependency("db".into())));
        factories.register("broken", || {
            Err(FactoryError::failed(std::io::Error::other("disk full")))
        });
        let broker = InitableBroker::new(factories);

        let err = broker.resolve("needs-db").unwrap_err();
        assert_eq!(err.resolution_kind(), Some(ResolutionKind::MissingDependency));
        let err = broker.resolve("broken").unwrap_err();
        assert_eq!(err.resolution_kind(), Some(ResolutionKind::ConstructionFailed));
        assert!(error_chain(&err).contains("disk full"));
        assert_eq!(broker.instance_count(), 0);
    }

    #[test]
    fn test_resolve_as_wrong_type() {
        let factories = Arc::new(FactoryRegistry::new());
        factories.register("gadget", || boxed(Gadget::default()));
        let broker = InitableBroker::new(factories);

        let err = broker.resolve_as::<String>("gadget").unwrap_err();
        assert_eq!(err.resolution_kind(), Some(ResolutionKind::TypeMismatch));
    }

    #[test]
    fn test_shutdown_forces_uninitialized() {
        let factories = Arc::new(FactoryRegistry::new());
        factories.register("gadget", || boxed(Gadget::default()));
        let broker = InitableBroker::new(factories);

        assert!(!broker.shutdown("gadget"));
        assert!(!broker.is_constructed("gadget"));

        let gadget = broker.resolve_as::<Gadget>("gadget").unwrap();
        assert!(broker.shutdown("gadget"));
        assert!(!gadget.is_initialized());
        assert_eq!(gadget.shutdown_calls.load(Ordering::SeqCst), 1);
        assert!(!broker.shutdown("gadget"));

        // A shut-down component late-initializes again on the next request.
        let again = broker.resolve_as::<Gadget>("gadget").unwrap();
        assert!(Arc::ptr_eq(&gadget, &again));
        assert_eq!(again.late_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shutdown_of_unknown_key_is_reported() {
        let broker = InitableBroker::new(Arc::new(FactoryRegistry::new()));

        assert!(!broker.shutdown("ghost"));
        let buffered = broker.diagnostics().buffered();
        assert!(matches!(
            buffered.as_slice(),
            [Diagnostic::Error(message)] if message.contains("nonexistent component ghost")
        ));
    }
}
