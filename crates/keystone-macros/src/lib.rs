//! Procedural macros for the Keystone service framework.
//!
//! This crate provides:
//!
//! - `#[register_initable("key")]` - Registers a constructor as a plain Initable
//! - `#[register_service("key")]` - Registers a constructor as a Service
//!
//! Both attributes leave the constructor unchanged and add an entry to the
//! link-time `COMPONENT_REGISTRY` of `keystone-core`, so a factory registry
//! built with `FactoryRegistry::with_static_registry()` can construct the
//! component by key.
//!
//! ```rust,ignore
//! use keystone::prelude::*;
//!
//! #[register_service("acme.mailer")]
//! fn mailer() -> Mailer {
//!     Mailer::default()
//! }
//! ```
//!
//! The generated code refers to `::keystone_core`, so the crate using the
//! attributes must depend on `keystone-core` directly.

mod register;

use proc_macro::TokenStream;

/// Registers a zero-argument constructor as an Initable under the given key.
///
/// The constructor's return type must implement `Initable`.
#[proc_macro_attribute]
pub fn register_initable(attr: TokenStream, item: TokenStream) -> TokenStream {
    register::register_component(attr, item, register::Capability::Initable)
}

/// Registers a zero-argument constructor as a Service under the given key.
///
/// The constructor's return type must implement `Service`. The entry is also
/// usable by Initable brokers.
#[proc_macro_attribute]
pub fn register_service(attr: TokenStream, item: TokenStream) -> TokenStream {
    register::register_component(attr, item, register::Capability::Service)
}
