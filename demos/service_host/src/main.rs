//! Service Host Example
//!
//! Boots a [`ServiceRuntime`] from `keystone.toml`, early-initializes every
//! declared service and prints an announcement produced by two cooperating
//! services.
//!
//! # Services
//!
//! ```text
//! Announcer (demo.announcer)
//! └── early-inits Greeter (demo.greeter) through its owning broker
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package service-host -- --config demos/service_host/keystone.toml
//! ```

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use keystone::prelude::*;
use parking_lot::RwLock;
use tracing::info;

// ============================================================================
// Services
// ============================================================================

/// Builds greetings from the `greeting` setting of its section.
#[derive(Default)]
struct Greeter {
    core: ServiceCore,
    greeting: RwLock<String>,
}

impl Greeter {
    fn greet(&self, audience: &str) -> String {
        format!("{}, {audience}!", self.greeting.read())
    }
}

impl Initable for Greeter {
    fn lifecycle(&self) -> &Lifecycle {
        self.core.lifecycle()
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn late_init(&self) -> Result<(), InitError> {
        let greeting = self
            .configuration()
            .get_str("greeting")
            .unwrap_or("Hello")
            .to_string();
        info!(service = %self.name(), %greeting, "Greeter ready");
        *self.greeting.write() = greeting;
        self.core.lifecycle().mark_initialized();
        Ok(())
    }
}

impl Service for Greeter {
    fn core(&self) -> &ServiceCore {
        &self.core
    }
}

#[register_service("demo.greeter")]
fn greeter() -> Greeter {
    Greeter::default()
}

/// Announces a greeting to the configured audience. Depends on `Greeter`.
#[derive(Default)]
struct Announcer {
    core: ServiceCore,
}

impl Announcer {
    fn announce(&self) -> Result<String, BrokerError> {
        let broker = self
            .lifecycle()
            .owner()
            .ok_or_else(|| BrokerError::unknown_service("Greeter"))?;
        let greeter = broker.resolve_as::<Greeter>("Greeter")?;
        let audience = self.configuration().get_str("audience").unwrap_or("world").to_string();
        Ok(greeter.greet(&audience))
    }
}

impl Initable for Announcer {
    fn lifecycle(&self) -> &Lifecycle {
        self.core.lifecycle()
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn early_init(&self, data: &InitData) -> Result<(), InitError> {
        if let Some(broker) = self.lifecycle().owner() {
            broker.early_init("Greeter", data)?;
        }
        self.late_init()
    }
}

impl Service for Announcer {
    fn core(&self) -> &ServiceCore {
        &self.core
    }
}

#[register_service("demo.announcer")]
fn announcer() -> Announcer {
    Announcer::default()
}

// ============================================================================
// Main
// ============================================================================

#[derive(Parser, Debug)]
#[command(version, about = "Keystone service host")]
struct Args {
    /// Configuration file to load instead of searching the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (e.g. "development", "production")
    #[arg(short, long)]
    profile: Option<String>,

    /// Abort startup on the first service that fails to initialize
    #[arg(long)]
    fail_fast: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = ServiceRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }

    let runtime = builder.build().context("Failed to bootstrap the service runtime")?;
    runtime
        .start(&InitData::new(), args.fail_fast)
        .context("Failed to start services")?;

    let announcer = runtime.get_service_as::<Announcer>("Announcer")?;
    println!("{}", announcer.announce()?);

    for name in runtime.broker().service_names() {
        info!(
            service = %name,
            implementation = ?runtime.broker().implementation_of(&name),
            initialized = runtime.broker().is_initialized(&name),
            "Service status"
        );
    }

    runtime.shutdown();
    Ok(())
}
