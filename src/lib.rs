//! Browser Delegate - remote-instruction execution for browser automation
//!
//! This library executes opaque instructions against a browser-automation
//! engine and manages the lifecycle of the resources they create:
//! - Per-instruction error disposition (reported vs. fatal)
//! - Tracking of created browsers for deterministic teardown
//! - Relaying of browser console events into the process logger
//! - Signal-driven cleanup on process termination

pub mod chromium;
pub mod config;
pub mod console;
pub mod engine;
pub mod executor;
pub mod instruction;
pub mod registry;
pub mod signals;

pub use chromium::ChromiumEngine;
pub use config::Config;
pub use console::{console_level, ConsoleArg, ConsoleMessage, ConsoleRelay, RelayError};
pub use engine::{
    resource_kind, BrowserHandle, ConsoleHandler, EngineError, EngineHandle, EnginePrep,
    EngineValue, PageHandle, ResolverConfig, ResourceKind, Viewport,
};
pub use executor::{DelegateStats, InstructionExecutor};
pub use instruction::{ActionResult, Instruction, InstructionAction};
pub use registry::ResourceRegistry;
pub use signals::SignalGuard;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "browser_delegate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
