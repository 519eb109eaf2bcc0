//! Automation-engine boundary: traits, opaque values and runtime classification
//!
//! The delegate never names the engine's exported types directly. Everything
//! it consumes goes through the traits below, and values produced by
//! instructions travel as [`EngineValue`] carrying the type name the engine
//! reported at runtime.

use crate::console::ConsoleMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Engine boundary errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// Page viewport settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub emulating_mobile: bool,
    pub is_landscape: bool,
    pub has_touch: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            device_scale_factor: 1.0,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        }
    }
}

/// CAPTCHA resolver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResolverConfig {
    /// Resolver provider id
    pub provider: Option<String>,

    /// Resolver API token; empty is an accepted default
    pub token: String,
}

/// Per-instruction engine preparation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnginePrep {
    /// Mask automation fingerprints on pages the engine produces
    pub mask_identity: bool,

    /// CAPTCHA resolver settings
    pub resolver: ResolverConfig,
}

/// Callback subscribed to a page's console events.
pub type ConsoleHandler = Arc<dyn Fn(ConsoleMessage) + Send + Sync>;

/// Entry point of the automation engine, bound to each instruction as its
/// default resource.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineHandle: Send + Sync {
    /// Apply preparation settings. Cheap; callers re-apply per instruction.
    fn configure(&self, prep: EnginePrep);

    /// Produce the engine's top-level browser value.
    async fn browser(&self) -> Result<EngineValue, EngineError>;

    /// Open a page at `url` and produce its value.
    async fn open_page(&self, url: &str) -> Result<EngineValue, EngineError>;
}

/// A top-level browser owning zero or more pages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    /// Pages currently open on this browser.
    async fn pages(&self) -> Result<Vec<Arc<dyn PageHandle>>, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

/// A single browsing context owned by a browser.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), EngineError>;

    async fn set_javascript_enabled(&self, enabled: bool) -> Result<(), EngineError>;

    /// `None` disables the navigation timeout entirely.
    async fn set_default_navigation_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Result<(), EngineError>;

    /// Install a script evaluated before any document script on every
    /// future navigation of this page.
    async fn evaluate_on_new_document(&self, source: &str) -> Result<(), EngineError>;

    /// Subscribe `handler` to this page's console events.
    async fn on_console(&self, handler: ConsoleHandler) -> Result<(), EngineError>;
}

/// Recognized kinds of automation resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Browser,
    Page,
}

/// Classify an engine-reported type name.
///
/// The engine's exported types are not stable across versions, so the only
/// contract treated as stable is the final path segment of the name it
/// reports. Nominal type identity is never consulted; this function is the
/// one place that assumption lives.
pub fn resource_kind(type_name: &str) -> Option<ResourceKind> {
    match short_type_name(type_name) {
        "Browser" => Some(ResourceKind::Browser),
        "Page" => Some(ResourceKind::Page),
        _ => None,
    }
}

/// Final path segment of a possibly fully-qualified type name.
pub(crate) fn short_type_name(full: &str) -> &str {
    full.rsplit("::").next().unwrap_or(full).trim()
}

/// Opaque value produced by executing an instruction.
///
/// Carries the type name the engine reported at runtime together with the
/// capability payload. Classification decisions are made on the name alone
/// via [`resource_kind`]; the accessors only hand out the capability once
/// that decision is made.
#[derive(Clone)]
pub struct EngineValue {
    type_name: String,
    payload: Payload,
}

#[derive(Clone)]
enum Payload {
    Browser(Arc<dyn BrowserHandle>),
    Page(Arc<dyn PageHandle>),
    Data(Arc<serde_json::Value>),
}

impl EngineValue {
    /// Wrap a browser capability under the engine-reported `type_name`.
    pub fn browser(type_name: impl Into<String>, handle: Arc<dyn BrowserHandle>) -> Self {
        Self {
            type_name: type_name.into(),
            payload: Payload::Browser(handle),
        }
    }

    /// Wrap a page capability under the engine-reported `type_name`.
    pub fn page(type_name: impl Into<String>, handle: Arc<dyn PageHandle>) -> Self {
        Self {
            type_name: type_name.into(),
            payload: Payload::Page(handle),
        }
    }

    /// Wrap a plain data value under the engine-reported `type_name`.
    pub fn data(type_name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            type_name: type_name.into(),
            payload: Payload::Data(Arc::new(value)),
        }
    }

    /// The runtime type name the engine reported for this value.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn as_browser(&self) -> Option<Arc<dyn BrowserHandle>> {
        match &self.payload {
            Payload::Browser(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    pub fn as_page(&self) -> Option<Arc<dyn PageHandle>> {
        match &self.payload {
            Payload::Page(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match &self.payload {
            Payload::Data(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for EngineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.payload {
            Payload::Browser(_) => "browser",
            Payload::Page(_) => "page",
            Payload::Data(_) => "data",
        };
        f.debug_struct("EngineValue")
            .field("type_name", &self.type_name)
            .field("payload", &kind)
            .finish()
    }
}
