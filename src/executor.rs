//! Instruction execution: prepare the engine, run, classify, adopt

use crate::config::Config;
use crate::console::{ConsoleMessage, ConsoleRelay};
use crate::engine::{
    resource_kind, BrowserHandle, ConsoleHandler, EngineValue, PageHandle, ResourceKind, Viewport,
};
use crate::instruction::Instruction;
use crate::registry::ResourceRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Installed on every adopted page before any document script runs.
/// Notification permission queries resolve to the current permission
/// state; every other permission name reaches the original query.
const PERMISSIONS_QUERY_SHIM: &str = r#"
const originalQuery = window.navigator.permissions.query.bind(window.navigator.permissions);
window.navigator.permissions.query = (parameters) =>
    parameters.name === 'notifications'
        ? Promise.resolve({ state: Notification.permission })
        : originalQuery(parameters);
"#;

/// Execution statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DelegateStats {
    pub executed: u64,
    pub succeeded: u64,
    pub recovered_failures: u64,
    pub fatal_failures: u64,
    pub browsers_adopted: u64,
}

/// Orchestrates instruction execution against the automation engine.
///
/// The executor is the only entry point invoked by the connection layer:
/// one call per inbound instruction, returning through exactly one of the
/// two callbacks, except when a failure propagates fatally.
pub struct InstructionExecutor {
    config: Config,
    registry: Arc<ResourceRegistry>,
    relay: Arc<ConsoleRelay>,
    stats: Arc<RwLock<DelegateStats>>,
}

impl InstructionExecutor {
    pub fn new(config: Config, registry: Arc<ResourceRegistry>) -> Self {
        Self {
            config,
            registry,
            relay: Arc::new(ConsoleRelay::new()),
            stats: Arc::new(RwLock::new(DelegateStats::default())),
        }
    }

    /// Replace the console relay. Embedders that do not log through
    /// tracing route forwarded lines elsewhere with this.
    pub fn with_console_relay(mut self, relay: ConsoleRelay) -> Self {
        self.relay = Arc::new(relay);
        self
    }

    /// Execute one instruction.
    ///
    /// On success `on_success` receives the produced value. On failure
    /// with the instruction's catch flag set, `on_failure` receives the
    /// error and the process continues. With the flag unset the failure
    /// propagates to the caller and neither callback fires.
    pub async fn execute<S, F>(
        &self,
        instruction: Instruction,
        on_success: S,
        on_failure: F,
    ) -> anyhow::Result<()>
    where
        S: FnOnce(Option<EngineValue>) + Send,
        F: FnOnce(anyhow::Error) + Send,
    {
        {
            let mut stats = self.stats.write().await;
            stats.executed += 1;
        }

        let (action, catch_errors, engine) = instruction.into_parts();

        // Cheap, and configuration may change between calls: rebuilt and
        // re-applied on every invocation rather than cached.
        engine.configure(self.config.engine_prep());

        let outcome = match action(Arc::clone(&engine)).await {
            Ok(value) => self.adopt(value).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(value) => {
                {
                    let mut stats = self.stats.write().await;
                    stats.succeeded += 1;
                }
                on_success(value);
                Ok(())
            }
            Err(e) if catch_errors => {
                warn!("Instruction failed (recovered): {:#}", e);
                {
                    let mut stats = self.stats.write().await;
                    stats.recovered_failures += 1;
                }
                on_failure(e);
                Ok(())
            }
            Err(e) => {
                {
                    let mut stats = self.stats.write().await;
                    stats.fatal_failures += 1;
                }
                Err(e)
            }
        }
    }

    /// Classify a produced value by its runtime type tag and perform
    /// adoption side effects. The value itself is handed back untouched.
    async fn adopt(&self, value: Option<EngineValue>) -> anyhow::Result<Option<EngineValue>> {
        let Some(value) = value else {
            return Ok(None);
        };

        match resource_kind(value.type_name()) {
            Some(ResourceKind::Browser) => {
                if let Some(browser) = value.as_browser() {
                    self.adopt_browser(browser).await?;
                }
            }
            Some(ResourceKind::Page) => {
                if self.config.log_browser_console {
                    if let Some(page) = value.as_page() {
                        self.attach_relay(page.as_ref()).await?;
                    }
                }
            }
            None => {}
        }

        Ok(Some(value))
    }

    /// Track a newly observed browser and configure its current pages.
    ///
    /// Only the pages present at adoption time are configured and wired;
    /// pages the browser opens later are left untouched.
    async fn adopt_browser(&self, browser: Arc<dyn BrowserHandle>) -> anyhow::Result<()> {
        self.registry.add(Arc::clone(&browser));
        {
            let mut stats = self.stats.write().await;
            stats.browsers_adopted += 1;
        }

        let pages = browser.pages().await?;
        info!("Adopted browser with {} page(s)", pages.len());

        for page in &pages {
            self.prepare_page(page.as_ref()).await?;
            if self.config.log_browser_console {
                self.attach_relay(page.as_ref()).await?;
            }
        }
        Ok(())
    }

    /// Force the fixed viewport, enable script execution, disable the
    /// navigation timeout and install the permissions shim.
    async fn prepare_page(&self, page: &dyn PageHandle) -> anyhow::Result<()> {
        page.set_viewport(Viewport::default()).await?;
        page.set_javascript_enabled(true).await?;
        page.set_default_navigation_timeout(None).await?;
        page.evaluate_on_new_document(PERMISSIONS_QUERY_SHIM).await?;
        Ok(())
    }

    /// Subscribe the console relay to `page`. Relay failures are logged
    /// and recovered; they never abort the owning session.
    async fn attach_relay(&self, page: &dyn PageHandle) -> anyhow::Result<()> {
        let relay = Arc::clone(&self.relay);
        let handler: ConsoleHandler = Arc::new(move |message: ConsoleMessage| {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move {
                if let Err(e) = relay.relay(message).await {
                    warn!("Console relay failed: {}", e);
                }
            });
        });
        page.on_console(handler).await?;
        debug!("Console relay attached");
        Ok(())
    }

    /// Snapshot of the execution statistics.
    pub async fn stats(&self) -> DelegateStats {
        self.stats.read().await.clone()
    }
}
