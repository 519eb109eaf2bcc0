//! Process-lifetime registry of tracked browser handles

use crate::engine::BrowserHandle;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Set of top-level browser handles created by executed instructions.
///
/// Identity-keyed: the same handle is tracked once no matter how often it
/// is observed. Entries are never removed; the registry lives as long as
/// the process and is drained only on termination.
#[derive(Default)]
pub struct ResourceRegistry {
    browsers: Mutex<Vec<Arc<dyn BrowserHandle>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `browser`. Repeated adds of the same handle are no-ops.
    pub fn add(&self, browser: Arc<dyn BrowserHandle>) {
        let mut browsers = self.browsers.lock().unwrap_or_else(PoisonError::into_inner);
        if browsers.iter().any(|tracked| same_handle(tracked, &browser)) {
            return;
        }
        browsers.push(browser);
        debug!("Tracking browser handle ({} total)", browsers.len());
    }

    /// Number of tracked browsers.
    pub fn len(&self) -> usize {
        self.browsers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Initiate close on every tracked browser without waiting for
    /// completion. Entries are retained; the process is exiting.
    pub fn close_all(&self) {
        let browsers = self.browsers.lock().unwrap_or_else(PoisonError::into_inner);
        for browser in browsers.iter() {
            let browser = Arc::clone(browser);
            tokio::spawn(async move {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser gracefully: {}", e);
                }
            });
        }
    }
}

fn same_handle(a: &Arc<dyn BrowserHandle>, b: &Arc<dyn BrowserHandle>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
