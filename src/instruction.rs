//! Instruction values consumed by the executor

use crate::engine::{EngineHandle, EngineValue};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Result of running an instruction's action.
pub type ActionResult = anyhow::Result<Option<EngineValue>>;

/// The executable body of an instruction. Receives the bound default
/// resource and may produce an automation value.
pub type InstructionAction =
    Box<dyn FnOnce(Arc<dyn EngineHandle>) -> BoxFuture<'static, ActionResult> + Send>;

/// One unit of remotely requested work.
///
/// Created by the connection layer per request and consumed exactly once
/// by the executor. `catch_errors` decides whether a failing action is
/// reported through the failure callback or propagated to the executor's
/// caller as fatal.
pub struct Instruction {
    action: InstructionAction,
    catch_errors: bool,
    engine: Arc<dyn EngineHandle>,
}

impl Instruction {
    /// Build an instruction bound to `engine` as its default resource.
    pub fn new<A, Fut>(engine: Arc<dyn EngineHandle>, catch_errors: bool, action: A) -> Self
    where
        A: FnOnce(Arc<dyn EngineHandle>) -> Fut + Send + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        Self {
            action: Box::new(move |engine| Box::pin(action(engine))),
            catch_errors,
            engine,
        }
    }

    /// Whether action failures are reported to the caller instead of
    /// propagated as fatal.
    pub fn catch_errors(&self) -> bool {
        self.catch_errors
    }

    pub(crate) fn into_parts(self) -> (InstructionAction, bool, Arc<dyn EngineHandle>) {
        (self.action, self.catch_errors, self.engine)
    }
}
