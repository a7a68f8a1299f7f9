//! ABOUTME: Russian-doll middleware pipeline (§4.3 design note): fold the middleware list in
//! ABOUTME: reverse so the first-registered middleware is outermost; `next` is re-callable.

use crate::error::Result;
use crate::foundry::Foundry;
use crate::operation::Operation;
use crate::workflow::Workflow;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The remaining operation-middleware chain, re-callable zero or more times (retry, timeout,
/// short-circuit). `next` only accepts a `cancel` token — the input it resumes with is whatever
/// was in scope when this `Next` was built; a middleware that wants to feed a different input
/// downstream must bypass `next` and invoke the operation itself.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn OperationMiddleware>],
    operation: &'a Arc<dyn Operation>,
    foundry: &'a Foundry,
    input: Value,
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        middlewares: &'a [Arc<dyn OperationMiddleware>],
        operation: &'a Arc<dyn Operation>,
        foundry: &'a Foundry,
        input: Value,
    ) -> Self {
        Self {
            middlewares,
            operation,
            foundry,
            input,
        }
    }

    /// Invoke the rest of the chain. Safe to call more than once.
    pub fn call(&self, cancel: CancellationToken) -> BoxFuture<'a, Result<Value>> {
        let input = self.input.clone();
        match self.middlewares.split_first() {
            Some((mw, rest)) => {
                let next = Next::new(rest, self.operation, self.foundry, input.clone());
                let mw = Arc::clone(mw);
                let operation = self.operation;
                let foundry = self.foundry;
                Box::pin(async move {
                    mw.handle(operation.as_ref(), foundry, input, next, cancel)
                        .await
                })
            }
            None => {
                let operation = self.operation;
                let foundry = self.foundry;
                Box::pin(async move { operation.forge(input, foundry, cancel).await })
            }
        }
    }
}

/// A function wrapping a single operation invocation. Implementations compose Russian-doll style:
/// the first middleware added to the foundry is outermost.
#[async_trait]
pub trait OperationMiddleware: Send + Sync {
    async fn handle(
        &self,
        operation: &dyn Operation,
        foundry: &Foundry,
        input: Value,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<Value>;
}

/// Builds the full operation-middleware chain and runs it to completion. Used by `Foundry` for
/// every operation invocation, whether driven directly or by a `Smith`.
pub async fn run_operation_chain(
    middlewares: &[Arc<dyn OperationMiddleware>],
    operation: &Arc<dyn Operation>,
    foundry: &Foundry,
    input: Value,
    cancel: CancellationToken,
) -> Result<Value> {
    Next::new(middlewares, operation, foundry, input)
        .call(cancel)
        .await
}

/// The remaining workflow-middleware chain wrapping the entire operation iteration. Same
/// re-callable contract as `Next`.
pub struct WorkflowNext<'a> {
    middlewares: &'a [Arc<dyn WorkflowMiddleware>],
    workflow: &'a Workflow,
    foundry: &'a Foundry,
    terminal: &'a (dyn Fn(CancellationToken) -> BoxFuture<'a, Result<Value>> + Send + Sync),
}

impl<'a> WorkflowNext<'a> {
    pub(crate) fn new(
        middlewares: &'a [Arc<dyn WorkflowMiddleware>],
        workflow: &'a Workflow,
        foundry: &'a Foundry,
        terminal: &'a (dyn Fn(CancellationToken) -> BoxFuture<'a, Result<Value>> + Send + Sync),
    ) -> Self {
        Self {
            middlewares,
            workflow,
            foundry,
            terminal,
        }
    }

    pub fn call(&self, cancel: CancellationToken) -> BoxFuture<'a, Result<Value>> {
        match self.middlewares.split_first() {
            Some((mw, rest)) => {
                let next = WorkflowNext::new(rest, self.workflow, self.foundry, self.terminal);
                let mw = Arc::clone(mw);
                let workflow = self.workflow;
                let foundry = self.foundry;
                Box::pin(async move { mw.handle(workflow, foundry, next, cancel).await })
            }
            None => (self.terminal)(cancel),
        }
    }
}

/// A function wrapping the entire workflow iteration.
#[async_trait]
pub trait WorkflowMiddleware: Send + Sync {
    async fn handle(
        &self,
        workflow: &Workflow,
        foundry: &Foundry,
        next: WorkflowNext<'_>,
        cancel: CancellationToken,
    ) -> Result<Value>;
}
