//! ABOUTME: ConditionalOperation (§4.2, §9): predicate picks a branch; the branch taken is
//! ABOUTME: published through a synchronized region so compensation (possibly on another thread)
//! ABOUTME: can read it safely.

use crate::error::Result;
use crate::foundry::Foundry;
use crate::ids::OperationId;
use crate::operation::Operation;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type Predicate = Arc<dyn Fn(&Value, &Foundry) -> bool + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Branch {
    Then,
    Else,
}

/// Picks between two inner operations based on a synchronous predicate over the input and the
/// foundry's property bag. The branch actually taken is remembered so `restore` compensates the
/// right one, even if it runs on a different thread than `forge`.
pub struct ConditionalOperation {
    id: OperationId,
    name: String,
    predicate: Predicate,
    then_branch: Arc<dyn Operation>,
    else_branch: Arc<dyn Operation>,
    taken: Mutex<Option<Branch>>,
}

impl ConditionalOperation {
    pub fn new<P>(
        name: impl Into<String>,
        predicate: P,
        then_branch: Arc<dyn Operation>,
        else_branch: Arc<dyn Operation>,
    ) -> Self
    where
        P: Fn(&Value, &Foundry) -> bool + Send + Sync + 'static,
    {
        Self {
            id: OperationId::new(),
            name: name.into(),
            predicate: Arc::new(predicate),
            then_branch,
            else_branch,
            taken: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Operation for ConditionalOperation {
    fn id(&self) -> OperationId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn forge(&self, input: Value, foundry: &Foundry, cancel: CancellationToken) -> Result<Value> {
        let branch = if (self.predicate)(&input, foundry) {
            Branch::Then
        } else {
            Branch::Else
        };
        *self.taken.lock() = Some(branch);
        match branch {
            Branch::Then => self.then_branch.forge(input, foundry, cancel).await,
            Branch::Else => self.else_branch.forge(input, foundry, cancel).await,
        }
    }

    async fn restore(&self, output: Value, foundry: &Foundry, cancel: CancellationToken) -> Result<()> {
        match *self.taken.lock() {
            Some(Branch::Then) => self.then_branch.restore(output, foundry, cancel).await,
            Some(Branch::Else) => self.else_branch.restore(output, foundry, cancel).await,
            None => Ok(()),
        }
    }
}
