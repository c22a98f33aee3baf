//! Provider - Contracts every resource and data source implements
//!
//! A provider registers one [`ResourceContract`] per resource type and one
//! [`DataSourceContract`] per data source. The host invokes the handlers
//! through its own RPC boundary; each invocation receives an
//! [`OperationContext`] carrying the operation timeout and cancellation token,
//! and a [`ResourceData`] handle it mutates in place.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::diagnostics::Diagnostics;
use crate::resource::ResourceData;
use crate::schema::ResourceSchema;

/// Address of the resource an error refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    /// Resource type (e.g., "scaleway_lb")
    pub resource_type: String,
    /// External identifier (e.g., "fr-par-1/6ba7b810-...")
    pub id: String,
}

impl ResourceAddress {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn of(d: &ResourceData) -> Self {
        Self::new(d.resource_type(), d.id())
    }
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource: Option<ResourceAddress>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.resource {
            Some(addr) if !addr.id.is_empty() => {
                write!(f, "[{} {}] {}", addr.resource_type, addr.id, self.message)
            }
            Some(addr) => write!(f, "[{}] {}", addr.resource_type, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, resource: ResourceAddress) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn cancelled(operation: Operation) -> Self {
        Self::new(format!("{} cancelled", operation))
    }

    pub fn timed_out(operation: Operation, timeout: Duration) -> Self {
        Self::new(format!("{} timed out after {:?}", operation, timeout))
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Resource lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        write!(f, "{}", name)
    }
}

/// Per-operation timeouts declared by a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    /// Default timeout (5 minutes)
    pub const DEFAULT: Duration = Duration::from_secs(5 * 60);

    /// Same timeout for every operation
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            create: timeout,
            read: timeout,
            update: timeout,
            delete: timeout,
        }
    }

    pub fn for_operation(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(Self::DEFAULT)
    }
}

/// Context handed to every operation
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: Operation,
    pub timeout: Duration,
    cancel: CancellationToken,
}

impl OperationContext {
    pub fn new(operation: Operation, timeout: Duration) -> Self {
        Self {
            operation,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Context whose cancellation follows `parent` (e.g. the provider stop token)
    pub fn child_of(operation: Operation, timeout: Duration, parent: &CancellationToken) -> Self {
        Self {
            operation,
            timeout,
            cancel: parent.child_token(),
        }
    }

    /// Same cancellation scope, different operation (e.g. create finishing with a read)
    pub fn for_operation(&self, operation: Operation, timeout: Duration) -> Self {
        Self {
            operation,
            timeout,
            cancel: self.cancel.clone(),
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the operation is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Plan-time hook validating the planned values of a resource
pub type CustomizeDiffFn = Arc<dyn Fn(&ResourceData) -> Result<(), String> + Send + Sync>;

/// Contract of a managed resource type
///
/// Handlers mutate the [`ResourceData`] in place. A read that finds the remote
/// resource gone empties the identifier and returns success.
#[async_trait]
pub trait ResourceContract: Send + Sync {
    /// Resource type name (e.g., "scaleway_lb")
    fn type_name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema;

    /// Per-operation timeouts
    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    /// Plan-time validation hooks
    fn customize_diff(&self) -> Vec<CustomizeDiffFn> {
        Vec::new()
    }

    /// Import by identifier. The identifier carries the scope, so passing it
    /// through is enough for a subsequent read to reconstitute the state.
    fn import(&self, id: &str) -> ProviderResult<ResourceData> {
        Ok(ResourceData::imported(self.type_name(), id))
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        d: &mut ResourceData,
    ) -> ProviderResult<Diagnostics>;

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData)
    -> ProviderResult<Diagnostics>;

    async fn update(
        &self,
        ctx: &OperationContext,
        d: &mut ResourceData,
    ) -> ProviderResult<Diagnostics>;

    async fn delete(
        &self,
        ctx: &OperationContext,
        d: &mut ResourceData,
    ) -> ProviderResult<Diagnostics>;
}

/// Contract of a data source
#[async_trait]
pub trait DataSourceContract: Send + Sync {
    /// Data source type name (e.g., "scaleway_lb")
    fn type_name(&self) -> &'static str;

    /// Attribute schema, usually derived from the resource schema
    fn schema(&self) -> ResourceSchema;

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData)
    -> ProviderResult<Diagnostics>;
}

/// Main Provider trait
///
/// Each infrastructure provider implements this trait to expose its catalog.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "scaleway")
    fn name(&self) -> &'static str;

    /// Resource contracts this Provider can handle
    fn resources(&self) -> Vec<Arc<dyn ResourceContract>>;

    /// Data sources this Provider exposes
    fn data_sources(&self) -> Vec<Arc<dyn DataSourceContract>>;

    fn resource(&self, type_name: &str) -> Option<Arc<dyn ResourceContract>> {
        self.resources()
            .into_iter()
            .find(|r| r.type_name() == type_name)
    }

    fn data_source(&self, type_name: &str) -> Option<Arc<dyn DataSourceContract>> {
        self.data_sources()
            .into_iter()
            .find(|r| r.type_name() == type_name)
    }
}

/// Run one resource operation, honoring its timeout and cancellation.
///
/// Whatever the handler already wrote into `d` (such as the identifier set
/// right after a create call) is kept when the operation is aborted.
pub async fn run_operation(
    contract: &dyn ResourceContract,
    ctx: &OperationContext,
    d: &mut ResourceData,
) -> ProviderResult<Diagnostics> {
    let address = ResourceAddress::new(contract.type_name(), d.id());
    log::debug!(
        "{} {} {}",
        ctx.operation,
        contract.type_name(),
        if d.id().is_empty() { "<new>" } else { d.id() }
    );

    let call = async {
        match ctx.operation {
            Operation::Create => contract.create(ctx, d).await,
            Operation::Read => contract.read(ctx, d).await,
            Operation::Update => contract.update(ctx, d).await,
            Operation::Delete => contract.delete(ctx, d).await,
        }
    };

    tokio::select! {
        result = tokio::time::timeout(ctx.timeout, call) => match result {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::timed_out(ctx.operation, ctx.timeout).for_resource(address)),
        },
        _ = ctx.cancelled() => Err(ProviderError::cancelled(ctx.operation).for_resource(address)),
    }
}

/// Run a data source read, honoring the read timeout and cancellation
pub async fn run_data_source(
    contract: &dyn DataSourceContract,
    ctx: &OperationContext,
    d: &mut ResourceData,
) -> ProviderResult<Diagnostics> {
    let address = ResourceAddress::new(contract.type_name(), "");
    tokio::select! {
        result = tokio::time::timeout(ctx.timeout, contract.read(ctx, d)) => match result {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::timed_out(ctx.operation, ctx.timeout).for_resource(address)),
        },
        _ = ctx.cancelled() => Err(ProviderError::cancelled(ctx.operation).for_resource(address)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::schema::{AttributeSchema, AttributeType};

    // Mock resource for testing
    struct MockResource {
        create_delay: Duration,
    }

    #[async_trait]
    impl ResourceContract for MockResource {
        fn type_name(&self) -> &'static str {
            "mock_thing"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new("mock_thing")
                .attribute(AttributeSchema::new("name", AttributeType::String).required())
        }

        async fn create(
            &self,
            _ctx: &OperationContext,
            d: &mut ResourceData,
        ) -> ProviderResult<Diagnostics> {
            d.set_id("fr-par-1/mock-id-123");
            tokio::time::sleep(self.create_delay).await;
            Ok(Diagnostics::new())
        }

        async fn read(
            &self,
            _ctx: &OperationContext,
            d: &mut ResourceData,
        ) -> ProviderResult<Diagnostics> {
            d.set_id("");
            Ok(Diagnostics::new())
        }

        async fn update(
            &self,
            _ctx: &OperationContext,
            _d: &mut ResourceData,
        ) -> ProviderResult<Diagnostics> {
            Ok(Diagnostics::new())
        }

        async fn delete(
            &self,
            _ctx: &OperationContext,
            _d: &mut ResourceData,
        ) -> ProviderResult<Diagnostics> {
            Ok(Diagnostics::new())
        }
    }

    #[tokio::test]
    async fn read_can_tombstone() {
        let resource = MockResource {
            create_delay: Duration::ZERO,
        };
        let ctx = OperationContext::new(Operation::Read, Timeouts::DEFAULT);
        let mut d = ResourceData::imported("mock_thing", "fr-par-1/mock-id-123");
        run_operation(&resource, &ctx, &mut d).await.unwrap();
        assert!(d.is_gone());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_keeps_committed_id() {
        let resource = MockResource {
            create_delay: Duration::from_secs(600),
        };
        let ctx = OperationContext::new(Operation::Create, Duration::from_secs(1));
        let mut d = ResourceData::new("mock_thing", HashMap::new());

        let err = run_operation(&resource, &ctx, &mut d).await.unwrap_err();
        assert!(err.message.contains("timed out"));
        assert_eq!(d.id(), "fr-par-1/mock-id-123");
    }

    #[tokio::test]
    async fn cancelled_context_aborts() {
        let resource = MockResource {
            create_delay: Duration::from_secs(600),
        };
        let parent = CancellationToken::new();
        let ctx = OperationContext::child_of(Operation::Create, Timeouts::DEFAULT, &parent);
        parent.cancel();

        let mut d = ResourceData::new("mock_thing", HashMap::new());
        let err = run_operation(&resource, &ctx, &mut d).await.unwrap_err();
        assert_eq!(err.message, "create cancelled");
    }

    #[test]
    fn import_passes_id_through() {
        let resource = MockResource {
            create_delay: Duration::ZERO,
        };
        let d = resource.import("fr-par-1/abc").unwrap();
        assert_eq!(d.id(), "fr-par-1/abc");
        assert_eq!(d.resource_type(), "mock_thing");
    }

    #[test]
    fn timeouts_per_operation() {
        let t = Timeouts {
            create: Duration::from_secs(1),
            read: Duration::from_secs(2),
            update: Duration::from_secs(3),
            delete: Duration::from_secs(4),
        };
        assert_eq!(t.for_operation(Operation::Update), Duration::from_secs(3));
        assert_eq!(Timeouts::default().read, Timeouts::DEFAULT);
    }
}
