//! Execution engine for registered operations
//!
//! Validates the argument count, then dispatches to the descriptor.
//! No retries, logging or caching happen here.

use crate::error::CalcError;
use crate::registry::{group_by_category, CategoryGroup, OperationDescriptor};
use crate::Result;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Validates and invokes operations from a fixed registry
#[derive(Clone)]
pub struct ExecutionEngine {
    operations: Arc<[OperationDescriptor]>,
}

impl ExecutionEngine {
    pub fn new(operations: Vec<OperationDescriptor>) -> Self {
        Self {
            operations: operations.into(),
        }
    }

    /// All operations, in registry order
    pub fn list_operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    pub fn categories(&self) -> Vec<CategoryGroup<'_>> {
        group_by_category(&self.operations)
    }

    /// First operation with the given name
    pub fn find(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|d| d.name() == name)
    }

    pub async fn execute(&self, descriptor: &OperationDescriptor, arguments: &[Decimal]) -> Result<Decimal> {
        execute(descriptor, arguments).await
    }
}

/// Run `descriptor` against `arguments`.
///
/// A count mismatch fails before the computation is touched; computation
/// failures come back as `InvocationError` with the cause attached.
pub async fn execute(descriptor: &OperationDescriptor, arguments: &[Decimal]) -> Result<Decimal> {
    if arguments.len() != descriptor.arity() {
        return Err(CalcError::ValidationError {
            operation: descriptor.name().to_string(),
            expected: descriptor.arity(),
            actual: arguments.len(),
        });
    }

    descriptor
        .invoker()
        .invoke(arguments)
        .await
        .map_err(|source| CalcError::InvocationError {
            operation: descriptor.name().to_string(),
            source,
        })
}
