//! MyCalc
//!
//! Named decimal operations behind one calling contract:
//! - Operations are declared in a static table and built into descriptors once
//! - The execution engine checks arity, then dispatches
//! - Arithmetic is exact (`rust_decimal`), never binary floating point
//! - Price lookups go through a rate-limit aware retrying HTTP client
//!
//! FLOW:
//! TABLE → REGISTRY → SELECT → EXECUTE → (PRICE CLIENT → RETRY?) → RESULT

pub mod api;
pub mod config;
pub mod console;
pub mod error;
pub mod execution;
pub mod input;
pub mod operations;
pub mod pricing;
pub mod registry;

pub use error::Result;

// Re-export common types
pub use error::{CalcError, OperationFailure, PriceFetchError, PriceFetchErrorKind};
pub use execution::ExecutionEngine;
pub use registry::{group_by_category, CategoryGroup, OperationDescriptor};
