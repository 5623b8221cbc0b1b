//! The compiled-in operation table

use crate::pricing::PriceSource;
use crate::registry::{
    build_registry, CategoryDef, Computation, OperationDef, OperationDescriptor, OperationModule,
};
use crate::Result;
use std::sync::Arc;

pub mod arithmetic;

pub const BASIC_ARITHMETIC: CategoryDef = CategoryDef::new("Basic Arithmetic")
    .with_description("Fundamental mathematical operations")
    .with_sort_order(1);

pub const ADVANCED_MATH: CategoryDef = CategoryDef::new("Advanced Math")
    .with_description("Advanced mathematical functions")
    .with_sort_order(2);

pub const FINANCIAL: CategoryDef = CategoryDef::new("Financial")
    .with_description("Financial prices and calculations")
    .with_sort_order(4);

pub static OPERATION_TABLE: &[OperationModule] = &[
    OperationModule {
        category: Some(BASIC_ARITHMETIC),
        operations: &[
            OperationDef {
                name: "Add",
                description: Some("Adds two decimal numbers"),
                parameter_labels: &["First number", "Second number"],
                computation: Computation::Binary(arithmetic::add),
            },
            OperationDef {
                name: "Subtract",
                description: Some("Subtracts second number from first"),
                parameter_labels: &["Number to subtract from", "Number to subtract"],
                computation: Computation::Binary(arithmetic::subtract),
            },
        ],
    },
    OperationModule {
        category: Some(ADVANCED_MATH),
        operations: &[OperationDef {
            name: "Square",
            description: Some("Calculates the square of a number"),
            parameter_labels: &["Number to square"],
            computation: Computation::Unary(arithmetic::square),
        }],
    },
    OperationModule {
        category: Some(FINANCIAL),
        operations: &[
            OperationDef {
                name: "Bitcoin Price",
                description: Some("Gets current Bitcoin price in USD"),
                parameter_labels: &[],
                computation: Computation::PriceLookup { asset_id: "bitcoin" },
            },
            OperationDef {
                name: "Ethereum Price",
                description: Some("Gets current Ethereum price in USD"),
                parameter_labels: &[],
                computation: Computation::PriceLookup { asset_id: "ethereum" },
            },
        ],
    },
];

/// Build descriptors for every compiled-in operation.
pub fn create_default_registry(prices: Arc<dyn PriceSource>) -> Result<Vec<OperationDescriptor>> {
    build_registry(OPERATION_TABLE, prices)
}
