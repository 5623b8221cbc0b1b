//! Operation descriptors and registry
//!
//! Operations are declared in a static table (see `crate::operations`) and
//! turned into descriptors once at startup. Descriptors are immutable and
//! can be shared freely across tasks.

use crate::error::{CalcError, OperationFailure};
use crate::pricing::PriceSource;
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// Category name used when a module declares none
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Sort order for operations without a declared category
pub const UNCATEGORIZED_SORT_ORDER: i32 = 999;

/// The computation behind a descriptor.
///
/// Implementations receive exactly `arity` arguments; the execution engine
/// checks the count before calling.
#[async_trait]
pub trait Invoke: Send + Sync {
    async fn invoke(&self, args: &[Decimal]) -> std::result::Result<Decimal, OperationFailure>;
}

//
// ================= Declaration table =================
//

/// Shape of a declared operation. Arity follows from the variant.
#[derive(Debug, Clone, Copy)]
pub enum Computation {
    Unary(fn(Decimal) -> Option<Decimal>),
    Binary(fn(Decimal, Decimal) -> Option<Decimal>),
    PriceLookup { asset_id: &'static str },
}

impl Computation {
    pub fn arity(&self) -> usize {
        match self {
            Computation::Unary(_) => 1,
            Computation::Binary(_) => 2,
            Computation::PriceLookup { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OperationDef {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub parameter_labels: &'static [&'static str],
    pub computation: Computation,
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryDef {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub sort_order: i32,
}

impl CategoryDef {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            description: None,
            sort_order: 0,
        }
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub const fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// A group of operations sharing an (optional) category declaration.
#[derive(Debug, Clone, Copy)]
pub struct OperationModule {
    pub category: Option<CategoryDef>,
    pub operations: &'static [OperationDef],
}

//
// ================= Descriptor =================
//

/// Immutable description of one callable operation
#[derive(Clone)]
pub struct OperationDescriptor {
    name: String,
    description: Option<String>,
    parameter_labels: Vec<String>,
    arity: usize,
    category_name: String,
    category_description: Option<String>,
    category_sort_order: i32,
    invoke: Arc<dyn Invoke>,
}

impl OperationDescriptor {
    /// Uncategorized descriptor around an arbitrary computation.
    pub fn new(name: impl Into<String>, arity: usize, invoke: Arc<dyn Invoke>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameter_labels: Vec::new(),
            arity,
            category_name: UNCATEGORIZED.to_string(),
            category_description: None,
            category_sort_order: UNCATEGORIZED_SORT_ORDER,
            invoke,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameter_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_category(mut self, category: &CategoryDef) -> Self {
        self.category_name = category.name.to_string();
        self.category_description = category.description.map(str::to_string);
        self.category_sort_order = category.sort_order;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameter_labels(&self) -> &[String] {
        &self.parameter_labels
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn category_name(&self) -> &str {
        &self.category_name
    }

    pub fn category_description(&self) -> Option<&str> {
        self.category_description.as_deref()
    }

    pub fn category_sort_order(&self) -> i32 {
        self.category_sort_order
    }

    /// Prompt for the parameter at `index`, falling back to "Parameter N".
    pub fn parameter_label(&self, index: usize) -> String {
        self.parameter_labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Parameter {}", index + 1))
    }

    /// "Name - Description", or just the name.
    pub fn display_name(&self) -> String {
        match &self.description {
            Some(description) => format!("{} - {}", self.name, description),
            None => self.name.clone(),
        }
    }

    pub(crate) fn invoker(&self) -> &dyn Invoke {
        self.invoke.as_ref()
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameter_labels", &self.parameter_labels)
            .field("arity", &self.arity)
            .field("category_name", &self.category_name)
            .field("category_sort_order", &self.category_sort_order)
            .finish_non_exhaustive()
    }
}

//
// ================= Invokers =================
//

struct ArithmeticInvoke {
    name: &'static str,
    computation: Computation,
}

#[async_trait]
impl Invoke for ArithmeticInvoke {
    async fn invoke(&self, args: &[Decimal]) -> std::result::Result<Decimal, OperationFailure> {
        let value = match (self.computation, args) {
            (Computation::Unary(f), [a]) => f(*a),
            (Computation::Binary(f), [a, b]) => f(*a, *b),
            _ => {
                return Err(OperationFailure::Arguments(format!(
                    "{} expects {} arguments, but {} were provided.",
                    self.name,
                    self.computation.arity(),
                    args.len()
                )))
            }
        };

        value.ok_or(OperationFailure::Overflow(self.name))
    }
}

struct PriceInvoke {
    asset_id: &'static str,
    prices: Arc<dyn PriceSource>,
}

#[async_trait]
impl Invoke for PriceInvoke {
    async fn invoke(&self, args: &[Decimal]) -> std::result::Result<Decimal, OperationFailure> {
        if !args.is_empty() {
            return Err(OperationFailure::Arguments(format!(
                "{} price lookup takes no arguments, but {} were provided.",
                self.asset_id,
                args.len()
            )));
        }

        Ok(self.prices.fetch_price(self.asset_id).await?)
    }
}

//
// ================= Registry =================
//

/// Build descriptors from a declaration table, in table order.
///
/// Price lookups share the given `prices` source.
pub fn build_registry(
    table: &[OperationModule],
    prices: Arc<dyn PriceSource>,
) -> Result<Vec<OperationDescriptor>> {
    let mut descriptors = Vec::with_capacity(table.iter().map(|m| m.operations.len()).sum());

    for module in table {
        for def in module.operations {
            validate_definition(def)?;

            let invoke: Arc<dyn Invoke> = match def.computation {
                Computation::PriceLookup { asset_id } => Arc::new(PriceInvoke {
                    asset_id,
                    prices: Arc::clone(&prices),
                }),
                computation => Arc::new(ArithmeticInvoke {
                    name: def.name,
                    computation,
                }),
            };

            let mut descriptor = OperationDescriptor::new(def.name, def.computation.arity(), invoke)
                .with_parameter_labels(def.parameter_labels.iter().copied());
            if let Some(description) = def.description {
                descriptor = descriptor.with_description(description);
            }
            if let Some(category) = &module.category {
                descriptor = descriptor.in_category(category);
            }

            descriptors.push(descriptor);
        }
    }

    Ok(descriptors)
}

fn validate_definition(def: &OperationDef) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(CalcError::RegistryError(
            "operation declared with an empty name".to_string(),
        ));
    }

    let arity = def.computation.arity();
    if def.parameter_labels.len() > arity {
        return Err(CalcError::RegistryError(format!(
            "{} declares {} parameter labels but takes {} arguments",
            def.name,
            def.parameter_labels.len(),
            arity
        )));
    }

    if let Computation::PriceLookup { asset_id } = def.computation {
        if asset_id.trim().is_empty() {
            return Err(CalcError::RegistryError(format!(
                "{} has no asset id",
                def.name
            )));
        }
    }

    Ok(())
}

//
// ================= Category grouping =================
//

/// Borrowed view of the descriptors sharing one category
#[derive(Debug, Clone)]
pub struct CategoryGroup<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub sort_order: i32,
    pub operations: Vec<&'a OperationDescriptor>,
}

impl CategoryGroup<'_> {
    pub fn display_name(&self) -> String {
        match self.description {
            Some(description) => format!("{} - {}", self.name, description),
            None => self.name.to_string(),
        }
    }
}

/// Group descriptors by category, ordered by sort order then name.
pub fn group_by_category(descriptors: &[OperationDescriptor]) -> Vec<CategoryGroup<'_>> {
    let mut groups: Vec<CategoryGroup<'_>> = Vec::new();

    for descriptor in descriptors {
        let existing = groups.iter_mut().find(|g| {
            g.name == descriptor.category_name()
                && g.description == descriptor.category_description()
                && g.sort_order == descriptor.category_sort_order()
        });

        match existing {
            Some(group) => group.operations.push(descriptor),
            None => groups.push(CategoryGroup {
                name: descriptor.category_name(),
                description: descriptor.category_description(),
                sort_order: descriptor.category_sort_order(),
                operations: vec![descriptor],
            }),
        }
    }

    // sort_by is stable: equal keys keep first-seen order
    groups.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(b.name)));
    groups
}
