//! Interactive menu loop
//!
//! Category menu → operation menu → parameter prompts → result, repeated
//! until the user exits or input ends. Errors are shown and the loop resumes.

use crate::execution::ExecutionEngine;
use crate::input::parse_decimal;
use crate::registry::OperationDescriptor;
use crate::Result;
use rust_decimal::Decimal;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

pub struct Console<R, W> {
    input: R,
    output: W,
    engine: ExecutionEngine,
}

enum Flow {
    Continue,
    Quit,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W, engine: ExecutionEngine) -> Self {
        Self {
            input,
            output,
            engine,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Run until "Exit" is chosen or input is exhausted.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let engine = self.engine.clone();
            let categories = engine.categories();

            let mut menu = String::from("\nMyCalc - Choose a category:\n");
            for (i, category) in categories.iter().enumerate() {
                menu.push_str(&format!("  {}. {}\n", i + 1, category.display_name()));
            }
            menu.push_str(&format!("  {}. Exit\n", categories.len() + 1));
            self.write(&menu).await?;

            let Some(choice) = self.choose(categories.len() + 1).await? else {
                return Ok(());
            };

            if choice == categories.len() {
                info!("User requested exit");
                self.write("Goodbye!\n").await?;
                return Ok(());
            }

            let category = &categories[choice];
            info!(category = %category.name, "User selected category");

            if let Flow::Quit = self.category_menu(category.name, &category.operations).await? {
                return Ok(());
            }
        }
    }

    async fn category_menu(&mut self, name: &str, operations: &[&OperationDescriptor]) -> Result<Flow> {
        loop {
            let mut menu = format!("\nMyCalc > {}\nChoose an operation from {}:\n", name, name);
            for (i, operation) in operations.iter().enumerate() {
                menu.push_str(&format!("  {}. {}\n", i + 1, operation.display_name()));
            }
            menu.push_str(&format!("  {}. Back to Categories\n", operations.len() + 1));
            self.write(&menu).await?;

            let Some(choice) = self.choose(operations.len() + 1).await? else {
                return Ok(Flow::Quit);
            };

            if choice == operations.len() {
                debug!("User selected back to categories");
                return Ok(Flow::Continue);
            }

            let operation = operations[choice];
            info!(operation = %operation.name(), category = %name, "User selected operation");

            let mut arguments = Vec::with_capacity(operation.arity());
            for index in 0..operation.arity() {
                match self.read_decimal(&operation.parameter_label(index)).await? {
                    Some(value) => arguments.push(value),
                    None => return Ok(Flow::Quit),
                }
            }

            match self.engine.execute(operation, &arguments).await {
                Ok(result) => {
                    info!(operation = %operation.name(), %result, "Operation completed");
                    self.write(&format!("Result: {}\n", result)).await?;
                }
                Err(e) => {
                    error!(operation = %operation.name(), error = %e, "Operation failed");
                    self.write(&format!("Error: {}\n", e)).await?;
                }
            }
        }
    }

    /// Read a 1-based menu choice in `1..=count`; `None` at end of input.
    async fn choose(&mut self, count: usize) -> Result<Option<usize>> {
        loop {
            self.write("> ").await?;
            let Some(line) = self.read_line().await? else {
                return Ok(None);
            };

            match line.trim().parse::<usize>() {
                Ok(n) if (1..=count).contains(&n) => return Ok(Some(n - 1)),
                _ => self.write("Invalid choice. Please try again.\n").await?,
            }
        }
    }

    async fn read_decimal(&mut self, prompt: &str) -> Result<Option<Decimal>> {
        loop {
            self.write(&format!("{}: ", prompt)).await?;
            let Some(line) = self.read_line().await? else {
                return Ok(None);
            };

            match parse_decimal(&line) {
                Ok(value) => {
                    debug!(input = %line.trim(), %value, "Parsed decimal input");
                    return Ok(Some(value));
                }
                Err(_) => {
                    debug!(input = %line.trim(), "Invalid number format");
                    self.write("Invalid number format. Please try again.\n").await?;
                }
            }
        }
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}
