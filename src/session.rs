//! Load state: which store orders are currently loaded, and from where.
//!
//! A session starts empty (the input screen). A successful load replaces
//! the orders; a load that recognises nothing is rejected and leaves the
//! previous orders untouched. [`DispatchSession::reset`] returns to empty.

use crate::error::DispatchError;
use crate::model::StoreOrder;
use crate::pipeline::input::ResolvedInput;
use crate::pipeline::{delimited, tabular};
use tracing::{info, warn};

#[derive(Debug, Default, Clone)]
pub struct DispatchSession {
    orders: Vec<StoreOrder>,
    source_name: Option<String>,
}

impl DispatchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load spreadsheet bytes. Returns the number of stores recognised.
    pub fn load_workbook(&mut self, name: &str, bytes: &[u8]) -> Result<usize, DispatchError> {
        let orders = tabular::parse_workbook(bytes)?;
        self.accept(name, orders)
    }

    /// Load pasted comma-separated text. Returns the number of stores recognised.
    pub fn load_text(&mut self, name: &str, text: &str) -> Result<usize, DispatchError> {
        let orders = delimited::parse_delimited(text);
        self.accept(name, orders)
    }

    /// Load whatever [`crate::pipeline::input::resolve_input`] produced.
    pub fn load(&mut self, input: &ResolvedInput) -> Result<usize, DispatchError> {
        match input {
            ResolvedInput::Workbook { name, bytes } => self.load_workbook(name, bytes),
            ResolvedInput::Text { name, text } => self.load_text(name, text),
        }
    }

    fn accept(&mut self, name: &str, orders: Vec<StoreOrder>) -> Result<usize, DispatchError> {
        if orders.is_empty() {
            warn!("No store orders recognised in '{}'", name);
            return Err(DispatchError::NoRecordsRecognized {
                source_name: name.to_string(),
            });
        }
        let count = orders.len();
        info!("Loaded {} stores from '{}'", count, name);
        self.orders = orders;
        self.source_name = Some(name.to_string());
        Ok(count)
    }

    /// Discard the loaded orders.
    pub fn reset(&mut self) {
        self.orders.clear();
        self.source_name = None;
    }

    pub fn orders(&self) -> &[StoreOrder] {
        &self.orders
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        !self.orders.is_empty()
    }
}
