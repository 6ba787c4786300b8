//! Model dumps: trait-based format dispatch.

pub mod json;
pub mod outline;

use crate::store::Store;
use anyhow::{anyhow, Result};

/// Renders the whole store into one output document.
pub trait Renderer {
    fn render(&self, store: &Store) -> Result<String>;
}

/// Create a renderer for the given format name.
pub fn create_renderer(format: &str) -> Result<Box<dyn Renderer>> {
    match format {
        "json" => Ok(Box::new(json::JsonRenderer)),
        "outline" | "text" => Ok(Box::new(outline::OutlineRenderer)),
        _ => Err(anyhow!("unknown format: {}. Use json or outline", format)),
    }
}
