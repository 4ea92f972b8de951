//! Display regions the client renders inbound messages into.
//!
//! A [`Region`] is an append-only target addressed by a selector, the way the
//! browser client addressed `#messages-div`. The [`Document`] maps selectors to
//! regions and is what the rest of the client queries.

use crate::error::Error;
use colored::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Region that receives employee-created and counter lines.
pub const MESSAGES_DIV: &str = "#messages-div";
/// Region that receives chat messages.
pub const MESSAGE_DIV: &str = "#message-div";

pub trait Region: Send + Sync {
    fn selector(&self) -> &str;

    /// Appends one rendered line to the region.
    fn append(&self, line: &str);
}

/// Prints every appended line to stdout, tagged with the region's selector.
pub struct TerminalRegion {
    selector: String,
}

impl TerminalRegion {
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
        }
    }
}

impl Region for TerminalRegion {
    fn selector(&self) -> &str {
        &self.selector
    }

    fn append(&self, line: &str) {
        let tag = if self.selector == MESSAGE_DIV {
            self.selector.bright_magenta()
        } else {
            self.selector.bright_blue()
        };
        println!("[{}] {}", tag.bold(), line);
    }
}

/// Keeps appended lines in memory.
#[derive(Default)]
pub struct BufferRegion {
    selector: String,
    lines: Mutex<Vec<String>>,
}

impl BufferRegion {
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The region's markup: one `<p>` element per appended line.
    pub fn content(&self) -> String {
        self.lines()
            .iter()
            .map(|line| format!("<p>{line}</p>"))
            .collect()
    }
}

impl Region for BufferRegion {
    fn selector(&self) -> &str {
        &self.selector
    }

    fn append(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line.to_string());
    }
}

#[derive(Clone, Default)]
pub struct Document {
    regions: HashMap<String, Arc<dyn Region>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document with both display regions printing to the terminal.
    pub fn terminal() -> Self {
        Self::new()
            .with_region(Arc::new(TerminalRegion::new(MESSAGES_DIV)))
            .with_region(Arc::new(TerminalRegion::new(MESSAGE_DIV)))
    }

    /// Registers `region` under its own selector, replacing any previous one.
    pub fn with_region(mut self, region: Arc<dyn Region>) -> Self {
        self.regions.insert(region.selector().to_string(), region);
        self
    }

    pub fn query_selector(&self, selector: &str) -> Result<Arc<dyn Region>, Error> {
        self.regions
            .get(selector)
            .cloned()
            .ok_or_else(|| Error::missing_element(selector))
    }
}
