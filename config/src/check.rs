use std::fmt::{self, Display};
use std::sync::Arc;

use crate::CatalogConfig;

pub trait CheckConfig {
    fn check(&self, config: &CatalogConfig) -> Option<CheckConfigResult>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfigItemResult {
    pub config: Arc<String>,
    pub item: String,
    pub message: String,
}

impl Display for CheckConfigItemResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.config, self.item, self.message)
    }
}

#[derive(Debug, Default, Clone)]
pub struct CheckConfigResult {
    pub warnings: Vec<CheckConfigItemResult>,
    pub errors: Vec<CheckConfigItemResult>,
}

impl CheckConfigResult {
    pub fn add_warn(&mut self, item: CheckConfigItemResult) {
        self.warnings.push(item);
    }

    pub fn add_error(&mut self, item: CheckConfigItemResult) {
        self.errors.push(item);
    }

    pub fn add_all(&mut self, other: CheckConfigResult) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl Display for CheckConfigResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Config is OK.");
        }
        for e in &self.errors {
            writeln!(f, "Error: {}", e)?;
        }
        for w in &self.warnings {
            writeln!(f, "Warning: {}", w)?;
        }
        Ok(())
    }
}
