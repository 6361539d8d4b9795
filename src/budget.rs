//! Size budget enforcement
//!
//! Every component's solver conjunction must fit the configured character
//! budget. A component over budget is rejected on its own; the rest of its
//! instruction still proceeds.

use tracing::debug;

use crate::config::GeneratorConfig;
use crate::contract::Component;
use crate::error::ExpressionTooLong;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBudget {
    limit: usize,
}

impl SizeBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(config.max_expr_chars)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Accepts a component iff its rendered conjunction is within the limit
    pub fn check(&self, component: &Component) -> Result<usize, ExpressionTooLong> {
        let actual_length = component.contract.expression_length();
        if actual_length > self.limit {
            debug!(
                component = component.name(),
                actual_length,
                limit = self.limit,
                "component over budget"
            );
            return Err(ExpressionTooLong {
                name: component.name().to_string(),
                actual_length,
                limit: self.limit,
            });
        }
        Ok(actual_length)
    }
}

impl Default for SizeBudget {
    fn default() -> Self {
        Self::from_config(&GeneratorConfig::default())
    }
}
