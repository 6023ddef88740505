use crate::domain::{ConfgenError, ConfgenResult};
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_CONFORMER_COUNT: usize = 10;
pub const DEFAULT_FORCE_FIELD: &str = "uff";
pub const DEFAULT_THEORY: &str = "--gfnff";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolPaths {
    pub builder: String,
    pub optimizer: String,
    pub screener: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            builder: "obabel".to_string(),
            optimizer: "xtb".to_string(),
            screener: "crest".to_string(),
        }
    }
}

/// Fixed for the whole run once the command line has been parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    pub nconfs: usize,
    pub force_field: String,
    pub charge: Option<i32>,
    pub theory: String,
    pub rescue: bool,
    pub tools: ToolPaths,
    pub timeout: Option<Duration>,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            nconfs: DEFAULT_CONFORMER_COUNT,
            force_field: DEFAULT_FORCE_FIELD.to_string(),
            charge: None,
            theory: DEFAULT_THEORY.to_string(),
            rescue: true,
            tools: ToolPaths::default(),
            timeout: None,
        }
    }
}

impl RunConfiguration {
    pub fn validate(&self) -> ConfgenResult<()> {
        if self.nconfs == 0 {
            return Err(ConfgenError::input_validation(
                "INPUT.CONFIG",
                "conformer count must be at least 1",
            ));
        }
        if self.force_field.trim().is_empty() {
            return Err(ConfgenError::input_validation(
                "INPUT.CONFIG",
                "force-field identifier must not be empty",
            ));
        }
        if self.theory.trim().is_empty() {
            return Err(ConfgenError::input_validation(
                "INPUT.CONFIG",
                "level-of-theory flag must not be empty",
            ));
        }

        let tools = [
            ("builder", &self.tools.builder),
            ("optimizer", &self.tools.optimizer),
            ("screener", &self.tools.screener),
        ];
        if let Some((role, _)) = tools.iter().find(|(_, program)| program.trim().is_empty()) {
            return Err(ConfgenError::input_validation(
                "INPUT.CONFIG",
                format!("{role} executable must not be empty"),
            ));
        }

        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConfgenError::input_validation(
                "INPUT.CONFIG",
                "tool timeout must be greater than zero seconds",
            ));
        }

        Ok(())
    }
}
