use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ConfgenResult<T> = Result<T, ConfgenError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfgenErrorCategory {
    InputValidation,
    IoSystem,
    Computation,
    Internal,
}

impl ConfgenErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidation => 2,
            Self::IoSystem => 3,
            Self::Computation => 4,
            Self::Internal => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidation => "InputValidationError",
            Self::IoSystem => "IoSystemError",
            Self::Computation => "ComputationError",
            Self::Internal => "InternalError",
        }
    }
}

/// Fatal pipeline error carrying a stable dotted code (`IO.TOOL_SPAWN`,
/// `RUN.RESCUE_UNCONVERGED`, ...) next to the human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfgenError {
    category: ConfgenErrorCategory,
    code: &'static str,
    message: String,
}

impl ConfgenError {
    pub fn new(
        category: ConfgenErrorCategory,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn input_validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ConfgenErrorCategory::InputValidation, code, message)
    }

    pub fn io_system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ConfgenErrorCategory::IoSystem, code, message)
    }

    pub fn computation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ConfgenErrorCategory::Computation, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ConfgenErrorCategory::Internal, code, message)
    }

    pub const fn category(&self) -> ConfgenErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.code, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for ConfgenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.code,
            self.message
        )
    }
}

impl Error for ConfgenError {}
