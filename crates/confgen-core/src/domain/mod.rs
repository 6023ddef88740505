pub mod errors;

pub use errors::{ConfgenError, ConfgenErrorCategory, ConfgenResult};

use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const IDENTIFIER_FILE: &str = "input.smi";
pub const BUILT_STRUCTURE_FILE: &str = "step1.mol";
pub const WORKING_STRUCTURE_FILE: &str = "step2.mol";
pub const CHARGE_FILE: &str = ".CHRG";
pub const SPIN_FILE: &str = ".UHF";
pub const CONFORMER_SET_FILE: &str = "confs.xyz";
pub const REPORT_FILE: &str = "confgen-report.json";

pub const RESCUE_DIR: &str = "rescue";
pub const RESCUE_COORDINATES_FILE: &str = "rescue.xyz";
pub const RESCUE_LOG_FILE: &str = "xtb.log";
pub const RESCUE_CONVERGED_MARKER: &str = ".xtboptok";
pub const RESCUE_OPTIMIZED_FILE: &str = "xtbopt.xyz";

/// What the positional argument turned out to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InputSpecification {
    File(PathBuf),
    Identifier(String),
}

impl InputSpecification {
    /// An existing regular file wins; anything else is taken as a literal
    /// chemical identifier.
    pub fn resolve(raw: &str, working_dir: &Path) -> Self {
        if working_dir.join(raw).is_file() {
            Self::File(PathBuf::from(raw))
        } else {
            Self::Identifier(raw.to_string())
        }
    }

    /// Path handed to the builder, relative to the working directory unless
    /// the user supplied an absolute path.
    pub fn builder_input(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::Identifier(_) => PathBuf::from(IDENTIFIER_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Success,
    ZeroConformers,
    ToolError(String),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl Display for GenerationOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::ZeroConformers => f.write_str("zero conformers"),
            Self::ToolError(detail) => write!(f, "tool error ({detail})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RescueState {
    NotTriggered,
    Attempting,
    Converged,
    Unconverged,
}

impl RescueState {
    pub const fn can_advance_to(self, next: RescueState) -> bool {
        matches!(
            (self, next),
            (Self::NotTriggered, Self::Attempting)
                | (Self::Attempting, Self::Converged)
                | (Self::Attempting, Self::Unconverged)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotTriggered => "not-triggered",
            Self::Attempting => "attempting",
            Self::Converged => "converged",
            Self::Unconverged => "unconverged",
        }
    }
}

impl Display for RescueState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeSource {
    Override,
    Detected,
    Missing,
}

/// Named artifact handles threaded through the stages. Paths are kept
/// relative to `working_dir` so they can be passed to tools verbatim.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    working_dir: PathBuf,
    input: InputSpecification,
    current_structure: PathBuf,
    conformer_set: Option<PathBuf>,
    charge: Option<i32>,
}

impl PipelineContext {
    pub fn new(working_dir: impl Into<PathBuf>, input: InputSpecification) -> Self {
        let current_structure = input.builder_input();
        Self {
            working_dir: working_dir.into(),
            input,
            current_structure,
            conformer_set: None,
            charge: None,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn input(&self) -> &InputSpecification {
        &self.input
    }

    pub fn current_structure(&self) -> &Path {
        &self.current_structure
    }

    pub fn set_current_structure(&mut self, relative_path: impl Into<PathBuf>) {
        self.current_structure = relative_path.into();
    }

    pub fn conformer_set(&self) -> Option<&Path> {
        self.conformer_set.as_deref()
    }

    pub fn set_conformer_set(&mut self, relative_path: impl Into<PathBuf>) {
        self.conformer_set = Some(relative_path.into());
    }

    pub fn charge(&self) -> Option<i32> {
        self.charge
    }

    pub fn set_charge(&mut self, charge: i32) {
        self.charge = Some(charge);
    }

    pub fn resolve(&self, relative_path: impl AsRef<Path>) -> PathBuf {
        self.working_dir.join(relative_path)
    }

    pub fn rescue_dir(&self) -> PathBuf {
        self.working_dir.join(RESCUE_DIR)
    }
}
