use crate::config::RunConfiguration;
use crate::domain::{CONFORMER_SET_FILE, ConfgenResult, PipelineContext};
use crate::tools::{ToolCommand, ToolInvoker};
use std::path::Path;
use tracing::info;

/// Terminal stage: hands whatever conformer set exists to the screening
/// tool. Its output files are the deliverable of the run.
pub fn run_screening(
    context: &PipelineContext,
    config: &RunConfiguration,
    invoker: &ToolInvoker,
) -> ConfgenResult<()> {
    let conformer_set = context
        .conformer_set()
        .unwrap_or(Path::new(CONFORMER_SET_FILE));
    info!(
        "screening {} with '{}'",
        conformer_set.display(),
        config.theory
    );

    invoker.run(
        &ToolCommand::new(&config.tools.screener)
            .arg("--screen")
            .arg(conformer_set)
            .arg(&config.theory),
    )
}
