mod classifier;

pub use classifier::{GenerationClassifier, ZERO_CONFORMER_MARKER, classify_generation_output};

use crate::config::RunConfiguration;
use crate::domain::{
    CONFORMER_SET_FILE, ConfgenError, ConfgenResult, GenerationOutcome, PipelineContext,
};
use crate::tools::{ToolCommand, ToolInvoker, describe_status};
use tracing::{info, warn};

/// Runs the force-field conformer search on the current structure and
/// classifies the run. The output is always drained to the end, even after
/// the zero-conformer marker has been seen.
pub fn run_generation(
    context: &mut PipelineContext,
    config: &RunConfiguration,
    invoker: &ToolInvoker,
) -> ConfgenResult<GenerationOutcome> {
    info!(
        "searching {} conformers of {} with force field '{}'",
        config.nconfs,
        context.current_structure().display(),
        config.force_field
    );

    let command = ToolCommand::new(&config.tools.builder)
        .arg(context.current_structure())
        .args(["-O", CONFORMER_SET_FILE, "--conformer", "--nconf"])
        .arg(config.nconfs.to_string())
        .arg("--ff")
        .arg(&config.force_field)
        .arg("--writeconformers");
    let mut stream = invoker.stream(&command)?;

    let mut classifier = GenerationClassifier::default();
    for line in stream.by_ref() {
        classifier.observe(&line?);
    }
    let status = stream.finish()?;
    let exit = if status.success() {
        Ok(())
    } else {
        Err(describe_status(status))
    };

    context.set_conformer_set(CONFORMER_SET_FILE);
    let outcome = classifier.finish(exit);
    match &outcome {
        GenerationOutcome::Success => info!("conformer search finished"),
        GenerationOutcome::ZeroConformers => warn!("conformer search reported zero conformers"),
        GenerationOutcome::ToolError(detail) => warn!("conformer search failed: {}", detail),
    }
    Ok(outcome)
}

/// Abnormal termination of the conformer search ends the run; it is never
/// retried.
pub fn fail_on_tool_error(outcome: GenerationOutcome) -> ConfgenResult<GenerationOutcome> {
    match outcome {
        GenerationOutcome::ToolError(detail) => Err(ConfgenError::computation(
            "RUN.GENERATION_EXIT",
            format!("conformer search terminated abnormally with {}", detail),
        )),
        other => Ok(other),
    }
}
