use crate::artifacts::{count_xyz_frames_in_file, write_text_artifact};
use crate::config::RunConfiguration;
use crate::domain::{
    CONFORMER_SET_FILE, ChargeSource, ConfgenError, ConfgenResult, GenerationOutcome,
    InputSpecification, PipelineContext, REPORT_FILE,
};
use crate::stages::{
    RescueReport, build_structure, extract_charge, fail_on_tool_error, run_generation,
    run_rescue, run_screening, should_rescue,
};
use crate::tools::ToolInvoker;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub input: InputSpecification,
    pub charge: Option<i32>,
    pub charge_source: ChargeSource,
    pub generation: GenerationOutcome,
    pub rescue: RescueReport,
    pub conformer_set: PathBuf,
    pub conformer_count: Option<usize>,
    pub theory: String,
}

/// Runs build, charge extraction, conformer search, optional rescue and
/// screening in `working_dir`, then records the run in `confgen-report.json`.
pub fn run_pipeline(
    config: &RunConfiguration,
    working_dir: &Path,
    raw_input: &str,
) -> ConfgenResult<PipelineReport> {
    config.validate()?;
    if raw_input.trim().is_empty() {
        return Err(ConfgenError::input_validation(
            "INPUT.EMPTY",
            "input must name a structure file or a chemical identifier",
        ));
    }

    let input = InputSpecification::resolve(raw_input, working_dir);
    match &input {
        InputSpecification::File(path) => info!("using input file {}", path.display()),
        InputSpecification::Identifier(identifier) => {
            info!("treating '{}' as a chemical identifier", identifier)
        }
    }

    let invoker = ToolInvoker::new(working_dir, config.timeout);
    let mut context = PipelineContext::new(working_dir, input);

    build_structure(&mut context, config, &invoker)?;
    let charge_source = extract_charge(&mut context, config, &invoker)?;

    let generation = fail_on_tool_error(run_generation(&mut context, config, &invoker)?)?;
    let rescue = if should_rescue(&generation, config.rescue) {
        run_rescue(&mut context, config, &invoker)?
    } else {
        if !generation.is_success() {
            warn!("rescue disabled; screening whatever the conformer search produced");
        }
        RescueReport::not_triggered()
    };

    run_screening(&context, config, &invoker)?;

    let conformer_set = context
        .conformer_set()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFORMER_SET_FILE));
    let conformer_count = count_xyz_frames_in_file(&context.resolve(&conformer_set));
    let report = PipelineReport {
        input: context.input().clone(),
        charge: context.charge(),
        charge_source,
        generation,
        rescue,
        conformer_set,
        conformer_count,
        theory: config.theory.clone(),
    };
    write_report(&context.resolve(REPORT_FILE), &report)?;
    info!("run complete; report written to {}", REPORT_FILE);
    Ok(report)
}

pub fn write_report(path: &Path, report: &PipelineReport) -> ConfgenResult<()> {
    let rendered = serde_json::to_string_pretty(report).map_err(|source| {
        ConfgenError::internal(
            "SYS.REPORT_SERIALIZE",
            format!("failed to serialize run report: {}", source),
        )
    })?;
    write_text_artifact(path, &format!("{rendered}\n"))
}
