use crate::artifacts::{require_structure, write_text_artifact};
use crate::config::RunConfiguration;
use crate::domain::{
    BUILT_STRUCTURE_FILE, ConfgenResult, IDENTIFIER_FILE, InputSpecification, PipelineContext,
    WORKING_STRUCTURE_FILE,
};
use crate::tools::{ToolCommand, ToolInvoker};
use tracing::info;

/// Turns the resolved input into the canonical working structure:
/// literal identifier file (if needed), 3D build, force-field minimisation.
pub fn build_structure(
    context: &mut PipelineContext,
    config: &RunConfiguration,
    invoker: &ToolInvoker,
) -> ConfgenResult<()> {
    if let InputSpecification::Identifier(identifier) = context.input() {
        info!("writing literal identifier '{}' to {}", identifier, IDENTIFIER_FILE);
        write_text_artifact(&context.resolve(IDENTIFIER_FILE), identifier)?;
    }

    let source = context.input().builder_input();
    info!("generating 3D structure from {}", source.display());
    invoker.run(
        &ToolCommand::new(&config.tools.builder)
            .arg(&source)
            .args(["-O", BUILT_STRUCTURE_FILE, "--gen3d"]),
    )?;
    require_structure(&context.resolve(BUILT_STRUCTURE_FILE), "3D structure generation")?;
    context.set_current_structure(BUILT_STRUCTURE_FILE);

    info!("minimising structure with force field '{}'", config.force_field);
    invoker.run(
        &ToolCommand::new(&config.tools.builder)
            .arg(BUILT_STRUCTURE_FILE)
            .args(["-O", WORKING_STRUCTURE_FILE, "--minimize", "--ff"])
            .arg(&config.force_field),
    )?;
    require_structure(
        &context.resolve(WORKING_STRUCTURE_FILE),
        "force-field minimisation",
    )?;
    context.set_current_structure(WORKING_STRUCTURE_FILE);

    Ok(())
}
