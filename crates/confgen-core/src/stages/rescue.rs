use super::generation::{fail_on_tool_error, run_generation};
use crate::artifacts::{copy_artifact, copy_if_present, require_structure};
use crate::config::RunConfiguration;
use crate::domain::{
    CHARGE_FILE, CONFORMER_SET_FILE, ConfgenError, ConfgenResult, GenerationOutcome,
    PipelineContext, RESCUE_CONVERGED_MARKER, RESCUE_COORDINATES_FILE, RESCUE_DIR,
    RESCUE_LOG_FILE, RESCUE_OPTIMIZED_FILE, RescueState, SPIN_FILE, WORKING_STRUCTURE_FILE,
};
use crate::tools::{ToolCommand, ToolInvoker, describe_status};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RescueReport {
    pub state: RescueState,
    pub second_generation: Option<GenerationOutcome>,
    pub fallback_used: bool,
}

impl RescueReport {
    pub fn not_triggered() -> Self {
        Self {
            state: RescueState::NotTriggered,
            second_generation: None,
            fallback_used: false,
        }
    }
}

pub fn should_rescue(outcome: &GenerationOutcome, enabled: bool) -> bool {
    enabled && matches!(outcome, GenerationOutcome::ZeroConformers)
}

/// One rescue attempt after a zero-conformer search: strip bonding, let the
/// quantum-chemistry optimiser repair the geometry, rebuild the working
/// structure and search again. A second failure falls back to the optimised
/// geometry as the only conformer. Non-convergence is fatal.
pub fn run_rescue(
    context: &mut PipelineContext,
    config: &RunConfiguration,
    invoker: &ToolInvoker,
) -> ConfgenResult<RescueReport> {
    let mut state = RescueState::NotTriggered;
    let workspace = context.rescue_dir();

    advance(&mut state, RescueState::Attempting)?;
    info!("rescue: preparing workspace {}", workspace.display());
    prepare_workspace(context, config, invoker, &workspace)?;

    info!("rescue: optimising geometry without bonding constraints");
    let status = invoker.run_logged(
        &ToolCommand::new(&config.tools.optimizer)
            .arg(RESCUE_COORDINATES_FILE)
            .arg("--opt")
            .current_dir(&workspace),
        &workspace.join(RESCUE_LOG_FILE),
    )?;
    if !status.success() {
        warn!(
            "rescue: optimiser exited with {}; see {}",
            describe_status(status),
            workspace.join(RESCUE_LOG_FILE).display()
        );
    }

    if !workspace.join(RESCUE_CONVERGED_MARKER).is_file() {
        advance(&mut state, RescueState::Unconverged)?;
        return Err(ConfgenError::computation(
            "RUN.RESCUE_UNCONVERGED",
            format!(
                "rescue optimisation did not converge (no '{}' in '{}')",
                RESCUE_CONVERGED_MARKER,
                workspace.display()
            ),
        ));
    }
    advance(&mut state, RescueState::Converged)?;

    let optimized = rescue_path(RESCUE_OPTIMIZED_FILE);
    info!("rescue: regenerating {} from optimised geometry", WORKING_STRUCTURE_FILE);
    invoker.run(
        &ToolCommand::new(&config.tools.builder)
            .arg(&optimized)
            .args(["-O", WORKING_STRUCTURE_FILE]),
    )?;
    require_structure(
        &context.resolve(WORKING_STRUCTURE_FILE),
        "structure regeneration after rescue",
    )?;
    context.set_current_structure(WORKING_STRUCTURE_FILE);

    let second = fail_on_tool_error(run_generation(context, config, invoker)?)?;
    let fallback_used = !second.is_success();
    if fallback_used {
        warn!(
            "rescue: conformer search failed again; using the optimised geometry as the only conformer"
        );
        copy_artifact(
            &context.resolve(&optimized),
            &context.resolve(CONFORMER_SET_FILE),
        )?;
        context.set_conformer_set(CONFORMER_SET_FILE);
    }

    Ok(RescueReport {
        state,
        second_generation: Some(second),
        fallback_used,
    })
}

fn prepare_workspace(
    context: &PipelineContext,
    config: &RunConfiguration,
    invoker: &ToolInvoker,
    workspace: &Path,
) -> ConfgenResult<()> {
    fs::create_dir(workspace).map_err(|source| {
        ConfgenError::io_system(
            "IO.RESCUE_WORKSPACE",
            format!(
                "failed to create rescue workspace '{}': {}",
                workspace.display(),
                source
            ),
        )
    })?;

    let coordinates = rescue_path(RESCUE_COORDINATES_FILE);
    invoker.run(
        &ToolCommand::new(&config.tools.builder)
            .arg(context.current_structure())
            .arg("-O")
            .arg(&coordinates),
    )?;
    require_structure(&context.resolve(&coordinates), "bond-free conversion")?;

    for side_channel in [CHARGE_FILE, SPIN_FILE] {
        copy_if_present(
            &context.resolve(side_channel),
            &workspace.join(side_channel),
        )?;
    }
    Ok(())
}

fn rescue_path(name: &str) -> PathBuf {
    Path::new(RESCUE_DIR).join(name)
}

fn advance(state: &mut RescueState, next: RescueState) -> ConfgenResult<()> {
    if !state.can_advance_to(next) {
        return Err(ConfgenError::internal(
            "SYS.RESCUE_STATE",
            format!("illegal rescue transition {} -> {}", state, next),
        ));
    }
    info!("rescue: {} -> {}", state, next);
    *state = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{RescueReport, advance, should_rescue};
    use crate::domain::{GenerationOutcome, RescueState};

    #[test]
    fn rescue_triggers_only_on_zero_conformers_when_enabled() {
        assert!(should_rescue(&GenerationOutcome::ZeroConformers, true));
        assert!(!should_rescue(&GenerationOutcome::ZeroConformers, false));
        assert!(!should_rescue(&GenerationOutcome::Success, true));
        assert!(!should_rescue(&GenerationOutcome::Success, false));
        assert!(!should_rescue(
            &GenerationOutcome::ToolError("exit code 1".to_string()),
            true
        ));
    }

    #[test]
    fn advance_rejects_backward_transitions() {
        let mut state = RescueState::NotTriggered;
        advance(&mut state, RescueState::Attempting).expect("forward move");
        advance(&mut state, RescueState::Converged).expect("forward move");

        let error = advance(&mut state, RescueState::Attempting).expect_err("no retry");
        assert_eq!(error.code(), "SYS.RESCUE_STATE");
        assert_eq!(state, RescueState::Converged);
    }

    #[test]
    fn untriggered_report_is_empty() {
        let report = RescueReport::not_triggered();
        assert_eq!(report.state, RescueState::NotTriggered);
        assert!(report.second_generation.is_none());
        assert!(!report.fallback_used);
    }

    #[cfg(unix)]
    mod process {
        use super::super::run_rescue;
        use crate::config::RunConfiguration;
        use crate::domain::{InputSpecification, PipelineContext};
        use crate::tools::ToolInvoker;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;
        use tempfile::TempDir;

        fn stub(dir: &Path, name: &str, body: &str) -> String {
            let path = dir.join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("stub written");
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("stub mode");
            path.to_string_lossy().into_owned()
        }

        #[test]
        fn existing_workspace_is_fatal_and_left_untouched() {
            let temp = TempDir::new().expect("tempdir should be created");
            fs::create_dir(temp.path().join("rescue")).expect("stale workspace");
            fs::write(temp.path().join("rescue/keep.txt"), "old").expect("stale file");

            let mut config = RunConfiguration::default();
            config.tools.builder = stub(temp.path(), "fake-obabel", "touch builder-called");
            let invoker = ToolInvoker::new(temp.path(), None);
            let mut context = PipelineContext::new(
                temp.path(),
                InputSpecification::Identifier("CCO".to_string()),
            );

            let error = run_rescue(&mut context, &config, &invoker)
                .expect_err("pre-existing workspace must fail");
            assert_eq!(error.code(), "IO.RESCUE_WORKSPACE");
            assert!(!temp.path().join("builder-called").exists());
            assert_eq!(
                fs::read_to_string(temp.path().join("rescue/keep.txt")).expect("kept"),
                "old"
            );
        }

        #[test]
        fn charge_and_spin_are_copied_and_optimiser_runs_inside_workspace() {
            let temp = TempDir::new().expect("tempdir should be created");
            fs::write(temp.path().join("step2.mol"), "mol").expect("structure");
            fs::write(temp.path().join(".CHRG"), "1").expect("charge");
            fs::write(temp.path().join(".UHF"), "2").expect("spin");

            let mut config = RunConfiguration::default();
            config.tools.builder = stub(
                temp.path(),
                "fake-obabel",
                r#"out=""; prev=""
for a in "$@"; do [ "$prev" = "-O" ] && out="$a"; prev="$a"; done
[ -n "$out" ] && echo converted > "$out""#,
            );
            // Never converges: no .xtboptok is written.
            config.tools.optimizer = stub(
                temp.path(),
                "fake-xtb",
                "cat .CHRG .UHF > seen.txt; echo 'optimisation failed'",
            );
            let invoker = ToolInvoker::new(temp.path(), None);
            let mut context = PipelineContext::new(
                temp.path(),
                InputSpecification::Identifier("CCO".to_string()),
            );
            context.set_current_structure("step2.mol");

            let error = run_rescue(&mut context, &config, &invoker)
                .expect_err("missing marker must be fatal");
            assert_eq!(error.code(), "RUN.RESCUE_UNCONVERGED");

            let rescue = temp.path().join("rescue");
            assert!(rescue.join("rescue.xyz").is_file());
            assert_eq!(
                fs::read_to_string(rescue.join("seen.txt")).expect("side channels seen"),
                "12"
            );
            let log = fs::read_to_string(rescue.join("xtb.log")).expect("log captured");
            assert!(log.contains("optimisation failed"));
            assert_eq!(
                fs::read_to_string(temp.path().join("step2.mol")).expect("structure kept"),
                "mol"
            );
        }
    }
}
