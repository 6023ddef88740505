mod parser;

pub use parser::{parse_charge_line, scan_charge};

use crate::artifacts::write_text_artifact;
use crate::config::RunConfiguration;
use crate::domain::{CHARGE_FILE, ChargeSource, ConfgenResult, PipelineContext};
use crate::tools::{ToolCommand, ToolInvoker, ensure_success};
use tracing::{info, warn};

/// Persists the net charge to the `.CHRG` side channel read by the
/// quantum-chemistry tools.
///
/// An override is written as-is. Otherwise the builder renders the current
/// structure as a Gaussian input deck and the first charge/multiplicity
/// line supplies the charge. When nothing matches, no file is written and
/// the downstream tools fall back to their own default.
pub fn extract_charge(
    context: &mut PipelineContext,
    config: &RunConfiguration,
    invoker: &ToolInvoker,
) -> ConfgenResult<ChargeSource> {
    if let Some(charge) = config.charge {
        info!("using manual charge override {}", charge);
        persist_charge(context, charge)?;
        return Ok(ChargeSource::Override);
    }

    let command = ToolCommand::new(&config.tools.builder)
        .arg(context.current_structure())
        .arg("-ogjf");
    let mut stream = invoker.stream(&command)?;

    let lines = stream.by_ref().collect::<ConfgenResult<Vec<_>>>()?;
    let status = stream.finish()?;
    ensure_success(&command, status)?;

    match scan_charge(&lines) {
        Some(charge) => {
            info!("detected net charge {}", charge);
            persist_charge(context, charge)?;
            Ok(ChargeSource::Detected)
        }
        None => {
            warn!(
                "no usable charge/multiplicity line in builder output; {} not written",
                CHARGE_FILE
            );
            Ok(ChargeSource::Missing)
        }
    }
}

fn persist_charge(context: &mut PipelineContext, charge: i32) -> ConfgenResult<()> {
    write_text_artifact(&context.resolve(CHARGE_FILE), &charge.to_string())?;
    context.set_charge(charge);
    Ok(())
}
