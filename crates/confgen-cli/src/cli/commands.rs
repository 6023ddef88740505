use super::CliError;
use anyhow::Context;
use confgen_core::config::{
    DEFAULT_CONFORMER_COUNT, DEFAULT_FORCE_FIELD, DEFAULT_THEORY, RunConfiguration, ToolPaths,
};
use confgen_core::run_pipeline;
use std::time::Duration;
use tracing::debug;

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Input structure file, or a literal chemical identifier such as a SMILES string
    #[arg(value_name = "INPUT")]
    input: String,

    /// Number of conformers requested from the force-field search
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CONFORMER_COUNT)]
    nconfs: usize,

    /// Force field used for minimisation and conformer search
    #[arg(long, value_name = "FF", default_value = DEFAULT_FORCE_FIELD)]
    ff: String,

    /// Net molecular charge; skips charge detection when given
    #[arg(long, value_name = "C", allow_negative_numbers = true)]
    chrg: Option<i32>,

    /// Level-of-theory flag passed verbatim to the screening tool
    #[arg(long, value_name = "NAME", default_value = DEFAULT_THEORY, allow_hyphen_values = true)]
    theory: String,

    /// Attempt a quantum-chemistry rescue when the conformer search finds nothing (default)
    #[arg(long, overrides_with = "no_rescue")]
    rescue: bool,

    /// Skip the rescue and screen whatever the conformer search produced
    #[arg(long = "norescue", overrides_with = "rescue")]
    no_rescue: bool,

    /// Kill any external tool still running after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Structure builder executable
    #[arg(long, value_name = "PATH", env = "CONFGEN_OBABEL", default_value = "obabel")]
    obabel: String,

    /// Quantum-chemistry optimiser executable
    #[arg(long, value_name = "PATH", env = "CONFGEN_XTB", default_value = "xtb")]
    xtb: String,

    /// Conformer screening executable
    #[arg(long, value_name = "PATH", env = "CONFGEN_CREST", default_value = "crest")]
    crest: String,
}

impl RunArgs {
    fn into_config(self) -> (RunConfiguration, String) {
        let config = RunConfiguration {
            nconfs: self.nconfs,
            force_field: self.ff,
            charge: self.chrg,
            theory: self.theory,
            rescue: self.rescue || !self.no_rescue,
            tools: ToolPaths {
                builder: self.obabel,
                optimizer: self.xtb,
                screener: self.crest,
            },
            timeout: self.timeout.map(Duration::from_secs),
        };
        (config, self.input)
    }
}

pub(super) fn run_pipeline_command(args: RunArgs) -> Result<i32, CliError> {
    let (config, input) = args.into_config();
    let working_dir =
        std::env::current_dir().context("failed to read current working directory")?;
    debug!(dir = %working_dir.display(), "running pipeline for '{}'", input);

    let report = run_pipeline(&config, &working_dir, &input).map_err(CliError::Compute)?;

    match report.conformer_count {
        Some(count) => println!(
            "Conformer set: {} ({} conformers)",
            report.conformer_set.display(),
            count
        ),
        None => println!("Conformer set: {}", report.conformer_set.display()),
    }
    println!("Rescue: {}", report.rescue.state);
    println!("Screened with: {}", report.theory);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::RunArgs;
    use clap::Parser;
    use std::time::Duration;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    fn parse(args: &[&str]) -> Result<RunArgs, clap::Error> {
        Harness::try_parse_from(std::iter::once("confgen").chain(args.iter().copied()))
            .map(|harness| harness.run)
    }

    #[test]
    fn defaults_match_the_documented_flags() {
        let (config, input) = parse(&["CCO"]).expect("parse should succeed").into_config();
        assert_eq!(input, "CCO");
        assert_eq!(config.nconfs, 10);
        assert_eq!(config.force_field, "uff");
        assert_eq!(config.charge, None);
        assert_eq!(config.theory, "--gfnff");
        assert!(config.rescue);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn negative_charge_and_hyphenated_theory_are_accepted() {
        let (config, _) = parse(&["--chrg", "-1", "--theory", "--gfn2", "CC(=O)[O-]"])
            .expect("parse should succeed")
            .into_config();
        assert_eq!(config.charge, Some(-1));
        assert_eq!(config.theory, "--gfn2");
    }

    #[test]
    fn last_rescue_flag_wins() {
        let (config, _) = parse(&["--rescue", "--norescue", "CCO"])
            .expect("parse should succeed")
            .into_config();
        assert!(!config.rescue);

        let (config, _) = parse(&["--norescue", "--rescue", "CCO"])
            .expect("parse should succeed")
            .into_config();
        assert!(config.rescue);
    }

    #[test]
    fn search_and_tool_flags_are_forwarded() {
        let (config, _) = parse(&[
            "--nconfs",
            "50",
            "--ff",
            "mmff94",
            "--timeout",
            "30",
            "--obabel",
            "/opt/ob/bin/obabel",
            "--xtb",
            "/opt/xtb/bin/xtb",
            "--crest",
            "/opt/crest/crest",
            "ligand.sdf",
        ])
        .expect("parse should succeed")
        .into_config();
        assert_eq!(config.nconfs, 50);
        assert_eq!(config.force_field, "mmff94");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.tools.builder, "/opt/ob/bin/obabel");
        assert_eq!(config.tools.optimizer, "/opt/xtb/bin/xtb");
        assert_eq!(config.tools.screener, "/opt/crest/crest");
    }

    #[test]
    fn non_numeric_conformer_count_is_rejected() {
        assert!(parse(&["--nconfs", "many", "CCO"]).is_err());
    }
}
