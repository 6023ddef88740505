pub mod charge;
pub mod generation;
pub mod rescue;
pub mod screening;
pub mod structure;

pub use charge::{extract_charge, parse_charge_line, scan_charge};
pub use generation::{
    GenerationClassifier, ZERO_CONFORMER_MARKER, classify_generation_output, fail_on_tool_error,
    run_generation,
};
pub use rescue::{RescueReport, run_rescue, should_rescue};
pub use screening::run_screening;
pub use structure::build_structure;
