use crate::domain::GenerationOutcome;

/// Printed by the conformer search when it starts from an empty conformer
/// pool, which is its only way of reporting failure.
pub const ZERO_CONFORMER_MARKER: &str = "Initial conformer count: 0";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationClassifier {
    zero_conformers: bool,
}

impl GenerationClassifier {
    pub fn observe(&mut self, line: &str) {
        if line.contains(ZERO_CONFORMER_MARKER) {
            self.zero_conformers = true;
        }
    }

    /// `exit` is `Err(detail)` when the tool closed abnormally; that outcome
    /// takes precedence over anything seen in the output.
    pub fn finish(self, exit: Result<(), String>) -> GenerationOutcome {
        match exit {
            Err(detail) => GenerationOutcome::ToolError(detail),
            Ok(()) if self.zero_conformers => GenerationOutcome::ZeroConformers,
            Ok(()) => GenerationOutcome::Success,
        }
    }
}

pub fn classify_generation_output<I, S>(lines: I, exit: Result<(), String>) -> GenerationOutcome
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut classifier = GenerationClassifier::default();
    for line in lines {
        classifier.observe(line.as_ref());
    }
    classifier.finish(exit)
}
