use regex::Regex;
use std::sync::LazyLock;

// Charge/multiplicity line of a Gaussian input deck, e.g. "0  1" or "-1 2".
static CHARGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?\d+)\s+(\d+)").expect("charge line pattern is valid")
});

fn charge_token(line: &str) -> Option<&str> {
    CHARGE_LINE
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|token| token.as_str())
}

/// Net charge from a single line, if the line has the charge/multiplicity
/// shape and the charge fits an `i32`.
pub fn parse_charge_line(line: &str) -> Option<i32> {
    charge_token(line)?.parse().ok()
}

/// The first line with the charge/multiplicity shape decides; everything
/// after it is ignored, even when its charge does not parse.
pub fn scan_charge<I, S>(lines: I) -> Option<i32>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let token = lines
        .into_iter()
        .find_map(|line| charge_token(line.as_ref()).map(str::to_string))?;
    token.parse().ok()
}
