// SPDX-License-Identifier: Apache-2.0

//! AiZynthFinder log to CSV. Each `Done with <smiles> in <time>` line
//! becomes one row; lines mentioning `not solved` are marked unsolved.
//! A completion line with nothing between `Done with` and `in` still
//! produces a row, with an empty SMILES cell.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

pub const CONVERTED_LOG_HEADER: &str = "SMILES,Solved_with_AiZynthFinder";

const DONE_PREFIX: &str = "Done with ";
const TIME_SEPARATOR: &str = " in ";
const NOT_SOLVED: &str = "not solved";

#[derive(Debug)]
pub struct ConvertError(pub String);

impl Display for ConvertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConvertError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteOutcome {
    pub smiles: String,
    pub solved: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConvertSummary {
    pub parsed: usize,
    pub empty_smiles: usize,
}

/// `None` for lines that do not report a finished target. The time suffix is
/// optional; without ` in ` the rest of the line is the SMILES.
#[must_use]
pub fn parse_completion_line(line: &str) -> Option<RouteOutcome> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix(DONE_PREFIX)?;
    let smiles = rest
        .split_once(TIME_SEPARATOR)
        .map_or(rest, |(head, _)| head)
        .trim();
    Some(RouteOutcome {
        smiles: smiles.to_string(),
        solved: !trimmed.contains(NOT_SOLVED),
    })
}

pub fn convert_log<R: BufRead, W: Write>(
    reader: R,
    mut writer: W,
) -> Result<ConvertSummary, ConvertError> {
    let io = |e: std::io::Error| ConvertError(e.to_string());
    writeln!(writer, "{CONVERTED_LOG_HEADER}").map_err(io)?;
    let mut summary = ConvertSummary::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(io)?;
        let Some(outcome) = parse_completion_line(&line) else {
            continue;
        };
        if outcome.smiles.is_empty() {
            debug!(line = idx + 1, "completion line without a SMILES");
            summary.empty_smiles += 1;
        }
        let solved = if outcome.solved { "True" } else { "False" };
        writeln!(writer, "{},{solved}", csv_field(&outcome.smiles)).map_err(io)?;
        summary.parsed += 1;
    }
    writer.flush().map_err(io)?;
    Ok(summary)
}

pub fn convert_log_file(input: &Path, output: &Path) -> Result<ConvertSummary, ConvertError> {
    let reader = File::open(input)
        .map(BufReader::new)
        .map_err(|e| ConvertError(format!("cannot open {}: {e}", input.display())))?;
    let writer = File::create(output)
        .map(BufWriter::new)
        .map_err(|e| ConvertError(format!("cannot create {}: {e}", output.display())))?;
    let summary = convert_log(reader, writer)?;
    info!(
        parsed = summary.parsed,
        empty_smiles = summary.empty_smiles,
        output = %output.display(),
        "log converted"
    );
    Ok(summary)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solved_and_unsolved_lines() {
        let solved = parse_completion_line("Done with CCO in 12.5 s").expect("completion");
        assert_eq!(solved.smiles, "CCO");
        assert!(solved.solved);
        let unsolved =
            parse_completion_line("  Done with c1ccccc1 in 3.1 s (not solved)").expect("completion");
        assert_eq!(unsolved.smiles, "c1ccccc1");
        assert!(!unsolved.solved);
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        assert_eq!(parse_completion_line("Loading expansion policy"), None);
        assert_eq!(
            parse_completion_line("Done with CCN").map(|o| o.smiles),
            Some("CCN".to_string())
        );
    }

    #[test]
    fn empty_smiles_still_yields_a_row() {
        let outcome = parse_completion_line("Done with  in 3 s").expect("completion");
        assert_eq!(outcome.smiles, "");
        assert!(outcome.solved);

        let mut out = Vec::new();
        let summary = convert_log(
            "Done with CCO in 1 s\nDone with  in 3 s (not solved)\n".as_bytes(),
            &mut out,
        )
        .expect("convert");
        assert_eq!(
            summary,
            ConvertSummary {
                parsed: 2,
                empty_smiles: 1
            }
        );
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "SMILES,Solved_with_AiZynthFinder\nCCO,True\n,False\n"
        );
    }

    #[test]
    fn commas_are_quoted() {
        assert_eq!(csv_field("CC"), "CC");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("a\"b"), "\"a\"\"b\"");
    }
}
