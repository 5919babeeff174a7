/// Operator prompts: the single go/no-go gate before a run, and the optional
/// per-combination pause for manual power/swap setup.
use crate::plan::RunCombination;
use std::io::{BufRead, Write};

/// Ask a yes/no question. Only `y` or `yes` (any case) proceeds; EOF cancels.
pub fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> std::io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(output)?;
        return Ok(false);
    }
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Ask the operator to apply a combination's power mode and swap setting.
///
/// Enter proceeds. `q` or EOF stops the run.
pub fn wait_for_setup<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    combination: &RunCombination,
) -> std::io::Result<bool> {
    writeln!(
        output,
        "--> Set power mode to '{}' and swap to '{}' for {}.",
        combination.power_mode, combination.swap, combination.model
    )?;
    write!(output, "    Press Enter to start, or 'q' to stop the run: ")?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(output)?;
        return Ok(false);
    }
    Ok(!answer.trim().eq_ignore_ascii_case("q"))
}
