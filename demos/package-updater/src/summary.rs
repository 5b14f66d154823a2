//! End-of-batch report.

use std::fmt::Write as _;

/// Renders the `UPDATE SUMMARY` block for a batch of package outcomes.
///
/// Failed packages are followed by their error message.
#[must_use]
pub fn render_summary(results: &[(String, Result<(), String>)]) -> String {
    let rule = "=".repeat(50);
    let mut out = format!("{rule}\nUPDATE SUMMARY\n{rule}\n");
    for (name, outcome) in results {
        // Writing to a String cannot fail.
        let _ = match outcome {
            Ok(()) => writeln!(out, "{name}: SUCCESS"),
            Err(message) => writeln!(out, "{name}: FAILED\n  Error: {message}"),
        };
    }
    out
}
