//! Console reporting of the converted test results.

pub mod junit;

pub use junit::{JunitSummary, parse_summary, read_summary};

/// Prints a summary of the JUnit report to the console.
pub fn print_summary(summary: &JunitSummary) {
    println!();
    println!("Test Results:");
    println!("  Total:   {}", summary.tests);
    println!("  Passed:  {}", console::style(summary.passed()).green());
    println!("  Failed:  {}", console::style(summary.failures).red());
    if summary.errors > 0 {
        println!("  Errors:  {}", console::style(summary.errors).red().bold());
    }
    println!("  Skipped: {}", console::style(summary.skipped).yellow());

    println!();
    if summary.tests == 0 {
        println!("{}", console::style("No test results were collected.").red().bold());
    } else if summary.success() {
        println!("{}", console::style("All tests passed!").green().bold());
    } else {
        println!("{}", console::style("Some tests failed.").red().bold());
    }
}
