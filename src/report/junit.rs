//! JUnit XML summary extraction.
//!
//! Reads the report written by the converter and counts its test cases by
//! outcome. Only element names are inspected, so the counts do not depend
//! on the converter filling in the `tests`/`failures` attributes.
//!
//! ```xml
//! <testsuites>
//!   <testsuite name="widget_test">
//!     <testcase classname="widget_test" name="counter increments"/>
//!     <testcase classname="widget_test" name="shows title">
//!       <failure message="Expected: 'Home'"/>
//!     </testcase>
//!     <testcase classname="widget_test" name="golden"><skipped/></testcase>
//!   </testsuite>
//! </testsuites>
//! ```

use std::path::Path;

use anyhow::Context;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Test counts from a JUnit report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JunitSummary {
    pub tests: usize,
    pub failures: usize,
    pub errors: usize,
    pub skipped: usize,
}

impl JunitSummary {
    /// Test cases without failure, error or skip markers.
    pub fn passed(&self) -> usize {
        self.tests
            .saturating_sub(self.failures + self.errors + self.skipped)
    }

    /// Whether every executed test passed.
    pub fn success(&self) -> bool {
        self.failures == 0 && self.errors == 0
    }
}

/// Parses JUnit XML content into a [`JunitSummary`].
pub fn parse_summary(xml: &str) -> anyhow::Result<JunitSummary> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut summary = JunitSummary::default();
    loop {
        match reader.read_event().context("Invalid JUnit XML")? {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"testcase" => summary.tests += 1,
                b"failure" => summary.failures += 1,
                b"error" => summary.errors += 1,
                b"skipped" => summary.skipped += 1,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(summary)
}

/// Reads and parses the JUnit report at `path`.
pub async fn read_summary(path: &Path) -> anyhow::Result<JunitSummary> {
    let xml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read JUnit report: {}", path.display()))?;
    parse_summary(&xml).with_context(|| format!("Failed to parse JUnit report: {}", path.display()))
}
