//! Score reduction over test results.

use tracing::warn;

use crate::executor::TestResult;

/// Reduces a sequence of judgments to a fraction in `[0, 1]`.
///
/// An empty result set scores `0.0` rather than propagating NaN: a silent
/// NaN would poison the batch mean downstream, and a hard error would
/// escalate a corpus-quality problem into a batch abort. The boundary is
/// logged so the operator can spot spec files that parse to nothing.
pub fn score(results: &[TestResult]) -> f64 {
    if results.is_empty() {
        warn!("Scoring an empty result set; returning 0");
        return 0.0;
    }

    let passed = results.iter().filter(|r| r.passed).count();
    passed as f64 / results.len() as f64
}
