//! Execution adapter: runs candidate code against test cases via the
//! external interpreter.
//!
//! Each test case runs in total isolation: its own temp artifact and its
//! own subprocess, so a crash in one case cannot corrupt another case's
//! evaluation. Temp artifacts are removed on every exit path through a
//! scoped guard whose cleanup never propagates its own errors.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::testspec::TestCase;

/// Configuration for the execution adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Interpreter binary invoked as `<interpreter> <path-to-program>`.
    pub interpreter: String,
    /// Shared working directory for temp program artifacts.
    pub workdir: PathBuf,
    /// File extension for staged programs.
    pub file_extension: String,
    /// Invocation statement appended to the candidate code. `{name}` and
    /// `{args}` are substituted with the entry point and rendered args.
    pub call_template: String,
    /// Hard timeout for a single interpreter invocation.
    pub timeout: Duration,
}

impl ExecutorConfig {
    /// Creates a configuration for the given interpreter with defaults.
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            workdir: std::env::temp_dir(),
            file_extension: "py".to_string(),
            call_template: "print({name}({args}))".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the working directory for temp artifacts.
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// Sets the staged-program file extension.
    pub fn with_file_extension(mut self, ext: impl Into<String>) -> Self {
        self.file_extension = ext.into();
        self
    }

    /// Sets the invocation statement template.
    pub fn with_call_template(mut self, template: impl Into<String>) -> Self {
        self.call_template = template.into();
        self
    }

    /// Sets the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new("python3")
    }
}

/// Outcome of one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// Whether normalized stdout matched the expected text.
    pub passed: bool,
    /// Original input expression text.
    pub input: String,
    /// Expected output text.
    pub expected: String,
    /// Captured actual output, or an `ERROR:`-prefixed marker when the
    /// interpreter produced diagnostics instead of a value.
    pub actual: String,
}

impl TestResult {
    fn pass(case: &TestCase, actual: String) -> Self {
        Self {
            passed: true,
            input: case.input.clone(),
            expected: case.expected.clone(),
            actual,
        }
    }

    fn fail(case: &TestCase, actual: String) -> Self {
        Self {
            passed: false,
            input: case.input.clone(),
            expected: case.expected.clone(),
            actual,
        }
    }
}

/// Scoped temp-program artifact. Removal runs on drop and never
/// propagates errors; a leaked artifact is only logged.
struct TempProgram {
    path: PathBuf,
}

impl TempProgram {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempProgram {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove temp program");
        }
    }
}

/// Matches terminal color-escape sequences in interpreter output.
fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid ansi regex"))
}

/// Runs one generated program per test case and judges pass/fail.
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    /// Creates a new executor with the given configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Runs `code` against every test case, one result per case in input
    /// order.
    pub async fn run(&self, entry_point: &str, code: &str, cases: &[TestCase]) -> Vec<TestResult> {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            results.push(self.run_case(entry_point, code, case).await);
        }
        results
    }

    /// Runs a single test case in isolation.
    async fn run_case(&self, entry_point: &str, code: &str, case: &TestCase) -> TestResult {
        let program = self.compose_program(entry_point, code, case);

        let artifact = match self.stage(&program).await {
            Ok(artifact) => artifact,
            Err(e) => {
                return TestResult::fail(case, format!("ERROR: failed to stage program: {}", e))
            }
        };

        let output = tokio::process::Command::new(&self.config.interpreter)
            .arg(artifact.path())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.config.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return TestResult::fail(
                    case,
                    format!("ERROR: failed to spawn {}: {}", self.config.interpreter, e),
                )
            }
            Err(_) => {
                return TestResult::fail(
                    case,
                    format!(
                        "ERROR: interpreter timed out after {} seconds",
                        self.config.timeout.as_secs()
                    ),
                )
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        // Non-empty stderr always fails the case, regardless of stdout.
        if !stderr.trim().is_empty() {
            return TestResult::fail(case, format!("ERROR: {}", stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let actual = ansi_re().replace_all(stdout.trim(), "").to_string();

        debug!(
            input = %case.input,
            expected = %case.expected,
            actual = %actual,
            "Judged test case"
        );

        if actual == case.expected {
            TestResult::pass(case, actual)
        } else {
            TestResult::fail(case, actual)
        }
    }

    /// Appends the invocation statement that prints the call result.
    fn compose_program(&self, entry_point: &str, code: &str, case: &TestCase) -> String {
        let rendered: Vec<String> = case.args.iter().map(|a| a.to_literal()).collect();
        let call = self
            .config
            .call_template
            .replace("{name}", entry_point)
            .replace("{args}", &rendered.join(", "));
        format!("{}\n{}\n", code.trim_end(), call)
    }

    /// Persists the program under a fresh collision-resistant name.
    async fn stage(&self, program: &str) -> std::io::Result<TempProgram> {
        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!(
            "kata-{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            &suffix[..8],
            self.config.file_extension
        );
        let path = self.config.workdir.join(name);
        tokio::fs::write(&path, program).await?;
        Ok(TempProgram { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testspec::parse_spec;
    use tempfile::TempDir;

    /// Shell-backed config: the "interpreter" is `sh` and the invocation
    /// statement calls a shell function defined by the candidate code.
    fn sh_config(workdir: &TempDir) -> ExecutorConfig {
        ExecutorConfig::new("sh")
            .with_workdir(workdir.path())
            .with_file_extension("sh")
            .with_call_template("{name} {args}")
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_passing_and_failing_cases() {
        let workdir = TempDir::new().unwrap();
        let executor = Executor::new(sh_config(&workdir));

        let cases = parse_spec("5 -> 10\n5 -> 11\n").unwrap();
        let code = "double() { echo $(( $1 * 2 )); }";

        let results = executor.run("double", code, &cases).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].passed);
        assert_eq!(results[0].actual, "10");
        assert!(!results[1].passed);
        assert_eq!(results[1].actual, "10");
    }

    #[tokio::test]
    async fn test_stderr_always_fails_even_when_stdout_matches() {
        let workdir = TempDir::new().unwrap();
        let executor = Executor::new(sh_config(&workdir));

        let cases = parse_spec("1 -> ok").unwrap();
        let code = "noisy() { echo ok; echo diagnostics 1>&2; }";

        let results = executor.run("noisy", code, &cases).await;

        assert!(!results[0].passed);
        assert!(results[0].actual.starts_with("ERROR:"));
        assert!(results[0].actual.contains("diagnostics"));
    }

    #[tokio::test]
    async fn test_temp_artifacts_cleaned_on_every_path() {
        let workdir = TempDir::new().unwrap();
        let executor = Executor::new(sh_config(&workdir));

        // One passing case, one stderr failure.
        let cases = parse_spec("2 -> 4\n1 -> boom\n").unwrap();
        let code = "double() { if [ $1 = 1 ]; then echo bad 1>&2; else echo $(( $1 * 2 )); fi; }";

        let _ = executor.run("double", code, &cases).await;

        let leftover = std::fs::read_dir(workdir.path()).unwrap().count();
        assert_eq!(leftover, 0, "temp programs must not leak");
    }

    #[tokio::test]
    async fn test_timeout_yields_error_marker() {
        let workdir = TempDir::new().unwrap();
        let config = sh_config(&workdir).with_timeout(Duration::from_millis(200));
        let executor = Executor::new(config);

        let cases = parse_spec("1 -> never").unwrap();
        let code = "hang() { sleep 5; }";

        let results = executor.run("hang", code, &cases).await;

        assert!(!results[0].passed);
        assert!(results[0].actual.contains("ERROR"));
    }

    #[tokio::test]
    async fn test_ansi_escapes_stripped_before_comparison() {
        let workdir = TempDir::new().unwrap();
        let executor = Executor::new(sh_config(&workdir));

        let cases = parse_spec("1 -> colored").unwrap();
        let code = "paint() { printf '\\033[31mcolored\\033[0m\\n'; }";

        let results = executor.run("paint", code, &cases).await;

        assert!(results[0].passed, "actual was {:?}", results[0].actual);
    }

    #[test]
    fn test_compose_program_renders_literals() {
        let executor = Executor::new(ExecutorConfig::default());
        let cases = parse_spec("[1, 2], 3 -> x").unwrap();

        let program = executor.compose_program("merge", "def merge(a, b): pass", &cases[0]);

        assert!(program.ends_with("print(merge([1, 2], 3))\n"));
    }

    #[test]
    fn test_config_builder() {
        let config = ExecutorConfig::new("lua")
            .with_file_extension("lua")
            .with_call_template("print({name}({args}))")
            .with_timeout(Duration::from_secs(3));

        assert_eq!(config.interpreter, "lua");
        assert_eq!(config.file_extension, "lua");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }
}
