use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use renderer::{Capabilities, CompileError, Text};
use serde::Deserialize;
use tracing::debug;

use crate::data::{DataPresenter, DataResolver, PresenterSpec};

const TEST_SUFFIX: &str = ".test.curly";

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// The presenter the template is compiled and rendered against.
    #[serde(default)]
    pub presenter: PresenterSpec,

    /// Text the outer block produces when a presenter method yields to it.
    #[serde(default)]
    pub block: Option<String>,

    /// Expected exact output (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected render error: the error's Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the test expects parsing to fail.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Name of the reference validation is expected to reject.
    #[serde(default)]
    pub expect_invalid: Option<String>,
}

/// Split a `.test.curly` file into its TOML frontmatter and template source.
pub fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let body = content
        .strip_prefix("---")
        .and_then(|rest| rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")))
        .ok_or("missing opening --- frontmatter delimiter")?;

    let mut offset = 0;
    let mut split = None;
    for line in body.split_inclusive('\n') {
        if line.trim_end() == "---" {
            split = Some((&body[..offset], &body[offset + line.len()..]));
            break;
        }
        offset += line.len();
    }
    let (frontmatter, source) = split.ok_or("missing closing --- frontmatter delimiter")?;

    let config: TestConfig =
        toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, source))
}

#[derive(Debug, PartialEq, Eq)]
pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    debug!(path = %path.display(), "running test");
    TestResult {
        path: path.to_path_buf(),
        description: config.description.clone(),
        outcome: check(&config, source),
    }
}

/// Compile and render `source`, comparing against the expectations in `config`.
pub fn check(config: &TestConfig, source: &str) -> TestOutcome {
    let compiled = renderer::compile(source, Some(&config.presenter as &dyn Capabilities));

    // 1. Parse expectations
    if config.expect_parse_error {
        return match compiled {
            Err(CompileError::Parse(_)) => TestOutcome::Pass,
            Err(other) => TestOutcome::Fail(format!("expected parse error, got: {}", other)),
            Ok(_) => TestOutcome::Fail("expected parse error, but parsing succeeded".into()),
        };
    }

    // 2. Validation expectations
    if let Some(expected) = &config.expect_invalid {
        return match compiled {
            Err(CompileError::InvalidReference(invalid)) if invalid.name == *expected => {
                TestOutcome::Pass
            }
            Err(other) => TestOutcome::Fail(format!(
                "expected invalid reference `{}`, got: {}",
                expected, other
            )),
            Ok(_) => TestOutcome::Fail(format!(
                "expected invalid reference `{}`, but the template compiled",
                expected
            )),
        };
    }

    let template = match compiled {
        Ok(template) => template,
        Err(error) => return TestOutcome::Fail(format!("unexpected compile error: {}", error)),
    };

    // 3. Render
    let presenter = DataPresenter::root(&config.presenter);
    let resolver = DataResolver::new(&config.presenter);
    let rendered = match &config.block {
        Some(block) => template.render_with_block(&presenter, &resolver, |_| Ok(Text::plain(block.as_str()))),
        None => template.render(&presenter, &resolver),
    };

    // 4. Check error/output expectations
    match (&config.expect_error, &config.expect_output, rendered) {
        (Some(expected_err), _, Err(render_err)) => {
            let err_str = render_err.to_string();
            if err_str.contains(expected_err.as_str()) {
                TestOutcome::Pass
            } else {
                TestOutcome::Fail(format!(
                    "expected error containing \"{}\", got: {}",
                    expected_err, err_str
                ))
            }
        }
        (Some(expected_err), _, Ok(_)) => TestOutcome::Fail(format!(
            "expected error containing \"{}\", but rendering succeeded",
            expected_err
        )),
        (None, _, Err(render_err)) => {
            TestOutcome::Fail(format!("unexpected render error: {}", render_err))
        }
        (None, Some(expected_output), Ok(actual)) => {
            let actual_trimmed = actual.trim();
            let expected_trimmed = expected_output.trim();
            if actual_trimmed == expected_trimmed {
                TestOutcome::Pass
            } else {
                TestOutcome::Fail(format!(
                    "output mismatch\n  expected: {}\n  actual:   {}",
                    expected_trimmed, actual_trimmed
                ))
            }
        }
        (None, None, Ok(_)) => TestOutcome::Pass,
    }
}

/// Test files under `root`, keyed by the folder they sit in relative to
/// `root` (`""` for `root` itself). Both levels are sorted.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_test = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(TEST_SUFFIX));
        if is_test {
            let category = path
                .parent()
                .and_then(|parent| parent.strip_prefix(root).ok())
                .map(|parent| parent.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

/// ANSI styling for the report, switched off by `--no-color`.
#[derive(Clone, Copy)]
struct Style {
    color: bool,
}

impl Style {
    fn paint(self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(self) -> String {
        self.paint("31", "FAIL")
    }
}

/// Keep the categories matching a requested name or one of its subfolders.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }

    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run all test files under `path` (or a single file), optionally limited
/// to `categories`. Returns the process exit code: 0 when every test passes.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { color: !no_color };

    let all = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        discover_categorized(path)
    };
    if all.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return 1;
    }

    let selected = if path.is_file() {
        select_categories(&all, &[])
    } else {
        select_categories(&all, categories)
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &selected {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", style.paint("1", category_label(category)));
        }

        for file in *files {
            let result = run_single_test(file);
            let label = result.description.clone().unwrap_or_else(|| {
                file.file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("?")
                    .to_string()
            });

            if result.outcome == TestOutcome::Pass {
                passed += 1;
                eprintln!("  {}  {}", style.pass(), label);
            } else {
                eprintln!("  {}  {}", style.fail(), label);
                failures.push(result);
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("31", "FAILED"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn outcome(content: &str) -> TestOutcome {
        let (config, source) = parse_test_file(content).expect("bad frontmatter");
        check(&config, source)
    }

    #[test]
    fn frontmatter_splits_source() {
        let (config, source) =
            parse_test_file("---\ndescription = \"d\"\n---\n{{foo}}\n").unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert_eq!(source, "{{foo}}\n");
        assert!(parse_test_file("{{foo}}").is_err());
        assert!(parse_test_file("---\nunclosed = true\n").is_err());
    }

    #[test]
    fn output_expectations() {
        let passing = "---\nexpect_output = \"FOO\"\n[presenter]\nfoo = \"FOO\"\n---\n{{foo}}";
        assert_eq!(outcome(passing), TestOutcome::Pass);

        let failing = "---\nexpect_output = \"BAR\"\n[presenter]\nfoo = \"FOO\"\n---\n{{foo}}";
        assert!(matches!(outcome(failing), TestOutcome::Fail(reason) if reason.contains("output mismatch")));
    }

    #[test]
    fn outer_block_feeds_yields() {
        let content = "---\nblock = \"$$$\"\nexpect_output = \"$$$!\"\n[presenter]\nhigh_yield = { wrap = { after = \"!\" } }\n---\n{{high_yield}}";
        assert_eq!(outcome(content), TestOutcome::Pass);
    }

    #[test]
    fn error_expectations() {
        let parse = "---\nexpect_parse_error = true\n---\n{{#a}}";
        assert_eq!(outcome(parse), TestOutcome::Pass);

        let invalid = "---\nexpect_invalid = \"bar\"\n[presenter]\nfoo = 1\n---\n{{bar}}";
        assert_eq!(outcome(invalid), TestOutcome::Pass);

        let render = "---\nexpect_error = \"no presenter found\"\n[presenter]\ndust = { yields = [1] }\n---\n{{@dust}}{{/dust}}";
        assert_eq!(outcome(render), TestOutcome::Pass);

        let compiles = "---\nexpect_parse_error = true\n[presenter]\nfoo = 1\n---\n{{foo}}";
        assert!(matches!(outcome(compiles), TestOutcome::Fail(_)));
    }

    #[test]
    fn discovers_tests_by_category() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "root.test.curly", "---\n---\nplain");
        write(dir.path(), "blocks/a.test.curly", "---\n---\na");
        write(dir.path(), "blocks/b.test.curly", "---\n---\nb");
        write(dir.path(), "blocks/notes.txt", "ignored");

        let categories = discover_categorized(dir.path());
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[""].len(), 1);
        assert_eq!(categories["blocks"].len(), 2);
    }

    #[test]
    fn run_tests_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ok.test.curly", "---\nexpect_output = \"x\"\n---\nx");
        assert_eq!(run_tests(dir.path(), true, &[]), 0);

        write(dir.path(), "bad.test.curly", "---\nexpect_output = \"y\"\n---\nx");
        assert_eq!(run_tests(dir.path(), true, &[]), 1);

        let single = write(dir.path(), "single.test.curly", "---\ndescription = \"single\"\n---\nx");
        assert_eq!(run_tests(&single, true, &[]), 0);
    }

    #[test]
    fn demo_suite_passes() {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/tests");
        assert_eq!(run_tests(&demos, true, &[]), 0);
        assert_eq!(run_tests(&demos, true, &["errors".to_string()]), 0);
    }
}
