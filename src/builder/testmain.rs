//! Generation of the `_testmain.go` driver for a target's tests.

use std::fmt::Write as _;

use crate::core::target::Target;

/// Scratch directory for test builds, inside the target directory.
pub const TEST_DIR: &str = "_test";

/// One package contributing tests to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPackage {
    /// Import alias used inside the driver
    pub alias: String,
    /// Import path the package archive is built under
    pub import_path: String,
    /// Declared package name
    pub package: String,
    pub tests: Vec<String>,
    pub benchmarks: Vec<String>,
}

impl TestPackage {
    fn is_empty(&self) -> bool {
        self.tests.is_empty() && self.benchmarks.is_empty()
    }
}

/// Import path a test package is built under: the target's own package
/// replaces the target, any other gets a `_test` suffix.
pub fn test_import_path(target: &Target, package: &str) -> String {
    if package == target.package {
        target.name.clone()
    } else {
        format!("{}_test", target.name)
    }
}

/// Test packages of `target`, the target's own package first.
pub fn test_packages(target: &Target) -> Vec<TestPackage> {
    let mut packages: Vec<&String> = target.test_functions.keys().collect();
    packages.sort_by_key(|p| (**p != target.package, p.to_string()));

    packages
        .into_iter()
        .enumerate()
        .map(|(i, package)| {
            let functions = &target.test_functions[package];
            let (benchmarks, tests): (Vec<String>, Vec<String>) = functions
                .iter()
                .cloned()
                .partition(|f| f.starts_with("Benchmark"));
            TestPackage {
                alias: format!("_test{i}"),
                import_path: test_import_path(target, package),
                package: package.clone(),
                tests,
                benchmarks,
            }
        })
        .collect()
}

/// Render the driver program.
pub fn render(packages: &[TestPackage]) -> String {
    let used: Vec<&TestPackage> = packages.iter().filter(|p| !p.is_empty()).collect();

    let mut out = String::from("package main\n\nimport (\n\t\"regexp\"\n\t\"testing\"\n");
    if !used.is_empty() {
        out.push('\n');
    }
    for pkg in &used {
        let _ = writeln!(out, "\t{} \"{}\"", pkg.alias, pkg.import_path);
    }
    out.push_str(")\n\n");

    out.push_str("var tests = []testing.InternalTest{\n");
    for pkg in &used {
        for test in &pkg.tests {
            let _ = writeln!(out, "\t{{\"{}.{}\", {}.{}}},", pkg.package, test, pkg.alias, test);
        }
    }
    out.push_str("}\n\n");

    out.push_str("var benchmarks = []testing.InternalBenchmark{\n");
    for pkg in &used {
        for bench in &pkg.benchmarks {
            let _ = writeln!(out, "\t{{\"{}.{}\", {}.{}}},", pkg.package, bench, pkg.alias, bench);
        }
    }
    out.push_str("}\n\n");

    out.push_str(MATCH_AND_MAIN);
    out
}

const MATCH_AND_MAIN: &str = r#"var matchPat string
var matchRe *regexp.Regexp

func matchString(pat, str string) (result bool, err error) {
	if matchRe == nil || matchPat != pat {
		matchPat = pat
		matchRe, err = regexp.Compile(matchPat)
		if err != nil {
			return
		}
	}
	return matchRe.MatchString(str), nil
}

func main() {
	testing.Main(matchString, tests, benchmarks, nil)
}
"#;
