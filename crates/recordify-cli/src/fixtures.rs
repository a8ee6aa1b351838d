//! `recordify test`: input/expected fixture cases.
//!
//! A case is a directory with an `input/` tree and an `expected/` tree. Every
//! input file is converted in memory; the resulting file set must equal the
//! expected one byte-for-byte.

use anyhow::{Context, Result};
use recordify_refactor::{convert_source, unified_diff};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Serialize)]
pub(crate) struct CaseResult {
    pub(crate) name: String,
    pub(crate) passed: bool,
    pub(crate) failures: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FixtureReport {
    pub(crate) passed: usize,
    pub(crate) failed: usize,
    pub(crate) cases: Vec<CaseResult>,
}

pub(crate) fn run_fixtures(dir: &Path, diff_context: usize) -> Result<FixtureReport> {
    let mut case_dirs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.join("input").is_dir() {
            case_dirs.push(path);
        }
    }
    case_dirs.sort();
    if case_dirs.is_empty() {
        anyhow::bail!("no fixture cases (directories with an `input/` tree) under {}", dir.display());
    }

    let mut cases = Vec::with_capacity(case_dirs.len());
    for case in case_dirs {
        cases.push(run_case(&case, diff_context)?);
    }
    let passed = cases.iter().filter(|c| c.passed).count();
    Ok(FixtureReport {
        passed,
        failed: cases.len() - passed,
        cases,
    })
}

fn run_case(case: &Path, diff_context: usize) -> Result<CaseResult> {
    let name = case
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut failures = Vec::new();

    let inputs = read_tree(&case.join("input"))?;
    let expected_dir = case.join("expected");
    if !expected_dir.is_dir() {
        failures.push("missing `expected/` directory".to_owned());
        return Ok(CaseResult {
            name,
            passed: false,
            failures,
        });
    }
    let expected = read_tree(&expected_dir)?;

    let mut actual = BTreeMap::new();
    for (path, text) in inputs {
        match convert_source(&text) {
            Ok(conversion) => {
                actual.insert(path, conversion.output);
            }
            Err(err) => {
                failures.push(format!("{path}: {err}"));
                actual.insert(path, text);
            }
        }
    }

    let paths: BTreeSet<&String> = actual.keys().chain(expected.keys()).collect();
    for path in paths {
        match (actual.get(path), expected.get(path)) {
            (Some(_), None) => failures.push(format!("{path}: not in expected/")),
            (None, Some(_)) => failures.push(format!("{path}: expected but not produced")),
            (Some(got), Some(want)) if got != want => failures.push(format!(
                "{path}: output differs\n{}",
                unified_diff(path, want, got, diff_context)
            )),
            _ => {}
        }
    }

    Ok(CaseResult {
        name,
        passed: failures.is_empty(),
        failures,
    })
}

fn read_tree(root: &Path) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let text = fs::read_to_string(entry.path())
            .with_context(|| format!("failed to read {}", entry.path().display()))?;
        files.insert(crate::files::display_path(root, entry.path()), text);
    }
    Ok(files)
}
