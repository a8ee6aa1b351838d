use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use recordify_config::{discover_config_path, init_tracing, RecordifyConfig};
use recordify_refactor::{
    convert_files, preview_file, summarize, BatchSummary, ClassOutcome, ClassReport,
    FileConversion,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

mod files;
mod fixtures;

#[derive(Parser)]
#[command(
    name = "recordify",
    version,
    about = "Convert eligible Java classes into records"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert eligible classes in place
    Run(RunArgs),
    /// Report which classes would be converted, and why others are not
    Check(CheckArgs),
    /// Run `<case>/input` → `<case>/expected` fixture cases
    Test(TestArgs),
    /// Print the JSON schema of `recordify.toml`
    Schema,
}

#[derive(Args)]
struct RunArgs {
    /// Java file or directory
    path: PathBuf,
    /// Print unified diffs instead of writing files
    #[arg(long)]
    dry_run: bool,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
    /// Config file (defaults to `recordify.toml` in the run root)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct CheckArgs {
    /// Java file or directory
    path: PathBuf,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
    /// Config file (defaults to `recordify.toml` in the run root)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct TestArgs {
    /// Directory holding one sub-directory per case
    dir: PathBuf,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run(args) => run_convert(args),
        Command::Check(args) => run_check(args),
        Command::Test(args) => run_tests(args),
        Command::Schema => {
            let schema = recordify_config::json_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(0)
        }
    }
}

fn load_config(root: &Path, explicit: Option<&Path>) -> Result<RecordifyConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config_path(root),
    };
    let Some(path) = path else {
        return Ok(RecordifyConfig::default());
    };
    let (config, diagnostics) = RecordifyConfig::load_from_path_with_diagnostics(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    for key in &diagnostics.unknown_keys {
        eprintln!("warning: {}: unknown config key `{key}`", path.display());
    }
    for warning in &diagnostics.warnings {
        eprintln!("warning: {}: {warning}", path.display());
    }
    Ok(config)
}

/// Load config, start logging and convert everything under `path`.
fn convert_under(
    path: &Path,
    config_path: Option<&Path>,
) -> Result<(PathBuf, RecordifyConfig, Vec<FileConversion>)> {
    let root = files::run_root(path);
    let config = load_config(&root, config_path)?;
    init_tracing(&config.logging);
    let sources = files::collect_sources(path, &config.files)?;
    Ok((root, config, convert_files(sources)))
}

#[derive(Serialize)]
struct FileReport {
    path: String,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diff: Option<String>,
    classes: Vec<ClassReport>,
}

#[derive(Serialize)]
struct RunReport {
    dry_run: bool,
    summary: BatchSummary,
    files: Vec<FileReport>,
}

fn file_report(root: &Path, conversion: &FileConversion, diff: Option<String>) -> FileReport {
    let (error, classes) = match &conversion.result {
        Ok(result) => (None, result.reports.clone()),
        Err(err) => (Some(err.to_string()), Vec::new()),
    };
    FileReport {
        path: files::display_path(root, &conversion.path),
        changed: conversion.is_changed(),
        error,
        diff,
        classes,
    }
}

fn run_convert(args: RunArgs) -> Result<i32> {
    let (root, config, conversions) = convert_under(&args.path, args.config.as_deref())?;
    let summary = summarize(&conversions);

    let mut reports = Vec::with_capacity(conversions.len());
    for conversion in &conversions {
        let mut diff = None;
        if args.dry_run {
            diff = preview_file(conversion, &root, config.output.diff_context)
                .map(|p| p.unified_diff);
        } else if let Some(output) = conversion.output() {
            files::atomic_write(&conversion.path, output)?;
            tracing::info!(
                target = "recordify.cli",
                path = %conversion.path.display(),
                "wrote converted file"
            );
        }
        reports.push(file_report(&root, conversion, diff));
    }

    if args.json {
        let report = RunReport {
            dry_run: args.dry_run,
            summary,
            files: reports,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for report in &reports {
            print_file_report(report);
            if let Some(diff) = &report.diff {
                print!("{diff}");
            }
        }
        print_summary(&summary, args.dry_run);
    }

    Ok(exit_code_for(&summary))
}

fn print_file_report(report: &FileReport) {
    if let Some(error) = &report.error {
        println!("{}: error: {error}", report.path);
        return;
    }
    for class in &report.classes {
        match &class.outcome {
            ClassOutcome::Rewritten { .. } => {
                println!("{}:{}: `{}` converted to record", report.path, class.line, class.name)
            }
            ClassOutcome::Failed { violation } => {
                println!("{}:{}: error: `{}`: {violation}", report.path, class.line, class.name)
            }
            ClassOutcome::Unchanged { .. } => {}
        }
        for diagnostic in &class.diagnostics {
            println!("{}:{}: warning: {diagnostic}", report.path, class.line);
        }
    }
}

fn print_summary(summary: &BatchSummary, dry_run: bool) {
    println!(
        "summary: {} files, {} {}, {} classes converted, {} failed, {} unparsable",
        summary.files,
        summary.changed_files,
        if dry_run { "would change" } else { "changed" },
        summary.rewritten_classes,
        summary.failed_classes,
        summary.unparsable_files,
    );
}

fn exit_code_for(summary: &BatchSummary) -> i32 {
    if summary.failed_classes > 0 || summary.unparsable_files > 0 {
        1
    } else {
        0
    }
}

#[derive(Serialize)]
struct CheckEntry {
    path: String,
    name: String,
    line: usize,
    eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn run_check(args: CheckArgs) -> Result<i32> {
    let (root, _config, conversions) = convert_under(&args.path, args.config.as_deref())?;
    let summary = summarize(&conversions);

    let mut entries = Vec::new();
    for conversion in &conversions {
        let path = files::display_path(&root, &conversion.path);
        let result = match &conversion.result {
            Ok(result) => result,
            Err(err) => {
                if !args.json {
                    println!("{path}: error: {err}");
                }
                continue;
            }
        };
        for class in &result.reports {
            let (eligible, reason) = match &class.outcome {
                ClassOutcome::Rewritten { .. } => (true, None),
                ClassOutcome::Unchanged { reason } => (false, Some(reason.to_string())),
                ClassOutcome::Failed { violation } => (false, Some(violation.to_string())),
            };
            entries.push(CheckEntry {
                path: path.clone(),
                name: class.name.clone(),
                line: class.line,
                eligible,
                reason,
            });
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            match &entry.reason {
                None => println!("{}:{}: `{}`: eligible", entry.path, entry.line, entry.name),
                Some(reason) => println!(
                    "{}:{}: `{}`: not eligible: {reason}",
                    entry.path, entry.line, entry.name
                ),
            }
        }
        let eligible = entries.iter().filter(|e| e.eligible).count();
        println!("summary: {eligible} of {} classes eligible", entries.len());
    }

    Ok(exit_code_for(&summary))
}

fn run_tests(args: TestArgs) -> Result<i32> {
    let config = load_config(&args.dir, None)?;
    init_tracing(&config.logging);
    let report = fixtures::run_fixtures(&args.dir, config.output.diff_context)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for case in &report.cases {
            println!("{} {}", if case.passed { "PASS" } else { "FAIL" }, case.name);
            for failure in &case.failures {
                for line in failure.lines() {
                    println!("    {line}");
                }
            }
        }
        println!("summary: {} passed, {} failed", report.passed, report.failed);
    }

    Ok(if report.failed > 0 { 1 } else { 0 })
}
