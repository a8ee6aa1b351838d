use std::path::Path;

use similar::TextDiff;

use crate::batch::FileConversion;

pub const DEFAULT_CONTEXT_RADIUS: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePreview {
    pub path: String,
    pub original: String,
    pub modified: String,
    pub unified_diff: String,
    pub rewritten_classes: usize,
}

/// A unified diff with `a/` and `b/` headers. Empty when the texts match.
pub fn unified_diff(path: &str, original: &str, modified: &str, context_radius: usize) -> String {
    if original == modified {
        return String::new();
    }
    TextDiff::from_lines(original, modified)
        .unified_diff()
        .context_radius(context_radius)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}

/// Preview of a changed file; `None` when nothing was rewritten.
///
/// Diff headers name the file relative to `root`, so the diff applies with
/// `git apply` or `patch -p1` from there.
pub fn preview_file(
    conversion: &FileConversion,
    root: &Path,
    context_radius: usize,
) -> Option<FilePreview> {
    let result = conversion.result.as_ref().ok()?;
    if !result.is_changed() {
        return None;
    }
    let path = relative_path(root, &conversion.path);
    Some(FilePreview {
        unified_diff: unified_diff(&path, &conversion.original, &result.output, context_radius),
        original: conversion.original.clone(),
        modified: result.output.clone(),
        rewritten_classes: result
            .reports
            .iter()
            .filter(|r| r.outcome.is_rewritten())
            .count(),
        path,
    })
}

/// `path` relative to `root`, with `/` separators.
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
