use anyhow::{Context, Result};
use recordify_config::FilesConfig;
use recordify_refactor::{relative_path, FileInput};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory a run is rooted at: `path` itself, or the parent of a file.
pub(crate) fn run_root(path: &Path) -> PathBuf {
    if path.is_file() {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    } else {
        path.to_path_buf()
    }
}

/// `path` relative to `root`, with `/` separators, for reports.
pub(crate) fn display_path(root: &Path, path: &Path) -> String {
    relative_path(root, path)
}

/// Java sources to convert. A file argument is taken as-is; a directory is
/// walked and filtered through the configured globs.
pub(crate) fn collect_sources(path: &Path, config: &FilesConfig) -> Result<Vec<FileInput>> {
    if path.is_file() {
        return Ok(vec![read_source(path)?]);
    }
    if !path.is_dir() {
        anyhow::bail!("{} does not exist", path.display());
    }

    let matcher = config.matcher()?;
    let relative = |p: &Path| p.strip_prefix(path).unwrap_or(p).to_path_buf();
    let walker = WalkDir::new(path)
        .follow_links(config.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !matcher.is_excluded_dir(&relative(entry.path()))
        });

    let mut sources = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
        if !entry.file_type().is_file() || !matcher.is_match(&relative(entry.path())) {
            continue;
        }
        sources.push(read_source(entry.path())?);
    }
    tracing::debug!(
        target = "recordify.cli",
        root = %path.display(),
        files = sources.len(),
        "collected sources"
    );
    Ok(sources)
}

fn read_source(path: &Path) -> Result<FileInput> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(FileInput {
        path: path.to_path_buf(),
        text,
    })
}

/// Replace `path` with `text` through a temporary file in the same
/// directory, keeping the original permissions.
pub(crate) fn atomic_write(path: &Path, text: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
    tmp.write_all(text.as_bytes())?;
    tmp.as_file().sync_all()?;
    if let Ok(metadata) = fs::metadata(path) {
        tmp.as_file().set_permissions(metadata.permissions())?;
    }
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
