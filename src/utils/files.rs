use crate::error::{IngestError, Result};
use crate::utils::constants::DATASET_EXTENSION;
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand the `--file` argument into a sorted list of dataset paths.
///
/// Accepts a single file, a directory (every `.nc` file below it), or a glob
/// pattern. Wildcards may appear in any component; `*` and `?` never cross a
/// path separator, `**` does.
pub fn expand_input(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(pattern);

    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = if path.is_dir() {
        WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| {
                p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(DATASET_EXTENSION))
            })
            .collect()
    } else if has_wildcards(pattern) {
        glob_files(path)?
    } else {
        Vec::new()
    };

    files.sort();
    Ok(files)
}

fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Walk from the wildcard-free prefix of `pattern` and keep the files whose
/// path below that prefix matches the rest of the pattern.
fn glob_files(pattern: &Path) -> Result<Vec<PathBuf>> {
    let (root, rest) = split_at_first_wildcard(pattern);
    let matcher = compile(&rest)?;
    let walk_root: &Path = if root.as_os_str().is_empty() {
        Path::new(".")
    } else {
        &root
    };

    let mut walker = WalkDir::new(walk_root).min_depth(1);
    if !rest.contains("**") {
        walker = walker.max_depth(rest.split('/').count());
    }

    Ok(walker
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let below = entry.path().strip_prefix(walk_root).ok()?.to_path_buf();
            matcher.is_match(&below).then(|| root.join(below))
        })
        .collect())
}

/// `/data/2020_*/x*.nc` -> (`/data`, `2020_*/x*.nc`).
fn split_at_first_wildcard(pattern: &Path) -> (PathBuf, String) {
    let mut root = PathBuf::new();
    let mut rest: Vec<String> = Vec::new();
    for component in pattern.components() {
        let text = component.as_os_str().to_string_lossy();
        if rest.is_empty() && !has_wildcards(&text) {
            root.push(component);
        } else {
            rest.push(text.into_owned());
        }
    }
    (root, rest.join("/"))
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| IngestError::Config(format!("invalid file pattern '{}': {}", pattern, e)))
}
