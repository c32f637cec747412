//! Project-level passes: walking a source tree for components and rewriting
//! files on disk.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::InstrumentConfig;
use crate::detect::ComponentCandidate;
use crate::error::{InstrumentError, Result};
use crate::import_path::import_specifier;
use crate::source::SourceFile;
use crate::strategy::{detect_file, transform_file, Detection};

// -----------------------------------------------------------------------------
// Scan
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundComponent {
    /// Relative to the scanned root.
    pub file: PathBuf,
    #[serde(flatten)]
    pub candidate: ComponentCandidate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub file: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub files: usize,
    pub components: Vec<FoundComponent>,
    pub skipped: Vec<PathBuf>,
    pub degraded: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
}

/// Source files under `root`, sorted, honoring the ignore list, the depth
/// bound and the extension filter.
pub fn source_files(root: &Path, config: &InstrumentConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(InstrumentError::Walk {
            path: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(config.max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !config.is_ignored_dir(&e.file_name().to_string_lossy())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && config.has_source_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

pub fn scan_tree(root: &Path, config: &InstrumentConfig) -> Result<ScanReport> {
    let files = source_files(root, config)?;
    debug!(root = %root.display(), files = files.len(), "discovered source files");

    let results: Vec<(PathBuf, Result<Detection>)> = files
        .par_iter()
        .map(|path| {
            let rel = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            (rel, scan_file(path, config))
        })
        .collect();

    let mut report = ScanReport { files: results.len(), ..Default::default() };
    for (file, result) in results {
        match result {
            Ok(detection) => {
                if detection.skipped {
                    report.skipped.push(file.clone());
                }
                if detection.degraded {
                    report.degraded.push(file.clone());
                }
                report.components.extend(
                    detection
                        .candidates
                        .into_iter()
                        .map(|candidate| FoundComponent { file: file.clone(), candidate }),
                );
            }
            Err(e) => report.failed.push(FileFailure { file, reason: e.to_string() }),
        }
    }

    info!(
        files = report.files,
        components = report.components.len(),
        skipped = report.skipped.len(),
        degraded = report.degraded.len(),
        failed = report.failed.len(),
        "scan finished"
    );
    Ok(report)
}

fn scan_file(path: &Path, config: &InstrumentConfig) -> Result<Detection> {
    // checked before reading so large bundles never get loaded
    let len = std::fs::metadata(path).map_err(|e| InstrumentError::read(path, e))?.len();
    if len > config.max_file_bytes {
        warn!(path = %path.display(), bytes = len, limit = config.max_file_bytes, "skipped: file over size ceiling");
        return Ok(Detection { skipped: true, ..Default::default() });
    }
    let file = SourceFile::read(path)?;
    Ok(detect_file(&file, config))
}

// -----------------------------------------------------------------------------
// Wrap
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrapReport {
    pub file: PathBuf,
    pub components: Vec<String>,
    pub import_path: String,
    pub changed: bool,
    pub degraded: bool,
}

/// Wraps `components` in `project_root/rel_path`, importing the helper at
/// `project_root/helper`. The file is rewritten only when its text changes.
pub fn wrap_file<S: AsRef<str>>(
    project_root: &Path,
    rel_path: &Path,
    components: &[S],
    helper: &Path,
    config: &InstrumentConfig,
) -> Result<WrapReport> {
    let path = project_root.join(rel_path);
    let import_path = import_specifier(&path, &project_root.join(helper));

    let file = SourceFile::read(&path)?;
    let result = transform_file(&file, components, &import_path, config)?;

    let changed = match &result.code {
        Some(code) => {
            write_atomic(&path, code)?;
            info!(path = %path.display(), components = ?result.components, degraded = result.degraded, "wrapped");
            true
        }
        None => false,
    };

    Ok(WrapReport {
        file: path,
        components: result.components,
        import_path,
        changed,
        degraded: result.degraded,
    })
}

/// Replaces `path` with `contents` through a sibling temp file, so readers
/// never observe a partial write.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| InstrumentError::write(path, e))?;
    tmp.write_all(contents.as_bytes()).map_err(|e| InstrumentError::write(path, e))?;
    if let Ok(meta) = std::fs::metadata(path) {
        // keep the original mode bits
        if let Err(e) = std::fs::set_permissions(tmp.path(), meta.permissions()) {
            debug!(path = %path.display(), error = %e, "could not copy permissions");
        }
    }
    tmp.persist(path).map_err(|e| InstrumentError::write(path, e.error))?;
    Ok(())
}

// -----------------------------------------------------------------------------
// Batch
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapRequest {
    /// Relative to the project root.
    pub file: PathBuf,
    #[serde(alias = "name")]
    pub component: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Requests that wrapped a component.
    pub succeeded: usize,
    /// Requests that matched nothing or were already wrapped.
    pub unchanged: usize,
    /// Requests whose file could not be read, printed or written.
    pub failed: usize,
    pub failures: Vec<FileFailure>,
}

/// Processes requests grouped by file, files in parallel. A failing file
/// does not stop the others; the batch as a whole is not transactional.
pub fn wrap_all(
    project_root: &Path,
    requests: &[WrapRequest],
    helper: &Path,
    config: &InstrumentConfig,
) -> BatchReport {
    let mut by_file: BTreeMap<&Path, Vec<&str>> = BTreeMap::new();
    for req in requests {
        let components = by_file.entry(req.file.as_path()).or_default();
        if !components.contains(&req.component.as_str()) {
            components.push(&req.component);
        }
    }
    let duplicates = requests.len() - by_file.values().map(Vec::len).sum::<usize>();

    let outcomes: Vec<(&Path, usize, Result<WrapReport>)> = by_file
        .par_iter()
        .map(|(file, components)| (*file, components.len(), wrap_file(project_root, file, components, helper, config)))
        .collect();

    let mut report = BatchReport { unchanged: duplicates, ..Default::default() };
    for (file, requested, outcome) in outcomes {
        match outcome {
            Ok(done) => {
                report.succeeded += done.components.len();
                report.unchanged += requested - done.components.len();
            }
            Err(e) => {
                warn!(path = %e.path().display(), error = %e, "wrap failed");
                report.failed += requested;
                report.failures.push(FileFailure { file: file.to_path_buf(), reason: e.to_string() });
            }
        }
    }

    info!(
        succeeded = report.succeeded,
        unchanged = report.unchanged,
        failed = report.failed,
        "batch finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn ignored_directories_and_extensions_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/App.tsx", "");
        write(dir.path(), "src/util.ts", "");
        write(dir.path(), "src/readme.md", "");
        write(dir.path(), "node_modules/lib/index.js", "");
        write(dir.path(), "android/app/Main.js", "");

        let files = source_files(dir.path(), &InstrumentConfig::default()).unwrap();
        let rel: Vec<_> = files.iter().map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf()).collect();
        assert_eq!(rel, vec![PathBuf::from("src/App.tsx"), PathBuf::from("src/util.ts")]);
    }

    #[test]
    fn depth_bound_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/Shallow.tsx", "");
        write(dir.path(), "a/b/c/Deep.tsx", "");
        let config = InstrumentConfig { max_depth: 2, ..Default::default() };
        let files = source_files(dir.path(), &config).unwrap();
        assert_eq!(files, vec![dir.path().join("a/Shallow.tsx")]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = source_files(&dir.path().join("nope"), &InstrumentConfig::default()).unwrap_err();
        assert!(matches!(err, InstrumentError::Walk { .. }));
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.tsx");
        fs::write(&path, "old").unwrap();
        write_atomic(&path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_keeps_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.tsx");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
        write_atomic(&path, "new").unwrap();
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o640);
    }

    #[test]
    fn failures_carry_the_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = wrap_file(dir.path(), Path::new("src/Gone.tsx"), &["Gone"], Path::new("perf.ts"), &InstrumentConfig::default())
            .unwrap_err();
        assert_eq!(err.path(), dir.path().join("src/Gone.tsx"));

        let requests = vec![WrapRequest { file: "src/Gone.tsx".into(), component: "Gone".into() }];
        let report = wrap_all(dir.path(), &requests, Path::new("perf.ts"), &InstrumentConfig::default());
        assert_eq!(report.failures[0].file, PathBuf::from("src/Gone.tsx"));
        assert!(report.failures[0].reason.contains("Gone.tsx"));
    }
}
