//! Input selection: turn explicit paths and an optional time window into the
//! ordered list of SVG files to convert.
//!
//! ## Rules
//!
//! 1. `till` without `since` is rejected.
//! 2. Without `since`, explicit inputs are used verbatim, in caller order,
//!    and must not be empty.
//! 3. With `since`, candidates are the explicit inputs, or every `*.svg`
//!    directly inside the discovery directory when none were given. A
//!    candidate survives when its modification time lies in `[since, till)`.
//!    Survivors are sorted by modification time, ties keeping candidate
//!    order.
//!
//! An empty result under a time window is not an error; the pipeline turns it
//! into an empty document.

use crate::error::SelectionError;
use crate::time_window::TimeWindow;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension picked up by directory discovery.
pub const SVG_EXTENSION: &str = "svg";

/// Resolve the ordered input list, discovering in `discover_dir` when needed.
///
/// # Errors
/// [`SelectionError::TillWithoutSince`], [`SelectionError::NoInputsSpecified`],
/// or an I/O failure while listing the directory or reading timestamps.
pub fn select_inputs(
    explicit: &[PathBuf],
    window: &TimeWindow,
    discover_dir: &Path,
) -> Result<Vec<PathBuf>, SelectionError> {
    if window.since.is_none() {
        if window.till.is_some() {
            return Err(SelectionError::TillWithoutSince);
        }
        if explicit.is_empty() {
            return Err(SelectionError::NoInputsSpecified);
        }
        return Ok(explicit.to_vec());
    }

    let candidates = if explicit.is_empty() {
        discover_svg_files(discover_dir)?
    } else {
        explicit.to_vec()
    };

    let mut dated = candidates
        .into_iter()
        .map(|path| modified_at(&path).map(|mtime| (path, mtime)))
        .collect::<Result<Vec<_>, _>>()?;

    dated.retain(|(path, mtime)| {
        let keep = window.contains(*mtime);
        if !keep {
            debug!("Skipping {} (modified {})", path.display(), mtime);
        }
        keep
    });
    // Stable sort: equal timestamps keep candidate order.
    dated.sort_by_key(|(_, mtime)| *mtime);

    Ok(dated.into_iter().map(|(path, _)| path).collect())
}

/// List regular `*.svg` files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into.
pub fn discover_svg_files(dir: &Path) -> Result<Vec<PathBuf>, SelectionError> {
    let discovery = |source| SelectionError::Discovery {
        dir: dir.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(discovery)? {
        let entry = entry.map_err(discovery)?;
        let path = entry.path();
        let is_file = entry.file_type().map_err(discovery)?.is_file() || path.is_file();
        if is_file && has_svg_extension(&path) {
            found.push(path);
        }
    }
    found.sort();
    debug!("Discovered {} SVG files in {}", found.len(), dir.display());
    Ok(found)
}

fn has_svg_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SVG_EXTENSION)
}

fn modified_at(path: &Path) -> Result<DateTime<Utc>, SelectionError> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .map_err(|source| SelectionError::Metadata {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs::{self, File, FileTimes};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use tempfile::TempDir;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn instant(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// Create `name` in `dir` with the given modification time.
    fn touch(dir: &Path, name: &str, mtime: u64) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "<svg/>").unwrap();
        let file = File::options().write(true).open(&path).unwrap();
        file.set_times(FileTimes::new().set_modified(at(mtime))).unwrap();
        path
    }

    #[test]
    fn till_without_since_fails() {
        let tmp = TempDir::new().unwrap();
        let window = TimeWindow::new(None, Some(instant(100)));
        let inputs = vec![touch(tmp.path(), "a.svg", 50)];
        assert!(matches!(
            select_inputs(&inputs, &window, tmp.path()),
            Err(SelectionError::TillWithoutSince)
        ));
        assert!(matches!(
            select_inputs(&[], &window, tmp.path()),
            Err(SelectionError::TillWithoutSince)
        ));
    }

    #[test]
    fn no_window_requires_inputs() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.svg", 50);
        assert!(matches!(
            select_inputs(&[], &TimeWindow::default(), tmp.path()),
            Err(SelectionError::NoInputsSpecified)
        ));
    }

    #[test]
    fn no_window_keeps_caller_order_verbatim() {
        let tmp = TempDir::new().unwrap();
        let inputs = vec![
            PathBuf::from("z.svg"),
            PathBuf::from("does-not-matter.svg"),
            PathBuf::from("a.svg"),
        ];
        let selected = select_inputs(&inputs, &TimeWindow::default(), tmp.path()).unwrap();
        assert_eq!(selected, inputs);
    }

    #[test]
    fn since_filters_and_sorts_explicit_inputs() {
        let tmp = TempDir::new().unwrap();
        let late = touch(tmp.path(), "late.svg", 300);
        let old = touch(tmp.path(), "old.svg", 50);
        let early = touch(tmp.path(), "early.svg", 100);
        let mid = touch(tmp.path(), "mid.svg", 200);

        let window = TimeWindow::new(Some(instant(100)), None);
        let selected =
            select_inputs(&[late.clone(), old, early.clone(), mid.clone()], &window, tmp.path())
                .unwrap();
        assert_eq!(selected, vec![early, mid, late]);
    }

    #[test]
    fn till_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let a = touch(tmp.path(), "a.svg", 100);
        let b = touch(tmp.path(), "b.svg", 199);
        let c = touch(tmp.path(), "c.svg", 200);

        let window = TimeWindow::new(Some(instant(100)), Some(instant(200)));
        let selected = select_inputs(&[c, b.clone(), a.clone()], &window, tmp.path()).unwrap();
        assert_eq!(selected, vec![a, b]);
    }

    #[test]
    fn equal_timestamps_keep_candidate_order() {
        let tmp = TempDir::new().unwrap();
        let x = touch(tmp.path(), "x.svg", 150);
        let y = touch(tmp.path(), "y.svg", 150);

        let window = TimeWindow::new(Some(instant(100)), None);
        let selected = select_inputs(&[y.clone(), x.clone()], &window, tmp.path()).unwrap();
        assert_eq!(selected, vec![y, x]);
    }

    #[test]
    fn since_without_inputs_discovers_svg_files() {
        let tmp = TempDir::new().unwrap();
        let second = touch(tmp.path(), "b.svg", 200);
        let first = touch(tmp.path(), "a.svg", 150);
        touch(tmp.path(), "notes.txt", 160);
        touch(tmp.path(), "stale.svg", 10);
        fs::create_dir(tmp.path().join("nested.svg")).unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        touch(&tmp.path().join("sub"), "deep.svg", 170);

        let window = TimeWindow::new(Some(instant(100)), None);
        let selected = select_inputs(&[], &window, tmp.path()).unwrap();
        assert_eq!(selected, vec![first, second]);
    }

    #[test]
    fn empty_selection_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.svg", 10);
        let window = TimeWindow::new(Some(instant(100)), None);
        assert!(select_inputs(&[], &window, tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_candidate_under_window_fails() {
        let tmp = TempDir::new().unwrap();
        let window = TimeWindow::new(Some(instant(100)), None);
        let missing = tmp.path().join("gone.svg");
        assert!(matches!(
            select_inputs(&[missing], &window, tmp.path()),
            Err(SelectionError::Metadata { .. })
        ));
    }

    #[test]
    fn discovery_of_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            discover_svg_files(&tmp.path().join("nope")),
            Err(SelectionError::Discovery { .. })
        ));
    }
}
