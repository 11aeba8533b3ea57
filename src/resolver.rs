//! Expansion of file-name templates into concrete file lists

use crate::errors::{OceanClimoError, Result};
use log::debug;
use std::path::PathBuf;

/// Expand every glob template and concatenate the matches
///
/// Matches are sorted within each template (date-coded names sort
/// chronologically) and templates keep their given order.
///
/// # Errors
///
/// Returns [`OceanClimoError::NoFilesFound`] naming every template when the
/// combined list is empty, or [`OceanClimoError::Pattern`] for a malformed template.
pub fn resolve_files<S: AsRef<str>>(templates: &[S]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for template in templates {
        let template = template.as_ref();
        debug!("glob file search: {template}");
        let mut matches: Vec<PathBuf> = glob::glob(template)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!("skipping unreadable glob entry: {e}");
                    None
                }
            })
            .collect();
        matches.sort();
        files.extend(matches);
    }

    if files.is_empty() {
        return Err(OceanClimoError::NoFilesFound {
            patterns: templates.iter().map(|t| t.as_ref().to_string()).collect(),
        });
    }

    debug!("Resolved {} files", files.len());
    for (n, file) in files.iter().enumerate() {
        debug!("{}: {}", n + 1, file.display());
    }
    Ok(files)
}

/// Check that every concrete path exists
///
/// Unlike glob templates, a missing concrete file cannot be skipped: later
/// files would shift into its time slot.
///
/// # Errors
///
/// [`OceanClimoError::NoFilesFound`] naming every missing path.
pub fn require_files(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let missing: Vec<String> = paths
        .iter()
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(OceanClimoError::NoFilesFound { patterns: missing });
    }
    debug!("Found all {} files", paths.len());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_monthly_history_files_sorted() {
        let dir = tempdir().unwrap();
        // create out of order so sorting is observable
        for month in [7, 3, 12, 1, 10, 5, 2, 11, 4, 9, 6, 8] {
            File::create(dir.path().join(format!("g.e21.pop.h.1990-{month:02}.nc"))).unwrap();
        }
        File::create(dir.path().join("g.e21.pop.h.1991-01.nc")).unwrap();

        let template = format!("{}/g.e21.pop.h.1990-*.nc", dir.path().display());
        let files = resolve_files(&[template]).unwrap();

        assert_eq!(files.len(), 12);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let expected: Vec<String> = (1..=12)
            .map(|m| format!("g.e21.pop.h.1990-{m:02}.nc"))
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_template_order_is_kept() {
        let dir = tempdir().unwrap();
        for name in ["b.2000.nc", "a.1990.nc"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let templates = [
            format!("{}/b.*.nc", dir.path().display()),
            format!("{}/a.*.nc", dir.path().display()),
        ];
        let files = resolve_files(&templates).unwrap();
        assert!(files[0].ends_with("b.2000.nc"));
        assert!(files[1].ends_with("a.1990.nc"));
    }

    #[test]
    fn test_empty_match_names_pattern() {
        let dir = tempdir().unwrap();
        let template = format!("{}/missing.*.nc", dir.path().display());
        let err = resolve_files(&[template.clone()]).unwrap_err();
        match err {
            OceanClimoError::NoFilesFound { patterns } => assert_eq!(patterns, vec![template]),
            other => panic!("Expected NoFilesFound, got {other:?}"),
        }
    }

    #[test]
    fn test_every_concrete_file_required() {
        let dir = tempdir().unwrap();
        let paths: Vec<PathBuf> = (1..=3)
            .map(|m| dir.path().join(format!("woa13_all_n{m:02}_01.nc")))
            .collect();
        for path in [&paths[0], &paths[2]] {
            File::create(path).unwrap();
        }

        let err = require_files(paths.clone()).unwrap_err();
        match err {
            OceanClimoError::NoFilesFound { patterns } => {
                assert_eq!(patterns, vec![paths[1].display().to_string()]);
            }
            other => panic!("Expected NoFilesFound, got {other:?}"),
        }

        File::create(&paths[1]).unwrap();
        assert_eq!(require_files(paths.clone()).unwrap(), paths);
    }
}
