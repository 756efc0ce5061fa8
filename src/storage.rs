//! Storage-medium selection and session path naming.

use std::path::{Path, PathBuf};

/// Prefer the removable drive while it is mounted, otherwise fall back to
/// the on-device directory.
pub fn select_output_dir(removable: &Path, fallback: &Path) -> PathBuf {
    if removable.exists() {
        removable.to_path_buf()
    } else {
        fallback.to_path_buf()
    }
}

/// Filesystem-safe session stem derived from the RTC's formatted timestamp
/// (spaces and colons are not valid on FAT-formatted media).
pub fn session_file_stem(rtc_timestamp: &str) -> String {
    rtc_timestamp.replace(' ', "_").replace(':', "-")
}

#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub log: PathBuf,
    pub video: PathBuf,
    pub summary: PathBuf,
}

impl SessionPaths {
    pub fn new(dir: &Path, rtc_timestamp: &str) -> Self {
        let stem = session_file_stem(rtc_timestamp);
        Self {
            log: dir.join(format!("{stem}.log")),
            video: dir.join(format!("{stem}.mp4")),
            summary: dir.join(format!("{stem}.json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_is_filesystem_safe() {
        let stem = session_file_stem("2026-08-07 12:34:56");
        assert_eq!(stem, "2026-08-07_12-34-56");
        assert!(!stem.contains(' '));
        assert!(!stem.contains(':'));
    }

    #[test]
    fn test_removable_preferred_when_present() {
        let fallback = std::env::temp_dir();
        let missing = PathBuf::from("/definitely/not/mounted");
        assert_eq!(select_output_dir(&missing, &fallback), fallback);
        assert_eq!(select_output_dir(&fallback, &missing), fallback);
    }

    #[test]
    fn test_session_paths_share_a_stem() {
        let paths = SessionPaths::new(Path::new("/data"), "2026-08-07 12:00:00");
        assert_eq!(paths.log.extension().unwrap(), "log");
        assert_eq!(paths.video.extension().unwrap(), "mp4");
        assert_eq!(paths.summary.extension().unwrap(), "json");
        assert_eq!(
            paths.log.file_stem().unwrap(),
            paths.video.file_stem().unwrap()
        );
    }
}
