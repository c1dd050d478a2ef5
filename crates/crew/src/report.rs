//! Report sections and artifact persistence

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::info;

use motorcrew_config::safe_filename;

/// The report artifact could not be written. The run's text result stands.
#[derive(Error, Debug)]
#[error("◆ PERSISTENCE ERROR: {}: {source}", .path.display())]
pub struct PersistenceError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Sections a final report is expected to carry, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSection {
    ExecutiveSummary,
    Specifications,
    PricingAnalysis,
    MaintenanceInformation,
    PerformanceMetrics,
}

impl ReportSection {
    pub const ALL: [ReportSection; 5] = [
        Self::ExecutiveSummary,
        Self::Specifications,
        Self::PricingAnalysis,
        Self::MaintenanceInformation,
        Self::PerformanceMetrics,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "Executive Summary",
            Self::Specifications => "Specifications",
            Self::PricingAnalysis => "Pricing Analysis",
            Self::MaintenanceInformation => "Maintenance Information",
            Self::PerformanceMetrics => "Performance Metrics",
        }
    }
}

impl fmt::Display for ReportSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.heading())
    }
}

/// Sections whose heading does not appear anywhere in `text` (case-insensitive)
pub fn missing_sections(text: &str) -> Vec<ReportSection> {
    let haystack = text.to_lowercase();
    ReportSection::ALL
        .into_iter()
        .filter(|s| !haystack.contains(&s.heading().to_lowercase()))
        .collect()
}

/// `"<subject>_report.md"`, made safe for the filesystem
pub fn artifact_name(subject: &str) -> String {
    safe_filename(&format!("{}_report.md", subject))
}

/// Size and modification time of a file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

/// Stamp of `path`, `None` when nothing is there
pub async fn stamp(path: &Path) -> Option<FileStamp> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some(FileStamp {
        len: meta.len(),
        modified: meta.modified().ok(),
    })
}

/// Write `text` to `dir/name` in one scoped write
pub async fn persist(dir: &Path, name: &str, text: &str) -> Result<PathBuf, PersistenceError> {
    let path = dir.join(name);
    let wrap = |source| PersistenceError {
        path: path.clone(),
        source,
    };

    {
        let mut file = tokio::fs::File::create(&path).await.map_err(wrap)?;
        file.write_all(text.as_bytes()).await.map_err(wrap)?;
        file.flush().await.map_err(wrap)?;
    }

    info!("◆ REPORT SAVED: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_name() {
        assert_eq!(artifact_name("Tesla Model 3"), "Tesla Model 3_report.md");
        assert_eq!(artifact_name("AC/DC Racer"), "AC_DC Racer_report.md");
    }

    #[test]
    fn test_missing_sections() {
        let full = "# Executive Summary\n## Specifications\n## Pricing analysis\n\
                    ## Maintenance Information\n## Performance Metrics";
        assert!(missing_sections(full).is_empty());

        let partial = "# Executive Summary\n## Specifications";
        assert_eq!(
            missing_sections(partial),
            vec![
                ReportSection::PricingAnalysis,
                ReportSection::MaintenanceInformation,
                ReportSection::PerformanceMetrics
            ]
        );
    }

    #[tokio::test]
    async fn test_persist_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = persist(dir.path(), "Toyota Camry_report.md", "# Report")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("Toyota Camry_report.md"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Report");
    }

    #[tokio::test]
    async fn test_stamp_tracks_rewrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.md");
        assert!(stamp(&path).await.is_none());

        std::fs::write(&path, "draft").unwrap();
        let first = stamp(&path).await.unwrap();
        assert_eq!(stamp(&path).await, Some(first));

        std::fs::write(&path, "final report").unwrap();
        assert_ne!(stamp(&path).await, Some(first));
    }

    #[tokio::test]
    async fn test_persist_missing_dir_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = persist(&missing, "r.md", "x").await.unwrap_err();
        assert_eq!(err.path, missing.join("r.md"));
        assert!(err.to_string().starts_with("◆ PERSISTENCE ERROR"));
    }
}
