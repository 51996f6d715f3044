//! Profile egress - writes profile records and clearance reports to file
//!
//! Records are written in JSONL format (one JSON object per line) to the
//! records file specified in config. Reports are written as pretty JSON, one
//! file per profile, into the reports directory.

use crate::domain::record::ProfileRecord;
use crate::services::profile::Profile;
use crate::services::report::ProfileReport;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Egress writer for profiles
#[derive(Debug, Clone)]
pub struct Egress {
    records_file: String,
    reports_dir: String,
}

impl Egress {
    pub fn new(records_file: &str, reports_dir: &str) -> Self {
        info!(records_file = %records_file, reports_dir = %reports_dir, "egress_initialized");
        Self { records_file: records_file.to_string(), reports_dir: reports_dir.to_string() }
    }

    /// Append a profile record to the records file
    /// Returns true if successful, false otherwise
    pub fn write_record(&self, record: &ProfileRecord) -> bool {
        let result = serde_json::to_string(record)
            .map_err(std::io::Error::from)
            .and_then(|json| self.append_line(&json));

        match result {
            Ok(()) => {
                info!(
                    profile_id = %record.id,
                    line = %record.identity.line,
                    stationing = %record.identity.stationing,
                    "record_egressed"
                );
                true
            }
            Err(e) => {
                error!(profile_id = %record.id, error = %e, "record_egress_failed");
                false
            }
        }
    }

    /// Write a report to `<reports_dir>/<profile id>.json`
    /// Returns true if successful, false otherwise
    pub fn write_report(&self, report: &ProfileReport) -> bool {
        let path = self.report_path(&report.id);
        let result = serde_json::to_string_pretty(report)
            .map_err(std::io::Error::from)
            .and_then(|json| {
                ensure_parent(&path)?;
                std::fs::write(&path, json)
            });

        match result {
            Ok(()) => {
                info!(
                    profile_id = %report.id,
                    path = %path.display(),
                    violation = %report.has_violation(),
                    "report_written"
                );
                true
            }
            Err(e) => {
                error!(profile_id = %report.id, error = %e, "report_write_failed");
                false
            }
        }
    }

    /// Write record and report, clearing the unsaved-changes flag on success
    pub fn save(&self, profile: &mut Profile, gauge_in: f64) -> bool {
        let report = profile.report(gauge_in);
        let saved = self.write_record(&profile.to_record()) && self.write_report(&report);
        if saved {
            profile.mark_saved();
        }
        saved
    }

    pub fn report_path(&self, profile_id: &str) -> PathBuf {
        Path::new(&self.reports_dir).join(format!("{}.json", profile_id))
    }

    /// Append a line to the records file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.records_file);
        ensure_parent(path)?;

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(file, "{}", line)?;
        debug!(file = %self.records_file, bytes = %line.len(), "egress_written");

        Ok(())
    }
}

/// Create parent directories if they don't exist
fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Read every record from a JSONL records file
pub fn read_records(path: &Path) -> anyhow::Result<Vec<ProfileRecord>> {
    use anyhow::Context;

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| {
                format!("Invalid record on line {} of {}", index + 1, path.display())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::ProfileIdentity;
    use crate::domain::types::{DivisionId, EnvelopePoint, ProfileKind, TRACK_GAUGE_IN};
    use crate::services::envelope::EnvelopeStore;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn profile() -> Profile {
        let points = [(-10.0, 0.0), (-10.0, 20.0), (10.0, 20.0), (10.0, 0.0)]
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| EnvelopePoint { id: i as i64, x, y, division: DivisionId::A })
            .collect::<Vec<_>>();
        let mut profile = Profile::new(
            ProfileIdentity::new("Red Line", "2", "1204+50", ProfileKind::Verification),
            Arc::new(EnvelopeStore::from_points(points)),
        );
        profile.set_division(DivisionId::A);
        profile.append_scan_point(30.0, 5.0);
        profile
    }

    #[test]
    fn test_egress_new() {
        let egress = Egress::new("test.jsonl", "reports");
        assert_eq!(egress.records_file, "test.jsonl");
        assert_eq!(egress.report_path("abc"), Path::new("reports").join("abc.json"));
    }

    #[test]
    fn test_write_record() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("profiles.jsonl");
        let egress = Egress::new(file_path.to_str().unwrap(), "unused");

        let record = profile().to_record();
        assert!(egress.write_record(&record));

        let content = fs::read_to_string(&file_path).unwrap();
        assert!(content.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["id"], record.id);
        assert_eq!(parsed["scan_points"], "30|5");
    }

    #[test]
    fn test_append_mode_and_read_back() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nested").join("profiles.jsonl");
        let egress = Egress::new(file_path.to_str().unwrap(), "unused");

        let first = profile().to_record();
        let second = profile().to_record();
        egress.write_record(&first);
        egress.write_record(&second);

        let records = read_records(&file_path).unwrap();
        assert_eq!(records, vec![first, second]);
    }

    #[test]
    fn test_read_records_names_bad_line() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("profiles.jsonl");
        fs::write(&file_path, "{\"broken\":\n").unwrap();
        let err = read_records(&file_path).unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }

    #[test]
    fn test_save_writes_both_and_marks_saved() {
        let dir = tempdir().unwrap();
        let records = dir.path().join("profiles.jsonl");
        let reports = dir.path().join("reports");
        let egress = Egress::new(records.to_str().unwrap(), reports.to_str().unwrap());

        let mut profile = profile();
        assert!(profile.changes_made());
        assert!(egress.save(&mut profile, TRACK_GAUGE_IN));
        assert!(!profile.changes_made());

        let report = fs::read_to_string(egress.report_path(profile.id())).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(parsed["summary"]["evaluated"], 1);
        assert_eq!(parsed["points"][0]["horizontal_clearance"], 20.0);
        assert!(parsed["points"][0]["vertical_clearance"].is_null());
    }
}
