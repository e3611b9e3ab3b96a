//! JSON output
//!
//! Lossless encoding of the whole report. This is the format other tools
//! (and the `render`/`summary` commands) load back.

use anyhow::{Context, Result};
use gpumon_shared::{SessionReport, SCHEMA_VERSION};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Encode a report as pretty-printed JSON
pub fn render_json(report: &SessionReport) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(report)?;
    out.push('\n');
    Ok(out)
}

/// Decode a report, checking its schema version and record invariants
pub fn parse_report(contents: &str) -> Result<SessionReport> {
    let report: SessionReport =
        serde_json::from_str(contents).context("Failed to parse report JSON")?;

    if report.schema_version != SCHEMA_VERSION {
        anyhow::bail!(
            "Unsupported report schema version {} (expected {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }

    let mut ids = HashSet::new();
    for record in &report.records {
        record.validate()?;
        if !ids.insert(record.id.as_str()) {
            anyhow::bail!("Duplicate record id in report: {}", record.id);
        }
    }

    for id in &report.top_consumers {
        if !ids.contains(id.as_str()) {
            anyhow::bail!("Top consumer {} is not among the report's records", id);
        }
    }

    Ok(report)
}

/// Read a JSON report from disk
pub fn load_report(path: &Path) -> Result<SessionReport> {
    info!("Loading report: {}", path.display());

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report file: {}", path.display()))?;

    parse_report(&contents).with_context(|| format!("Invalid report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::fixtures::two_unit_session;
    use crate::aggregate::{finalize, FinalizeOptions};

    #[test]
    fn test_round_trip_records() {
        let report = finalize(two_unit_session(), &FinalizeOptions::default()).unwrap();
        let json = render_json(&report).unwrap();

        let decoded = parse_report(&json).unwrap();
        assert_eq!(decoded.records, report.records);
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_encodes_every_field() {
        let report = finalize(two_unit_session(), &FinalizeOptions::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&render_json(&report).unwrap()).unwrap();

        assert_eq!(value["schema_version"], SCHEMA_VERSION);
        assert_eq!(value["device"]["name"], "Simulated GPU");
        assert_eq!(value["summary"]["count"], 2);
        assert_eq!(value["top_consumers"][0], "tests/test_model.py::test_b");

        let record = &value["records"][0];
        for field in [
            "id",
            "status",
            "monitored",
            "initial_allocated",
            "final_allocated",
            "peak_allocated",
            "memory_increase",
            "peak_reserved",
            "duration_seconds",
        ] {
            assert!(!record[field].is_null(), "missing field {}", field);
        }
        assert_eq!(record["status"], "PASSED");
    }

    #[test]
    fn test_rejects_unknown_schema() {
        let report = finalize(two_unit_session(), &FinalizeOptions::default()).unwrap();
        let mut value = serde_json::to_value(&report).unwrap();
        value["schema_version"] = serde_json::json!(99);

        let err = parse_report(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("schema version"));
    }

    #[test]
    fn test_rejects_inconsistent_record() {
        let report = finalize(two_unit_session(), &FinalizeOptions::default()).unwrap();
        let mut value = serde_json::to_value(&report).unwrap();
        value["records"][0]["memory_increase"] = serde_json::json!(1);

        assert!(parse_report(&value.to_string()).is_err());
    }

    #[test]
    fn test_rejects_dangling_top_consumer() {
        let report = finalize(two_unit_session(), &FinalizeOptions::default()).unwrap();
        let mut value = serde_json::to_value(&report).unwrap();
        value["top_consumers"][0] = serde_json::json!("missing");

        assert!(parse_report(&value.to_string()).is_err());
    }

    #[test]
    fn test_load_report_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_report(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read report file"));
    }
}
