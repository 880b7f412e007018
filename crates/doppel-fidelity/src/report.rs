//! Rendering a [`FidelityReport`] for people and for machines.

use std::fmt::Write as _;

use serde_json::Value;

use crate::compare::FidelityReport;
use crate::error::FidelityError;
use crate::metrics::{ClassCounts, Classification};

impl FidelityReport {
    /// Pretty-printed JSON document, values already redacted.
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::Malformed`] if serialization fails.
    pub fn to_json(&self) -> Result<String, FidelityError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text rendering for terminals and logs.
    #[must_use]
    pub fn render_console(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "fidelity report  {} -> {}",
            self.source.layer, self.target.layer
        );
        let _ = writeln!(out, "generated        {}", self.generated_at.to_rfc3339());
        let _ = writeln!(out, "redaction        {}", self.redaction);
        if self.degraded {
            let _ = writeln!(out, "confidence       degraded (heuristic identity in use)");
        }

        let counts = &self.summary.counts;
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "resources        {} total, {} comparable",
            counts.total(),
            counts.comparable()
        );
        let _ = writeln!(out, "  exact match    {}", counts.exact_match);
        let _ = writeln!(out, "  drifted        {}", counts.drifted);
        let _ = writeln!(out, "  missing        {}", counts.missing_in_target);
        let _ = writeln!(out, "  extra          {}", counts.extra_in_target);
        let _ = writeln!(out, "  uncomparable   {}", counts.uncomparable);
        let _ = writeln!(out, "fidelity         {:.2}%", self.summary.fidelity_percent);
        let _ = writeln!(out, "drift            {:.2}%", self.summary.drift_percent);

        if !self.summary.per_type.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "by type");
            for (resource_type, tallies) in &self.summary.per_type {
                let _ = writeln!(out, "  {:<44} {}", resource_type, tally_line(tallies));
            }
        }

        let findings: Vec<_> = self
            .resources
            .iter()
            .filter(|entry| entry.classification != Classification::ExactMatch)
            .collect();
        if !findings.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "findings");
            for entry in findings {
                let _ = writeln!(out, "  {:<18} {}", entry.classification, entry.id);
                for diff in &entry.properties {
                    let _ = writeln!(
                        out,
                        "    {:<24} {} -> {}",
                        diff.name,
                        display_value(diff.source_value.as_ref()),
                        display_value(diff.target_value.as_ref())
                    );
                }
            }
        }
        out
    }
}

fn tally_line(counts: &ClassCounts) -> String {
    let mut parts = Vec::new();
    if counts.exact_match > 0 {
        parts.push(format!("exact {}", counts.exact_match));
    }
    if counts.drifted > 0 {
        parts.push(format!("drifted {}", counts.drifted));
    }
    if counts.missing_in_target > 0 {
        parts.push(format!("missing {}", counts.missing_in_target));
    }
    if counts.extra_in_target > 0 {
        parts.push(format!("extra {}", counts.extra_in_target));
    }
    if counts.uncomparable > 0 {
        parts.push(format!("uncomparable {}", counts.uncomparable));
    }
    parts.join("  ")
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "absent".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{LayerSelector, MatchBasis, PropertyDiff, ResourceEntry};
    use crate::metrics::FidelityMetrics;
    use crate::redaction::RedactionLevel;
    use chrono::Utc;
    use doppel_graph::TenantId;
    use serde_json::json;

    fn sample_report() -> FidelityReport {
        let tenant = TenantId::new();
        let mut summary = FidelityMetrics::default();
        summary.record("Microsoft.Compute/virtualMachines", Classification::ExactMatch);
        summary.record("Microsoft.Compute/virtualMachines", Classification::Drifted);
        summary.finalize();
        FidelityReport {
            generated_at: Utc::now(),
            source: LayerSelector::original(tenant, "baseline".parse().unwrap()),
            target: LayerSelector::original(tenant, "restored".parse().unwrap()),
            redaction: RedactionLevel::Full,
            degraded: false,
            summary,
            resources: vec![
                ResourceEntry {
                    id: "/s/rg/vm-1".to_owned(),
                    resource_type: "Microsoft.Compute/virtualMachines".to_owned(),
                    classification: Classification::ExactMatch,
                    matched_by: Some(MatchBasis::Provenance),
                    properties: Vec::new(),
                },
                ResourceEntry {
                    id: "/s/rg/vm-2".to_owned(),
                    resource_type: "Microsoft.Compute/virtualMachines".to_owned(),
                    classification: Classification::Drifted,
                    matched_by: Some(MatchBasis::Provenance),
                    properties: vec![PropertyDiff {
                        name: "adminPassword".to_owned(),
                        source_value: Some(json!("[REDACTED]")),
                        target_value: Some(json!("[REDACTED]")),
                        sensitive: true,
                        redacted: true,
                    }],
                },
            ],
        }
    }

    #[test]
    fn console_rendering_lists_summary_and_findings() {
        let text = sample_report().render_console();
        assert!(text.contains("fidelity report  baseline -> restored"));
        assert!(text.contains("exact match    1"));
        assert!(text.contains("fidelity         50.00%"));
        assert!(text.contains("DRIFTED            /s/rg/vm-2"));
        assert!(text.contains("adminPassword"));
        // the clean resource never shows up as a finding
        assert!(!text.contains("/s/rg/vm-1"));
    }

    #[test]
    fn json_rendering_uses_the_documented_field_names() {
        let json = sample_report().to_json().unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["summary"]["counts"]["exactMatch"], json!(1));
        assert_eq!(doc["resources"][1]["classification"], json!("DRIFTED"));
        let diff = &doc["resources"][1]["properties"][0];
        assert_eq!(diff["sourceValue"], json!("[REDACTED]"));
        assert_eq!(diff["sensitive"], json!(true));
        assert_eq!(diff["redacted"], json!(true));
    }

    #[test]
    fn degraded_reports_carry_a_confidence_banner() {
        let mut report = sample_report();
        report.degraded = true;
        assert!(report.render_console().contains("confidence       degraded"));
    }
}
