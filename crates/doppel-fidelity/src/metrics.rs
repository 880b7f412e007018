//! Aggregate counters for a fidelity comparison.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Verdict for one compared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// Every property is identical on both sides.
    ExactMatch,
    /// The resource exists on both sides but at least one property differs.
    Drifted,
    /// Present in the source layer, absent from the target.
    MissingInTarget,
    /// Present in the target layer, absent from the source.
    ExtraInTarget,
    /// Identity could not be resolved on one side, so no verdict is possible.
    Uncomparable,
}

impl Classification {
    /// Wire spelling, as emitted in reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::ExactMatch => "EXACT_MATCH",
            Classification::Drifted => "DRIFTED",
            Classification::MissingInTarget => "MISSING_IN_TARGET",
            Classification::ExtraInTarget => "EXTRA_IN_TARGET",
            Classification::Uncomparable => "UNCOMPARABLE",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Per-classification tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCounts {
    /// Resources identical on both sides.
    pub exact_match: usize,
    /// Resources present on both sides with differing properties.
    pub drifted: usize,
    /// Resources only the source layer has.
    pub missing_in_target: usize,
    /// Resources only the target layer has.
    pub extra_in_target: usize,
    /// Resources whose identity could not be resolved.
    pub uncomparable: usize,
}

impl ClassCounts {
    fn record(&mut self, classification: Classification) {
        match classification {
            Classification::ExactMatch => self.exact_match += 1,
            Classification::Drifted => self.drifted += 1,
            Classification::MissingInTarget => self.missing_in_target += 1,
            Classification::ExtraInTarget => self.extra_in_target += 1,
            Classification::Uncomparable => self.uncomparable += 1,
        }
    }

    /// Resources counted, all classifications included.
    #[must_use]
    pub fn total(&self) -> usize {
        self.exact_match
            + self.drifted
            + self.missing_in_target
            + self.extra_in_target
            + self.uncomparable
    }

    /// Resources with a resolved identity on at least one side.
    ///
    /// Uncomparable entries are excluded from the percentage denominators
    /// so unresolvable identities degrade confidence, not the score.
    #[must_use]
    pub fn comparable(&self) -> usize {
        self.total() - self.uncomparable
    }
}

/// Summary block of a [`FidelityReport`](crate::FidelityReport).
///
/// Insertion order of `per_type` follows first sighting during the
/// comparison, which keeps related resource types adjacent in output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FidelityMetrics {
    /// Overall tallies across every compared resource.
    pub counts: ClassCounts,
    /// `exact_match / comparable`, as a percentage. 100.0 when nothing
    /// was comparable.
    pub fidelity_percent: f64,
    /// `drifted / comparable`, as a percentage. 0.0 when nothing was
    /// comparable.
    pub drift_percent: f64,
    /// Tallies broken down by resource type.
    pub per_type: IndexMap<String, ClassCounts>,
}

impl FidelityMetrics {
    pub(crate) fn record(&mut self, resource_type: &str, classification: Classification) {
        self.counts.record(classification);
        self.per_type
            .entry(resource_type.to_owned())
            .or_default()
            .record(classification);
    }

    /// Recompute the percentage fields from the counters.
    pub(crate) fn finalize(&mut self) {
        let comparable = self.counts.comparable();
        if comparable == 0 {
            self.fidelity_percent = 100.0;
            self.drift_percent = 0.0;
            return;
        }
        let denom = comparable as f64;
        self.fidelity_percent = self.counts.exact_match as f64 / denom * 100.0;
        self.drift_percent = self.counts.drifted as f64 / denom * 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_exclude_uncomparable_entries() {
        let mut metrics = FidelityMetrics::default();
        metrics.record("Microsoft.Compute/virtualMachines", Classification::ExactMatch);
        metrics.record("Microsoft.Compute/virtualMachines", Classification::ExactMatch);
        metrics.record("Microsoft.Network/virtualNetworks", Classification::Drifted);
        metrics.record("Microsoft.Storage/storageAccounts", Classification::MissingInTarget);
        metrics.record("Microsoft.Storage/storageAccounts", Classification::Uncomparable);
        metrics.finalize();

        assert_eq!(metrics.counts.total(), 5);
        assert_eq!(metrics.counts.comparable(), 4);
        assert!((metrics.fidelity_percent - 50.0).abs() < f64::EPSILON);
        assert!((metrics.drift_percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_comparison_reads_as_full_fidelity() {
        let mut metrics = FidelityMetrics::default();
        metrics.finalize();
        assert!((metrics.fidelity_percent - 100.0).abs() < f64::EPSILON);
        assert!((metrics.drift_percent - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn per_type_breakdown_tracks_each_type_separately() {
        let mut metrics = FidelityMetrics::default();
        metrics.record("Microsoft.Compute/virtualMachines", Classification::ExactMatch);
        metrics.record("Microsoft.Network/virtualNetworks", Classification::ExtraInTarget);
        metrics.record("Microsoft.Network/virtualNetworks", Classification::Drifted);

        let vnets = &metrics.per_type["Microsoft.Network/virtualNetworks"];
        assert_eq!(vnets.extra_in_target, 1);
        assert_eq!(vnets.drifted, 1);
        assert_eq!(vnets.exact_match, 0);
        assert_eq!(
            metrics.per_type["Microsoft.Compute/virtualMachines"].exact_match,
            1
        );
    }

    #[test]
    fn classification_serializes_to_screaming_snake_case() {
        let wire = serde_json::to_value(Classification::MissingInTarget).unwrap();
        assert_eq!(wire, serde_json::json!("MISSING_IN_TARGET"));
        assert_eq!(Classification::ExactMatch.to_string(), "EXACT_MATCH");
    }
}
