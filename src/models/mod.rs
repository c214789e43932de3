// MediScan-IQ Data Models
// Shared result records for anonymization, segmentation, summarization and risk tagging

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

// ============ Risk Labels ============

pub const LOW_RISK: &str = "low risk";
pub const MODERATE_RISK: &str = "moderate risk";
pub const HIGH_RISK: &str = "high risk";

/// Canonical label order used whenever no configured order applies.
pub const DEFAULT_RISK_LABELS: [&str; 3] = [LOW_RISK, MODERATE_RISK, HIGH_RISK];

// ============ Ordered Label Map ============

/// String-keyed map that keeps insertion order.
///
/// Serializes as a JSON object whose keys appear in insertion order, so
/// per-category counts and probability tables render deterministically.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for LabelMap<V> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<V> LabelMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or overwrite. Overwriting keeps the key's original position.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for LabelMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = LabelMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for LabelMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Per-category redaction counts. Categories with zero matches are absent.
pub type PhiCounts = LabelMap<usize>;

/// String diagnostics attached to summarization and risk results.
pub type Meta = LabelMap<String>;

/// Probability per risk label. Values lie in [0, 1] and sum to 1.
pub type RiskDistribution = LabelMap<f64>;

impl LabelMap<usize> {
    pub fn total(&self) -> usize {
        self.values().sum()
    }
}

impl LabelMap<f64> {
    /// Probability for `label`, 0.0 when the label is absent.
    pub fn prob(&self, label: &str) -> f64 {
        self.get(label).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.values().sum()
    }

    /// Label with the highest probability; the first one wins ties.
    pub fn argmax(&self) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for (label, &p) in self.iter() {
            match best {
                Some((_, bp)) if p <= bp => {}
                _ => best = Some((label, p)),
            }
        }
        best.map(|(label, _)| label)
    }

    /// Entries sorted by probability, highest first.
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut out: Vec<(&str, f64)> = self.iter().map(|(k, v)| (k, *v)).collect();
        out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        out
    }
}

// ============ Spans ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanMatch {
    /// UTF-8 byte offset (0-based) into the scanned text.
    pub start: usize,
    /// UTF-8 byte offset (0-based, end-exclusive) into the scanned text.
    pub end: usize,
    /// PHI category for redaction scans, severity for highlight scans.
    pub tag: String,
}

impl SpanMatch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn overlaps(&self, other: &SpanMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Spans sorted by start with no two overlapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NonOverlappingSpans(Vec<SpanMatch>);

impl NonOverlappingSpans {
    /// Greedy interval scheduling: sort by (start asc, length desc) and keep a
    /// span only if it starts at or after the end of the last kept span.
    pub fn resolve(mut spans: Vec<SpanMatch>) -> Self {
        spans.retain(|s| !s.is_empty());
        spans.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.len().cmp(&a.len())));

        let mut kept: Vec<SpanMatch> = Vec::with_capacity(spans.len());
        for span in spans {
            if kept.last().map_or(true, |last| !last.overlaps(&span)) {
                kept.push(span);
            }
        }
        Self(kept)
    }

    pub fn as_slice(&self) -> &[SpanMatch] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpanMatch> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<SpanMatch> {
        self.0
    }
}

// ============ Risk Decision ============

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskDecision {
    pub label: String,
    pub distribution: RiskDistribution,
    /// Which scoring paths contributed, model status, configured labels.
    pub evidence_meta: Meta,
}

// ============ Analysis Result ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub request_id: String,
    pub report_type: String,
    pub summary: String,
    pub risk: RiskDecision,
    pub sentences: Vec<String>,
    pub anonymized_text: String,
    pub phi_counts: PhiCounts,
    pub summarization_meta: Meta,
    pub risk_meta: Meta,
    /// Flattened `phi_*`, `summ_*` and `risk_*` entries.
    pub meta: Meta,
}

// ============ Ingest / Analyze Requests ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub text: String,
    pub report_type: String,
}

pub type AnalyzeRequest = IngestRequest;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub ok: bool,
    pub char_count: usize,
    pub report_type: String,
    pub language: Option<String>,
    pub anonymized: String,
    pub sentences: Vec<String>,
    pub meta: Meta,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub ok: bool,
    pub request_id: String,
    pub report_type: String,
    pub summary: String,
    pub risk_level: String,
    pub risk_probs: RiskDistribution,
    pub sentences: Vec<String>,
    pub anonymized: String,
    pub meta: Meta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize, tag: &str) -> SpanMatch {
        SpanMatch { start, end, tag: tag.to_string() }
    }

    #[test]
    fn test_label_map_keeps_insertion_order() {
        let mut map: PhiCounts = LabelMap::new();
        map.insert("phone", 2);
        map.insert("email", 1);
        map.insert("phone", 3);
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["phone", "email"]);
        assert_eq!(map.get("phone"), Some(&3));
        assert_eq!(map.total(), 4);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"phone":3,"email":1}"#);
    }

    #[test]
    fn test_argmax_first_wins_ties() {
        let dist: RiskDistribution =
            vec![(LOW_RISK, 0.4), (MODERATE_RISK, 0.4), (HIGH_RISK, 0.2)].into_iter().collect();
        assert_eq!(dist.argmax(), Some(LOW_RISK));
        assert_eq!(dist.prob("unknown"), 0.0);
        assert!((dist.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_prefers_longest_at_same_start() {
        let spans = vec![span(0, 4, "moderate"), span(0, 10, "high"), span(5, 12, "moderate"), span(12, 15, "high")];
        let resolved = NonOverlappingSpans::resolve(spans);
        assert_eq!(resolved.as_slice(), &[span(0, 10, "high"), span(12, 15, "high")]);
    }

    #[test]
    fn test_resolve_empty() {
        assert!(NonOverlappingSpans::resolve(vec![]).is_empty());
    }
}
