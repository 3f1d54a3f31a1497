//! Backend response types: model registry and inference results
//!
//! The backend is permissive about optional fields, so everything here
//! defaults rather than failing deserialization. Score extraction copes
//! with each organ pipeline's own response shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::region::{Organ, RegionId};
use crate::score::ScoreMap;

/// One scored region as reported by the brain pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopRegion {
    #[serde(default)]
    pub label_id: Option<i64>,
    #[serde(default)]
    pub label_name: Option<String>,
    #[serde(default)]
    pub score: Value,
}

/// Explainability payload attached to a brain inference result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XaiPayload {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub top_regions: Vec<TopRegion>,
}

/// A complete inference response. Brain and heart pipelines fill different
/// subsets of these fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceResult {
    #[serde(default)]
    pub prediction: Option<String>,
    /// Class name to probability. Captured as a raw value so a malformed
    /// entry never rejects the whole response.
    #[serde(default)]
    pub proba: Value,
    #[serde(default)]
    pub icv_mm3: Option<f64>,
    #[serde(default)]
    pub used_features: Vec<String>,
    #[serde(default)]
    pub top_regions: Vec<TopRegion>,
    #[serde(default)]
    pub xai: Option<XaiPayload>,
    #[serde(default)]
    pub segment_scores: BTreeMap<String, Value>,
}

impl InferenceResult {
    /// Class probabilities sorted by descending probability, with non-map
    /// payloads and non-numeric entries dropped.
    pub fn class_probabilities(&self) -> Vec<(String, f64)> {
        let Some(map) = self.proba.as_object() else {
            return Vec::new();
        };
        let mut classes: Vec<(String, f64)> = map
            .iter()
            .filter_map(|(class, value)| Some((class.clone(), value.as_f64()?)))
            .collect();
        classes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        classes
    }

    /// Probability the backend assigned to its own prediction. Tolerates
    /// older responses that report a bare number instead of a map.
    pub fn predicted_probability(&self) -> Option<f64> {
        if let Some(scalar) = self.proba.as_f64() {
            return Some(scalar);
        }
        let prediction = self.prediction.as_deref()?;
        self.proba.as_object()?.get(prediction)?.as_f64()
    }

    /// Extracts region scores for the given organ.
    ///
    /// Brain results prefer the explainability region list and fall back to
    /// the plain feature importances; heart results carry a flat map of
    /// segment id to score. Entries with missing ids or non-numeric scores
    /// are skipped.
    pub fn score_map(&self, organ: Organ) -> ScoreMap {
        match organ {
            Organ::Brain => {
                let regions = match &self.xai {
                    Some(xai) if !xai.top_regions.is_empty() => &xai.top_regions,
                    _ => &self.top_regions,
                };
                regions
                    .iter()
                    .filter_map(|region| {
                        let id = region.label_id.and_then(|id| u32::try_from(id).ok())?;
                        let score = region.score.as_f64()?;
                        Some((RegionId(id), score))
                    })
                    .collect()
            }
            Organ::Heart => self
                .segment_scores
                .iter()
                .filter_map(|(key, value)| {
                    let id = RegionId::parse(key)?;
                    let score = value.as_f64()?;
                    Some((id, score))
                })
                .collect(),
        }
    }
}

/// Diseases the backend can assess for one organ.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganModels {
    pub organ: String,
    #[serde(default)]
    pub diseases: Vec<String>,
}

/// The `/registry` response listing available organ and disease models.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub organs: Vec<OrganModels>,
}

impl Registry {
    /// The built-in registry used when the backend is unreachable, so the
    /// viewer stays usable offline.
    pub fn fallback() -> Self {
        Registry {
            organs: vec![
                OrganModels {
                    organ: "brain".to_string(),
                    diseases: vec!["alzheimer".to_string()],
                },
                OrganModels {
                    organ: "heart".to_string(),
                    diseases: vec!["cardiomyopathy".to_string()],
                },
            ],
        }
    }

    pub fn diseases_for(&self, organ: Organ) -> &[String] {
        self.organs
            .iter()
            .find(|models| Organ::from_str_loose(&models.organ) == Some(organ))
            .map(|models| models.diseases.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brain_result_prefers_xai_regions() {
        let text = r#"{
            "prediction": "AD",
            "proba": {"AD": 0.82, "CN": 0.18},
            "icv_mm3": 1400000.0,
            "top_regions": [{"label_id": 1, "label_name": "Hippocampus L", "score": 0.1}],
            "xai": {
                "method": "shap",
                "top_regions": [
                    {"label_id": 2, "label_name": "Hippocampus R", "score": 0.7},
                    {"label_id": 3, "score": 0.4}
                ]
            }
        }"#;
        let result: InferenceResult = serde_json::from_str(text).unwrap();
        let scores = result.score_map(Organ::Brain);
        assert_eq!(scores.get(RegionId(2)), Some(0.7));
        assert_eq!(scores.get(RegionId(3)), Some(0.4));
        assert_eq!(scores.get(RegionId(1)), None);
    }

    #[test]
    fn brain_result_falls_back_to_top_regions() {
        let text = r#"{
            "prediction": "CN",
            "top_regions": [
                {"label_id": 4, "label_name": "Amygdala L", "score": 0.3},
                {"label_name": "no id", "score": 0.9},
                {"label_id": 5, "score": "not a number"}
            ]
        }"#;
        let result: InferenceResult = serde_json::from_str(text).unwrap();
        let scores = result.score_map(Organ::Brain);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.get(RegionId(4)), Some(0.3));
    }

    #[test]
    fn heart_result_reads_segment_scores() {
        let text = r#"{
            "prediction": "HCM",
            "segment_scores": {"1": 0.9, "16": 0.2, "apex": 0.5, "3": null}
        }"#;
        let result: InferenceResult = serde_json::from_str(text).unwrap();
        let scores = result.score_map(Organ::Heart);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores.get(RegionId(1)), Some(0.9));
        assert_eq!(scores.get(RegionId(16)), Some(0.2));
    }

    #[test]
    fn proba_map_deserializes_and_ranks() {
        let text = r#"{"prediction": "AD", "proba": {"CN": 0.18, "AD": 0.82}}"#;
        let result: InferenceResult = serde_json::from_str(text).unwrap();
        assert_eq!(
            result.class_probabilities(),
            vec![("AD".to_string(), 0.82), ("CN".to_string(), 0.18)]
        );
        assert_eq!(result.predicted_probability(), Some(0.82));
    }

    #[test]
    fn scalar_proba_still_tolerated() {
        let text = r#"{"prediction": "HCM", "proba": 0.91}"#;
        let result: InferenceResult = serde_json::from_str(text).unwrap();
        assert!(result.class_probabilities().is_empty());
        assert_eq!(result.predicted_probability(), Some(0.91));
    }

    #[test]
    fn minimal_response_deserializes() {
        let result: InferenceResult = serde_json::from_str("{}").unwrap();
        assert!(result.prediction.is_none());
        assert!(result.score_map(Organ::Brain).is_empty());
        assert!(result.score_map(Organ::Heart).is_empty());
    }

    #[test]
    fn registry_fallback_and_lookup() {
        let registry = Registry::fallback();
        assert_eq!(registry.diseases_for(Organ::Brain), &["alzheimer".to_string()]);
        assert_eq!(
            registry.diseases_for(Organ::Heart),
            &["cardiomyopathy".to_string()]
        );
    }

    #[test]
    fn registry_parses_backend_shape() {
        let text = r#"{"organs": [{"organ": "Brain", "diseases": ["alzheimer", "parkinson"]}]}"#;
        let registry: Registry = serde_json::from_str(text).unwrap();
        assert_eq!(registry.diseases_for(Organ::Brain).len(), 2);
        assert!(registry.diseases_for(Organ::Heart).is_empty());
    }
}
