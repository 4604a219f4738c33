//! Results aggregation: validated prediction records → [`ConversionResult`]s.
//!
//! Pure and synchronous. The many per-atom confidences of a record collapse
//! into one percentage (arithmetic mean, rounded); no atoms means no
//! confidence, never zero.

use crate::config::join_url;
use crate::error::ValidationError;
use crate::payload::{PredictionRecord, RawPrediction};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Confidence below which a recognised structure is flagged for review.
pub const WARNING_THRESHOLD: u8 = 85;

/// Notation of the primary structure string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StructureFormat {
    Smiles,
    Selfies,
    Sdf,
}

/// Outcome classification shown next to each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Warning,
    Error,
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// Derived from the file name; unique within one aggregated batch.
    pub id: String,
    pub file_name: String,
    pub image_url: String,
    pub smiles: String,
    pub selfies: String,
    /// 0–100, absent when the service reported no atom confidences.
    pub confidence: Option<u8>,
    pub format: StructureFormat,
    pub status: ResultStatus,
    /// Seconds, one decimal place.
    pub processing_time: f64,
}

/// Mean of per-atom confidences as a rounded percentage.
///
/// `[0.80, 0.90, 1.00]` → `90`; `[]` → `None`.
pub fn mean_confidence(confidences: &[f64]) -> Option<u8> {
    if confidences.is_empty() {
        return None;
    }
    let sum: f64 = confidences.iter().map(|c| c * 100.0).sum();
    let mean = sum / confidences.len() as f64;
    Some(mean.round().clamp(0.0, 100.0) as u8)
}

fn classify(smiles: &str, confidence: Option<u8>) -> ResultStatus {
    if smiles.is_empty() {
        ResultStatus::Error
    } else if matches!(confidence, Some(c) if c < WARNING_THRESHOLD) {
        ResultStatus::Warning
    } else {
        ResultStatus::Success
    }
}

fn round_tenth(secs: f64) -> f64 {
    (secs * 10.0).round() / 10.0
}

/// Build the result table for one prediction response.
///
/// Records keep their order. A file name seen again in the same batch gets
/// an id suffixed with its occurrence number (`a.png`, `a.png#2`, …).
pub fn aggregate(records: Vec<PredictionRecord>, image_base: &Url) -> Vec<ConversionResult> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    records
        .into_iter()
        .map(|record| {
            let occurrence = seen.entry(record.filename.clone()).or_insert(0);
            *occurrence += 1;
            let id = if *occurrence == 1 {
                record.filename.clone()
            } else {
                format!("{}#{}", record.filename, occurrence)
            };

            let confidence = mean_confidence(&record.atom_confidences);
            let status = classify(&record.predicted_smiles, confidence);
            let selfies = record
                .predicted_selfies
                .unwrap_or_else(|| record.predicted_smiles.clone());

            ConversionResult {
                id,
                image_url: join_url(image_base, &record.filepath),
                file_name: record.filename,
                smiles: record.predicted_smiles,
                selfies,
                confidence,
                format: StructureFormat::Smiles,
                status,
                processing_time: round_tenth(record.processing_time),
            }
        })
        .collect()
}

/// Validate raw records, then aggregate them.
pub fn aggregate_raw(
    raw: Vec<RawPrediction>,
    image_base: &Url,
) -> Result<Vec<ConversionResult>, ValidationError> {
    let records = raw
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.validate(i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(aggregate(records, image_base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::AtomSet;

    fn base() -> Url {
        Url::parse("http://localhost:8001").unwrap()
    }

    fn record(filename: &str, smiles: &str, confidences: &[f64]) -> PredictionRecord {
        PredictionRecord {
            filename: filename.into(),
            filepath: format!("uploads/{filename}"),
            predicted_smiles: smiles.into(),
            predicted_selfies: None,
            atom_confidences: confidences.to_vec(),
            processing_time: 2.24,
        }
    }

    #[test]
    fn confidence_is_rounded_mean_percentage() {
        assert_eq!(mean_confidence(&[0.80, 0.90, 1.00]), Some(90));
        assert_eq!(mean_confidence(&[0.906]), Some(91));
        assert_eq!(mean_confidence(&[0.0]), Some(0));
    }

    #[test]
    fn no_atoms_means_no_confidence() {
        assert_eq!(mean_confidence(&[]), None);
        let results = aggregate(vec![record("a.png", "CCO", &[])], &base());
        assert_eq!(results[0].confidence, None);
        assert_eq!(results[0].status, ResultStatus::Success);
    }

    #[test]
    fn absent_atom_sets_from_raw_records() {
        let raw = vec![
            RawPrediction {
                filename: Some("a.png".into()),
                predicted_smiles: Some("C".into()),
                processing_time: Some(1.0),
                atom_sets: None,
                ..Default::default()
            },
            RawPrediction {
                filename: Some("b.png".into()),
                predicted_smiles: Some("C".into()),
                processing_time: Some(1.0),
                atom_sets: Some(vec![]),
                ..Default::default()
            },
            RawPrediction {
                filename: Some("c.png".into()),
                predicted_smiles: Some("C".into()),
                processing_time: Some(1.0),
                atom_sets: Some(vec![
                    AtomSet {
                        confidence: Some(0.8),
                    },
                    AtomSet {
                        confidence: Some(0.9),
                    },
                    AtomSet {
                        confidence: Some(1.0),
                    },
                ]),
                ..Default::default()
            },
        ];
        let results = aggregate_raw(raw, &base()).unwrap();
        assert_eq!(results[0].confidence, None);
        assert_eq!(results[1].confidence, None);
        assert_eq!(results[2].confidence, Some(90));
    }

    #[test]
    fn image_url_resolved_against_base() {
        let results = aggregate(vec![record("a.png", "C", &[0.9])], &base());
        assert_eq!(results[0].image_url, "http://localhost:8001/uploads/a.png");
    }

    #[test]
    fn selfies_falls_back_to_smiles() {
        let mut with_selfies = record("b.png", "CCO", &[0.9]);
        with_selfies.predicted_selfies = Some("[C][C][O]".into());
        let results = aggregate(vec![record("a.png", "CCO", &[0.9]), with_selfies], &base());
        assert_eq!(results[0].selfies, "CCO");
        assert_eq!(results[1].selfies, "[C][C][O]");
        assert!(results.iter().all(|r| r.format == StructureFormat::Smiles));
    }

    #[test]
    fn status_classification() {
        let results = aggregate(
            vec![
                record("ok.png", "C", &[0.95]),
                record("low.png", "C", &[0.5]),
                record("none.png", "", &[0.99]),
            ],
            &base(),
        );
        assert_eq!(results[0].status, ResultStatus::Success);
        assert_eq!(results[1].status, ResultStatus::Warning);
        assert_eq!(results[2].status, ResultStatus::Error);
    }

    #[test]
    fn repeated_file_names_get_distinct_ids() {
        let results = aggregate(
            vec![
                record("MolSnap.png", "C", &[]),
                record("other.png", "C", &[]),
                record("MolSnap.png", "C", &[]),
            ],
            &base(),
        );
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "MolSnap.png");
        assert_eq!(results[1].id, "other.png");
        assert_eq!(results[2].id, "MolSnap.png#2");
        assert_eq!(results[2].file_name, "MolSnap.png");
    }

    #[test]
    fn processing_time_rounded_to_tenth() {
        let results = aggregate(vec![record("a.png", "C", &[])], &base());
        assert!((results[0].processing_time - 2.2).abs() < 1e-9);
    }

    #[test]
    fn serializes_with_display_names() {
        let results = aggregate(vec![record("a.png", "C", &[0.9])], &base());
        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(json["fileName"], "a.png");
        assert_eq!(json["format"], "SMILES");
        assert_eq!(json["status"], "success");
    }
}
