//! Wire schema of the recognition services and its validation.
//!
//! Responses are decoded into permissive `Raw*` types first, then checked
//! record by record into [`PredictionRecord`]. A missing required field or
//! an out-of-range confidence fails with a [`ValidationError`] naming the
//! record index instead of flowing through as an undefined value.
//!
//! Both services answer HTTP 200 with `{ "message": "..." }` when their own
//! processing fails; those bodies surface as [`MolSnapError::Service`].

use crate::error::{MolSnapError, ValidationError};
use serde::{Deserialize, Serialize};

/// One atom entry of a prediction. Only the confidence is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomSet {
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// A prediction record exactly as the service sent it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPrediction {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub predicted_smiles: Option<String>,
    #[serde(default)]
    pub predicted_selfies: Option<String>,
    #[serde(default)]
    pub atom_sets: Option<Vec<AtomSet>>,
    #[serde(default)]
    pub processing_time: Option<f64>,
}

/// A prediction record that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub filename: String,
    /// Path relative to the static-asset base; the file name when absent.
    pub filepath: String,
    /// May be empty when the model produced nothing.
    pub predicted_smiles: String,
    pub predicted_selfies: Option<String>,
    /// Per-atom confidences in `[0, 1]`. Empty when the service sent none.
    pub atom_confidences: Vec<f64>,
    pub processing_time: f64,
}

impl RawPrediction {
    /// Check required fields and value ranges.
    pub fn validate(self, index: usize) -> Result<PredictionRecord, ValidationError> {
        let filename = self
            .filename
            .filter(|f| !f.is_empty())
            .ok_or(ValidationError::MissingField {
                index,
                field: "filename",
            })?;
        let predicted_smiles = self.predicted_smiles.ok_or(ValidationError::MissingField {
            index,
            field: "predicted_smiles",
        })?;
        let processing_time = self.processing_time.ok_or(ValidationError::MissingField {
            index,
            field: "processing_time",
        })?;
        if !processing_time.is_finite() || processing_time < 0.0 {
            return Err(ValidationError::InvalidProcessingTime {
                index,
                value: processing_time,
            });
        }

        let mut atom_confidences = Vec::new();
        for value in self.atom_sets.unwrap_or_default().into_iter().filter_map(|a| a.confidence) {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::ConfidenceOutOfRange { index, value });
            }
            atom_confidences.push(value);
        }

        let filepath = self
            .filepath
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| filename.clone());

        Ok(PredictionRecord {
            filename,
            filepath,
            predicted_smiles: predicted_smiles.trim().to_string(),
            predicted_selfies: self.predicted_selfies.filter(|s| !s.trim().is_empty()),
            atom_confidences,
            processing_time,
        })
    }
}

/// Body of a prediction response.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PredictionPayload {
    /// A bare array of records.
    Records(Vec<RawPrediction>),
    /// `{ "results": [...], "message": "..." }` as returned by `/prediction`.
    Envelope {
        results: Vec<RawPrediction>,
        #[serde(default)]
        message: Option<String>,
    },
    /// Service-side failure reported with HTTP 200.
    Failure { message: String },
}

/// Decode and validate a prediction response body.
pub fn parse_prediction_body(body: &[u8]) -> Result<Vec<PredictionRecord>, MolSnapError> {
    let payload: PredictionPayload = serde_json::from_slice(body)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;
    let raw = match payload {
        PredictionPayload::Records(records) => records,
        PredictionPayload::Envelope { results, .. } => results,
        PredictionPayload::Failure { message } => return Err(MolSnapError::Service { message }),
    };
    raw.into_iter()
        .enumerate()
        .map(|(i, r)| r.validate(i).map_err(MolSnapError::from))
        .collect()
}

/// Segment images and model checkpoints returned by the extraction service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSegments {
    pub images: Vec<String>,
    #[serde(default)]
    pub checkpoints: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ExtractionPayload {
    Segments(ExtractedSegments),
    Failure { message: String },
}

/// Decode an extraction response body.
pub fn parse_extraction_body(body: &[u8]) -> Result<ExtractedSegments, MolSnapError> {
    let payload: ExtractionPayload = serde_json::from_slice(body)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;
    match payload {
        ExtractionPayload::Segments(segments) => Ok(segments),
        ExtractionPayload::Failure { message } => Err(MolSnapError::Service { message }),
    }
}
