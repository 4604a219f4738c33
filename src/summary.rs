//! Summary figures shown above the results table.

use crate::aggregate::{ConversionResult, ResultStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSummary {
    pub count: usize,
    pub success_count: usize,
    /// Rounded mean over results that have a confidence.
    pub mean_confidence: Option<u8>,
    /// Mean seconds per result.
    pub mean_processing_time: Option<f64>,
}

impl ResultsSummary {
    pub fn from_results(results: &[ConversionResult]) -> Self {
        let count = results.len();
        let success_count = results
            .iter()
            .filter(|r| r.status == ResultStatus::Success)
            .count();

        let (conf_sum, conf_n) = results
            .iter()
            .filter_map(|r| r.confidence)
            .fold((0u64, 0u64), |(sum, n), c| (sum + u64::from(c), n + 1));
        let mean_confidence = (conf_n > 0).then(|| (conf_sum as f64 / conf_n as f64).round() as u8);

        let mean_processing_time = (count > 0)
            .then(|| results.iter().map(|r| r.processing_time).sum::<f64>() / count as f64);

        Self {
            count,
            success_count,
            mean_confidence,
            mean_processing_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::StructureFormat;

    fn row(confidence: Option<u8>, status: ResultStatus, secs: f64) -> ConversionResult {
        ConversionResult {
            id: "r".into(),
            file_name: "r.png".into(),
            image_url: String::new(),
            smiles: "C".into(),
            selfies: "C".into(),
            confidence,
            format: StructureFormat::Smiles,
            status,
            processing_time: secs,
        }
    }

    #[test]
    fn empty_table() {
        let s = ResultsSummary::from_results(&[]);
        assert_eq!(s.count, 0);
        assert_eq!(s.mean_confidence, None);
        assert_eq!(s.mean_processing_time, None);
    }

    #[test]
    fn folds_counts_and_means() {
        let rows = [
            row(Some(92), ResultStatus::Success, 2.0),
            row(Some(71), ResultStatus::Warning, 3.0),
            row(None, ResultStatus::Success, 1.0),
        ];
        let s = ResultsSummary::from_results(&rows);
        assert_eq!(s.count, 3);
        assert_eq!(s.success_count, 2);
        // (92 + 71) / 2 = 81.5 → 82; undefined confidences are skipped
        assert_eq!(s.mean_confidence, Some(82));
        assert!((s.mean_processing_time.unwrap() - 2.0).abs() < 1e-9);
    }
}
