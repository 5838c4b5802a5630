//! 分析レポートと記録履歴の表示用モデル。状態も I/O も持たない

use std::fmt;

use chrono::{Local, TimeZone, Utc};

use crate::protocol::{AnalysisReport, SequenceListing};

#[derive(Debug, Clone, PartialEq)]
pub struct ReportView {
    pub avg_deviation: String,
    pub max_deviation: String,
    pub min_deviation: String,
    pub progress_note: String,
    /// レポートが何も認識しなかったときは `None`
    pub recognized_gestures: Option<Vec<String>>,
    /// 推奨事項がなければ `None`
    pub recommendations: Option<Vec<String>>,
}

fn deviation(value: f64) -> String {
    format!("{value:.4}")
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

pub fn present(report: &AnalysisReport) -> ReportView {
    ReportView {
        avg_deviation: deviation(report.avg_deviation),
        max_deviation: deviation(report.max_deviation),
        min_deviation: deviation(report.min_deviation),
        progress_note: report.progress_note.clone(),
        recognized_gestures: non_empty(
            report
                .recognized_gestures
                .iter()
                .map(|g| format!("{} (frame {})", g.gesture, g.frame))
                .collect(),
        ),
        recommendations: non_empty(report.recommendations.clone()),
    }
}

impl fmt::Display for ReportView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Analysis report ===")?;
        writeln!(f, "Average deviation: {}", self.avg_deviation)?;
        writeln!(f, "Maximum deviation: {}", self.max_deviation)?;
        writeln!(f, "Minimum deviation: {}", self.min_deviation)?;
        writeln!(f, "Assessment: {}", self.progress_note)?;
        if let Some(gestures) = &self.recognized_gestures {
            writeln!(f, "Recognized gestures:")?;
            for g in gestures {
                writeln!(f, "  - {g}")?;
            }
        }
        if let Some(recs) = &self.recommendations {
            writeln!(f, "Recommendations:")?;
            for r in recs {
                writeln!(f, "  - {r}")?;
            }
        }
        Ok(())
    }
}

/// 保存済み記録1件につき1行。順序はバックエンドのまま
pub fn present_history(listing: &SequenceListing) -> Vec<String> {
    listing
        .sequences
        .iter()
        .map(|s| {
            let when = s
                .timestamp
                .and_then(|t| Utc.timestamp_millis_opt((t * 1000.0) as i64).single())
                .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            let dev = s.avg_deviation.map(deviation).unwrap_or_else(|| "-".to_string());
            format!("{}  {}  avg deviation {}", when, s.filename, dev)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RecognizedGesture, SequenceSummary};

    fn report() -> AnalysisReport {
        AnalysisReport {
            avg_deviation: 0.123456,
            max_deviation: 0.3,
            min_deviation: 0.00004,
            progress_note: "Good technique".into(),
            details: vec![0.1, 0.2],
            recognized_gestures: vec![RecognizedGesture {
                gesture: "squat".into(),
                frame: 12,
            }],
            recommendations: vec!["Keep it up".into()],
        }
    }

    #[test]
    fn test_deviations_rounded_to_four_places() {
        let view = present(&report());
        assert_eq!(view.avg_deviation, "0.1235");
        assert_eq!(view.max_deviation, "0.3000");
        assert_eq!(view.min_deviation, "0.0000");
    }

    #[test]
    fn test_sections_present_when_non_empty() {
        let view = present(&report());
        assert_eq!(view.recognized_gestures, Some(vec!["squat (frame 12)".to_string()]));
        let text = view.to_string();
        assert!(text.contains("Recognized gestures:"));
        assert!(text.contains("  - Keep it up"));
    }

    #[test]
    fn test_empty_sections_omitted() {
        let mut r = report();
        r.recognized_gestures.clear();
        r.recommendations.clear();
        let view = present(&r);
        assert_eq!(view.recognized_gestures, None);
        assert_eq!(view.recommendations, None);
        let text = view.to_string();
        assert!(!text.contains("Recognized gestures"));
        assert!(!text.contains("Recommendations"));
        assert!(text.contains("Assessment: Good technique"));
    }

    #[test]
    fn test_history_lines_keep_backend_order() {
        let listing = SequenceListing {
            label: Some("squat".into()),
            sequences: vec![
                SequenceSummary {
                    filename: "sequence_2.json".into(),
                    timestamp: None,
                    avg_deviation: Some(0.2),
                },
                SequenceSummary {
                    filename: "sequence_1.json".into(),
                    timestamp: None,
                    avg_deviation: None,
                },
            ],
        };
        let lines = present_history(&listing);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "-  sequence_2.json  avg deviation 0.2000");
        assert_eq!(lines[1], "-  sequence_1.json  avg deviation -");
    }
}
