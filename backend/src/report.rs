use chrono::Utc;
use shared::{DiscResult, Report, Summary};

use crate::detect::classes::{
    CLASS_ID_BULGING, CLASS_ID_HERNIATION, CLASS_ID_NORMAL, DISC_LEVELS, class_config,
};
use crate::detect::model::Detection;

/// A detection with its assigned disc-level label.
pub struct LabeledDetection {
    pub disc_level: String,
    pub detection: Detection,
}

/// Ranks detections top to bottom and assigns the fixed disc-level labels.
/// Ties on the vertical center break on the left edge so the assignment is
/// deterministic. Detections past the fifth get synthetic `Disc-{n}` labels.
pub fn assign_disc_levels(mut detections: Vec<Detection>) -> Vec<LabeledDetection> {
    detections.sort_by_key(|d| (d.center_y(), d.x1));
    detections
        .into_iter()
        .enumerate()
        .map(|(i, detection)| {
            let disc_level = match DISC_LEVELS.get(i) {
                Some(level) => level.to_string(),
                None => format!("Disc-{}", i + 1),
            };
            LabeledDetection { disc_level, detection }
        })
        .collect()
}

/// Builds the structured report: one row per fixed disc level (gaps become
/// "Not Detected"), per-condition counts, and a worst-finding overall status.
pub fn build_report(labeled: &[LabeledDetection], image_name: &str, elapsed_secs: f64) -> Report {
    let mut summary = Summary::default();
    let mut discs = Vec::with_capacity(DISC_LEVELS.len());

    for level in DISC_LEVELS {
        match labeled.iter().find(|l| l.disc_level == level) {
            Some(l) => {
                let cfg = class_config(l.detection.class_id);
                match l.detection.class_id {
                    CLASS_ID_NORMAL => summary.normal += 1,
                    CLASS_ID_BULGING => summary.bulging += 1,
                    CLASS_ID_HERNIATION => summary.herniation += 1,
                    _ => {}
                }
                discs.push(DiscResult {
                    disc_level: level.to_string(),
                    condition: cfg.name.to_string(),
                    confidence: l.detection.confidence,
                    severity: cfg.severity.to_string(),
                });
            }
            None => {
                summary.not_detected += 1;
                discs.push(DiscResult {
                    disc_level: level.to_string(),
                    condition: "Not Detected".to_string(),
                    confidence: 0.0,
                    severity: "unknown".to_string(),
                });
            }
        }
    }

    // Worst finding wins, counted over every detection so a herniation ranked
    // past L5-S1 still escalates the status.
    let overall_status = if has_class(labeled, CLASS_ID_HERNIATION) {
        "Critical"
    } else if has_class(labeled, CLASS_ID_BULGING) {
        "Attention Required"
    } else {
        "Normal"
    };

    Report {
        image_name: image_name.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        discs,
        summary,
        overall_status: overall_status.to_string(),
        processing_time: (elapsed_secs * 1000.0).round() / 1000.0,
    }
}

fn has_class(labeled: &[LabeledDetection], class_id: usize) -> bool {
    labeled.iter().any(|l| l.detection.class_id == class_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: usize, confidence: f32, y1: i32, y2: i32) -> Detection {
        Detection { class_id, confidence, x1: 100, y1, x2: 260, y2 }
    }

    #[test]
    fn levels_follow_vertical_order_not_input_order() {
        let labeled = assign_disc_levels(vec![
            det(0, 0.7, 400, 440),
            det(2, 0.8, 100, 140),
            det(1, 0.9, 250, 290),
        ]);
        assert_eq!(labeled[0].disc_level, "L1-L2");
        assert_eq!(labeled[0].detection.class_id, 2);
        assert_eq!(labeled[1].disc_level, "L2-L3");
        assert_eq!(labeled[1].detection.class_id, 1);
        assert_eq!(labeled[2].disc_level, "L3-L4");
        assert_eq!(labeled[2].detection.class_id, 0);
    }

    #[test]
    fn equal_centers_break_ties_on_left_edge() {
        let left = Detection { class_id: 0, confidence: 0.5, x1: 10, y1: 100, x2: 60, y2: 140 };
        let right = Detection { class_id: 1, confidence: 0.9, x1: 200, y1: 100, x2: 250, y2: 140 };
        let labeled = assign_disc_levels(vec![right.clone(), left.clone()]);
        assert_eq!(labeled[0].detection, left);
        assert_eq!(labeled[1].detection, right);
    }

    #[test]
    fn extra_detections_get_synthetic_labels() {
        let dets = (0..7).map(|i| det(0, 0.6, i * 100, i * 100 + 40)).collect();
        let labeled = assign_disc_levels(dets);
        assert_eq!(labeled.len(), 7);
        assert_eq!(labeled[4].disc_level, "L5-S1");
        assert_eq!(labeled[5].disc_level, "Disc-6");
        assert_eq!(labeled[6].disc_level, "Disc-7");
    }

    #[test]
    fn report_always_has_five_rows_in_fixed_order() {
        let labeled = assign_disc_levels(vec![det(1, 0.84, 250, 290)]);
        let report = build_report(&labeled, "scan.jpg", 0.3);
        assert_eq!(report.discs.len(), 5);
        let levels: Vec<&str> = report.discs.iter().map(|d| d.disc_level.as_str()).collect();
        assert_eq!(levels, DISC_LEVELS);
    }

    #[test]
    fn empty_detections_report_all_not_detected() {
        let report = build_report(&[], "scan.jpg", 0.05);
        assert!(report.discs.iter().all(|d| d.condition == "Not Detected"));
        assert!(report.discs.iter().all(|d| d.confidence == 0.0));
        assert!(report.discs.iter().all(|d| d.severity == "unknown"));
        assert_eq!(report.summary.not_detected, 5);
        assert_eq!(report.overall_status, "Normal");
    }

    #[test]
    fn any_herniation_makes_status_critical() {
        let labeled = assign_disc_levels(vec![
            det(0, 0.68, 100, 140),
            det(1, 0.84, 250, 290),
            det(2, 0.82, 400, 440),
        ]);
        let report = build_report(&labeled, "scan.jpg", 0.3);
        assert_eq!(report.overall_status, "Critical");
        assert_eq!(report.summary.herniation, 1);
        assert_eq!(report.summary.bulging, 1);
        assert_eq!(report.summary.normal, 1);
        assert_eq!(report.summary.not_detected, 2);
    }

    #[test]
    fn herniation_past_fifth_rank_still_escalates() {
        let mut dets: Vec<Detection> = (0..5).map(|i| det(0, 0.6, i * 80, i * 80 + 40)).collect();
        dets.push(det(2, 0.7, 500, 540));
        let report = build_report(&assign_disc_levels(dets), "scan.jpg", 0.2);
        assert_eq!(report.overall_status, "Critical");
        // The summary still only counts the five fixed rows.
        assert_eq!(report.summary.herniation, 0);
        assert_eq!(report.summary.normal, 5);
    }

    #[test]
    fn bulging_without_herniation_requires_attention() {
        let labeled = assign_disc_levels(vec![det(1, 0.9, 250, 290)]);
        let report = build_report(&labeled, "scan.jpg", 0.1);
        assert_eq!(report.overall_status, "Attention Required");
    }

    #[test]
    fn processing_time_rounds_to_millis() {
        let report = build_report(&[], "scan.jpg", 0.123456);
        assert_eq!(report.processing_time, 0.123);
    }
}
