use serde::{Deserialize, Serialize};

/// One row of the disc-level report, always emitted for each of the five
/// lumbar levels even when the model produced no box there.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiscResult {
    pub disc_level: String,
    pub condition: String,
    pub confidence: f32,
    pub severity: String,
}

/// Per-condition counts over the five fixed disc rows.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Summary {
    #[serde(rename = "Normal")]
    pub normal: u32,
    #[serde(rename = "Bulging")]
    pub bulging: u32,
    #[serde(rename = "Herniation")]
    pub herniation: u32,
    #[serde(rename = "Not_Detected")]
    pub not_detected: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Report {
    pub image_name: String,
    pub timestamp: String,
    pub discs: Vec<DiscResult>,
    pub summary: Summary,
    pub overall_status: String,
    pub processing_time: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FullResponse {
    pub report: Report,
    /// `data:image/jpeg;base64,...` URI of the annotated image.
    pub annotated_image: String,
    /// URL of the saved copy under `/static`, when the write succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serializes_with_renamed_keys() {
        let summary = Summary {
            normal: 2,
            bulging: 1,
            herniation: 1,
            not_detected: 1,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["Normal"], 2);
        assert_eq!(json["Bulging"], 1);
        assert_eq!(json["Herniation"], 1);
        assert_eq!(json["Not_Detected"], 1);
    }

    #[test]
    fn absent_annotated_url_is_omitted() {
        let response = FullResponse {
            report: Report {
                image_name: "scan.jpg".into(),
                timestamp: "2024-01-15T10:30:00Z".into(),
                discs: vec![],
                summary: Summary::default(),
                overall_status: "Normal".into(),
                processing_time: 0.042,
            },
            annotated_image: "data:image/jpeg;base64,".into(),
            annotated_url: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("annotated_url").is_none());
    }
}
