use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// EventId value marking an analysis-report event.
pub const ANALYSIS_REPORT_EVENT_ID: i64 = 112;

/// A decoded transaction lifecycle event.
///
/// The routing fields are lifted out of the JSON body for dispatching, while
/// `properties` keeps the full body verbatim so every field the producer sent
/// ends up in the aggregate document.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionEvent {
    pub file_id: String,
    pub event_id: i64,
    pub timestamp: String,
    pub analysis_report: Option<String>,
    pub properties: Map<String, Value>,
}

impl TransactionEvent {
    /// Decode an inbound message body.
    ///
    /// `FileId` and `EventId` are required; their absence is a decode error.
    /// A missing or non-string `Timestamp` is left empty and rejected later
    /// by key resolution, so it classifies as a timestamp error rather than
    /// a decode error. `AnalysisReport` is required for report events.
    pub fn decode(body: &[u8]) -> Result<Self, DomainError> {
        let properties: Map<String, Value> = serde_json::from_slice(body)
            .map_err(|e| DomainError::Decode(format!("body is not a JSON object: {e}")))?;

        let file_id = properties
            .get("FileId")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::Decode("missing or non-string FileId".to_string()))?
            .to_string();

        let event_id = properties
            .get("EventId")
            .and_then(as_event_id)
            .ok_or_else(|| DomainError::Decode("missing or non-numeric EventId".to_string()))?;

        let timestamp = properties
            .get("Timestamp")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let analysis_report = properties
            .get("AnalysisReport")
            .and_then(Value::as_str)
            .map(String::from);

        if event_id == ANALYSIS_REPORT_EVENT_ID && analysis_report.is_none() {
            return Err(DomainError::Decode(
                "analysis-report event without AnalysisReport".to_string(),
            ));
        }

        Ok(Self {
            file_id,
            event_id,
            timestamp,
            analysis_report,
            properties,
        })
    }

    pub fn is_analysis_report(&self) -> bool {
        self.event_id == ANALYSIS_REPORT_EVENT_ID
    }

    /// Convert into the record persisted inside the aggregate document.
    pub fn into_record(self) -> EventRecord {
        EventRecord {
            properties: self.properties,
        }
    }
}

// Producers are not consistent about integer vs float encoding, so accept
// both and truncate, the same way the original consumer cast from float64.
fn as_event_id(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

/// One appended event inside an aggregate document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "Properties")]
    pub properties: Map<String, Value>,
}

/// The per-key aggregate document persisted as `metadata.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(rename = "Events", default)]
    pub events: Vec<EventRecord>,
}
