use crate::error::DomainError;
use chrono::{DateTime, Datelike, Timelike};
use std::fmt;

/// Hierarchical storage key addressing one aggregate document.
///
/// Shaped as `year/month/day/hour/<entityId>` with non-padded decimal
/// components, so all events for one entity submitted within the same hour
/// share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Derive the key for an event timestamp and entity id.
    ///
    /// Pure function; fails only when the timestamp is not valid RFC3339.
    pub fn resolve(timestamp: &str, entity_id: &str) -> Result<Self, DomainError> {
        let parsed =
            DateTime::parse_from_rfc3339(timestamp).map_err(|e| DomainError::InvalidTimestamp {
                value: timestamp.to_string(),
                source: e,
            })?;

        Ok(Self(format!(
            "{}/{}/{}/{}/{}",
            parsed.year(),
            parsed.month(),
            parsed.day(),
            parsed.hour(),
            entity_id
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the aggregate document for this key.
    pub fn metadata_path(&self) -> String {
        format!("{}/metadata.json", self.0)
    }

    /// Path of the write-once report artifact for this key.
    pub fn report_path(&self) -> String {
        format!("{}/report.xml", self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_hour_bucketed_key() {
        let key = StorageKey::resolve("2024-01-02T03:00:00Z", "f1").unwrap();
        assert_eq!(key.as_str(), "2024/1/2/3/f1");
        assert_eq!(key.metadata_path(), "2024/1/2/3/f1/metadata.json");
        assert_eq!(key.report_path(), "2024/1/2/3/f1/report.xml");
    }

    #[test]
    fn resolution_is_deterministic() {
        let a = StorageKey::resolve("2023-06-01T14:00:00Z", "abc123").unwrap();
        let b = StorageKey::resolve("2023-06-01T14:00:00Z", "abc123").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn same_hour_maps_to_same_key() {
        let a = StorageKey::resolve("2023-06-01T14:00:00Z", "abc123").unwrap();
        let b = StorageKey::resolve("2023-06-01T14:59:59Z", "abc123").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_hours_map_to_different_keys() {
        let a = StorageKey::resolve("2023-06-01T14:00:00Z", "abc123").unwrap();
        let b = StorageKey::resolve("2023-06-01T15:00:00Z", "abc123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_entities_map_to_different_keys() {
        let a = StorageKey::resolve("2023-06-01T14:00:00Z", "abc123").unwrap();
        let b = StorageKey::resolve("2023-06-01T14:00:00Z", "def456").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn offset_timestamps_use_their_local_hour() {
        let key = StorageKey::resolve("2023-06-01T14:00:00+02:00", "abc123").unwrap();
        assert_eq!(key.as_str(), "2023/6/1/14/abc123");
    }

    #[test]
    fn rejects_invalid_timestamps() {
        for bad in ["", "yesterday", "2023-06-01", "01/06/2023 14:00"] {
            let err = StorageKey::resolve(bad, "abc123").unwrap_err();
            assert!(matches!(err, DomainError::InvalidTimestamp { .. }), "{bad}");
        }
    }
}
