use crate::meter::window::LOCAL_DATETIME_FORMATS;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;

/// One record as returned by the time-series query service.
///
/// The service is loose about types: `value` arrives as a number or a
/// numeric string and `timestamp` may be missing or not a string at all.
/// Decoding never fails on those fields; bad samples are filtered later by
/// [`clean`](super::clean).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamRecord {
    tag_id: i64,
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    value: Value,
}

impl UpstreamRecord {
    pub fn tag_id(&self) -> i64 {
        self.tag_id
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp.as_str().and_then(parse_upstream_timestamp)
    }

    pub fn value(&self) -> Option<f64> {
        match &self.value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    s.parse::<f64>().ok()
                }
            }
            _ => None,
        }
    }
}

/// A raw meter sample. Fields the upstream could not supply are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub tag_id: i64,
    pub timestamp: Option<NaiveDateTime>,
    pub value: Option<f64>,
}

impl Reading {
    pub fn new(tag_id: i64, timestamp: NaiveDateTime, value: f64) -> Self {
        Self {
            tag_id,
            timestamp: Some(timestamp),
            value: Some(value),
        }
    }
}

impl From<UpstreamRecord> for Reading {
    fn from(record: UpstreamRecord) -> Self {
        Self {
            tag_id: record.tag_id(),
            timestamp: record.timestamp(),
            value: record.value(),
        }
    }
}

/// Parse an offset-less upstream timestamp. Empty or unrecognised input is `None`.
pub fn parse_upstream_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_decode_numeric_value() {
        let json = r#"{"tagId": 13, "timestamp": "2025-03-14T10:15:00", "value": 1234.5}"#;
        let record: UpstreamRecord = serde_json::from_str(json).unwrap();
        let reading = Reading::from(record);

        assert_eq!(reading.tag_id, 13);
        assert_eq!(reading.timestamp, Some(ts(10, 15, 0)));
        assert_eq!(reading.value, Some(1234.5));
    }

    #[test]
    fn test_decode_string_value() {
        let json = r#"{"tagId": 15, "timestamp": "2025-03-14 10:15:00.250", "value": " 42.75 "}"#;
        let record: UpstreamRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.value(), Some(42.75));
        let parsed = record.timestamp().unwrap();
        assert_eq!(parsed.nanosecond() / 1_000_000, 250);
    }

    #[test]
    fn test_decode_unparseable_value_and_missing_timestamp() {
        let json = r#"[
            {"tagId": 11, "value": 1.0},
            {"tagId": 11, "timestamp": "", "value": 2.0},
            {"tagId": 11, "timestamp": "2025-03-14T10:00:00", "value": "n/a"},
            {"tagId": 11, "timestamp": "2025-03-14T10:00:00", "value": null},
            {"tagId": 11, "timestamp": "2025-03-14T10:00:00", "value": ""}
        ]"#;
        let records: Vec<UpstreamRecord> = serde_json::from_str(json).unwrap();
        let readings: Vec<Reading> = records.into_iter().map(Reading::from).collect();

        assert_eq!(readings[0].timestamp, None);
        assert_eq!(readings[1].timestamp, None);
        assert_eq!(readings[2].value, None);
        assert_eq!(readings[3].value, None);
        assert_eq!(readings[4].value, None);
    }

    #[test]
    fn test_non_string_timestamp_drops_only_that_row() {
        let json = r#"[
            {"tagId": 13, "timestamp": "2025-03-14T10:00:00", "value": 1},
            {"tagId": 13, "timestamp": 1710410400000, "value": 2},
            {"tagId": 13, "timestamp": {"epoch": 1}, "value": 2},
            {"tagId": 13, "timestamp": true, "value": 2},
            {"tagId": 13, "timestamp": "2025-03-14T12:00:00", "value": 3}
        ]"#;
        let records: Vec<UpstreamRecord> = serde_json::from_str(json).unwrap();
        let readings: Vec<Reading> = records.into_iter().map(Reading::from).collect();
        assert_eq!(readings.len(), 5);

        let timestamps: Vec<Option<NaiveDateTime>> =
            readings.iter().map(|r| r.timestamp).collect();
        assert_eq!(
            timestamps,
            vec![Some(ts(10, 0, 0)), None, None, None, Some(ts(12, 0, 0))]
        );

        let series = crate::meter::extract_tags(&readings, &[13]);
        assert_eq!(series[0].cleaned.len(), 2);
        assert_eq!(series[0].energy_total(), Some(2.0));
    }

    #[test]
    fn test_parse_upstream_timestamp_minute_precision() {
        assert_eq!(
            parse_upstream_timestamp("2025-03-14T08:30"),
            Some(ts(8, 30, 0))
        );
        assert_eq!(parse_upstream_timestamp("yesterday"), None);
    }
}
