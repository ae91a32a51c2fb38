//! Notification model module.
//!
//! Builds the record stored in Xata from a broker's startup notification.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::geo::GeoLocation;

/// Request fields copied verbatim (as strings) into the record.
pub const COPIED_FIELDS: [&str; 5] = ["os", "cpu_arch", "jvm_version", "jvm_vendor", "remote_ip"];

/// `max_heap` value sent by brokers that could not determine it.
pub const UNDEFINED_MAX_HEAP: &str = "undefined";

/// Formats a timestamp as `yyyy-MM-ddTHH:mm:ssZ`.
pub fn format_startup_date(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Builds the record for one notification.
///
/// Field order: `IP`, `startup_date`, location fields, copied fields,
/// `version`, `uuid`, `standalone`, `max_heap`.
pub fn build_payload(
    peer_ip: &str,
    startup_date: &str,
    location: Option<&GeoLocation>,
    request: &Map<String, Value>,
) -> AppResult<Map<String, Value>> {
    let mut payload = Map::new();
    payload.insert("IP".to_string(), Value::String(peer_ip.to_string()));
    payload.insert(
        "startup_date".to_string(),
        Value::String(startup_date.to_string()),
    );

    if let Some(location) = location {
        if let Value::Object(fields) = serde_json::to_value(location)? {
            payload.extend(fields);
        }
    }

    for field in COPIED_FIELDS {
        copy_if_present(field, field, &mut payload, request);
    }
    copy_if_present("broker_version", "version", &mut payload, request);
    copy_if_present("uuid", "uuid", &mut payload, request);

    if let Some(value) = request.get("standalone") {
        payload.insert("standalone".to_string(), Value::Bool(as_bool("standalone", value)?));
    }

    if let Some(Some(bytes)) = request.get("max_heap").map(parse_max_heap).transpose()? {
        payload.insert("max_heap".to_string(), Value::from(bytes));
    }

    Ok(payload)
}

fn copy_if_present(
    from: &str,
    to: &str,
    payload: &mut Map<String, Value>,
    request: &Map<String, Value>,
) {
    if let Some(value) = request.get(from) {
        payload.insert(to.to_string(), as_text(value));
    }
}

/// Strings pass through, `null` stays `null`, other values become their JSON text.
fn as_text(value: &Value) -> Value {
    match value {
        Value::String(_) | Value::Null => value.clone(),
        other => Value::String(other.to_string()),
    }
}

fn as_bool(field: &str, value: &Value) -> AppResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(AppError::BadRequest(format!("{field} must be a boolean, got {other}"))),
    }
}

/// `Ok(None)` means the field is skipped (`"undefined"` or `null`).
fn parse_max_heap(value: &Value) -> AppResult<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s == UNDEFINED_MAX_HEAP => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("max_heap must be an integer, got '{s}'"))),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("max_heap must be an integer, got {n}"))),
        other => Err(AppError::BadRequest(format!("max_heap must be an integer, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn request(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("request must be an object"),
        }
    }

    // ============ 날짜 형식 테스트 ============

    #[test]
    fn test_format_startup_date() {
        let ts = Utc.with_ymd_and_hms(2022, 12, 8, 9, 5, 3).unwrap();
        assert_eq!(format_startup_date(ts), "2022-12-08T09:05:03Z");
    }

    // ============ 페이로드 구성 테스트 ============

    #[test]
    fn test_full_payload_order_and_renames() {
        let req = request(json!({
            "os": "Linux",
            "cpu_arch": "amd64",
            "jvm_version": "17.0.5",
            "jvm_vendor": "Eclipse Adoptium",
            "remote_ip": "93.44.10.2",
            "broker_version": "0.16",
            "uuid": "0b8e5a6c-44f5-4d2f-9a0e-7e3b0a9c1f11",
            "standalone": true,
            "max_heap": "4294967296",
            "ignored": "not copied"
        }));
        let location = GeoLocation {
            nation: Some("Italy".to_string()),
            region: Some("Lombardy".to_string()),
            city: Some("Milan".to_string()),
            latitude: Some(45.46),
            longitude: Some(9.19),
        };

        let payload = build_payload("10.0.0.7", "2022-12-08T09:05:03Z", Some(&location), &req).unwrap();

        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "IP",
                "startup_date",
                "nation",
                "region",
                "city",
                "latitude",
                "longitude",
                "os",
                "cpu_arch",
                "jvm_version",
                "jvm_vendor",
                "remote_ip",
                "version",
                "uuid",
                "standalone",
                "max_heap"
            ]
        );
        assert_eq!(payload["IP"], "10.0.0.7");
        assert_eq!(payload["version"], "0.16");
        assert_eq!(payload["standalone"], true);
        assert_eq!(payload["max_heap"], 4_294_967_296_i64);
        assert!(payload.get("broker_version").is_none());
        assert!(payload.get("ignored").is_none());
    }

    #[test]
    fn test_minimal_payload() {
        let payload = build_payload("10.0.0.7", "2022-12-08T09:05:03Z", None, &Map::new()).unwrap();
        assert_eq!(
            Value::Object(payload),
            json!({"IP": "10.0.0.7", "startup_date": "2022-12-08T09:05:03Z"})
        );
    }

    #[test]
    fn test_max_heap_undefined_skipped() {
        let req = request(json!({"max_heap": "undefined"}));
        let payload = build_payload("1.1.1.1", "d", None, &req).unwrap();
        assert!(payload.get("max_heap").is_none());
    }

    #[test]
    fn test_max_heap_numeric_value() {
        let req = request(json!({"max_heap": 1024}));
        let payload = build_payload("1.1.1.1", "d", None, &req).unwrap();
        assert_eq!(payload["max_heap"], 1024);
    }

    #[test]
    fn test_max_heap_garbage_rejected() {
        let req = request(json!({"max_heap": "lots"}));
        let err = build_payload("1.1.1.1", "d", None, &req).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("max_heap")));
    }

    #[test]
    fn test_standalone_string_accepted() {
        let req = request(json!({"standalone": "false"}));
        let payload = build_payload("1.1.1.1", "d", None, &req).unwrap();
        assert_eq!(payload["standalone"], false);
    }

    #[test]
    fn test_standalone_number_rejected() {
        let req = request(json!({"standalone": 1}));
        assert!(build_payload("1.1.1.1", "d", None, &req).is_err());
    }

    #[test]
    fn test_non_string_copied_as_text() {
        let req = request(json!({"jvm_version": 17, "os": null}));
        let payload = build_payload("1.1.1.1", "d", None, &req).unwrap();
        assert_eq!(payload["jvm_version"], "17");
        assert!(payload["os"].is_null());
    }
}
