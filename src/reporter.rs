use serde::Serialize;

use crate::endpoints::ResourceKind;

/// One delivered record as written to stdout.
#[derive(Debug, Serialize)]
pub struct Delivery<'a, T> {
    pub timestamp: String,
    pub resource: ResourceKind,
    pub record: &'a T,
}

impl<'a, T: Serialize> Delivery<'a, T> {
    pub fn now(resource: ResourceKind, record: &'a T) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            resource,
            record,
        }
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Emit a delivered record as a single JSON line to stdout.
pub fn report_delivery<T: Serialize>(resource: ResourceKind, record: &T) {
    if let Ok(json) = Delivery::now(resource, record).to_json_line() {
        println!("{json}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn delivery_line_shape() {
        let record = json!({"id": 3, "outcome": "correct"});
        let line = Delivery::now(ResourceKind::Judgings, &record)
            .to_json_line()
            .unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed["resource"], "judgings");
        assert_eq!(parsed["record"], record);
        assert!(parsed["timestamp"].as_str().unwrap().contains('T'));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn configuration_serializes_with_api_name() {
        let line = Delivery::now(ResourceKind::Configuration, &json!({}))
            .to_json_line()
            .unwrap();
        assert!(line.contains("\"resource\":\"config\""));
    }
}
