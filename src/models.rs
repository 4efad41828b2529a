use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{StoreError, StoreResult};

/// Ingestion body for a single notification forwarded from a device.
///
/// Accepts the camelCase names the Android forwarder sends alongside the
/// canonical snake_case ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    #[serde(alias = "text")]
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(alias = "packageName")]
    pub package_name: String,
    #[serde(default)]
    pub from: String,
    #[serde(alias = "deviceId")]
    pub device_id: String,
}

impl NewNotification {
    pub fn validate(&self) -> StoreResult<()> {
        let required = [
            ("title", &self.title),
            ("message", &self.message),
            ("package_name", &self.package_name),
            ("device_id", &self.device_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(StoreError::invalid(format!("{} is required", field)));
            }
        }
        Ok(())
    }
}

/// A persisted, live notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub package_name: String,
    pub from: String,
    pub device_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A registered display name for a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub custom_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceSummary {
    pub device_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceNameRequest {
    #[serde(default, alias = "deviceId")]
    pub device_id: String,
    #[serde(default, alias = "customName")]
    pub custom_name: String,
}

impl DeviceNameRequest {
    pub fn validate(&self) -> StoreResult<()> {
        if self.device_id.trim().is_empty() || self.custom_name.trim().is_empty() {
            return Err(StoreError::invalid("device_id and custom_name are required"));
        }
        Ok(())
    }
}

// Database rows. Instants are stored as Unix nanoseconds.

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NotificationRow {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub timestamp: i64,
    pub package_name: String,
    pub from: String,
    pub device_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> StoreResult<Self> {
        Ok(Notification {
            id: row.id,
            title: row.title,
            message: row.message,
            timestamp: from_nanos(row.timestamp)?,
            package_name: row.package_name,
            from: row.from,
            device_id: row.device_id,
            created_at: from_nanos(row.created_at)?,
            updated_at: from_nanos(row.updated_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DeviceRow {
    pub device_id: String,
    pub custom_name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<DeviceRow> for Device {
    type Error = StoreError;

    fn try_from(row: DeviceRow) -> StoreResult<Self> {
        Ok(Device {
            device_id: row.device_id,
            custom_name: row.custom_name,
            created_at: from_nanos(row.created_at)?,
            updated_at: from_nanos(row.updated_at)?,
        })
    }
}

pub(crate) fn to_nanos(ts: OffsetDateTime) -> StoreResult<i64> {
    i64::try_from(ts.unix_timestamp_nanos())
        .map_err(|_| StoreError::invalid(format!("timestamp {} is out of range", ts)))
}

/// Clamps instants outside the storable window to its edges. Only valid for
/// query bounds, never for stored values.
pub(crate) fn saturating_nanos(ts: OffsetDateTime) -> i64 {
    ts.unix_timestamp_nanos()
        .clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

pub(crate) fn from_nanos(nanos: i64) -> StoreResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|e| StoreError::Persistence(sqlx::Error::Decode(Box::new(e))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn accepts_forwarder_field_names() {
        let body = r#"{
            "title": "Alice",
            "text": "Hey, how are you?",
            "timestamp": "2024-03-01T10:15:00Z",
            "packageName": "com.whatsapp",
            "deviceId": "phone1"
        }"#;

        let parsed: NewNotification = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message, "Hey, how are you?");
        assert_eq!(parsed.package_name, "com.whatsapp");
        assert_eq!(parsed.device_id, "phone1");
        assert_eq!(parsed.from, "");
        assert_eq!(parsed.timestamp, datetime!(2024-03-01 10:15:00 UTC));
    }

    #[test]
    fn validate_rejects_blank_required_fields() {
        let mut n = NewNotification {
            title: "t".into(),
            message: "m".into(),
            timestamp: datetime!(2024-03-01 10:15:00 UTC),
            package_name: "com.test.app".into(),
            from: String::new(),
            device_id: "phone1".into(),
        };
        assert!(n.validate().is_ok());

        n.device_id = "  ".into();
        match n.validate() {
            Err(StoreError::InvalidArgument(msg)) => assert!(msg.contains("device_id")),
            other => panic!("expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn nanos_preserve_offset_instants() {
        let ts = datetime!(2024-03-01 12:15:00.123456789 +02:00);
        let back = from_nanos(to_nanos(ts).unwrap()).unwrap();
        assert_eq!(back, ts);
        assert_eq!(back.offset(), time::UtcOffset::UTC);
    }

    #[test]
    fn saturating_nanos_clamps_to_storable_window() {
        assert_eq!(saturating_nanos(datetime!(0001-01-01 00:00:00 UTC)), i64::MIN);
        assert_eq!(saturating_nanos(datetime!(9999-12-31 23:59:59 UTC)), i64::MAX);
        let ts = datetime!(2024-03-01 10:00:00 UTC);
        assert_eq!(saturating_nanos(ts), to_nanos(ts).unwrap());
    }

    #[test]
    fn device_name_request_requires_both_fields() {
        let req = DeviceNameRequest {
            device_id: "phone1".into(),
            custom_name: String::new(),
        };
        assert!(matches!(req.validate(), Err(StoreError::InvalidArgument(_))));
    }
}
