use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::metrics::{self, DEVICE_NAMES_DELETED, DEVICE_NAMES_UPSERTED};
use crate::models::{to_nanos, Device, DeviceRow};

/// Mapping from device id to a human-assigned display name.
#[derive(Clone)]
pub struct DeviceDirectory {
    db_pool: SqlitePool,
}

impl DeviceDirectory {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Insert-or-update keyed by `device_id`. Runs as one statement against
    /// the primary key, so concurrent callers can never create a second row.
    pub async fn upsert(&self, device_id: &str, custom_name: &str) -> StoreResult<Device> {
        let _timer = metrics::time_operation("device_upsert");
        let now = to_nanos(OffsetDateTime::now_utc())?;

        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            INSERT INTO devices (device_id, custom_name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (device_id) DO UPDATE
                SET custom_name = excluded.custom_name,
                    updated_at = excluded.updated_at
            RETURNING device_id, custom_name, created_at, updated_at
            "#,
        )
        .bind(device_id)
        .bind(custom_name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        DEVICE_NAMES_UPSERTED.inc();
        info!(device_id = %device_id, custom_name = %custom_name, "Assigned device name");
        Device::try_from(row)
    }

    pub async fn get(&self, device_id: &str) -> StoreResult<Option<Device>> {
        let _timer = metrics::time_operation("device_get");
        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT device_id, custom_name, created_at, updated_at
            FROM devices
            WHERE device_id = ?
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(Device::try_from).transpose()
    }

    /// The registered name, or `device_id` itself when none is registered.
    pub async fn get_display_name(&self, device_id: &str) -> StoreResult<String> {
        let name = match self.get(device_id).await? {
            Some(device) if !device.custom_name.is_empty() => device.custom_name,
            _ => {
                debug!(device_id = %device_id, "No custom name, falling back to id");
                device_id.to_string()
            }
        };
        Ok(name)
    }

    pub async fn list_all(&self) -> StoreResult<Vec<Device>> {
        let _timer = metrics::time_operation("device_list_all");
        let rows = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT device_id, custom_name, created_at, updated_at
            FROM devices
            ORDER BY device_id
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(Device::try_from).collect()
    }

    /// Removes the mapping if present. Notifications for the device are kept.
    pub async fn delete(&self, device_id: &str) -> StoreResult<()> {
        let _timer = metrics::time_operation("device_delete");
        let removed = sqlx::query("DELETE FROM devices WHERE device_id = ?")
            .bind(device_id)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        if removed > 0 {
            DEVICE_NAMES_DELETED.inc();
            info!(device_id = %device_id, "Removed device name");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db_pool, init_memory_pool};
    use crate::models::NewNotification;
    use crate::notifications::NotificationStore;
    use time::macros::datetime;

    async fn setup() -> DeviceDirectory {
        DeviceDirectory::new(init_memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn display_name_falls_back_to_id() {
        let directory = setup().await;
        assert_eq!(directory.get_display_name("phone1").await.unwrap(), "phone1");
        assert!(directory.get("phone1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_overwrites_in_place() {
        let directory = setup().await;
        let first = directory.upsert("phone1", "Work phone").await.unwrap();
        let second = directory.upsert("phone1", "Personal phone").await.unwrap();

        assert_eq!(second.custom_name, "Personal phone");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        let all = directory.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(
            directory.get_display_name("phone1").await.unwrap(),
            "Personal phone"
        );
    }

    #[tokio::test]
    async fn list_all_returns_every_mapping() {
        let directory = setup().await;
        directory.upsert("tablet1", "Living room").await.unwrap();
        directory.upsert("phone1", "Work phone").await.unwrap();

        let ids: Vec<String> = directory
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.device_id)
            .collect();
        assert_eq!(ids, vec!["phone1", "tablet1"]);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_keeps_notifications() {
        let pool = init_memory_pool().await.unwrap();
        let directory = DeviceDirectory::new(pool.clone());
        let store = NotificationStore::new(pool);

        store
            .create(&NewNotification {
                title: "Test Title".into(),
                message: "Test Message".into(),
                timestamp: datetime!(2024-03-01 10:00:00 UTC),
                package_name: "com.test.app".into(),
                from: String::new(),
                device_id: "phone1".into(),
            })
            .await
            .unwrap();
        directory.upsert("phone1", "Work phone").await.unwrap();

        directory.delete("phone1").await.unwrap();
        directory.delete("phone1").await.unwrap();
        directory.delete("never-registered").await.unwrap();

        assert_eq!(directory.get_display_name("phone1").await.unwrap(), "phone1");
        assert_eq!(store.get_by_device("phone1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_upserts_leave_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("devices.db").display());
        let directory = DeviceDirectory::new(init_db_pool(&url, 4).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..16 {
            let directory = directory.clone();
            handles.push(tokio::spawn(async move {
                directory.upsert("phone1", &format!("name-{}", i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let all = directory.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].custom_name.starts_with("name-"));
    }
}
