use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::metrics::{self, NOTIFICATIONS_INGESTED, NOTIFICATIONS_PURGED, NOTIFICATIONS_TOMBSTONED};
use crate::models::{saturating_nanos, to_nanos, DeviceSummary, NewNotification, Notification, NotificationRow};

/// The notification event log.
///
/// Every read excludes tombstoned rows (`deleted_at IS NOT NULL`) and returns
/// device feeds newest first, ties broken by id. Search matching is
/// case-insensitive for ASCII letters and exact for everything else.
#[derive(Clone)]
pub struct NotificationStore {
    db_pool: SqlitePool,
}

fn into_notifications(rows: Vec<NotificationRow>) -> StoreResult<Vec<Notification>> {
    rows.into_iter().map(Notification::try_from).collect()
}

impl NotificationStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn create(&self, notification: &NewNotification) -> StoreResult<Notification> {
        let _timer = metrics::time_operation("create");
        let now = to_nanos(OffsetDateTime::now_utc())?;

        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications
                (title, message, timestamp, package_name, "from", device_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, title, message, timestamp, package_name, "from", device_id, created_at, updated_at
            "#,
        )
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(to_nanos(notification.timestamp)?)
        .bind(&notification.package_name)
        .bind(&notification.from)
        .bind(&notification.device_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        NOTIFICATIONS_INGESTED.inc();
        debug!(id = row.id, device_id = %row.device_id, "Stored notification");
        Notification::try_from(row)
    }

    pub async fn get_by_id(&self, id: i64) -> StoreResult<Notification> {
        let _timer = metrics::time_operation("get_by_id");
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, title, message, timestamp, package_name, "from", device_id, created_at, updated_at
            FROM notifications
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    pub async fn get_by_device(&self, device_id: &str) -> StoreResult<Vec<Notification>> {
        let _timer = metrics::time_operation("get_by_device");
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, title, message, timestamp, package_name, "from", device_id, created_at, updated_at
            FROM notifications
            WHERE device_id = ? AND deleted_at IS NULL
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(device_id)
        .fetch_all(&self.db_pool)
        .await?;

        debug!(device_id = %device_id, count = rows.len(), "Fetched device feed");
        into_notifications(rows)
    }

    /// Notifications with `start <= timestamp <= end`. Ordering of the bounds
    /// is checked by the caller; reversed bounds simply match nothing. Bounds
    /// beyond the storable window are clamped to it.
    pub async fn get_by_date_range(
        &self,
        device_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> StoreResult<Vec<Notification>> {
        let _timer = metrics::time_operation("get_by_date_range");
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, title, message, timestamp, package_name, "from", device_id, created_at, updated_at
            FROM notifications
            WHERE device_id = ? AND deleted_at IS NULL AND timestamp BETWEEN ? AND ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(device_id)
        .bind(saturating_nanos(start))
        .bind(saturating_nanos(end))
        .fetch_all(&self.db_pool)
        .await?;

        debug!(device_id = %device_id, %start, %end, count = rows.len(), "Fetched date range");
        into_notifications(rows)
    }

    /// Substring match over title, message and sender. The query is literal
    /// text; `%` and `_` carry no wildcard meaning.
    pub async fn search(&self, device_id: &str, query: &str) -> StoreResult<Vec<Notification>> {
        let _timer = metrics::time_operation("search");
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, title, message, timestamp, package_name, "from", device_id, created_at, updated_at
            FROM notifications
            WHERE device_id = ? AND deleted_at IS NULL
              AND (instr(lower(title), lower(?)) > 0
                OR instr(lower(message), lower(?)) > 0
                OR instr(lower("from"), lower(?)) > 0)
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(device_id)
        .bind(query)
        .bind(query)
        .bind(query)
        .fetch_all(&self.db_pool)
        .await?;

        debug!(device_id = %device_id, query = %query, count = rows.len(), "Searched notifications");
        into_notifications(rows)
    }

    /// Distinct device ids present in the live log, sorted.
    pub async fn list_devices(&self) -> StoreResult<Vec<String>> {
        let _timer = metrics::time_operation("list_devices");
        let devices = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT device_id
            FROM notifications
            WHERE deleted_at IS NULL
            ORDER BY device_id
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(devices)
    }

    /// Distinct device ids joined against the device directory. A device with
    /// no registered name is listed under its own id.
    pub async fn list_devices_with_names(&self) -> StoreResult<Vec<DeviceSummary>> {
        let _timer = metrics::time_operation("list_devices_with_names");
        let devices = sqlx::query_as::<_, DeviceSummary>(
            r#"
            SELECT n.device_id AS device_id,
                   COALESCE(NULLIF(d.custom_name, ''), n.device_id) AS display_name
            FROM (
                SELECT DISTINCT device_id
                FROM notifications
                WHERE deleted_at IS NULL
            ) AS n
            LEFT JOIN devices AS d ON d.device_id = n.device_id
            ORDER BY n.device_id
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(devices)
    }

    /// Tombstones a single notification. The row stays on disk until
    /// [`NotificationStore::purge_deleted`] runs.
    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        let _timer = metrics::time_operation("delete");
        let now = to_nanos(OffsetDateTime::now_utc())?;
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET deleted_at = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        NOTIFICATIONS_TOMBSTONED.inc();
        info!(id, "Tombstoned notification");
        Ok(())
    }

    /// Physically removes tombstoned rows.
    pub async fn purge_deleted(&self) -> StoreResult<u64> {
        let _timer = metrics::time_operation("purge_deleted");
        let purged = sqlx::query("DELETE FROM notifications WHERE deleted_at IS NOT NULL")
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        NOTIFICATIONS_PURGED.inc_by(purged as f64);
        info!(purged, "Purged tombstoned notifications");
        Ok(purged)
    }

    /// Hard delete of the entire log, live and tombstoned rows alike. This is
    /// a physical purge, not a tombstone: nothing can be restored afterwards.
    /// Device name mappings are untouched.
    pub async fn delete_all(&self) -> StoreResult<u64> {
        let _timer = metrics::time_operation("delete_all");
        let mut tx = self.db_pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM notifications")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        NOTIFICATIONS_PURGED.inc_by(deleted as f64);
        info!(deleted, "Deleted all notifications");
        Ok(deleted)
    }
}
