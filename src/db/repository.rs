//! Database repository for notification and preference rows.
//!
//! Every query is scoped to the owning professional id. Writes are published
//! on the change hub only after they are committed.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::{Row, SqlitePool};

use super::ChangeHub;
use crate::errors::AppError;
use crate::models::{
    ChangeEvent, CreateNotificationRequest, NotificationKind, NotificationRecord, Payload,
    ProfessionalSettings, UpdateSettingsRequest,
};

const NOTIFICATION_COLUMNS: &str =
    "id, professional_id, type, title, message, data, is_read, read_at, created_at, updated_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    hub: ChangeHub,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            hub: ChangeHub::new(),
        }
    }

    /// Change hub fed by this repository's writes.
    pub fn hub(&self) -> &ChangeHub {
        &self.hub
    }

    // ==================== NOTIFICATION OPERATIONS ====================

    /// List the most recent notifications of a professional, newest first.
    pub async fn list_notifications(
        &self,
        professional_id: &str,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM professional_notifications WHERE professional_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(professional_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(notification_from_row).collect()
    }

    /// Get one notification of a professional.
    pub async fn get_notification(
        &self,
        professional_id: &str,
        id: &str,
    ) -> Result<Option<NotificationRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM professional_notifications WHERE id = ? AND professional_id = ?",
            NOTIFICATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(professional_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(notification_from_row).transpose()
    }

    /// Create a new unread notification.
    pub async fn create_notification(
        &self,
        professional_id: &str,
        request: &CreateNotificationRequest,
    ) -> Result<NotificationRecord, AppError> {
        if request.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }

        let now = Utc::now().trunc_subsecs(6);
        let record = NotificationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            subscriber_id: professional_id.to_string(),
            kind: request.resolved_kind(),
            title: request.title.clone(),
            body: request.message.clone(),
            payload: request.data.clone().unwrap_or_default(),
            is_read: false,
            read_at: None,
            created_at: now,
            updated_at: now,
        };
        let data_json = serde_json::to_string(&record.payload)?;

        sqlx::query(
            "INSERT INTO professional_notifications (id, professional_id, type, title, message, data, is_read, read_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)"
        )
        .bind(&record.id)
        .bind(professional_id)
        .bind(record.kind.as_str())
        .bind(&record.title)
        .bind(&record.body)
        .bind(&data_json)
        .bind(format_ts(&now))
        .bind(format_ts(&now))
        .execute(&self.pool)
        .await?;

        self.hub
            .publish(professional_id, ChangeEvent::Insert(record.clone()));
        Ok(record)
    }

    /// Mark one notification read. An existing `read_at` is kept.
    pub async fn mark_read(
        &self,
        professional_id: &str,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<NotificationRecord, AppError> {
        let at = format_ts(&at);
        let result = sqlx::query(
            "UPDATE professional_notifications SET is_read = 1, read_at = COALESCE(read_at, ?), updated_at = ? WHERE id = ? AND professional_id = ?"
        )
        .bind(&at)
        .bind(&at)
        .bind(id)
        .bind(professional_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }

        let record = self
            .get_notification(professional_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;

        self.hub
            .publish(professional_id, ChangeEvent::Update(record.clone()));
        Ok(record)
    }

    /// Mark a batch of notifications read in one transaction.
    ///
    /// Ids that do not belong to the professional are skipped. Returns the
    /// rows that were updated.
    pub async fn mark_many_read(
        &self,
        professional_id: &str,
        ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let at = format_ts(&at);
        let placeholders = vec!["?"; ids.len()].join(", ");

        let mut tx = self.pool.begin().await?;

        let update_sql = format!(
            "UPDATE professional_notifications SET is_read = 1, read_at = COALESCE(read_at, ?), updated_at = ? WHERE professional_id = ? AND id IN ({})",
            placeholders
        );
        let mut update = sqlx::query(&update_sql)
            .bind(&at)
            .bind(&at)
            .bind(professional_id);
        for id in ids {
            update = update.bind(id);
        }
        update.execute(&mut *tx).await?;

        let select_sql = format!(
            "SELECT {} FROM professional_notifications WHERE professional_id = ? AND id IN ({}) ORDER BY created_at DESC, rowid DESC",
            NOTIFICATION_COLUMNS, placeholders
        );
        let mut select = sqlx::query(&select_sql).bind(professional_id);
        for id in ids {
            select = select.bind(id);
        }
        let rows = select.fetch_all(&mut *tx).await?;
        let records = rows
            .iter()
            .map(notification_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await?;

        for record in &records {
            self.hub
                .publish(professional_id, ChangeEvent::Update(record.clone()));
        }
        Ok(records)
    }

    /// Delete a notification.
    pub async fn delete_notification(&self, professional_id: &str, id: &str) -> Result<(), AppError> {
        let result =
            sqlx::query("DELETE FROM professional_notifications WHERE id = ? AND professional_id = ?")
                .bind(id)
                .bind(professional_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }

        self.hub.publish(
            professional_id,
            ChangeEvent::Delete { id: id.to_string() },
        );
        Ok(())
    }

    // ==================== SETTINGS OPERATIONS ====================

    /// Get notification preferences, falling back to defaults when unset.
    pub async fn get_settings(&self, professional_id: &str) -> Result<ProfessionalSettings, AppError> {
        let row = sqlx::query(
            "SELECT professional_id, notification_sound_enabled, notification_vibration_enabled, updated_at FROM professional_settings WHERE professional_id = ?"
        )
        .bind(professional_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => settings_from_row(&row),
            None => Ok(ProfessionalSettings::defaults_for(professional_id)),
        }
    }

    /// Update notification preferences, creating the row on first write.
    pub async fn upsert_settings(
        &self,
        professional_id: &str,
        request: &UpdateSettingsRequest,
    ) -> Result<ProfessionalSettings, AppError> {
        let existing = self.get_settings(professional_id).await?;
        let now = format_ts(&Utc::now());

        let sound = request
            .notification_sound_enabled
            .unwrap_or(existing.notification_sound_enabled);
        let vibration = request
            .notification_vibration_enabled
            .unwrap_or(existing.notification_vibration_enabled);

        sqlx::query(
            r#"INSERT INTO professional_settings (professional_id, notification_sound_enabled, notification_vibration_enabled, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(professional_id) DO UPDATE SET
                   notification_sound_enabled = excluded.notification_sound_enabled,
                   notification_vibration_enabled = excluded.notification_vibration_enabled,
                   updated_at = excluded.updated_at"#,
        )
        .bind(professional_id)
        .bind(sound as i32)
        .bind(vibration as i32)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(ProfessionalSettings {
            professional_id: professional_id.to_string(),
            notification_sound_enabled: sound,
            notification_vibration_enabled: vibration,
            updated_at: Some(now),
        })
    }
}

// Helper functions for row conversion

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
fn format_ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("Invalid timestamp {:?}: {}", raw, e)))
}

fn notification_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<NotificationRecord, AppError> {
    let kind: String = row.try_get("type")?;
    let data: String = row.try_get("data")?;
    let is_read: i32 = row.try_get("is_read")?;
    let read_at: Option<String> = row.try_get("read_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(NotificationRecord {
        id: row.try_get("id")?,
        subscriber_id: row.try_get("professional_id")?,
        kind: NotificationKind::from_str(&kind).unwrap_or(NotificationKind::Custom),
        title: row.try_get("title")?,
        body: row.try_get("message")?,
        payload: serde_json::from_str::<Payload>(&data).unwrap_or_default(),
        is_read: is_read != 0,
        read_at: read_at.as_deref().map(parse_ts).transpose()?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn settings_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProfessionalSettings, AppError> {
    let sound: i32 = row.try_get("notification_sound_enabled")?;
    let vibration: i32 = row.try_get("notification_vibration_enabled")?;
    Ok(ProfessionalSettings {
        professional_id: row.try_get("professional_id")?,
        notification_sound_enabled: sound != 0,
        notification_vibration_enabled: vibration != 0,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn request(kind: &str, title: &str) -> CreateNotificationRequest {
        CreateNotificationRequest {
            kind: Some(kind.to_string()),
            title: title.to_string(),
            message: String::new(),
            data: None,
        }
    }

    #[tokio::test]
    async fn test_list_is_scoped_ordered_and_limited() {
        let (repo, _dir) = repo().await;
        for i in 0..5 {
            repo.create_notification("pro-1", &request("new_booking", &format!("n{}", i)))
                .await
                .unwrap();
        }
        repo.create_notification("pro-2", &request("new_client", "other"))
            .await
            .unwrap();

        let list = repo.list_notifications("pro-1", 3).await.unwrap();
        let titles: Vec<_> = list.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["n4", "n3", "n2"]);
        assert!(list.iter().all(|n| n.subscriber_id == "pro-1"));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let (repo, _dir) = repo().await;
        let err = repo
            .create_notification("pro-1", &request("custom", "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_mark_read_is_scoped_and_keeps_read_at() {
        let (repo, _dir) = repo().await;
        let created = repo
            .create_notification("pro-1", &request("new_review", "Review"))
            .await
            .unwrap();

        let err = repo
            .mark_read("pro-2", &created.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let first = repo.mark_read("pro-1", &created.id, Utc::now()).await.unwrap();
        assert!(first.is_read);
        let again = repo.mark_read("pro-1", &created.id, Utc::now()).await.unwrap();
        assert_eq!(again.read_at, first.read_at);
    }

    #[tokio::test]
    async fn test_mark_many_read_publishes_updates() {
        let (repo, _dir) = repo().await;
        let a = repo
            .create_notification("pro-1", &request("new_booking", "a"))
            .await
            .unwrap();
        let b = repo
            .create_notification("pro-1", &request("new_booking", "b"))
            .await
            .unwrap();
        let mut changes = repo.hub().listen();

        let updated = repo
            .mark_many_read("pro-1", &[a.id.clone(), b.id.clone()], Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);
        assert!(updated.iter().all(|n| n.is_read && n.read_at.is_some()));

        for _ in 0..2 {
            let change = changes.recv().await.unwrap();
            assert_eq!(change.professional_id, "pro-1");
            assert!(matches!(change.event, ChangeEvent::Update(_)));
        }
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (repo, _dir) = repo().await;
        let err = repo
            .delete_notification("pro-1", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_settings_default_then_upsert() {
        let (repo, _dir) = repo().await;
        let settings = repo.get_settings("pro-1").await.unwrap();
        assert!(settings.notification_sound_enabled);
        assert!(settings.notification_vibration_enabled);

        let updated = repo
            .upsert_settings(
                "pro-1",
                &UpdateSettingsRequest {
                    notification_sound_enabled: Some(false),
                    notification_vibration_enabled: None,
                },
            )
            .await
            .unwrap();
        assert!(!updated.notification_sound_enabled);
        assert!(updated.notification_vibration_enabled);

        let reloaded = repo.get_settings("pro-1").await.unwrap();
        assert_eq!(reloaded.notification_sound_enabled, false);
    }
}
