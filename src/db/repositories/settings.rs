use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_optional_datetime, to_i64, to_u64},
};
use crate::models::UserSettings;

fn row_to_settings(row: &Row) -> Result<UserSettings> {
    let enabled: i64 = row.get("focus_calculation_enabled")?;
    let interval_ms: i64 = row.get("focus_calculation_interval_ms")?;
    let inactivity_ms: i64 = row.get("focus_inactivity_threshold_ms")?;
    let min_duration_ms: i64 = row.get("focus_min_duration_ms")?;
    let last_calculated: Option<String> = row.get("last_focus_calculated_at")?;

    Ok(UserSettings {
        user_id: row.get("user_id")?,
        focus_calculation_enabled: enabled != 0,
        focus_calculation_interval_ms: to_u64(interval_ms, "focus_calculation_interval_ms")?,
        focus_inactivity_threshold_ms: to_u64(inactivity_ms, "focus_inactivity_threshold_ms")?,
        focus_min_duration_ms: to_u64(min_duration_ms, "focus_min_duration_ms")?,
        last_focus_calculated_at: parse_optional_datetime(
            last_calculated,
            "last_focus_calculated_at",
        )?,
    })
}

const SETTINGS_COLUMNS: &str = "user_id, focus_calculation_enabled, focus_calculation_interval_ms, focus_inactivity_threshold_ms, focus_min_duration_ms, last_focus_calculated_at";

impl Database {
    pub async fn upsert_user_settings(&self, settings: &UserSettings) -> Result<()> {
        let record = settings.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO user_settings (user_id, focus_calculation_enabled, focus_calculation_interval_ms, focus_inactivity_threshold_ms, focus_min_duration_ms, last_focus_calculated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id) DO UPDATE SET
                     focus_calculation_enabled = excluded.focus_calculation_enabled,
                     focus_calculation_interval_ms = excluded.focus_calculation_interval_ms,
                     focus_inactivity_threshold_ms = excluded.focus_inactivity_threshold_ms,
                     focus_min_duration_ms = excluded.focus_min_duration_ms,
                     last_focus_calculated_at = excluded.last_focus_calculated_at",
                params![
                    record.user_id,
                    record.focus_calculation_enabled as i64,
                    to_i64(record.focus_calculation_interval_ms)?,
                    to_i64(record.focus_inactivity_threshold_ms)?,
                    to_i64(record.focus_min_duration_ms)?,
                    record
                        .last_focus_calculated_at
                        .as_ref()
                        .map(|dt| dt.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_user_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {SETTINGS_COLUMNS} FROM user_settings WHERE user_id = ?1");
            let row = conn
                .query_row(&sql, params![user_id], |row| Ok(row_to_settings(row)))
                .optional()?;
            row.transpose()
        })
        .await
    }

    /// Load settings for a user, creating a defaults row on first contact.
    pub async fn get_or_create_user_settings(&self, user_id: &str) -> Result<UserSettings> {
        if let Some(settings) = self.get_user_settings(user_id).await? {
            return Ok(settings);
        }
        let defaults = UserSettings::defaults_for(user_id);
        self.upsert_user_settings(&defaults).await?;
        Ok(defaults)
    }

    pub async fn set_last_focus_calculated_at(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE user_settings
                 SET last_focus_calculated_at = ?1
                 WHERE user_id = ?2",
                params![at.to_rfc3339(), user_id],
            )?;
            Ok(())
        })
        .await
    }

    /// Every user with focus calculation enabled. Driver input; the
    /// interval check happens in the driver with parsed timestamps.
    pub async fn list_enabled_settings(&self) -> Result<Vec<UserSettings>> {
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SETTINGS_COLUMNS} FROM user_settings WHERE focus_calculation_enabled = 1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;

            let mut settings = Vec::new();
            while let Some(row) = rows.next()? {
                settings.push(row_to_settings(row)?);
            }
            Ok(settings)
        })
        .await
    }
}
