use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{keywords_to_json, parse_datetime, parse_keywords, parse_optional_datetime},
};
use crate::models::Focus;

fn row_to_focus(row: &Row) -> Result<Focus> {
    let keywords: String = row.get("keywords")?;
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let last_activity_at: String = row.get("last_activity_at")?;
    let last_calculated_at: String = row.get("last_calculated_at")?;
    let is_active: i64 = row.get("is_active")?;

    Ok(Focus {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        item: row.get("item")?,
        keywords: parse_keywords(&keywords)?,
        is_active: is_active != 0,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        last_activity_at: parse_datetime(&last_activity_at, "last_activity_at")?,
        last_calculated_at: parse_datetime(&last_calculated_at, "last_calculated_at")?,
    })
}

const FOCUS_COLUMNS: &str =
    "id, user_id, item, keywords, is_active, started_at, ended_at, last_activity_at, last_calculated_at";

fn load_focuses_where(
    conn: &Connection,
    predicate: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Focus>> {
    let sql = format!("SELECT {FOCUS_COLUMNS} FROM focuses WHERE {predicate}");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params)?;

    let mut focuses = Vec::new();
    while let Some(row) = rows.next()? {
        focuses.push(row_to_focus(row)?);
    }
    Ok(focuses)
}

fn write_focus(conn: &Connection, focus: &Focus) -> Result<()> {
    conn.execute(
        "UPDATE focuses
         SET item = ?1,
             keywords = ?2,
             is_active = ?3,
             ended_at = ?4,
             last_activity_at = ?5,
             last_calculated_at = ?6
         WHERE id = ?7 AND user_id = ?8",
        params![
            focus.item,
            keywords_to_json(&focus.keywords)?,
            focus.is_active as i64,
            focus.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
            focus.last_activity_at.to_rfc3339(),
            focus.last_calculated_at.to_rfc3339(),
            focus.id,
            focus.user_id,
        ],
    )?;
    Ok(())
}

impl Database {
    pub async fn insert_focus(&self, focus: &Focus) -> Result<()> {
        let record = focus.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO focuses (id, user_id, item, keywords, is_active, started_at, ended_at, last_activity_at, last_calculated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.user_id,
                    record.item,
                    keywords_to_json(&record.keywords)?,
                    record.is_active as i64,
                    record.started_at.to_rfc3339(),
                    record.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.last_activity_at.to_rfc3339(),
                    record.last_calculated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Scoped by user as well as id, so a foreign id reads as absent.
    pub async fn get_focus(&self, user_id: &str, focus_id: &str) -> Result<Option<Focus>> {
        let user_id = user_id.to_string();
        let focus_id = focus_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {FOCUS_COLUMNS} FROM focuses WHERE id = ?1 AND user_id = ?2");
            let row = conn
                .query_row(&sql, params![focus_id, user_id], |row| {
                    Ok(row_to_focus(row))
                })
                .optional()?;
            row.transpose()
        })
        .await
    }

    /// Active focuses ordered by most recent activity first.
    pub async fn get_active_focuses(&self, user_id: &str) -> Result<Vec<Focus>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut focuses =
                load_focuses_where(conn, "user_id = ?1 AND is_active = 1", &[&user_id])?;
            focuses.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
            Ok(focuses)
        })
        .await
    }

    pub async fn has_active_focus(&self, user_id: &str) -> Result<bool> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM focuses WHERE user_id = ?1 AND is_active = 1",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    /// Ended focuses with `ended_at >= cutoff`, most recently ended first,
    /// at most `limit` entries.
    pub async fn get_resumable_focuses(
        &self,
        user_id: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Focus>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut focuses = load_focuses_where(
                conn,
                "user_id = ?1 AND is_active = 0 AND ended_at IS NOT NULL",
                &[&user_id],
            )?;
            focuses.retain(|f| f.ended_at.map_or(false, |ended| ended >= cutoff));
            focuses.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
            focuses.truncate(limit);
            Ok(focuses)
        })
        .await
    }

    /// The most recently ended focus, if any. Anchors the no-focus window.
    pub async fn get_last_ended_focus(&self, user_id: &str) -> Result<Option<Focus>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut focuses = load_focuses_where(
                conn,
                "user_id = ?1 AND is_active = 0 AND ended_at IS NOT NULL",
                &[&user_id],
            )?;
            focuses.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));
            Ok(focuses.into_iter().next())
        })
        .await
    }

    pub async fn update_focus(&self, focus: &Focus) -> Result<()> {
        let record = focus.clone();
        self.execute(move |conn| write_focus(conn, &record)).await
    }

    /// Write several focus rows in one transaction. Used by merge so a
    /// reader never sees the primary updated without the secondary ended.
    pub async fn update_focuses_atomic(&self, focuses: Vec<Focus>) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            for focus in &focuses {
                write_focus(&tx, focus)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Bulk-end every active focus whose last activity predates `cutoff`.
    /// Returns the ended snapshots after the transaction commits.
    pub async fn end_inactive_focuses(
        &self,
        user_id: &str,
        cutoff: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<Vec<Focus>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let mut stale =
                load_focuses_where(&tx, "user_id = ?1 AND is_active = 1", &[&user_id])?;
            stale.retain(|f| f.last_activity_at < cutoff);

            for focus in &mut stale {
                focus.is_active = false;
                focus.ended_at = Some(ended_at);
                write_focus(&tx, focus)?;
            }

            tx.commit()?;
            Ok(stale)
        })
        .await
    }
}
