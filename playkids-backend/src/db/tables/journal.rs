//! Teachers' daily journal entries about children

use chrono::NaiveDate;
use rusqlite::{OptionalExtension, Result as SqliteResult, Row};

use crate::db::sqlite::{get_date, get_enum, get_opt_enum, get_timestamp, now_str};
use crate::db::Database;
use crate::models::{JournalEntry, JournalRequest};

const JOURNAL_SELECT: &str = "SELECT j.id, j.child_id, j.author_id, u.full_name, j.date, j.mood,
        j.appetite, j.nap_minutes, j.activities, j.note, j.created_at, j.updated_at
     FROM journal_entries j
     JOIN users u ON u.id = j.author_id";

fn row_to_entry(row: &Row) -> SqliteResult<JournalEntry> {
    Ok(JournalEntry {
        id: row.get(0)?,
        child_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        date: get_date(row, 4)?,
        mood: get_enum(row, 5)?,
        appetite: get_opt_enum(row, 6)?,
        nap_minutes: row.get(7)?,
        activities: row.get(8)?,
        note: row.get(9)?,
        created_at: get_timestamp(row, 10)?,
        updated_at: get_timestamp(row, 11)?,
    })
}

/// Filters for listing journal entries
#[derive(Debug, Clone, Default)]
pub struct JournalFilter {
    pub child_id: Option<i64>,
    /// Restrict to children of this parent
    pub parent_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Database {
    pub fn list_journal(&self, filter: &JournalFilter) -> SqliteResult<Vec<JournalEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR j.child_id = ?1)
               AND (?2 IS NULL OR j.child_id IN (SELECT id FROM children WHERE parent_id = ?2))
               AND (?3 IS NULL OR j.date >= ?3)
               AND (?4 IS NULL OR j.date <= ?4)
             ORDER BY j.date DESC, j.id DESC",
            JOURNAL_SELECT
        ))?;
        let entries = stmt
            .query_map(
                rusqlite::params![
                    filter.child_id,
                    filter.parent_id,
                    filter.from.map(|d| d.to_string()),
                    filter.to.map(|d| d.to_string())
                ],
                row_to_entry,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn get_journal_entry(&self, id: i64) -> SqliteResult<Option<JournalEntry>> {
        let conn = self.conn()?;
        conn.query_row(&format!("{} WHERE j.id = ?1", JOURNAL_SELECT), [id], row_to_entry)
            .optional()
    }

    pub fn create_journal_entry(&self, author_id: i64, req: &JournalRequest) -> SqliteResult<JournalEntry> {
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO journal_entries (child_id, author_id, date, mood, appetite, nap_minutes,
                    activities, note, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                rusqlite::params![
                    req.child_id,
                    author_id,
                    req.date.to_string(),
                    req.mood.as_ref(),
                    req.appetite.map(|a| a.as_ref().to_string()),
                    req.nap_minutes,
                    req.activities,
                    req.note,
                    now_str()
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_journal_entry(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub fn update_journal_entry(&self, id: i64, req: &JournalRequest) -> SqliteResult<Option<JournalEntry>> {
        let rows = {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE journal_entries SET child_id = ?2, date = ?3, mood = ?4, appetite = ?5,
                    nap_minutes = ?6, activities = ?7, note = ?8, updated_at = ?9
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    req.child_id,
                    req.date.to_string(),
                    req.mood.as_ref(),
                    req.appetite.map(|a| a.as_ref().to_string()),
                    req.nap_minutes,
                    req.activities,
                    req.note,
                    now_str()
                ],
            )?
        };
        if rows == 0 {
            return Ok(None);
        }
        self.get_journal_entry(id)
    }

    pub fn delete_journal_entry(&self, id: i64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM journal_entries WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
