use crate::errors::{CoreError, CoreResult};
use crate::models::{
    CoreSettings, Lead, LeadFilter, LeadPatch, LeadStatus, NewLead, Priority, ResponseRecord,
    StepState,
};
use crate::store::{build_lead, LeadStore};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const LEAD_COLUMNS: &str = "id, status, priority, cold_email_sent, cold_email_date, sms_sent, sms_date, \
     email_follow_up_1_sent, email_follow_up_1_date, email_follow_up_2_sent, email_follow_up_2_date, \
     response_text, response_date, follow_up_count, last_contact_date, created_at, updated_at, revision";

#[derive(Debug)]
pub struct SqliteLeadStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteLeadStore {
    pub fn new(path: &Path) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| CoreError::Storage(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(CoreError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(CoreError::from)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };

        store.ensure_schema_extensions()?;

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn insert_lead(&self, new_lead: NewLead) -> CoreResult<Lead> {
        let lead = build_lead(new_lead);

        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Internal("lead store mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO leads (
               id, status, priority, cold_email_sent, cold_email_date, sms_sent, sms_date,
               email_follow_up_1_sent, email_follow_up_1_date, email_follow_up_2_sent, email_follow_up_2_date,
               response_text, response_date, follow_up_count, last_contact_date, created_at, updated_at, revision
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                lead.id,
                lead.status.as_str(),
                lead.priority.as_str(),
                lead.cold_email.sent,
                lead.cold_email.date.map(|date| date.to_string()),
                lead.sms.sent,
                lead.sms.date.map(|date| date.to_string()),
                lead.email_follow_up_1.sent,
                lead.email_follow_up_1.date.map(|date| date.to_string()),
                lead.email_follow_up_2.sent,
                lead.email_follow_up_2.date.map(|date| date.to_string()),
                lead.response.text,
                lead.response.date.map(|date| date.to_string()),
                lead.follow_up_count,
                lead.last_contact_date.map(|at| at.to_rfc3339()),
                lead.created_at.to_rfc3339(),
                lead.updated_at.to_rfc3339(),
                lead.revision,
            ],
        )?;

        Ok(lead)
    }

    fn fetch_leads_inner(&self, filter: &LeadFilter) -> CoreResult<Vec<Lead>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Internal("lead store mutex poisoned".to_string()))?;
        let mut query = format!("SELECT {} FROM leads WHERE 1 = 1", LEAD_COLUMNS);

        let mut params_vec: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            params_vec.push(status.as_str().to_string());
        }
        if let Some(priority) = filter.priority {
            query.push_str(" AND priority = ?");
            params_vec.push(priority.as_str().to_string());
        }

        query.push_str(" ORDER BY created_at DESC, id ASC");

        // Negative LIMIT means unbounded in SQLite; the funnel reads the
        // whole lead set.
        let limit: i64 = filter.limit.map(i64::from).unwrap_or(-1);
        let offset: i64 = filter.offset.map(i64::from).unwrap_or(0);
        query.push_str(" LIMIT ? OFFSET ?");

        let mut statement = conn.prepare(&query)?;
        let mut dyn_params: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|param| param as &dyn rusqlite::ToSql)
            .collect();
        dyn_params.push(&limit);
        dyn_params.push(&offset);

        let rows = statement.query_map(rusqlite::params_from_iter(dyn_params), parse_lead_row)?;
        let mut result = Vec::new();
        for row in rows {
            match row {
                Ok(lead) => result.push(lead),
                // One corrupt row must not take down list reads.
                Err(error) => {
                    tracing::warn!(error = %error, "skipping malformed lead row");
                }
            }
        }
        Ok(result)
    }

    fn get_lead_inner(&self, lead_id: &str) -> CoreResult<Option<Lead>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Internal("lead store mutex poisoned".to_string()))?;
        lead_by_id(&conn, lead_id)
    }

    fn update_lead_inner(
        &self,
        lead_id: &str,
        expected_revision: i64,
        patch: &LeadPatch,
    ) -> CoreResult<Lead> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Internal("lead store mutex poisoned".to_string()))?;

        let mut lead = lead_by_id(&conn, lead_id)?
            .ok_or_else(|| CoreError::NotFound(format!("Lead '{}' not found", lead_id)))?;
        if lead.revision != expected_revision {
            return Err(CoreError::StaleWrite(format!(
                "lead {} is at revision {}, write expected revision {}",
                lead_id, lead.revision, expected_revision
            )));
        }

        lead.apply(patch);
        lead.revision = expected_revision + 1;
        lead.updated_at = Utc::now();

        // The revision guard in the WHERE clause protects against writers
        // on other connections to the same file.
        let updated = conn.execute(
            "UPDATE leads SET
               status = ?1, priority = ?2, cold_email_sent = ?3, cold_email_date = ?4,
               sms_sent = ?5, sms_date = ?6, email_follow_up_1_sent = ?7, email_follow_up_1_date = ?8,
               email_follow_up_2_sent = ?9, email_follow_up_2_date = ?10, response_text = ?11,
               response_date = ?12, follow_up_count = ?13, last_contact_date = ?14,
               updated_at = ?15, revision = ?16
             WHERE id = ?17 AND revision = ?18",
            params![
                lead.status.as_str(),
                lead.priority.as_str(),
                lead.cold_email.sent,
                lead.cold_email.date.map(|date| date.to_string()),
                lead.sms.sent,
                lead.sms.date.map(|date| date.to_string()),
                lead.email_follow_up_1.sent,
                lead.email_follow_up_1.date.map(|date| date.to_string()),
                lead.email_follow_up_2.sent,
                lead.email_follow_up_2.date.map(|date| date.to_string()),
                lead.response.text,
                lead.response.date.map(|date| date.to_string()),
                lead.follow_up_count,
                lead.last_contact_date.map(|at| at.to_rfc3339()),
                lead.updated_at.to_rfc3339(),
                lead.revision,
                lead_id,
                expected_revision,
            ],
        )?;
        if updated == 0 {
            return Err(CoreError::StaleWrite(format!(
                "lead {} was updated concurrently",
                lead_id
            )));
        }

        Ok(lead)
    }

    pub fn get_settings(&self) -> CoreResult<CoreSettings> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Internal("lead store mutex poisoned".to_string()))?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'core'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<CoreSettings>(&raw).unwrap_or_default()),
            None => Ok(CoreSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> CoreResult<CoreSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: CoreSettings = serde_json::from_value(merged)?;

        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Internal("lead store mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('core', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }

    fn ensure_schema_extensions(&self) -> CoreResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Internal("lead store mutex poisoned".to_string()))?;

        if !column_exists(&conn, "leads", "priority")? {
            conn.execute(
                "ALTER TABLE leads ADD COLUMN priority TEXT NOT NULL DEFAULT 'medium'",
                [],
            )?;
        }
        if !column_exists(&conn, "leads", "revision")? {
            conn.execute(
                "ALTER TABLE leads ADD COLUMN revision INTEGER NOT NULL DEFAULT 1",
                [],
            )?;
        }

        Ok(())
    }
}

#[async_trait]
impl LeadStore for SqliteLeadStore {
    async fn fetch_leads(&self, filter: &LeadFilter) -> CoreResult<Vec<Lead>> {
        self.fetch_leads_inner(filter)
    }

    async fn get_lead(&self, lead_id: &str) -> CoreResult<Option<Lead>> {
        self.get_lead_inner(lead_id)
    }

    async fn update_lead(
        &self,
        lead_id: &str,
        expected_revision: i64,
        patch: &LeadPatch,
    ) -> CoreResult<Lead> {
        self.update_lead_inner(lead_id, expected_revision, patch)
    }
}

fn lead_by_id(conn: &Connection, lead_id: &str) -> CoreResult<Option<Lead>> {
    conn.query_row(
        &format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS),
        [lead_id],
        parse_lead_row,
    )
    .optional()
    .map_err(CoreError::from)
}

fn parse_lead_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        status: parse_status(&row.get::<_, String>(1)?)?,
        priority: parse_priority(&row.get::<_, String>(2)?)?,
        cold_email: StepState {
            sent: row.get(3)?,
            date: parse_opt_day(row.get::<_, Option<String>>(4)?)?,
        },
        sms: StepState {
            sent: row.get(5)?,
            date: parse_opt_day(row.get::<_, Option<String>>(6)?)?,
        },
        email_follow_up_1: StepState {
            sent: row.get(7)?,
            date: parse_opt_day(row.get::<_, Option<String>>(8)?)?,
        },
        email_follow_up_2: StepState {
            sent: row.get(9)?,
            date: parse_opt_day(row.get::<_, Option<String>>(10)?)?,
        },
        response: ResponseRecord {
            text: row.get(11)?,
            date: parse_opt_day(row.get::<_, Option<String>>(12)?)?,
        },
        follow_up_count: row.get(13)?,
        last_contact_date: match row.get::<_, Option<String>>(14)? {
            Some(raw) => Some(parse_time(&raw)?),
            None => None,
        },
        created_at: parse_time(&row.get::<_, String>(15)?)?,
        updated_at: parse_time(&row.get::<_, String>(16)?)?,
        revision: row.get(17)?,
    })
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> CoreResult<bool> {
    let pragma = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&pragma)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn parse_status(raw: &str) -> rusqlite::Result<LeadStatus> {
    match raw {
        "new" => Ok(LeadStatus::New),
        "contacted" => Ok(LeadStatus::Contacted),
        "follow_up" => Ok(LeadStatus::FollowUp),
        "in_conversation" => Ok(LeadStatus::InConversation),
        "no_response" => Ok(LeadStatus::NoResponse),
        "converted" => Ok(LeadStatus::Converted),
        "lost" => Ok(LeadStatus::Lost),
        other => Err(conversion_failure(format!(
            "Unknown lead status '{}'",
            other
        ))),
    }
}

fn parse_priority(raw: &str) -> rusqlite::Result<Priority> {
    match raw {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        other => Err(conversion_failure(format!("Unknown priority '{}'", other))),
    }
}

fn parse_day(raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|error| conversion_failure(error.to_string()))
}

fn parse_opt_day(raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    match raw {
        Some(raw) => Ok(Some(parse_day(&raw)?)),
        None => Ok(None),
    }
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| conversion_failure(error.to_string()))
}

fn conversion_failure(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message,
        )),
    )
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(
                    target_map.entry(key).or_insert(serde_json::Value::Null),
                    value,
                );
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteLeadStore;
    use crate::errors::CoreError;
    use crate::models::{LeadFilter, LeadPatch, LeadStatus, NewLead, Priority, StepState};
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn new_lead(id: &str) -> NewLead {
        let mut new_lead = NewLead::default();
        new_lead.id = Some(id.to_string());
        new_lead
    }

    #[test]
    fn store_round_trips_a_lead() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteLeadStore::new(&dir.path().join("test.db")).expect("store");

        let mut payload = new_lead("lead-1");
        payload.cold_email_date = Some(day(2024, 1, 1));
        payload.priority = Some(Priority::High);
        let inserted = store.insert_lead(payload).expect("insert lead");
        assert_eq!(inserted.revision, 1);

        let loaded = store
            .get_lead_inner("lead-1")
            .expect("get lead")
            .expect("lead exists");
        assert_eq!(loaded.id, "lead-1");
        assert_eq!(loaded.status, LeadStatus::New);
        assert_eq!(loaded.priority, Priority::High);
        assert!(!loaded.cold_email.sent);
        assert_eq!(loaded.cold_email.date, Some(day(2024, 1, 1)));
        assert!(loaded.response.text.is_none());
        assert_eq!(loaded.revision, 1);
    }

    #[test]
    fn update_guards_on_revision() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteLeadStore::new(&dir.path().join("test.db")).expect("store");
        store.insert_lead(new_lead("lead-1")).expect("insert lead");

        let mut patch = LeadPatch::default();
        patch.status = Some(LeadStatus::Contacted);
        patch.cold_email = Some(StepState {
            sent: true,
            date: Some(day(2024, 1, 1)),
        });

        let updated = store
            .update_lead_inner("lead-1", 1, &patch)
            .expect("update lead");
        assert_eq!(updated.revision, 2);
        assert_eq!(updated.status, LeadStatus::Contacted);
        assert!(updated.cold_email.sent);

        let err = store
            .update_lead_inner("lead-1", 1, &patch)
            .err()
            .expect("stale write");
        assert!(matches!(err, CoreError::StaleWrite(_)));

        let err = store
            .update_lead_inner("missing", 1, &patch)
            .err()
            .expect("not found");
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn fetch_applies_filters_and_paging() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteLeadStore::new(&dir.path().join("test.db")).expect("store");

        for (id, status) in [
            ("a", LeadStatus::New),
            ("b", LeadStatus::Contacted),
            ("c", LeadStatus::New),
            ("d", LeadStatus::New),
        ] {
            let mut payload = new_lead(id);
            payload.status = Some(status);
            store.insert_lead(payload).expect("insert lead");
        }

        let all = store
            .fetch_leads_inner(&LeadFilter::default())
            .expect("fetch all");
        assert_eq!(all.len(), 4);

        let mut filter = LeadFilter::default();
        filter.status = Some(LeadStatus::New);
        let matched = store.fetch_leads_inner(&filter).expect("fetch filtered");
        assert_eq!(matched.len(), 3);
        assert!(matched.iter().all(|lead| lead.status == LeadStatus::New));

        filter.limit = Some(2);
        let paged = store.fetch_leads_inner(&filter).expect("fetch paged");
        assert_eq!(paged.len(), 2);

        filter.offset = Some(2);
        let rest = store.fetch_leads_inner(&filter).expect("fetch rest");
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn settings_merge_preserves_unset_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteLeadStore::new(&dir.path().join("test.db")).expect("store");

        let defaults = store.get_settings().expect("defaults");
        assert_eq!(defaults.average_client_value, 2500.0);
        assert!(defaults.retry_stale_writes);

        let updated = store
            .update_settings(serde_json::json!({ "averageClientValue": 4000.0 }))
            .expect("update settings");
        assert_eq!(updated.average_client_value, 4000.0);
        assert!(updated.retry_stale_writes);

        let reloaded = store.get_settings().expect("reload");
        assert_eq!(reloaded.average_client_value, 4000.0);
    }

    #[test]
    fn reopening_preserves_data_and_migrations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("test.db");

        {
            let store = SqliteLeadStore::new(&db_path).expect("store");
            let mut payload = new_lead("lead-1");
            payload.priority = Some(Priority::Low);
            store.insert_lead(payload).expect("insert lead");
            let mut patch = LeadPatch::default();
            patch.status = Some(LeadStatus::Contacted);
            store
                .update_lead_inner("lead-1", 1, &patch)
                .expect("update lead");
        }

        let reopened = SqliteLeadStore::new(&db_path).expect("reopen");
        let lead = reopened
            .get_lead_inner("lead-1")
            .expect("get lead")
            .expect("lead exists");
        assert_eq!(lead.priority, Priority::Low);
        assert_eq!(lead.status, LeadStatus::Contacted);
        assert_eq!(lead.revision, 2);
    }
}
