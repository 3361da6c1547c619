use crate::errors::{CoreError, CoreResult};
use crate::models::{
    Lead, LeadFilter, LeadPatch, LeadStatus, NewLead, Priority, ResponseRecord, StepState,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lead persistence boundary. Implementations are expected to enforce
/// revision checks on writes so concurrent mutations surface as
/// `CoreError::StaleWrite` instead of silently clobbering each other.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn fetch_leads(&self, filter: &LeadFilter) -> CoreResult<Vec<Lead>>;

    async fn get_lead(&self, lead_id: &str) -> CoreResult<Option<Lead>>;

    /// Apply `patch` if the stored revision still equals
    /// `expected_revision`, then return the updated lead.
    async fn update_lead(
        &self,
        lead_id: &str,
        expected_revision: i64,
        patch: &LeadPatch,
    ) -> CoreResult<Lead>;
}

pub(crate) fn build_lead(new_lead: NewLead) -> Lead {
    let now = Utc::now();
    Lead {
        id: new_lead
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        status: new_lead.status.unwrap_or(LeadStatus::New),
        priority: new_lead.priority.unwrap_or(Priority::Medium),
        cold_email: StepState {
            sent: false,
            date: new_lead.cold_email_date,
        },
        sms: StepState::default(),
        email_follow_up_1: StepState::default(),
        email_follow_up_2: StepState::default(),
        response: ResponseRecord::default(),
        follow_up_count: 0,
        last_contact_date: None,
        created_at: now,
        updated_at: now,
        revision: 1,
    }
}

pub(crate) fn matches_filter(lead: &Lead, filter: &LeadFilter) -> bool {
    if let Some(status) = filter.status {
        if lead.status != status {
            return false;
        }
    }
    if let Some(priority) = filter.priority {
        if lead.priority != priority {
            return false;
        }
    }
    true
}

#[derive(Clone, Default)]
pub struct MemoryLeadStore {
    leads: Arc<RwLock<HashMap<String, Lead>>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_lead(&self, new_lead: NewLead) -> CoreResult<Lead> {
        let lead = build_lead(new_lead);
        let mut leads = self.leads.write().await;
        if leads.contains_key(&lead.id) {
            return Err(CoreError::Storage(format!(
                "lead {} already exists",
                lead.id
            )));
        }
        leads.insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    /// Insert a fully formed lead, replacing any existing record. Used to
    /// load snapshots from an upstream CRM and to stage test fixtures.
    pub async fn seed_lead(&self, lead: Lead) {
        self.leads.write().await.insert(lead.id.clone(), lead);
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn fetch_leads(&self, filter: &LeadFilter) -> CoreResult<Vec<Lead>> {
        let leads = self.leads.read().await;
        let mut items: Vec<Lead> = leads
            .values()
            .filter(|lead| matches_filter(lead, filter))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let offset = filter.offset.unwrap_or(0) as usize;
        let mut items: Vec<Lead> = items.into_iter().skip(offset).collect();
        if let Some(limit) = filter.limit {
            items.truncate(limit as usize);
        }
        Ok(items)
    }

    async fn get_lead(&self, lead_id: &str) -> CoreResult<Option<Lead>> {
        Ok(self.leads.read().await.get(lead_id).cloned())
    }

    async fn update_lead(
        &self,
        lead_id: &str,
        expected_revision: i64,
        patch: &LeadPatch,
    ) -> CoreResult<Lead> {
        let mut leads = self.leads.write().await;
        let lead = leads
            .get_mut(lead_id)
            .ok_or_else(|| CoreError::NotFound(format!("Lead '{}' not found", lead_id)))?;
        if lead.revision != expected_revision {
            return Err(CoreError::StaleWrite(format!(
                "lead {} is at revision {}, write expected revision {}",
                lead_id, lead.revision, expected_revision
            )));
        }
        lead.apply(patch);
        lead.revision += 1;
        lead.updated_at = Utc::now();
        Ok(lead.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[tokio::test]
    async fn insert_applies_defaults() {
        let store = MemoryLeadStore::new();
        let lead = store
            .insert_lead(NewLead::default())
            .await
            .expect("insert lead");

        assert!(!lead.id.is_empty());
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.priority, Priority::Medium);
        assert!(!lead.cold_email.sent);
        assert_eq!(lead.revision, 1);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = MemoryLeadStore::new();
        let mut new_lead = NewLead::default();
        new_lead.id = Some("lead-1".to_string());

        store
            .insert_lead(new_lead.clone())
            .await
            .expect("first insert");
        let err = store.insert_lead(new_lead).await.err().expect("duplicate");
        assert!(matches!(err, CoreError::Storage(_)));
    }

    #[tokio::test]
    async fn update_bumps_revision_and_rejects_stale_writes() {
        let store = MemoryLeadStore::new();
        let mut new_lead = NewLead::default();
        new_lead.id = Some("lead-1".to_string());
        let lead = store.insert_lead(new_lead).await.expect("insert");

        let mut patch = LeadPatch::default();
        patch.status = Some(LeadStatus::Contacted);
        let updated = store
            .update_lead("lead-1", lead.revision, &patch)
            .await
            .expect("update");
        assert_eq!(updated.revision, 2);
        assert_eq!(updated.status, LeadStatus::Contacted);

        let err = store
            .update_lead("lead-1", lead.revision, &patch)
            .await
            .err()
            .expect("stale");
        assert!(matches!(err, CoreError::StaleWrite(_)));
    }

    #[tokio::test]
    async fn update_unknown_lead_is_not_found() {
        let store = MemoryLeadStore::new();
        let err = store
            .update_lead("missing", 1, &LeadPatch::default())
            .await
            .err()
            .expect("not found");
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn fetch_filters_by_status_and_pages() {
        let store = MemoryLeadStore::new();
        for (id, status) in [
            ("a", LeadStatus::New),
            ("b", LeadStatus::Contacted),
            ("c", LeadStatus::New),
            ("d", LeadStatus::New),
        ] {
            let mut new_lead = NewLead::default();
            new_lead.id = Some(id.to_string());
            new_lead.status = Some(status);
            store.insert_lead(new_lead).await.expect("insert");
        }

        let mut filter = LeadFilter::default();
        filter.status = Some(LeadStatus::New);
        let matched = store.fetch_leads(&filter).await.expect("fetch");
        assert_eq!(matched.len(), 3);
        assert!(matched.iter().all(|lead| lead.status == LeadStatus::New));

        filter.limit = Some(2);
        let paged = store.fetch_leads(&filter).await.expect("fetch");
        assert_eq!(paged.len(), 2);

        filter.offset = Some(2);
        let rest = store.fetch_leads(&filter).await.expect("fetch");
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn seed_preserves_provided_fields() {
        let store = MemoryLeadStore::new();
        let mut lead = build_lead(NewLead::default());
        lead.id = "seeded".to_string();
        lead.cold_email = StepState {
            sent: true,
            date: Some(day(2024, 1, 1)),
        };
        lead.revision = 7;
        store.seed_lead(lead).await;

        let loaded = store
            .get_lead("seeded")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(loaded.revision, 7);
        assert_eq!(loaded.cold_email.date, Some(day(2024, 1, 1)));
    }
}
