use crate::clock::{Clock, SystemClock};
use crate::cohort::{self, CohortSelector};
use crate::db::SqliteLeadStore;
use crate::errors::{CoreError, CoreResult};
use crate::funnel::{self, FunnelSummary};
use crate::models::{
    BulkFailure, BulkOutcome, CoreSettings, Lead, LeadFilter, LeadPatch, LeadStatus, OutreachStep,
};
use crate::mutator;
use crate::sequence::{self, NextStep};
use crate::store::LeadStore;
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;

/// Facade over the sequencing core: reads answer scheduling questions,
/// writes go through the mutator and a revision-checked store update.
#[derive(Clone)]
pub struct OutreachCore {
    store: Arc<dyn LeadStore>,
    clock: Arc<dyn Clock>,
    settings: CoreSettings,
}

impl OutreachCore {
    pub fn new(
        store: Arc<dyn LeadStore>,
        clock: Arc<dyn Clock>,
        settings: CoreSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            clock,
            settings,
        })
    }

    pub fn with_sqlite(db_path: &Path, settings: CoreSettings) -> CoreResult<Arc<Self>> {
        let store = Arc::new(SqliteLeadStore::new(db_path)?);
        Ok(Self::new(store, Arc::new(SystemClock), settings))
    }

    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    pub async fn get_lead(&self, lead_id: &str) -> CoreResult<Lead> {
        self.require_lead(lead_id).await
    }

    pub async fn list_leads(&self, filter: &LeadFilter) -> CoreResult<Vec<Lead>> {
        self.store.fetch_leads(filter).await
    }

    pub async fn next_step(&self, lead_id: &str) -> CoreResult<Option<NextStep>> {
        let lead = self.require_lead(lead_id).await?;
        Ok(sequence::next_step(&lead, self.clock.as_ref()))
    }

    pub async fn cohort(&self, selector: CohortSelector) -> CoreResult<Vec<Lead>> {
        let leads = self.store.fetch_leads(&LeadFilter::default()).await?;
        Ok(cohort::select(&leads, selector, self.clock.as_ref()))
    }

    pub async fn funnel_summary(&self) -> CoreResult<FunnelSummary> {
        let leads = self.store.fetch_leads(&LeadFilter::default()).await?;
        Ok(funnel::summarize(&leads, &self.settings, self.clock.as_ref()))
    }

    pub async fn mark_cold_email_sent(
        &self,
        lead_id: &str,
        date: Option<NaiveDate>,
    ) -> CoreResult<Lead> {
        self.apply_mutation(lead_id, |lead, clock| {
            mutator::mark_cold_email_sent(lead, date, clock)
        })
        .await
    }

    pub async fn mark_step_sent(
        &self,
        lead_id: &str,
        step: OutreachStep,
        date: Option<NaiveDate>,
    ) -> CoreResult<Lead> {
        self.apply_mutation(lead_id, move |lead, clock| {
            mutator::mark_step_sent(lead, step, date, clock)
        })
        .await
    }

    pub async fn record_response(
        &self,
        lead_id: &str,
        text: Option<String>,
        date: Option<NaiveDate>,
    ) -> CoreResult<Lead> {
        self.apply_mutation(lead_id, move |lead, clock| {
            mutator::record_response(lead, text.clone(), date, clock)
        })
        .await
    }

    pub async fn set_status(&self, lead_id: &str, status: LeadStatus) -> CoreResult<Lead> {
        self.apply_mutation(lead_id, move |lead, _clock| mutator::set_status(lead, status))
            .await
    }

    pub async fn bulk_mark_cold_email_sent(
        &self,
        lead_ids: &[String],
        date: Option<NaiveDate>,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for lead_id in lead_ids {
            match self.mark_cold_email_sent(lead_id, date).await {
                Ok(_) => outcome.succeeded.push(lead_id.clone()),
                Err(error) => outcome.failed.push(bulk_failure(lead_id, "cold email", &error)),
            }
        }
        outcome
    }

    pub async fn bulk_mark_step_sent(
        &self,
        lead_ids: &[String],
        step: OutreachStep,
        date: Option<NaiveDate>,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for lead_id in lead_ids {
            match self.mark_step_sent(lead_id, step, date).await {
                Ok(_) => outcome.succeeded.push(lead_id.clone()),
                Err(error) => outcome.failed.push(bulk_failure(lead_id, step.as_str(), &error)),
            }
        }
        outcome
    }

    pub async fn bulk_set_status(&self, lead_ids: &[String], status: LeadStatus) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for lead_id in lead_ids {
            match self.set_status(lead_id, status).await {
                Ok(_) => outcome.succeeded.push(lead_id.clone()),
                Err(error) => outcome.failed.push(bulk_failure(lead_id, "status", &error)),
            }
        }
        outcome
    }

    async fn require_lead(&self, lead_id: &str) -> CoreResult<Lead> {
        self.store
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Lead '{}' not found", lead_id)))
    }

    /// Read, compute the patch, write with a revision guard. A stale write
    /// gets one retry against a fresh snapshot before surfacing.
    async fn apply_mutation<F>(&self, lead_id: &str, mutate: F) -> CoreResult<Lead>
    where
        F: Fn(&Lead, &dyn Clock) -> CoreResult<LeadPatch>,
    {
        let lead = self.require_lead(lead_id).await?;
        let patch = mutate(&lead, self.clock.as_ref())?;
        if patch.is_empty() {
            return Ok(lead);
        }

        match self.store.update_lead(lead_id, lead.revision, &patch).await {
            Err(CoreError::StaleWrite(reason)) if self.settings.retry_stale_writes => {
                tracing::warn!(lead_id = %lead_id, reason = %reason, "stale write, retrying against fresh lead");
                let fresh = self.require_lead(lead_id).await?;
                let patch = mutate(&fresh, self.clock.as_ref())?;
                if patch.is_empty() {
                    return Ok(fresh);
                }
                self.store.update_lead(lead_id, fresh.revision, &patch).await
            }
            other => other,
        }
    }
}

fn bulk_failure(lead_id: &str, operation: &str, error: &CoreError) -> BulkFailure {
    tracing::warn!(lead_id = %lead_id, operation = %operation, error = %error, "bulk mutation failed for lead");
    BulkFailure {
        id: lead_id.to_string(),
        error: error.to_string(),
    }
}
