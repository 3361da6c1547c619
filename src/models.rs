use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    FollowUp,
    InConversation,
    NoResponse,
    Converted,
    Lost,
}

impl LeadStatus {
    pub const ACTIVE_PIPELINE: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::FollowUp,
        LeadStatus::InConversation,
        LeadStatus::NoResponse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::FollowUp => "follow_up",
            Self::InConversation => "in_conversation",
            Self::NoResponse => "no_response",
            Self::Converted => "converted",
            Self::Lost => "lost",
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Converted | Self::Lost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutreachStep {
    ColdEmail,
    Sms,
    #[serde(rename = "emailFollowUp1")]
    EmailFollowUpOne,
    #[serde(rename = "emailFollowUp2")]
    EmailFollowUpTwo,
}

impl OutreachStep {
    pub const ORDERED: [OutreachStep; 4] = [
        OutreachStep::ColdEmail,
        OutreachStep::Sms,
        OutreachStep::EmailFollowUpOne,
        OutreachStep::EmailFollowUpTwo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ColdEmail => "coldEmail",
            Self::Sms => "sms",
            Self::EmailFollowUpOne => "emailFollowUp1",
            Self::EmailFollowUpTwo => "emailFollowUp2",
        }
    }

    /// Offset in days from the cold-email anchor date.
    pub fn offset_days(self) -> i64 {
        match self {
            Self::ColdEmail => 0,
            Self::Sms => 2,
            Self::EmailFollowUpOne => 6,
            Self::EmailFollowUpTwo => 10,
        }
    }

    pub fn previous(self) -> Option<OutreachStep> {
        match self {
            Self::ColdEmail => None,
            Self::Sms => Some(Self::ColdEmail),
            Self::EmailFollowUpOne => Some(Self::Sms),
            Self::EmailFollowUpTwo => Some(Self::EmailFollowUpOne),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    pub sent: bool,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub text: Option<String>,
    pub date: Option<NaiveDate>,
}

impl ResponseRecord {
    pub fn is_present(&self) -> bool {
        self.text.is_some() || self.date.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub status: LeadStatus,
    pub priority: Priority,
    pub cold_email: StepState,
    pub sms: StepState,
    #[serde(rename = "emailFollowUp1")]
    pub email_follow_up_1: StepState,
    #[serde(rename = "emailFollowUp2")]
    pub email_follow_up_2: StepState,
    pub response: ResponseRecord,
    pub follow_up_count: u32,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: i64,
}

impl Lead {
    pub fn step(&self, step: OutreachStep) -> &StepState {
        match step {
            OutreachStep::ColdEmail => &self.cold_email,
            OutreachStep::Sms => &self.sms,
            OutreachStep::EmailFollowUpOne => &self.email_follow_up_1,
            OutreachStep::EmailFollowUpTwo => &self.email_follow_up_2,
        }
    }

    /// Anchor date for follow-up offsets: the recorded cold-email date.
    pub fn anchor_date(&self) -> Option<NaiveDate> {
        self.cold_email.date
    }

    /// Terminal for scheduling: responded, converted, or lost.
    pub fn is_terminal(&self) -> bool {
        self.response.is_present() || self.status.is_closed()
    }

    pub fn apply(&mut self, patch: &LeadPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(cold_email) = patch.cold_email {
            self.cold_email = cold_email;
        }
        if let Some(sms) = patch.sms {
            self.sms = sms;
        }
        if let Some(email_follow_up_1) = patch.email_follow_up_1 {
            self.email_follow_up_1 = email_follow_up_1;
        }
        if let Some(email_follow_up_2) = patch.email_follow_up_2 {
            self.email_follow_up_2 = email_follow_up_2;
        }
        if let Some(response) = &patch.response {
            self.response = response.clone();
        }
        if let Some(follow_up_count) = patch.follow_up_count {
            self.follow_up_count = follow_up_count;
        }
        if let Some(last_contact_date) = patch.last_contact_date {
            self.last_contact_date = Some(last_contact_date);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub id: Option<String>,
    pub status: Option<LeadStatus>,
    pub priority: Option<Priority>,
    pub cold_email_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPatch {
    pub status: Option<LeadStatus>,
    pub priority: Option<Priority>,
    pub cold_email: Option<StepState>,
    pub sms: Option<StepState>,
    #[serde(rename = "emailFollowUp1")]
    pub email_follow_up_1: Option<StepState>,
    #[serde(rename = "emailFollowUp2")]
    pub email_follow_up_2: Option<StepState>,
    pub response: Option<ResponseRecord>,
    pub follow_up_count: Option<u32>,
    pub last_contact_date: Option<DateTime<Utc>>,
}

impl LeadPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.cold_email.is_none()
            && self.sms.is_none()
            && self.email_follow_up_1.is_none()
            && self.email_follow_up_2.is_none()
            && self.response.is_none()
            && self.follow_up_count.is_none()
            && self.last_contact_date.is_none()
    }

    pub fn set_step(&mut self, step: OutreachStep, state: StepState) {
        match step {
            OutreachStep::ColdEmail => self.cold_email = Some(state),
            OutreachStep::Sms => self.sms = Some(state),
            OutreachStep::EmailFollowUpOne => self.email_follow_up_1 = Some(state),
            OutreachStep::EmailFollowUpTwo => self.email_follow_up_2 = Some(state),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub priority: Option<Priority>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreSettings {
    pub average_client_value: f64,
    pub retry_stale_writes: bool,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            average_client_value: 2500.0,
            retry_stale_writes: true,
        }
    }
}
