use crate::clock::{add_days, Clock};
use crate::errors::{CoreError, CoreResult};
use crate::models::{Lead, LeadPatch, LeadStatus, OutreachStep, ResponseRecord, StepState};
use chrono::NaiveDate;

const MAX_DATE_AHEAD_DAYS: i64 = 365;

fn validate_explicit_date(date: NaiveDate, clock: &dyn Clock) -> CoreResult<()> {
    let horizon = add_days(clock.today(), MAX_DATE_AHEAD_DAYS);
    if date > horizon {
        return Err(CoreError::InvalidDate(format!(
            "date {} is more than {} days in the future",
            date, MAX_DATE_AHEAD_DAYS
        )));
    }
    Ok(())
}

/// Patch that marks the cold email sent. Empty when the flag is already
/// set; the first recorded send wins.
pub fn mark_cold_email_sent(
    lead: &Lead,
    explicit_date: Option<NaiveDate>,
    clock: &dyn Clock,
) -> CoreResult<LeadPatch> {
    if let Some(date) = explicit_date {
        validate_explicit_date(date, clock)?;
    }

    let mut patch = LeadPatch::default();
    if lead.cold_email.sent {
        return Ok(patch);
    }

    let date = explicit_date
        .or(lead.cold_email.date)
        .unwrap_or_else(|| clock.today());
    patch.cold_email = Some(StepState {
        sent: true,
        date: Some(date),
    });
    patch.last_contact_date = Some(clock.now());
    if lead.status == LeadStatus::New {
        patch.status = Some(LeadStatus::Contacted);
    }
    Ok(patch)
}

pub fn mark_step_sent(
    lead: &Lead,
    step: OutreachStep,
    explicit_date: Option<NaiveDate>,
    clock: &dyn Clock,
) -> CoreResult<LeadPatch> {
    let next_status = match step {
        OutreachStep::ColdEmail => return mark_cold_email_sent(lead, explicit_date, clock),
        OutreachStep::Sms | OutreachStep::EmailFollowUpOne => LeadStatus::FollowUp,
        OutreachStep::EmailFollowUpTwo => LeadStatus::NoResponse,
    };

    if let Some(date) = explicit_date {
        validate_explicit_date(date, clock)?;
    }

    let mut patch = LeadPatch::default();
    if lead.step(step).sent {
        return Ok(patch);
    }

    if let Some(previous) = step.previous() {
        if !lead.step(previous).sent {
            return Err(CoreError::PreconditionViolation(format!(
                "cannot mark {} sent for lead {} while {} is unsent",
                step.as_str(),
                lead.id,
                previous.as_str()
            )));
        }
    }

    let date = explicit_date
        .or(lead.step(step).date)
        .unwrap_or_else(|| clock.today());
    patch.set_step(
        step,
        StepState {
            sent: true,
            date: Some(date),
        },
    );
    patch.follow_up_count = Some(lead.follow_up_count + 1);
    patch.last_contact_date = Some(clock.now());
    // Closed statuses are never overwritten by step completion.
    if !lead.status.is_closed() {
        patch.status = Some(next_status);
    }
    Ok(patch)
}

/// Patch that records an inbound response and halts the sequence. The
/// first recorded response wins; repeats are no-ops.
pub fn record_response(
    lead: &Lead,
    text: Option<String>,
    explicit_date: Option<NaiveDate>,
    clock: &dyn Clock,
) -> CoreResult<LeadPatch> {
    if let Some(date) = explicit_date {
        validate_explicit_date(date, clock)?;
    }

    let mut patch = LeadPatch::default();
    if lead.response.is_present() {
        return Ok(patch);
    }

    patch.response = Some(ResponseRecord {
        text,
        date: Some(explicit_date.unwrap_or_else(|| clock.today())),
    });
    if !lead.status.is_closed() {
        patch.status = Some(LeadStatus::InConversation);
    }
    Ok(patch)
}

/// Patch for a manual status change. Converted and lost are permanent;
/// attempts to reopen them are rejected.
pub fn set_status(lead: &Lead, status: LeadStatus) -> CoreResult<LeadPatch> {
    let mut patch = LeadPatch::default();
    if lead.status == status {
        return Ok(patch);
    }
    if lead.status.is_closed() {
        return Err(CoreError::PreconditionViolation(format!(
            "lead {} is {} and cannot move to {}",
            lead.id,
            lead.status.as_str(),
            status.as_str()
        )));
    }
    patch.status = Some(status);
    Ok(patch)
}
