use crate::clock::{add_days, Clock};
use crate::models::{Lead, OutreachStep};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStep {
    pub step: OutreachStep,
    pub due_date: NaiveDate,
    pub is_due: bool,
}

/// First unsent step in sequence order, with its due date. `None` when the
/// lead is terminal or every step has been sent.
pub fn next_step(lead: &Lead, clock: &dyn Clock) -> Option<NextStep> {
    if lead.is_terminal() {
        return None;
    }

    if !lead.cold_email.sent {
        // An unscheduled cold email is actionable immediately.
        let due_date = lead.cold_email.date.unwrap_or_else(|| clock.today());
        return Some(NextStep {
            step: OutreachStep::ColdEmail,
            due_date,
            is_due: clock.is_due_or_past(due_date),
        });
    }

    for step in OutreachStep::ORDERED.into_iter().skip(1) {
        if lead.step(step).sent {
            continue;
        }
        // A sent cold email without a recorded date leaves nothing to
        // offset from; fall back to today rather than failing.
        let due_date = match lead.anchor_date() {
            Some(anchor) => add_days(anchor, step.offset_days()),
            None => clock.today(),
        };
        return Some(NextStep {
            step,
            due_date,
            is_due: clock.is_due_or_past(due_date),
        });
    }

    None
}
