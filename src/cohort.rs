use crate::clock::Clock;
use crate::models::{Lead, OutreachStep};
use crate::sequence;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CohortMode {
    DueOrOverdue,
    AllCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CohortSelector {
    Step { step: OutreachStep, mode: CohortMode },
    Responded,
    All,
}

/// Leads whose outreach state matches `step` under the given mode.
///
/// `DueOrOverdue` means the step is the lead's next step and its due date
/// has arrived; `AllCompleted` means the step has been sent, regardless of
/// what comes after.
pub fn classify(
    leads: &[Lead],
    step: OutreachStep,
    mode: CohortMode,
    clock: &dyn Clock,
) -> Vec<Lead> {
    leads
        .iter()
        .filter(|lead| matches_cohort(lead, step, mode, clock))
        .cloned()
        .collect()
}

fn matches_cohort(lead: &Lead, step: OutreachStep, mode: CohortMode, clock: &dyn Clock) -> bool {
    match mode {
        CohortMode::DueOrOverdue => sequence::next_step(lead, clock)
            .map(|next| next.step == step && next.is_due)
            .unwrap_or(false),
        CohortMode::AllCompleted => lead.step(step).sent,
    }
}

pub fn responded(leads: &[Lead]) -> Vec<Lead> {
    leads
        .iter()
        .filter(|lead| lead.response.is_present())
        .cloned()
        .collect()
}

pub fn select(leads: &[Lead], selector: CohortSelector, clock: &dyn Clock) -> Vec<Lead> {
    match selector {
        CohortSelector::Step { step, mode } => classify(leads, step, mode, clock),
        CohortSelector::Responded => responded(leads),
        CohortSelector::All => leads.to_vec(),
    }
}
