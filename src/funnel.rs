use crate::clock::Clock;
use crate::models::{CoreSettings, Lead, LeadStatus};
use serde::{Deserialize, Serialize};

const TRAILING_WINDOW_DAYS: i64 = 7;
const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCount {
    pub status: LeadStatus,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelSummary {
    pub total_leads: usize,
    pub active_leads: usize,
    pub stages: Vec<StageCount>,
    pub conversion_rate: u32,
    pub avg_days_to_convert: i64,
    pub pipeline_value: i64,
    pub created_last_week: usize,
    pub converted_last_week: usize,
}

/// Funnel rollup over a full lead set. Percentages and day counts are
/// rounded at the edge; intermediate arithmetic stays unrounded.
pub fn summarize(leads: &[Lead], settings: &CoreSettings, clock: &dyn Clock) -> FunnelSummary {
    let total_leads = leads.len();
    let active: Vec<&Lead> = leads
        .iter()
        .filter(|lead| !lead.status.is_closed())
        .collect();

    let stages = LeadStatus::ACTIVE_PIPELINE
        .iter()
        .map(|&status| {
            let count = active.iter().filter(|lead| lead.status == status).count();
            StageCount {
                status,
                count,
                percentage: percent(count, active.len()),
            }
        })
        .collect();

    let converted: Vec<&Lead> = leads
        .iter()
        .filter(|lead| lead.status == LeadStatus::Converted)
        .collect();

    let conversion_ratio = if total_leads == 0 {
        0.0
    } else {
        converted.len() as f64 / total_leads as f64
    };

    let avg_days_to_convert = if converted.is_empty() {
        0
    } else {
        let mean_seconds = converted
            .iter()
            .map(|lead| (lead.updated_at - lead.created_at).num_seconds() as f64)
            .sum::<f64>()
            / converted.len() as f64;
        (mean_seconds / SECONDS_PER_DAY).round() as i64
    };

    let pipeline_count = active
        .iter()
        .filter(|lead| {
            matches!(
                lead.status,
                LeadStatus::FollowUp | LeadStatus::InConversation
            )
        })
        .count();
    let pipeline_value =
        (pipeline_count as f64 * settings.average_client_value * conversion_ratio).round() as i64;

    let created_last_week = leads
        .iter()
        .filter(|lead| clock.within_trailing_days(lead.created_at, TRAILING_WINDOW_DAYS))
        .count();
    // Conversion time is tracked through updated_at, so the weekly delta
    // uses the same field.
    let converted_last_week = leads
        .iter()
        .filter(|lead| {
            lead.status == LeadStatus::Converted
                && clock.within_trailing_days(lead.updated_at, TRAILING_WINDOW_DAYS)
        })
        .count();

    FunnelSummary {
        total_leads,
        active_leads: active.len(),
        stages,
        conversion_rate: (conversion_ratio * 100.0).round() as u32,
        avg_days_to_convert,
        pipeline_value,
        created_last_week,
        converted_last_week,
    }
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}
