//! Companies and the typed sub-records kept in their data blob.

use crate::ids::{CompanyId, LoanId, SimulationId, UserId};
use crate::market::Segment;
use crate::Period;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Lower bound of a company's brand value.
pub const BRAND_VALUE_MIN: f64 = 1.0;
/// Upper bound of a company's brand value.
pub const BRAND_VALUE_MAX: f64 = 100.0;

/// A company competing in a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub simulation_id: SimulationId,
    /// Owning user.
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub logo_url: Option<String>,
    /// May go negative; nothing guards against overdraft.
    pub cash_balance: Decimal,
    /// Cash plus half of the last period's revenue, recomputed each period.
    pub total_assets: Decimal,
    /// Outstanding loan principal.
    pub total_liabilities: Decimal,
    /// Letter grade; starts at "A" and is never re-rated.
    pub credit_rating: String,
    /// Kept within [`BRAND_VALUE_MIN`, `BRAND_VALUE_MAX`] by performance updates.
    pub brand_value: f64,
    #[serde(default)]
    pub data: CompanyData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structured company data: HR, campaigns, research, loans and dividends.
///
/// Unknown keys (mission statements and the like) survive a round trip
/// through `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_resources: Option<HumanResources>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marketing_campaigns: Vec<Campaign>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub research_projects: Vec<ResearchProject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loans: Vec<Loan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dividends: Vec<Dividend>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompanyData {
    /// HR record, created with defaults on first access.
    pub fn human_resources_mut(&mut self) -> &mut HumanResources {
        self.human_resources.get_or_insert_with(HumanResources::default)
    }

    /// Employee satisfaction as reported in performance results.
    pub fn employee_satisfaction(&self) -> f64 {
        self.human_resources
            .as_ref()
            .map(|hr| hr.employee_satisfaction)
            .unwrap_or(HumanResources::DEFAULT_SATISFACTION)
    }

    pub fn loan_mut(&mut self, id: &LoanId) -> Option<&mut Loan> {
        self.loans.iter_mut().find(|l| &l.id == id)
    }
}

/// Workforce state of a company.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanResources {
    pub total_employees: u32,
    /// Per employee per period.
    pub average_salary: Decimal,
    /// Last training spend; replaced, not accumulated.
    pub training_budget: Decimal,
    /// Reported in performance results, 0 to 100.
    pub employee_satisfaction: f64,
    pub productivity: f64,
    /// Fraction of staff leaving per period.
    pub turnover_rate: f64,
}

impl HumanResources {
    pub const DEFAULT_SATISFACTION: f64 = 50.0;
}

impl Default for HumanResources {
    fn default() -> Self {
        Self {
            total_employees: 100,
            average_salary: Decimal::new(50_000, 0),
            training_budget: Decimal::ZERO,
            employee_satisfaction: Self::DEFAULT_SATISFACTION,
            productivity: 1.0,
            turnover_rate: 0.15,
        }
    }
}

/// Where a company-wide campaign is aimed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CampaignTarget {
    #[default]
    All,
    #[serde(untagged)]
    Segment(Segment),
}

/// Company-wide marketing campaign.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub company_id: CompanyId,
    pub name: String,
    pub budget: Decimal,
    pub start_period: Period,
    pub duration: u32,
    pub target_segment: CampaignTarget,
    #[serde(default)]
    pub channel_allocation: BTreeMap<String, f64>,
    #[serde(default)]
    pub message: String,
}

/// Lifecycle of a research project.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    #[default]
    Active,
    Completed,
}

/// Research project funded by a research decision.
///
/// `progress` and `status` are recorded at creation; no engine step advances them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchProject {
    pub id: String,
    pub company_id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub budget: Decimal,
    pub start_period: Period,
    pub duration: u32,
    pub progress: f64,
    pub status: ResearchStatus,
}

/// Outstanding (or repaid) loan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: LoanId,
    pub amount: Decimal,
    #[serde(default)]
    pub interest_rate: f64,
    #[serde(default)]
    pub term: u32,
    pub start_period: Period,
    pub remaining_amount: Decimal,
}

/// Dividend payout record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub period: Period,
    pub amount: Decimal,
}

/// Clamp a brand value into its allowed range.
pub fn clamp_brand_value(v: f64) -> f64 {
    if v.is_nan() {
        return BRAND_VALUE_MIN;
    }
    v.clamp(BRAND_VALUE_MIN, BRAND_VALUE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hr_is_lazily_initialized_with_defaults() {
        let mut data = CompanyData::default();
        assert!(data.human_resources.is_none());
        assert_eq!(data.employee_satisfaction(), 50.0);
        let hr = data.human_resources_mut();
        assert_eq!(hr.total_employees, 100);
        assert_eq!(hr.average_salary, Decimal::new(50_000, 0));
        assert_eq!(hr.turnover_rate, 0.15);
        assert!(data.human_resources.is_some());
    }

    #[test]
    fn extra_keys_survive_roundtrip() {
        let json = r#"{"missionStatement":"Build widgets","loans":[{"id":"loan_1","amount":"1000","startPeriod":0,"remainingAmount":"400"}]}"#;
        let data: CompanyData = serde_json::from_str(json).unwrap();
        assert_eq!(data.loans.len(), 1);
        assert_eq!(data.loans[0].remaining_amount, Decimal::new(400, 0));
        let back = serde_json::to_value(&data).unwrap();
        assert_eq!(back["missionStatement"], "Build widgets");
        assert!(back.get("dividends").is_none());
    }

    #[test]
    fn campaign_target_parses_all_and_segments() {
        let all: CampaignTarget = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, CampaignTarget::All);
        let seg: CampaignTarget = serde_json::from_str("\"mid-range\"").unwrap();
        assert_eq!(seg, CampaignTarget::Segment(Segment::MidRange));
    }

    #[test]
    fn brand_value_clamps() {
        assert_eq!(clamp_brand_value(-3.0), 1.0);
        assert_eq!(clamp_brand_value(250.0), 100.0);
        assert_eq!(clamp_brand_value(42.5), 42.5);
        assert_eq!(clamp_brand_value(f64::NAN), 1.0);
    }
}
