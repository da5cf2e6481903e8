//! Market snapshots and market events.

use crate::ids::{CompanyId, EventId, MarketConditionsId, SimulationId};
use crate::Period;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Weight used for any preference a segment does not specify.
pub const DEFAULT_PREFERENCE_WEIGHT: f64 = 0.5;

/// Market segment. Products join a segment through their category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Segment {
    Budget,
    MidRange,
    Premium,
}

impl Segment {
    pub const ALL: [Segment; 3] = [Segment::Budget, Segment::MidRange, Segment::Premium];

    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Budget => "budget",
            Segment::MidRange => "mid-range",
            Segment::Premium => "premium",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consumer preference dimension within a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    PriceSensitivity,
    QualitySensitivity,
    BrandLoyalty,
    InnovationPreference,
    SustainabilityPreference,
}

/// Preference weights of one segment, each nominally in [0,1].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceWeights(pub BTreeMap<Preference, f64>);

impl PreferenceWeights {
    /// Weight for `p`, or [`DEFAULT_PREFERENCE_WEIGHT`] when absent.
    pub fn weight(&self, p: Preference) -> f64 {
        self.0.get(&p).copied().unwrap_or(DEFAULT_PREFERENCE_WEIGHT)
    }

    pub fn with(mut self, p: Preference, w: f64) -> Self {
        self.0.insert(p, w);
        self
    }
}

/// Macro-economic indicators. Rates are fractions, scores are index points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomicIndicators {
    pub gdp_growth: f64,
    pub inflation_rate: f64,
    pub interest_rate: f64,
    pub unemployment_rate: f64,
    pub consumer_confidence: f64,
    pub business_sentiment: f64,
}

impl Default for EconomicIndicators {
    fn default() -> Self {
        Self {
            gdp_growth: 0.02,
            inflation_rate: 0.01,
            interest_rate: 0.03,
            unemployment_rate: 0.05,
            consumer_confidence: 70.0,
            business_sentiment: 75.0,
        }
    }
}

/// A technology trend carried forward between snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TechnologyTrend {
    pub name: String,
    pub impact_area: String,
    pub impact_strength: f64,
    pub adoption_rate: f64,
}

/// Immutable market snapshot for one period of one simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketConditions {
    pub id: MarketConditionsId,
    pub simulation_id: SimulationId,
    pub period: Period,
    /// Total spend available across all segments.
    pub total_market_size: f64,
    /// Segment share of the total market; shares sum to 1.
    pub segment_distribution: BTreeMap<Segment, f64>,
    pub economic_indicators: EconomicIndicators,
    pub consumer_preferences: BTreeMap<Segment, PreferenceWeights>,
    pub technology_trends: Vec<TechnologyTrend>,
    /// In [0,1], trending upward.
    pub sustainability_importance: f64,
    pub created_at: DateTime<Utc>,
}

impl MarketConditions {
    pub fn segment_share(&self, segment: Segment) -> f64 {
        self.segment_distribution.get(&segment).copied().unwrap_or(0.0)
    }

    pub fn segment_size(&self, segment: Segment) -> f64 {
        self.total_market_size * self.segment_share(segment)
    }

    /// Preference weights for a segment; empty weights when the segment is unknown.
    pub fn preferences(&self, segment: Segment) -> PreferenceWeights {
        self.consumer_preferences
            .get(&segment)
            .cloned()
            .unwrap_or_default()
    }
}

/// Category of a generated market event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Economic,
    Technological,
    Regulatory,
    Competitive,
    Consumer,
}

impl EventCategory {
    pub const ALL: [EventCategory; 5] = [
        EventCategory::Economic,
        EventCategory::Technological,
        EventCategory::Regulatory,
        EventCategory::Competitive,
        EventCategory::Consumer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::Economic => "economic",
            EventCategory::Technological => "technological",
            EventCategory::Regulatory => "regulatory",
            EventCategory::Competitive => "competitive",
            EventCategory::Consumer => "consumer",
        }
    }
}

/// A market occurrence recorded in the simulation's event log.
///
/// Events are advisory: nothing in the engine feeds them back into market
/// evolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub simulation_id: SimulationId,
    pub period: Period,
    #[serde(rename = "type")]
    pub category: EventCategory,
    pub name: String,
    pub description: String,
    pub impact_area: String,
    pub impact_strength: f64,
    /// `None` means every company is affected.
    pub affected_companies: Option<Vec<CompanyId>>,
    pub created_at: DateTime<Utc>,
}
