//! Random market events drawn from fixed templates.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use sim_core::{Event, EventCategory, EventId, Period, SimulationId};
use tracing::info;

/// Strength of an event's impact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ImpactStrength {
    Fixed(f64),
    /// Magnitude whose sign is chosen by a coin flip.
    EitherSign(f64),
}

/// Canned event description.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub impact_area: &'static str,
    pub strength: ImpactStrength,
}

const fn template(
    name: &'static str,
    description: &'static str,
    impact_area: &'static str,
    strength: ImpactStrength,
) -> EventTemplate {
    EventTemplate {
        name,
        description,
        impact_area,
        strength,
    }
}

const ECONOMIC: &[EventTemplate] = &[
    template(
        "Economic Boom",
        "A strong economic growth period has begun, increasing consumer spending across all segments.",
        "market_size",
        ImpactStrength::Fixed(0.15),
    ),
    template(
        "Economic Recession",
        "An economic downturn has begun, reducing consumer spending across all segments.",
        "market_size",
        ImpactStrength::Fixed(-0.1),
    ),
    template(
        "Interest Rate Hike",
        "Central bank has increased interest rates, affecting borrowing costs.",
        "finance",
        ImpactStrength::Fixed(0.02),
    ),
    template(
        "Currency Fluctuation",
        "Significant currency value changes affecting import/export costs.",
        "production_cost",
        ImpactStrength::EitherSign(0.08),
    ),
];

const TECHNOLOGICAL: &[EventTemplate] = &[
    template(
        "Technological Breakthrough",
        "A major technological breakthrough has occurred, creating new opportunities for innovation.",
        "innovation",
        ImpactStrength::Fixed(0.2),
    ),
    template(
        "Manufacturing Innovation",
        "New manufacturing techniques have been developed, potentially reducing production costs.",
        "production_cost",
        ImpactStrength::Fixed(-0.1),
    ),
    template(
        "Digital Transformation Trend",
        "Increasing consumer preference for digitally-enabled products and services.",
        "consumer_preferences",
        ImpactStrength::Fixed(0.15),
    ),
];

const REGULATORY: &[EventTemplate] = &[
    template(
        "Environmental Regulations",
        "New environmental regulations require changes to production processes.",
        "sustainability",
        ImpactStrength::Fixed(0.25),
    ),
    template(
        "Tax Policy Change",
        "Changes in tax policy affecting corporate profits.",
        "finance",
        ImpactStrength::Fixed(-0.05),
    ),
    template(
        "Labor Law Changes",
        "New labor laws affecting employment costs and practices.",
        "human_resources",
        ImpactStrength::Fixed(0.08),
    ),
];

const COMPETITIVE: &[EventTemplate] = &[
    template(
        "New Market Entrant",
        "A new competitor has entered the market with innovative products.",
        "market_share",
        ImpactStrength::Fixed(-0.05),
    ),
    template(
        "Competitor Price War",
        "A major competitor has significantly reduced prices to gain market share.",
        "pricing",
        ImpactStrength::Fixed(-0.1),
    ),
    template(
        "Industry Consolidation",
        "Merger between competitors creating a stronger market player.",
        "competition",
        ImpactStrength::Fixed(0.15),
    ),
];

const CONSUMER: &[EventTemplate] = &[
    template(
        "Shifting Consumer Preferences",
        "Consumers are showing stronger preference for sustainable products.",
        "consumer_preferences",
        ImpactStrength::Fixed(0.2),
    ),
    template(
        "Quality Expectations Increase",
        "Consumers are demanding higher quality products across all segments.",
        "quality",
        ImpactStrength::Fixed(0.15),
    ),
    template(
        "Brand Loyalty Shift",
        "Consumers are becoming less brand loyal and more value-focused.",
        "marketing",
        ImpactStrength::Fixed(-0.1),
    ),
];

/// Templates available for a category.
pub fn templates(category: EventCategory) -> &'static [EventTemplate] {
    match category {
        EventCategory::Economic => ECONOMIC,
        EventCategory::Technological => TECHNOLOGICAL,
        EventCategory::Regulatory => REGULATORY,
        EventCategory::Competitive => COMPETITIVE,
        EventCategory::Consumer => CONSUMER,
    }
}

/// Roll for a market event tagged with `period`.
///
/// With probability `probability` one event is produced: a uniformly chosen
/// category, then a uniformly chosen template within it. Events always
/// target every company.
pub fn generate_event<R: Rng + ?Sized>(
    rng: &mut R,
    probability: f64,
    simulation_id: &SimulationId,
    period: Period,
    now: DateTime<Utc>,
) -> Option<Event> {
    let p = if probability.is_finite() {
        probability.clamp(0.0, 1.0)
    } else {
        0.0
    };
    if !rng.gen_bool(p) {
        return None;
    }
    let category = *EventCategory::ALL.choose(rng)?;
    let tpl = *templates(category).choose(rng)?;
    let impact_strength = match tpl.strength {
        ImpactStrength::Fixed(s) => s,
        ImpactStrength::EitherSign(s) => {
            if rng.gen_bool(0.5) {
                s
            } else {
                -s
            }
        }
    };
    info!(period, category = category.as_str(), name = tpl.name, "market event");
    Some(Event {
        id: EventId(format!("event_{}_{}", simulation_id, period)),
        simulation_id: simulation_id.clone(),
        period,
        category,
        name: tpl.name.to_string(),
        description: tpl.description.to_string(),
        impact_area: tpl.impact_area.to_string(),
        impact_strength,
        affected_companies: None,
        created_at: now,
    })
}
