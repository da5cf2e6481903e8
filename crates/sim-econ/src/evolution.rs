//! Period-to-period drift of aggregate market conditions.

use chrono::{DateTime, Utc};
use rand::Rng;
use sim_core::{MarketConditions, MarketConditionsId, Period, SimulationId};
use tracing::debug;

/// Half-width of the multiplicative market size drift.
pub const MARKET_SIZE_DRIFT: f64 = 0.05;
/// Half-width of the multiplicative per-segment share drift.
pub const SEGMENT_SHARE_DRIFT: f64 = 0.03;
/// Half-width of the additive noise on rate indicators.
pub const RATE_NOISE: f64 = 0.005;
/// Half-width of the additive noise on score indicators.
pub const SCORE_NOISE: f64 = 2.5;
/// Half-width of the additive noise on preference weights.
pub const PREFERENCE_NOISE: f64 = 0.05;
/// Largest per-period rise of sustainability importance.
pub const SUSTAINABILITY_STEP: f64 = 0.05;

/// Identifier of the market snapshot of `period`.
pub fn market_conditions_id(simulation_id: &SimulationId, period: Period) -> MarketConditionsId {
    MarketConditionsId(format!("market_{}_{}", simulation_id, period))
}

fn noise<R: Rng + ?Sized>(rng: &mut R, half_width: f64) -> f64 {
    rng.gen_range(-half_width..=half_width)
}

/// Rescale shares in place so they sum to one. Leaves degenerate maps alone.
pub fn normalize_shares<'a, I>(shares: I)
where
    I: IntoIterator<Item = &'a mut f64>,
{
    let mut refs: Vec<&'a mut f64> = shares.into_iter().collect();
    let total: f64 = refs.iter().map(|v| **v).sum();
    if !(total.is_finite() && total > 0.0) {
        return;
    }
    for v in refs.iter_mut() {
        **v /= total;
    }
}

/// Produce the snapshot for the period after `current`.
///
/// Market size and segment shares drift multiplicatively, shares are
/// renormalized, indicators and preference weights get additive noise
/// (weights clamped to [0,1]), and sustainability importance ratchets up.
/// Technology trends are carried over unchanged.
pub fn advance_market<R: Rng + ?Sized>(
    current: &MarketConditions,
    rng: &mut R,
    now: DateTime<Utc>,
) -> MarketConditions {
    let period = current.period + 1;
    let mut next = current.clone();
    next.id = market_conditions_id(&current.simulation_id, period);
    next.period = period;
    next.created_at = now;

    next.total_market_size *= 1.0 + noise(rng, MARKET_SIZE_DRIFT);

    for share in next.segment_distribution.values_mut() {
        *share *= 1.0 + noise(rng, SEGMENT_SHARE_DRIFT);
    }
    normalize_shares(next.segment_distribution.values_mut());

    let ind = &mut next.economic_indicators;
    ind.gdp_growth += noise(rng, RATE_NOISE);
    ind.inflation_rate += noise(rng, RATE_NOISE);
    ind.interest_rate += noise(rng, RATE_NOISE);
    ind.unemployment_rate += noise(rng, RATE_NOISE);
    ind.consumer_confidence += noise(rng, SCORE_NOISE);
    ind.business_sentiment += noise(rng, SCORE_NOISE);

    for weights in next.consumer_preferences.values_mut() {
        for w in weights.0.values_mut() {
            *w = (*w + noise(rng, PREFERENCE_NOISE)).clamp(0.0, 1.0);
        }
    }

    let step = rng.gen_range(0.0..=SUSTAINABILITY_STEP);
    next.sustainability_importance = (current.sustainability_importance + step).min(1.0);

    debug!(
        period,
        market_size = next.total_market_size,
        sustainability = next.sustainability_importance,
        "market advanced"
    );
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use sim_core::{
        validate_market_conditions, EconomicIndicators, Preference, PreferenceWeights, Segment,
        TechnologyTrend,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn base() -> MarketConditions {
        MarketConditions {
            id: MarketConditionsId::from("market_sim_0"),
            simulation_id: SimulationId::from("sim"),
            period: 0,
            total_market_size: 50_000_000.0,
            segment_distribution: [
                (Segment::Premium, 0.3),
                (Segment::MidRange, 0.5),
                (Segment::Budget, 0.2),
            ]
            .into_iter()
            .collect(),
            economic_indicators: EconomicIndicators::default(),
            consumer_preferences: [
                (
                    Segment::Premium,
                    PreferenceWeights::default()
                        .with(Preference::QualitySensitivity, 1.0)
                        .with(Preference::PriceSensitivity, 0.0),
                ),
                (
                    Segment::Budget,
                    PreferenceWeights::default().with(Preference::PriceSensitivity, 0.8),
                ),
            ]
            .into_iter()
            .collect(),
            technology_trends: vec![TechnologyTrend {
                name: "AI".into(),
                impact_area: "product_development".into(),
                impact_strength: 0.25,
                adoption_rate: 0.4,
            }],
            sustainability_importance: 0.3,
            created_at: now(),
        }
    }

    #[test]
    fn next_snapshot_targets_next_period() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let next = advance_market(&base(), &mut rng, now());
        assert_eq!(next.period, 1);
        assert_eq!(next.id.as_str(), "market_sim_1");
        assert_eq!(next.technology_trends, base().technology_trends);
        validate_market_conditions(&next).unwrap();
    }

    #[test]
    fn evolution_is_seeded() {
        let a = advance_market(&base(), &mut ChaCha8Rng::seed_from_u64(7), now());
        let b = advance_market(&base(), &mut ChaCha8Rng::seed_from_u64(7), now());
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_shares_are_left_alone() {
        let mut shares = [0.0, 0.0];
        normalize_shares(shares.iter_mut());
        assert_eq!(shares, [0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn invariants_hold_over_many_steps(seed in any::<u64>(), steps in 1usize..40) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut mc = base();
            for _ in 0..steps {
                let next = advance_market(&mc, &mut rng, now());
                let sum: f64 = next.segment_distribution.values().sum();
                prop_assert!((sum - 1.0).abs() < 1e-9);
                prop_assert!(next.sustainability_importance >= mc.sustainability_importance);
                prop_assert!(next.sustainability_importance <= 1.0);
                prop_assert!(next.total_market_size >= mc.total_market_size * 0.95 - 1e-6);
                prop_assert!(next.total_market_size <= mc.total_market_size * 1.05 + 1e-6);
                for w in next.consumer_preferences.values().flat_map(|p| p.0.values()) {
                    prop_assert!((0.0..=1.0).contains(w));
                }
                prop_assert_eq!(next.period, mc.period + 1);
                mc = next;
            }
        }
    }
}
