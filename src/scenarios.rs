use crate::error::EngineError;
use crate::ids::IdGenerator;
use crate::models::Scenario;

pub const DEFAULT_SCENARIO_COUNT: usize = 6;
pub const MAX_SCENARIO_COUNT: usize = 100;

/// Rounds a magnitude to a step that reads naturally for its size.
pub fn round_to_nice_value(value: f64) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    if value < 1.0 {
        return (value * 10.0).round() / 10.0;
    }

    let step = match value {
        v if v <= 5.0 => 1.0,
        v if v <= 20.0 => 2.0,
        v if v <= 100.0 => 5.0,
        v if v <= 500.0 => 10.0,
        v if v <= 2000.0 => 50.0,
        _ => 100.0,
    };
    (value / step).round() * step
}

/// Evenly spaced, rounded magnitudes from `min` to `max` inclusive, sorted
/// ascending without duplicates. May return fewer than `count` values.
pub fn generate_scenarios(min: f64, max: f64, count: usize) -> Result<Vec<f64>, EngineError> {
    for bound in [min, max] {
        if !bound.is_finite() {
            return Err(EngineError::InvalidRange(format!("{bound} is not a number")));
        }
        if bound < 0.0 {
            return Err(EngineError::InvalidRange(format!("{bound} is negative")));
        }
    }

    if count > MAX_SCENARIO_COUNT {
        return Err(EngineError::InvalidRange(format!(
            "at most {MAX_SCENARIO_COUNT} scenarios can be generated, {count} requested"
        )));
    }

    let lo = min.min(max);
    let hi = min.max(max);
    if lo == hi {
        return Ok(vec![lo]);
    }

    // Both endpoints are always emitted.
    let count = count.max(2);
    let last = count - 1;
    let mut values: Vec<f64> = (0..count)
        .map(|i| round_to_nice_value(lo + (hi - lo) * (i as f64 / last as f64)))
        .collect();
    values[0] = round_to_nice_value(lo);
    values[last] = round_to_nice_value(hi);

    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    Ok(values)
}

/// Gives each magnitude a fresh scenario identity.
pub fn mint_scenarios(magnitudes: &[f64], ids: &mut dyn IdGenerator) -> Vec<Scenario> {
    magnitudes
        .iter()
        .map(|&magnitude| Scenario {
            id: ids.next_id(),
            magnitude,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;

    #[test]
    fn rounding_follows_magnitude_tiers() {
        assert_eq!(round_to_nice_value(-3.0), 0.0);
        assert_eq!(round_to_nice_value(0.0), 0.0);
        assert_eq!(round_to_nice_value(0.34), 0.3);
        assert_eq!(round_to_nice_value(3.4), 3.0);
        assert_eq!(round_to_nice_value(8.6), 8.0);
        assert_eq!(round_to_nice_value(12.4), 12.0);
        assert_eq!(round_to_nice_value(47.0), 45.0);
        assert_eq!(round_to_nice_value(123.0), 120.0);
        assert_eq!(round_to_nice_value(1234.0), 1250.0);
        assert_eq!(round_to_nice_value(4321.0), 4300.0);
    }

    #[test]
    fn rounding_is_idempotent() {
        let mut value = 0.0;
        while value < 5000.0 {
            let once = round_to_nice_value(value);
            assert_eq!(round_to_nice_value(once), once, "not idempotent at {value}");
            value += 0.37;
        }
    }

    #[test]
    fn generates_round_evenly_spaced_values() {
        let values = generate_scenarios(1.0, 20.0, 6).unwrap();
        assert_eq!(values, vec![1.0, 5.0, 8.0, 12.0, 16.0, 20.0]);
    }

    #[test]
    fn swapped_bounds_are_normalized() {
        assert_eq!(
            generate_scenarios(20.0, 1.0, 6).unwrap(),
            generate_scenarios(1.0, 20.0, 6).unwrap()
        );
    }

    #[test]
    fn equal_bounds_yield_single_value() {
        for count in [1, 2, 6, 10] {
            assert_eq!(generate_scenarios(5.0, 5.0, count).unwrap(), vec![5.0]);
        }
    }

    #[test]
    fn duplicates_collapse_after_rounding() {
        let values = generate_scenarios(1.0, 3.0, 6).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn generated_values_are_sorted_unique_and_anchored() {
        let ranges = [(0.0, 1.0), (0.2, 7.0), (3.0, 95.0), (18.0, 640.0), (150.0, 9000.0)];
        for (lo, hi) in ranges {
            for count in [2, 4, 6, 9] {
                let values = generate_scenarios(lo, hi, count).unwrap();
                assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
                assert_eq!(values[0], round_to_nice_value(lo));
                assert_eq!(*values.last().unwrap(), round_to_nice_value(hi));
                assert!(values.len() <= count);
            }
        }
    }

    #[test]
    fn rejects_negative_and_non_numeric_bounds() {
        assert!(matches!(
            generate_scenarios(-1.0, 10.0, 6),
            Err(EngineError::InvalidRange(_))
        ));
        assert!(matches!(
            generate_scenarios(1.0, f64::NAN, 6),
            Err(EngineError::InvalidRange(_))
        ));
    }

    #[test]
    fn rejects_oversized_counts() {
        assert!(generate_scenarios(1.0, 2000.0, MAX_SCENARIO_COUNT).is_ok());
        assert!(matches!(
            generate_scenarios(1.0, 2000.0, MAX_SCENARIO_COUNT + 1),
            Err(EngineError::InvalidRange(_))
        ));
        assert!(generate_scenarios(1.0, 20.0, usize::MAX).is_err());
    }

    #[test]
    fn minted_scenarios_get_distinct_ids() {
        let mut ids = SequentialIds::new("sc");
        let scenarios = mint_scenarios(&[1.0, 5.0], &mut ids);
        assert_eq!(scenarios[0].id, "sc-1");
        assert_eq!(scenarios[1].id, "sc-2");
        assert_eq!(scenarios[1].magnitude, 5.0);
    }
}
