use std::collections::HashMap;

use crate::models::{Response, ScenarioSummary, Survey, OPTION_COUNT};

/// One summary per stored scenario, in stored (magnitude) order.
///
/// Answers naming a scenario the survey no longer has, or an option off the
/// scale, are skipped with a warning. Responses with no usable answers still
/// count toward the survey's response total, which callers take from
/// `responses.len()`.
pub fn aggregate(survey: &Survey, responses: &[Response]) -> Vec<ScenarioSummary> {
    let mut summaries: Vec<ScenarioSummary> = survey
        .scenarios
        .iter()
        .map(|scenario| ScenarioSummary {
            scenario_id: scenario.id.clone(),
            magnitude: scenario.magnitude,
            counts: [0; OPTION_COUNT],
            total: 0,
            median_index: None,
        })
        .collect();
    let positions: HashMap<&str, usize> = survey
        .scenarios
        .iter()
        .enumerate()
        .map(|(position, scenario)| (scenario.id.as_str(), position))
        .collect();

    for response in responses {
        for (scenario_id, &index) in &response.answers {
            let Some(&position) = positions.get(scenario_id.as_str()) else {
                log::warn!(
                    "survey {}: response {} answers unknown scenario {}, ignoring",
                    survey.id,
                    response.id,
                    scenario_id
                );
                continue;
            };
            if index >= OPTION_COUNT {
                log::warn!(
                    "survey {}: response {} has option {} for scenario {}, ignoring",
                    survey.id,
                    response.id,
                    index,
                    scenario_id
                );
                continue;
            }
            summaries[position].counts[index] += 1;
        }
    }

    for summary in summaries.iter_mut() {
        summary.total = summary.counts.iter().sum();
        summary.median_index = median_bucket(&summary.counts, summary.total);
    }
    summaries
}

/// First option whose running count strictly exceeds half the total. This is
/// the bucket where at least half the respondents are accounted for, not a
/// numeric median. The comparison is strict, so when the running count lands
/// exactly on half at a bucket boundary the next non-empty bucket is chosen:
/// `[2, 2, 0, 0, 0, 0]` gives 1.
pub fn median_bucket(counts: &[usize; OPTION_COUNT], total: usize) -> Option<usize> {
    if total == 0 {
        return None;
    }
    let mut cumulative = 0;
    counts.iter().position(|&count| {
        cumulative += count;
        cumulative * 2 > total
    })
}

/// Whole-number share of each option; all zeros when nobody answered.
pub fn percentages(summary: &ScenarioSummary) -> [u32; OPTION_COUNT] {
    let mut shares = [0; OPTION_COUNT];
    if summary.total == 0 {
        return shares;
    }
    for (share, &count) in shares.iter_mut().zip(summary.counts.iter()) {
        *share = (count as f64 / summary.total as f64 * 100.0).round() as u32;
    }
    shares
}
