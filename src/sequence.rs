use std::collections::BTreeMap;

use crate::describe::{self, QuestionCard};
use crate::error::EngineError;
use crate::models::{Scenario, Survey, OPTION_COUNT};

/// Presentation order for a respondent: smallest, largest, second smallest,
/// second largest, and so on toward the middle. Ties keep their input order.
pub fn sequence_for_respondent(scenarios: &[Scenario]) -> Vec<&Scenario> {
    let mut sorted: Vec<&Scenario> = scenarios.iter().collect();
    sorted.sort_by(|a, b| a.magnitude.total_cmp(&b.magnitude));

    let mut ordered = Vec::with_capacity(sorted.len());
    let mut remaining = sorted.into_iter();
    while let Some(low) = remaining.next() {
        ordered.push(low);
        if let Some(high) = remaining.next_back() {
            ordered.push(high);
        }
    }
    ordered
}

/// Question cards in presentation order.
pub fn walkthrough(survey: &Survey) -> Vec<QuestionCard> {
    let sequence = sequence_for_respondent(&survey.scenarios);
    let of = sequence.len();
    sequence
        .into_iter()
        .enumerate()
        .map(|(i, scenario)| describe::question_card(survey, scenario, i + 1, of))
        .collect()
}

/// Maps answers given in presentation order (1-based option numbers, `None`
/// for a skipped question) onto scenario ids with 0-based option indexes.
pub fn answers_from_sequence(
    survey: &Survey,
    choices: &[Option<usize>],
) -> Result<BTreeMap<String, usize>, EngineError> {
    let sequence = sequence_for_respondent(&survey.scenarios);
    if choices.len() > sequence.len() {
        return Err(EngineError::TooManyAnswers {
            given: choices.len(),
            scenarios: sequence.len(),
        });
    }

    let mut answers = BTreeMap::new();
    for (scenario, choice) in sequence.into_iter().zip(choices) {
        let Some(option) = *choice else {
            continue;
        };
        if option == 0 || option > OPTION_COUNT {
            return Err(EngineError::OptionOutOfRange { index: option });
        }
        answers.insert(scenario.id.clone(), option - 1);
    }
    Ok(answers)
}
