use crate::models::{ObjectiveType, Scenario, Survey, OPTION_COUNT};

pub const DEFAULT_OUTCOME: &str = "the outcome";

pub const QUANTIFIER_LEGEND: &str = "When we say \"all or almost all\" we mean 90% or more; \"most\" means 75–90%; and \"majority\" means 50–74%.";

const MID_DEFINITION: &str = "Minimally important difference refers to the smallest difference in the outcome of interest that informed patients or informed proxies perceive as important.";

/// Effect sentence fragment for a scenario of `magnitude` events per 1000.
pub fn auto_describe(
    objective_type: ObjectiveType,
    outcome: Option<&str>,
    magnitude: f64,
    time_period: Option<&str>,
) -> String {
    let outcome = present(outcome).unwrap_or(DEFAULT_OUTCOME);
    let suffix = present(time_period)
        .map(|period| format!(" {period}"))
        .unwrap_or_default();

    match objective_type {
        ObjectiveType::Mid => format!(
            "an intervention lowers their risk by {magnitude} in 1000 (i.e. a decrease in {} of {magnitude} in 1,000 patients){suffix}",
            outcome.to_lowercase()
        ),
        ObjectiveType::Decision => format!(
            "{magnitude} in 1000 lower risk of {}{suffix}",
            outcome.to_lowercase()
        ),
        ObjectiveType::Proportion => format!("{outcome}: {magnitude} in 1000 reduction{suffix}"),
    }
}

/// Full question text a respondent sees for `scenario`.
pub fn build_question_prompt(survey: &Survey, scenario: &Scenario) -> String {
    let population = survey.population.to_lowercase();
    match survey.objective_type {
        ObjectiveType::Mid => format!(
            "In {population}, {}. Please choose an option that reflects the proportion of patients who would consider this reduction in risk an at least minimally important or trivial effect. {MID_DEFINITION}",
            survey.scenario_description(scenario)
        ),
        ObjectiveType::Decision => {
            let intervention = present(survey.intervention.as_deref())
                .map(|name| format!(" of {}", name.to_lowercase()))
                .unwrap_or_default();
            format!(
                "For {population}, how would patients view the trade-off between benefits and harms{intervention}?"
            )
        }
        ObjectiveType::Proportion => {
            format!("For {population}, how would patients view the following effects?")
        }
    }
}

/// Everything shown for one scenario step of the walk-through.
#[derive(Debug, Clone)]
pub struct QuestionCard {
    pub position: usize,
    pub of: usize,
    pub scenario_id: String,
    pub magnitude: f64,
    pub prompt: String,
    pub effect: String,
    pub harms: Option<String>,
    pub options: &'static [&'static str; OPTION_COUNT],
}

pub fn question_card(survey: &Survey, scenario: &Scenario, position: usize, of: usize) -> QuestionCard {
    let harms = if survey.objective_type.shows_harms() {
        survey.harm_info.clone()
    } else {
        None
    };

    QuestionCard {
        position,
        of,
        scenario_id: scenario.id.clone(),
        magnitude: scenario.magnitude,
        prompt: build_question_prompt(survey, scenario),
        effect: survey.scenario_description(scenario),
        harms,
        options: survey.objective_type.options(),
    }
}

/// Opening page of the walk-through.
pub fn intro_lines(survey: &Survey) -> Vec<String> {
    let mut lines = vec![
        survey.objective_type.label().to_string(),
        survey.title.clone(),
        format!("Population: {}", survey.population),
        format!("Key outcome: {}", survey.outcome),
    ];
    if let Some(period) = present(survey.time_period.as_deref()) {
        lines.push(format!("Time period: {period}"));
    }
    if let Some(intro) = present(survey.intro_text.as_deref()) {
        lines.push(intro.to_string());
    }
    if let Some(harms) = present(survey.harm_info.as_deref()) {
        lines.push(format!("Harms / Burdens (constant across all questions): {harms}"));
    }
    lines.push(QUANTIFIER_LEGEND.to_string());
    lines
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn survey(objective_type: ObjectiveType) -> Survey {
        let mut survey = Survey::new(
            "s".to_string(),
            "Panel",
            objective_type,
            "Adults With Diabetes",
            "Myocardial Infarction",
            Utc::now(),
        );
        survey.scenarios.push(Scenario { id: "sc".to_string(), magnitude: 8.0 });
        survey
    }

    #[test]
    fn mid_description_lowercases_outcome() {
        let text = auto_describe(ObjectiveType::Mid, Some("Stroke"), 8.0, Some("over 5 years"));
        assert_eq!(
            text,
            "an intervention lowers their risk by 8 in 1000 (i.e. a decrease in stroke of 8 in 1,000 patients) over 5 years"
        );
    }

    #[test]
    fn decision_and_proportion_descriptions() {
        assert_eq!(
            auto_describe(ObjectiveType::Decision, Some("Stroke"), 0.5, None),
            "0.5 in 1000 lower risk of stroke"
        );
        assert_eq!(
            auto_describe(ObjectiveType::Proportion, Some("Stroke"), 20.0, Some("in 1 year")),
            "Stroke: 20 in 1000 reduction in 1 year"
        );
    }

    #[test]
    fn missing_outcome_and_period_are_handled() {
        assert_eq!(
            auto_describe(ObjectiveType::Decision, None, 3.0, Some("")),
            "3 in 1000 lower risk of the outcome"
        );
        assert_eq!(
            auto_describe(ObjectiveType::Proportion, Some(""), 3.0, None),
            "the outcome: 3 in 1000 reduction"
        );
    }

    #[test]
    fn mid_prompt_embeds_description_and_definition() {
        let survey = survey(ObjectiveType::Mid);
        let prompt = build_question_prompt(&survey, &survey.scenarios[0]);
        assert!(prompt.starts_with("In adults with diabetes, an intervention lowers their risk by 8 in 1000"));
        assert!(prompt.contains("myocardial infarction of 8 in 1,000 patients"));
        assert!(prompt.ends_with(MID_DEFINITION));
    }

    #[test]
    fn decision_prompt_names_intervention_when_given() {
        let mut survey = survey(ObjectiveType::Decision);
        let scenario = survey.scenarios[0].clone();
        assert_eq!(
            build_question_prompt(&survey, &scenario),
            "For adults with diabetes, how would patients view the trade-off between benefits and harms?"
        );
        survey.intervention = Some("SGLT2 Inhibitors".to_string());
        assert_eq!(
            build_question_prompt(&survey, &scenario),
            "For adults with diabetes, how would patients view the trade-off between benefits and harms of sglt2 inhibitors?"
        );
    }

    #[test]
    fn harms_only_shown_for_choice_objectives() {
        let mut mid = survey(ObjectiveType::Mid);
        mid.harm_info = Some("2 in 1000 increase in ketoacidosis".to_string());
        let card = question_card(&mid, &mid.scenarios[0], 1, 1);
        assert!(card.harms.is_none());

        let mut proportion = survey(ObjectiveType::Proportion);
        proportion.harm_info = mid.harm_info.clone();
        let card = question_card(&proportion, &proportion.scenarios[0], 1, 1);
        assert_eq!(card.prompt, "For adults with diabetes, how would patients view the following effects?");
        assert_eq!(card.harms.as_deref(), Some("2 in 1000 increase in ketoacidosis"));
        assert_eq!(card.effect, "Myocardial Infarction: 8 in 1000 reduction");
    }
}
