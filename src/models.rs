use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::describe;
use crate::error::EngineError;

/// Every objective type uses a six-point scale.
pub const OPTION_COUNT: usize = 6;

pub const ANONYMOUS_RESPONDENT: &str = "Anonymous";

/// Elicitation mode of a survey. Index 0 of `options()` is the strongest
/// "important / choose" answer, index 5 the strongest "trivial / decline".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectiveType {
    Mid,
    Decision,
    Proportion,
}

impl ObjectiveType {
    pub const ALL: [ObjectiveType; 3] = [
        ObjectiveType::Mid,
        ObjectiveType::Decision,
        ObjectiveType::Proportion,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ObjectiveType::Mid => "MID",
            ObjectiveType::Decision => "DECISION",
            ObjectiveType::Proportion => "PROPORTION",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ObjectiveType::Mid => "MID Threshold",
            ObjectiveType::Decision => "Decision Threshold",
            ObjectiveType::Proportion => "Proportion Electing",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ObjectiveType::Mid => {
                "Establish a minimally important difference threshold (important vs. trivial effect)"
            }
            ObjectiveType::Decision => {
                "Establish a threshold where recommendations shift (choose vs. decline intervention)"
            }
            ObjectiveType::Proportion => {
                "Specify the percentage of patients who would elect for or against an intervention across risk groups"
            }
        }
    }

    pub fn options(self) -> &'static [&'static str; OPTION_COUNT] {
        match self {
            ObjectiveType::Mid => &MID_OPTIONS,
            ObjectiveType::Decision => &DECISION_OPTIONS,
            ObjectiveType::Proportion => &PROPORTION_OPTIONS,
        }
    }

    /// Whether the constant harms text is shown alongside each question.
    pub fn shows_harms(self) -> bool {
        matches!(self, ObjectiveType::Decision | ObjectiveType::Proportion)
    }
}

const MID_OPTIONS: [&str; OPTION_COUNT] = [
    "All or almost all would consider this an important effect",
    "Most would consider this an important effect",
    "A majority would consider this an important effect",
    "A majority would consider this a trivial effect",
    "Most would consider this a trivial effect",
    "All or almost all would consider this a trivial effect",
];

const DECISION_OPTIONS: [&str; OPTION_COUNT] = [
    "All or almost all (over 90%) would choose the intervention",
    "Most (75–90%) would choose the intervention",
    "A majority (51–74%) would choose the intervention",
    "A majority (51–74%) would decline the intervention",
    "Most (75–90%) would decline the intervention",
    "All or almost all (over 90%) would decline the intervention",
];

const PROPORTION_OPTIONS: [&str; OPTION_COUNT] = [
    "All or almost all would choose the intervention",
    "Most would choose the intervention",
    "Majority would choose the intervention",
    "Majority would decline the intervention",
    "Most would decline the intervention",
    "All or almost all would decline the intervention",
];

impl fmt::Display for ObjectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ObjectiveType {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ObjectiveType::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| EngineError::UnknownObjectiveType(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    /// Events per 1000 patients.
    pub magnitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioMerge {
    Replace,
    Append,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    pub title: String,
    pub objective_type: ObjectiveType,
    pub population: String,
    pub outcome: String,
    pub time_period: Option<String>,
    pub intro_text: Option<String>,
    pub harm_info: Option<String>,
    pub intervention: Option<String>,
    pub scenarios: Vec<Scenario>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Survey {
    pub fn new(
        id: String,
        title: &str,
        objective_type: ObjectiveType,
        population: &str,
        outcome: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Survey {
            id,
            title: title.trim().to_string(),
            objective_type,
            population: population.trim().to_string(),
            outcome: outcome.trim().to_string(),
            time_period: None,
            intro_text: None,
            harm_info: None,
            intervention: None,
            scenarios: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Effect description for one of this survey's scenarios. Always derived
    /// from the current outcome, time period and objective type.
    pub fn scenario_description(&self, scenario: &Scenario) -> String {
        describe::auto_describe(
            self.objective_type,
            Some(&self.outcome),
            scenario.magnitude,
            self.time_period.as_deref(),
        )
    }

    pub fn set_outcome(&mut self, outcome: &str, now: DateTime<Utc>) {
        self.outcome = outcome.trim().to_string();
        self.updated_at = now;
    }

    pub fn set_time_period(&mut self, time_period: Option<&str>, now: DateTime<Utc>) {
        self.time_period = non_blank(time_period);
        self.updated_at = now;
    }

    pub fn set_objective_type(&mut self, objective_type: ObjectiveType, now: DateTime<Utc>) {
        self.objective_type = objective_type;
        self.updated_at = now;
    }

    pub fn apply_scenarios(
        &mut self,
        scenarios: Vec<Scenario>,
        merge: ScenarioMerge,
        now: DateTime<Utc>,
    ) {
        match merge {
            ScenarioMerge::Replace => self.scenarios = scenarios,
            ScenarioMerge::Append => self.scenarios.extend(scenarios),
        }
        self.scenarios
            .sort_by(|a, b| a.magnitude.total_cmp(&b.magnitude));
        self.updated_at = now;
    }

    pub fn remove_scenario(&mut self, scenario_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.scenarios.len();
        self.scenarios.retain(|scenario| scenario.id != scenario_id);
        self.updated_at = now;
        self.scenarios.len() != before
    }

    pub fn find_scenario(&self, scenario_id: &str) -> Option<&Scenario> {
        self.scenarios
            .iter()
            .find(|scenario| scenario.id == scenario_id)
    }

    pub fn magnitude_range(&self) -> Option<(f64, f64)> {
        let first = self.scenarios.first()?.magnitude;
        Some(self.scenarios.iter().fold((first, first), |(lo, hi), scenario| {
            (lo.min(scenario.magnitude), hi.max(scenario.magnitude))
        }))
    }

    pub fn validate_for_publish(&self) -> Result<(), EngineError> {
        if self.title.trim().is_empty() {
            return Err(EngineError::MissingField("title"));
        }
        if self.population.trim().is_empty() {
            return Err(EngineError::MissingField("population"));
        }
        if self.outcome.trim().is_empty() {
            return Err(EngineError::MissingField("outcome"));
        }
        if self.scenarios.is_empty() {
            return Err(EngineError::EmptyScenarioSet);
        }

        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            if !scenario.magnitude.is_finite() || scenario.magnitude < 0.0 {
                return Err(EngineError::InvalidRange(format!(
                    "scenario {} has magnitude {}",
                    scenario.id, scenario.magnitude
                )));
            }
            if !seen.insert(scenario.id.as_str()) {
                return Err(EngineError::DuplicateScenarioId(scenario.id.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub respondent_name: String,
    /// Scenario id to selected option index (0-5).
    pub answers: BTreeMap<String, usize>,
    pub submitted_at: DateTime<Utc>,
}

impl Response {
    pub fn new(
        id: String,
        respondent_name: Option<&str>,
        answers: BTreeMap<String, usize>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Response {
            id,
            respondent_name: non_blank(respondent_name)
                .unwrap_or_else(|| ANONYMOUS_RESPONDENT.to_string()),
            answers,
            submitted_at,
        }
    }

    /// Submission-time check: every answer must point at a scenario of
    /// `survey` and use an option on the scale.
    pub fn validate_against(&self, survey: &Survey) -> Result<(), EngineError> {
        for (scenario_id, &index) in &self.answers {
            if survey.find_scenario(scenario_id).is_none() {
                return Err(EngineError::UnknownScenarioReference {
                    scenario_id: scenario_id.clone(),
                });
            }
            if index >= OPTION_COUNT {
                return Err(EngineError::OptionOutOfRange { index });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSummary {
    pub scenario_id: String,
    pub magnitude: f64,
    pub counts: [usize; OPTION_COUNT],
    pub total: usize,
    /// `None` when nobody answered the scenario.
    pub median_index: Option<usize>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_survey() -> Survey {
        let mut survey = Survey::new(
            "survey-1".to_string(),
            "MID survey – myocardial infarction",
            ObjectiveType::Mid,
            "Adults with risk of myocardial infarction",
            "Myocardial infarction",
            Utc::now(),
        );
        survey.apply_scenarios(
            vec![
                Scenario { id: "b".to_string(), magnitude: 10.0 },
                Scenario { id: "a".to_string(), magnitude: 2.0 },
            ],
            ScenarioMerge::Replace,
            Utc::now(),
        );
        survey
    }

    #[test]
    fn objective_types_parse_case_insensitively() {
        assert_eq!("decision".parse::<ObjectiveType>(), Ok(ObjectiveType::Decision));
        assert_eq!("MID".parse::<ObjectiveType>(), Ok(ObjectiveType::Mid));
        assert!("RANK".parse::<ObjectiveType>().is_err());
    }

    #[test]
    fn catalog_has_six_options_per_type() {
        for kind in ObjectiveType::ALL {
            assert_eq!(kind.options().len(), OPTION_COUNT);
            assert!(kind.options()[0].contains("important") || kind.options()[0].contains("choose"));
        }
    }

    #[test]
    fn scenarios_stay_sorted_after_append() {
        let mut survey = sample_survey();
        survey.apply_scenarios(
            vec![Scenario { id: "c".to_string(), magnitude: 5.0 }],
            ScenarioMerge::Append,
            Utc::now(),
        );
        let magnitudes: Vec<f64> = survey.scenarios.iter().map(|s| s.magnitude).collect();
        assert_eq!(magnitudes, vec![2.0, 5.0, 10.0]);
        assert_eq!(survey.magnitude_range(), Some((2.0, 10.0)));
    }

    #[test]
    fn descriptions_follow_outcome_changes() {
        let mut survey = sample_survey();
        let scenario = survey.scenarios[0].clone();
        assert!(survey.scenario_description(&scenario).contains("myocardial infarction"));

        survey.set_outcome("Stroke", Utc::now());
        survey.set_time_period(Some("over 5 years"), Utc::now());
        let description = survey.scenario_description(&scenario);
        assert!(description.contains("stroke"));
        assert!(description.ends_with("over 5 years"));
    }

    #[test]
    fn publish_requires_scenarios_and_unique_ids() {
        let mut survey = sample_survey();
        assert!(survey.validate_for_publish().is_ok());

        survey.apply_scenarios(
            vec![Scenario { id: "a".to_string(), magnitude: 50.0 }],
            ScenarioMerge::Append,
            Utc::now(),
        );
        assert_eq!(
            survey.validate_for_publish(),
            Err(EngineError::DuplicateScenarioId("a".to_string()))
        );

        survey.apply_scenarios(Vec::new(), ScenarioMerge::Replace, Utc::now());
        assert_eq!(survey.validate_for_publish(), Err(EngineError::EmptyScenarioSet));
    }

    #[test]
    fn survey_json_uses_catalog_ids() {
        let survey = sample_survey();
        let json = serde_json::to_value(&survey).unwrap();
        assert_eq!(json["objective_type"], "MID");
        assert_eq!(json["scenarios"][0]["magnitude"], 2.0);

        let parsed: Survey = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.scenarios, survey.scenarios);
    }

    #[test]
    fn negative_magnitudes_are_not_publishable() {
        let mut survey = sample_survey();
        survey.scenarios[0].magnitude = -1.0;
        assert!(matches!(
            survey.validate_for_publish(),
            Err(EngineError::InvalidRange(_))
        ));
    }

    #[test]
    fn responses_default_to_anonymous_and_reject_unknown_scenarios() {
        let survey = sample_survey();
        let mut answers = BTreeMap::new();
        answers.insert("a".to_string(), 2);
        let response = Response::new("r1".to_string(), Some("  "), answers.clone(), Utc::now());
        assert_eq!(response.respondent_name, ANONYMOUS_RESPONDENT);
        assert!(response.validate_against(&survey).is_ok());

        answers.insert("gone".to_string(), 1);
        let stale = Response::new("r2".to_string(), None, answers, Utc::now());
        assert!(matches!(
            stale.validate_against(&survey),
            Err(EngineError::UnknownScenarioReference { .. })
        ));
    }
}
