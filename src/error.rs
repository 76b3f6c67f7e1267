use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid scenario range: {0}")]
    InvalidRange(String),
    #[error("answer references unknown scenario {scenario_id}")]
    UnknownScenarioReference { scenario_id: String },
    #[error("answer option {index} is outside the six-point scale")]
    OptionOutOfRange { index: usize },
    #[error("survey has no scenarios")]
    EmptyScenarioSet,
    #[error("survey is missing {0}")]
    MissingField(&'static str),
    #[error("unknown objective type {0:?}")]
    UnknownObjectiveType(String),
    #[error("{given} answers given for {scenarios} scenarios")]
    TooManyAnswers { given: usize, scenarios: usize },
    #[error("scenario id {0} appears more than once")]
    DuplicateScenarioId(String),
}
