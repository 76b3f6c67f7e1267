use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod aggregate;
mod config;
mod db;
mod describe;
mod error;
mod ids;
mod models;
mod report;
mod scenarios;
mod sequence;

use config::Config;
use ids::{IdGenerator, UuidGenerator};
use models::{ObjectiveType, Response, ScenarioMerge, Survey};

#[derive(Parser)]
#[command(name = "panel-elicit")]
#[command(about = "Structured elicitation panels for clinical effect thresholds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demonstration survey with responses
    Seed,
    /// Preview the scenarios a range would produce
    Generate {
        #[arg(long)]
        min: f64,
        #[arg(long)]
        max: f64,
        #[arg(long, default_value_t = scenarios::DEFAULT_SCENARIO_COUNT)]
        count: usize,
        /// Show each scenario's description for this objective type
        #[arg(long)]
        objective: Option<ObjectiveType>,
        #[arg(long)]
        outcome: Option<String>,
        #[arg(long)]
        time_period: Option<String>,
    },
    /// Show the objective types and their answer scales
    Objectives,
    /// List surveys
    List,
    /// Create a survey with a generated scenario range
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        objective: ObjectiveType,
        #[arg(long)]
        population: String,
        #[arg(long)]
        outcome: String,
        #[arg(long)]
        time_period: Option<String>,
        #[arg(long)]
        intro: Option<String>,
        /// Constant harms / burdens shown with every question
        #[arg(long)]
        harms: Option<String>,
        #[arg(long)]
        intervention: Option<String>,
        #[arg(long)]
        min: f64,
        #[arg(long)]
        max: f64,
        #[arg(long, default_value_t = scenarios::DEFAULT_SCENARIO_COUNT)]
        count: usize,
    },
    /// Add scenarios to an existing survey
    AddScenario {
        #[arg(long)]
        survey: String,
        #[arg(long)]
        magnitude: f64,
    },
    /// Print a survey record as JSON
    Show {
        #[arg(long)]
        survey: String,
    },
    /// Create or replace a survey from a JSON record
    ImportSurvey {
        #[arg(long)]
        json: PathBuf,
    },
    /// Change survey fields; scenario descriptions follow automatically
    Edit {
        #[arg(long)]
        survey: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        objective: Option<ObjectiveType>,
        #[arg(long)]
        outcome: Option<String>,
        /// Pass an empty string to clear
        #[arg(long)]
        time_period: Option<String>,
    },
    /// Remove one scenario from a survey
    RemoveScenario {
        #[arg(long)]
        survey: String,
        #[arg(long)]
        scenario: String,
    },
    /// Show the respondent walk-through without recording anything
    Preview {
        #[arg(long)]
        survey: String,
    },
    /// Record one response; answers follow the preview order
    Respond {
        #[arg(long)]
        survey: String,
        #[arg(long)]
        name: Option<String>,
        /// Comma separated option numbers (1-6), blank to skip, e.g. "1,3,,2"
        #[arg(long, value_parser = parse_choices)]
        answers: Choices,
    },
    /// Import responses from a CSV (respondent,scenario_magnitude,option)
    ImportResponses {
        #[arg(long)]
        survey: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Summarize responses per scenario
    Results {
        #[arg(long)]
        survey: String,
    },
    /// Write the results CSV
    Export {
        #[arg(long)]
        survey: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a survey and its responses
    Delete {
        #[arg(long)]
        survey: String,
    },
}

#[derive(Debug, Clone)]
struct Choices(Vec<Option<usize>>);

fn parse_choices(value: &str) -> Result<Choices, String> {
    value
        .split(',')
        .map(|part| match part.trim() {
            "" => Ok(None),
            number => number
                .parse::<usize>()
                .map(Some)
                .map_err(|_| format!("{number:?} is not an option number")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Choices)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut ids = UuidGenerator;

    if let Commands::Generate {
        min,
        max,
        count,
        objective,
        outcome,
        time_period,
    } = &cli.command
    {
        let values = scenarios::generate_scenarios(*min, *max, *count)?;
        println!("{} scenarios:", values.len());
        for value in values {
            match objective {
                Some(kind) => println!(
                    "- {} in 1000: {}",
                    value,
                    describe::auto_describe(
                        *kind,
                        outcome.as_deref(),
                        value,
                        time_period.as_deref()
                    )
                ),
                None => println!("- {value} in 1000"),
            }
        }
        return Ok(());
    }

    if let Commands::Objectives = cli.command {
        for kind in ObjectiveType::ALL {
            println!("{} – {}", kind.id(), kind.label());
            println!("  {}", kind.description());
            for (index, option) in kind.options().iter().enumerate() {
                println!("  {}. {}", index + 1, option);
            }
        }
        return Ok(());
    }

    let config = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::Generate { .. } | Commands::Objectives => {}
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            if db::seed(&pool, &mut ids).await? {
                println!("Seed survey and responses inserted.");
            } else {
                println!("Seed survey already present.");
            }
        }
        Commands::List => {
            let surveys = db::list_surveys(&pool).await?;
            if surveys.is_empty() {
                println!("No surveys yet.");
                return Ok(());
            }
            for survey in surveys {
                let responses = db::list_responses(&pool, &survey.id).await?;
                let range = survey
                    .magnitude_range()
                    .map(|(lo, hi)| format!("{lo}–{hi} in 1000"))
                    .unwrap_or_else(|| "no scenarios".to_string());
                println!(
                    "- {} [{}] {} · {} scenarios, {} · {} responses",
                    survey.id,
                    survey.objective_type,
                    survey.title,
                    survey.scenarios.len(),
                    range,
                    responses.len()
                );
            }
        }
        Commands::Create {
            title,
            objective,
            population,
            outcome,
            time_period,
            intro,
            harms,
            intervention,
            min,
            max,
            count,
        } => {
            let now = Utc::now();
            let mut survey = Survey::new(ids.next_id(), &title, objective, &population, &outcome, now);
            survey.set_time_period(time_period.as_deref(), now);
            survey.intro_text = intro;
            survey.harm_info = harms;
            survey.intervention = intervention;

            let magnitudes = scenarios::generate_scenarios(min, max, count)?;
            survey.apply_scenarios(
                scenarios::mint_scenarios(&magnitudes, &mut ids),
                ScenarioMerge::Replace,
                now,
            );
            db::save_survey(&pool, &survey).await?;
            println!(
                "Created survey {} with {} scenarios.",
                survey.id,
                survey.scenarios.len()
            );
        }
        Commands::AddScenario { survey, magnitude } => {
            anyhow::ensure!(
                magnitude.is_finite() && magnitude >= 0.0,
                "magnitude must be a non-negative number"
            );
            let mut survey = require_survey(&pool, &survey).await?;
            survey.apply_scenarios(
                scenarios::mint_scenarios(&[magnitude], &mut ids),
                ScenarioMerge::Append,
                Utc::now(),
            );
            db::save_survey(&pool, &survey).await?;
            println!(
                "Survey {} now has {} scenarios.",
                survey.id,
                survey.scenarios.len()
            );
        }
        Commands::Show { survey } => {
            let survey = require_survey(&pool, &survey).await?;
            println!("{}", serde_json::to_string_pretty(&survey)?);
        }
        Commands::ImportSurvey { json } => {
            let raw = std::fs::read_to_string(&json)
                .with_context(|| format!("failed to read {}", json.display()))?;
            let mut survey: Survey = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a survey record", json.display()))?;
            let scenarios = std::mem::take(&mut survey.scenarios);
            survey.apply_scenarios(scenarios, ScenarioMerge::Replace, Utc::now());
            db::save_survey(&pool, &survey).await?;
            println!(
                "Saved survey {} with {} scenarios.",
                survey.id,
                survey.scenarios.len()
            );
        }
        Commands::Edit {
            survey,
            title,
            objective,
            outcome,
            time_period,
        } => {
            let mut survey = require_survey(&pool, &survey).await?;
            let now = Utc::now();
            if let Some(title) = title {
                survey.title = title.trim().to_string();
                survey.updated_at = now;
            }
            if let Some(objective) = objective {
                survey.set_objective_type(objective, now);
            }
            if let Some(outcome) = outcome {
                survey.set_outcome(&outcome, now);
            }
            if let Some(time_period) = time_period {
                survey.set_time_period(Some(&time_period), now);
            }
            db::save_survey(&pool, &survey).await?;
            if let Some(first) = survey.scenarios.first() {
                println!("Updated. Example: {}", survey.scenario_description(first));
            }
        }
        Commands::RemoveScenario { survey, scenario } => {
            let mut survey = require_survey(&pool, &survey).await?;
            anyhow::ensure!(
                survey.remove_scenario(&scenario, Utc::now()),
                "survey {} has no scenario {}",
                survey.id,
                scenario
            );
            db::save_survey(&pool, &survey).await?;
            println!(
                "Survey {} now has {} scenarios.",
                survey.id,
                survey.scenarios.len()
            );
        }
        Commands::Preview { survey } => {
            let survey = require_survey(&pool, &survey).await?;
            for line in describe::intro_lines(&survey) {
                println!("{line}");
            }
            for card in sequence::walkthrough(&survey) {
                println!();
                println!(
                    "Question {} of {} · {} in 1000 [scenario {}]",
                    card.position, card.of, card.magnitude, card.scenario_id
                );
                println!("{}", card.prompt);
                println!("Effect: {}", card.effect);
                if let Some(harms) = &card.harms {
                    println!("Harms / burdens: {harms}");
                }
                for (index, option) in card.options.iter().enumerate() {
                    println!("  {}. {}", index + 1, option);
                }
            }
        }
        Commands::Respond {
            survey,
            name,
            answers,
        } => {
            let survey = require_survey(&pool, &survey).await?;
            let answers = sequence::answers_from_sequence(&survey, &answers.0)?;
            let response = Response::new(ids.next_id(), name.as_deref(), answers, Utc::now());
            db::append_response(&pool, &survey.id, &response).await?;
            println!(
                "Recorded {} answers from {}.",
                response.answers.len(),
                response.respondent_name
            );
        }
        Commands::ImportResponses { survey, csv } => {
            let inserted = db::import_responses_csv(&pool, &survey, &csv, &mut ids).await?;
            println!("Imported {inserted} responses from {}.", csv.display());
        }
        Commands::Results { survey } => {
            let survey = require_survey(&pool, &survey).await?;
            let responses = db::list_responses(&pool, &survey.id).await?;
            let summaries = aggregate::aggregate(&survey, &responses);
            print!(
                "{}",
                report::render_results(&survey, &summaries, responses.len())
            );
        }
        Commands::Export { survey, out } => {
            let survey = require_survey(&pool, &survey).await?;
            let responses = db::list_responses(&pool, &survey.id).await?;
            let summaries = aggregate::aggregate(&survey, &responses);
            let export = report::format_export(&survey, &summaries, &responses)?;
            let out = out.unwrap_or_else(|| {
                config
                    .export_dir
                    .join(report::export_file_name(&survey.title))
            });
            std::fs::write(&out, export)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Results written to {}.", out.display());
        }
        Commands::Delete { survey } => {
            if db::delete_survey(&pool, &survey).await? {
                println!("Deleted survey {survey} and its responses.");
            } else {
                println!("No survey with id {survey}.");
            }
        }
    }

    Ok(())
}

async fn require_survey(pool: &PgPool, survey_id: &str) -> anyhow::Result<Survey> {
    db::load_survey(pool, survey_id)
        .await?
        .with_context(|| format!("survey {survey_id} not found"))
}
