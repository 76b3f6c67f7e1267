use std::collections::BTreeMap;

use anyhow::Context;
use chrono::Utc;
use sqlx::{PgConnection, PgPool, Row};

use crate::ids::IdGenerator;
use crate::models::{ObjectiveType, Response, Scenario, ScenarioMerge, Survey};
use crate::{scenarios, sequence};

const SEED_SURVEY_ID: &str = "seed-mid-myocardial-infarction";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool, ids: &mut dyn IdGenerator) -> anyhow::Result<bool> {
    if load_survey(pool, SEED_SURVEY_ID).await?.is_some() {
        return Ok(false);
    }

    let now = Utc::now();
    let mut survey = Survey::new(
        SEED_SURVEY_ID.to_string(),
        "MID survey – myocardial infarction",
        ObjectiveType::Mid,
        "Adults with risk of myocardial infarction",
        "Myocardial infarction",
        now,
    );
    survey.set_time_period(Some("over a period of 5 years"), now);
    survey.intro_text = Some(
        "You will be shown a series of risk reductions. For each, judge how patients would value it."
            .to_string(),
    );
    let magnitudes = scenarios::generate_scenarios(1.0, 20.0, scenarios::DEFAULT_SCENARIO_COUNT)?;
    survey.apply_scenarios(
        scenarios::mint_scenarios(&magnitudes, ids),
        ScenarioMerge::Replace,
        now,
    );
    save_survey(pool, &survey).await?;

    // Answers in presentation order: 1, 20, 5, 16, 8, 12.
    let panel: [(&str, [Option<usize>; 6]); 3] = [
        ("Avery Lee", [Some(5), Some(1), Some(4), Some(1), Some(3), Some(2)]),
        ("Jules Moreno", [Some(6), Some(1), Some(4), Some(2), Some(3), Some(3)]),
        ("Kiara Patel", [Some(4), Some(2), None, Some(2), Some(3), Some(2)]),
    ];
    for (name, choices) in panel {
        let answers = sequence::answers_from_sequence(&survey, &choices)?;
        let response = Response::new(ids.next_id(), Some(name), answers, Utc::now());
        append_response(pool, &survey.id, &response).await?;
    }

    Ok(true)
}

pub async fn load_survey(pool: &PgPool, survey_id: &str) -> anyhow::Result<Option<Survey>> {
    let mut conn = pool.acquire().await?;
    fetch_survey(&mut *conn, survey_id).await
}

pub async fn list_surveys(pool: &PgPool) -> anyhow::Result<Vec<Survey>> {
    let mut conn = pool.acquire().await?;
    let ids: Vec<String> = sqlx::query(
        "SELECT id FROM panel_elicitation.surveys ORDER BY created_at, id",
    )
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| row.get("id"))
    .collect();

    let mut surveys = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(survey) = fetch_survey(&mut *conn, &id).await? {
            surveys.push(survey);
        }
    }
    Ok(surveys)
}

/// Upsert keyed by id. The stored scenario set is replaced wholesale.
pub async fn save_survey(pool: &PgPool, survey: &Survey) -> anyhow::Result<()> {
    survey
        .validate_for_publish()
        .with_context(|| format!("survey {} cannot be published", survey.id))?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO panel_elicitation.surveys
        (id, title, objective_type, population, outcome, time_period,
         intro_text, harm_info, intervention, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE
        SET title = EXCLUDED.title,
            objective_type = EXCLUDED.objective_type,
            population = EXCLUDED.population,
            outcome = EXCLUDED.outcome,
            time_period = EXCLUDED.time_period,
            intro_text = EXCLUDED.intro_text,
            harm_info = EXCLUDED.harm_info,
            intervention = EXCLUDED.intervention,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&survey.id)
    .bind(&survey.title)
    .bind(survey.objective_type.id())
    .bind(&survey.population)
    .bind(&survey.outcome)
    .bind(&survey.time_period)
    .bind(&survey.intro_text)
    .bind(&survey.harm_info)
    .bind(&survey.intervention)
    .bind(survey.created_at)
    .bind(survey.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM panel_elicitation.scenarios WHERE survey_id = $1")
        .bind(&survey.id)
        .execute(&mut *tx)
        .await?;

    for (position, scenario) in survey.scenarios.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO panel_elicitation.scenarios (survey_id, id, position, magnitude)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&survey.id)
        .bind(&scenario.id)
        .bind(position as i32)
        .bind(scenario.magnitude)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    log::info!(
        "saved survey {} with {} scenarios",
        survey.id,
        survey.scenarios.len()
    );
    Ok(())
}

/// Removes the survey together with all of its responses.
pub async fn delete_survey(pool: &PgPool, survey_id: &str) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;
    let responses = sqlx::query("DELETE FROM panel_elicitation.responses WHERE survey_id = $1")
        .bind(survey_id)
        .execute(&mut *tx)
        .await?;
    let surveys = sqlx::query("DELETE FROM panel_elicitation.surveys WHERE id = $1")
        .bind(survey_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log::info!(
        "deleted survey {} and {} responses",
        survey_id,
        responses.rows_affected()
    );
    Ok(surveys.rows_affected() > 0)
}

/// Responses in submission order.
pub async fn list_responses(pool: &PgPool, survey_id: &str) -> anyhow::Result<Vec<Response>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, r.respondent_name, r.submitted_at, a.scenario_id, a.option_index
        FROM panel_elicitation.responses r
        LEFT JOIN panel_elicitation.response_answers a ON a.response_id = r.id
        WHERE r.survey_id = $1
        ORDER BY r.sequence, a.scenario_id
        "#,
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    let mut responses: Vec<Response> = Vec::new();
    for row in rows {
        let id: String = row.get("id");
        if responses.last().map(|response| &response.id) != Some(&id) {
            responses.push(Response {
                id,
                respondent_name: row.get("respondent_name"),
                answers: BTreeMap::new(),
                submitted_at: row.get("submitted_at"),
            });
        }

        let scenario_id: Option<String> = row.get("scenario_id");
        let option_index: Option<i16> = row.get("option_index");
        if let (Some(scenario_id), Some(option_index), Some(response)) =
            (scenario_id, option_index, responses.last_mut())
        {
            response
                .answers
                .insert(scenario_id, usize::try_from(option_index)?);
        }
    }
    Ok(responses)
}

/// Stores a submission after checking it against the survey as it is now.
pub async fn append_response(
    pool: &PgPool,
    survey_id: &str,
    response: &Response,
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    let survey = fetch_survey(&mut *tx, survey_id)
        .await?
        .with_context(|| format!("survey {survey_id} not found"))?;
    response
        .validate_against(&survey)
        .with_context(|| format!("response {} rejected", response.id))?;

    sqlx::query(
        r#"
        INSERT INTO panel_elicitation.responses (id, survey_id, respondent_name, submitted_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(&response.id)
    .bind(survey_id)
    .bind(&response.respondent_name)
    .bind(response.submitted_at)
    .execute(&mut *tx)
    .await?;

    for (scenario_id, &index) in &response.answers {
        sqlx::query(
            r#"
            INSERT INTO panel_elicitation.response_answers (response_id, scenario_id, option_index)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&response.id)
        .bind(scenario_id)
        .bind(i16::try_from(index)?)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    log::debug!(
        "stored response {} for survey {} ({} answers)",
        response.id,
        survey_id,
        response.answers.len()
    );
    Ok(())
}

/// Loads responses from a long-format CSV: one row per answered scenario,
/// rows grouped into responses by respondent name.
pub async fn import_responses_csv(
    pool: &PgPool,
    survey_id: &str,
    csv_path: &std::path::Path,
    ids: &mut dyn IdGenerator,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        respondent: String,
        scenario_magnitude: f64,
        option: usize,
    }

    let survey = load_survey(pool, survey_id)
        .await?
        .with_context(|| format!("survey {survey_id} not found"))?;

    let mut grouped: Vec<(String, BTreeMap<String, usize>)> = Vec::new();
    let mut reader = csv::Reader::from_path(csv_path)?;
    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let scenario = scenario_for_magnitude(&survey, row.scenario_magnitude).with_context(|| {
            format!(
                "row {}: no scenario of {} in 1000",
                line + 1,
                row.scenario_magnitude
            )
        })?;
        anyhow::ensure!(
            (1..=crate::models::OPTION_COUNT).contains(&row.option),
            "row {}: option {} is not between 1 and 6",
            line + 1,
            row.option
        );

        let position = match grouped.iter().position(|(name, _)| *name == row.respondent) {
            Some(position) => position,
            None => {
                grouped.push((row.respondent.clone(), BTreeMap::new()));
                grouped.len() - 1
            }
        };
        grouped[position].1.insert(scenario.id.clone(), row.option - 1);
    }

    for (name, answers) in &grouped {
        let response = Response::new(ids.next_id(), Some(name), answers.clone(), Utc::now());
        append_response(pool, survey_id, &response).await?;
    }
    Ok(grouped.len())
}

fn scenario_for_magnitude(survey: &Survey, magnitude: f64) -> Option<&Scenario> {
    survey
        .scenarios
        .iter()
        .find(|scenario| (scenario.magnitude - magnitude).abs() < 1e-9)
}

async fn fetch_survey(conn: &mut PgConnection, survey_id: &str) -> anyhow::Result<Option<Survey>> {
    let Some(row) = sqlx::query(
        r#"
        SELECT id, title, objective_type, population, outcome, time_period,
               intro_text, harm_info, intervention, created_at, updated_at
        FROM panel_elicitation.surveys
        WHERE id = $1
        "#,
    )
    .bind(survey_id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let objective_type: String = row.get("objective_type");
    let scenarios = sqlx::query(
        r#"
        SELECT id, magnitude
        FROM panel_elicitation.scenarios
        WHERE survey_id = $1
        ORDER BY position
        "#,
    )
    .bind(survey_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| Scenario {
        id: row.get("id"),
        magnitude: row.get("magnitude"),
    })
    .collect();

    Ok(Some(Survey {
        id: row.get("id"),
        title: row.get("title"),
        objective_type: objective_type.parse()?,
        population: row.get("population"),
        outcome: row.get("outcome"),
        time_period: row.get("time_period"),
        intro_text: row.get("intro_text"),
        harm_info: row.get("harm_info"),
        intervention: row.get("intervention"),
        scenarios,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}
