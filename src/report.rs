use std::fmt::Write;

use anyhow::Context;
use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::aggregate;
use crate::models::{Response, ScenarioSummary, Survey};

const BYTE_ORDER_MARK: char = '\u{FEFF}';
pub const RESULTS_FILE_SUFFIX: &str = "_results.csv";
pub const MEDIAN_MARKER: &str = "Median";

pub const SUMMARY_HEADER: [&str; 5] = ["Scenario", "Answer option", "Count", "Percent", "Median"];

/// `title` with every non-alphanumeric character replaced by `_`.
pub fn export_file_name(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}{RESULTS_FILE_SUFFIX}")
}

/// Comma-separated results: header lines, per-option summary rows and one
/// raw row per response. Every field is quoted; section separators are bare
/// empty lines.
pub fn format_export(
    survey: &Survey,
    summaries: &[ScenarioSummary],
    responses: &[Response],
) -> anyhow::Result<String> {
    let options = survey.objective_type.options();
    let mut body = Vec::new();

    push_row(&mut body, [format!("Results: {}", survey.title)])?;
    push_row(&mut body, [format!("Total responses: {}", responses.len())])?;
    body.push(b'\n');
    push_row(&mut body, ["SUMMARY"])?;
    push_row(&mut body, SUMMARY_HEADER)?;

    for summary in summaries {
        let shares = aggregate::percentages(summary);
        for (index, label) in options.iter().enumerate() {
            let marker = if summary.median_index == Some(index) {
                MEDIAN_MARKER
            } else {
                ""
            };
            push_row(
                &mut body,
                [
                    format!("{} / 1000", summary.magnitude),
                    label.to_string(),
                    summary.counts[index].to_string(),
                    format!("{}%", shares[index]),
                    marker.to_string(),
                ],
            )?;
        }
        body.push(b'\n');
    }

    push_row(&mut body, ["INDIVIDUAL RESPONSES"])?;
    let mut header = vec!["Respondent".to_string()];
    header.extend(
        survey
            .scenarios
            .iter()
            .map(|scenario| format!("{}/1000", scenario.magnitude)),
    );
    push_row(&mut body, &header)?;

    for response in responses {
        let mut row = vec![response.respondent_name.clone()];
        row.extend(survey.scenarios.iter().map(|scenario| {
            response
                .answers
                .get(&scenario.id)
                .map(|index| (index + 1).to_string())
                .unwrap_or_default()
        }));
        push_row(&mut body, &row)?;
    }

    let body = String::from_utf8(body).context("export is not valid UTF-8")?;
    let mut output = String::with_capacity(body.len() + BYTE_ORDER_MARK.len_utf8());
    output.push(BYTE_ORDER_MARK);
    output.push_str(&body);
    Ok(output)
}

/// Appends one quoted, newline-terminated record.
fn push_row<I, T>(body: &mut Vec<u8>, fields: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let line = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush export row: {}", err.error()))?;
    body.extend_from_slice(&line);
    Ok(())
}

/// Terminal view of the aggregated results.
pub fn render_results(
    survey: &Survey,
    summaries: &[ScenarioSummary],
    response_count: usize,
) -> String {
    let options = survey.objective_type.options();
    let mut output = String::new();

    let _ = writeln!(output, "# {}", survey.title);
    let _ = writeln!(
        output,
        "{} · {} responses",
        survey.objective_type.label(),
        response_count
    );

    if response_count == 0 {
        let _ = writeln!(output);
        let _ = writeln!(output, "No responses recorded yet.");
        return output;
    }

    for summary in summaries {
        let shares = aggregate::percentages(summary);
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "## {} in 1000 ({} answers)",
            summary.magnitude, summary.total
        );
        for (index, label) in options.iter().enumerate() {
            let marker = if summary.median_index == Some(index) {
                "  <- median"
            } else {
                ""
            };
            let _ = writeln!(
                output,
                "- {label}: {} ({}%){marker}",
                summary.counts[index], shares[index]
            );
        }
    }

    output
}
