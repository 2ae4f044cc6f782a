//! Table compiler: job table text into a list of compiled [`Job`]s.
//!
//! A table line is `<name> <minute> <hour> <dom> <month> <dow> <command...>`.
//! Parsing is all-or-nothing: one malformed line rejects the whole table.

use crate::cron::field::{self, FieldSet};
use crate::error::{FieldError, PromcronError, Result};
use crate::job::{Job, Schedule};

/// Compile a full job table. `source_name` is only used to tag parse errors
/// with their origin (file path, or a synthetic name in tests).
pub fn parse_table(source_name: &str, text: &str) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let parse_error = |message: String| PromcronError::Parse {
            source_name: source_name.to_string(),
            line: line_no,
            message,
        };

        let fields = split_fields(line);
        if fields.len() != 7 {
            return Err(parse_error(
                "expected a label, timespec and a command".to_string(),
            ));
        }

        let compile = |expr: &str, bounds: &field::Bounds, what: &str| -> Result<FieldSet> {
            field::parse_field(expr, bounds)
                .map_err(|e: FieldError| parse_error(format!("invalid {what} spec: {e}")))
        };

        let schedule = Schedule {
            minute: compile(&fields[1], &field::MINUTE, "minute")?,
            hour: compile(&fields[2], &field::HOUR, "hour")?,
            day_of_month: compile(&fields[3], &field::DAY_OF_MONTH, "day of month")?,
            month: compile(&fields[4], &field::MONTH, "month")?,
            day_of_week: compile(&fields[5], &field::DAY_OF_WEEK, "day of week")?,
        };

        jobs.push(Job::new(fields[0].clone(), fields[6].clone(), schedule));
    }

    Ok(jobs)
}

/// Split a table line into at most 7 fields. Runs of spaces and tabs count as
/// one separator until 6 fields have been extracted; everything after the 6th
/// separator is the command, kept verbatim including embedded whitespace.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_field = false;

    for ch in line.chars() {
        if in_field {
            if fields.len() != 6 && (ch == ' ' || ch == '\t') {
                in_field = false;
                fields.push(std::mem::take(&mut current));
            } else {
                current.push(ch);
            }
        } else if ch != ' ' && ch != '\t' {
            in_field = true;
            current.push(ch);
        }
    }
    fields.push(current);

    fields
}
