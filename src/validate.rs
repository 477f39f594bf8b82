use std::io::Read;

use chrono::NaiveDate;
use csv::ByteRecord;
use tracing::{debug, info, warn};

use crate::config::ColumnSchema;
use crate::error::{PipelineError, RowError};
use crate::models::{CourseRecord, Status};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One input line keyed by header name, in column order.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    fields: Vec<(String, String)>,
}

impl RawRow {
    /// Builds a row from raw bytes. Invalid UTF-8 is replaced rather than
    /// failing the row, so a single mis-encoded name only affects that field.
    pub fn from_record(headers: &[String], record: &ByteRecord) -> Self {
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), String::from_utf8_lossy(value).into_owned()))
            .collect();
        Self { fields }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let fields = pairs
            .into_iter()
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        Self { fields }
    }

    /// Trimmed value of `column`; absent columns read as blank.
    pub fn get(&self, column: &str) -> &str {
        self.fields
            .iter()
            .find(|(header, _)| header == column)
            .map(|(_, value)| value.trim())
            .unwrap_or("")
    }
}

/// Turns one row into a `CourseRecord`.
///
/// Structural problems (blank required field, bad date or grade, missing
/// completion date on a finished attempt) reject the row. A completion
/// date outside `[start_date, end_date]` yields `RowError::OutOfRange`,
/// which callers treat as a silent discard.
pub fn validate_row(row: &RawRow, schema: &ColumnSchema) -> Result<CourseRecord, RowError> {
    let first_name = required(row, &schema.first_name, "first name")?;
    let last_name = required(row, &schema.last_name, "last name")?;
    let email = required(row, &schema.email, "email")?;
    let course_name = required(row, &schema.course_name, "course name")?;
    let status_raw = required(row, &schema.status, "status")?;
    let start_raw = required(row, &schema.start_date, "course start")?;
    let end_raw = required(row, &schema.end_date, "course end")?;

    let status = Status::parse(status_raw);
    let start_date = parse_date(start_raw, "course start")?;
    let end_date = parse_date(end_raw, "course end")?;

    let grade = match row.get(&schema.grade) {
        "" => None,
        value => Some(
            value
                .parse::<i32>()
                .map_err(|_| RowError::InvalidGrade(value.to_string()))?,
        ),
    };

    let completion_date = match row.get(&schema.completion_date) {
        "" if status == Status::InProgress => None,
        "" => {
            return Err(RowError::MissingCompletionDate {
                status: status.to_string(),
            })
        }
        value => Some(parse_date(value, "completion date")?),
    };

    if let Some(completion) = completion_date {
        if completion < start_date || completion > end_date {
            return Err(RowError::OutOfRange {
                completion,
                start: start_date,
                end: end_date,
            });
        }
    }

    // Grades only belong to completed attempts.
    let grade = if status == Status::Completed { grade } else { None };

    Ok(CourseRecord {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        course_name: course_name.to_string(),
        start_date,
        end_date,
        status,
        grade,
        completion_date,
    })
}

fn required<'a>(row: &'a RawRow, column: &str, field: &'static str) -> Result<&'a str, RowError> {
    match row.get(column) {
        "" => Err(RowError::MissingField(field)),
        value => Ok(value),
    }
}

fn parse_date(value: &str, field: &'static str) -> Result<NaiveDate, RowError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| RowError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub rows: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub records: Vec<CourseRecord>,
    pub stats: ParseStats,
}

/// Reads a whole CSV document and validates every data row.
///
/// Row failures are logged and skipped, including rows that are not valid
/// UTF-8. Header problems, I/O errors and a document without data rows fail
/// the whole file.
pub fn read_records<R: Read>(input: R, schema: &ColumnSchema) -> Result<ParsedFile, PipelineError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|header| String::from_utf8_lossy(header).trim().to_string())
        .collect();

    if headers.iter().all(|header| header.is_empty()) {
        return Err(PipelineError::EmptyFile);
    }
    for column in schema.required() {
        if !headers.iter().any(|header| header == column) {
            return Err(PipelineError::MissingColumn(column.to_string()));
        }
    }

    let mut parsed = ParsedFile::default();

    for (index, result) in reader.byte_records().enumerate() {
        let record = result?;
        // header is line 1
        let line = index + 2;
        parsed.stats.rows += 1;

        let row = RawRow::from_record(&headers, &record);
        match validate_row(&row, schema) {
            Ok(course_record) => {
                if let Status::Other(status) = &course_record.status {
                    warn!(line, %status, "Accepted record with unrecognized status");
                }
                debug!(
                    line,
                    email = %course_record.email,
                    course = %course_record.course_name,
                    status = %course_record.status,
                    "Accepted record"
                );
                parsed.stats.accepted += 1;
                parsed.records.push(course_record);
            }
            Err(reason) if reason.is_discard() => {
                warn!(line, %reason, "Skipping record outside course date range");
                parsed.stats.discarded += 1;
            }
            Err(reason) => {
                warn!(line, %reason, "Skipping invalid row");
                parsed.stats.rejected += 1;
            }
        }
    }

    if parsed.stats.rows == 0 {
        return Err(PipelineError::EmptyFile);
    }

    info!(
        accepted = parsed.stats.accepted,
        rejected = parsed.stats.rejected,
        discarded = parsed.stats.discarded,
        "Parsed {} valid course records",
        parsed.records.len()
    );
    Ok(parsed)
}
