use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use crate::models::NewBoundary;

/// Why an uploaded boundary file was rejected.
///
/// The `Display` text is shown to the user on the upload page.
#[derive(Debug, Error, PartialEq)]
pub enum BoundaryError {
    #[error("CSV file is empty.")]
    Empty,

    #[error("The first row should contain only the subject name.")]
    SubjectRow,

    #[error("CSV subject '{found}' does not match the class's subject '{expected}'.")]
    SubjectMismatch { found: String, expected: String },

    #[error("Each grade boundary row must have three values: grade, lower_bound, upper_bound.")]
    RowWidth,

    #[error("Line {line}: {message}")]
    InvalidValue { line: u64, message: String },

    #[error("An error occurred while processing the CSV file: {0}")]
    Malformed(String),
}

/// A boundary table read from an uploaded CSV file
#[derive(Debug, PartialEq)]
pub struct BoundaryTable {
    pub subject: String,
    pub rows: Vec<NewBoundary>,
}

/// Parse an uploaded boundary file.
///
/// Layout:
/// ```text
/// Maths AA HL
/// 7,80,100
/// 6,68,79
/// ```
/// The first row carries only the subject, which must equal
/// `expected_subject`. Every later row is `grade, lower_bound, upper_bound`.
/// Nothing is returned unless the whole file is valid.
pub fn parse_boundaries(
    bytes: &[u8],
    expected_subject: &str,
) -> Result<BoundaryTable, BoundaryError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let mut records = reader.records();

    let subject_row = match records.next() {
        None => return Err(BoundaryError::Empty),
        Some(row) => row.map_err(|e| BoundaryError::Malformed(e.to_string()))?,
    };
    if subject_row.len() != 1 {
        return Err(BoundaryError::SubjectRow);
    }
    let subject = subject_row[0].trim_start_matches('\u{feff}').trim().to_string();
    if subject != expected_subject {
        return Err(BoundaryError::SubjectMismatch {
            found: subject,
            expected: expected_subject.to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| BoundaryError::Malformed(e.to_string()))?;
        rows.push(parse_row(&record)?);
    }

    Ok(BoundaryTable { subject, rows })
}

fn parse_row(record: &StringRecord) -> Result<NewBoundary, BoundaryError> {
    if record.len() != 3 {
        return Err(BoundaryError::RowWidth);
    }
    let line = record.position().map(|p| p.line()).unwrap_or_default();
    let invalid = |message: String| BoundaryError::InvalidValue { line, message };

    let grade = record[0]
        .parse::<i64>()
        .map_err(|_| invalid(format!("grade '{}' is not a whole number", &record[0])))?;
    let lower_bound = parse_bound(&record[1]).ok_or_else(|| {
        invalid(format!("lower bound '{}' is not a number", &record[1]))
    })?;
    let upper_bound = parse_bound(&record[2]).ok_or_else(|| {
        invalid(format!("upper bound '{}' is not a number", &record[2]))
    })?;
    if lower_bound > upper_bound {
        return Err(invalid(format!(
            "lower bound {} is above upper bound {}",
            lower_bound, upper_bound
        )));
    }

    Ok(NewBoundary {
        grade,
        lower_bound,
        upper_bound,
    })
}

fn parse_bound(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
