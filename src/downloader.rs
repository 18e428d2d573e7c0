use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::{AppError, AppResult};
use crate::grading::round_1;

const HEADERS: [&str; 6] = [
    "Surname",
    "Name",
    "Assessment",
    "Date",
    "Score",
    "Student Average",
];

/// One exported grade line
#[derive(Debug, Clone, PartialEq)]
pub struct GradebookRow {
    pub last_name: String,
    pub first_name: String,
    pub exam_title: String,
    pub date: NaiveDate,
    pub score: f64,
    pub learner_average: Option<f64>,
}

/// Convert a group's gradebook to CSV.
///
/// Fields containing commas, quotes or newlines are quoted.
///
/// # Examples
/// ```
/// use gradebook::downloader::to_csv;
///
/// let csv = to_csv(&[]).unwrap();
/// assert_eq!(csv, "Surname,Name,Assessment,Date,Score,Student Average\n");
/// ```
pub fn to_csv(rows: &[GradebookRow]) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADERS)?;

    for row in rows {
        writer.write_record([
            row.last_name.clone(),
            row.first_name.clone(),
            row.exam_title.clone(),
            row.date.format("%Y-%m-%d").to_string(),
            row.score.to_string(),
            row.learner_average
                .map(|avg| format!("{:.1}", round_1(avg)))
                .unwrap_or_default(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AppError::Export(e.to_string()))
}

/// Convert a group's gradebook to an XLSX workbook with one sheet.
pub fn to_xlsx(title: &str, rows: &[GradebookRow]) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(sheet_name(title).as_str())?;

    let bold = Format::new().set_bold();
    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        worksheet.write_string(r, 0, row.last_name.as_str())?;
        worksheet.write_string(r, 1, row.first_name.as_str())?;
        worksheet.write_string(r, 2, row.exam_title.as_str())?;
        worksheet.write_string(r, 3, row.date.format("%Y-%m-%d").to_string().as_str())?;
        worksheet.write_number(r, 4, row.score)?;
        if let Some(avg) = row.learner_average {
            worksheet.write_number(r, 5, round_1(avg))?;
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

/// Excel sheet names are at most 31 characters and exclude `[]:*?/\`.
fn sheet_name(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect()
}
