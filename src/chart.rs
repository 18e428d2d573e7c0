use chrono::NaiveDate;
use serde::Serialize;

use crate::grading;
use crate::models::{CourseGroup, Grade, Learner};

/// One Plotly trace
#[derive(Debug, Serialize)]
pub struct Trace {
    pub x: Vec<NaiveDate>,
    pub y: Vec<f64>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub mode: &'static str,
    pub name: String,
    pub line: LineStyle,
}

#[derive(Debug, Serialize)]
pub struct LineStyle {
    pub shape: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Axis {
    pub title: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

/// Plotly layout
#[derive(Debug, Serialize)]
pub struct Layout {
    pub title: String,
    pub xaxis: Axis,
    pub yaxis: Axis,
}

/// Chart options for a progress line
#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub title: String,
    pub trace_name: &'static str,
    pub y_label: &'static str,
    pub color: &'static str,
}

/// Serialized `plot_data` and `plot_layout`, ready to embed in a `<script>`.
#[derive(Debug, Serialize)]
pub struct PlotJson {
    pub data: String,
    pub layout: String,
}

/// Builds the trace/layout pair for a score-over-time line.
///
/// Returns `None` for an empty series so the page can show a placeholder.
pub fn progress_chart(
    points: &[(NaiveDate, f64)],
    options: ChartOptions,
) -> Result<Option<PlotJson>, serde_json::Error> {
    if points.is_empty() {
        return Ok(None);
    }

    let trace = Trace {
        x: points.iter().map(|(date, _)| *date).collect(),
        y: points.iter().map(|(_, score)| *score).collect(),
        kind: "scatter",
        mode: "lines+markers",
        name: options.trace_name.to_string(),
        line: LineStyle {
            shape: "spline",
            color: options.color,
        },
    };
    let layout = Layout {
        title: options.title,
        xaxis: Axis {
            title: "Date",
            range: None,
        },
        yaxis: Axis {
            title: options.y_label,
            range: Some([0.0, 100.0]),
        },
    };

    Ok(Some(PlotJson {
        data: script_safe(serde_json::to_string(&[trace])?),
        layout: script_safe(serde_json::to_string(&layout)?),
    }))
}

/// Chart of a learner's individual scores.
pub fn learner_chart(
    learner: &Learner,
    grades: &[Grade],
) -> Result<Option<PlotJson>, serde_json::Error> {
    let mut points: Vec<(NaiveDate, f64)> =
        grades.iter().map(|g| (g.date, g.numeric_grade)).collect();
    points.sort_by_key(|(date, _)| *date);

    progress_chart(
        &points,
        ChartOptions {
            title: format!("Progress of {}", learner.full_name()),
            trace_name: "Scores over Time",
            y_label: "Score",
            color: "blue",
        },
    )
}

/// Chart of a group's per-date average.
pub fn group_chart(
    group: &CourseGroup,
    grades: &[Grade],
) -> Result<Option<PlotJson>, serde_json::Error> {
    progress_chart(
        &grading::daily_means(grades),
        ChartOptions {
            title: format!(
                "Class Progress Over Time - Year {} {}",
                group.class_level, group.course_subject
            ),
            trace_name: "Class Average Scores",
            y_label: "Average Score",
            color: "green",
        },
    )
}

// JSON may contain "</script>" inside a learner name.
fn script_safe(json: String) -> String {
    json.replace("</", "<\\/")
}
