use axum::{
    Extension, Form,
    body::Body,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use std::sync::Arc;

use crate::app::AppState;
use crate::boundaries::parse_boundaries;
use crate::chart;
use crate::downloader::{self, GradebookRow};
use crate::error::{AppError, AppResult};
use crate::forms::{GroupForm, validate_group};
use crate::grading;
use crate::login::CurrentUser;
use crate::models::{CourseGroup, SUBJECTS};
use crate::routes::{self, Path};

/// Averages are shown with one decimal; `None` renders as "N/A".
pub(crate) fn display_average(average: Option<f64>) -> Option<String> {
    average.map(|avg| format!("{:.1}", grading::round_1(avg)))
}

pub(crate) fn display_grade(grade: Option<i64>) -> Option<String> {
    grade.map(|g| g.to_string())
}

/// Lists the current user's groups.
pub async fn home_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    let groups = state.db()?.groups(user.id)?;
    Ok(state
        .views
        .page(
            "index",
            &json!({
                "page_title": "Classes",
                "username": user.username,
                "groups": groups,
            }),
        )?
        .into_response())
}

pub async fn add_group_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    render_add_group(&state, &user, None)
}

fn render_add_group(
    state: &AppState,
    user: &CurrentUser,
    error: Option<String>,
) -> AppResult<Response> {
    Ok(state
        .views
        .page(
            "add_group",
            &json!({
                "page_title": "Add class",
                "username": user.username,
                "subjects": SUBJECTS,
                "error": error,
            }),
        )?
        .into_response())
}

pub async fn add_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<GroupForm>,
) -> AppResult<Response> {
    let valid = match validate_group(&form) {
        Ok(valid) => valid,
        Err(error) => return render_add_group(&state, &user, Some(error)),
    };

    let id = state
        .db()?
        .insert_group(user.id, valid.class_level, &valid.subject)?;
    log::info!(
        "user {} created group {} (Year {} {})",
        user.id,
        id,
        valid.class_level,
        valid.subject
    );
    Ok(Redirect::to(routes::HOME_PAGE).into_response())
}

/// Group page: learners with their averages, group average, IB grade and
/// the per-date progress chart.
pub async fn view_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<i64>,
) -> AppResult<Response> {
    let context = {
        let store = state.db()?;
        let group = store.group(user.id, group_id)?;
        let boundaries = store.boundaries(group.id)?;
        let group_grades = store.group_grades(group.id)?;

        let mut learners = Vec::new();
        for learner in store.learners(group.id)? {
            let grades = store.grades(learner.id)?;
            let average = grading::learner_average(&grades);
            let ib_grade = average.and_then(|avg| grading::ib_grade(&boundaries, avg));
            learners.push(json!({
                "learner": learner,
                "average": display_average(average),
                "ib_grade": display_grade(ib_grade),
            }));
        }

        let average = grading::group_average(&group_grades);
        let ib_grade = average.and_then(|avg| grading::ib_grade(&boundaries, avg));
        let plot = chart::group_chart(&group, &group_grades)?;

        json!({
            "page_title": format!("Year {} {}", group.class_level, group.course_subject),
            "username": user.username,
            "group": group,
            "learners": learners,
            "average": display_average(average),
            "ib_grade": display_grade(ib_grade),
            "plot": plot,
        })
    };

    Ok(state.views.page("view_group", &context)?.into_response())
}

pub async fn edit_group_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<i64>,
) -> AppResult<Response> {
    let group = state.db()?.group(user.id, group_id)?;
    render_edit_group(&state, &user, &group, None)
}

fn render_edit_group(
    state: &AppState,
    user: &CurrentUser,
    group: &CourseGroup,
    error: Option<String>,
) -> AppResult<Response> {
    Ok(state
        .views
        .page(
            "edit_group",
            &json!({
                "page_title": "Edit class",
                "username": user.username,
                "group": group,
                "subjects": SUBJECTS,
                "error": error,
            }),
        )?
        .into_response())
}

pub async fn edit_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<i64>,
    Form(form): Form<GroupForm>,
) -> AppResult<Response> {
    let group = state.db()?.group(user.id, group_id)?;
    let valid = match validate_group(&form) {
        Ok(valid) => valid,
        Err(error) => return render_edit_group(&state, &user, &group, Some(error)),
    };

    state
        .db()?
        .update_group(user.id, group.id, valid.class_level, &valid.subject)?;
    Ok(Redirect::to(&routes::fill(routes::VIEW_GROUP, &[&group.id])).into_response())
}

/// Deletes the group with everything that hangs off it.
pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<i64>,
) -> AppResult<Response> {
    state.db()?.delete_group(user.id, group_id)?;
    log::info!("user {} deleted group {}", user.id, group_id);
    Ok(Redirect::to(routes::HOME_PAGE).into_response())
}

pub async fn upload_boundaries_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<i64>,
) -> AppResult<Response> {
    render_upload(&state, &user, group_id, None, None)
}

fn render_upload(
    state: &AppState,
    user: &CurrentUser,
    group_id: i64,
    error: Option<String>,
    success: Option<String>,
) -> AppResult<Response> {
    let (group, boundaries) = {
        let store = state.db()?;
        let group = store.group(user.id, group_id)?;
        let boundaries = store.boundaries(group.id)?;
        (group, boundaries)
    };

    Ok(state
        .views
        .page(
            "upload_boundaries",
            &json!({
                "page_title": "Grade boundaries",
                "username": user.username,
                "group": group,
                "boundaries": boundaries,
                "error": error,
                "success": success,
            }),
        )?
        .into_response())
}

/// Multipart upload of a boundary CSV in the `file` field.
///
/// The file is validated in full before the group's table is replaced.
pub async fn upload_boundaries(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<i64>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    // Ownership first, so strangers get a 404 rather than a form.
    let group = state.db()?.group(user.id, group_id)?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some((filename, bytes.to_vec()));
    }

    let bytes = match upload {
        None => {
            return render_upload(&state, &user, group.id, Some("No file part".into()), None)
        }
        Some((filename, _)) if filename.is_empty() => {
            return render_upload(&state, &user, group.id, Some("No selected file".into()), None)
        }
        Some((_, bytes)) => bytes,
    };

    let table = match parse_boundaries(&bytes, &group.course_subject) {
        Ok(table) => table,
        Err(err) => {
            log::warn!("rejected boundary upload for group {}: {}", group.id, err);
            return render_upload(&state, &user, group.id, Some(err.to_string()), None);
        }
    };

    state
        .db()?
        .replace_boundaries(group.id, &table.subject, &table.rows)?;
    log::info!(
        "group {}: stored {} grade boundaries for '{}'",
        group.id,
        table.rows.len(),
        table.subject
    );

    let success = format!(
        "Grade boundaries for '{}' (Class ID: {}) uploaded successfully.",
        table.subject, group.id
    );
    render_upload(&state, &user, group.id, None, Some(success))
}

/// One row per grade, with each learner's average alongside.
fn gradebook_rows(
    state: &AppState,
    user: &CurrentUser,
    group_id: i64,
) -> AppResult<(CourseGroup, Vec<GradebookRow>)> {
    let store = state.db()?;
    let group = store.group(user.id, group_id)?;

    let mut rows = Vec::new();
    for learner in store.learners(group.id)? {
        let grades = store.grades(learner.id)?;
        let average = grading::learner_average(&grades);
        for grade in grades {
            rows.push(GradebookRow {
                last_name: learner.last_name.clone(),
                first_name: learner.first_name.clone(),
                exam_title: grade.exam_title,
                date: grade.date,
                score: grade.numeric_grade,
                learner_average: average,
            });
        }
    }
    Ok((group, rows))
}

fn attachment(content_type: &str, filename: String, body: Vec<u8>) -> AppResult<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(body))
        .map_err(|e| AppError::Export(e.to_string()))
}

fn export_name(group: &CourseGroup, ext: &str) -> String {
    let subject: String = group
        .course_subject
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("year{}_{}.{}", group.class_level, subject, ext)
}

pub async fn export_group_csv(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<i64>,
) -> AppResult<Response> {
    let (group, rows) = gradebook_rows(&state, &user, group_id)?;
    let csv = downloader::to_csv(&rows)?;
    attachment("text/csv; charset=utf-8", export_name(&group, "csv"), csv.into_bytes())
}

pub async fn export_group_xlsx(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<i64>,
) -> AppResult<Response> {
    let (group, rows) = gradebook_rows(&state, &user, group_id)?;
    let title = format!("Year {} {}", group.class_level, group.course_subject);
    let xlsx = downloader::to_xlsx(&title, &rows)?;
    attachment(
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        export_name(&group, "xlsx"),
        xlsx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_display_rounded_to_one_decimal() {
        assert_eq!(display_average(Some(71.25)), Some("71.3".to_string()));
        assert_eq!(display_average(Some(80.0)), Some("80.0".to_string()));
        assert_eq!(display_average(None), None);
    }

    #[test]
    fn export_names_are_filesystem_safe() {
        let group = CourseGroup {
            id: 1,
            class_level: 12,
            course_subject: "Maths AA HL".to_string(),
            user_id: 1,
        };
        assert_eq!(export_name(&group, "csv"), "year12_Maths_AA_HL.csv");
    }
}
