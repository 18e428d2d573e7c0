use axum::{
    Extension, Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Local, NaiveDate};
use serde_json::json;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::AppResult;
use crate::forms::{GradeForm, validate_grade};
use crate::login::CurrentUser;
use crate::models::{ASSESSMENTS, Grade, Learner};
use crate::routes::{self, Path};

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub async fn add_grade_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(learner_id): Path<i64>,
) -> AppResult<Response> {
    let learner = state.db()?.learner(user.id, learner_id)?;
    render_add_grade(&state, &user, &learner, None)
}

fn render_add_grade(
    state: &AppState,
    user: &CurrentUser,
    learner: &Learner,
    error: Option<String>,
) -> AppResult<Response> {
    Ok(state
        .views
        .page(
            "add_grade",
            &json!({
                "page_title": "Add grade",
                "username": user.username,
                "learner": learner,
                "assessments": ASSESSMENTS,
                "max_date": today().format("%Y-%m-%d").to_string(),
                "error": error,
            }),
        )?
        .into_response())
}

pub async fn add_grade(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(learner_id): Path<i64>,
    Form(form): Form<GradeForm>,
) -> AppResult<Response> {
    let learner = state.db()?.learner(user.id, learner_id)?;
    let valid = match validate_grade(&form, today()) {
        Ok(valid) => valid,
        Err(error) => return render_add_grade(&state, &user, &learner, Some(error)),
    };

    state.db()?.insert_grade(
        user.id,
        learner.id,
        &valid.exam_title,
        valid.numeric_grade,
        valid.date,
    )?;
    Ok(Redirect::to(&routes::fill(routes::VIEW_LEARNER, &[&learner.id])).into_response())
}

pub async fn edit_grade_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(grade_id): Path<i64>,
) -> AppResult<Response> {
    let (grade, learner) = grade_with_learner(&state, &user, grade_id)?;
    render_edit_grade(&state, &user, &grade, &learner, None)
}

fn grade_with_learner(
    state: &AppState,
    user: &CurrentUser,
    grade_id: i64,
) -> AppResult<(Grade, Learner)> {
    let store = state.db()?;
    let grade = store.grade(user.id, grade_id)?;
    let learner = store.learner(user.id, grade.learner_id)?;
    Ok((grade, learner))
}

fn render_edit_grade(
    state: &AppState,
    user: &CurrentUser,
    grade: &Grade,
    learner: &Learner,
    error: Option<String>,
) -> AppResult<Response> {
    Ok(state
        .views
        .page(
            "edit_grade",
            &json!({
                "page_title": "Edit grade",
                "username": user.username,
                "grade": grade,
                "learner": learner,
                "assessments": ASSESSMENTS,
                "max_date": today().format("%Y-%m-%d").to_string(),
                "error": error,
            }),
        )?
        .into_response())
}

pub async fn edit_grade(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(grade_id): Path<i64>,
    Form(form): Form<GradeForm>,
) -> AppResult<Response> {
    let (grade, learner) = grade_with_learner(&state, &user, grade_id)?;
    let valid = match validate_grade(&form, today()) {
        Ok(valid) => valid,
        Err(error) => return render_edit_grade(&state, &user, &grade, &learner, Some(error)),
    };

    state.db()?.update_grade(
        user.id,
        grade.id,
        &valid.exam_title,
        valid.numeric_grade,
        valid.date,
    )?;
    Ok(Redirect::to(&routes::fill(routes::VIEW_LEARNER, &[&learner.id])).into_response())
}

pub async fn delete_grade(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(grade_id): Path<i64>,
) -> AppResult<Response> {
    let learner_id = {
        let store = state.db()?;
        let grade = store.grade(user.id, grade_id)?;
        store.delete_grade(user.id, grade.id)?;
        grade.learner_id
    };
    Ok(Redirect::to(&routes::fill(routes::VIEW_LEARNER, &[&learner_id])).into_response())
}
