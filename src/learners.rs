use axum::{
    Extension, Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use std::sync::Arc;

use crate::app::AppState;
use crate::chart;
use crate::error::AppResult;
use crate::forms::{LearnerForm, validate_learner};
use crate::grading;
use crate::groups::{display_average, display_grade};
use crate::login::CurrentUser;
use crate::models::{CourseGroup, Learner};
use crate::routes::{self, Path};

pub async fn add_learner_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<i64>,
) -> AppResult<Response> {
    let group = state.db()?.group(user.id, group_id)?;
    render_add_learner(&state, &user, &group, None)
}

fn render_add_learner(
    state: &AppState,
    user: &CurrentUser,
    group: &CourseGroup,
    error: Option<String>,
) -> AppResult<Response> {
    Ok(state
        .views
        .page(
            "add_learner",
            &json!({
                "page_title": "Add student",
                "username": user.username,
                "group": group,
                "error": error,
            }),
        )?
        .into_response())
}

pub async fn add_learner(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(group_id): Path<i64>,
    Form(form): Form<LearnerForm>,
) -> AppResult<Response> {
    let group = state.db()?.group(user.id, group_id)?;
    let valid = match validate_learner(&form) {
        Ok(valid) => valid,
        Err(error) => return render_add_learner(&state, &user, &group, Some(error)),
    };

    state
        .db()?
        .insert_learner(user.id, group.id, &valid.first_name, &valid.last_name)?;
    Ok(Redirect::to(&routes::fill(routes::VIEW_GROUP, &[&group.id])).into_response())
}

/// Learner page: grades table, average, IB grade and progress chart.
pub async fn view_learner(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(learner_id): Path<i64>,
) -> AppResult<Response> {
    let (learner, grades, boundaries) = {
        let store = state.db()?;
        let learner = store.learner(user.id, learner_id)?;
        let grades = store.grades(learner.id)?;
        let boundaries = store.boundaries(learner.group_id)?;
        (learner, grades, boundaries)
    };

    let average = grading::learner_average(&grades);
    let ib_grade = average.and_then(|avg| grading::ib_grade(&boundaries, avg));
    let plot = chart::learner_chart(&learner, &grades)?;

    Ok(state
        .views
        .page(
            "view_learner",
            &json!({
                "page_title": learner.full_name(),
                "username": user.username,
                "learner": learner,
                "grades": grades,
                "average": display_average(average),
                "ib_grade": display_grade(ib_grade),
                "plot": plot,
            }),
        )?
        .into_response())
}

pub async fn edit_learner_page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(learner_id): Path<i64>,
) -> AppResult<Response> {
    let learner = state.db()?.learner(user.id, learner_id)?;
    render_edit_learner(&state, &user, &learner, None)
}

fn render_edit_learner(
    state: &AppState,
    user: &CurrentUser,
    learner: &Learner,
    error: Option<String>,
) -> AppResult<Response> {
    Ok(state
        .views
        .page(
            "edit_learner",
            &json!({
                "page_title": "Edit student",
                "username": user.username,
                "learner": learner,
                "error": error,
            }),
        )?
        .into_response())
}

pub async fn edit_learner(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(learner_id): Path<i64>,
    Form(form): Form<LearnerForm>,
) -> AppResult<Response> {
    let learner = state.db()?.learner(user.id, learner_id)?;
    let valid = match validate_learner(&form) {
        Ok(valid) => valid,
        Err(error) => return render_edit_learner(&state, &user, &learner, Some(error)),
    };

    state
        .db()?
        .update_learner(user.id, learner.id, &valid.first_name, &valid.last_name)?;
    Ok(Redirect::to(&routes::fill(routes::VIEW_LEARNER, &[&learner.id])).into_response())
}

/// Deletes the learner and their grades, then returns to the group.
pub async fn delete_learner(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(learner_id): Path<i64>,
) -> AppResult<Response> {
    let group_id = {
        let store = state.db()?;
        let learner = store.learner(user.id, learner_id)?;
        store.delete_learner(user.id, learner.id)?;
        learner.group_id
    };
    log::info!("user {} deleted learner {}", user.id, learner_id);
    Ok(Redirect::to(&routes::fill(routes::VIEW_GROUP, &[&group_id])).into_response())
}
