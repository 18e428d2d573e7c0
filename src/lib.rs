/*!
# Gradebook

A server-rendered gradebook for teachers, built with axum and Handlebars.

## Overview

Teachers register, log in and manage their own classes ("course groups").
Each group holds learners, each learner holds dated assessment grades.
Group and learner pages show averages, an IB grade looked up from the
group's uploaded boundary table, and a Plotly progress chart.

## Architecture

### Frontend Layer
- **Technologies**: HTML (Handlebars templates), Bootstrap, Plotly
- Templates are compiled into the binary; a `url` helper reverses route
  names so templates never hard-code paths.

### Backend Layer
- **Technologies**: Rust, axum, tokio
- **Core Components**:
  - Router and request logging ([`app`])
  - Cookie sessions and the auth middleware ([`login`])
  - Entity handlers ([`groups`], [`learners`], [`grades`])
  - Averages and IB grade lookup ([`grading`])
  - Chart payloads ([`chart`])

### Data Persistence Layer
- SQLite through rusqlite, foreign keys with `ON DELETE CASCADE` ([`db`])
- Boundary tables uploaded as CSV ([`boundaries`])
- CSV / XLSX gradebook export ([`downloader`])

## Routes

- `/login`, `/register`, `/logout` - authentication
- `/` - the user's groups
- `/groups/new`, `/group/{id}`, `/group/{id}/edit`, `/group/{id}/delete`
- `/group/{id}/learners/new`, `/group/{id}/boundaries`, `/group/{id}/export.{csv,xlsx}`
- `/learner/{id}`, `/learner/{id}/edit`, `/learner/{id}/delete`, `/learner/{id}/grades/new`
- `/grade/{id}/edit`, `/grade/{id}/delete`
*/

pub mod app;
pub mod boundaries;
pub mod chart;
pub mod config;
pub mod db;
pub mod downloader;
pub mod error;
pub mod forms;
pub mod grades;
pub mod grading;
pub mod groups;
pub mod learners;
pub mod login;
pub mod models;
pub mod routes;
pub mod views;

pub use error::{AppError, AppResult};
