//! Route table shared by the router and the template `url` helper.
//!
//! Patterns use axum's `:param` syntax; [`fill`] substitutes the
//! parameters in order to build a concrete path.

use axum::extract::FromRequestParts;
use std::fmt::Display;

use crate::error::AppError;

pub const HOME_PAGE: &str = "/";
pub const LOGIN: &str = "/login";
pub const REGISTER: &str = "/register";
pub const LOGOUT: &str = "/logout";

pub const ADD_GROUP: &str = "/groups/new";
pub const VIEW_GROUP: &str = "/group/:group_id";
pub const EDIT_GROUP: &str = "/group/:group_id/edit";
pub const DELETE_GROUP: &str = "/group/:group_id/delete";
pub const ADD_LEARNER: &str = "/group/:group_id/learners/new";
pub const UPLOAD_BOUNDARIES: &str = "/group/:group_id/boundaries";
pub const EXPORT_GROUP_CSV: &str = "/group/:group_id/export.csv";
pub const EXPORT_GROUP_XLSX: &str = "/group/:group_id/export.xlsx";

pub const VIEW_LEARNER: &str = "/learner/:learner_id";
pub const EDIT_LEARNER: &str = "/learner/:learner_id/edit";
pub const DELETE_LEARNER: &str = "/learner/:learner_id/delete";
pub const ADD_LEARNER_GRADE: &str = "/learner/:learner_id/grades/new";

pub const EDIT_LEARNER_GRADE: &str = "/grade/:grade_id/edit";
pub const DELETE_LEARNER_GRADE: &str = "/grade/:grade_id/delete";

/// Route names as written in templates, e.g. `{{url "view_group" group.id}}`.
pub const NAMED: &[(&str, &str)] = &[
    ("home_page", HOME_PAGE),
    ("login", LOGIN),
    ("register", REGISTER),
    ("logout", LOGOUT),
    ("add_group", ADD_GROUP),
    ("view_group", VIEW_GROUP),
    ("edit_group", EDIT_GROUP),
    ("delete_group", DELETE_GROUP),
    ("add_learner", ADD_LEARNER),
    ("upload_boundaries", UPLOAD_BOUNDARIES),
    ("export_group_csv", EXPORT_GROUP_CSV),
    ("export_group_xlsx", EXPORT_GROUP_XLSX),
    ("view_learner", VIEW_LEARNER),
    ("edit_learner", EDIT_LEARNER),
    ("delete_learner", DELETE_LEARNER),
    ("add_learner_grade", ADD_LEARNER_GRADE),
    ("edit_learner_grade", EDIT_LEARNER_GRADE),
    ("delete_learner_grade", DELETE_LEARNER_GRADE),
];

/// Path parameters of a record route. A segment that does not parse, such
/// as `/group/abc`, is answered like a missing record.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

pub fn pattern(name: &str) -> Option<&'static str> {
    NAMED
        .iter()
        .find(|(route, _)| *route == name)
        .map(|(_, pattern)| *pattern)
}

/// Number of `:param` segments in a pattern.
pub fn arity(pattern: &str) -> usize {
    pattern.split('/').filter(|seg| seg.starts_with(':')).count()
}

/// Substitutes `args` into the `:param` segments of `pattern`, in order.
///
/// # Examples
/// ```
/// use gradebook::routes::{fill, EDIT_GROUP};
///
/// assert_eq!(fill(EDIT_GROUP, &[&7]), "/group/7/edit");
/// ```
pub fn fill(pattern: &str, args: &[&dyn Display]) -> String {
    let mut args = args.iter();
    pattern
        .split('/')
        .map(|seg| {
            if seg.starts_with(':') {
                args.next().map(|a| a.to_string()).unwrap_or_default()
            } else {
                seg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_route_is_unique() {
        for (i, (name, _)) in NAMED.iter().enumerate() {
            assert!(
                NAMED[i + 1..].iter().all(|(other, _)| other != name),
                "duplicate route name {}",
                name
            );
        }
    }

    #[test]
    fn fill_handles_static_and_nested_paths() {
        assert_eq!(fill(HOME_PAGE, &[]), "/");
        assert_eq!(fill(ADD_LEARNER, &[&3]), "/group/3/learners/new");
        assert_eq!(fill(DELETE_LEARNER_GRADE, &[&"42"]), "/grade/42/delete");
    }

    #[test]
    fn lookup_and_arity() {
        assert_eq!(pattern("view_learner"), Some(VIEW_LEARNER));
        assert_eq!(pattern("nope"), None);
        assert_eq!(arity(VIEW_LEARNER), 1);
        assert_eq!(arity(LOGOUT), 0);
    }
}
