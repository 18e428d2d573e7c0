//! Averages and IB grade lookup.
//!
//! Every function here is total: an empty grade list yields `None` rather
//! than a division by zero, and a score outside every band yields no grade.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::models::{Grade, GradeBoundary};

/// Arithmetic mean of a list of scores.
///
/// # Examples
/// ```
/// use gradebook::grading::mean;
///
/// assert_eq!(mean(&[70.0, 80.0]), Some(75.0));
/// assert_eq!(mean(&[]), None);
/// ```
pub fn mean(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Mean score per assessment date, earliest date first.
pub fn daily_means(grades: &[Grade]) -> Vec<(NaiveDate, f64)> {
    let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for grade in grades {
        by_date.entry(grade.date).or_default().push(grade.numeric_grade);
    }

    by_date
        .into_iter()
        .filter_map(|(date, scores)| mean(&scores).map(|avg| (date, avg)))
        .collect()
}

/// Average of a learner's grades.
pub fn learner_average(grades: &[Grade]) -> Option<f64> {
    let scores: Vec<f64> = grades.iter().map(|g| g.numeric_grade).collect();
    mean(&scores)
}

/// Average of a whole group.
///
/// Each assessment date counts once regardless of how many learners sat it,
/// so the result is the mean of [`daily_means`].
pub fn group_average(grades: &[Grade]) -> Option<f64> {
    let daily: Vec<f64> = daily_means(grades).into_iter().map(|(_, avg)| avg).collect();
    mean(&daily)
}

/// IB grade band containing `score`.
///
/// Bands are tried from the lowest `lower_bound` upwards and both bounds are
/// inclusive, so a score on the edge shared by two bands gets the lower one.
pub fn ib_grade(boundaries: &[GradeBoundary], score: f64) -> Option<i64> {
    let mut bands: Vec<&GradeBoundary> = boundaries.iter().collect();
    bands.sort_by(|a, b| a.lower_bound.total_cmp(&b.lower_bound));

    bands
        .into_iter()
        .find(|band| band.lower_bound <= score && score <= band.upper_bound)
        .map(|band| band.grade)
}

/// Rounds for display, one decimal place.
pub fn round_1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
