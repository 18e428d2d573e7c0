use axum::response::Html;
use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderError, TemplateError,
    handlebars_helper,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::AppResult;
use crate::routes;

/// Page templates compiled into the binary, keyed by registry name.
const TEMPLATES: &[(&str, &str)] = &[
    ("layout", include_str!("../templates/layout.hbs")),
    ("login", include_str!("../templates/login.hbs")),
    ("register", include_str!("../templates/register.hbs")),
    ("index", include_str!("../templates/index.hbs")),
    ("add_group", include_str!("../templates/add_group.hbs")),
    ("edit_group", include_str!("../templates/edit_group.hbs")),
    ("view_group", include_str!("../templates/view_group.hbs")),
    ("add_learner", include_str!("../templates/add_learner.hbs")),
    ("edit_learner", include_str!("../templates/edit_learner.hbs")),
    ("view_learner", include_str!("../templates/view_learner.hbs")),
    ("add_grade", include_str!("../templates/add_grade.hbs")),
    ("edit_grade", include_str!("../templates/edit_grade.hbs")),
    (
        "upload_boundaries",
        include_str!("../templates/upload_boundaries.hbs"),
    ),
];

handlebars_helper!(one_decimal: |x: f64| format!("{:.1}", x));

/// Template registry with the `url` and `one_decimal` helpers installed.
pub struct Views {
    registry: Handlebars<'static>,
}

impl Views {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_helper("url", Box::new(url_helper));
        registry.register_helper("one_decimal", Box::new(one_decimal));

        for (name, source) in TEMPLATES {
            registry.register_template_string(name, *source)?;
        }

        Ok(Views { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> AppResult<String> {
        Ok(self.registry.render(name, data)?)
    }

    pub fn page<T: Serialize>(&self, name: &str, data: &T) -> AppResult<Html<String>> {
        self.render(name, data).map(Html)
    }
}

/// `{{url "route_name" arg...}}` reverses a named route into a path.
fn url_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let name = h
        .param(0)
        .and_then(|p| p.value().as_str())
        .ok_or_else(|| RenderError::new("url: first parameter must be a route name"))?;
    let pattern = routes::pattern(name)
        .ok_or_else(|| RenderError::new(format!("url: unknown route '{}'", name)))?;

    let args = h
        .params()
        .iter()
        .skip(1)
        .map(|p| match p.value() {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(RenderError::new(format!(
                "url: '{}' got non-scalar argument {}",
                name, other
            ))),
        })
        .collect::<Result<Vec<String>, RenderError>>()?;

    if args.len() != routes::arity(pattern) {
        return Err(RenderError::new(format!(
            "url: '{}' takes {} argument(s), got {}",
            name,
            routes::arity(pattern),
            args.len()
        )));
    }

    let display: Vec<&dyn std::fmt::Display> =
        args.iter().map(|a| a as &dyn std::fmt::Display).collect();
    out.write(&routes::fill(pattern, &display))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn views() -> Views {
        Views::new().expect("templates compile")
    }

    #[test]
    fn url_helper_reverses_named_routes() {
        let mut hb = Handlebars::new();
        hb.register_helper("url", Box::new(url_helper));
        hb.register_template_string("t", r#"{{url "edit_group" group.id}}|{{url "home_page"}}"#)
            .unwrap();
        let out = hb.render("t", &json!({"group": {"id": 5}})).unwrap();
        assert_eq!(out, "/group/5/edit|/");
    }

    #[test]
    fn url_helper_rejects_wrong_arity_and_unknown_names() {
        let mut hb = Handlebars::new();
        hb.register_helper("url", Box::new(url_helper));
        hb.register_template_string("missing", r#"{{url "view_group"}}"#)
            .unwrap();
        hb.register_template_string("unknown", r#"{{url "nowhere"}}"#)
            .unwrap();
        assert!(hb.render("missing", &json!({})).is_err());
        assert!(hb.render("unknown", &json!({})).is_err());
    }

    #[test]
    fn index_lists_groups_with_links() {
        let html = views()
            .render(
                "index",
                &json!({
                    "username": "sam",
                    "groups": [{"id": 3, "class_level": 12, "course_subject": "Maths AA HL"}]
                }),
            )
            .unwrap();
        assert!(html.contains("/group/3"));
        assert!(html.contains("Maths AA HL"));
        assert!(html.contains("bootstrap"));
    }

    #[test]
    fn view_learner_embeds_chart_and_average() {
        let html = views()
            .render(
                "view_learner",
                &json!({
                    "username": "sam",
                    "learner": {"id": 1, "first_name": "Ada", "last_name": "Byron", "group_id": 2},
                    "grades": [
                        {"id": 9, "date": "2024-01-01", "exam_title": "Paper 1", "numeric_grade": 71.26}
                    ],
                    "average": "71.3",
                    "ib_grade": "6",
                    "plot": {"data": "[{\"x\":[]}]", "layout": "{}"}
                }),
            )
            .unwrap();
        assert!(html.contains("<td>71.3</td>"));
        assert!(html.contains("/grade/9/edit"));
        assert!(html.contains("Plotly.newPlot"));
        assert!(html.contains("[{\"x\":[]}]"));
    }

    #[test]
    fn learner_names_are_html_escaped() {
        let html = views()
            .render(
                "view_learner",
                &json!({
                    "learner": {"id": 1, "first_name": "<b>x</b>", "last_name": "Y", "group_id": 2},
                    "grades": []
                }),
            )
            .unwrap();
        assert!(!html.contains("<b>x</b>"));
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
    }
}
