#![allow(dead_code)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode, header};
use axum::Router;
use gradebook::app::{AppState, router};
use gradebook::db::Store;
use gradebook::views::Views;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = Store::open(&dir.path().join("instance/grades.db")).expect("open store");
        let views = Views::new().expect("templates");
        let state = Arc::new(AppState::new(store, views, Duration::from_secs(3600)));
        let app = router(state, dir.path());
        TestApp { app, _dir: dir }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.expect("infallible")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, path: &str, form: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.to_string())).unwrap())
            .await
    }

    pub async fn upload(
        &self,
        path: &str,
        filename: &str,
        contents: &str,
        cookie: &str,
    ) -> Response<Body> {
        self.upload_field(path, "file", filename, contents, cookie)
            .await
    }

    /// Multipart POST with a single file part named `field`.
    pub async fn upload_field(
        &self,
        path: &str,
        field: &str,
        filename: &str,
        contents: &str,
        cookie: &str,
    ) -> Response<Body> {
        let boundary = "gradebook-test-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{n}\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
            b = boundary,
            n = field,
            f = filename,
            c = contents
        );
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Registers and logs in, returning the `session=...` cookie pair.
    pub async fn login_as(&self, username: &str) -> String {
        let form = format!(
            "username={u}&password=pw-{u}&confirm_password=pw-{u}",
            u = username
        );
        let registered = self.post_form("/register", &form, None).await;
        assert_eq!(registered.status(), StatusCode::SEE_OTHER);

        let form = format!("username={u}&password=pw-{u}", u = username);
        let response = self.post_form("/login", &form, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("session cookie")
    }
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
