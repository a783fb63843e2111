use crate::config::ApiErrorPolicy;
use crate::error::AppError;
use crate::sheets::RowSource;
use tiny_http::Method;
use tracing::{error, warn};

const INDEX_HTML: &str = include_str!("../../templates/index.html");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Route {
    Data,
    Index,
    NotFound,
}

impl Route {
    pub(super) fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        match path.trim_end_matches('/') {
            "/data" => Route::Data,
            "" | "/index" => Route::Index,
            _ => Route::NotFound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.to_string(),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }).to_string())
    }
}

pub(super) async fn dispatch<F>(
    source: &F,
    policy: ApiErrorPolicy,
    method: &Method,
    url: &str,
) -> Reply
where
    F: RowSource + ?Sized,
{
    let route = Route::from_url(url);
    if route == Route::NotFound {
        return Reply::error(404, "Not found");
    }
    if *method != Method::Get {
        return Reply::error(405, "Method not allowed");
    }

    match route {
        Route::Data => data(source, policy).await,
        Route::Index => Reply::html(INDEX_HTML),
        Route::NotFound => Reply::error(404, "Not found"),
    }
}

async fn data<F>(source: &F, policy: ApiErrorPolicy) -> Reply
where
    F: RowSource + ?Sized,
{
    let result = match policy {
        ApiErrorPolicy::Empty => source.fetch_rows_or_empty().await,
        ApiErrorPolicy::Error => source.fetch_rows().await,
    };

    let rows = match result {
        Ok(rows) => rows,
        Err(e) => return failure_reply(&e),
    };

    match serde_json::to_string(&rows) {
        Ok(body) => Reply::json(200, body),
        Err(e) => failure_reply(&AppError::from(e)),
    }
}

fn failure_reply(e: &AppError) -> Reply {
    match e {
        AppError::Sheets(_) => {
            warn!(error = %e, "Spreadsheet read failed");
            Reply::error(502, &e.to_string())
        }
        _ => {
            error!(error = %e, "Failed to serve rows");
            Reply::error(500, &e.to_string())
        }
    }
}
