use super::error::ApiError;
use super::payloads::{
    ApiInfo, CreateEnvironmentRequest, CreateEnvironmentResponse, EnvironmentQuery,
    EnvironmentsResponse, FiguresResponse, LogResponse, ProcInitsResponse, RunResponse, RunView,
    RunsResponse,
};
use super::state::ApiState;
use crate::executor::RunSpec;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::net::SocketAddr;

const INDEX_HTML: &str = include_str!("../../assets/index.html");
const REQUIRED_RUN_KEYS: [&str; 2] = ["description", "proc_inits"];

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api", get(api_home))
        .route("/api/proc_inits", get(proc_inits))
        .route("/api/environments", get(list_environments).post(create_environment))
        .route("/api/runs", get(list_runs))
        .route("/api/run/:run_id", get(get_run))
        .route("/api/newrun", post(new_run))
        .route("/api/log/:run_id", get(get_log))
        .route("/api/figures/:run_id", get(list_figures))
        .route("/api/figure/:run_id/:figure_name", get(get_figure))
        .with_state(state)
}

/// Serves until ctrl-c.
pub async fn serve(state: ApiState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn api_home(State(state): State<ApiState>) -> Json<ApiInfo> {
    Json(ApiInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        default_environment: state.workbench().settings().default_environment.clone(),
    })
}

async fn proc_inits(State(state): State<ApiState>) -> Json<ProcInitsResponse> {
    Json(ProcInitsResponse {
        proc_inits: state.workbench().registry().proc_inits(),
    })
}

async fn list_environments(
    State(state): State<ApiState>,
) -> Result<Json<EnvironmentsResponse>, ApiError> {
    let environments = state
        .run_blocking("list_environments", |state| {
            Ok(state.workbench().list_environments()?)
        })
        .await?;
    Ok(Json(EnvironmentsResponse { environments }))
}

async fn create_environment(
    State(state): State<ApiState>,
    payload: Result<Json<CreateEnvironmentRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::invalid_json(&rejection))?;
    let (name, created) = state
        .run_blocking("create_environment", move |state| {
            Ok(state.workbench().create_environment(&request.name)?)
        })
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(CreateEnvironmentResponse { name, created })).into_response())
}

async fn list_runs(
    State(state): State<ApiState>,
    Query(query): Query<EnvironmentQuery>,
) -> Result<Json<RunsResponse>, ApiError> {
    let runs = state
        .run_blocking("list_runs", move |state| {
            Ok(state.workbench().list_runs(query.environment.as_deref())?)
        })
        .await?;
    Ok(Json(RunsResponse {
        run_results: runs.into_iter().map(RunView::from).collect(),
    }))
}

async fn get_run(
    State(state): State<ApiState>,
    Path(run_id): Path<i64>,
    Query(query): Query<EnvironmentQuery>,
) -> Result<Json<RunResponse>, ApiError> {
    let run = state
        .run_blocking("get_run", move |state| {
            Ok(state
                .workbench()
                .get_run(query.environment.as_deref(), run_id)?)
        })
        .await?;
    Ok(Json(RunResponse {
        run_result: run.into(),
    }))
}

async fn new_run(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::invalid_json(&rejection))?;
    let missing = REQUIRED_RUN_KEYS
        .iter()
        .filter(|key| body.get(**key).is_none())
        .copied()
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ApiError::bad_request(
            "missing_keys",
            format!("run request is missing required keys: {}", missing.join(", ")),
        ));
    }
    let mut spec: RunSpec = serde_json::from_value(body)
        .map_err(|err| ApiError::bad_request("invalid_run", err.to_string()))?;
    if state.workbench().settings().coerce_numeric_arguments {
        spec.coerce_numeric_strings();
    }

    let run = state
        .run_blocking("new_run", move |state| Ok(state.queue().submit(spec)?))
        .await?;
    Ok((StatusCode::CREATED, Json(RunView::from(run))).into_response())
}

async fn get_log(
    State(state): State<ApiState>,
    Path(run_id): Path<i64>,
    Query(query): Query<EnvironmentQuery>,
) -> Result<Json<LogResponse>, ApiError> {
    let log = state
        .run_blocking("get_log", move |state| {
            Ok(state
                .workbench()
                .read_log(query.environment.as_deref(), run_id)?)
        })
        .await?;
    Ok(Json(LogResponse { log }))
}

async fn list_figures(
    State(state): State<ApiState>,
    Path(run_id): Path<i64>,
    Query(query): Query<EnvironmentQuery>,
) -> Result<Json<FiguresResponse>, ApiError> {
    let environment = query.environment.clone();
    let names = state
        .run_blocking("list_figures", move |state| {
            Ok(state
                .workbench()
                .list_figures(query.environment.as_deref(), run_id)?)
        })
        .await?;
    let figures = names
        .iter()
        .map(|name| figure_url(run_id, name, environment.as_deref()))
        .collect();
    Ok(Json(FiguresResponse { figures }))
}

async fn get_figure(
    State(state): State<ApiState>,
    Path((run_id, figure_name)): Path<(i64, String)>,
    Query(query): Query<EnvironmentQuery>,
) -> Result<Response, ApiError> {
    let content_type = figure_content_type(&figure_name);
    let bytes = state
        .run_blocking("get_figure", move |state| {
            let path = state
                .workbench()
                .figure_path(query.environment.as_deref(), run_id, &figure_name)?;
            std::fs::read(&path).map_err(|err| {
                ApiError::internal(format!("failed to read figure {}: {err}", path.display()))
            })
        })
        .await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

pub fn figure_url(run_id: i64, figure_name: &str, environment: Option<&str>) -> String {
    let mut url = format!(
        "/api/figure/{run_id}/{}",
        urlencoding::encode(figure_name)
    );
    if let Some(environment) = environment {
        url.push_str("?environment=");
        url.push_str(&urlencoding::encode(environment));
    }
    url
}

fn figure_content_type(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
