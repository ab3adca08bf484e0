pub mod error;
pub mod payloads;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use payloads::{RunView, StepView};
pub use routes::{figure_url, router, serve};
pub use state::ApiState;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::procedures::{ProcedureDef, ProcedureRegistry};
    use crate::runtime::{WorkerEvent, WorkerHandle};
    use crate::workbench::Workbench;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    fn registry() -> ProcedureRegistry {
        let mut registry = ProcedureRegistry::new();
        registry
            .register(
                ProcedureDef::new("foo", |_ctx, args| Ok(json!(args.i64("a")? + args.i64("b")?)))
                    .param("a")
                    .param_with_default("b", 4),
            )
            .expect("register foo");
        registry
            .register(
                ProcedureDef::new("plot", |ctx, _args| {
                    ctx.save_figure("curve", b"\x89PNG fake")?;
                    Ok(Value::Null)
                }),
            )
            .expect("register plot");
        registry
    }

    fn test_state() -> (TempDir, ApiState, WorkerHandle) {
        let temp = tempdir().expect("temp dir");
        let workbench = Workbench::open(Settings::with_state_root(temp.path()), registry())
            .expect("open workbench");
        let (queue, handle) = workbench.start_queue().expect("start queue");
        (temp, ApiState::new(workbench, queue), handle)
    }

    async fn send(state: &ApiState, request: Request<Body>) -> Response {
        router(state.clone())
            .oneshot(request)
            .await
            .unwrap_or_else(|err| panic!("router request failed: {err}"))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .expect("build request")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request")
    }

    async fn response_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read response body");
        serde_json::from_slice(&bytes).expect("response body is json")
    }

    fn wait_for_run(handle: &WorkerHandle, run_id: i64) {
        loop {
            let event = handle
                .events()
                .recv_timeout(Duration::from_secs(10))
                .expect("worker event");
            if let WorkerEvent::RunFinished { run_id: id, .. } = event {
                if id == run_id {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn catalog_lists_procedures_with_defaults() {
        let (_temp, state, _handle) = test_state();
        let response = send(&state, get("/api/proc_inits")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        let foo = body["proc_inits"]
            .as_array()
            .expect("proc_inits array")
            .iter()
            .find(|init| init["proc_name"] == "foo")
            .expect("foo listed")
            .clone();
        assert_eq!(
            foo["arguments"],
            json!([
                {"name": "a", "value": null, "from_cache": false},
                {"name": "b", "value": 4, "from_cache": false}
            ])
        );
        assert_eq!(foo["run_order"], Value::Null);
    }

    #[tokio::test]
    async fn new_run_is_queued_then_executed_with_coerced_arguments() {
        let (_temp, state, handle) = test_state();
        let response = send(
            &state,
            post_json(
                "/api/newrun",
                json!({
                    "description": "from the form",
                    "proc_inits": [{
                        "proc_name": "foo",
                        "run_order": 7,
                        "arguments": [{"name": "a", "value": "1", "from_cache": false}]
                    }]
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = response_json(response).await;
        assert_eq!(created["status"], "pending");
        assert_eq!(created["environment_name"], "default");
        let run_id = created["id"].as_i64().expect("run id");

        wait_for_run(&handle, run_id);
        let response = send(&state, get(&format!("/api/run/{run_id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        let run = &body["run_result"];
        assert_eq!(run["status"], "complete");
        assert_eq!(run["steps"][0]["run_order"], 0);
        assert_eq!(run["steps"][0]["result"], "5");
        assert_eq!(run["steps"][0]["result_value"], json!({"kind": "value", "value": 5}));
        assert_eq!(run["steps"][0]["arguments_str"], "a:1");

        let response = send(&state, get(&format!("/api/log/{run_id}?environment=default"))).await;
        let body = response_json(response).await;
        assert!(body["log"].as_str().expect("log text").contains("complete"));
    }

    #[tokio::test]
    async fn new_run_rejects_missing_keys_and_bad_json() {
        let (_temp, state, _handle) = test_state();
        let response = send(
            &state,
            post_json("/api/newrun", json!({"description": "no steps"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response_json(response).await;
        assert_eq!(body["error"]["code"], "missing_keys");
        assert!(body["error"]["message"]
            .as_str()
            .expect("message")
            .contains("proc_inits"));

        let request = Request::builder()
            .uri("/api/newrun")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("build request");
        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"]["code"], "invalid_json");

        let response = send(
            &state,
            post_json(
                "/api/newrun",
                json!({"description": "bad", "proc_inits": [{"proc_name": "nope"}]}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"]["code"], "validation_error");

        let response = send(&state, get("/api/runs")).await;
        let body = response_json(response).await;
        assert_eq!(body["run_results"], json!([]));
    }

    #[tokio::test]
    async fn unknown_runs_and_environments_are_not_found() {
        let (_temp, state, _handle) = test_state();
        let response = send(&state, get("/api/run/42")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response_json(response).await["error"]["code"], "not_found");

        let response = send(&state, get("/api/runs?environment=elsewhere")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&state, get("/api/runs?environment=..")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn environments_can_be_created_idempotently() {
        let (_temp, state, _handle) = test_state();
        let response = send(&state, post_json("/api/environments", json!({"name": "exp1"}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response_json(response).await["created"], true);

        let response = send(&state, post_json("/api/environments", json!({"name": "exp1"}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["created"], false);

        let response = send(&state, get("/api/environments")).await;
        assert_eq!(
            response_json(response).await["environments"],
            json!(["default", "exp1"])
        );
    }

    #[tokio::test]
    async fn figures_are_listed_as_urls_and_served_with_content_type() {
        let (_temp, state, handle) = test_state();
        let response = send(
            &state,
            post_json(
                "/api/newrun",
                json!({"description": "plot", "proc_inits": [{"proc_name": "plot"}]}),
            ),
        )
        .await;
        let run_id = response_json(response).await["id"]
            .as_i64()
            .expect("run id");
        wait_for_run(&handle, run_id);

        let response = send(&state, get(&format!("/api/figures/{run_id}"))).await;
        let body = response_json(response).await;
        let url = body["figures"][0].as_str().expect("figure url").to_string();
        assert_eq!(url, format!("/api/figure/{run_id}/figure_plot_curve.png"));

        let response = send(&state, get(&url)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().expect("header"),
            "image/png"
        );
        let bytes = to_bytes(response.into_body(), 1024).await.expect("body");
        assert_eq!(&bytes[..], b"\x89PNG fake");

        let response = send(&state, get(&format!("/api/figure/{run_id}/notes.txt"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn index_page_is_served() {
        let (_temp, state, _handle) = test_state();
        let response = send(&state, get("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.expect("body");
        assert!(String::from_utf8_lossy(&bytes).contains("<title>steplog</title>"));
    }

    #[test]
    fn figure_urls_encode_names_and_environment() {
        assert_eq!(
            figure_url(3, "figure_a_b c.png", Some("exp 1")),
            "/api/figure/3/figure_a_b%20c.png?environment=exp%201"
        );
    }
}
