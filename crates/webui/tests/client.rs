use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use webui::{
    CommonParams, OptionsUpdate, Txt2ImgPayload, WebUiApi, WebUiClient, WebUiError,
};

type Recorded = Arc<Mutex<Vec<Value>>>;

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn payload() -> Txt2ImgPayload {
    Txt2ImgPayload {
        common: CommonParams {
            prompt: "cat".into(),
            negative_prompt: "lowres".into(),
            width: 512,
            height: 512,
            steps: 20,
            cfg_scale: 7.5,
            sampler_index: "Euler a".into(),
            n_iter: 1,
            batch_size: 1,
            seed: -1,
            override_settings: Default::default(),
        },
        deterministic: None,
    }
}

#[tokio::test]
async fn test_options_roundtrip() {
    let recorded: Recorded = Arc::default();
    let router = Router::new()
        .route(
            "/sdapi/v1/options",
            get(|| async {
                Json(json!({
                    "sd_model_checkpoint": "foo-v1.safetensors [abc123]",
                    "sd_vae": "Automatic",
                    "CLIP_stop_at_last_layers": 2,
                    "samples_format": "png"
                }))
            })
            .post(|State(rec): State<Recorded>, Json(body): Json<Value>| async move {
                rec.lock().unwrap().push(body);
                Json(json!(null))
            }),
        )
        .with_state(recorded.clone());
    let client = WebUiClient::new(spawn_stub(router).await);

    let options = client.get_options().await.unwrap();
    assert_eq!(
        options.sd_model_checkpoint.as_deref(),
        Some("foo-v1.safetensors [abc123]")
    );
    assert_eq!(options.clip_stop_at_last_layers, Some(2));
    assert_eq!(options.extra["samples_format"], json!("png"));

    client.set_options(&OptionsUpdate::vae("kl-f8.vae")).await.unwrap();
    assert_eq!(recorded.lock().unwrap()[0], json!({"sd_vae": "kl-f8.vae"}));
}

#[tokio::test]
async fn test_txt2img_success_uses_configured_endpoint() {
    let recorded: Recorded = Arc::default();
    let router = Router::new()
        .route(
            "/custom/txt2img",
            post(|State(rec): State<Recorded>, Json(body): Json<Value>| async move {
                rec.lock().unwrap().push(body);
                Json(json!({"images": ["aGVsbG8="], "parameters": {}, "info": "{}"}))
            }),
        )
        .with_state(recorded.clone());
    let client = WebUiClient::new(spawn_stub(router).await).with_txt2img_endpoint("/custom/txt2img");

    let response = client.txt2img(&payload()).await.unwrap();
    assert_eq!(response.images, vec!["aGVsbG8=".to_string()]);

    let body = recorded.lock().unwrap()[0].clone();
    assert_eq!(body["prompt"], json!("cat"));
    assert_eq!(body["sampler_index"], json!("Euler a"));
    assert_eq!(body["seed"], json!(-1));
    assert!(body.get("enable_hr").is_none());
}

#[tokio::test]
async fn test_txt2img_rejected_carries_status_and_body() {
    let router = Router::new().route(
        "/sdapi/v1/txt2img",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "CUDA out of memory") }),
    );
    let client = WebUiClient::new(spawn_stub(router).await);

    match client.txt2img(&payload()).await {
        Err(WebUiError::Rejected { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "CUDA out of memory");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_txt2img_empty_object_is_malformed() {
    let router = Router::new().route("/sdapi/v1/txt2img", post(|| async { Json(json!({})) }));
    let client = WebUiClient::new(spawn_stub(router).await);

    assert!(matches!(
        client.txt2img(&payload()).await,
        Err(WebUiError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn test_introspection_endpoints() {
    let router = Router::new()
        .route(
            "/sdapi/v1/sd-models",
            get(|| async {
                Json(json!([{"title": "a [1234]", "model_name": "a", "filename": "/m/a.ckpt", "hash": "12345678ab"}]))
            }),
        )
        .route(
            "/controlnet/model_list",
            get(|| async { Json(json!({"model_list": ["canny", "depth"]})) }),
        );
    let client = WebUiClient::new(spawn_stub(router).await);

    let models = client.sd_models().await.unwrap();
    assert_eq!(models[0].model_name, "a");
    assert_eq!(models[0].hash.as_deref(), Some("12345678ab"));
    assert_eq!(client.controlnet_models().await.unwrap(), vec!["canny", "depth"]);

    assert!(matches!(
        client.sd_vaes().await,
        Err(WebUiError::Rejected { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_request_error() {
    let client = WebUiClient::new("http://127.0.0.1:1");
    assert!(matches!(client.get_options().await, Err(WebUiError::Request(_))));
}
