//! HTTP surface of the service.

mod error;
mod handlers;

pub use error::ApiError;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerSettings;
use crate::database::VectorStore;
use crate::payslip::{
    AskService, CompareService, PayslipExtractor, PayslipIndexer, SectionService,
    SimilarityService,
};
use crate::prompts::PromptConfig;
use crate::providers::CompletionProvider;

#[derive(Clone)]
pub struct AppState {
    extractor: Arc<PayslipExtractor>,
    ask: Arc<AskService>,
    compare: Arc<CompareService>,
    sections: Arc<SectionService>,
    similarity: Arc<SimilarityService>,
}

impl AppState {
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        store: Arc<dyn VectorStore>,
        prompts: Arc<PromptConfig>,
    ) -> Self {
        let extractor = PayslipExtractor::new(
            llm.clone(),
            PayslipIndexer::new(store.clone()),
            prompts.clone(),
        );

        Self {
            ask: Arc::new(AskService::new(
                llm.clone(),
                store.clone(),
                extractor.clone(),
                prompts.clone(),
            )),
            compare: Arc::new(CompareService::new(llm, extractor.clone(), prompts)),
            sections: Arc::new(SectionService::new(store.clone())),
            similarity: Arc::new(SimilarityService::new(store)),
            extractor: Arc::new(extractor),
        }
    }
}

/// Create and configure the API router
pub fn create_router(state: AppState, settings: &ServerSettings) -> Router {
    // Fully permissive CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/payslip/extract", post(handlers::extract_payslip))
        .route("/api/payslip/ask", post(handlers::ask_payslip))
        .route("/api/payslip/chat", post(handlers::compare_payslips))
        .route("/api/payslip/section/:doc_id", get(handlers::get_section))
        .route("/api/payslip/similar", get(handlers::similar_payslips))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        // one semaphore shared by every route
        .layer(GlobalConcurrencyLimitLayer::new(
            settings.max_concurrent_requests,
        ))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryStore;
    use crate::payslip::fixtures::{png_upload, reply_for, sample_payslip};
    use crate::providers::mock::MockProvider;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    const BOUNDARY: &str = "payslip-test-boundary";

    enum Part<'a> {
        File(&'a str, &'a str, &'a str, &'a [u8]),
        Text(&'a str, &'a str),
    }

    fn settings() -> ServerSettings {
        ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
            max_upload_bytes: 1024 * 1024,
            max_concurrent_requests: 4,
        }
    }

    fn app(mock: &MockProvider) -> Router {
        app_with(Arc::new(mock.clone()), &settings())
    }

    fn app_with(llm: Arc<dyn CompletionProvider>, settings: &ServerSettings) -> Router {
        let store = Arc::new(InMemoryStore::new(Arc::new(MockProvider::uniform())));
        let state = AppState::new(llm, store, Arc::new(PromptConfig::default()));
        create_router(state, settings)
    }

    /// Signals when a call arrives, then never answers.
    struct StalledModel {
        entered: Arc<Notify>,
    }

    #[async_trait]
    impl CompletionProvider for StalledModel {
        async fn complete(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
            self.entered.notify_one();
            std::future::pending().await
        }

        async fn complete_with_image(
            &self,
            system: &str,
            prompt: &str,
            _png: &[u8],
        ) -> anyhow::Result<String> {
            self.complete(system, prompt).await
        }

        async fn get_model_info(&self) -> anyhow::Result<String> {
            Ok("stalled".to_string())
        }
    }

    fn multipart(uri: &str, parts: &[Part]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File(name, file_name, content_type, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            name, file_name, content_type
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                            name, value
                        )
                        .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(&MockProvider::new());
        let (status, body) = send(&app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_extract_then_fetch_section() {
        let mock = MockProvider::new().with_replies([reply_for(&sample_payslip())]);
        let app = app(&mock);
        let png = png_upload("march.png");

        let (status, body) = send(
            &app,
            multipart(
                "/api/payslip/extract",
                &[Part::File("file", "march.png", "image/png", &png.bytes)],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["personal"]["nationalId"], "85.07.30-033.61");
        assert!(mock.calls()[0].with_image);

        let (status, similar) = send(
            &app,
            get_request("/api/payslip/similar?nationalId=85.07.30-033.61"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let doc_id = similar[0]["documentIds"][0].as_str().unwrap().to_string();

        let (status, section) =
            send(&app, get_request(&format!("/api/payslip/section/{}", doc_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(section["docId"], doc_id.as_str());
        assert_eq!(section["source"], "march.png");
    }

    #[tokio::test]
    async fn test_ask_answers_with_sources() {
        let mock = MockProvider::new()
            .with_replies([reply_for(&sample_payslip()), "It is 2410.12 EUR.".to_string()]);
        let app = app(&mock);
        let png = png_upload("march.png");

        let (status, body) = send(
            &app,
            multipart(
                "/api/payslip/ask",
                &[
                    Part::Text("question", "What is my net pay?"),
                    Part::File("file", "march.png", "image/png", &png.bytes),
                ],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "It is 2410.12 EUR.");
        assert_eq!(body["sources"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_missing_part_names_it() {
        let app = app(&MockProvider::new());
        let png = png_upload("march.png");

        let (status, body) = send(
            &app,
            multipart(
                "/api/payslip/ask",
                &[Part::File("file", "march.png", "image/png", &png.bytes)],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("'question'"));

        let (status, body) = send(
            &app,
            multipart(
                "/api/payslip/chat",
                &[
                    Part::File("previous", "march.png", "image/png", &png.bytes),
                    Part::Text("question", "What changed?"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("'current'"));
    }

    #[tokio::test]
    async fn test_unsupported_upload() {
        let mock = MockProvider::new();
        let app = app(&mock);

        let (status, body) = send(
            &app,
            multipart(
                "/api/payslip/extract",
                &[Part::File("file", "notes.txt", "text/plain", b"hello")],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Unsupported file type"));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_section_and_similar_errors() {
        let app = app(&MockProvider::new());

        let (status, body) = send(&app, get_request("/api/payslip/section/payslip:none")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("payslip:none"));

        let (status, _) = send(&app, get_request("/api/payslip/similar")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            get_request("/api/payslip/similar?employeeName=Jan%20Peeters&limit=0"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            get_request("/api/payslip/similar?employeeName=Jan%20Peeters&limit=18446744073709551615"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "limit must be between 1 and 100");

        let (status, body) = send(
            &app,
            get_request("/api/payslip/similar?employeeName=Nobody"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn test_concurrency_limit_spans_all_routes() {
        let entered = Arc::new(Notify::new());
        let limited = ServerSettings {
            max_concurrent_requests: 1,
            ..settings()
        };
        let app = app_with(
            Arc::new(StalledModel {
                entered: entered.clone(),
            }),
            &limited,
        );
        let png = png_upload("march.png");

        let stalled = tokio::spawn(app.clone().oneshot(multipart(
            "/api/payslip/extract",
            &[Part::File("file", "march.png", "image/png", &png.bytes)],
        )));
        entered.notified().await;

        for uri in ["/health", "/api/payslip/similar?employeeName=x"] {
            let waited =
                tokio::time::timeout(Duration::from_millis(200), app.clone().oneshot(get_request(uri)))
                    .await;
            assert!(waited.is_err(), "{} was served while the only slot was taken", uri);
        }

        stalled.abort();
        let _ = stalled.await;

        let (status, _) = send(&app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
