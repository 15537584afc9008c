//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use hearth_app::runtime::RuntimeHandle;
use hearth_domain::program::Program;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;

/// Build the top-level axum [`Router`] over a running program.
///
/// Mounts the API under `/api` and includes a [`TraceLayer`] that logs each
/// HTTP request/response at the `DEBUG` level using the `tracing` ecosystem.
pub fn build<P>(handle: RuntimeHandle<P>) -> Router
where
    P: Program,
    P::Model: Serialize,
    P::Msg: DeserializeOwned,
    P::Device: Serialize,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes::<P>())
        .layer(TraceLayer::new_for_http())
        .with_state(handle)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use hearth_app::ports::{DeviceHandler, DeviceRegistry, MqttBroker};
    use hearth_app::runtime::{Runtime, RuntimeHandle};
    use hearth_domain::command::Cmd;
    use hearth_domain::error::HearthError;
    use hearth_domain::program::Program;
    use hearth_domain::sub::Sub;
    use hearth_domain::tree::{Container, DeviceSpec, Node};
    use http_body_util::BodyExt;
    use serde::{Deserialize, Serialize};
    use tower::ServiceExt;

    use super::build;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Lamp {
        on: bool,
    }

    impl DeviceSpec for Lamp {
        fn kind(&self) -> &'static str {
            "lamp"
        }
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize)]
    struct Model {
        count: u32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(tag = "type", content = "value", rename_all = "snake_case")]
    enum Msg {
        Increment,
        Set(u32),
    }

    struct Fixture;

    impl Program for Fixture {
        type Model = Model;
        type Msg = Msg;
        type Device = Lamp;

        fn update(model: &Model, msg: Msg) -> (Model, Cmd<Msg>) {
            let next = match msg {
                Msg::Increment => Model {
                    count: model.count + 1,
                },
                Msg::Set(count) => Model { count },
            };
            (next, Cmd::None)
        }

        fn subscriptions(_model: &Model) -> Sub<Msg> {
            Sub::None
        }

        fn house(model: &Model) -> Container<Lamp> {
            Container::new("home").child(Node::device(
                "desk",
                Lamp {
                    on: model.count > 0,
                },
            ))
        }
    }

    struct NullBroker;

    #[async_trait]
    impl MqttBroker for NullBroker {
        async fn subscribe(&self, _topic: &str) -> Result<(), HearthError> {
            Ok(())
        }

        async fn unsubscribe(&self, _topic: &str) -> Result<(), HearthError> {
            Ok(())
        }

        async fn publish(&self, _topic: &str, _payload: &[u8]) -> Result<(), HearthError> {
            Ok(())
        }
    }

    struct Quiet;

    #[async_trait]
    impl DeviceHandler<Fixture> for Quiet {}

    async fn start_fixture() -> RuntimeHandle<Fixture> {
        let registry = DeviceRegistry::new().with("lamp", Quiet);
        Runtime::<Fixture>::new(Model::default(), Arc::new(NullBroker), registry)
            .start(None)
            .await
            .unwrap()
    }

    async fn body_string(body: Body) -> String {
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn should_serve_health_check() {
        let app = build(start_fixture().await);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response.into_body()).await, "OK");
    }

    #[tokio::test]
    async fn should_accept_valid_message() {
        let handle = start_fixture().await;
        let mut events = handle.subscribe_model_changed();
        let app = build(handle.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/msg")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"type":"set","value":5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(events.recv().await.unwrap(), Model { count: 5 });
    }

    #[tokio::test]
    async fn should_reject_undecodable_message() {
        let app = build(start_fixture().await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/msg")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"type":"explode"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response.into_body()).await;
        assert!(body.contains("error"));
    }

    #[tokio::test]
    async fn should_serve_current_model() {
        let handle = start_fixture().await;
        let mut events = handle.subscribe_model_changed();
        handle.dispatch(Msg::Set(3));
        events.recv().await.unwrap();
        let app = build(handle);

        let response = app
            .oneshot(Request::builder().uri("/api/model").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response.into_body()).await, r#"{"count":3}"#);
    }

    #[tokio::test]
    async fn should_serve_applied_house_tree() {
        let app = build(start_fixture().await);

        let response = app
            .oneshot(Request::builder().uri("/api/house").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response.into_body()).await;
        assert_eq!(
            body,
            r#"{"key":"home","children":[{"type":"device","key":"desk","spec":{"on":false}}]}"#
        );
    }

    #[tokio::test]
    async fn should_open_model_event_stream() {
        let app = build(start_fixture().await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/model/stream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        assert!(content_type.starts_with("text/event-stream"));
    }
}
