use crate::{
    config::ServerConfig, inference_service::InferenceService, model_service::ModelService,
    routes::api_routes,
};
use anyhow::Context;
use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use std::{future::Future, net::SocketAddr};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub struct SharedState<M: ModelService> {
    pub inference_service: InferenceService<M>,
}

impl<M: ModelService> Clone for SharedState<M> {
    fn clone(&self) -> Self {
        Self {
            inference_service: self.inference_service.clone(),
        }
    }
}

fn cors_layer(config: &ServerConfig) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors_allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = config
            .cors_allowed_origins
            .iter()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("invalid CORS origin: {}", origin))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

pub fn build_router<M: ModelService>(
    inference_service: InferenceService<M>,
    config: &ServerConfig,
) -> anyhow::Result<Router> {
    let app_state = SharedState { inference_service };

    let router = Router::new()
        .merge(api_routes())
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors_layer(config)?)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<M: ModelService>(
        inference_service: InferenceService<M>,
        config: &ServerConfig,
    ) -> anyhow::Result<Self> {
        let router = build_router(inference_service, config)?;

        let addr = config.get_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        Ok(Self { router, listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Drowsiness service listening on {}", self.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{detection::Detection, fixtures::png_data_url, model_service::ModelError};
    use image::RgbImage;

    struct EmptyModelService {}

    impl ModelService for EmptyModelService {
        fn predict(&self, _image: &RgbImage) -> Result<Vec<Detection>, ModelError> {
            Ok(vec![])
        }
    }

    fn server_config(cors_allowed_origins: Vec<String>) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            body_limit_bytes: 1024 * 1024,
            cors_allowed_origins,
        }
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        let result = cors_layer(&server_config(vec!["bad\norigin".to_string()]));

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() -> anyhow::Result<()> {
        let server = HttpServer::new(
            InferenceService::new(EmptyModelService {}),
            &server_config(vec![]),
        )
        .await?;
        let addr = server.local_addr()?;
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(server.run(async move {
            shutdown_rx.await.ok();
        }));

        let body = serde_json::json!({ "frame": png_data_url(4, 4) }).to_string();
        let request = format!(
            "POST /process_frame HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            addr,
            body.len(),
            body
        );

        let mut stream = tokio::net::TcpStream::connect(addr).await?;
        tokio::io::AsyncWriteExt::write_all(&mut stream, request.as_bytes()).await?;
        let mut response = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut response).await?;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with(r#"{"status":"Alert","advice":"Keep going!"}"#));

        shutdown_tx.send(()).ok();
        handle.await??;

        Ok(())
    }
}
