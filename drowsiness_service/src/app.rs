use crate::{
    config::Config, inference_service::InferenceService, ort_service::OrtModelService,
    server::HttpServer,
};
use std::error::Error;
use tokio::signal;

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let ort_model_service = match OrtModelService::new(&config.model) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to load detection model: {}", e);
            return Err(e);
        }
    };
    let inference_service = InferenceService::new(ort_model_service);

    let server = HttpServer::new(inference_service, &config.server).await?;
    server.run(shutdown_signal()).await?;

    tracing::info!("Drowsiness service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
