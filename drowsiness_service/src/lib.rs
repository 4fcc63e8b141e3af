mod detection;
mod frame;
mod inference_service;
mod labels;
mod model_service;
mod ort_service;
mod postprocess;
mod preprocess;
mod routes;
mod server;

#[cfg(test)]
mod fixtures;

pub mod app;
pub mod config;

pub use app::start_app;
