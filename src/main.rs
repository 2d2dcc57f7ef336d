#![allow(non_snake_case)]

mod cli;
mod clients;
mod config;
mod events;
mod models;
mod runtime;
mod service;
mod tasks;

use std::env;
use std::sync::Arc;

use crate::clients::workiq_client::WorkIqClient;
use crate::config::{AppConfig, Settings};

const DEFAULT_WORKIQ_URL: &str = "http://localhost:7331";

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    };
    let settings = Settings::from_config(&config);

    let base_url = config
        .get("WORKIQ_URL")
        .unwrap_or(DEFAULT_WORKIQ_URL.to_string());
    let api_token = config.get("WORKIQ_TOKEN");
    let client = Arc::new(WorkIqClient::new(base_url, api_token));

    cli::cli(settings, client).await;
}
