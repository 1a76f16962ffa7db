//! Drives simulated requests through the greeting pipeline.
//!
//! Usage: `hello_pipeline [config.json]`. Without a file the pipeline is
//! `[greet, greet, echo]`.

use anyhow::Context;
use futures::future::join_all;
use scopechain::context::RequestContext;
use scopechain::events::LoggingEventSink;
use scopechain::observability::init_tracing;
use scopechain::pipeline::{Pipeline, PipelineConfig};
use scopechain::scope::RootContainer;
use scopechain::stages::register_greeting_stages;
use std::sync::Arc;
use tracing::info;

const REQUESTS: usize = 3;

fn default_config() -> PipelineConfig {
    PipelineConfig::new("hello")
        .with_stage("greet")
        .with_stage("greet")
        .with_stage("echo")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("loading pipeline config from {path}"))?,
        None => default_config(),
    };
    init_tracing(&config.logging)?;

    let mut builder = RootContainer::builder().with_event_sink(Arc::new(LoggingEventSink::default()));
    register_greeting_stages(&mut builder)?;
    let container = Arc::new(builder.build());

    let pipeline = Pipeline::from_config(&config, container.clone())?;
    info!(pipeline = pipeline.name(), stages = pipeline.stages().len(), "Pipeline ready");

    let requests: Vec<_> = (0..REQUESTS)
        .map(|i| Arc::new(RequestContext::new("GET", format!("/hello/{i}"))))
        .collect();
    let results = join_all(requests.iter().map(|request| pipeline.handle(request.clone()))).await;

    for (request, result) in requests.iter().zip(results) {
        let outcome = result?;
        println!(
            "{} {} -> {:?}: {}",
            request.method(),
            request.path(),
            outcome,
            request.response().body()
        );
    }

    drop(pipeline);
    container.dispose()?;
    Ok(())
}
