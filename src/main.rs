use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncWriteExt;

use conclave::config::Config;
use conclave::dispatcher::Deliberation;
use conclave::events::EventSink;
use conclave::gateway::http::HttpGateway;
use conclave::registry::Mode;
use conclave::request::DeliberationRequest;
use conclave::store::JsonFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // Load .env file if present (silently ignored if missing)
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let mode = args
        .next()
        .context("usage: conclave <mode> <question...>")?;
    let question = args.collect::<Vec<_>>().join(" ");
    if question.is_empty() {
        anyhow::bail!("usage: conclave <mode> <question...>");
    }
    let mode = Mode::parse(&mode)?;

    tracing::info!("conclave starting");

    let config = Config::from_env();
    let (sink, mut events) = EventSink::channel();
    let gateway = Arc::new(HttpGateway::new(&config).with_cancellation(sink.cancellation()));
    let store = Arc::new(JsonFileStore::new());
    let engine = Deliberation::new(config, gateway, store);

    let request = DeliberationRequest {
        question,
        mode,
        conversation_id: None,
        mode_config: None,
        history: Vec::new(),
    };

    let run = tokio::spawn(async move { engine.run(request, sink).await });

    let mut stdout = tokio::io::stdout();
    while let Some(event) = events.recv().await {
        stdout.write_all(event.frame().as_bytes()).await?;
        stdout.flush().await?;
    }
    run.await?;

    tracing::info!("conclave shutting down");
    Ok(())
}
