//! Reference compute module
//!
//! Speaks the request/response protocol over stdin/stdout. Logs go to
//! stderr only, since stdout carries the protocol.

use anyhow::{Context, Result};
use safelight_session::module::brighten::Brighten;
use safelight_session::module::serve_stdio;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safelight_session=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("brighten-module {} ready", safelight_session::build_id());

    serve_stdio(&mut Brighten)
        .await
        .context("Module protocol loop failed")?;

    info!("stdin closed, exiting");
    Ok(())
}
