use anyhow::Context;
use identity_sync::{App, AppContext, ConfigBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigBuilder::new()
        .from_env()
        .build()
        .context("invalid configuration")?;

    identity_sync::init_tracing_with_config(&config);

    let gateway = identity_sync::gateway_from_config(&config.gateway)
        .context("failed to set up user sync gateway")?;
    let context = AppContext::builder()
        .with_webhook_config(&config.webhook)
        .context("invalid webhook configuration")?
        .with_gateway(gateway)
        .build()?;

    App::new(config, context)
        .serve()
        .await
        .context("server error")?;

    Ok(())
}
