use ladder_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (storage, pipeline, routes)
    let (_state, router) = ladder_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    ladder_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
