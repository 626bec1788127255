use stash_core::Config;

// Use mimalloc as the global allocator; upload streaming allocates many
// short-lived chunk buffers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = stash_api::setup::initialize_app(config.clone()).await?;

    let sweeper = state.sweeper.clone().start();

    stash_api::setup::server::start_server(&config, router, sweeper).await?;

    Ok(())
}
