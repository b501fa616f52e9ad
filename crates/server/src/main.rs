use stock_checker_server::{
    api::app_router, build_state, config::Config, init_tracing, scheduler::start_refresh_scheduler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);
    let state = build_state(&config)?;

    // Prime the FX rate so the first valuations don't run on the default.
    let rate = state.checker.refresh_fx_rate().await;
    tracing::info!("FX rate at startup: {}", rate.rate);

    start_refresh_scheduler(state.clone());

    let router = app_router(state);
    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
