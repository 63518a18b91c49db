mod api;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(orgverify_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = orgverify_db::PoolConfig::from_app_config(&config);
    let pool = orgverify_db::connect_pool(&config.database_url, pool_config).await?;
    orgverify_db::run_migrations(&pool).await?;

    let payments = orgverify_payments::PaymentClient::new(
        &config.payment_base_url,
        &config.payment_secret_key,
        config.payment_timeout_secs,
        config.payment_max_retries,
        config.payment_retry_backoff_base_ms,
    )?;
    let mailer = orgverify_mailer::MailClient::new(
        &config.mail_base_url,
        &config.mail_api_key,
        config.mail_timeout_secs,
    )?;

    let auth = AuthState::from_env(matches!(
        config.env,
        orgverify_core::Environment::Development
    ))?;
    let state = AppState {
        pool,
        payments: Arc::new(payments),
        mailer: Arc::new(mailer),
        location_fee: config.location_fee,
        currency: config.currency.clone(),
        mail_sender: config.mail_sender.clone(),
    };
    let app = build_app(state, auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
