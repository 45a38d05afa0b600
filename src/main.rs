/// NewsHub - server-rendered news portal
use newshub::{config::ServerConfig, error::AppResult, server, AppContext};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newshub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    _   __                   __  __      __
   / | / /__ _      _______ / / / /_  __/ /_
  /  |/ / _ \ | /| / / ___// /_/ / / / / __ \
 / /|  /  __/ |/ |/ (__  )/ __  / /_/ / /_/ /
/_/ |_/\___/|__/|__/____//_/ /_/\__,_/_.___/

        News portal v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
