use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use elai::content::{ContentGenerator, LlmGenerator, TemplateGenerator};
use elai::{middleware, routes, BotStatus, Config, CryptoRankClient, ElaiBot, TweetHistory, TwitterClient};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🤖 Starting ELAI Market Content Bot");
    println!("===================================");

    let config = Config::from_env().context("invalid configuration")?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.schedule.request_timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let market = Arc::new(CryptoRankClient::new(
        &config.cryptorank_api_key,
        config.cryptorank_api_url.as_deref(),
        http_client.clone(),
    ));
    let publisher = Arc::new(TwitterClient::new(
        &config.twitter_bearer_token,
        config.twitter_api_url.as_deref(),
        http_client.clone(),
    ));
    let llm: Option<Arc<dyn ContentGenerator>> = config.llm.as_ref().map(|llm| {
        println!("🧠 LLM generation enabled ({})", llm.model);
        Arc::new(LlmGenerator::new(
            &llm.api_url,
            &llm.access_token,
            &llm.model,
            http_client.clone(),
        )) as Arc<dyn ContentGenerator>
    });
    if llm.is_none() {
        println!("📝 Template-only generation (no LLM configured)");
    }

    let history = Arc::new(TweetHistory::load(
        config.history_file(),
        config.history.clone(),
    ));
    let status = Arc::new(BotStatus::default());

    let bot = ElaiBot::new(
        market,
        llm,
        Arc::new(TemplateGenerator),
        publisher,
        Arc::clone(&history),
        config.signal.clone(),
        config.schedule.clone(),
        Arc::clone(&status),
    );

    let server_status = Arc::clone(&status);
    let server_history = Arc::clone(&history);
    let port = config.health_port;
    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::cors_middleware())
            .app_data(actix_web::web::Data::new(Arc::clone(&server_status)))
            .app_data(actix_web::web::Data::new(Arc::clone(&server_history)))
            .configure(routes::config)
    })
    .workers(1)
    .bind(("0.0.0.0", port))
    .with_context(|| format!("failed to bind status server on port {}", port))?
    .run();
    tokio::spawn(server);
    println!("🩺 Status server listening on port {}", port);

    println!("\n✅ Bot initialized, entering posting loop\n");
    bot.run().await;

    Ok(())
}
