use std::sync::Arc;

use anyhow::Context;

use hire_desk::bot::Bot;
use hire_desk::channels::{Channel, CliChannel, TelegramChannel};
use hire_desk::config::{BotConfig, Transport};
use hire_desk::menu::MenuRenderer;
use hire_desk::notify::NotificationDispatcher;
use hire_desk::router::ConversationRouter;
use hire_desk::status::{StatusRouteState, status_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("invalid configuration")?;

    let channel: Arc<dyn Channel> = match &config.transport {
        Transport::Telegram { bot_token } => Arc::new(TelegramChannel::new(bot_token.clone())),
        Transport::Cli => Arc::new(CliChannel::new()),
    };
    channel
        .health_check()
        .await
        .with_context(|| format!("channel {} is not reachable", channel.name()))?;

    eprintln!("📋 Hire Desk v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Channel: {}", channel.name());
    eprintln!("   Position: {}", config.posting.title);
    if let Some(port) = config.status_port {
        eprintln!("   Status API: http://0.0.0.0:{}/api/status", port);
    }
    if matches!(config.transport, Transport::Cli) {
        eprintln!("   Type /start to begin. Press :<code> to use a button.\n");
    }

    let content = Arc::new(config.content_store());
    let menu = MenuRenderer::new(content, config.recruiter_contact_url.clone());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&channel),
        config.recruiter_chat_id.clone(),
    ));
    let router = Arc::new(ConversationRouter::new(menu, dispatcher));

    if let Some(port) = config.status_port {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("failed to bind status port {port}"))?;
        let app = status_routes(StatusRouteState {
            router: Arc::clone(&router),
        });
        tokio::spawn(async move {
            tracing::info!(port, "Status server started");
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Status server failed: {}", e);
            }
        });
    }

    Bot::new(channel, router, config.session_idle_timeout)
        .run()
        .await?;

    Ok(())
}
