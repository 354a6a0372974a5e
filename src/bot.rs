use crate::commands::{autotp, bind, category, gungame, link, linkrole, resetcooldown, tpmessage, unlink};
use crate::config::Config;
use crate::console::ConsoleExecutor;
use crate::engine::BindEngine;
use crate::rolegate::SerenityRoleGate;
use crate::types::Data;
use poise::serenity_prelude as serenity;
use std::sync::{Arc, OnceLock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Start the bot and run until the gateway stops or the process is told to
/// shut down, then flush engine state.
pub async fn run(
    console: Arc<dyn ConsoleExecutor>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let intents = serenity::GatewayIntents::non_privileged();

    // Filled from the setup closure; used for the shutdown flush.
    let engine_slot: Arc<OnceLock<Arc<BindEngine>>> = Arc::new(OnceLock::new());
    let setup_slot = Arc::clone(&engine_slot);
    let setup_config = config.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                bind(),
                resetcooldown(),
                link(),
                unlink(),
                linkrole(),
                autotp(),
                category(),
                tpmessage(),
                gungame(),
            ],
            ..Default::default()
        })
        .setup(move |context, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(context, &framework.options().commands).await?;

                let roles = Arc::new(SerenityRoleGate::new(Arc::clone(&context.http)));
                let engine = Arc::new(BindEngine::new(console, roles, &setup_config));
                engine.startup().await?;
                engine.spawn_pump();

                let _ = setup_slot.set(Arc::clone(&engine));
                info!("engine ready");
                Ok(Data { engine })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await?;

    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                error!(error = %e, "gateway stopped with an error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            client.shard_manager.shutdown_all().await;
        }
    }

    if let Some(engine) = engine_slot.get() {
        engine.shutdown().await?;
    }
    Ok(())
}
