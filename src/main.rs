use std::sync::Arc;

use anyhow::Context;

use profile_onboarding::config::OnboardingConfig;
use profile_onboarding::llm::{LlmProvider, create_provider};
use profile_onboarding::onboarding::{
    BioGenerator, Catalog, OnboardingManager, OnboardingRouteState, TurnResolver,
    onboarding_routes,
};
use profile_onboarding::store::{Database, LibSqlBackend};

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

    let config = OnboardingConfig::from_env().context("invalid configuration")?;

    eprintln!("🪪 Profile Onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Default locale: {}", config.default_locale);

    // ── Database ─────────────────────────────────────────────────────────
    if let Some(parent) = config.server.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.server.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.server.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.server.db_path.display());

    // ── Generation service ──────────────────────────────────────────────
    let llm: Option<Arc<dyn LlmProvider>> = match config.llm_config() {
        Some(llm_config) => {
            eprintln!("   Model: {}", llm_config.model);
            Some(create_provider(&llm_config)?)
        }
        None => {
            eprintln!("   Model: disabled (deterministic only)");
            None
        }
    };

    // ── Onboarding ──────────────────────────────────────────────────────
    let catalog = Catalog::new(config.default_locale);
    let bio = Arc::new(BioGenerator::new(
        llm.clone(),
        catalog,
        config.bio_max_chars,
        config.llm.timeout,
    ));
    let resolver = Arc::new(
        TurnResolver::new(
            Arc::clone(&db),
            llm.clone(),
            catalog,
            Arc::clone(&bio),
            config.llm.timeout,
        )
        .with_require_confirmation(config.require_confirmation),
    );
    let manager = Arc::new(OnboardingManager::new(
        Arc::clone(&db),
        llm,
        resolver,
        config.mood_max_attempts,
    ));

    let app = onboarding_routes(OnboardingRouteState { manager, bio });

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    eprintln!("   API: http://{addr}/api/onboarding\n");
    tracing::info!(port = config.server.port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}
