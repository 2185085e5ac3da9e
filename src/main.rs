use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use anywhere::auth::TokenService;
use anywhere::config::Config;
use anywhere::oauth::DiscordOAuth;
use anywhere::openapi::ApiDoc;
use anywhere::repo::Repo;
use anywhere::storage::build_media_store;
use anywhere::{config as routes_config, AppState, SecurityHeaders};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("invalid configuration: {e}");
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    info!("Bootstrapping anywhere server");
    info!("Discord OAuth configured: {}", cfg.discord.is_some());
    info!("Frontend URL: {}", cfg.frontend_url);

    let repo = build_repo(&cfg).await.map_err(std::io::Error::other)?;
    let media_store = build_media_store(&cfg).await.map_err(std::io::Error::other)?;

    let mut state = AppState::new(
        repo,
        media_store,
        TokenService::new(&cfg.jwt_secret, chrono::Duration::minutes(cfg.token_ttl_minutes)),
    )
    .with_media_limits(cfg.media_limits)
    .with_bootstrap_admins(cfg.bootstrap_admin_emails.clone())
    .with_frontend_url(cfg.frontend_url.clone());
    if let Some(discord) = cfg.discord.clone() {
        state = state.with_discord(DiscordOAuth::new(discord));
    }
    let state = web::Data::new(state);

    let openapi = ApiDoc::openapi();
    info!("OpenAPI document generated");

    let frontend_url = cfg.frontend_url.clone();
    let enable_hsts = cfg.enable_hsts;
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            // local dev frontends
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
            .allowed_origin(&frontend_url)
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::new(enable_hsts))
            .wrap(cors)
            .app_data(state.clone())
            .configure(routes_config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(&cfg.bind_addr)?;

    info!("Listening on http://{}", cfg.bind_addr);
    server.run().await
}

#[cfg(feature = "postgres-store")]
async fn build_repo(cfg: &Config) -> anyhow::Result<Arc<dyn Repo>> {
    use anyhow::Context;
    use sqlx::postgres::PgPoolOptions;

    let db_url = cfg.database_url.as_deref().context("DATABASE_URL must be set for postgres-store")?;
    let pool = PgPoolOptions::new().max_connections(5).connect(db_url).await.context("connecting to Postgres")?;
    let repo = anywhere::repo::pg::PgRepo::new(pool);
    repo.migrate().await.context("running migrations")?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(cfg: &Config) -> anyhow::Result<Arc<dyn Repo>> {
    use anywhere::repo::inmem::InMemRepo;

    let repo = match cfg.data_dir {
        Some(ref dir) => {
            info!("Using in-memory repository backend with snapshots in {}", dir.display());
            InMemRepo::with_snapshot(dir)
        }
        None => {
            info!("Using in-memory repository backend (not persisted)");
            InMemRepo::new()
        }
    };
    Ok(Arc::new(repo))
}
