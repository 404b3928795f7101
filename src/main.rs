use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Condition, web, App, HttpServer};
use tracing::info;
use tracing_actix_web::TracingLogger;

use telemedicine_backend::auth::JwtAuth;
use telemedicine_backend::config::Settings;
use telemedicine_backend::database::{create_pool, run_migrations};
use telemedicine_backend::handlers::{self, AppState};
use telemedicine_backend::logging;
use telemedicine_backend::routes;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Resolved once; read-only for the rest of the process lifetime.
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&settings.logging)?;

    info!(
        environment = %settings.environment,
        "{} starting",
        settings.project.name
    );

    info!("connecting to PostgreSQL");
    let pool = create_pool(&settings.database).await?;

    info!("running database migrations");
    run_migrations(&pool).await?;

    let jwt_auth = Arc::new(JwtAuth::new(&settings.security)?);

    let app_state = web::Data::new(AppState {
        pool: pool.clone(),
        jwt_auth,
    });
    let openapi = web::Data::new(routes::openapi_document(&settings));

    let cors_origins = settings.cors.allowed_origins.clone();
    let api_prefix = settings.project.api_v1_prefix.clone();
    let bind_addr = ("0.0.0.0", settings.server.port);

    info!("starting server on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        // CORS is installed only when origins are configured; credentials,
        // any method, any header, for exactly the configured origin list.
        let cors_enabled = !cors_origins.is_empty();
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();
        for origin in &cors_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Condition::new(cors_enabled, cors))
            .app_data(app_state.clone())
            .app_data(openapi.clone())
            .route("/health", web::get().to(handlers::health_check))
            .service(routes::api_router(&api_prefix))
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
