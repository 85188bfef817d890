use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod controllers;
mod db;
mod menu_planner;
mod models;
mod passwords;
mod reports;
mod uploads;
mod validation;

use config::Config;
use db::Database;
use reports::DashboardCache;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub dashboard_cache: DashboardCache,
}

/// SPA fallback handler - serves index.html for client-side routing
async fn spa_fallback(index: PathBuf) -> actix_web::Result<NamedFile> {
    Ok(NamedFile::open(index)?)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    config::initialize_storage(&config)?;
    log::info!("Storing uploads under {:?}", config.upload_dir);

    log::info!("Initializing database at {}", config.database_url);
    let db = Database::new(&config.database_url).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::Other, format!("Failed to initialize database: {}", e))
    })?;

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        match db.ensure_bootstrap_admin(email, &passwords::hash_password(password)) {
            Ok(true) => log::info!("Created bootstrap admin account {}", email),
            Ok(false) => {}
            Err(e) => log::error!("Failed to create bootstrap admin: {}", e),
        }
    }

    let db = Arc::new(db);
    // Expired sessions are swept at startup and then hourly
    let sweeper_db = Arc::clone(&db);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match sweeper_db.cleanup_expired_sessions() {
                Ok(0) => {}
                Ok(n) => log::info!("Removed {} expired sessions", n),
                Err(e) => log::warn!("Failed to clean up expired sessions: {}", e),
            }
        }
    });

    let frontend_dist = config.frontend_dist.clone().filter(|dist| {
        let found = dist.join("index.html").exists();
        if !found {
            log::warn!("Frontend dist not found in {:?} - static file serving disabled", dist);
        }
        found
    });

    log::info!("Starting Play Kids server on port {}", port);
    if let Some(dist) = &frontend_dist {
        log::info!("Serving frontend from: {:?}", dist);
    }

    let upload_dir = config.upload_dir.clone();
    let cors_origin = config.cors_origin.clone();
    // One state for all workers so the dashboard cache is shared
    let state = web::Data::new(AppState {
        db,
        config,
        dashboard_cache: DashboardCache::default(),
    });

    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
                .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
                .max_age(3600),
            None => Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
        };

        let mut app = App::new()
            .app_data(state.clone())
            .app_data(validation::json_config())
            .app_data(validation::query_config())
            .app_data(validation::path_config())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::configure_api)
            .service(Files::new(models::gallery::UPLOADS_URL_PREFIX, upload_dir.clone()));

        // Serve static files only if frontend dist exists
        if let Some(dist) = &frontend_dist {
            let index = dist.join("index.html");
            app = app.service(
                Files::new("/", dist.clone())
                    .index_file("index.html")
                    .default_handler(web::to(move || spa_fallback(index.clone()))),
            );
        }

        app
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
