use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware, web};

use acadoc::auth::rate_limit::RateLimiter;
use acadoc::uploads::UploadConfig;
use acadoc::{auth, db, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    // Initialize database
    let pool = db::init_pool(&database_url).await;
    db::run_migrations(&pool).await;

    // Seed default admin account if empty
    let admin_hash = auth::password::hash_password("admin123")
        .expect("Failed to hash default password");
    db::seed(&pool, &admin_hash).await;

    // Clean up old audit entries based on retention policy
    acadoc::audit::cleanup_old_entries(&pool).await;

    // Ensure the upload directory exists
    let upload_config = UploadConfig::from_env();
    std::fs::create_dir_all(&upload_config.root).expect("Failed to create upload directory");

    // Session encryption key — load from SESSION_KEY env var for persistent sessions across restarts
    let secret_key = match std::env::var("SESSION_KEY") {
        Ok(val) if val.len() >= 64 => {
            log::info!("Using SESSION_KEY from environment");
            Key::from(val.as_bytes())
        }
        Ok(val) => {
            log::warn!("SESSION_KEY too short ({} bytes, need 64+) — generating random key", val.len());
            Key::generate()
        }
        Err(_) => {
            log::warn!("No SESSION_KEY set — generating random key (sessions lost on restart)");
            Key::generate()
        }
    };

    let limiter = RateLimiter::new();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    log::info!("Starting server at http://{bind_addr}");

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(
            CookieSessionStore::default(),
            secret_key.clone(),
        )
        .cookie_secure(false)
        .cookie_http_only(true)
        .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(limiter.clone()))
            .app_data(web::Data::new(upload_config.clone()))
            // Static files
            .service(actix_files::Files::new("/static", "./static"))
            // Public routes
            .route("/login", web::get().to(handlers::auth_handlers::login_page))
            .route("/login", web::post().to(handlers::auth_handlers::login_submit))
            // Session check stays public so signed-out callers get a 401
            // JSON body instead of a redirect
            .route("/api/v1/session", web::get().to(handlers::api_v1::session_check))
            // Root redirect
            .route("/", web::get().to(|| async {
                actix_web::HttpResponse::SeeOther()
                    .insert_header(("Location", "/dashboard"))
                    .finish()
            }))
            // Protected routes
            .service(
                web::scope("")
                    .wrap(actix_web::middleware::from_fn(auth::middleware::require_auth))
                    .route("/dashboard", web::get().to(handlers::dashboard::index))
                    .route("/logout", web::post().to(handlers::auth_handlers::logout))
                    // User CRUD — /users/new and /users/export BEFORE /users/{id} to avoid routing conflicts
                    .route("/users", web::get().to(handlers::user_handlers::list))
                    .route("/users/new", web::get().to(handlers::user_handlers::new_form))
                    .route("/users/export", web::get().to(handlers::user_handlers::export_csv))
                    .route("/users", web::post().to(handlers::user_handlers::create))
                    .route("/users/{id}/edit", web::get().to(handlers::user_handlers::edit_form))
                    .route("/users/{id}", web::post().to(handlers::user_handlers::update))
                    .route("/users/{id}/delete", web::post().to(handlers::user_handlers::delete))
                    // Records — /records/new BEFORE /records/{id}
                    .route("/records", web::get().to(handlers::record_handlers::list))
                    .route("/records/new", web::get().to(handlers::record_handlers::new_form))
                    .route("/records", web::post().to(handlers::record_handlers::create))
                    .route("/records/{id}", web::get().to(handlers::record_handlers::detail))
                    .route("/records/{id}/edit", web::get().to(handlers::record_handlers::edit_form))
                    .route("/records/{id}", web::post().to(handlers::record_handlers::update))
                    .route("/records/{id}/delete", web::post().to(handlers::record_handlers::delete))
                    .route("/record", web::get().to(handlers::record_handlers::my_record))
                    // Document upload per group
                    .route("/records/{id}/documents/{kind}", web::get().to(handlers::document_handlers::upload_form))
                    .route("/records/{id}/documents/{kind}", web::post().to(handlers::document_handlers::upload))
                    .route("/documents/{id}/delete", web::post().to(handlers::document_handlers::delete))
                    // Stored files
                    .route("/files/{id}", web::get().to(handlers::document_handlers::preview))
                    .route("/files/{id}/download", web::get().to(handlers::document_handlers::download))
                    // Review queue
                    .route("/reviews", web::get().to(handlers::review_handlers::queue))
                    .route("/reviews/{id}", web::get().to(handlers::review_handlers::review_page))
                    .route("/reviews/{id}", web::post().to(handlers::review_handlers::decide))
                    // Permission documents
                    .route("/records/{id}/permissions/new", web::get().to(handlers::permission_handlers::new_form))
                    .route("/records/{id}/permissions", web::post().to(handlers::permission_handlers::create))
                    .route("/permissions/{id}/edit", web::get().to(handlers::permission_handlers::edit_form))
                    .route("/permissions/{id}", web::post().to(handlers::permission_handlers::update))
                    .route("/permissions/{id}/delete", web::post().to(handlers::permission_handlers::delete))
                    .route("/permissions/{id}/file", web::get().to(handlers::permission_handlers::preview))
                    .route("/permissions/{id}/file/download", web::get().to(handlers::permission_handlers::download))
                    // Account
                    .route("/account", web::get().to(handlers::account_handlers::form))
                    .route("/account", web::post().to(handlers::account_handlers::submit))
                    // Audit log
                    .route("/audit", web::get().to(handlers::audit_handlers::list))
                    // JSON API
                    .route("/api/v1/users", web::get().to(handlers::api_v1::users))
                    .route("/api/v1/records", web::get().to(handlers::api_v1::records))
            )
            // Default 404 handler (must be registered last)
            .default_service(web::to(|| async {
                let html = include_str!("../templates/errors/404.html");
                actix_web::HttpResponse::NotFound()
                    .content_type("text/html; charset=utf-8")
                    .body(html)
            }))
    })
    .bind(bind_addr)?
    .run()
    .await
}
