use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub async fn init_pool(database_url: &str) -> PgPool {
    PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await
        .expect("Failed to create DB pool")
}

pub async fn run_migrations(pool: &PgPool) {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .expect("Failed to run migrations");
    log::info!("Database migrations complete");
}

/// Seed the default admin account and base settings if the database is empty.
pub async fn seed(pool: &PgPool, admin_password_hash: &str) {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .unwrap_or(0);
    if count > 0 {
        log::info!("Database already seeded ({count} users), skipping seed");
        return;
    }

    sqlx::query(
        "INSERT INTO users (first_name, last_name, identification, email, password, role) \
         VALUES ('Portal', 'Administrator', 'ADMIN-0001', 'admin@portal.local', $1, 'admin')",
    )
    .bind(admin_password_hash)
    .execute(pool)
    .await
    .expect("Failed to seed admin user");

    sqlx::query(
        "INSERT INTO settings (key, value) VALUES ('app.name', 'Academic Document Portal') \
         ON CONFLICT (key) DO NOTHING",
    )
    .execute(pool)
    .await
    .expect("Failed to seed settings");

    log::info!("Base seed complete (admin account created)");
}
