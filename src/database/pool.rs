//! Database Connection Pool using sqlx

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

use crate::database::levels::LevelRepository;

pub struct DatabasePool {
    levels: Arc<LevelRepository>,
}

impl DatabasePool {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, String> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| format!("Failed to connect to PostgreSQL: {}", e))?;

        info!("Connected to PostgreSQL");

        let levels = Arc::new(LevelRepository::new(pool));

        Ok(Self { levels })
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        info!("Initializing database schema...");
        self.levels.init_schema().await?;
        info!("Database schema initialized");
        Ok(())
    }

    pub fn levels(&self) -> Arc<LevelRepository> {
        self.levels.clone()
    }
}
