use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    pub db_max_connections: u32,

    /// Maximum retry attempts for the ledger's optimistic transaction.
    pub ledger_max_retries: u32,
    /// Base backoff between ledger retries, in milliseconds (jittered).
    pub ledger_backoff_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("PORT must be a number"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),

            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .expect("DB_MAX_CONNECTIONS must be a number"),

            ledger_max_retries: env::var("LEDGER_MAX_RETRIES")
                .unwrap_or_else(|_| "5".into())
                .parse()
                .unwrap_or(5),
            ledger_backoff_ms: env::var("LEDGER_BACKOFF_MS")
                .unwrap_or_else(|_| "25".into())
                .parse()
                .unwrap_or(25),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
