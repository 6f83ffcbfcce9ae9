use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    Ok(report)
}

/// Rejects configuration the gateway cannot run with. The provider is not
/// probed here; its breaker handles outages at request time.
pub fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.provider_secret_key.trim().is_empty() {
        anyhow::bail!("PROVIDER_SECRET_KEY is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.provider_timeout_secs == 0 {
        anyhow::bail!("PROVIDER_TIMEOUT_SECS must be greater than 0");
    }
    if config.provider_failure_threshold == 0 {
        anyhow::bail!("PROVIDER_FAILURE_THRESHOLD must be greater than 0");
    }

    url::Url::parse(&config.provider_base_url)
        .context("PROVIDER_BASE_URL is not a valid URL")?;
    let app_url = url::Url::parse(&config.app_url).context("APP_URL is not a valid URL")?;
    if !matches!(app_url.scheme(), "http" | "https") {
        anyhow::bail!("APP_URL must be an http(s) URL");
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_validate_env_vars_accepts_defaults() {
        assert!(validate_env_vars(&test_config()).is_ok());
    }

    #[test]
    fn test_validate_env_vars_empty_database_url() {
        let config = Config {
            database_url: String::new(),
            ..test_config()
        };
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_invalid_provider_url() {
        let config = Config {
            provider_base_url: "not-a-url".to_string(),
            ..test_config()
        };
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_rejects_non_http_app_url() {
        let config = Config {
            app_url: "ftp://gateway.example.com".to_string(),
            ..test_config()
        };
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_blank_secret() {
        let config = Config {
            provider_secret_key: "  ".to_string(),
            ..test_config()
        };
        assert!(validate_env_vars(&config).is_err());
    }
}
