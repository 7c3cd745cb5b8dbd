//! Environment-based configuration.
//!
//! All policy knobs live on an explicit struct threaded through the service
//! layer. Nothing reads the environment after startup.

use std::collections::HashMap;
use std::env;

use crate::error::AppError;
use crate::models::AllocationStatus;

const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_ALLOCATION_LENGTH_DAYS: i64 = 365;
const DEFAULT_DAYS_BEFORE_EXPIRING: i64 = 60;
const DEFAULT_DAYS_AFTER_EXPIRING: i64 = 0;
const DEFAULT_SMTP_PORT: u16 = 587;

/// HTTP server and database settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    server_port: u16,
    database_url: String,
    db_max_connections: u32,
    db_acquire_timeout_secs: u64,
    environment: String,
}

impl ServerConfig {
    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    pub fn db_acquire_timeout_secs(&self) -> u64 {
        self.db_acquire_timeout_secs
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }
}

/// Allocation lifecycle policy.
#[derive(Debug, Clone)]
pub struct AllocationPolicy {
    /// Whether allocation renewal is offered at all.
    pub enable_renewal: bool,
    /// Default length of a new allocation, in days.
    pub default_allocation_length_days: i64,
    /// Renewal opens this many days before the end date.
    pub days_to_review_before_expiring: i64,
    /// Grace period after expiry during which renewal is still allowed.
    pub days_to_review_after_expiring: i64,
    /// Whether EULA gating is enforced on EULA-bearing resources.
    pub enable_eula: bool,
    /// Default for `is_changeable` on newly created allocations.
    pub default_changeable: bool,
    /// resource name -> attribute type name for auto-created account-name
    /// attributes.
    pub account_mapping: HashMap<String, String>,
    /// Initial status for allocations on payment-requiring resources.
    pub invoice_default_status: AllocationStatus,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            enable_renewal: true,
            default_allocation_length_days: DEFAULT_ALLOCATION_LENGTH_DAYS,
            days_to_review_before_expiring: DEFAULT_DAYS_BEFORE_EXPIRING,
            days_to_review_after_expiring: DEFAULT_DAYS_AFTER_EXPIRING,
            enable_eula: true,
            default_changeable: true,
            account_mapping: HashMap::new(),
            invoice_default_status: AllocationStatus::PaymentPending,
        }
    }
}

/// SMTP notification settings. Email is disabled when `GRANITE_EMAIL_ENABLED`
/// is false or the SMTP host is missing.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub sender: String,
    /// Address the admin notifications (new requests, change requests,
    /// renewals) go to.
    pub ticket_address: String,
    pub center_name: String,
    pub signature: String,
    /// Base URL used to build links in outbound email.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub policy: AllocationPolicy,
    pub email: EmailConfig,
}

impl Config {
    /// Load configuration from the environment, reading `.env` first when
    /// present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let server = ServerConfig {
            server_port: env_parse("GRANITE_SERVER_PORT", DEFAULT_SERVER_PORT)?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AppError::Config("DATABASE_URL must be set".into()))?,
            db_max_connections: env_parse("GRANITE_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            db_acquire_timeout_secs: env_parse(
                "GRANITE_DB_ACQUIRE_TIMEOUT_SECS",
                DEFAULT_DB_ACQUIRE_TIMEOUT_SECS,
            )?,
            environment: env::var("GRANITE_ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        };

        let policy = AllocationPolicy {
            enable_renewal: env_bool("GRANITE_ENABLE_RENEWAL", true)?,
            default_allocation_length_days: env_parse(
                "GRANITE_DEFAULT_ALLOCATION_LENGTH_DAYS",
                DEFAULT_ALLOCATION_LENGTH_DAYS,
            )?,
            days_to_review_before_expiring: env_parse(
                "GRANITE_DAYS_TO_REVIEW_BEFORE_EXPIRING",
                DEFAULT_DAYS_BEFORE_EXPIRING,
            )?,
            days_to_review_after_expiring: env_parse(
                "GRANITE_DAYS_TO_REVIEW_AFTER_EXPIRING",
                DEFAULT_DAYS_AFTER_EXPIRING,
            )?,
            enable_eula: env_bool("GRANITE_ENABLE_EULA", true)?,
            default_changeable: env_bool("GRANITE_CHANGE_REQUESTS_BY_DEFAULT", true)?,
            account_mapping: parse_mapping(
                &env::var("GRANITE_ACCOUNT_MAPPING").unwrap_or_default(),
            )?,
            invoice_default_status: match env::var("GRANITE_INVOICE_DEFAULT_STATUS") {
                Ok(raw) => serde_json::from_value(serde_json::Value::String(raw.clone()))
                    .map_err(|_| {
                        AppError::Config(format!(
                            "GRANITE_INVOICE_DEFAULT_STATUS: unknown status '{raw}'"
                        ))
                    })?,
                Err(_) => AllocationStatus::PaymentPending,
            },
        };

        let smtp_host = env::var("GRANITE_SMTP_HOST").ok().filter(|h| !h.is_empty());
        let email = EmailConfig {
            enabled: env_bool("GRANITE_EMAIL_ENABLED", false)? && smtp_host.is_some(),
            smtp_host,
            smtp_port: env_parse("GRANITE_SMTP_PORT", DEFAULT_SMTP_PORT)?,
            smtp_username: env::var("GRANITE_SMTP_USERNAME").ok(),
            smtp_password: env::var("GRANITE_SMTP_PASSWORD").ok(),
            sender: env::var("GRANITE_EMAIL_SENDER")
                .unwrap_or_else(|_| "noreply@localhost".into()),
            ticket_address: env::var("GRANITE_EMAIL_TICKET_ADDRESS")
                .unwrap_or_else(|_| "support@localhost".into()),
            center_name: env::var("GRANITE_CENTER_NAME").unwrap_or_else(|_| "HPC Center".into()),
            signature: env::var("GRANITE_EMAIL_SIGNATURE")
                .unwrap_or_else(|_| "HPC Center Team".into()),
            base_url: env::var("GRANITE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
        };

        Ok(Self {
            server,
            policy,
            email,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{key}: invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool, AppError> {
    match env::var(key) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(AppError::Config(format!(
                "{key}: expected a boolean, got '{raw}'"
            ))),
        },
        Err(_) => Ok(default),
    }
}

/// Parse `resource=attribute,resource2=attribute2` mapping strings.
fn parse_mapping(raw: &str) -> Result<HashMap<String, String>, AppError> {
    let mut mapping = HashMap::new();
    for pair in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            AppError::Config(format!("GRANITE_ACCOUNT_MAPPING: malformed entry '{pair}'"))
        })?;
        mapping.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping() {
        let mapping = parse_mapping("cluster=slurm_account_name, storage=share_name").unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["cluster"], "slurm_account_name");
        assert_eq!(mapping["storage"], "share_name");

        assert!(parse_mapping("").unwrap().is_empty());
        assert!(parse_mapping("no-equals-sign").is_err());
    }

    #[test]
    fn test_policy_defaults() {
        let policy = AllocationPolicy::default();
        assert!(policy.enable_renewal);
        assert_eq!(policy.default_allocation_length_days, 365);
        assert_eq!(policy.days_to_review_before_expiring, 60);
        assert_eq!(policy.days_to_review_after_expiring, 0);
        assert_eq!(
            policy.invoice_default_status,
            AllocationStatus::PaymentPending
        );
    }
}
