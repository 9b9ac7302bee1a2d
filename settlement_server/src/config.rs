use std::{env, time::Duration as StdDuration};

use chrono::{Duration, Weekday};
use exchange_tools::ExchangeConfig;
use log::*;
use settlement_engine::DEFAULT_UNPAID_ORDER_TIMEOUT_HOURS;
use tsg_common::parse_boolean_flag;

use crate::errors::ServerError;

const DEFAULT_SWAP_PROVIDERS: [&str; 2] = ["trocador", "changenow"];
const DEFAULT_SWAP_POLL_INTERVAL: StdDuration = StdDuration::from_secs(30);
const DEFAULT_ORDER_EXPIRY_INTERVAL: StdDuration = StdDuration::from_secs(10 * 60);
const DEFAULT_INVOICE_PAYMENT_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);
const DEFAULT_DAILY_INTERVAL: StdDuration = StdDuration::from_secs(24 * 60 * 60);
const DEFAULT_INVOICE_WEEKDAY: Weekday = Weekday::Sun;
const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Apply the embedded schema migrations at startup.
    pub run_migrations: bool,
    /// In test mode, swaps fall back to the mock provider when no real provider can serve them.
    pub testnet: bool,
    /// Names of the swap providers to try, in order.
    pub swap_providers: Vec<String>,
    /// The XMR address tenants pay their commission invoices into.
    pub platform_wallet_address: String,
    /// The time before an unpaid order is considered expired and marked as such.
    pub unpaid_order_timeout: Duration,
    pub schedule: ScheduleConfig,
    pub exchange: ExchangeConfig,
}

/// How often each reconciliation job runs.
#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    pub swap_poll_interval: StdDuration,
    pub order_expiry_interval: StdDuration,
    pub invoice_payment_interval: StdDuration,
    pub invoice_generation_interval: StdDuration,
    pub overdue_interval: StdDuration,
    /// Weekly invoices are only generated on this day (UTC).
    pub invoice_weekday: Weekday,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            swap_poll_interval: DEFAULT_SWAP_POLL_INTERVAL,
            order_expiry_interval: DEFAULT_ORDER_EXPIRY_INTERVAL,
            invoice_payment_interval: DEFAULT_INVOICE_PAYMENT_INTERVAL,
            invoice_generation_interval: DEFAULT_DAILY_INTERVAL,
            overdue_interval: DEFAULT_DAILY_INTERVAL,
            invoice_weekday: DEFAULT_INVOICE_WEEKDAY,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            run_migrations: true,
            testnet: false,
            swap_providers: DEFAULT_SWAP_PROVIDERS.iter().map(|s| s.to_string()).collect(),
            platform_wallet_address: String::default(),
            unpaid_order_timeout: Duration::hours(DEFAULT_UNPAID_ORDER_TIMEOUT_HOURS),
            schedule: ScheduleConfig::default(),
            exchange: ExchangeConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("TSG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TSG_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let run_migrations = parse_boolean_flag(env::var("TSG_RUN_MIGRATIONS").ok(), true);
        let testnet = parse_boolean_flag(env::var("TSG_TESTNET").ok(), false);
        if testnet {
            warn!("🪛️ TSG_TESTNET is set. Swaps will fall back to the mock provider. Never use this in production.");
        }
        let swap_providers = env::var("TSG_SWAP_PROVIDERS")
            .ok()
            .map(|s| parse_provider_list(&s))
            .unwrap_or_else(|| {
                info!("🪛️ TSG_SWAP_PROVIDERS is not set. Using {}", DEFAULT_SWAP_PROVIDERS.join(", "));
                DEFAULT_SWAP_PROVIDERS.iter().map(|s| s.to_string()).collect()
            });
        let platform_wallet_address = env::var("TSG_PLATFORM_WALLET_ADDRESS").ok().unwrap_or_else(|| {
            error!(
                "🪛️ TSG_PLATFORM_WALLET_ADDRESS is not set. Commission invoices cannot be generated without a payment \
                 address."
            );
            String::default()
        });
        let unpaid_order_timeout = configure_unpaid_order_timeout();
        let swap_poll_interval = env::var("TSG_SWAP_POLL_INTERVAL")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for TSG_SWAP_POLL_INTERVAL. {e}"))
                    .ok()
            })
            .filter(|&secs| secs > 0)
            .map(StdDuration::from_secs)
            .unwrap_or(DEFAULT_SWAP_POLL_INTERVAL);
        let invoice_weekday = env::var("TSG_INVOICE_WEEKDAY")
            .ok()
            .and_then(|s| {
                s.trim()
                    .parse::<Weekday>()
                    .map_err(|_| warn!("🪛️ {s} is not a valid day for TSG_INVOICE_WEEKDAY. Using {DEFAULT_INVOICE_WEEKDAY}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_INVOICE_WEEKDAY);
        let schedule = ScheduleConfig { swap_poll_interval, invoice_weekday, ..Default::default() };
        let exchange = ExchangeConfig::new_from_env_or_default();
        Self {
            database_url,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            run_migrations,
            testnet,
            swap_providers,
            platform_wallet_address,
            unpaid_order_timeout,
            schedule,
            exchange,
        }
    }

    /// Checks the settings that the server cannot start without.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.database_url.is_empty() {
            return Err(ServerError::ConfigurationError("TSG_DATABASE_URL must be set".into()));
        }
        if self.platform_wallet_address.is_empty() {
            return Err(ServerError::ConfigurationError("TSG_PLATFORM_WALLET_ADDRESS must be set".into()));
        }
        Ok(())
    }
}

fn parse_provider_list(s: &str) -> Vec<String> {
    s.split(',').map(|p| p.trim().to_lowercase()).filter(|p| !p.is_empty()).collect()
}

fn configure_unpaid_order_timeout() -> Duration {
    let default = Duration::hours(DEFAULT_UNPAID_ORDER_TIMEOUT_HOURS);
    env::var("TSG_UNPAID_ORDER_TIMEOUT")
        .map_err(|_| {
            info!(
                "🪛️ TSG_UNPAID_ORDER_TIMEOUT is not set. Using the default value of {} hrs.",
                default.num_hours()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::hours)
                .map_err(|e| warn!("🪛️ Invalid configuration value for TSG_UNPAID_ORDER_TIMEOUT. {e}"))
        })
        .ok()
        .filter(|d| *d > Duration::zero())
        .unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn provider_list() {
        assert_eq!(parse_provider_list("ChangeNow, trocador,,"), vec!["changenow", "trocador"]);
        assert!(parse_provider_list(" ").is_empty());
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.swap_providers, vec!["trocador", "changenow"]);
        assert_eq!(config.unpaid_order_timeout, Duration::hours(48));
        assert_eq!(config.schedule.swap_poll_interval, StdDuration::from_secs(30));
        assert_eq!(config.schedule.order_expiry_interval, StdDuration::from_secs(600));
        assert_eq!(config.schedule.invoice_weekday, Weekday::Sun);
        assert!(config.run_migrations);
        assert!(!config.testnet);
    }

    #[test]
    fn validation() {
        let mut config = ServerConfig::default();
        assert!(matches!(config.validate(), Err(ServerError::ConfigurationError(_))));
        config.database_url = "sqlite://data/settlement.db".into();
        assert!(config.validate().is_err());
        config.platform_wallet_address = "48platform".into();
        assert!(config.validate().is_ok());
    }
}
