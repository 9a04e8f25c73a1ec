use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::Result;

pub static CONFIG_FILE: &'static str = "courier.toml";

/// Application configuration.
///
/// # Sensible defaults
///
/// `Config::default()` describes a local setup: database in `./db`,
/// formatted logs and an unauthenticated SMTP server on `localhost:1025`.
///
/// Using the *struct update syntax* one can initialize a new `Config`, making
/// a few changes right in the definition.
///
/// ```ignore
/// let cfg = Config {
///     dispatch: Dispatch {
///         send_timeout_secs: 5,
///         ..Default::default()
///     },
///     ..Default::default()
/// }
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub name: String,
    pub version: String,

    pub db: Db,
    pub tracing: Tracing,

    pub email: Email,
    pub dispatch: Dispatch,

    /// Development mode configuration.
    pub dev: DevMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            db: Db::default(),
            tracing: Tracing::default(),
            email: Email::default(),
            dispatch: Dispatch::default(),
            dev: DevMode::default(),
        }
    }
}

/// Loads application config from toml file at default location.
pub fn load<T: DeserializeOwned>() -> Result<T> {
    load_from(CONFIG_FILE)
}

/// Loads application config from toml file at standard path using provided
/// name.
///
/// For example for `name` == `courier.toml` we will load both `courier.toml`
/// and `secret.courier.toml` from the working directory. Environment
/// variables override file values, e.g. `EMAIL__SMTP_PASSWORD`.
pub fn load_from<T: DeserializeOwned>(name: impl AsRef<str>) -> Result<T> {
    let config = config::Config::builder()
        .add_source(config::File::with_name(name.as_ref()))
        .add_source(config::File::with_name(&format!("secret.{}", name.as_ref())).required(false))
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix_separator("__"),
        )
        .build()?;

    let config: T = config.try_deserialize()?;

    Ok(config)
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Db {
    /// Path to the database directory, relative to the working directory.
    pub path: String,
    /// Use a throwaway database that's removed on exit.
    pub temporary: bool,
}

impl Default for Db {
    fn default() -> Self {
        Self {
            path: "db".to_string(),
            temporary: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Tracing {
    pub enabled: bool,

    pub mode: crate::tracing::Mode,
    pub level: crate::tracing::Level,

    /// Directory for daily rotated log files. File logging is off when not
    /// set.
    pub file_dir: Option<String>,

    pub loki_address: String,
}

impl Default for Tracing {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: crate::tracing::Mode::default(),
            level: crate::tracing::Level::default(),
            file_dir: None,
            loki_address: "".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Email {
    /// Address that mailings are sent from.
    pub address: String,
    /// Display name put in front of the sender address.
    pub sender_name: String,

    // Smtp server and credentials. Empty user means no authentication.
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,

    /// Diagnostic text recorded for successful attempts.
    pub success_response: String,
}

impl Email {
    /// Sender identity in `Name <address>` form.
    pub fn sender(&self) -> String {
        if self.sender_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.sender_name, self.address)
        }
    }
}

impl Default for Email {
    fn default() -> Self {
        Self {
            address: "noreply@localhost".to_string(),
            sender_name: String::new(),
            smtp_server: "localhost".to_string(),
            smtp_port: 1025,
            smtp_user: String::new(),
            smtp_password: String::new(),
            success_response: "Sent successfully".to_string(),
        }
    }
}

/// Upper bound on the claim lease, one year.
pub const MAX_CLAIM_LEASE_SECS: u64 = 366 * 24 * 60 * 60;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Dispatch {
    /// Upper bound on a single gateway send.
    pub send_timeout_secs: u64,
    /// Period of the scheduled scan when running as a watcher.
    pub scan_interval_secs: u64,
    /// How long a dispatch claim on a mailing stays valid. Should comfortably
    /// exceed the time needed to go through the largest recipient list.
    pub claim_lease_secs: u64,
    /// Skip recipients already reached by a successful attempt when a mailing
    /// is re-run. Off by default, re-runs send to everyone again.
    pub skip_delivered: bool,
    /// Maximum number of characters kept from a server response.
    pub response_limit: usize,
}

impl Dispatch {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Claim lease, capped at [`MAX_CLAIM_LEASE_SECS`].
    pub fn claim_lease(&self) -> chrono::Duration {
        let secs = self.claim_lease_secs.min(MAX_CLAIM_LEASE_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}

impl Default for Dispatch {
    fn default() -> Self {
        Self {
            send_timeout_secs: 30,
            scan_interval_secs: 60,
            claim_lease_secs: 60 * 60,
            skip_delivered: false,
            response_limit: 250,
        }
    }
}

/// NOTE: make sure to disable on production.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DevMode {
    /// Global switch for all dev mode items.
    pub enabled: bool,
    /// Populate the database with demo data on startup.
    pub mock: bool,
}
