use std::{env, net::IpAddr, time::Duration};

use chrono::Duration as SessionDuration;
use dpos_common::{parse_boolean_flag, Secret};
use drinks_pos_engine::helpers::RetryPolicy;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sumup_tools::SumUpConfig;

use crate::errors::ServerError;

const DEFAULT_DPOS_HOST: &str = "127.0.0.1";
const DEFAULT_DPOS_PORT: u16 = 8360;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/drinks_pos.db";
const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;
const DEFAULT_READER_POLL_ATTEMPTS: u32 = 5;
const DEFAULT_READER_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;
const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// When true, purchases that reference unknown items are rejected instead of being recorded with a free
    /// placeholder item.
    pub strict_item_lookup: bool,
    pub reader_poll_attempts: u32,
    pub reader_poll_interval: Duration,
    /// The per-subscriber backlog of the live notification stream
    pub event_buffer_size: usize,
    /// Skip mirroring the provider's reader list at startup. Handy for offline development.
    pub skip_reader_sync: bool,
    pub webhook: WebhookConfig,
    pub sumup: SumUpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DPOS_HOST.to_string(),
            port: DEFAULT_DPOS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            strict_item_lookup: false,
            reader_poll_attempts: DEFAULT_READER_POLL_ATTEMPTS,
            reader_poll_interval: DEFAULT_READER_POLL_INTERVAL,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            skip_reader_sync: false,
            webhook: WebhookConfig::default(),
            sumup: SumUpConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DPOS_HOST").ok().unwrap_or_else(|| DEFAULT_DPOS_HOST.into());
        let port = env::var("DPOS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for DPOS_PORT. {e} Using the default, {DEFAULT_DPOS_PORT}, instead."
                    );
                    DEFAULT_DPOS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_DPOS_PORT);
        let database_url = env::var("DPOS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ DPOS_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("DPOS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("DPOS_USE_FORWARDED").ok(), false);
        let strict_item_lookup = parse_boolean_flag(env::var("DPOS_STRICT_ITEM_LOOKUP").ok(), false);
        let skip_reader_sync = parse_boolean_flag(env::var("DPOS_SKIP_READER_SYNC").ok(), false);
        let reader_poll_attempts = parse_number("DPOS_READER_POLL_ATTEMPTS", DEFAULT_READER_POLL_ATTEMPTS);
        let reader_poll_interval = Duration::from_secs(parse_number(
            "DPOS_READER_POLL_INTERVAL",
            DEFAULT_READER_POLL_INTERVAL.as_secs(),
        ));
        let event_buffer_size = parse_number("DPOS_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        let webhook = WebhookConfig::from_env_or_defaults();
        let sumup = SumUpConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            auth,
            use_x_forwarded_for,
            use_forwarded,
            strict_item_lookup,
            reader_poll_attempts,
            reader_poll_interval,
            event_buffer_size,
            skip_reader_sync,
            webhook,
            sumup,
        }
    }

    pub fn reader_poll_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.reader_poll_attempts.max(1), self.reader_poll_interval)
    }
}

fn parse_number<T>(var: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {var}. {e}. Using the default, {default}.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {var} is not set. Using the default, {default}.");
            default
        },
    }
}

//-------------------------------------------------  WebhookConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub hmac_secret: Secret<String>,
    /// On unless `DPOS_WEBHOOK_HMAC_CHECKS` turns it off. Turning it off requires a whitelist.
    pub hmac_checks: bool,
    /// If supplied, requests against the callback endpoint are checked against a whitelist of provider IP addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { hmac_secret: Secret::default(), hmac_checks: true, whitelist: None }
    }
}

impl WebhookConfig {
    pub fn from_env_or_defaults() -> Self {
        let hmac_secret = Secret::new(env::var("DPOS_WEBHOOK_HMAC_SECRET").unwrap_or_default());
        let hmac_checks = parse_boolean_flag(env::var("DPOS_WEBHOOK_HMAC_CHECKS").ok(), true);
        let whitelist = env::var("DPOS_WEBHOOK_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The callback IP whitelist was configured, but is empty. The server will run, but won't \
                     authorise any incoming provider callbacks."
                );
            },
            None => {
                info!("🪛️ No callback IP whitelist is set.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Callback IP whitelist: {addrs}");
            },
        }
        Self { hmac_secret, hmac_checks, whitelist }
    }

    /// Provider callbacks must be verified somehow. Either signature checks are on and have a key, or they are off and
    /// an IP whitelist is configured.
    pub fn validate(&self) -> Result<(), ServerError> {
        match (self.hmac_checks, self.hmac_secret.is_set(), &self.whitelist) {
            (true, false, _) => Err(ServerError::ConfigurationError(
                "DPOS_WEBHOOK_HMAC_CHECKS is on, but DPOS_WEBHOOK_HMAC_SECRET is not set".into(),
            )),
            (false, _, None) => Err(ServerError::ConfigurationError(
                "DPOS_WEBHOOK_HMAC_CHECKS is off and no DPOS_WEBHOOK_IP_WHITELIST is set, so anyone could post to \
                 /callback"
                    .into(),
            )),
            _ => Ok(()),
        }
    }
}

pub fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0", ""].contains(&s.trim().to_lowercase().as_str()) {
        info!("🪛️ Callback IP whitelist is disabled.");
        return None;
    }
    let ip_addrs = s
        .split(',')
        .filter_map(|s| {
            s.trim()
                .parse()
                .map_err(|e| {
                    warn!("🪛️ Ignoring invalid IP address ({s}) in DPOS_WEBHOOK_IP_WHITELIST: {e}");
                })
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC key used to sign and verify session tokens.
    pub jwt_secret: Secret<String>,
    /// How long an issued session token stays valid.
    pub session_ttl: SessionDuration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. Every session token \
             becomes invalid when the server restarts. DO NOT operate in production like this. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret), session_ttl: SessionDuration::minutes(DEFAULT_SESSION_TTL_MINUTES) }
    }
}

impl AuthConfig {
    pub fn new(secret: &str, session_ttl: SessionDuration) -> Self {
        Self { jwt_secret: Secret::new(secret.to_string()), session_ttl }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("DPOS_JWT_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [DPOS_JWT_SECRET]")))?;
        if secret.trim().is_empty() {
            return Err(ServerError::ConfigurationError("DPOS_JWT_SECRET is empty".to_string()));
        }
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            warn!("🪛️ DPOS_JWT_SECRET is shorter than {MIN_JWT_SECRET_LENGTH} characters. Consider a longer secret.");
        }
        let minutes = parse_number("DPOS_SESSION_TTL", DEFAULT_SESSION_TTL_MINUTES);
        Ok(Self::new(&secret, SessionDuration::minutes(minutes.max(1))))
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
