use axum_extra::extract::cookie::Key;
use std::{fmt, path::PathBuf, str::FromStr, time::Duration};
use tracing::warn;
use url::Url;

use crate::auth::Credential;
use crate::cache::PoolTtls;
use crate::ratelimit::Budget;

/// Minimum length of `SESSION_SECRET`, in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required credential {0}; set it in the environment or .env")]
    MissingCredential(&'static str),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone)]
pub struct Config {
    // osu! OAuth
    pub credential: Credential,
    pub api_base: Url,
    pub oauth_base: Url,
    pub http_timeout: Duration,

    // Server
    pub port: u16,
    pub frontend_url: Url,
    pub public_dir: PathBuf,
    pub secure_cookies: bool,
    session_secret: Option<String>,
    pub session_ttl: Duration,

    // Cache
    pub ttls: PoolTtls,
    pub search_ttl: Duration,

    // Limits
    pub default_budget: Budget,
    pub heavy_budget: Budget,
    pub scan_page_cap: u32,
    pub scan_concurrency: usize,
}

impl Config {
    /// Reads the process environment, honouring a `.env` file if present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::MissingCredential(key));

        let config = Self {
            credential: Credential::new(
                required("OSU_CLIENT_ID")?,
                required("OSU_CLIENT_SECRET")?,
                required("OSU_REDIRECT_URI")?,
            ),
            api_base: parse(&get, "OSU_API_BASE", "https://osu.ppy.sh/api/v2")?,
            oauth_base: parse(&get, "OSU_OAUTH_BASE", "https://osu.ppy.sh/oauth")?,
            http_timeout: secs(&get, "HTTP_TIMEOUT_SECS", 15)?,

            port: parse(&get, "PORT", "3000")?,
            frontend_url: parse(&get, "FRONTEND_URL", "http://localhost:3000")?,
            public_dir: get("PUBLIC_DIR")
                .unwrap_or_else(|| "public".to_string())
                .into(),
            secure_cookies: parse(&get, "SECURE_COOKIES", "false")?,
            session_secret: get("SESSION_SECRET"),
            session_ttl: secs(&get, "SESSION_TTL_SECS", 3600)?,

            ttls: PoolTtls {
                token: secs(&get, "TOKEN_TTL_SECS", 3500)?,
                beatmap: secs(&get, "BEATMAP_TTL_SECS", 7200)?,
                user: secs(&get, "USER_TTL_SECS", 1800)?,
                leaderboard: secs(&get, "LEADERBOARD_TTL_SECS", 600)?,
            },
            search_ttl: secs(&get, "SEARCH_TTL_SECS", 1800)?,

            default_budget: Budget::new(
                parse(&get, "RATE_LIMIT_DEFAULT", "100")?,
                secs(&get, "RATE_LIMIT_DEFAULT_WINDOW_SECS", 900)?,
            ),
            heavy_budget: Budget::new(
                parse(&get, "RATE_LIMIT_HEAVY", "5")?,
                secs(&get, "RATE_LIMIT_HEAVY_WINDOW_SECS", 3600)?,
            ),
            scan_page_cap: parse(&get, "SCAN_PAGE_CAP", "5")?,
            scan_concurrency: parse(&get, "SCAN_CONCURRENCY", "4")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Sanity checks that parsing alone cannot express.
    ///
    /// - every TTL and rate window is non-zero
    /// - budgets allow at least one request
    /// - the scan page cap and concurrency are at least 1
    /// - `SESSION_SECRET`, when given, is at least 32 bytes
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("HTTP_TIMEOUT_SECS", self.http_timeout),
            ("SESSION_TTL_SECS", self.session_ttl),
            ("TOKEN_TTL_SECS", self.ttls.token),
            ("BEATMAP_TTL_SECS", self.ttls.beatmap),
            ("USER_TTL_SECS", self.ttls.user),
            ("LEADERBOARD_TTL_SECS", self.ttls.leaderboard),
            ("SEARCH_TTL_SECS", self.search_ttl),
            ("RATE_LIMIT_DEFAULT_WINDOW_SECS", self.default_budget.window),
            ("RATE_LIMIT_HEAVY_WINDOW_SECS", self.heavy_budget.window),
        ];
        for (key, value) in durations {
            if value.is_zero() {
                return Err(invalid(key, "must be greater than 0"));
            }
        }

        if self.default_budget.max_requests == 0 {
            return Err(invalid("RATE_LIMIT_DEFAULT", "must be greater than 0"));
        }
        if self.heavy_budget.max_requests == 0 {
            return Err(invalid("RATE_LIMIT_HEAVY", "must be greater than 0"));
        }
        if self.scan_page_cap == 0 {
            return Err(invalid("SCAN_PAGE_CAP", "must be greater than 0"));
        }
        if self.scan_concurrency == 0 {
            return Err(invalid("SCAN_CONCURRENCY", "must be greater than 0"));
        }

        if let Some(secret) = &self.session_secret {
            if secret.len() < MIN_SESSION_SECRET_LEN {
                return Err(invalid(
                    "SESSION_SECRET",
                    format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
                ));
            }
        }

        Ok(())
    }

    /// Cookie signing key. Without `SESSION_SECRET` a random key is used and
    /// sessions do not survive a restart.
    pub fn cookie_key(&self) -> Key {
        match &self.session_secret {
            Some(secret) => Key::derive_from(secret.as_bytes()),
            None => {
                warn!("⚠️ SESSION_SECRET not set, using a random key; sessions end on restart");
                Key::generate()
            }
        }
    }

    /// `FRONTEND_URL` reduced to an origin for CORS.
    pub fn allowed_origin(&self) -> String {
        self.frontend_url.origin().ascii_serialization()
    }

    /// Log-safe summary; secrets are never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            osu!: client {} via {} (timeout {})\n  \
            Server: port {}, frontend {}, static {}, secure cookies={}\n  \
            Cache: token {}, beatmap {}, user {}, leaderboard {}, search {}\n  \
            Limits: {}/{} default, {}/{} heavy, scan cap {} pages x{}",
            self.credential.client_id,
            self.api_base,
            humantime::format_duration(self.http_timeout),
            self.port,
            self.allowed_origin(),
            self.public_dir.display(),
            self.secure_cookies,
            humantime::format_duration(self.ttls.token),
            humantime::format_duration(self.ttls.beatmap),
            humantime::format_duration(self.ttls.user),
            humantime::format_duration(self.ttls.leaderboard),
            humantime::format_duration(self.search_ttl),
            self.default_budget.max_requests,
            humantime::format_duration(self.default_budget.window),
            self.heavy_budget.max_requests,
            humantime::format_duration(self.heavy_budget.window),
            self.scan_page_cap,
            self.scan_concurrency,
        )
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("credential", &self.credential)
            .field("port", &self.port)
            .field("api_base", &self.api_base.as_str())
            .field("has_session_secret", &self.session_secret.is_some())
            .finish_non_exhaustive()
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, format!("{raw:?}: {e}")))
}

fn secs<G>(get: &G, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse::<u64, G>(get, key, &default.to_string()).map(Duration::from_secs)
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}
