use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

/// Development-time overrides. Read once at startup and carried inside
/// `AppConfig`; nothing consults the process environment after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOverrides {
    pub environment: Environment,
    /// Role name applied to every authenticated user. Honoured only in
    /// development.
    pub role_override: Option<String>,
}

impl Default for RuntimeOverrides {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            role_override: None,
        }
    }
}

impl RuntimeOverrides {
    pub fn effective_role_override(&self) -> Option<&str> {
        match self.environment {
            Environment::Development => self.role_override.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Fixed offset of the clinic's local time from UTC, in minutes.
    pub clinic_utc_offset_minutes: i32,
    pub enforce_working_hours: bool,
    pub overrides: RuntimeOverrides,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|raw| parse_offset_minutes(&raw))
                .unwrap_or(0),
            enforce_working_hours: env::var("CLINIC_ENFORCE_WORKING_HOURS")
                .map(|raw| parse_flag(&raw))
                .unwrap_or(false),
            overrides: RuntimeOverrides {
                environment: env::var("APP_ENVIRONMENT")
                    .ok()
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(Environment::Production),
                role_override: env::var("APP_ROLE_OVERRIDE")
                    .ok()
                    .filter(|raw| !raw.trim().is_empty()),
            },
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// Offsets beyond +/- 18h are rejected.
fn parse_offset_minutes(raw: &str) -> Option<i32> {
    let minutes: i32 = raw.trim().parse().ok()?;
    if minutes.abs() >= 18 * 60 {
        warn!("CLINIC_UTC_OFFSET_MINUTES out of range: {}", minutes);
        return None;
    }
    Some(minutes)
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
