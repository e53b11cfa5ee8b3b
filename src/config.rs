// src/config.rs

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};
use url::Url;

use crate::correction::CorrectionOptions;
use crate::error::CorrectionError;
use crate::fetch::{TableSelection, MAX_RETRIES};
use crate::format::Locale;
use crate::resolve::{LookupMode, StartPolicy};

/// Environment variable naming a YAML settings file.
pub const CONFIG_ENV: &str = "SELIC_CONFIG";

pub const DEFAULT_URL: &str = "https://www.gov.br/receitafederal/pt-br/assuntos/orientacao-tributaria/pagamentos-e-parcelamentos/taxa-de-juros-selic";

/// Which lookup to run; the start policy and surcharge live beside it in
/// [`Settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSetting {
    #[default]
    Single,
    Cumulative,
    MultiYear,
}

impl FromStr for ModeSetting {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "single" | "single-month" => Ok(ModeSetting::Single),
            "cumulative" | "cumulative-from-month" => Ok(ModeSetting::Cumulative),
            "multi-year" | "cumulative-multi-year" => Ok(ModeSetting::MultiYear),
            other => Err(format!(
                "unknown mode {other:?} (expected single, cumulative or multi-year)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub url: String,
    pub timeout_secs: u64,
    /// Extra attempts after a transient fetch failure.
    pub max_retries: u32,
    pub user_agent: String,
    pub table: TableSelection,
    pub mode: ModeSetting,
    pub start: StartPolicy,
    /// Flat percentage points added to a cumulative sum.
    pub surcharge: Decimal,
    /// Report a resolved rate of exactly zero as unavailable data.
    pub reject_zero_rate: bool,
    pub locale: Locale,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            timeout_secs: 10,
            max_retries: 1,
            user_agent: concat!("selicscraper/", env!("CARGO_PKG_VERSION")).to_string(),
            table: TableSelection::default(),
            mode: ModeSetting::Single,
            start: StartPolicy::Inclusive,
            surcharge: Decimal::ZERO,
            reject_zero_rate: false,
            locale: Locale::PtBr,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> std::result::Result<(), CorrectionError> {
        Url::parse(&self.url)
            .map_err(|e| CorrectionError::Config(format!("url {:?}: {}", self.url, e)))?;
        if self.timeout_secs == 0 {
            return Err(CorrectionError::Config(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(CorrectionError::Config(format!(
                "max_retries must be at most {MAX_RETRIES} (got {})",
                self.max_retries
            )));
        }
        if self.surcharge.is_sign_negative() {
            return Err(CorrectionError::Config(format!(
                "surcharge must not be negative (got {})",
                self.surcharge
            )));
        }
        Ok(())
    }

    pub fn lookup_mode(&self) -> LookupMode {
        match self.mode {
            ModeSetting::Single => LookupMode::SingleMonth,
            ModeSetting::Cumulative => LookupMode::CumulativeFromMonth {
                start: self.start,
                surcharge: self.surcharge,
            },
            ModeSetting::MultiYear => LookupMode::CumulativeMultiYear {
                start: self.start,
                surcharge: self.surcharge,
            },
        }
    }

    pub fn correction_options(&self) -> CorrectionOptions {
        CorrectionOptions {
            mode: self.lookup_mode(),
            reject_zero_rate: self.reject_zero_rate,
        }
    }
}

/// Read settings from `path`, else from `$SELIC_CONFIG`, else defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path: Option<PathBuf> = path
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

    let settings = match path {
        Some(p) => {
            let text = fs::read_to_string(&p)
                .with_context(|| format!("reading settings {}", p.display()))?;
            let s: Settings = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing settings {}", p.display()))?;
            info!(path = %p.display(), "loaded settings");
            s
        }
        None => {
            debug!("no settings file; using defaults");
            Settings::default()
        }
    };

    settings.validate()?;
    Ok(settings)
}
