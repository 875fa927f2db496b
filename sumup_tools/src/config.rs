use std::time::Duration;

use dpos_common::Secret;
use log::*;

pub const DEFAULT_SUMUP_API_URL: &str = "https://api.sumup.com";
pub const DEFAULT_SUMUP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct SumUpConfig {
    pub api_key: Secret<String>,
    /// If not set, the merchant code is looked up with the API key the first time it is needed
    pub merchant_code: Option<String>,
    pub api_url: String,
    /// Where the provider sends checkout status callbacks
    pub return_url: Option<String>,
    pub timeout: Duration,
}

impl Default for SumUpConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::default(),
            merchant_code: None,
            api_url: DEFAULT_SUMUP_API_URL.to_string(),
            return_url: None,
            timeout: DEFAULT_SUMUP_TIMEOUT,
        }
    }
}

impl SumUpConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_key = Secret::new(std::env::var("DPOS_SUMUP_API_KEY").unwrap_or_else(|_| {
            warn!("DPOS_SUMUP_API_KEY not set. Card payments and reader management will not work");
            String::default()
        }));
        let merchant_code = std::env::var("DPOS_SUMUP_MERCHANT_CODE").ok().filter(|s| !s.trim().is_empty());
        let api_url = std::env::var("DPOS_SUMUP_API_URL").unwrap_or_else(|_| DEFAULT_SUMUP_API_URL.to_string());
        let return_url = std::env::var("DPOS_SUMUP_RETURN_URL").ok().filter(|s| !s.trim().is_empty());
        if return_url.is_none() {
            warn!("DPOS_SUMUP_RETURN_URL not set. Card transactions will never be confirmed by the provider");
        }
        let timeout = std::env::var("DPOS_SUMUP_TIMEOUT")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("Invalid DPOS_SUMUP_TIMEOUT: {e}. Using the default of 15 seconds"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SUMUP_TIMEOUT);
        Self { api_key, merchant_code, api_url, return_url, timeout }
    }
}
