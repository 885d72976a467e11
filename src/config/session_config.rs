//! Strategy session configuration parsing from environment variables.
//!
//! Identifies the strategy, the traded symbol/timeframe pair and its price scale.

use anyhow::{Context, Result};
use std::env;

/// Strategy session environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEnvConfig {
    pub strategy_name: String,
    pub symbol: String,
    pub timeframe: String,
    /// Order comment tag identifying this strategy's deals
    pub comment_tag: String,
    pub point_size: f64,
    pub digits: u32,
    /// UTC hours considered high-impact news windows
    pub news_hours: Vec<u32>,
}

impl Default for SessionEnvConfig {
    fn default() -> Self {
        Self {
            strategy_name: "tradegate".to_string(),
            symbol: "EURUSD".to_string(),
            timeframe: "H1".to_string(),
            comment_tag: "tradegate".to_string(),
            point_size: 0.00001,
            digits: 5,
            news_hours: vec![8, 13, 14],
        }
    }
}

impl SessionEnvConfig {
    pub fn from_env() -> Result<Self> {
        let strategy_name = env::var("STRATEGY_NAME").unwrap_or_else(|_| "tradegate".to_string());
        let comment_tag = env::var("COMMENT_TAG").unwrap_or_else(|_| strategy_name.clone());

        let news_hours_str = env::var("NEWS_HOURS").unwrap_or_else(|_| "8,13,14".to_string());
        let news_hours = Self::parse_hours(&news_hours_str).context("Failed to parse NEWS_HOURS")?;

        Ok(Self {
            strategy_name,
            symbol: env::var("SYMBOL").unwrap_or_else(|_| "EURUSD".to_string()),
            timeframe: env::var("TIMEFRAME").unwrap_or_else(|_| "H1".to_string()),
            comment_tag,
            point_size: env::var("POINT_SIZE")
                .unwrap_or_else(|_| "0.00001".to_string())
                .parse::<f64>()
                .context("Failed to parse POINT_SIZE")?,
            digits: env::var("DIGITS")
                .unwrap_or_else(|_| "5".to_string())
                .parse::<u32>()
                .context("Failed to parse DIGITS")?,
            news_hours,
        })
    }

    fn parse_hours(s: &str) -> Result<Vec<u32>> {
        s.split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| {
                let hour = h.parse::<u32>()?;
                if hour > 23 {
                    anyhow::bail!("hour {} out of range 0-23", hour);
                }
                Ok(hour)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hours() {
        assert_eq!(
            SessionEnvConfig::parse_hours("8, 13,14").ok(),
            Some(vec![8, 13, 14])
        );
        assert_eq!(SessionEnvConfig::parse_hours("").ok(), Some(vec![]));
        assert!(SessionEnvConfig::parse_hours("25").is_err());
        assert!(SessionEnvConfig::parse_hours("noon").is_err());
    }
}
