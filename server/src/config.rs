//! Command-line configuration and the runtime settings derived from it.

use crate::error::ConfigError;
use clap::Parser;
use std::net::IpAddr;
use std::time::Duration;

/// Command-line flags for the `server` binary.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Connect-four game server", long_about = None)]
pub struct ServerConfig {
    /// IP address or host name to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Seconds a player has to make a move before forfeiting
    #[arg(long, default_value = "120")]
    pub turn_timeout: u64,

    /// Seconds a long-poll read waits for a change
    #[arg(long, default_value = "25")]
    pub long_poll: u64,

    /// Elo k-factor applied to rated games
    #[arg(short, long, default_value = "32")]
    pub k_factor: f64,

    /// Seconds an untouched room is kept before eviction
    #[arg(long, default_value = "3600")]
    pub session_ttl: u64,

    /// Seconds a resolved ticket or invite stays retrievable
    #[arg(long, default_value = "300")]
    pub result_retention: u64,

    /// Seconds between background sweeps
    #[arg(long, default_value = "30")]
    pub sweep_interval: u64,

    /// Mutual friendship to seed, as name:name (repeatable)
    #[arg(short, long = "friend")]
    pub friends: Vec<String>,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !valid_host(&self.host) {
            return Err(ConfigError::BadAddress(self.address()));
        }
        if !(self.k_factor > 0.0 && self.k_factor.is_finite()) {
            return Err(ConfigError::BadKFactor(self.k_factor));
        }

        let durations = [
            ("turn-timeout", self.turn_timeout),
            ("long-poll", self.long_poll),
            ("session-ttl", self.session_ttl),
            ("result-retention", self.result_retention),
            ("sweep-interval", self.sweep_interval),
        ];
        for (name, secs) in durations {
            if secs == 0 {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        for pair in &self.friends {
            parse_friend_pair(pair)?;
        }
        Ok(())
    }

    pub fn settings(&self) -> Result<Settings, ConfigError> {
        self.validate()?;
        let friends = self
            .friends
            .iter()
            .map(|pair| parse_friend_pair(pair))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Settings {
            turn_timeout: Duration::from_secs(self.turn_timeout),
            long_poll_timeout: Duration::from_secs(self.long_poll),
            k_factor: self.k_factor,
            session_ttl: Duration::from_secs(self.session_ttl),
            result_retention: Duration::from_secs(self.result_retention),
            sweep_interval: Duration::from_secs(self.sweep_interval),
            friends,
        })
    }
}

/// An IP literal or a DNS-style name; resolution is left to the listener.
fn valid_host(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
        || (!host.is_empty()
            && host.split('.').all(|label| {
                !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            }))
}

fn parse_friend_pair(pair: &str) -> Result<(String, String), ConfigError> {
    match pair.split_once(':') {
        Some((a, b)) if !a.trim().is_empty() && !b.trim().is_empty() => {
            Ok((a.trim().to_string(), b.trim().to_string()))
        }
        _ => Err(ConfigError::BadFriendPair(pair.to_string())),
    }
}

/// Tunables consumed by the game service.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub turn_timeout: Duration,
    pub long_poll_timeout: Duration,
    pub k_factor: f64,
    pub session_ttl: Duration,
    pub result_retention: Duration,
    pub sweep_interval: Duration,
    pub friends: Vec<(String, String)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(120),
            long_poll_timeout: Duration::from_secs(25),
            k_factor: 32.0,
            session_ttl: Duration::from_secs(3600),
            result_retention: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            friends: Vec::new(),
        }
    }
}
