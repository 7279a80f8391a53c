//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;
use tycoon_engine::GameRules;

/// Configuration settings for the game server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address and port the WebSocket listener binds to
    pub bind_address: SocketAddr,

    /// Live connections allowed from one client address. Players rejoining
    /// a game in progress are exempt.
    pub max_connections_per_address: usize,

    /// Seconds of client silence before a liveness probe is sent
    pub idle_timeout_secs: u64,

    /// Rules for games started in the room
    pub rules: GameRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            max_connections_per_address: 1,
            idle_timeout_secs: 60,
            rules: GameRules::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    pub fn with_max_connections_per_address(mut self, max: usize) -> Self {
        self.max_connections_per_address = max;
        self
    }

    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    pub fn with_rules(mut self, rules: GameRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns a message naming the first invalid value
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections_per_address == 0 {
            return Err("max_connections_per_address must be greater than 0".to_string());
        }

        if self.idle_timeout_secs == 0 {
            return Err("idle_timeout_secs must be greater than 0".to_string());
        }

        if self.rules.starting_cash <= 0 {
            return Err("starting_cash must be greater than 0".to_string());
        }

        if self.rules.min_players < 2 {
            return Err("min_players must be at least 2".to_string());
        }

        if self.rules.max_players < self.rules.min_players {
            return Err("max_players must not be less than min_players".to_string());
        }

        if self.rules.max_players > 6 {
            return Err("max_players must not exceed 6".to_string());
        }

        Ok(())
    }
}
