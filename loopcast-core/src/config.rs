//! Centralized configuration for Loopcast.
//!
//! All tunable parameters of the streaming proxy are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Central configuration for all Loopcast components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct LoopcastConfig {
    pub proxy: ProxyConfig,
    pub registry: RegistryConfig,
}

/// Loopback listener and connection handling configuration.
///
/// Controls admission limits, streaming chunk size and the deadlines applied
/// to each connection.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address the listener binds to; only loopback addresses are accepted
    pub bind_address: IpAddr,
    /// Listening port; 0 picks an ephemeral port
    pub port: u16,
    /// Maximum number of connections served concurrently
    pub max_connections: usize,
    /// Bytes copied from the remote reader per write
    pub chunk_size: usize,
    /// Deadline for receiving the complete request head
    pub request_timeout: Duration,
    /// Deadline for each remote read and each socket write while streaming
    pub io_timeout: Duration,
    /// Upper bound on the size of the request line plus headers
    pub max_header_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            max_connections: 64,
            chunk_size: 64 * 1024, // 64 KiB
            request_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(30),
            max_header_bytes: 64 * 1024, // 64 KiB
        }
    }
}

/// Token registry configuration.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Lifetime of a registration; `None` keeps registrations until revoked
    pub registration_ttl: Option<Duration>,
}

impl LoopcastConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparsable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(port) = env_parse::<u16>("LOOPCAST_PORT") {
            config.proxy.port = port;
        }

        if let Some(count) = env_parse::<usize>("LOOPCAST_MAX_CONNECTIONS") {
            config.proxy.max_connections = count.max(1);
        }

        if let Some(bytes) = env_parse::<usize>("LOOPCAST_CHUNK_SIZE") {
            config.proxy.chunk_size = bytes.max(1);
        }

        if let Some(seconds) = env_parse::<u64>("LOOPCAST_REQUEST_TIMEOUT") {
            config.proxy.request_timeout = Duration::from_secs(seconds);
        }

        if let Some(seconds) = env_parse::<u64>("LOOPCAST_IO_TIMEOUT") {
            config.proxy.io_timeout = Duration::from_secs(seconds);
        }

        if let Some(seconds) = env_parse::<u64>("LOOPCAST_REGISTRATION_TTL") {
            config.registry.registration_ttl = Some(Duration::from_secs(seconds));
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Small chunks exercise the copy loop and short deadlines keep stalled
    /// connections from holding tests hostage.
    pub fn for_testing() -> Self {
        Self {
            proxy: ProxyConfig {
                chunk_size: 4096,
                request_timeout: Duration::from_secs(2),
                io_timeout: Duration::from_secs(2),
                ..Default::default()
            },
            registry: RegistryConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = LoopcastConfig::default();

        assert_eq!(config.proxy.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.proxy.port, 0);
        assert_eq!(config.proxy.max_connections, 64);
        assert_eq!(config.proxy.chunk_size, 65536);
        assert_eq!(config.proxy.request_timeout, Duration::from_secs(10));
        assert_eq!(config.proxy.io_timeout, Duration::from_secs(30));
        assert_eq!(config.proxy.max_header_bytes, 65536);
        assert!(config.registry.registration_ttl.is_none());
    }

    #[test]
    fn test_testing_preset() {
        let config = LoopcastConfig::for_testing();

        assert_eq!(config.proxy.chunk_size, 4096);
        assert_eq!(config.proxy.io_timeout, Duration::from_secs(2));
        assert_eq!(config.proxy.max_connections, 64);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("LOOPCAST_MAX_CONNECTIONS", "8");
            std::env::set_var("LOOPCAST_CHUNK_SIZE", "1024");
            std::env::set_var("LOOPCAST_IO_TIMEOUT", "5");
            std::env::set_var("LOOPCAST_REGISTRATION_TTL", "3600");
            std::env::set_var("LOOPCAST_REQUEST_TIMEOUT", "not-a-number");
        }

        let config = LoopcastConfig::from_env();

        assert_eq!(config.proxy.max_connections, 8);
        assert_eq!(config.proxy.chunk_size, 1024);
        assert_eq!(config.proxy.io_timeout, Duration::from_secs(5));
        assert_eq!(
            config.registry.registration_ttl,
            Some(Duration::from_secs(3600))
        );
        // Unparsable values keep the default
        assert_eq!(config.proxy.request_timeout, Duration::from_secs(10));

        // Cleanup
        unsafe {
            std::env::remove_var("LOOPCAST_MAX_CONNECTIONS");
            std::env::remove_var("LOOPCAST_CHUNK_SIZE");
            std::env::remove_var("LOOPCAST_IO_TIMEOUT");
            std::env::remove_var("LOOPCAST_REGISTRATION_TTL");
            std::env::remove_var("LOOPCAST_REQUEST_TIMEOUT");
        }
    }
}
