//! Server configuration

use relay_shared::defaults;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Configuration for both listeners
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Control channel listen address
    pub control_addr: SocketAddr,
    /// Collector listen address
    pub collector_addr: SocketAddr,
    /// Certificate chain (PEM)
    pub cert_path: PathBuf,
    /// Private key (PEM)
    pub key_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            control_addr: (Ipv4Addr::UNSPECIFIED, defaults::CONTROL_PORT).into(),
            collector_addr: (Ipv4Addr::UNSPECIFIED, defaults::COLLECTOR_PORT).into(),
            cert_path: defaults::CERT_PATH.into(),
            key_path: defaults::KEY_PATH.into(),
        }
    }
}

impl ServerConfig {
    /// Check if TLS material is present. Without it the server runs plaintext.
    pub fn has_tls_material(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let config = ServerConfig::default();
        assert_eq!(config.control_addr.port(), 8888);
        assert_eq!(config.collector_addr.port(), 4433);
    }

    #[test]
    fn test_missing_material_means_plaintext() {
        let config = ServerConfig {
            cert_path: "/nonexistent/server.crt".into(),
            key_path: "/nonexistent/server.key".into(),
            ..Default::default()
        };
        assert!(!config.has_tls_material());
    }
}
