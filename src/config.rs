use std::net::{IpAddr, Ipv4Addr};

/// Lobby server configuration
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Address to bind the listener to
    pub bind_address: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Address advertised to clients for game server hosts
    pub lobby_ip: String,
    /// Chat server address handed out by GetChatServer
    pub chat_ip: String,
    /// Chat server port
    pub chat_port: u32,
    /// Message of the day; `%name%` is replaced with the username
    pub motd: String,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 5479,
            lobby_ip: "127.0.0.1".to_string(),
            chat_ip: "127.0.0.1".to_string(),
            chat_port: 5480,
            motd: "Welcome, %name%!".to_string(),
        }
    }
}

impl LobbyConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.bind_address = parsed;
            } else {
                tracing::warn!("Invalid BIND_ADDRESS '{}', using default", addr);
            }
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                if parsed > 0 {
                    config.port = parsed;
                } else {
                    tracing::warn!("PORT must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid PORT '{}', using default", port);
            }
        }

        if let Ok(ip) = std::env::var("LOBBY_IP") {
            config.lobby_ip = ip;
        }

        if let Ok(ip) = std::env::var("CHAT_IP") {
            config.chat_ip = ip;
        }

        if let Ok(port) = std::env::var("CHAT_PORT") {
            if let Ok(parsed) = port.parse::<u32>() {
                config.chat_port = parsed;
            } else {
                tracing::warn!("Invalid CHAT_PORT '{}', using default", port);
            }
        }

        if let Ok(motd) = std::env::var("MOTD") {
            config.motd = motd;
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0".to_string());
        }
        if self.lobby_ip.is_empty() {
            return Err("lobby_ip cannot be empty".to_string());
        }
        if self.chat_ip.is_empty() {
            return Err("chat_ip cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LobbyConfig::default();
        assert_eq!(config.port, 5479);
        assert_eq!(config.chat_port, 5480);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_ips() {
        let mut config = LobbyConfig::default();
        config.lobby_ip.clear();
        assert!(config.validate().is_err());

        let mut config = LobbyConfig::default();
        config.chat_ip.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default() {
        let config = LobbyConfig::load_or_default();
        assert!(config.port > 0);
    }
}
