//! `/server` block: the HTTP trigger/observation server is started out of
//! process. This module only models the configuration it would be started
//! with: whether to listen at all, and on which address/port.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: bool,
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

fn default_listen() -> bool {
    true
}

fn default_listen_address() -> String {
    "127.0.0.1".to_owned()
}

fn default_listen_port() -> u16 {
    23456
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            listen: default_listen(),
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
        }
    }
}
