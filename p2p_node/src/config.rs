//! JSON configuration, loaded once at startup.

use std::path::Path;

use serde::Deserialize;

use p2p_frame::protocol::PeerIdentifier;

use crate::error::{Error, ErrorKind, Result};

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FamousNodeConfig {
    pub host_name: String,
    pub port: u16,
    /// 16-byte opaque id, hex-encoded (32 hex characters) in the config file.
    pub id: String,
}

/// Config file schema, camelCase on the wire.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub log_file_path: String,
    pub file_directory: String,
    pub max_peers: usize,
    pub max_init_peers: usize,
    pub message_port: u16,
    pub file_port: u16,
    /// The user loop reads commands from stdin, not a socket; this field is
    /// carried for config-schema completeness and otherwise unused.
    pub user_port: u16,
    pub query_time_to_live: i32,
    pub cache_time_to_check: u64,
    pub cache_time_to_live: u64,
    pub famous_nodes: Vec<FamousNodeConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::from(ErrorKind::Config(format!("cannot read {}: {}", path.display(), e))))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::from(ErrorKind::Config(format!("malformed config: {}", e))))
    }

    pub fn famous_peer_identifiers(&self) -> Result<Vec<PeerIdentifier>> {
        self.famous_nodes
            .iter()
            .map(|node| {
                let mut id = [0u8; 16];
                hex::decode_to_slice(&node.id, &mut id).map_err(|e| {
                    Error::from(ErrorKind::Config(format!(
                        "famous node {} has invalid id: {}",
                        node.host_name, e
                    )))
                })?;
                Ok(PeerIdentifier::new(node.host_name.clone(), node.port, id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_key_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        // no famousNodes key at all.
        std::fs::write(
            &path,
            r#"{
                "logFilePath": "node.log",
                "fileDirectory": "share",
                "maxPeers": 20,
                "maxInitPeers": 5,
                "messagePort": 6346,
                "filePort": 6347,
                "userPort": 6348,
                "queryTimeToLive": 7,
                "cacheTimeToCheck": 60,
                "cacheTimeToLive": 3600
            }"#,
        )
        .unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err.0, ErrorKind::Config(_)));
    }

    #[test]
    fn famous_node_id_must_be_16_bytes_of_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "logFilePath": "node.log",
                "fileDirectory": "share",
                "maxPeers": 20,
                "maxInitPeers": 5,
                "messagePort": 6346,
                "filePort": 6347,
                "userPort": 6348,
                "queryTimeToLive": 7,
                "cacheTimeToCheck": 60,
                "cacheTimeToLive": 3600,
                "famousNodes": [
                    {"hostName": "seed.example", "port": 6346, "id": "0011223344556677"}
                ]
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.famous_peer_identifiers().is_err());
    }

    #[test]
    fn well_formed_famous_node_id_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "logFilePath": "node.log",
                "fileDirectory": "share",
                "maxPeers": 20,
                "maxInitPeers": 5,
                "messagePort": 6346,
                "filePort": 6347,
                "userPort": 6348,
                "queryTimeToLive": 7,
                "cacheTimeToCheck": 60,
                "cacheTimeToLive": 3600,
                "famousNodes": [
                    {"hostName": "seed.example", "port": 6346, "id": "00112233445566778899aabbccddeeff"}
                ]
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        let ids = config.famous_peer_identifiers().unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].host_name, "seed.example");
    }
}
