//! JSON configuration for server binding, worker limits, TLS credentials,
//! and the storage collaborator.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageType;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings loaded from a JSON configuration file. Field names on disk are
/// camelCase. The `www*` and `service*` entries configure the admin and
/// service tiers, which live outside this crate but share the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub www_address: String,
    pub www_port: u16,
    pub service_address: String,
    pub service_port: u16,
    pub smtp_address: String,
    pub smtp_port: u16,
    pub db_engine: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_database: String,
    pub db_user_name: String,
    pub db_password: String,
    pub max_workers: usize,
    pub auto_start_browser: bool,
    pub cert_file: String,
    pub key_file: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            www_address: "0.0.0.0".to_string(),
            www_port: 8080,
            service_address: "0.0.0.0".to_string(),
            service_port: 8085,
            smtp_address: "0.0.0.0".to_string(),
            smtp_port: 2500,
            db_engine: "sqlite".to_string(),
            db_host: String::new(),
            db_port: 0,
            db_database: String::new(),
            db_user_name: String::new(),
            db_password: String::new(),
            max_workers: 10,
            auto_start_browser: false,
            cert_file: String::new(),
            key_file: String::new(),
        }
    }
}

impl Configuration {
    /// Read configuration from any reader producing JSON.
    pub fn load<R: Read>(mut reader: R) -> Result<Configuration, ConfigError> {
        let mut buffer = String::new();
        reader.read_to_string(&mut buffer)?;
        Ok(serde_json::from_str(&buffer)?)
    }

    /// Read configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Configuration, ConfigError> {
        Configuration::load(File::open(path)?)
    }

    /// Write the current settings back out as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let serialized = serde_json::to_string_pretty(self)?;
        File::create(path)?.write_all(serialized.as_bytes())?;
        Ok(())
    }

    /// The `host:port` pair the SMTP listener binds.
    pub fn full_smtp_binding_address(&self) -> String {
        format!("{}:{}", self.smtp_address, self.smtp_port)
    }

    /// The `host:port` pair for the admin web application.
    pub fn full_www_binding_address(&self) -> String {
        format!("{}:{}", self.www_address, self.www_port)
    }

    /// The `host:port` pair for the JSON service tier.
    pub fn full_service_address(&self) -> String {
        format!("{}:{}", self.service_address, self.service_port)
    }

    /// The storage engine selected by `dbEngine`.
    pub fn storage_type(&self) -> StorageType {
        StorageType::from_name(&self.db_engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_full_configuration() {
        let json = r#"{
            "wwwAddress": "127.0.0.1",
            "wwwPort": 8080,
            "serviceAddress": "127.0.0.1",
            "servicePort": 8085,
            "smtpAddress": "127.0.0.1",
            "smtpPort": 2500,
            "dbEngine": "mysql",
            "dbHost": "localhost",
            "dbPort": 3306,
            "dbDatabase": "mailsink",
            "dbUserName": "mail",
            "dbPassword": "secret",
            "maxWorkers": 25,
            "autoStartBrowser": false,
            "certFile": "",
            "keyFile": ""
        }"#;

        let config = Configuration::load(json.as_bytes()).unwrap();

        assert_eq!(config.smtp_address, "127.0.0.1");
        assert_eq!(config.smtp_port, 2500);
        assert_eq!(config.max_workers, 25);
        assert_eq!(config.storage_type(), StorageType::Mysql);
        assert_eq!(config.full_smtp_binding_address(), "127.0.0.1:2500");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = Configuration::load(r#"{"smtpPort": 2525}"#.as_bytes()).unwrap();

        assert_eq!(config.smtp_port, 2525);
        assert_eq!(config.smtp_address, "0.0.0.0");
        assert_eq!(config.max_workers, 10);
        assert_eq!(config.storage_type(), StorageType::Sqlite);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            Configuration::load("not json".as_bytes()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_save_round_trips() {
        let dir = std::env::temp_dir().join("mailsink-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let mut config = Configuration::default();
        config.smtp_port = 2600;
        config.save(&path).unwrap();

        let loaded = Configuration::from_file(&path).unwrap();
        assert_eq!(loaded.smtp_port, 2600);

        std::fs::remove_file(&path).unwrap();
    }
}
