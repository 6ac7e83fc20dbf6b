//! Deployment configuration.
//!
//! ```yaml
//! admin: "0x00000000000000000000000000000000000000ad"
//! genesis_timestamp: 1700000000
//! factory:
//!   whitelisted_strategies:
//!     - "0x0000000000000000000000000000000000000005"
//! registry:
//!   paused: false
//! manager:
//!   paused: true
//! ```

use std::{fs::File, io::Read, path::Path};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Admin of the factory, the registry and the manager.
    pub admin: Address,
    /// Starting time of the chain clock. The system clock is used when absent.
    #[serde(default)]
    pub genesis_timestamp: Option<u64>,
    #[serde(default)]
    pub factory: FactoryConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Authorized on every vault created after deployment.
    #[serde(default)]
    pub whitelisted_strategies: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub paused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub paused: bool,
}

impl DeploymentConfig {
    pub fn new(admin: Address) -> Self {
        Self { admin, ..Default::default() }
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: DeploymentConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.is_zero() {
            return Err(ConfigError::Invalid("admin must not be the zero address".to_string()));
        }
        if let Some(strategy) = self
            .factory
            .whitelisted_strategies
            .iter()
            .find(|s| s.is_zero())
        {
            return Err(ConfigError::Invalid(format!("cannot whitelist {strategy}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use alloy_primitives::address;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
admin: "0x00000000000000000000000000000000000000ad"
genesis_timestamp: 1700000000
factory:
  whitelisted_strategies:
    - "0x0000000000000000000000000000000000000005"
registry:
  paused: true
"#;

        let config = DeploymentConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(
            config,
            DeploymentConfig {
                admin: address!("00000000000000000000000000000000000000ad"),
                genesis_timestamp: Some(1_700_000_000),
                factory: FactoryConfig {
                    whitelisted_strategies: vec![address!("0000000000000000000000000000000000000005")],
                },
                registry: RegistryConfig { paused: true },
                manager: ManagerConfig { paused: false },
            }
        );
    }

    #[rstest]
    #[case::zero_admin("admin: \"0x0000000000000000000000000000000000000000\"\n")]
    #[case::zero_strategy(
        "admin: \"0x00000000000000000000000000000000000000ad\"\nfactory:\n  whitelisted_strategies: [\"0x0000000000000000000000000000000000000000\"]\n"
    )]
    fn test_invalid_config(#[case] yaml: &str) {
        let err = DeploymentConfig::from_yaml_str(yaml).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_admin_is_a_parse_error() {
        let err = DeploymentConfig::from_yaml_str("manager:\n  paused: true\n").unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = DeploymentConfig::from_yaml("./does-not-exist.yaml").unwrap_err();

        assert!(matches!(err, ConfigError::Io(_)));
    }
}
