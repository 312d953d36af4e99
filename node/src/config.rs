//! # Node Configuration
//!
//! Runtime settings loaded from a TOML file. CLI flags and environment
//! variables override individual fields after loading (see `cli.rs`).
//!
//! ```toml
//! listen_addr = "0.0.0.0"
//! api_port = 9741
//! metrics_port = 9742
//! data_dir = "./hashlock-data"
//!
//! [log]
//! level = "hashlock_node=info,hashlock_contracts=info"
//! format = "pretty"
//!
//! [[identities]]
//! name = "issuer"
//! id = "x509::CN=issuer,OU=client::CN=ca"
//! attributes = { minter = "true" }
//! ```
//!
//! The identity registry stands in for the certificate authority: a
//! request names its caller, and the node looks up the ID and attributes
//! here. Anything not listed is rejected.

use hashlock_protocol::identity::ClientIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::logging::LogFormat;

/// Name of the config file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("identity `{0}` is declared more than once or collides with another entry")]
    DuplicateIdentity(String),
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "hashlock_node=info,hashlock_contracts=info,hashlock_protocol=info,tower_http=info"
                .into(),
            format: LogFormat::Pretty,
        }
    }
}

/// One entry of the identity registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityEntry {
    /// Short name clients use as `caller`.
    pub name: String,
    /// Unique client ID; this is the account key on the ledger.
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub listen_addr: String,
    pub api_port: u16,
    pub metrics_port: u16,
    pub data_dir: PathBuf,
    pub log: LogConfig,
    pub identities: Vec<IdentityEntry>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".into(),
            api_port: 9741,
            metrics_port: 9742,
            data_dir: PathBuf::from("./hashlock-data"),
            log: LogConfig::default(),
            identities: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// The config `init` writes: defaults plus a minter and two plain
    /// clients to try the ledger with.
    pub fn sample(data_dir: &Path) -> Self {
        let entry = |name: &str, minter: bool| IdentityEntry {
            name: name.into(),
            id: format!("x509::CN={name},OU=client::CN=hashlock-ca"),
            attributes: if minter {
                BTreeMap::from([("minter".to_string(), "true".to_string())])
            } else {
                BTreeMap::new()
            },
        };
        Self {
            data_dir: data_dir.to_path_buf(),
            identities: vec![entry("issuer", true), entry("alice", false), entry("bob", false)],
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.registry()?;
        Ok(config)
    }

    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid TOML for this schema,
    /// [`ConfigError::DuplicateIdentity`] if two identities share a name or
    /// ID, or a name equals another entry's ID.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn listen_socket(&self, port: u16) -> String {
        format!("{}:{}", self.listen_addr, port)
    }

    /// Builds the caller lookup table.
    pub fn registry(&self) -> Result<IdentityRegistry, ConfigError> {
        let mut by_name = BTreeMap::new();
        for entry in &self.identities {
            let identity = entry
                .attributes
                .iter()
                .fold(ClientIdentity::new(entry.id.clone()), |id, (k, v)| {
                    id.with_attribute(k.clone(), v.clone())
                });
            if by_name.insert(entry.name.clone(), identity).is_some() {
                return Err(ConfigError::DuplicateIdentity(entry.name.clone()));
            }
        }
        // Callers resolve by name first, so a name equal to another
        // entry's ID would shadow that entry.
        for entry in &self.identities {
            let shadowed = self.identities.iter().any(|other| {
                other.name != entry.name && (other.id == entry.id || other.id == entry.name)
            });
            if shadowed {
                return Err(ConfigError::DuplicateIdentity(entry.name.clone()));
            }
        }
        Ok(IdentityRegistry { by_name })
    }
}

/// Known callers, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    by_name: BTreeMap<String, ClientIdentity>,
}

impl IdentityRegistry {
    /// Looks a caller up by registry name, then by full client ID.
    pub fn resolve(&self, caller: &str) -> Option<&ClientIdentity> {
        self.by_name
            .get(caller)
            .or_else(|| self.by_name.values().find(|identity| identity.id() == caller))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
