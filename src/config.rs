//! Generic dotted-path configuration tree plus the native-adapter's
//! `ServerConfig`, loaded from TOML the way the teacher's
//! `firework/src/config.rs` does, generalized from a fixed struct to an
//! arbitrary `toml::Value` tree so `host.config.set(path)`/`get(path)`
//! can address anything a plugin wants to store.

use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            workers: default_workers(),
        }
    }
}

/// The namespaced store backing `PluginHost::config()`. Dotted paths
/// (`"server.port"`, `"auth.session_ttl"`) address nested TOML tables.
pub struct Config {
    tree: RwLock<toml::Value>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(toml::Value::Table(toml::value::Table::new())),
        }
    }

    pub fn from_str(contents: &str) -> crate::Result<Self> {
        let tree: toml::Value = toml::from_str(contents)
            .map_err(|e| crate::Error::Internal(format!("invalid config: {e}")))?;
        Ok(Self {
            tree: RwLock::new(tree),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    /// Tries `Ingest.toml` then `ingest.toml` in the current directory,
    /// falling back to an empty tree when neither exists.
    pub fn load_default() -> Self {
        for path in &["Ingest.toml", "ingest.toml"] {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        crate::log!("[config] loaded {}", path);
                        return config;
                    }
                    Err(e) => crate::error!("[config] failed to load {}: {}", path, e),
                }
            }
        }
        crate::log!("[config] using defaults");
        Self::new()
    }

    /// Reads a dotted path (`"server.port"`), deserializing the leaf
    /// value into `T`. Returns `None` if any segment is missing or the
    /// leaf doesn't deserialize as `T`.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let tree = self.tree.read().unwrap();
        let mut cursor = &*tree;
        for segment in path.split('.') {
            cursor = cursor.as_table()?.get(segment)?;
        }
        T::deserialize(cursor.clone()).ok()
    }

    /// Writes a dotted path, creating intermediate tables as needed.
    pub fn set<T: serde::Serialize>(&self, path: &str, value: T) -> crate::Result<()> {
        let value = toml::Value::try_from(value)
            .map_err(|e| crate::Error::Internal(format!("unserializable config value: {e}")))?;
        let mut tree = self.tree.write().unwrap();
        let mut cursor = &mut *tree;
        let segments: Vec<&str> = path.split('.').collect();
        for segment in &segments[..segments.len() - 1] {
            let table = cursor
                .as_table_mut()
                .ok_or_else(|| crate::Error::Internal(format!("config path {path:?} crosses a non-table value")))?;
            cursor = table
                .entry(segment.to_string())
                .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
        }
        let table = cursor
            .as_table_mut()
            .ok_or_else(|| crate::Error::Internal(format!("config path {path:?} crosses a non-table value")))?;
        table.insert(segments[segments.len() - 1].to_string(), value);
        Ok(())
    }

    pub fn server(&self) -> ServerConfig {
        self.get("server").unwrap_or_default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_roundtrip_nested_path() {
        let config = Config::new();
        config.set("auth.session_ttl", 3600u64).unwrap();
        assert_eq!(config.get::<u64>("auth.session_ttl"), Some(3600));
    }

    #[test]
    fn from_str_parses_server_table() {
        let config = Config::from_str("[server]\nport = 9090\n").unwrap();
        assert_eq!(config.server().port, 9090);
        assert_eq!(config.server().address, default_address());
    }

    #[test]
    fn missing_path_returns_none() {
        let config = Config::new();
        assert_eq!(config.get::<String>("nope.nothing"), None);
    }
}
