use ns_generator::{ManifestGenerator, DEFAULT_SHARED_NAMESPACES};
use ns_orchestrator::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    Kube,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Workflow engine base URL; the in-memory engine is used when unset
    #[serde(default)]
    pub engine_url: Option<String>,

    #[serde(default)]
    pub engine_token: Option<String>,

    /// Bearer token the engine must present when posting events
    #[serde(default)]
    pub webhook_token: Option<String>,

    /// Defaults to `kube` with an engine URL, `memory` without
    #[serde(default)]
    pub registry: Option<RegistryBackend>,

    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    #[serde(default = "default_shared_namespaces")]
    pub shared_namespaces: Vec<String>,

    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3131".to_string()
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".ns-provisioner").join("ledger.db")
}

fn default_shared_namespaces() -> Vec<String> {
    DEFAULT_SHARED_NAMESPACES.iter().map(|s| s.to_string()).collect()
}

fn default_call_timeout_ms() -> u64 {
    5000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            engine_url: None,
            engine_token: None,
            webhook_token: None,
            registry: None,
            kubeconfig: None,
            shared_namespaces: default_shared_namespaces(),
            call_timeout_ms: default_call_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from `NS_API_*` variables. Unparseable numbers and unknown
    /// registry names fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            bind_addr: var("NS_API_BIND").unwrap_or(defaults.bind_addr),
            db_path: var("NS_API_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            engine_url: var("NS_API_ENGINE_URL"),
            engine_token: var("NS_API_ENGINE_TOKEN"),
            webhook_token: var("NS_API_WEBHOOK_TOKEN"),
            registry: var("NS_API_REGISTRY").and_then(|v| match v.trim().to_lowercase().as_str() {
                "kube" | "kubernetes" => Some(RegistryBackend::Kube),
                "memory" => Some(RegistryBackend::Memory),
                _ => None,
            }),
            kubeconfig: var("NS_API_KUBECONFIG").map(PathBuf::from),
            shared_namespaces: var("NS_API_SHARED_NAMESPACES")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.shared_namespaces),
            call_timeout_ms: var("NS_API_CALL_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.call_timeout_ms),
            retry_attempts: var("NS_API_RETRY_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retry_attempts),
            retry_backoff_ms: var("NS_API_RETRY_BACKOFF_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retry_backoff_ms),
        }
    }

    pub fn registry_backend(&self) -> RegistryBackend {
        self.registry.unwrap_or(if self.engine_url.is_some() {
            RegistryBackend::Kube
        } else {
            RegistryBackend::Memory
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let initial_backoff = Duration::from_millis(self.retry_backoff_ms);
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            initial_backoff,
            max_backoff: MAX_BACKOFF.max(initial_backoff),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }

    pub fn manifest_generator(&self) -> ManifestGenerator {
        ManifestGenerator::new(self.shared_namespaces.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.bind_addr, "0.0.0.0:3131");
        assert!(config.db_path.ends_with(".ns-provisioner/ledger.db"));
        assert_eq!(config.registry_backend(), RegistryBackend::Memory);
        assert_eq!(config.shared_namespaces, vec!["ingress-nginx", "monitoring"]);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.webhook_token.is_none());
    }

    #[test]
    fn test_engine_url_selects_kube_registry() {
        let config = config_from(&[("NS_API_ENGINE_URL", "http://engine:8080")]);
        assert_eq!(config.registry_backend(), RegistryBackend::Kube);

        let config = config_from(&[
            ("NS_API_ENGINE_URL", "http://engine:8080"),
            ("NS_API_REGISTRY", "memory"),
        ]);
        assert_eq!(config.registry_backend(), RegistryBackend::Memory);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("NS_API_BIND", "127.0.0.1:9000"),
            ("NS_API_SHARED_NAMESPACES", "gateway, ,observability"),
            ("NS_API_CALL_TIMEOUT_MS", "750"),
            ("NS_API_RETRY_ATTEMPTS", "5"),
            ("NS_API_RETRY_BACKOFF_MS", "not-a-number"),
            ("NS_API_WEBHOOK_TOKEN", "engine-secret"),
        ]);
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.webhook_token.as_deref(), Some("engine-secret"));
        assert_eq!(config.shared_namespaces, vec!["gateway", "observability"]);

        let policy = config.retry_policy();
        assert_eq!(policy.call_timeout, Duration::from_millis(750));
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(200));
        assert_eq!(policy.max_backoff, Duration::from_secs(2));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"engine_url":"http://engine","registry":"kube"}"#).unwrap();
        assert_eq!(config.registry_backend(), RegistryBackend::Kube);
        assert_eq!(config.call_timeout_ms, 5000);
    }
}
