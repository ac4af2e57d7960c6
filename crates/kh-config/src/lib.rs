//! kh-config
//!
//! Layered YAML configuration for the service hall.
//!
//! Documents are merged in order (earlier = base, later = override), turned
//! into canonical JSON, hashed, and then decoded into a typed [`HallConfig`].
//! The hash is logged at daemon boot so two processes can be compared.

use std::collections::BTreeSet;
use std::fs;
use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Typed config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HallConfig {
    pub daemon: DaemonConfig,
    pub fleet: FleetConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// `host:port` the HTTP server binds to.
    pub bind_addr: String,
    /// SSE heartbeat period.
    pub heartbeat_secs: u64,
    /// Browser origins allowed by CORS. Empty = any origin (kiosk devices on
    /// the hall LAN do not send one).
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetConfig {
    pub kiosks: Vec<String>,
    pub waiters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// IANA zone used to turn stamps into wall-clock time of day.
    pub timezone: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            heartbeat_secs: 1,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            kiosks: (1..=4).map(|i| format!("kiosko-{i}")).collect(),
            waiters: (1..=3).map(|i| format!("mesero{i}")).collect(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Bogota".to_string(),
        }
    }
}

impl HallConfig {
    /// Reject configs the daemon could boot with but not run sensibly.
    pub fn validate(&self) -> Result<()> {
        check_roster("fleet.kiosks", &self.fleet.kiosks)?;
        check_roster("fleet.waiters", &self.fleet.waiters)?;
        if self.daemon.heartbeat_secs == 0 {
            bail!("CONFIG_INVALID daemon.heartbeat_secs must be > 0");
        }
        self.bind_addr()?;
        self.timezone()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.daemon
            .bind_addr
            .parse()
            .with_context(|| format!("CONFIG_INVALID daemon.bind_addr: {}", self.daemon.bind_addr))
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.report
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("CONFIG_INVALID report.timezone: {e}"))
    }
}

fn check_roster(field: &str, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        bail!("CONFIG_INVALID {field} must not be empty");
    }
    let mut seen = BTreeSet::new();
    for id in ids {
        if id.trim().is_empty() {
            bail!("CONFIG_INVALID {field} contains a blank id");
        }
        if !seen.insert(id.as_str()) {
            bail!("CONFIG_INVALID {field} lists {id} twice");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config: HallConfig,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    // Earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as "no overrides".
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let config: HallConfig =
        serde_json::from_value(merged.clone()).context("config does not match schema")?;
    config.validate()?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json::Map is key-sorted (no preserve_order), so key order in the
    // YAML source does not affect the output.
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_defaults() {
        let loaded = load_layered_yaml_from_strings(&[]).unwrap();
        assert_eq!(loaded.config, HallConfig::default());
        assert_eq!(loaded.config.fleet.kiosks.len(), 4);
        assert_eq!(loaded.config.fleet.waiters, vec!["mesero1", "mesero2", "mesero3"]);
    }

    #[test]
    fn deep_merge_overrides_leaves_only() {
        let merged = deep_merge(
            serde_json::json!({"daemon": {"bind_addr": "a", "heartbeat_secs": 1}}),
            serde_json::json!({"daemon": {"bind_addr": "b"}}),
        );
        assert_eq!(merged["daemon"]["bind_addr"], "b");
        assert_eq!(merged["daemon"]["heartbeat_secs"], 1);
    }

    #[test]
    fn defaults_validate() {
        HallConfig::default().validate().unwrap();
        assert_eq!(HallConfig::default().timezone().unwrap(), chrono_tz::America::Bogota);
    }
}
