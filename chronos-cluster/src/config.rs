//! Hand-rolled INI reader for `chronos.conf` / `chronos_cluster.conf`
//! (spec.md §6).
//!
//! The wire format has repeated keys (`cluster.node` once per member), which
//! doesn't map cleanly onto a `HashMap`-backed generic config crate. A tiny,
//! explicit line parser — in the same spirit as this codebase's other
//! hand-rolled parsers — keeps duplicate-key ordering intact and needs no
//! extra dependency.

use std::path::Path;

use crate::error::ClusterError;

/// One `key = value` line, in file order. Duplicate keys (e.g. repeated
/// `cluster.node`) are kept as separate entries rather than collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

/// Parses INI-style `key = value` lines.
///
/// `#` and `;` start a comment (to end of line); blank lines are skipped.
/// Whitespace around `key` and `value` is trimmed. Lines without an `=`
/// are ignored rather than treated as an error — the original Chronos
/// config reader is similarly permissive about stray lines.
pub fn parse_ini(content: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    for raw_line in content.lines() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        entries.push(Entry {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        });
    }
    entries
}

fn strip_comment(line: &str) -> &str {
    let cut = line
        .find(['#', ';'])
        .unwrap_or(line.len());
    &line[..cut]
}

pub fn read_ini_file(path: &Path) -> Result<Vec<Entry>, ClusterError> {
    let content = std::fs::read_to_string(path).map_err(|source| ClusterError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_ini(&content))
}

fn first_value<'a>(entries: &'a [Entry], key: &str) -> Option<&'a str> {
    entries.iter().find(|e| e.key == key).map(|e| e.value.as_str())
}

fn all_values<'a>(entries: &'a [Entry], key: &str) -> Vec<&'a str> {
    entries
        .iter()
        .filter(|e| e.key == key)
        .map(|e| e.value.as_str())
        .collect()
}

/// Parsed `chronos.conf`: process-local options that don't affect cluster
/// membership (spec.md §6).
#[derive(Debug, Clone)]
pub struct ChronosConfig {
    pub http_bind_address: String,
    pub http_bind_port: u16,
    pub http_threads: usize,
    pub logging_folder: String,
    pub logging_level: String,
    pub dns_servers: Vec<String>,
    pub exceptions_max_ttl: u32,
    pub alarms_enabled: bool,
}

impl Default for ChronosConfig {
    fn default() -> Self {
        Self {
            http_bind_address: "0.0.0.0".to_string(),
            http_bind_port: 7253,
            http_threads: 50,
            logging_folder: "/var/log/chronos".to_string(),
            logging_level: "info".to_string(),
            dns_servers: Vec::new(),
            exceptions_max_ttl: 600,
            alarms_enabled: false,
        }
    }
}

impl ChronosConfig {
    pub fn from_entries(entries: &[Entry]) -> Result<Self, ClusterError> {
        let mut cfg = Self::default();

        if let Some(v) = first_value(entries, "http.bind-address") {
            cfg.http_bind_address = v.to_string();
        }
        if let Some(v) = first_value(entries, "http.bind-port") {
            cfg.http_bind_port = v.parse().map_err(|_| ClusterError::InvalidValue {
                key: "http.bind-port",
                value: v.to_string(),
            })?;
        }
        if let Some(v) = first_value(entries, "http.threads") {
            cfg.http_threads = v.parse().map_err(|_| ClusterError::InvalidValue {
                key: "http.threads",
                value: v.to_string(),
            })?;
        }
        if let Some(v) = first_value(entries, "logging.folder") {
            cfg.logging_folder = v.to_string();
        }
        if let Some(v) = first_value(entries, "logging.level") {
            cfg.logging_level = v.to_string();
        }
        cfg.dns_servers = all_values(entries, "dns.servers")
            .into_iter()
            .map(str::to_string)
            .collect();
        if let Some(v) = first_value(entries, "exceptions.max_ttl") {
            cfg.exceptions_max_ttl = v.parse().map_err(|_| ClusterError::InvalidValue {
                key: "exceptions.max_ttl",
                value: v.to_string(),
            })?;
        }
        if let Some(v) = first_value(entries, "alarms.enabled") {
            cfg.alarms_enabled = matches!(v, "true" | "1" | "yes");
        }

        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ClusterError> {
        Self::from_entries(&read_ini_file(path)?)
    }
}

/// Parsed `chronos_cluster.conf`: cluster membership, reloaded independently
/// of `chronos.conf` to drive resync (spec.md §6 "Cluster-config changes
/// trigger `update_config`").
#[derive(Debug, Clone, Default)]
pub struct ClusterFileConfig {
    pub localhost: String,
    pub nodes: Vec<String>,
    pub leaving: Vec<String>,
}

impl ClusterFileConfig {
    pub fn from_entries(entries: &[Entry]) -> Result<Self, ClusterError> {
        let localhost = first_value(entries, "cluster.localhost")
            .ok_or(ClusterError::MissingKey("cluster.localhost"))?
            .to_string();
        let nodes: Vec<String> = all_values(entries, "cluster.node")
            .into_iter()
            .map(str::to_string)
            .collect();
        let leaving: Vec<String> = all_values(entries, "cluster.leaving")
            .into_iter()
            .map(str::to_string)
            .collect();

        if !nodes.iter().any(|n| n == &localhost) {
            return Err(ClusterError::LocalNodeNotInCluster);
        }

        Ok(Self {
            localhost,
            nodes,
            leaving,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ClusterError> {
        Self::from_entries(&read_ini_file(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_entries() {
        let entries = parse_ini("http.bind-port = 7253\n# comment\nhttp.threads=10\n");
        assert_eq!(
            entries,
            vec![
                Entry { key: "http.bind-port".into(), value: "7253".into() },
                Entry { key: "http.threads".into(), value: "10".into() },
            ]
        );
    }

    #[test]
    fn keeps_duplicate_keys() {
        let entries = parse_ini("cluster.node = 10.0.0.1:7253\ncluster.node = 10.0.0.2:7253\n");
        assert_eq!(all_values(&entries, "cluster.node"), vec!["10.0.0.1:7253", "10.0.0.2:7253"]);
    }

    #[test]
    fn ignores_blank_lines_and_stray_text() {
        let entries = parse_ini("\n   \nnot-a-kv-line\nhttp.threads = 5\n");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn chronos_config_applies_overrides() {
        let entries = parse_ini("http.bind-port = 8080\nalarms.enabled = true\ndns.servers = 1.1.1.1\ndns.servers = 8.8.8.8\n");
        let cfg = ChronosConfig::from_entries(&entries).unwrap();
        assert_eq!(cfg.http_bind_port, 8080);
        assert!(cfg.alarms_enabled);
        assert_eq!(cfg.dns_servers, vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()]);
        assert_eq!(cfg.http_threads, 50); // untouched default
    }

    #[test]
    fn cluster_config_requires_localhost_in_nodes() {
        let entries = parse_ini("cluster.localhost = 10.0.0.9:7253\ncluster.node = 10.0.0.1:7253\n");
        assert!(matches!(
            ClusterFileConfig::from_entries(&entries),
            Err(ClusterError::LocalNodeNotInCluster)
        ));
    }

    #[test]
    fn cluster_config_parses_membership() {
        let entries = parse_ini(
            "cluster.localhost = 10.0.0.1:7253\n\
             cluster.node = 10.0.0.1:7253\n\
             cluster.node = 10.0.0.2:7253\n\
             cluster.leaving = 10.0.0.0:7253\n",
        );
        let cfg = ClusterFileConfig::from_entries(&entries).unwrap();
        assert_eq!(cfg.localhost, "10.0.0.1:7253");
        assert_eq!(cfg.nodes.len(), 2);
        assert_eq!(cfg.leaving, vec!["10.0.0.0:7253".to_string()]);
    }
}
