use std::env;

/// Fabric-wide BGP policy constants emitted in every peer-group definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpPolicy {
    pub maximum_paths: u32,
    pub ebgp_multihop: u32,
    /// `standard`, `extended`, `large`, `all`, or `none` to omit the line
    pub send_community: String,
    pub maximum_routes: u32,
}

impl Default for BgpPolicy {
    fn default() -> Self {
        Self {
            maximum_paths: 32,
            ebgp_multihop: 2,
            send_community: "extended".to_string(),
            maximum_routes: 12000,
        }
    }
}

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub db_max_connections: u32,
    pub listen_addr: String,
    pub excluded_interfaces: Vec<String>,
    pub mtu: u32,
    pub bgp: BgpPolicy,
    pub render_workers: usize,
    pub template_path: Option<String>,
    pub netbox_url: Option<String>,
    pub netbox_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "fabric.db".to_string(),
            db_max_connections: 5,
            listen_addr: "0.0.0.0:8080".to_string(),
            excluded_interfaces: split_list(DEFAULT_EXCLUDED_INTERFACES),
            mtu: 9214,
            bgp: BgpPolicy::default(),
            render_workers: 8,
            template_path: None,
            netbox_url: None,
            netbox_token: None,
        }
    }
}

const DEFAULT_EXCLUDED_INTERFACES: &str = r"Management\d*,mgmt\d*,eth0";

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            db_path: get_env("DB_PATH", "fabric.db"),
            db_max_connections: get_env("DB_MAX_CONNECTIONS", "5").parse().unwrap_or(5),
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            excluded_interfaces: split_list(&get_env(
                "FABRIC_EXCLUDED_INTERFACES",
                DEFAULT_EXCLUDED_INTERFACES,
            )),
            mtu: get_env("FABRIC_MTU", "9214").parse().unwrap_or(9214),
            bgp: BgpPolicy {
                maximum_paths: get_env("BGP_MAXIMUM_PATHS", "32").parse().unwrap_or(32),
                ebgp_multihop: get_env("BGP_EBGP_MULTIHOP", "2").parse().unwrap_or(2),
                send_community: get_env("BGP_SEND_COMMUNITY", "extended"),
                maximum_routes: get_env("BGP_MAXIMUM_ROUTES", "12000")
                    .parse()
                    .unwrap_or(12000),
            },
            render_workers: get_env("RENDER_WORKERS", "8")
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .unwrap_or(8),
            template_path: get_opt_env("TEMPLATE_PATH"),
            netbox_url: get_opt_env("NETBOX_URL"),
            netbox_token: get_opt_env("NETBOX_TOKEN"),
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_opt_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(r" Management\d* , ,eth0"),
            vec![r"Management\d*".to_string(), "eth0".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.excluded_interfaces.len(), 3);
        assert_eq!(config.bgp.maximum_paths, 32);
        assert_eq!(config.mtu, 9214);
    }
}
