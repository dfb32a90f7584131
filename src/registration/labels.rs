//! Target addresses and label sets.

use std::collections::BTreeMap;

use crate::host::UnitIdentity;

/// Label mapping of a registered target.
pub type Labels = BTreeMap<String, String>;

/// Scrape target address `{host}:{port}`.
///
/// Without an explicit host the unit's private address is used.
pub fn build_target(host: Option<&str>, port: u16, identity: &UnitIdentity) -> String {
    let host = host.unwrap_or(&identity.private_address);
    format!("{}:{}", host, port)
}

/// Labels attached to every target registered by this unit.
///
/// `juju_model` is used when the model name is known; older controllers only
/// expose the environment name, which is then published as `juju_env`.
pub fn default_labels(identity: &UnitIdentity) -> Labels {
    let mut labels = Labels::new();
    labels.insert("host".to_string(), identity.hostname.clone());
    labels.insert("juju_unit".to_string(), identity.unit_name.clone());

    if let Some(model) = &identity.model_name {
        labels.insert("juju_model".to_string(), model.clone());
    } else if let Some(env) = &identity.env_name {
        labels.insert("juju_env".to_string(), env.clone());
    }

    labels
}

/// Default labels overlaid with `custom`; custom values win.
pub fn combined_labels(identity: &UnitIdentity, custom: &Labels) -> Labels {
    let mut labels = default_labels(identity);
    labels.extend(custom.iter().map(|(k, v)| (k.clone(), v.clone())));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> UnitIdentity {
        UnitIdentity {
            hostname: "node-1".to_string(),
            unit_name: "cadvisor/0".to_string(),
            private_address: "10.0.0.5".to_string(),
            model_name: Some("prod".to_string()),
            env_name: Some("legacy".to_string()),
        }
    }

    #[test]
    fn test_build_target_defaults_to_private_address() {
        let identity = identity();
        assert_eq!(build_target(None, 9103, &identity), "10.0.0.5:9103");
        assert_eq!(
            build_target(None, 9103, &identity),
            build_target(Some(&identity.private_address), 9103, &identity)
        );
        assert_eq!(build_target(Some("127.0.1.1"), 8080, &identity), "127.0.1.1:8080");
    }

    #[test]
    fn test_model_takes_precedence_over_env() {
        let labels = default_labels(&identity());
        assert_eq!(labels.get("host").map(String::as_str), Some("node-1"));
        assert_eq!(labels.get("juju_unit").map(String::as_str), Some("cadvisor/0"));
        assert_eq!(labels.get("juju_model").map(String::as_str), Some("prod"));
        assert!(!labels.contains_key("juju_env"));
    }

    #[test]
    fn test_env_label_without_model() {
        let mut identity = identity();
        identity.model_name = None;
        let labels = default_labels(&identity);
        assert_eq!(labels.get("juju_env").map(String::as_str), Some("legacy"));
        assert!(!labels.contains_key("juju_model"));

        identity.env_name = None;
        assert_eq!(default_labels(&identity).len(), 2);
    }

    #[test]
    fn test_custom_labels_override_defaults() {
        let mut custom = Labels::new();
        custom.insert("host".to_string(), "override".to_string());
        custom.insert("team".to_string(), "infra".to_string());

        let labels = combined_labels(&identity(), &custom);
        assert_eq!(labels.get("host").map(String::as_str), Some("override"));
        assert_eq!(labels.get("team").map(String::as_str), Some("infra"));
        assert_eq!(labels.get("juju_unit").map(String::as_str), Some("cadvisor/0"));
    }
}
