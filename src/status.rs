/*
 * Copyright Nitro Agility S.r.l.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Unit status derived from the integration and configuration.

use crate::config::LdapConfig;
use ldap_interface::RelationStore;
use serde::Serialize;
use std::fmt;

/// Status reported to the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum Status {
    Active,
    Blocked(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Active => f.write_str("active"),
            Status::Blocked(msg) => write!(f, "blocked: {}", msg),
        }
    }
}

/// Whether at least one relation exists on `relation_name`.
pub fn integration_exists<S: RelationStore + ?Sized>(store: &S, relation_name: &str) -> bool {
    !store.relations(relation_name).is_empty()
}

/// First failing condition wins.
pub fn evaluate<S: RelationStore + ?Sized>(store: &S, relation_name: &str, config: &LdapConfig) -> Status {
    if !integration_exists(store, relation_name) {
        return Status::Blocked(format!("Missing integration {}", relation_name));
    }

    let missing = config.missing();
    if !missing.is_empty() {
        let keys: Vec<_> = missing.into_iter().collect();
        return Status::Blocked(format!("Missing required configuration: {}", keys.join(", ")));
    }

    match config.provider_data() {
        Ok(_) => Status::Active,
        Err(e) => Status::Blocked(format!("Invalid configuration: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldap_interface::MemoryModel;

    fn complete() -> LdapConfig {
        LdapConfig {
            urls: Some("ldap://ldap.com".into()),
            base_dn: Some("dc=glauth,dc=com".into()),
            starttls: Some(true),
            bind_dn: Some("cn=user".into()),
            bind_password: Some("password".into()),
            auth_method: None,
        }
    }

    #[test]
    fn test_missing_integration() {
        let mut model = MemoryModel::new("m");
        let status = evaluate(&model.as_app("ldap-integrator"), "ldap", &complete());
        assert_eq!(status, Status::Blocked("Missing integration ldap".into()));
    }

    #[test]
    fn test_missing_config() {
        let mut model = MemoryModel::new("m");
        model.relate("ldap", "ldap-integrator", "app");

        let mut config = complete();
        config.bind_dn = None;
        config.base_dn = None;
        let status = evaluate(&model.as_app("ldap-integrator"), "ldap", &config);
        assert_eq!(status, Status::Blocked("Missing required configuration: base_dn, bind_dn".into()));
    }

    #[test]
    fn test_invalid_config() {
        let mut model = MemoryModel::new("m");
        model.relate("ldap", "ldap-integrator", "app");

        let mut config = complete();
        config.urls = Some("ldaps://ldap.com".into());
        let status = evaluate(&model.as_app("ldap-integrator"), "ldap", &config);
        assert!(matches!(status, Status::Blocked(msg) if msg.starts_with("Invalid configuration")));
    }

    #[test]
    fn test_active() {
        let mut model = MemoryModel::new("m");
        model.relate("ldap", "ldap-integrator", "app");
        assert_eq!(evaluate(&model.as_app("ldap-integrator"), "ldap", &complete()), Status::Active);
    }

    #[test]
    fn test_status_serializes() {
        let json = serde_json::to_value(Status::Blocked("x".into())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "blocked", "message": "x"}));
        let json = serde_json::to_value(Status::Active).unwrap();
        assert_eq!(json, serde_json::json!({"status": "active"}));
    }
}
