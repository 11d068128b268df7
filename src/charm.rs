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

//! Integrator hook handling.
//!
//! The integrator is the provider side of `ldap`. Whatever the hook, the
//! leader re-publishes the configured LDAP data to every relation once the
//! integration exists and configuration is complete.

use crate::config::LdapConfig;
use crate::error::{Error, Result};
use crate::status::{self, Status};
use ldap_interface::{Host, LdapProvider, Leadership, Notification, RelationId, RelationStore, Trigger};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Host hooks understood by the integrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    Install,
    ConfigChanged,
    LeaderElected,
    UpgradeCharm,
    UpdateStatus,
    Relation(Trigger, RelationId),
}

impl Hook {
    /// Parse a hook name; relation hooks need `relation_id`.
    pub fn parse(name: &str, relation_id: Option<RelationId>, relation_name: &str) -> Result<Self> {
        let hook = match name {
            "install" => Hook::Install,
            "config-changed" => Hook::ConfigChanged,
            "leader-elected" => Hook::LeaderElected,
            "upgrade-charm" => Hook::UpgradeCharm,
            "update-status" => Hook::UpdateStatus,
            other => {
                let trigger = Trigger::from_hook_name(other, relation_name)
                    .ok_or_else(|| Error::UnknownHook(other.to_string()))?;
                let id = relation_id
                    .ok_or_else(|| Error::Config(format!("{} requires a relation id", other)))?;
                Hook::Relation(trigger, id)
            }
        };
        Ok(hook)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Install => f.write_str("install"),
            Hook::ConfigChanged => f.write_str("config-changed"),
            Hook::LeaderElected => f.write_str("leader-elected"),
            Hook::UpgradeCharm => f.write_str("upgrade-charm"),
            Hook::UpdateStatus => f.write_str("update-status"),
            Hook::Relation(trigger, id) => write!(f, "{}:{}", trigger, id),
        }
    }
}

/// What a hook run did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HookReport {
    pub hook: String,
    /// Notifications raised by the interface, by name
    pub notifications: Vec<String>,
    /// Relations the LDAP data was published to
    pub published: usize,
    pub status: Status,
}

/// The LDAP integrator application.
#[derive(Clone, Debug)]
pub struct LdapIntegrator {
    config: LdapConfig,
    leadership: Leadership,
    provider: LdapProvider,
}

impl LdapIntegrator {
    pub fn new(config: LdapConfig, leadership: Leadership) -> Self {
        Self {
            config,
            leadership,
            provider: LdapProvider::default(),
        }
    }

    pub fn provider(&self) -> &LdapProvider {
        &self.provider
    }

    pub fn leadership(&self) -> Leadership {
        self.leadership
    }

    /// Run one hook and report the resulting status.
    pub fn dispatch<H: Host + ?Sized>(&self, host: &mut H, hook: Hook) -> Result<HookReport> {
        debug!(hook = %hook, leader = self.leadership.is_leader(), "Dispatching hook");

        let mut notifications = Vec::new();
        let mut published = 0;

        match hook {
            Hook::Install | Hook::ConfigChanged | Hook::LeaderElected | Hook::UpgradeCharm => {
                published += self.holistic_handler(host)?;
            }
            Hook::UpdateStatus => {}
            Hook::Relation(trigger, id) => {
                let relation = host
                    .relation(self.provider.relation_name(), id)
                    .ok_or(ldap_interface::Error::RelationNotFound(id))?;
                let outcome = self.provider.handle(trigger, &relation, self.leadership, &*host)?;
                for notification in outcome.apply(host)? {
                    if let Notification::Requested { relation, data } = &notification {
                        info!(
                            relation_id = %relation.id,
                            user = data.as_ref().map(|d| d.user()),
                            group = data.as_ref().map(|d| d.group()),
                            "LDAP data requested"
                        );
                        published += self.holistic_handler(host)?;
                    }
                    notifications.push(notification.name().to_string());
                }
            }
        }

        Ok(HookReport {
            hook: hook.to_string(),
            notifications,
            published,
            status: self.collect_status(&*host),
        })
    }

    /// Publish configured LDAP data to every relation, one relation at a time.
    ///
    /// Returns the number of relations published to. Nothing happens on
    /// followers, without relations, or while configuration is incomplete.
    pub fn holistic_handler<H: Host + ?Sized>(&self, host: &mut H) -> Result<usize> {
        if !self.leadership.is_leader() {
            debug!("Not the leader, skipping publish");
            return Ok(0);
        }

        let relations = host.relations(self.provider.relation_name());
        if relations.is_empty() {
            debug!("No {} integration, nothing to publish", self.provider.relation_name());
            return Ok(0);
        }

        let Some(data) = self.config.provider_data()? else {
            info!(missing = ?self.config.missing(), "Configuration incomplete, nothing to publish");
            return Ok(0);
        };

        for relation in &relations {
            self.provider
                .publish(host, self.leadership, data.clone(), Some(relation.id))?;
        }
        Ok(relations.len())
    }

    pub fn collect_status<S: RelationStore + ?Sized>(&self, store: &S) -> Status {
        status::evaluate(store, self.provider.relation_name(), &self.config)
    }
}
