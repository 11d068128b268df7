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

//! In-memory host model.
//!
//! Holds relations between applications, their databags and the secret store
//! of a single model. [`MemoryModel::as_app`] gives the view of one
//! application, which implements the host traits. The model is serializable so
//! it can be persisted between hook invocations.

use crate::error::{Error, Result};
use crate::events::Trigger;
use crate::host::{Databag, Relation, RelationId, RelationStore, SecretHandle, SecretStore, Side};
use crate::secret::SecretContent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct RelationRecord {
    name: String,
    apps: [String; 2],
    #[serde(default)]
    databags: BTreeMap<String, Databag>,
    /// Last lifecycle trigger delivered, per application
    #[serde(default)]
    delivered: BTreeMap<String, DeliveredTrigger>,
}

impl RelationRecord {
    fn remote_of(&self, app: &str) -> Option<&str> {
        match &self.apps {
            [a, b] if a == app => Some(b.as_str()),
            [a, b] if b == app => Some(a.as_str()),
            _ => None,
        }
    }

    /// Remote application, unless `app` has already been delivered `broken`.
    fn live_remote_of(&self, app: &str) -> Option<&str> {
        if self.delivered.get(app) == Some(&DeliveredTrigger::Broken) {
            return None;
        }
        self.remote_of(app)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum DeliveredTrigger {
    Created,
    Changed,
    Broken,
}

impl From<Trigger> for DeliveredTrigger {
    fn from(t: Trigger) -> Self {
        match t {
            Trigger::Created => DeliveredTrigger::Created,
            Trigger::Changed => DeliveredTrigger::Changed,
            Trigger::Broken => DeliveredTrigger::Broken,
        }
    }
}

impl From<DeliveredTrigger> for Trigger {
    fn from(t: DeliveredTrigger) -> Self {
        match t {
            DeliveredTrigger::Created => Trigger::Created,
            DeliveredTrigger::Changed => Trigger::Changed,
            DeliveredTrigger::Broken => Trigger::Broken,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SecretRevision {
    revision: u32,
    content: SecretContent,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SecretRecord {
    owner: String,
    label: Option<String>,
    revisions: Vec<SecretRevision>,
    #[serde(default)]
    grants: BTreeSet<RelationId>,
}

impl SecretRecord {
    fn latest(&self) -> Option<&SecretRevision> {
        self.revisions.last()
    }
}

/// Relations, databags and secrets of one model.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryModel {
    name: String,
    #[serde(default)]
    next_relation_id: u64,
    #[serde(default)]
    relations: BTreeMap<RelationId, RelationRecord>,
    #[serde(default)]
    secrets: BTreeMap<String, SecretRecord>,
    /// Databag updates and secret mutations since load
    #[serde(skip)]
    mutations: u64,
}

impl MemoryModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Relate two applications over `relation_name`.
    pub fn relate(&mut self, relation_name: &str, app: &str, remote_app: &str) -> RelationId {
        let id = RelationId(self.next_relation_id);
        self.next_relation_id += 1;
        self.relations.insert(
            id,
            RelationRecord {
                name: relation_name.to_string(),
                apps: [app.to_string(), remote_app.to_string()],
                databags: BTreeMap::new(),
                delivered: BTreeMap::new(),
            },
        );
        debug!(relation_id = %id, app = %app, remote_app = %remote_app, "Relation added");
        id
    }

    /// Drop a relation and both of its databags.
    pub fn remove_relation(&mut self, id: RelationId) -> Result<()> {
        if self.relations.remove(&id).is_none() {
            return Err(Error::RelationNotFound(id));
        }
        debug!(relation_id = %id, "Relation removed");
        Ok(())
    }

    /// Check that `trigger` may be delivered to `app` next.
    pub fn check_delivery(&self, id: RelationId, app: &str, trigger: Trigger) -> Result<()> {
        let record = self
            .relations
            .get(&id)
            .filter(|r| r.remote_of(app).is_some())
            .ok_or(Error::RelationNotFound(id))?;

        let previous = record.delivered.get(app).copied().map(Trigger::from);
        if !trigger.may_follow(previous) {
            return Err(Error::Host(format!(
                "{} delivered to {} after {:?} on relation {}",
                trigger, app, previous, id
            )));
        }
        Ok(())
    }

    /// Record delivery of `trigger` to `app`, rejecting out-of-order callbacks.
    ///
    /// Once every endpoint has seen `broken`, the relation is removed.
    pub fn deliver(&mut self, id: RelationId, app: &str, trigger: Trigger) -> Result<()> {
        self.check_delivery(id, app, trigger)?;
        let record = self.relations.get_mut(&id).ok_or(Error::RelationNotFound(id))?;
        record.delivered.insert(app.to_string(), trigger.into());

        let all_broken = record
            .apps
            .iter()
            .all(|a| record.delivered.get(a) == Some(&DeliveredTrigger::Broken));
        if all_broken {
            self.remove_relation(id)?;
        }
        Ok(())
    }

    /// Databag owned by `app` on a relation
    pub fn databag(&self, id: RelationId, app: &str) -> Option<&Databag> {
        self.relations.get(&id)?.databags.get(app)
    }

    pub fn relation_ids(&self) -> Vec<RelationId> {
        self.relations.keys().copied().collect()
    }

    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    /// URI of the secret `owner` holds under `label`
    pub fn secret_uri(&self, owner: &str, label: &str) -> Option<&str> {
        self.secrets
            .iter()
            .find(|(_, s)| s.owner == owner && s.label.as_deref() == Some(label))
            .map(|(uri, _)| uri.as_str())
    }

    /// Revision number of the latest content of a secret
    pub fn secret_revision(&self, uri: &str) -> Option<u32> {
        self.secrets.get(uri)?.latest().map(|r| r.revision)
    }

    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    /// View of the model as seen by `app`.
    pub fn as_app(&mut self, app: impl Into<String>) -> AppView<'_> {
        AppView {
            model: self,
            app: app.into(),
        }
    }
}

/// One application's view of a [`MemoryModel`].
#[derive(Debug)]
pub struct AppView<'a> {
    model: &'a mut MemoryModel,
    app: String,
}

impl AppView<'_> {
    fn record(&self, id: RelationId) -> Result<&RelationRecord> {
        self.model
            .relations
            .get(&id)
            .filter(|r| r.live_remote_of(&self.app).is_some())
            .ok_or(Error::RelationNotFound(id))
    }

    fn owned_secret(&self, handle: &SecretHandle) -> Result<&SecretRecord> {
        let record = self
            .model
            .secrets
            .get(&handle.uri)
            .ok_or_else(|| Error::SecretNotFound(handle.uri.clone()))?;
        if record.owner != self.app {
            return Err(Error::PermissionDenied {
                uri: handle.uri.clone(),
                app: self.app.clone(),
            });
        }
        Ok(record)
    }

    /// Whether the local application may read the secret
    fn can_read(&self, record: &SecretRecord) -> bool {
        record.owner == self.app
            || record.grants.iter().any(|id| {
                self.model
                    .relations
                    .get(id)
                    .and_then(|r| r.live_remote_of(&self.app))
                    == Some(record.owner.as_str())
            })
    }

    fn handle(uri: &str, record: &SecretRecord) -> SecretHandle {
        SecretHandle {
            uri: uri.to_string(),
            label: record.label.clone(),
        }
    }
}

impl RelationStore for AppView<'_> {
    fn app_name(&self) -> &str {
        &self.app
    }

    fn model_name(&self) -> &str {
        &self.model.name
    }

    fn relations(&self, relation_name: &str) -> Vec<Relation> {
        self.model
            .relations
            .iter()
            .filter(|(_, r)| r.name == relation_name)
            .filter_map(|(id, r)| {
                r.live_remote_of(&self.app).map(|remote| Relation {
                    id: *id,
                    name: r.name.clone(),
                    app: remote.to_string(),
                })
            })
            .collect()
    }

    fn read(&self, relation_id: RelationId, side: Side) -> Result<Databag> {
        let record = self.record(relation_id)?;
        let owner = match side {
            Side::Local => self.app.as_str(),
            Side::Remote => record.remote_of(&self.app).unwrap_or_default(),
        };
        Ok(record.databags.get(owner).cloned().unwrap_or_default())
    }

    fn update(&mut self, relation_id: RelationId, data: &Databag) -> Result<()> {
        self.record(relation_id)?;
        let app = self.app.clone();
        if let Some(record) = self.model.relations.get_mut(&relation_id) {
            let bag = record.databags.entry(app).or_default();
            for (key, value) in data {
                if value.is_empty() {
                    bag.remove(key);
                } else {
                    bag.insert(key.clone(), value.clone());
                }
            }
        }
        self.model.mutations += 1;
        Ok(())
    }
}

impl SecretStore for AppView<'_> {
    fn fetch_by_label(&self, label: &str) -> Result<Option<SecretHandle>> {
        Ok(self
            .model
            .secrets
            .iter()
            .find(|(_, s)| s.owner == self.app && s.label.as_deref() == Some(label))
            .map(|(uri, s)| Self::handle(uri, s)))
    }

    fn fetch_by_uri(&self, uri: &str) -> Result<Option<SecretHandle>> {
        match self.model.secrets.get(uri) {
            None => Ok(None),
            Some(record) if self.can_read(record) => Ok(Some(Self::handle(uri, record))),
            Some(_) => Err(Error::PermissionDenied {
                uri: uri.to_string(),
                app: self.app.clone(),
            }),
        }
    }

    fn content(&self, handle: &SecretHandle) -> Result<SecretContent> {
        let record = self
            .model
            .secrets
            .get(&handle.uri)
            .ok_or_else(|| Error::SecretNotFound(handle.uri.clone()))?;
        if !self.can_read(record) {
            return Err(Error::PermissionDenied {
                uri: handle.uri.clone(),
                app: self.app.clone(),
            });
        }
        record
            .latest()
            .map(|r| r.content.clone())
            .ok_or_else(|| Error::SecretNotFound(handle.uri.clone()))
    }

    fn create(&mut self, label: &str, content: SecretContent) -> Result<SecretHandle> {
        if self.fetch_by_label(label)?.is_some() {
            return Err(Error::Host(format!("secret label {} already in use", label)));
        }
        let uri = format!("secret:{}", uuid::Uuid::new_v4().simple());
        let record = SecretRecord {
            owner: self.app.clone(),
            label: Some(label.to_string()),
            revisions: vec![SecretRevision {
                revision: 1,
                content,
                created_at: Utc::now(),
            }],
            grants: BTreeSet::new(),
        };
        let handle = Self::handle(&uri, &record);
        self.model.secrets.insert(uri, record);
        self.model.mutations += 1;
        Ok(handle)
    }

    fn set_content(&mut self, handle: &SecretHandle, content: SecretContent) -> Result<()> {
        let unchanged = self.owned_secret(handle)?.latest().map(|r| &r.content) == Some(&content);
        if unchanged {
            return Ok(());
        }
        if let Some(record) = self.model.secrets.get_mut(&handle.uri) {
            let revision = record.latest().map_or(1, |r| r.revision + 1);
            record.revisions.push(SecretRevision {
                revision,
                content,
                created_at: Utc::now(),
            });
        }
        self.model.mutations += 1;
        Ok(())
    }

    fn grant(&mut self, handle: &SecretHandle, relation_id: RelationId) -> Result<()> {
        self.owned_secret(handle)?;
        self.record(relation_id)?;
        if let Some(record) = self.model.secrets.get_mut(&handle.uri) {
            record.grants.insert(relation_id);
        }
        self.model.mutations += 1;
        Ok(())
    }

    fn remove_all_revisions(&mut self, handle: &SecretHandle) -> Result<()> {
        self.owned_secret(handle)?;
        self.model.secrets.remove(&handle.uri);
        self.model.mutations += 1;
        Ok(())
    }
}
