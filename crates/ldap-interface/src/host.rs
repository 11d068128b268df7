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

//! Host boundary.
//!
//! The orchestration host owns relations, their application databags and the
//! secret store. The roles in this crate only see the host through the traits
//! below, from the point of view of one application.

use crate::error::Result;
use crate::secret::SecretContent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Application databag: string keys to string values.
pub type Databag = BTreeMap<String, String>;

/// Relation identifier assigned by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(pub u64);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RelationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Relation descriptor as seen by the local application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    /// Endpoint name, e.g. `ldap`
    pub name: String,
    /// Application on the other end
    pub app: String,
}

/// Which application databag of a relation to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Databag owned by the local application
    Local,
    /// Databag owned by the remote application
    Remote,
}

/// Elected-writer fact supplied by the host for the current process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Leadership {
    Leader,
    Follower,
}

impl Leadership {
    pub fn is_leader(self) -> bool {
        matches!(self, Leadership::Leader)
    }
}

impl From<bool> for Leadership {
    fn from(is_leader: bool) -> Self {
        if is_leader {
            Leadership::Leader
        } else {
            Leadership::Follower
        }
    }
}

/// Host-issued reference to a secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretHandle {
    /// Opaque URI, safe to put on the wire
    pub uri: String,
    /// Owner-side label, if any
    pub label: Option<String>,
}

/// Relation access for one application.
///
/// Writes only ever target the local application databag; there is no way to
/// write the remote side through this trait.
pub trait RelationStore {
    /// Name of the local application
    fn app_name(&self) -> &str;

    /// Name of the model the application is deployed in
    fn model_name(&self) -> &str;

    /// All relations on the given endpoint, in id order
    fn relations(&self, relation_name: &str) -> Vec<Relation>;

    /// Look up a single relation on an endpoint
    fn relation(&self, relation_name: &str, id: RelationId) -> Option<Relation> {
        self.relations(relation_name).into_iter().find(|r| r.id == id)
    }

    /// Read one side of a relation
    fn read(&self, relation_id: RelationId, side: Side) -> Result<Databag>;

    /// Merge `data` into the local application databag
    fn update(&mut self, relation_id: RelationId, data: &Databag) -> Result<()>;
}

/// Secret access for one application.
pub trait SecretStore {
    /// Find a secret owned by the local application by label
    fn fetch_by_label(&self, label: &str) -> Result<Option<SecretHandle>>;

    /// Find a secret by URI (owned or granted)
    fn fetch_by_uri(&self, uri: &str) -> Result<Option<SecretHandle>>;

    /// Current content of a secret
    fn content(&self, handle: &SecretHandle) -> Result<SecretContent>;

    /// Create a new secret owned by the local application
    fn create(&mut self, label: &str, content: SecretContent) -> Result<SecretHandle>;

    /// Replace the content of an owned secret
    fn set_content(&mut self, handle: &SecretHandle, content: SecretContent) -> Result<()>;

    /// Allow the remote application of a relation to read the secret
    fn grant(&mut self, handle: &SecretHandle, relation_id: RelationId) -> Result<()>;

    /// Destroy every revision of an owned secret
    fn remove_all_revisions(&mut self, handle: &SecretHandle) -> Result<()>;
}

/// Everything a role needs from the host.
pub trait Host: RelationStore + SecretStore {}

impl<T: RelationStore + SecretStore + ?Sized> Host for T {}
