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

//! Bind account secret.
//!
//! The provider keeps the bind password in a host secret, one per relation,
//! and puts only the secret URI on the wire.

use crate::error::Result;
use crate::host::{RelationId, SecretHandle, SecretStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};
use zeroize::Zeroize;

/// The redaction placeholder used in all output.
pub const REDACTED: &str = "[REDACTED]";

/// Label prefix of the per-relation bind account secret.
pub const BIND_ACCOUNT_SECRET_LABEL_PREFIX: &str = "bind-account-secret-for-";

/// Key holding the password inside the secret content.
pub const PASSWORD_KEY: &str = "password";

/// Deterministic label of the bind account secret for a relation.
pub fn bind_account_secret_label(relation_id: RelationId) -> String {
    format!("{}{}", BIND_ACCOUNT_SECRET_LABEL_PREFIX, relation_id)
}

/// A string that never shows up in logs and is zeroed on drop.
///
/// Call `expose()` to get at the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretString").field(&REDACTED).finish()
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Key/value content of a host secret.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretContent(BTreeMap<String, String>);

impl SecretContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content holding a single bind password
    pub fn password(password: &SecretString) -> Self {
        Self::new().with(PASSWORD_KEY, password.expose())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<SecretString> {
        self.0.get(key).map(|v| SecretString::new(v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, REDACTED)))
            .finish()
    }
}

impl Drop for SecretContent {
    fn drop(&mut self) {
        for value in self.0.values_mut() {
            value.zeroize();
        }
    }
}

/// Loaded or freshly created host secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Secret {
    handle: SecretHandle,
}

impl Secret {
    /// Fetch an owned secret by label.
    pub fn fetch<S: SecretStore + ?Sized>(store: &S, label: &str) -> Result<Option<Self>> {
        Ok(store.fetch_by_label(label)?.map(|handle| Self { handle }))
    }

    /// Fetch by label, or create with `content` when missing.
    ///
    /// An existing secret keeps its content. Without `content` a missing
    /// secret stays missing.
    pub fn load_or_create<S: SecretStore + ?Sized>(
        store: &mut S,
        label: &str,
        content: Option<SecretContent>,
    ) -> Result<Option<Self>> {
        if let Some(secret) = Self::fetch(&*store, label)? {
            return Ok(Some(secret));
        }

        match content {
            Some(content) => {
                let handle = store.create(label, content)?;
                info!(label = %label, uri = %handle.uri, "Created secret");
                Ok(Some(Self { handle }))
            }
            None => Ok(None),
        }
    }

    /// Overwrite the content of the labelled secret, creating it if needed.
    pub fn create_or_update<S: SecretStore + ?Sized>(
        store: &mut S,
        label: &str,
        content: SecretContent,
    ) -> Result<Self> {
        match store.fetch_by_label(label)? {
            Some(handle) => {
                store.set_content(&handle, content)?;
                debug!(label = %label, uri = %handle.uri, "Updated secret content");
                Ok(Self { handle })
            }
            None => {
                let handle = store.create(label, content)?;
                info!(label = %label, uri = %handle.uri, "Created secret");
                Ok(Self { handle })
            }
        }
    }

    /// Wrap a handle obtained from the store, e.g. by URI.
    pub fn from_handle(handle: SecretHandle) -> Self {
        Self { handle }
    }

    pub fn uri(&self) -> &str {
        &self.handle.uri
    }

    pub fn handle(&self) -> &SecretHandle {
        &self.handle
    }

    pub fn content<S: SecretStore + ?Sized>(&self, store: &S) -> Result<SecretContent> {
        store.content(&self.handle)
    }

    /// Let the remote application of `relation_id` read this secret.
    pub fn grant<S: SecretStore + ?Sized>(&self, store: &mut S, relation_id: RelationId) -> Result<()> {
        store.grant(&self.handle, relation_id)?;
        debug!(uri = %self.handle.uri, relation_id = %relation_id, "Granted secret");
        Ok(())
    }

    /// Destroy all revisions.
    pub fn remove<S: SecretStore + ?Sized>(self, store: &mut S) -> Result<()> {
        store.remove_all_revisions(&self.handle)?;
        info!(uri = %self.handle.uri, "Removed secret");
        Ok(())
    }
}
