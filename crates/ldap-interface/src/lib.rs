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

//! The `ldap` integration interface.
//!
//! A provider publishes LDAP connection data (server URLs, base DN, StartTLS,
//! bind account) to any number of requirers over a host-managed relation.
//! The bind password never travels in plaintext: the provider stores it in a
//! per-relation secret, grants it to that relation and writes the secret URI
//! instead. Requirers dereference it on [`LdapRequirer::fetch`].
//!
//! Only the elected leader writes; every role method takes a [`Leadership`]
//! and is a no-op for followers.

pub mod error;
pub mod events;
pub mod host;
pub mod memory;
pub mod provider;
pub mod requirer;
pub mod schema;
pub mod secret;

pub use error::{Error, Result, ValidationError};
pub use events::{Effect, Notification, Outcome, Trigger};
pub use host::{Databag, Host, Leadership, Relation, RelationId, RelationStore, SecretHandle, SecretStore, Side};
pub use memory::{AppView, MemoryModel};
pub use provider::LdapProvider;
pub use requirer::LdapRequirer;
pub use schema::{AuthMethod, ProviderBaseData, ProviderData, ProviderPayload, RequirerData, LDAP_URL_PREFIX};
pub use secret::{bind_account_secret_label, Secret, SecretContent, SecretString};

/// Default endpoint name of the interface.
pub const DEFAULT_RELATION_NAME: &str = "ldap";
