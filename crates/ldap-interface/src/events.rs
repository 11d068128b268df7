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

//! Relation triggers and handler outcomes.
//!
//! Role handlers do not touch the host. They return an [`Outcome`] listing
//! databag writes, secret removals and notifications; the caller applies it.

use crate::error::Result;
use crate::host::{Databag, Host, Relation, RelationId};
use crate::schema::RequirerData;
use crate::secret::Secret;
use std::fmt;
use tracing::debug;

/// Host lifecycle callbacks for a relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    Created,
    Changed,
    Broken,
}

impl Trigger {
    pub const ALL: [Trigger; 3] = [Trigger::Created, Trigger::Changed, Trigger::Broken];

    fn suffix(self) -> &'static str {
        match self {
            Trigger::Created => "relation-created",
            Trigger::Changed => "relation-changed",
            Trigger::Broken => "relation-broken",
        }
    }

    /// Hook name for an endpoint, e.g. `ldap-relation-changed`
    pub fn hook_name(self, relation_name: &str) -> String {
        format!("{}-{}", relation_name, self.suffix())
    }

    /// Inverse of [`Trigger::hook_name`]
    pub fn from_hook_name(hook: &str, relation_name: &str) -> Option<Self> {
        let suffix = hook.strip_prefix(relation_name)?.strip_prefix('-')?;
        Self::ALL.into_iter().find(|t| t.suffix() == suffix)
    }

    /// Whether this trigger may be delivered after `previous` for one relation
    pub fn may_follow(self, previous: Option<Trigger>) -> bool {
        match (previous, self) {
            (None, Trigger::Created) => true,
            (None, _) => false,
            (Some(Trigger::Broken), _) => false,
            (Some(_), Trigger::Created) => false,
            (Some(_), _) => true,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Notifications surfaced to the embedding application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// Provider side: a requirer wants LDAP data
    Requested {
        relation: Relation,
        data: Option<RequirerData>,
    },
    /// Requirer side: provider data is available
    Ready { relation: Relation },
    /// Requirer side: the relation is gone
    Unavailable { relation: Relation },
}

impl Notification {
    pub fn relation(&self) -> &Relation {
        match self {
            Notification::Requested { relation, .. }
            | Notification::Ready { relation }
            | Notification::Unavailable { relation } => relation,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Notification::Requested { .. } => "ldap_requested",
            Notification::Ready { .. } => "ldap_ready",
            Notification::Unavailable { .. } => "ldap_unavailable",
        }
    }
}

/// One side effect requested by a handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Merge into the local application databag
    UpdateDatabag { relation_id: RelationId, data: Databag },
    /// Remove the labelled secret if it exists
    RemoveSecret { label: String },
    Notify(Notification),
}

/// Effects produced by a handler, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    effects: Vec<Effect>,
}

impl Outcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn writes(&self) -> impl Iterator<Item = (RelationId, &Databag)> {
        self.effects.iter().filter_map(|e| match e {
            Effect::UpdateDatabag { relation_id, data } => Some((*relation_id, data)),
            _ => None,
        })
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Notify(n) => Some(n),
            _ => None,
        })
    }

    /// Perform writes and removals against the host, return the notifications.
    pub fn apply<H: Host + ?Sized>(self, host: &mut H) -> Result<Vec<Notification>> {
        let mut notifications = Vec::new();
        for effect in self.effects {
            match effect {
                Effect::UpdateDatabag { relation_id, data } => {
                    host.update(relation_id, &data)?;
                    debug!(relation_id = %relation_id, keys = data.len(), "Updated databag");
                }
                Effect::RemoveSecret { label } => match Secret::fetch(&*host, &label)? {
                    Some(secret) => secret.remove(&mut *host)?,
                    None => debug!(label = %label, "No secret to remove"),
                },
                Effect::Notify(notification) => notifications.push(notification),
            }
        }
        Ok(notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_names() {
        assert_eq!(Trigger::Changed.hook_name("ldap"), "ldap-relation-changed");
        assert_eq!(Trigger::from_hook_name("ldap-relation-broken", "ldap"), Some(Trigger::Broken));
        assert_eq!(Trigger::from_hook_name("ldap-relation-departed", "ldap"), None);
        assert_eq!(Trigger::from_hook_name("other-relation-created", "ldap"), None);
    }

    #[test]
    fn test_lifecycle_ordering() {
        assert!(Trigger::Created.may_follow(None));
        assert!(!Trigger::Changed.may_follow(None));
        assert!(!Trigger::Broken.may_follow(None));
        assert!(Trigger::Changed.may_follow(Some(Trigger::Created)));
        assert!(Trigger::Changed.may_follow(Some(Trigger::Changed)));
        assert!(Trigger::Broken.may_follow(Some(Trigger::Created)));
        assert!(!Trigger::Created.may_follow(Some(Trigger::Changed)));
        for t in Trigger::ALL {
            assert!(!t.may_follow(Some(Trigger::Broken)));
        }
    }
}
