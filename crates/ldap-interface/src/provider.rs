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

//! Provider side of the `ldap` interface.

use crate::error::Result;
use crate::events::{Effect, Notification, Outcome, Trigger};
use crate::host::{Host, Leadership, Relation, RelationId, RelationStore, SecretStore, Side};
use crate::schema::{ProviderPayload, RequirerData, AUTH_METHOD_KEY, BIND_DN_KEY, BIND_PASSWORD_SECRET_KEY};
use crate::secret::{bind_account_secret_label, Secret, SecretContent, SecretString, PASSWORD_KEY};
use crate::DEFAULT_RELATION_NAME;
use tracing::{debug, info};

/// Publishes LDAP connection data to every requirer on an endpoint.
#[derive(Clone, Debug)]
pub struct LdapProvider {
    relation_name: String,
}

impl Default for LdapProvider {
    fn default() -> Self {
        Self::new(DEFAULT_RELATION_NAME)
    }
}

impl LdapProvider {
    pub fn new(relation_name: impl Into<String>) -> Self {
        Self {
            relation_name: relation_name.into(),
        }
    }

    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    /// Dispatch a relation callback.
    pub fn handle<S: RelationStore + ?Sized>(
        &self,
        trigger: Trigger,
        relation: &Relation,
        leadership: Leadership,
        store: &S,
    ) -> Result<Outcome> {
        match trigger {
            Trigger::Created => Ok(Outcome::none()),
            Trigger::Changed => self.on_relation_changed(relation, leadership, store),
            Trigger::Broken => Ok(self.on_relation_broken(relation, leadership)),
        }
    }

    /// The requirer wrote (or rewrote) its identity.
    pub fn on_relation_changed<S: RelationStore + ?Sized>(
        &self,
        relation: &Relation,
        leadership: Leadership,
        store: &S,
    ) -> Result<Outcome> {
        if !leadership.is_leader() {
            return Ok(Outcome::none());
        }

        let bag = store.read(relation.id, Side::Remote)?;
        let data = if bag.is_empty() {
            None
        } else {
            Some(RequirerData::from_databag(&bag)?)
        };

        Ok(Outcome::none().with(Effect::Notify(Notification::Requested {
            relation: relation.clone(),
            data,
        })))
    }

    /// Revoke the bind account secret of a torn down relation.
    pub fn on_relation_broken(&self, relation: &Relation, leadership: Leadership) -> Outcome {
        if !leadership.is_leader() {
            return Outcome::none();
        }

        Outcome::none().with(Effect::RemoveSecret {
            label: bind_account_secret_label(relation.id),
        })
    }

    /// Publish `payload` to one relation, or to every relation when
    /// `relation_id` is `None`.
    ///
    /// Credentials are stored in a per-relation secret granted to that
    /// relation; only the secret URI is written to the databag. Publishing
    /// base data clears earlier credentials and revokes their secret.
    pub fn publish<H: Host + ?Sized>(
        &self,
        host: &mut H,
        leadership: Leadership,
        payload: impl Into<ProviderPayload>,
        relation_id: Option<RelationId>,
    ) -> Result<()> {
        if !leadership.is_leader() {
            debug!("Not the leader, skipping publish");
            return Ok(());
        }

        let relations: Vec<Relation> = host
            .relations(&self.relation_name)
            .into_iter()
            .filter(|r| relation_id.is_none_or(|id| r.id == id))
            .collect();

        if relations.is_empty() {
            debug!(relation_id = ?relation_id, "No relation to publish to");
            return Ok(());
        }

        let payload = payload.into();
        for relation in &relations {
            let bag = match &payload {
                ProviderPayload::Base(data) => {
                    if let Some(secret) = Secret::fetch(&*host, &bind_account_secret_label(relation.id))? {
                        secret.remove(&mut *host)?;
                    }
                    let mut bag = data.to_databag();
                    for key in [BIND_DN_KEY, BIND_PASSWORD_SECRET_KEY, AUTH_METHOD_KEY] {
                        bag.insert(key.to_string(), String::new());
                    }
                    bag
                }
                ProviderPayload::WithCredentials(data) => {
                    let secret = Secret::create_or_update(
                        host,
                        &bind_account_secret_label(relation.id),
                        SecretContent::password(data.bind_password()),
                    )?;
                    secret.grant(host, relation.id)?;
                    data.clone().with_bind_password_secret(secret.uri()).to_databag()
                }
            };
            host.update(relation.id, &bag)?;
            info!(
                relation_id = %relation.id,
                remote_app = %relation.app,
                credentials = matches!(payload, ProviderPayload::WithCredentials(_)),
                "Published LDAP data"
            );
        }
        Ok(())
    }

    /// Current bind password of a relation, read back from its secret.
    pub fn get_bind_password<S: SecretStore + ?Sized>(
        &self,
        store: &S,
        relation_id: RelationId,
    ) -> Result<Option<SecretString>> {
        match Secret::fetch(store, &bind_account_secret_label(relation_id))? {
            Some(secret) => Ok(secret.content(store)?.get(PASSWORD_KEY)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryModel;
    use crate::schema::{AuthMethod, ProviderBaseData, ProviderData, BIND_PASSWORD_KEY};

    fn payload(password: &str) -> ProviderData {
        let base = ProviderBaseData::new(vec!["ldap://x".into()], "dc=x", true).unwrap();
        ProviderData::new(base, "cn=admin", password, AuthMethod::Simple).unwrap()
    }

    #[test]
    fn test_publish_routes_password_through_secret() {
        let mut model = MemoryModel::new("m");
        let id = model.relate("ldap", "glauth", "app");
        let provider = LdapProvider::default();

        provider
            .publish(&mut model.as_app("glauth"), Leadership::Leader, payload("secret1"), Some(id))
            .unwrap();

        let bag = model.databag(id, "glauth").unwrap();
        assert!(!bag.contains_key(BIND_PASSWORD_KEY));
        let uri = bag[BIND_PASSWORD_SECRET_KEY].clone();
        assert_eq!(model.secret_uri("glauth", "bind-account-secret-for-0"), Some(uri.as_str()));

        let password = provider.get_bind_password(&model.as_app("glauth"), id).unwrap().unwrap();
        assert_eq!(password.expose(), "secret1");
    }

    #[test]
    fn test_republish_rotates_same_secret() {
        let mut model = MemoryModel::new("m");
        let id = model.relate("ldap", "glauth", "app");
        let provider = LdapProvider::default();

        let mut view = model.as_app("glauth");
        provider.publish(&mut view, Leadership::Leader, payload("one"), Some(id)).unwrap();
        provider.publish(&mut view, Leadership::Leader, payload("two"), Some(id)).unwrap();
        let password = provider.get_bind_password(&view, id).unwrap().unwrap();

        assert_eq!(password.expose(), "two");
        assert_eq!(model.secret_count(), 1);
    }

    #[test]
    fn test_follower_never_writes() {
        let mut model = MemoryModel::new("m");
        let id = model.relate("ldap", "glauth", "app");
        let provider = LdapProvider::default();

        provider
            .publish(&mut model.as_app("glauth"), Leadership::Follower, payload("pw"), Some(id))
            .unwrap();
        provider
            .publish(&mut model.as_app("glauth"), Leadership::Follower, payload("pw"), None)
            .unwrap();

        assert_eq!(model.mutations(), 0);
        assert!(model.databag(id, "glauth").is_none());
        assert_eq!(model.secret_count(), 0);
    }

    #[test]
    fn test_broadcast_reaches_every_relation() {
        let mut model = MemoryModel::new("m");
        let a = model.relate("ldap", "glauth", "a");
        let b = model.relate("ldap", "glauth", "b");
        let provider = LdapProvider::default();

        let base = ProviderBaseData::new(vec!["ldap://x".into()], "dc=x", false).unwrap();
        provider.publish(&mut model.as_app("glauth"), Leadership::Leader, base.clone(), None).unwrap();

        for id in [a, b] {
            let bag = model.databag(id, "glauth").unwrap();
            assert_eq!(ProviderBaseData::from_databag(bag).unwrap(), base);
        }
        assert_eq!(model.secret_count(), 0);

        provider.publish(&mut model.as_app("glauth"), Leadership::Leader, payload("pw"), None).unwrap();
        assert_eq!(model.secret_count(), 2);
        assert_ne!(
            model.databag(a, "glauth").unwrap()[BIND_PASSWORD_SECRET_KEY],
            model.databag(b, "glauth").unwrap()[BIND_PASSWORD_SECRET_KEY]
        );
    }

    #[test]
    fn test_base_publish_drops_earlier_credentials() {
        let mut model = MemoryModel::new("m");
        let id = model.relate("ldap", "glauth", "app");
        let provider = LdapProvider::default();

        provider.publish(&mut model.as_app("glauth"), Leadership::Leader, payload("pw"), Some(id)).unwrap();
        assert_eq!(model.secret_count(), 1);

        let base = ProviderBaseData::new(vec!["ldap://y".into()], "dc=y", false).unwrap();
        provider.publish(&mut model.as_app("glauth"), Leadership::Leader, base.clone(), Some(id)).unwrap();

        let bag = model.databag(id, "glauth").unwrap();
        assert_eq!(bag, &base.to_databag());
        assert!(!bag.contains_key(BIND_PASSWORD_SECRET_KEY));
        assert_eq!(model.secret_count(), 0);
    }

    #[test]
    fn test_publish_to_single_relation() {
        let mut model = MemoryModel::new("m");
        let a = model.relate("ldap", "glauth", "a");
        let b = model.relate("ldap", "glauth", "b");
        let provider = LdapProvider::default();

        provider.publish(&mut model.as_app("glauth"), Leadership::Leader, payload("pw"), Some(b)).unwrap();

        assert!(model.databag(a, "glauth").is_none());
        assert!(model.databag(b, "glauth").is_some());

        // Unknown relation is a no-op.
        provider
            .publish(&mut model.as_app("glauth"), Leadership::Leader, payload("pw"), Some(RelationId(42)))
            .unwrap();
        assert_eq!(model.secret_count(), 1);
    }

    #[test]
    fn test_changed_emits_requested_with_identity() {
        let mut model = MemoryModel::new("m");
        let id = model.relate("ldap", "glauth", "app");
        let identity = RequirerData::new("app", "m").unwrap();
        model.as_app("app").update(id, &identity.to_databag()).unwrap();

        let provider = LdapProvider::default();
        let view = model.as_app("glauth");
        let relation = view.relation("ldap", id).unwrap();

        let outcome = provider.handle(Trigger::Changed, &relation, Leadership::Leader, &view).unwrap();
        let notifications: Vec<_> = outcome.notifications().cloned().collect();
        assert_eq!(
            notifications,
            vec![Notification::Requested {
                relation: relation.clone(),
                data: Some(identity),
            }]
        );

        let outcome = provider.handle(Trigger::Changed, &relation, Leadership::Follower, &view).unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_changed_with_malformed_identity_fails() {
        let mut model = MemoryModel::new("m");
        let id = model.relate("ldap", "glauth", "app");
        model
            .as_app("app")
            .update(id, &[("user".to_string(), "app".to_string())].into())
            .unwrap();

        let view = model.as_app("glauth");
        let relation = view.relation("ldap", id).unwrap();
        let err = LdapProvider::default()
            .on_relation_changed(&relation, Leadership::Leader, &view)
            .unwrap_err();
        assert!(matches!(err, crate::Error::Validation(_)));
    }

    #[test]
    fn test_broken_removes_secret() {
        let mut model = MemoryModel::new("m");
        let id = model.relate("ldap", "glauth", "app");
        let provider = LdapProvider::default();
        let mut view = model.as_app("glauth");
        provider.publish(&mut view, Leadership::Leader, payload("pw"), Some(id)).unwrap();
        let relation = view.relation("ldap", id).unwrap();

        let outcome = provider.on_relation_broken(&relation, Leadership::Leader);
        assert!(outcome.apply(&mut view).unwrap().is_empty());
        assert!(provider.get_bind_password(&view, id).unwrap().is_none());

        // Nothing left to remove: still fine.
        provider.on_relation_broken(&relation, Leadership::Leader).apply(&mut view).unwrap();
        assert_eq!(model.secret_count(), 0);
    }
}
