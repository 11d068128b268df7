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

//! Requirer side of the `ldap` interface.

use crate::error::{Error, Result};
use crate::events::{Effect, Notification, Outcome, Trigger};
use crate::host::{Host, Leadership, Relation, RelationId, RelationStore, Side};
use crate::schema::{ProviderData, RequirerData, BIND_PASSWORD_KEY, BIND_PASSWORD_SECRET_KEY};
use crate::secret::{Secret, PASSWORD_KEY};
use crate::DEFAULT_RELATION_NAME;
use tracing::{debug, info};

/// Consumes LDAP connection data published by a provider.
#[derive(Clone, Debug)]
pub struct LdapRequirer {
    relation_name: String,
    data: Option<RequirerData>,
}

impl Default for LdapRequirer {
    fn default() -> Self {
        Self::new(DEFAULT_RELATION_NAME)
    }
}

impl LdapRequirer {
    pub fn new(relation_name: impl Into<String>) -> Self {
        Self {
            relation_name: relation_name.into(),
            data: None,
        }
    }

    /// Request an explicit identity instead of the application and model names.
    pub fn with_data(mut self, data: RequirerData) -> Self {
        self.data = Some(data);
        self
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
            Trigger::Created => self.on_relation_created(relation, leadership, store),
            Trigger::Changed => self.on_relation_changed(relation, store),
            Trigger::Broken => Ok(self.on_relation_broken(relation)),
        }
    }

    /// Write the requested identity into our databag.
    pub fn on_relation_created<S: RelationStore + ?Sized>(
        &self,
        relation: &Relation,
        leadership: Leadership,
        store: &S,
    ) -> Result<Outcome> {
        if !leadership.is_leader() {
            return Ok(Outcome::none());
        }

        let identity = match &self.data {
            Some(data) => data.clone(),
            None => RequirerData::new(store.app_name(), store.model_name())?,
        };
        debug!(relation_id = %relation.id, user = %identity.user(), group = %identity.group(), "Requesting LDAP identity");

        Ok(Outcome::none().with(Effect::UpdateDatabag {
            relation_id: relation.id,
            data: identity.to_databag(),
        }))
    }

    /// Emit `ready` once the provider has written something.
    pub fn on_relation_changed<S: RelationStore + ?Sized>(
        &self,
        relation: &Relation,
        store: &S,
    ) -> Result<Outcome> {
        if store.read(relation.id, Side::Remote)?.is_empty() {
            debug!(relation_id = %relation.id, "Provider data not yet available");
            return Ok(Outcome::none());
        }

        Ok(Outcome::none().with(Effect::Notify(Notification::Ready {
            relation: relation.clone(),
        })))
    }

    pub fn on_relation_broken(&self, relation: &Relation) -> Outcome {
        Outcome::none().with(Effect::Notify(Notification::Unavailable {
            relation: relation.clone(),
        }))
    }

    /// Resolve `relation_id`, or the only relation when `None`.
    fn resolve<S: RelationStore + ?Sized>(&self, store: &S, relation_id: Option<RelationId>) -> Option<Relation> {
        match relation_id {
            Some(id) => store.relation(&self.relation_name, id),
            None => {
                let mut relations = store.relations(&self.relation_name);
                if relations.len() == 1 { relations.pop() } else { None }
            }
        }
    }

    /// Read the provider data of a relation, dereferencing the bind password.
    ///
    /// Returns `None` when the relation cannot be resolved or the provider has
    /// not written anything yet.
    pub fn fetch<H: Host + ?Sized>(&self, host: &H, relation_id: Option<RelationId>) -> Result<Option<ProviderData>> {
        let Some(relation) = self.resolve(host, relation_id) else {
            debug!(relation_id = ?relation_id, "No LDAP relation to read from");
            return Ok(None);
        };

        let mut bag = host.read(relation.id, Side::Remote)?;
        if bag.is_empty() {
            return Ok(None);
        }

        if let Some(uri) = bag.remove(BIND_PASSWORD_SECRET_KEY).filter(|u| !u.is_empty()) {
            let handle = host.fetch_by_uri(&uri)?.ok_or_else(|| Error::SecretNotFound(uri.clone()))?;
            let password = Secret::from_handle(handle)
                .content(host)?
                .get(PASSWORD_KEY)
                .ok_or_else(|| Error::SecretNotFound(format!("{} has no {}", uri, PASSWORD_KEY)))?;
            bag.insert(BIND_PASSWORD_KEY.to_string(), password.expose().to_string());
        }

        let data = ProviderData::from_databag(&bag)?;
        info!(relation_id = %relation.id, remote_app = %relation.app, "Fetched LDAP data");
        Ok(Some(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryModel;
    use crate::provider::LdapProvider;
    use crate::schema::{AuthMethod, ProviderBaseData};

    fn payload() -> ProviderData {
        let base = ProviderBaseData::new(vec!["ldap://x".into()], "dc=x", true).unwrap();
        ProviderData::new(base, "cn=admin", "secret1", AuthMethod::Simple).unwrap()
    }

    #[test]
    fn test_created_writes_default_identity() {
        let mut model = MemoryModel::new("dev");
        let id = model.relate("ldap", "glauth", "grafana");
        let mut view = model.as_app("grafana");
        let relation = view.relation("ldap", id).unwrap();

        let outcome = LdapRequirer::default()
            .handle(Trigger::Created, &relation, Leadership::Leader, &view)
            .unwrap();
        outcome.apply(&mut view).unwrap();

        let bag = model.databag(id, "grafana").unwrap();
        assert_eq!(bag["user"], "grafana");
        assert_eq!(bag["group"], "dev");
    }

    #[test]
    fn test_created_writes_configured_identity() {
        let mut model = MemoryModel::new("dev");
        let id = model.relate("ldap", "glauth", "grafana");
        let view = model.as_app("grafana");
        let relation = view.relation("ldap", id).unwrap();

        let requirer = LdapRequirer::default().with_data(RequirerData::new("svc", "admins").unwrap());
        let outcome = requirer.on_relation_created(&relation, Leadership::Leader, &view).unwrap();
        let writes: Vec<_> = outcome.writes().collect();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1["user"], "svc");
        assert_eq!(writes[0].1["group"], "admins");
    }

    #[test]
    fn test_follower_does_not_write_identity() {
        let mut model = MemoryModel::new("dev");
        let id = model.relate("ldap", "glauth", "grafana");
        let view = model.as_app("grafana");
        let relation = view.relation("ldap", id).unwrap();

        let outcome = LdapRequirer::default()
            .on_relation_created(&relation, Leadership::Follower, &view)
            .unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_changed_waits_for_provider() {
        let mut model = MemoryModel::new("dev");
        let id = model.relate("ldap", "glauth", "grafana");
        let requirer = LdapRequirer::default();

        let view = model.as_app("grafana");
        let relation = view.relation("ldap", id).unwrap();
        assert!(requirer.on_relation_changed(&relation, &view).unwrap().is_empty());

        LdapProvider::default()
            .publish(&mut model.as_app("glauth"), Leadership::Leader, payload(), Some(id))
            .unwrap();

        let view = model.as_app("grafana");
        let outcome = requirer.on_relation_changed(&relation, &view).unwrap();
        assert_eq!(
            outcome.notifications().collect::<Vec<_>>(),
            vec![&Notification::Ready { relation: relation.clone() }]
        );
    }

    #[test]
    fn test_broken_emits_unavailable() {
        let relation = Relation {
            id: RelationId(3),
            name: "ldap".into(),
            app: "glauth".into(),
        };
        let outcome = LdapRequirer::default().on_relation_broken(&relation);
        assert_eq!(
            outcome.notifications().collect::<Vec<_>>(),
            vec![&Notification::Unavailable { relation: relation.clone() }]
        );
    }

    #[test]
    fn test_fetch_dereferences_secret() {
        let mut model = MemoryModel::new("dev");
        let id = model.relate("ldap", "glauth", "grafana");
        LdapProvider::default()
            .publish(&mut model.as_app("glauth"), Leadership::Leader, payload(), Some(id))
            .unwrap();

        let data = LdapRequirer::default().fetch(&model.as_app("grafana"), None).unwrap().unwrap();
        assert_eq!(data.bind_password().expose(), "secret1");
        assert_eq!(data.bind_password_secret(), None);
        assert_eq!(data.urls(), ["ldap://x".to_string()]);
    }

    #[test]
    fn test_fetch_absent_and_ambiguous() {
        let mut model = MemoryModel::new("dev");
        let requirer = LdapRequirer::default();
        assert!(requirer.fetch(&model.as_app("grafana"), None).unwrap().is_none());

        let a = model.relate("ldap", "glauth", "grafana");
        assert!(requirer.fetch(&model.as_app("grafana"), Some(a)).unwrap().is_none());

        let b = model.relate("ldap", "other-ldap", "grafana");
        LdapProvider::default()
            .publish(&mut model.as_app("glauth"), Leadership::Leader, payload(), Some(a))
            .unwrap();
        assert!(requirer.fetch(&model.as_app("grafana"), None).unwrap().is_none());
        assert!(requirer.fetch(&model.as_app("grafana"), Some(a)).unwrap().is_some());
        assert!(requirer.fetch(&model.as_app("grafana"), Some(b)).unwrap().is_none());
    }

    #[test]
    fn test_fetch_malformed_data_fails() {
        let mut model = MemoryModel::new("dev");
        let id = model.relate("ldap", "glauth", "grafana");
        model
            .as_app("glauth")
            .update(id, &[("urls".to_string(), r#"["http://x"]"#.to_string())].into())
            .unwrap();

        let err = LdapRequirer::default().fetch(&model.as_app("grafana"), Some(id)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_fetch_dangling_secret_reference_fails() {
        let mut model = MemoryModel::new("dev");
        let id = model.relate("ldap", "glauth", "grafana");
        let mut bag = payload().to_databag();
        bag.insert(BIND_PASSWORD_SECRET_KEY.to_string(), "secret:gone".to_string());
        model.as_app("glauth").update(id, &bag).unwrap();

        let err = LdapRequirer::default().fetch(&model.as_app("grafana"), Some(id)).unwrap_err();
        assert!(matches!(err, Error::SecretNotFound(_)));
    }
}
