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

//! File-backed host state.
//!
//! The host model (relations, databags, secrets) is kept in a JSON file
//! between invocations. Each invocation loads it, runs one hook as the local
//! application and writes it back.

use crate::charm::{Hook, HookReport, LdapIntegrator};
use crate::error::{Error, Result};
use ldap_interface::MemoryModel;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Host model persisted in a JSON file.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    model: MemoryModel,
}

impl StateFile {
    /// Load an existing state file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = fs::read_to_string(&path)
            .map_err(|e| Error::State(format!("Cannot read {}: {}", path.display(), e)))?;
        let model: MemoryModel = serde_json::from_str(&raw)
            .map_err(|e| Error::State(format!("Invalid state file {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), model = %model.name(), "Loaded state");
        Ok(Self { path, model })
    }

    /// Wrap a model that will be written to `path` on save.
    pub fn new(path: impl Into<PathBuf>, model: MemoryModel) -> Self {
        Self {
            path: path.into(),
            model,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> &MemoryModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut MemoryModel {
        &mut self.model
    }

    /// Write the model back, replacing the file atomically.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.model)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Saved state");
        Ok(())
    }

    /// Run `hook` as `app` against the model.
    ///
    /// Relation hooks are checked against the delivery order first and
    /// recorded once the handler succeeded.
    pub fn run_hook(&mut self, integrator: &LdapIntegrator, app: &str, hook: Hook) -> Result<HookReport> {
        if let Hook::Relation(trigger, id) = hook {
            self.model.check_delivery(id, app, trigger)?;
        }

        let mut report = integrator.dispatch(&mut self.model.as_app(app), hook)?;

        // A relation is gone for `app` once its broken is recorded.
        if let Hook::Relation(trigger, id) = hook {
            self.model.deliver(id, app, trigger)?;
            report.status = self.status(integrator, app);
        }

        info!(hook = %report.hook, published = report.published, status = %report.status, "Hook complete");
        Ok(report)
    }

    /// Status as seen by `app`, without running a hook.
    pub fn status(&mut self, integrator: &LdapIntegrator, app: &str) -> crate::status::Status {
        integrator.collect_status(&self.model.as_app(app))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LdapConfig;
    use ldap_interface::{Leadership, RelationId, Trigger};

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut model = MemoryModel::new("dev");
        model.relate("ldap", "ldap-integrator", "app");
        StateFile::new(&path, model).save().unwrap();

        let state = StateFile::load(&path).unwrap();
        assert_eq!(state.model().name(), "dev");
        assert_eq!(state.model().relation_ids(), vec![RelationId(0)]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StateFile::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[test]
    fn test_out_of_order_hook_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MemoryModel::new("dev");
        let id = model.relate("ldap", "ldap-integrator", "app");
        let mut state = StateFile::new(dir.path().join("state.json"), model);
        let integrator = LdapIntegrator::new(LdapConfig::default(), Leadership::Leader);

        let err = state
            .run_hook(&integrator, "ldap-integrator", Hook::Relation(Trigger::Changed, id))
            .unwrap_err();
        assert!(matches!(err, Error::Interface(ldap_interface::Error::Host(_))));

        state
            .run_hook(&integrator, "ldap-integrator", Hook::Relation(Trigger::Created, id))
            .unwrap();
        state
            .run_hook(&integrator, "ldap-integrator", Hook::Relation(Trigger::Changed, id))
            .unwrap();
    }
}
