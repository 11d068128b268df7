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

//! Configuration management.

use crate::cli::Cli;
use crate::error::{Error, Result};
use ldap_interface::{AuthMethod, Leadership, ProviderBaseData, ProviderData, SecretString};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Integrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub debug: bool,
    pub log_level: String,

    // Host
    pub state_path: PathBuf,
    pub app_name: String,
    pub leadership: Leadership,

    // LDAP
    pub ldap: LdapConfig,
}

/// Operator-supplied LDAP settings. Any of them may be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapConfig {
    pub urls: Option<String>,
    pub base_dn: Option<String>,
    pub starttls: Option<bool>,
    pub bind_dn: Option<String>,
    pub bind_password: Option<SecretString>,
    pub auth_method: Option<String>,
}

impl LdapConfig {
    /// Keys that must be set before anything is published.
    pub const REQUIRED_KEYS: [&'static str; 5] = ["urls", "base_dn", "starttls", "bind_dn", "bind_password"];

    /// Required keys that are unset or empty.
    pub fn missing(&self) -> BTreeSet<&'static str> {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        Self::REQUIRED_KEYS
            .into_iter()
            .filter(|key| match *key {
                "urls" => !set(&self.urls),
                "base_dn" => !set(&self.base_dn),
                "starttls" => self.starttls.is_none(),
                "bind_dn" => !set(&self.bind_dn),
                "bind_password" => self.bind_password.as_ref().is_none_or(|p| p.is_empty()),
                _ => false,
            })
            .collect()
    }

    pub fn is_ready(&self) -> bool {
        self.missing().is_empty()
    }

    /// Server URLs, split on commas.
    pub fn url_list(&self) -> Vec<String> {
        self.urls
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Build the payload to publish.
    ///
    /// `Ok(None)` while configuration is incomplete; an error when it is
    /// complete but invalid.
    pub fn provider_data(&self) -> Result<Option<ProviderData>> {
        let (Some(base_dn), Some(starttls), Some(bind_dn), Some(password)) =
            (&self.base_dn, self.starttls, &self.bind_dn, &self.bind_password)
        else {
            return Ok(None);
        };
        if !self.is_ready() {
            return Ok(None);
        }

        let auth_method = match self.auth_method.as_deref() {
            Some(method) => method.parse()?,
            None => AuthMethod::default(),
        };
        let base = ProviderBaseData::new(self.url_list(), base_dn.trim(), starttls)?;
        Ok(Some(ProviderData::new(base, bind_dn.trim(), password.clone(), auth_method)?))
    }
}

impl TryFrom<Cli> for Config {
    type Error = Error;

    fn try_from(cli: Cli) -> Result<Self> {
        if cli.app_name.trim().is_empty() {
            return Err(Error::Config("Application name must not be empty".into()));
        }
        if cli.state.trim().is_empty() {
            return Err(Error::Config("State file path must not be empty".into()));
        }

        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        Ok(Self {
            debug: cli.debug,
            log_level: cli.log_level,
            state_path: PathBuf::from(cli.state),
            app_name: cli.app_name,
            leadership: Leadership::from(cli.leader),
            ldap: LdapConfig {
                urls: non_empty(cli.urls),
                base_dn: non_empty(cli.base_dn),
                starttls: cli.starttls,
                bind_dn: non_empty(cli.bind_dn),
                bind_password: non_empty(cli.bind_password).map(SecretString::from),
                auth_method: non_empty(Some(cli.auth_method)),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn complete() -> LdapConfig {
        LdapConfig {
            urls: Some("ldap://ldap.com/path/to/somewhere, ldap://backup.com".into()),
            base_dn: Some("dc=glauth,dc=com".into()),
            starttls: Some(true),
            bind_dn: Some("cn=user,ou=group,dc=glauth,dc=com".into()),
            bind_password: Some("password".into()),
            auth_method: Some("simple".into()),
        }
    }

    #[test]
    fn test_missing_config() {
        let empty = LdapConfig::default();
        assert_eq!(empty.missing(), LdapConfig::REQUIRED_KEYS.into_iter().collect::<BTreeSet<_>>());
        assert!(empty.provider_data().unwrap().is_none());

        let mut config = complete();
        config.bind_password = None;
        config.urls = Some(" ".into());
        assert_eq!(config.missing(), ["bind_password", "urls"].into_iter().collect::<BTreeSet<_>>());

        // StartTLS off is a value, not a missing key.
        let mut config = complete();
        config.starttls = Some(false);
        assert!(config.is_ready());
    }

    #[test]
    fn test_provider_data_from_config() {
        let data = complete().provider_data().unwrap().unwrap();
        assert_eq!(data.urls(), ["ldap://ldap.com/path/to/somewhere".to_string(), "ldap://backup.com".to_string()]);
        assert!(data.starttls());
        assert_eq!(data.bind_password().expose(), "password");
        assert_eq!(data.auth_method(), AuthMethod::Simple);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut config = complete();
        config.urls = Some("https://ldap.com".into());
        assert!(config.provider_data().is_err());

        let mut config = complete();
        config.auth_method = Some("kerberos".into());
        assert!(config.provider_data().is_err());
    }

    #[test]
    fn test_config_from_cli() {
        let cli = Cli::parse_from([
            "ldap-integrator",
            "--app-name",
            "ldap",
            "--leader",
            "--urls",
            "ldap://x",
            "--starttls",
            "false",
            "status",
        ]);
        let config = Config::try_from(cli).unwrap();

        assert_eq!(config.app_name, "ldap");
        assert!(config.leadership.is_leader());
        assert_eq!(config.ldap.starttls, Some(false));
        assert_eq!(config.ldap.bind_password, None);
        assert_eq!(config.ldap.auth_method.as_deref(), Some("simple"));
        assert!(!config.debug);
    }

    #[test]
    fn test_logging_settings_from_cli() {
        let cli = Cli::parse_from(["ldap-integrator", "--debug", "--log-level", "warn", "status"]);
        let config = Config::try_from(cli).unwrap();

        assert!(config.debug);
        assert_eq!(config.log_level, "warn");
    }
}
