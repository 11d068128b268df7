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

//! Payloads exchanged over the `ldap` relation.
//!
//! Databags only hold strings. Booleans are written as `True`/`False` and
//! read back case-insensitively; the URL list is a JSON array string. The
//! plaintext bind password is never written by [`ProviderData::to_databag`];
//! the provider routes it through a secret instead.

use crate::error::ValidationError;
use crate::host::Databag;
use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Scheme every LDAP URL must start with.
pub const LDAP_URL_PREFIX: &str = "ldap://";

pub const URLS_KEY: &str = "urls";
pub const LEGACY_URL_KEY: &str = "url";
pub const BASE_DN_KEY: &str = "base_dn";
pub const STARTTLS_KEY: &str = "starttls";
pub const BIND_DN_KEY: &str = "bind_dn";
pub const BIND_PASSWORD_KEY: &str = "bind_password";
pub const BIND_PASSWORD_SECRET_KEY: &str = "bind_password_secret";
pub const AUTH_METHOD_KEY: &str = "auth_method";
pub const USER_KEY: &str = "user";
pub const GROUP_KEY: &str = "group";

/// Supported bind authentication methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    #[default]
    Simple,
}

impl AuthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::Simple => "simple",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(AuthMethod::Simple),
            other => Err(ValidationError::UnsupportedAuthMethod(other.to_string())),
        }
    }
}

/// Read access to a databag where empty values count as missing.
struct Fields<'a>(&'a Databag);

impl<'a> Fields<'a> {
    fn optional(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<&'a str, ValidationError> {
        self.optional(key).ok_or(ValidationError::MissingField(key))
    }
}

fn validate_urls(urls: &[String]) -> Result<(), ValidationError> {
    if urls.is_empty() {
        return Err(ValidationError::NoUrls);
    }
    match urls.iter().find(|url| !url.starts_with(LDAP_URL_PREFIX)) {
        Some(bad) => Err(ValidationError::InvalidUrlScheme(bad.clone())),
        None => Ok(()),
    }
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ValidationError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ValidationError::InvalidBool {
            field,
            value: value.to_string(),
        })
    }
}

fn format_bool(value: bool) -> String {
    let literal = if value { "True" } else { "False" };
    literal.to_string()
}

fn parse_urls(fields: &Fields<'_>) -> Result<Vec<String>, ValidationError> {
    if let Some(raw) = fields.optional(URLS_KEY) {
        return serde_json::from_str(raw).map_err(|e| ValidationError::Malformed {
            field: URLS_KEY,
            reason: e.to_string(),
        });
    }

    // Databags written before the list shape carry a single `url`.
    if let Some(url) = fields.optional(LEGACY_URL_KEY) {
        warn!(url = %url, "Reading legacy single `url` key; provider should publish `urls`");
        return Ok(vec![url.to_string()]);
    }

    Err(ValidationError::MissingField(URLS_KEY))
}

fn format_urls(urls: &[String]) -> String {
    serde_json::Value::from(urls.to_vec()).to_string()
}

/// Server location part of the provider payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderBaseData {
    urls: Vec<String>,
    base_dn: String,
    starttls: bool,
}

impl ProviderBaseData {
    pub fn new(
        urls: Vec<String>,
        base_dn: impl Into<String>,
        starttls: bool,
    ) -> Result<Self, ValidationError> {
        validate_urls(&urls)?;
        let base_dn = base_dn.into();
        if base_dn.is_empty() {
            return Err(ValidationError::MissingField(BASE_DN_KEY));
        }
        Ok(Self {
            urls,
            base_dn,
            starttls,
        })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    pub fn starttls(&self) -> bool {
        self.starttls
    }

    pub fn to_databag(&self) -> Databag {
        let mut bag = Databag::new();
        bag.insert(URLS_KEY.to_string(), format_urls(&self.urls));
        bag.insert(BASE_DN_KEY.to_string(), self.base_dn.clone());
        bag.insert(STARTTLS_KEY.to_string(), format_bool(self.starttls));
        bag
    }

    pub fn from_databag(bag: &Databag) -> Result<Self, ValidationError> {
        let fields = Fields(bag);
        let urls = parse_urls(&fields)?;
        let base_dn = fields.required(BASE_DN_KEY)?;
        let starttls = parse_bool(STARTTLS_KEY, fields.required(STARTTLS_KEY)?)?;
        Self::new(urls, base_dn, starttls)
    }
}

/// Full provider payload, including the bind account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderData {
    base: ProviderBaseData,
    bind_dn: String,
    bind_password: SecretString,
    bind_password_secret: Option<String>,
    auth_method: AuthMethod,
}

impl ProviderData {
    pub fn new(
        base: ProviderBaseData,
        bind_dn: impl Into<String>,
        bind_password: impl Into<SecretString>,
        auth_method: AuthMethod,
    ) -> Result<Self, ValidationError> {
        let bind_dn = bind_dn.into();
        if bind_dn.is_empty() {
            return Err(ValidationError::MissingField(BIND_DN_KEY));
        }
        Ok(Self {
            base,
            bind_dn,
            bind_password: bind_password.into(),
            bind_password_secret: None,
            auth_method,
        })
    }

    pub fn base(&self) -> &ProviderBaseData {
        &self.base
    }

    pub fn urls(&self) -> &[String] {
        self.base.urls()
    }

    pub fn base_dn(&self) -> &str {
        self.base.base_dn()
    }

    pub fn starttls(&self) -> bool {
        self.base.starttls()
    }

    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    pub fn bind_password(&self) -> &SecretString {
        &self.bind_password
    }

    /// URI of the secret holding the password, once persisted
    pub fn bind_password_secret(&self) -> Option<&str> {
        self.bind_password_secret.as_deref()
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    pub(crate) fn with_bind_password_secret(mut self, uri: impl Into<String>) -> Self {
        self.bind_password_secret = Some(uri.into());
        self
    }

    /// Wire form. The plaintext password is left out.
    pub fn to_databag(&self) -> Databag {
        let mut bag = self.base.to_databag();
        bag.insert(BIND_DN_KEY.to_string(), self.bind_dn.clone());
        bag.insert(AUTH_METHOD_KEY.to_string(), self.auth_method.to_string());
        if let Some(uri) = &self.bind_password_secret {
            bag.insert(BIND_PASSWORD_SECRET_KEY.to_string(), uri.clone());
        }
        bag
    }

    /// Parse a databag that already carries the plaintext `bind_password`.
    pub fn from_databag(bag: &Databag) -> Result<Self, ValidationError> {
        let base = ProviderBaseData::from_databag(bag)?;
        let fields = Fields(bag);
        let bind_dn = fields.required(BIND_DN_KEY)?;
        let bind_password = fields.required(BIND_PASSWORD_KEY)?;
        let auth_method = fields.required(AUTH_METHOD_KEY)?.parse()?;

        let data = Self::new(base, bind_dn, bind_password, auth_method)?;
        Ok(match fields.optional(BIND_PASSWORD_SECRET_KEY) {
            Some(uri) => data.with_bind_password_secret(uri),
            None => data,
        })
    }
}

/// What a provider may publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderPayload {
    /// Server location only
    Base(ProviderBaseData),
    /// Server location plus bind account
    WithCredentials(ProviderData),
}

impl From<ProviderBaseData> for ProviderPayload {
    fn from(data: ProviderBaseData) -> Self {
        ProviderPayload::Base(data)
    }
}

impl From<ProviderData> for ProviderPayload {
    fn from(data: ProviderData) -> Self {
        ProviderPayload::WithCredentials(data)
    }
}

/// Identity the requirer asks the provider to serve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirerData {
    user: String,
    group: String,
}

impl RequirerData {
    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Result<Self, ValidationError> {
        let user = user.into();
        let group = group.into();
        if user.is_empty() {
            return Err(ValidationError::MissingField(USER_KEY));
        }
        if group.is_empty() {
            return Err(ValidationError::MissingField(GROUP_KEY));
        }
        Ok(Self { user, group })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn to_databag(&self) -> Databag {
        let mut bag = Databag::new();
        bag.insert(USER_KEY.to_string(), self.user.clone());
        bag.insert(GROUP_KEY.to_string(), self.group.clone());
        bag
    }

    pub fn from_databag(bag: &Databag) -> Result<Self, ValidationError> {
        let fields = Fields(bag);
        Self::new(fields.required(USER_KEY)?, fields.required(GROUP_KEY)?)
    }
}
