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

//! Error types for the `ldap` interface.

use crate::host::RelationId;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// A payload that is present but malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid LDAP URL scheme: `{0}`")]
    InvalidUrlScheme(String),

    #[error("at least one LDAP URL is required")]
    NoUrls,

    #[error("unsupported auth method `{0}`")]
    UnsupportedAuthMethod(String),

    #[error("field `{field}` expects a boolean, got `{value}`")]
    InvalidBool { field: &'static str, value: String },

    #[error("field `{field}` is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },
}

/// Errors raised by the provider and requirer roles.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload failed validation
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A secret reference on the wire does not resolve
    #[error("secret not found: {0}")]
    SecretNotFound(String),

    /// The secret exists but this application may not read it
    #[error("permission denied on secret {uri} for application {app}")]
    PermissionDenied { uri: String, app: String },

    /// The host does not know the relation
    #[error("relation {0} not found")]
    RelationNotFound(RelationId),

    /// Any other failure reported by the host
    #[error("host error: {0}")]
    Host(String),
}
