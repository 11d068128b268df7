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

//! Error types.

use std::fmt;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Integrator error types
#[derive(Debug)]
pub enum Error {
    /// Configuration error
    Config(String),

    /// Hook not handled by the integrator
    UnknownHook(String),

    /// Interface (schema, secret or relation) error
    Interface(ldap_interface::Error),

    /// State file error
    State(String),

    /// IO error
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::UnknownHook(hook) => write!(f, "unknown hook: {}", hook),
            Error::Interface(e) => write!(f, "ldap interface error: {}", e),
            Error::State(msg) => write!(f, "state error: {}", msg),
            Error::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Interface(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ldap_interface::Error> for Error {
    fn from(e: ldap_interface::Error) -> Self {
        Error::Interface(e)
    }
}

impl From<ldap_interface::ValidationError> for Error {
    fn from(e: ldap_interface::ValidationError) -> Self {
        Error::Interface(e.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::State(e.to_string())
    }
}
