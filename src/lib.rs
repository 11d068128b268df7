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

//! LDAP integrator.
//!
//! Publishes operator-supplied LDAP connection data to every application
//! related over the `ldap` interface, and reports whether it can.

// Interface re-export
pub mod interface {
    pub use ldap_interface::*;
}

// Core modules
pub mod cli;
pub mod config;
pub mod error;

// Integrator
pub mod charm;
pub mod status;

// Host state
pub mod state;

// Public API
pub use charm::{Hook, HookReport, LdapIntegrator};
pub use cli::{Cli, Command};
pub use config::{Config, LdapConfig};
pub use error::{Error, Result};
pub use state::StateFile;
pub use status::Status;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
