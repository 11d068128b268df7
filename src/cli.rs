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

//! CLI argument definitions.

use clap::{Parser, Subcommand};

/// LDAP integrator - publishes LDAP connection data over the `ldap` interface
#[derive(Parser, Debug)]
#[command(name = "ldap-integrator")]
#[command(about = "LDAP integrator\n\nPublishes operator-supplied LDAP connection data to every application related over `ldap`.")]
#[command(version)]
pub struct Cli {
    // === General ===
    /// Enable debug mode (human-readable logs)
    #[arg(long, env = "LDAP_INTEGRATOR_DEBUG", default_value = "false")]
    pub debug: bool,

    /// Log level
    #[arg(long, env = "LDAP_INTEGRATOR_LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    // === Host ===
    /// Path to the host state file (relations, databags, secrets)
    #[arg(long, env = "LDAP_INTEGRATOR_STATE", default_value = "./state.json")]
    pub state: String,

    /// Name of this application in the model
    #[arg(long, env = "LDAP_INTEGRATOR_APP_NAME", default_value = "ldap-integrator")]
    pub app_name: String,

    /// Whether this unit is the elected leader
    #[arg(long, env = "LDAP_INTEGRATOR_LEADER", default_value = "false")]
    pub leader: bool,

    // === LDAP configuration ===
    /// Comma-separated LDAP server URLs (ldap://...)
    #[arg(long, env = "LDAP_INTEGRATOR_URLS")]
    pub urls: Option<String>,

    /// Base DN
    #[arg(long, env = "LDAP_INTEGRATOR_BASE_DN")]
    pub base_dn: Option<String>,

    /// Whether clients should use StartTLS
    #[arg(long, env = "LDAP_INTEGRATOR_STARTTLS")]
    pub starttls: Option<bool>,

    /// Bind DN
    #[arg(long, env = "LDAP_INTEGRATOR_BIND_DN")]
    pub bind_dn: Option<String>,

    /// Bind password
    #[arg(long, env = "LDAP_INTEGRATOR_BIND_PASSWORD", hide_env_values = true)]
    pub bind_password: Option<String>,

    /// Bind authentication method
    #[arg(long, env = "LDAP_INTEGRATOR_AUTH_METHOD", default_value = "simple")]
    pub auth_method: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run one host hook against the state file
    Hook {
        /// Hook name, e.g. config-changed or ldap-relation-changed
        name: String,

        /// Relation id, required for relation hooks
        #[arg(long)]
        relation_id: Option<u64>,
    },

    /// Print the current status without running a hook
    Status,
}
