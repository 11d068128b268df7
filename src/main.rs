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

use clap::Parser;
use ldap_integrator::interface::{RelationId, DEFAULT_RELATION_NAME};
use ldap_integrator::{Cli, Command, Config, Hook, LdapIntegrator, StateFile, version};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI args (also reads env vars via clap)
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for the JSON report
    let log_level = if cli.debug { "DEBUG" } else { &cli.log_level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cli.debug {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .pretty()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    }

    let command = cli.command.clone();

    // Convert CLI to Config
    let config = match Config::try_from(cli) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    info!(
        version = version(),
        app = %config.app_name,
        leader = config.leadership.is_leader(),
        debug = config.debug,
        log_level = %config.log_level,
        "Starting LDAP integrator"
    );

    if let Err(e) = run(config, command) {
        error!(error = %e, "Hook failed");
        std::process::exit(1);
    }
}

fn run(config: Config, command: Command) -> ldap_integrator::Result<()> {
    let mut state = StateFile::load(&config.state_path)?;
    let integrator = LdapIntegrator::new(config.ldap, config.leadership);

    let output = match command {
        Command::Hook { name, relation_id } => {
            let hook = Hook::parse(&name, relation_id.map(RelationId), DEFAULT_RELATION_NAME)?;
            let report = state.run_hook(&integrator, &config.app_name, hook)?;
            state.save()?;
            serde_json::to_string_pretty(&report)?
        }
        Command::Status => {
            let status = state.status(&integrator, &config.app_name);
            serde_json::to_string_pretty(&status)?
        }
    };

    println!("{}", output);
    Ok(())
}
