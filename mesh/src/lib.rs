//! The cloudmesh deployment
//!
//! Six stacks composed against `cloudmesh-composer`: image registries, the
//! network, an ECS cluster, the Aurora database with its init machinery, the
//! migration tasks, and the mesh services. [`compose`] builds and validates
//! the whole app from a [`config::Config`].

pub mod config;
pub mod error;
pub mod logger;
pub mod stacks;

use composer::{App, Error, Naming};
use config::Config;

/// Compose and validate the full deployment
///
/// Stacks are registered provider-first, so every import resolves at
/// composition time. Validation covers the dependency graph and the
/// security-group reachability policy; nothing should be printed or
/// exported from an app that fails it.
pub fn compose(config: &Config) -> Result<App, Error> {
    let naming = Naming::new(config.system(), config.environment());
    let mut app = App::new(naming, config.tags().clone());

    app.add_stack(stacks::registries::stack(&app, config)?)?;
    app.add_stack(stacks::network::stack(&app, config)?)?;
    app.add_stack(stacks::cluster::stack(&app, config)?)?;
    app.add_stack(stacks::database::stack(&app, config)?)?;
    app.add_stack(stacks::migration::stack(&app, config)?)?;
    app.add_stack(stacks::services::stack(&app, config)?)?;

    app.validate()?;
    Ok(app)
}
