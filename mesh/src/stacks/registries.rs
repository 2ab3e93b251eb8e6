use crate::config::Config;
use crate::stacks::title;
use composer::constructs::{EcrRepository, EcrRepositoryParams};
use composer::{App, Error, Stack};

/// One image repository per service
///
/// URIs are exported so the task definitions can reference images without
/// hardcoding account or region.
pub fn stack(app: &App, config: &Config) -> Result<Stack, Error> {
    let mut stack = app.begin_stack("registries");

    for service in config.services() {
        let scope = title(&service.name);
        let name = format!("{}-service", service.name);

        let repository = EcrRepository::new(
            &mut stack,
            &format!("{scope}Service"),
            EcrRepositoryParams {
                name: &name,
                prod_tag: "latest",
                dev_prefix: "dev-",
            },
        )?;

        stack.output(
            &format!("{scope}ServiceRepositoryUri"),
            repository.uri(),
            &format!("Image repository for the {name} containers"),
        )?;
    }

    Ok(stack)
}
