//! The six stacks of the mesh deployment
//!
//! Each module composes one stack against the app; registration order in
//! [`crate::compose`] matches the deploy order the dependency edges imply.

pub mod cluster;
pub mod database;
pub mod migration;
pub mod network;
pub mod registries;
pub mod services;

use serde_json::{json, Value};

/// Logical-id scope for a config-named service, `users` becomes `Users`
pub(crate) fn title(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// ECS `ValueFrom` selector for one JSON key of a secret
///
/// The trailing `::` selects the current version stage of the secret.
pub(crate) fn secret_key(arn: &Value, key: &str) -> Value {
    json!({ "Fn::Join": ["", [arn, format!(":{key}::")]] })
}
