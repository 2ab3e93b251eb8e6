use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::error::Error;
use crate::stack::Stack;
use serde_json::json;

/// Characters excluded from generated passwords on top of punctuation
///
/// Quotes, `@`, slashes and backticks break connection strings and shell
/// quoting in downstream consumers.
pub const EXCLUDED_CHARACTERS: &str = "\"@/\\'`";

pub const PASSWORD_LENGTH: u32 = 32;

pub struct GeneratedSecretParams<'a> {
    pub name: &'a str,
    pub username: &'a str,
    pub description: &'a str,
}

/// Secrets Manager secret with a generated password
///
/// The secret string is a JSON object seeded with the username; the password
/// key is filled in at provisioning time under the generation policy above.
pub struct GeneratedSecret {
    handle: Handle,
}

impl GeneratedSecret {
    pub fn new(
        stack: &mut Stack,
        id: &str,
        params: GeneratedSecretParams<'_>,
    ) -> Result<Self, Error> {
        if params.name.is_empty() {
            return Err(Error::invalid(id, "secret name must not be empty"));
        }
        if params.username.is_empty() {
            return Err(Error::invalid(id, "secret username must not be empty"));
        }

        let template = json!({ "username": params.username }).to_string();
        let logical_id = format!("Secret{}", escape_logical_id(id));

        let handle = stack.add_resource(CfnResource {
            name: logical_id,
            resource: json!({
                "Type": "AWS::SecretsManager::Secret",
                "DeletionPolicy": "Delete",
                "Properties": {
                    "Name": params.name,
                    "Description": params.description,
                    "GenerateSecretString": {
                        "SecretStringTemplate": template,
                        "GenerateStringKey": "password",
                        "PasswordLength": PASSWORD_LENGTH,
                        "ExcludePunctuation": true,
                        "ExcludeCharacters": EXCLUDED_CHARACTERS
                    }
                }
            }),
        })?;

        Ok(GeneratedSecret { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Secret ARN token, for policies and property bags
    pub fn arn(&self) -> serde_json::Value {
        self.handle.ref_()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::TagMap;

    #[test]
    fn generation_policy_matches_the_documented_defaults() {
        let mut stack = Stack::new("database", "cloud-mesh-dev-database", TagMap::new());
        let secret = GeneratedSecret::new(
            &mut stack,
            "UsersDbPassword",
            GeneratedSecretParams {
                name: "usersDbPassword",
                username: "users_user",
                description: "users service database credentials",
            },
        )
        .unwrap();

        let resource = stack.resource(secret.handle().logical_id()).unwrap();
        let generation = &resource["Properties"]["GenerateSecretString"];

        assert_eq!(generation["PasswordLength"], 32);
        assert_eq!(generation["ExcludePunctuation"], true);
        assert_eq!(generation["ExcludeCharacters"], "\"@/\\'`");
        assert_eq!(
            generation["SecretStringTemplate"],
            "{\"username\":\"users_user\"}"
        );
    }

    #[test]
    fn username_is_required() {
        let mut stack = Stack::new("database", "cloud-mesh-dev-database", TagMap::new());
        assert!(GeneratedSecret::new(
            &mut stack,
            "UsersDbPassword",
            GeneratedSecretParams {
                name: "usersDbPassword",
                username: "",
                description: "broken",
            },
        )
        .is_err());
    }
}
