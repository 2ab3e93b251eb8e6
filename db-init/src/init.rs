use crate::secrets::SecretStore;
use crate::sql::SqlRunner;
use async_trait::async_trait;
use composer::provisioner::{EventKind, HandlerFailure, PropertyBag, ResourceEvent, ResourceHandler};
use regex::Regex;
use std::sync::OnceLock;

/// One schema/principal pair to initialize
///
/// Parsed from the property bag: every `{Scope}PasswordArn` key names a
/// service, and the schema is the scope in snake case with a `_db` suffix.
/// `DbSecretArn` and `Version` never match the pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServicePrincipal {
    pub database: String,
    pub secret_arn: String,
}

pub fn service_principals(properties: &PropertyBag) -> Vec<ServicePrincipal> {
    properties
        .iter()
        .filter_map(|(key, value)| {
            let scope = key.strip_suffix("PasswordArn")?;
            if scope.is_empty() {
                return None;
            }
            Some(ServicePrincipal {
                database: format!("{}_db", snake(scope)),
                secret_arn: value.clone(),
            })
        })
        .collect()
}

fn snake(scope: &str) -> String {
    let mut snake = String::with_capacity(scope.len() + 2);
    for (position, character) in scope.chars().enumerate() {
        if character.is_ascii_uppercase() {
            if position > 0 {
                snake.push('_');
            }
            snake.push(character.to_ascii_lowercase());
        } else {
            snake.push(character);
        }
    }
    snake
}

/// Validate a name before it is spliced into DDL
///
/// Identifiers cannot be bound as parameters in DDL statements, so only
/// names matching the pattern ever reach a statement.
fn identifier(name: &str) -> Result<&str, HandlerFailure> {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    let pattern = IDENTIFIER
        .get_or_init(|| Regex::new("^[a-z][a-z0-9_]*$").expect("the pattern is well-formed"));

    if pattern.is_match(name) {
        Ok(name)
    } else {
        Err(HandlerFailure::new(format!(
            "\"{name}\" is not a safe MySQL identifier"
        )))
    }
}

/// Quote a password as a single-quoted MySQL string
fn quoted(password: &str) -> String {
    let mut quoted = String::with_capacity(password.len() + 2);
    quoted.push('\'');
    for character in password.chars() {
        match character {
            '\'' => quoted.push_str("''"),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(character),
        }
    }
    quoted.push('\'');
    quoted
}

/// Initializes schemas and principals for every service in the event
///
/// Every statement is create-or-converge: re-delivery after a partial
/// failure re-runs the same DDL and ends in the same state. Delete events
/// leave the database untouched.
pub struct Initializer<S, R> {
    secrets: S,
    sql: R,
}

impl<S: SecretStore + Send, R: SqlRunner + Send> Initializer<S, R> {
    pub fn new(secrets: S, sql: R) -> Self {
        Initializer { secrets, sql }
    }

    async fn initialize(&mut self, properties: &PropertyBag) -> Result<(), HandlerFailure> {
        let principals = service_principals(properties);
        if principals.is_empty() {
            return Err(HandlerFailure::new(
                "the event names no service credential secrets",
            ));
        }

        for principal in &principals {
            let secret = self.secrets.fetch(&principal.secret_arn).await?;
            let database = identifier(&principal.database)?;
            let username = identifier(&secret.username)?;
            let password = quoted(&secret.password);

            log::info!("initializing schema {database} for {username}");

            self.sql
                .run(&format!(
                    "CREATE DATABASE IF NOT EXISTS {database} \
                     CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"
                ))
                .await?;
            self.sql
                .run(&format!(
                    "CREATE USER IF NOT EXISTS '{username}'@'%' IDENTIFIED BY {password}"
                ))
                .await?;
            self.sql
                .run(&format!(
                    "ALTER USER '{username}'@'%' IDENTIFIED BY {password}"
                ))
                .await?;
            self.sql
                .run(&format!(
                    "GRANT ALL PRIVILEGES ON {database}.* TO '{username}'@'%'"
                ))
                .await?;
        }

        self.sql.run("FLUSH PRIVILEGES").await?;
        Ok(())
    }
}

#[async_trait]
impl<S: SecretStore + Send, R: SqlRunner + Send> ResourceHandler for Initializer<S, R> {
    async fn handle(&mut self, event: &ResourceEvent) -> Result<(), HandlerFailure> {
        match event.kind {
            EventKind::Delete => {
                log::info!("delete event, leaving the database untouched");
                Ok(())
            }
            EventKind::Create | EventKind::Update => self.initialize(&event.properties).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretValue;
    use std::collections::HashMap;

    struct FakeSecrets(HashMap<String, SecretValue>);

    impl FakeSecrets {
        fn mesh() -> Self {
            let mut secrets = HashMap::new();
            for name in ["users", "tasks"] {
                secrets.insert(
                    format!("arn:{name}"),
                    SecretValue {
                        username: format!("{name}_user"),
                        password: format!("{name}-pw"),
                        host: None,
                        port: None,
                    },
                );
            }
            FakeSecrets(secrets)
        }
    }

    #[async_trait]
    impl SecretStore for FakeSecrets {
        async fn fetch(&self, arn: &str) -> Result<SecretValue, HandlerFailure> {
            self.0
                .get(arn)
                .cloned()
                .ok_or_else(|| HandlerFailure::new(format!("no secret {arn}")))
        }
    }

    #[derive(Default)]
    struct RecordingSql {
        statements: Vec<String>,
    }

    #[async_trait]
    impl SqlRunner for RecordingSql {
        async fn run(&mut self, statement: &str) -> Result<(), HandlerFailure> {
            self.statements.push(statement.to_string());
            Ok(())
        }
    }

    fn bag() -> PropertyBag {
        PropertyBag::new()
            .with("DbSecretArn", "arn:master")
            .with("UsersPasswordArn", "arn:users")
            .with("TasksPasswordArn", "arn:tasks")
            .with("Version", "1.0.0")
    }

    fn event(kind: EventKind) -> ResourceEvent {
        ResourceEvent::new(kind, bag(), None)
    }

    #[test]
    fn principals_come_from_password_arn_keys_only() {
        let principals = service_principals(&bag());

        assert_eq!(
            principals,
            vec![
                ServicePrincipal {
                    database: "tasks_db".to_string(),
                    secret_arn: "arn:tasks".to_string(),
                },
                ServicePrincipal {
                    database: "users_db".to_string(),
                    secret_arn: "arn:users".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn create_initializes_a_schema_and_principal_per_service() {
        let mut initializer = Initializer::new(FakeSecrets::mesh(), RecordingSql::default());
        initializer.handle(&event(EventKind::Create)).await.unwrap();

        let statements = &initializer.sql.statements;
        assert_eq!(statements.len(), 9);
        assert_eq!(
            statements[0],
            "CREATE DATABASE IF NOT EXISTS tasks_db \
             CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"
        );
        assert_eq!(
            statements[5],
            "CREATE USER IF NOT EXISTS 'users_user'@'%' IDENTIFIED BY 'users-pw'"
        );
        assert_eq!(
            statements[7],
            "GRANT ALL PRIVILEGES ON users_db.* TO 'users_user'@'%'"
        );
        assert_eq!(statements.last().unwrap(), "FLUSH PRIVILEGES");
    }

    #[tokio::test]
    async fn redelivery_runs_the_exact_same_statements() {
        let mut initializer = Initializer::new(FakeSecrets::mesh(), RecordingSql::default());

        initializer.handle(&event(EventKind::Create)).await.unwrap();
        initializer.handle(&event(EventKind::Update)).await.unwrap();

        let statements = &initializer.sql.statements;
        let (first, second) = statements.split_at(statements.len() / 2);
        assert_eq!(first, second);
        assert!(statements.iter().all(|s| !s.contains("DROP")));
    }

    #[tokio::test]
    async fn delete_touches_nothing() {
        let mut initializer = Initializer::new(FakeSecrets::mesh(), RecordingSql::default());
        initializer.handle(&event(EventKind::Delete)).await.unwrap();

        assert!(initializer.sql.statements.is_empty());
    }

    #[tokio::test]
    async fn a_quoted_password_cannot_break_out_of_its_string() {
        let mut secrets = FakeSecrets::mesh();
        secrets.0.insert(
            "arn:users".to_string(),
            SecretValue {
                username: "users_user".to_string(),
                password: "it's\\tricky".to_string(),
                host: None,
                port: None,
            },
        );

        let mut initializer = Initializer::new(secrets, RecordingSql::default());
        initializer.handle(&event(EventKind::Create)).await.unwrap();

        let create_user = &initializer.sql.statements[5];
        assert!(create_user.ends_with("IDENTIFIED BY 'it''s\\\\tricky'"));
    }

    #[tokio::test]
    async fn an_unsafe_username_never_reaches_a_statement() {
        let mut secrets = FakeSecrets::mesh();
        secrets.0.insert(
            "arn:tasks".to_string(),
            SecretValue {
                username: "tasks_user; DROP DATABASE users_db".to_string(),
                password: "pw".to_string(),
                host: None,
                port: None,
            },
        );

        let mut initializer = Initializer::new(secrets, RecordingSql::default());
        let failed = initializer.handle(&event(EventKind::Create)).await;

        assert!(failed.is_err());
        assert!(initializer.sql.statements.is_empty());
    }

    #[tokio::test]
    async fn a_scope_that_makes_no_identifier_is_rejected() {
        let bag = PropertyBag::new()
            .with("DbSecretArn", "arn:master")
            .with("9LivesPasswordArn", "arn:users");

        let mut initializer = Initializer::new(FakeSecrets::mesh(), RecordingSql::default());
        let failed = initializer
            .handle(&ResourceEvent::new(EventKind::Create, bag, None))
            .await;

        assert!(failed.is_err());
    }

    #[tokio::test]
    async fn an_event_without_service_secrets_fails() {
        let bag = PropertyBag::new()
            .with("DbSecretArn", "arn:master")
            .with("Version", "1.0.0");

        let mut initializer = Initializer::new(FakeSecrets::mesh(), RecordingSql::default());
        let failed = initializer
            .handle(&ResourceEvent::new(EventKind::Create, bag, None))
            .await;

        assert!(failed.is_err());
        assert!(initializer.sql.statements.is_empty());
    }
}
