use composer::provisioner::{EventKind, PropertyBag, ResourceEvent, ResourceHandler};
use db_init::init::Initializer;
use db_init::secrets::{AwsSecretStore, SecretStore};
use db_init::sql::MySqlRunner;
use eyre::bail;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(service_fn(handle)).await
}

async fn handle(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let event = lifecycle(&event.payload)?;
    log::info!("{} event {}", event.kind.as_str(), event.request_id);

    match event.kind {
        EventKind::Delete => log::info!("skipping database initialization"),
        EventKind::Create | EventKind::Update => {
            let secrets = AwsSecretStore::from_env().await;
            let Some(master_arn) = event.properties.get("DbSecretArn") else {
                return Err(Error::from("the event carries no DbSecretArn"));
            };
            let master = secrets.fetch(master_arn).await?;
            let sql = MySqlRunner::connect(&master).await?;

            Initializer::new(secrets, sql).handle(&event).await?;
        }
    }

    Ok(json!({ "Status": "SUCCESS", "RequestId": event.request_id.to_string() }))
}

/// Read the CloudFormation custom-resource payload into a lifecycle event
fn lifecycle(payload: &Value) -> eyre::Result<ResourceEvent> {
    let kind = match payload["RequestType"].as_str() {
        Some("Create") => EventKind::Create,
        Some("Update") => EventKind::Update,
        Some("Delete") => EventKind::Delete,
        other => bail!("unsupported request type {other:?}"),
    };

    let request_id = payload["RequestId"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .unwrap_or_else(Uuid::new_v4);

    let properties = bag(&payload["ResourceProperties"])?;
    let old_properties = match &payload["OldResourceProperties"] {
        Value::Null => None,
        old => Some(bag(old)?),
    };

    Ok(ResourceEvent {
        kind,
        request_id,
        properties,
        old_properties,
    })
}

fn bag(value: &Value) -> eyre::Result<PropertyBag> {
    let Some(object) = value.as_object() else {
        bail!("resource properties are not an object");
    };

    Ok(object
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_cloudformation_update_becomes_a_lifecycle_event() {
        let event = lifecycle(&json!({
            "RequestType": "Update",
            "RequestId": "3c9409a6-3b29-40d4-bb3a-3a04ab1f5279",
            "ResourceProperties": {
                "DbSecretArn": "arn:master",
                "UsersPasswordArn": "arn:users",
                "Version": "1.0.1"
            },
            "OldResourceProperties": { "Version": "1.0.0" }
        }))
        .unwrap();

        assert_eq!(event.kind, EventKind::Update);
        assert_eq!(
            event.request_id,
            Uuid::parse_str("3c9409a6-3b29-40d4-bb3a-3a04ab1f5279").unwrap()
        );
        assert_eq!(event.properties.get("Version"), Some("1.0.1"));
        assert_eq!(
            event.old_properties.unwrap().get("Version"),
            Some("1.0.0")
        );
    }

    #[test]
    fn an_unknown_request_type_is_rejected() {
        let failed = lifecycle(&json!({ "RequestType": "Rollback", "ResourceProperties": {} }));

        assert!(failed.is_err());
    }
}
