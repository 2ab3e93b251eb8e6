use async_trait::async_trait;
use composer::provisioner::HandlerFailure;
use serde::{Deserialize, Deserializer};

/// Parsed credentials document of one Secrets Manager secret
///
/// The master secret carries `host` and `port` because Aurora attaches the
/// cluster endpoint to it; the per-service secrets carry credentials only.
#[derive(Clone, Debug, Deserialize)]
pub struct SecretValue {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "port")]
    pub port: Option<u16>,
}

// RDS-managed secrets store the port as a number, generated ones as a string.
fn port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(number)) => number
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("port out of range")),
        Some(serde_json::Value::String(text)) => text
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom("port is not a number")),
        Some(_) => Err(serde::de::Error::custom("port is not a number")),
    }
}

/// Where credentials come from
#[async_trait]
pub trait SecretStore {
    async fn fetch(&self, arn: &str) -> Result<SecretValue, HandlerFailure>;
}

/// Secrets Manager-backed store
pub struct AwsSecretStore {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretStore {
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        AwsSecretStore {
            client: aws_sdk_secretsmanager::Client::new(&config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretStore {
    async fn fetch(&self, arn: &str) -> Result<SecretValue, HandlerFailure> {
        let response = self
            .client
            .get_secret_value()
            .secret_id(arn)
            .send()
            .await
            .map_err(|err| HandlerFailure::new(format!("failed to read secret {arn}: {err}")))?;

        let Some(document) = response.secret_string() else {
            return Err(HandlerFailure::new(format!(
                "secret {arn} carries no string value"
            )));
        };

        serde_json::from_str(document).map_err(|err| {
            HandlerFailure::new(format!("secret {arn} is not a credentials document: {err}"))
        })
    }
}
