use crate::secrets::SecretValue;
use async_trait::async_trait;
use composer::provisioner::HandlerFailure;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::ConnectOptions;

/// Where DDL statements land
///
/// Statements may embed credentials, so implementations must never log
/// them verbatim.
#[async_trait]
pub trait SqlRunner {
    async fn run(&mut self, statement: &str) -> Result<(), HandlerFailure>;
}

/// Single MySQL connection, authenticated as the cluster master
pub struct MySqlRunner {
    connection: MySqlConnection,
}

impl MySqlRunner {
    /// Connect with the endpoint and credentials of the master secret
    pub async fn connect(master: &SecretValue) -> Result<Self, HandlerFailure> {
        let host = master
            .host
            .as_deref()
            .ok_or_else(|| HandlerFailure::new("master secret carries no host"))?;
        let port = master.port.unwrap_or(3306);

        log::info!("connecting to {host}:{port} as {}", master.username);

        let connection = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(&master.username)
            .password(&master.password)
            .connect()
            .await
            .map_err(|err| {
                HandlerFailure::new(format!("failed to connect to {host}:{port}: {err}"))
            })?;

        Ok(MySqlRunner { connection })
    }
}

#[async_trait]
impl SqlRunner for MySqlRunner {
    async fn run(&mut self, statement: &str) -> Result<(), HandlerFailure> {
        let verb = statement.split_whitespace().next().unwrap_or("statement");
        sqlx::query(statement)
            .execute(&mut self.connection)
            .await
            .map_err(|err| HandlerFailure::new(format!("{verb} failed: {err}")))?;
        Ok(())
    }
}
