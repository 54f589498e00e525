use crate::{Result, TestInfraError};
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, TypedBuilder)]
pub struct RedisConfig {
    #[builder(default = "8.6.0".to_string())]
    tag: String,
    /// When set, the default user is replaced by one that may only read,
    /// which is how tests provoke `NOPERM` replies.
    #[builder(default = false)]
    read_only_default_user: bool,
}

/// Test fixture for a disposable Redis server.
pub struct RedisServer {
    container: ContainerAsync<GenericImage>,
}

impl RedisServer {
    /// Starts a Redis container and waits until it answers `PING`.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let container = GenericImage::new("redis", config.tag.as_str())
            .with_exposed_port(6379_u16.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
            .start()
            .await?;

        let server = Self { container };
        server.wait_for_ping().await?;

        if config.read_only_default_user {
            server.restrict_default_user().await?;
        }

        Ok(server)
    }

    pub async fn host(&self) -> Result<String> {
        let host = self.container.get_host().await?.to_string();
        Ok(match host.as_str() {
            "localhost" => String::from("127.0.0.1"),
            _ => host,
        })
    }

    pub async fn port(&self) -> Result<u16> {
        Ok(self.container.get_host_port_ipv4(6379).await?)
    }

    pub async fn url(&self) -> Result<String> {
        Ok(format!("redis://{}:{}", self.host().await?, self.port().await?))
    }

    /// Opens a fresh multiplexed connection to the server.
    pub async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let client = redis::Client::open(self.url().await?)?;
        Ok(client.get_multiplexed_async_connection().await?)
    }

    /// Returns the underlying container reference.
    pub fn container(&self) -> &ContainerAsync<GenericImage> {
        &self.container
    }

    async fn wait_for_ping(&self) -> Result<()> {
        let mut last_error = None;
        for _ in 0..20 {
            match self.ping().await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    last_error = Some(err.to_string());
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
            }
        }
        Err(TestInfraError::NotReady(
            last_error.unwrap_or_else(|| "redis never answered PING".to_string()),
        ))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn restrict_default_user(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("ACL")
            .arg("SETUSER")
            .arg("default")
            .arg("on")
            .arg("nopass")
            .arg("~*")
            .arg("-@all")
            .arg("+@read")
            .arg("+@connection")
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}
