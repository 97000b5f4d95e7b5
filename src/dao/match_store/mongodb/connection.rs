use std::time::Duration;

use mongodb::{
    Client, Database,
    bson::{Document, doc},
    options::ClientOptions,
};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::{MongoDaoError, MongoResult};

const PING_ATTEMPTS: u32 = 10;
const FIRST_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Open a client, wait for the server to answer a ping and check it can run
/// multi-document transactions.
pub async fn connect_transactional(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    wait_for_ping(&database).await?;

    let hello = database
        .run_command(doc! { "hello": 1 })
        .await
        .map_err(|source| MongoDaoError::HealthPing { source })?;
    if !supports_transactions(&hello) {
        return Err(MongoDaoError::TransactionsUnsupported);
    }
    debug!(database = database_name, "MongoDB deployment accepts transactions");

    Ok((client, database))
}

async fn wait_for_ping(database: &Database) -> MongoResult<()> {
    let mut backoff = FIRST_BACKOFF;

    for attempt in 1..=PING_ATTEMPTS {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok(()),
            Err(source) if attempt == PING_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                warn!(
                    attempt,
                    wait_ms = backoff.as_millis(),
                    error = %err,
                    "MongoDB not answering yet; retrying"
                );
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }

    Ok(())
}

/// Replica set members report `setName`; `mongos` routers report `msg: "isdbgrid"`.
fn supports_transactions(hello: &Document) -> bool {
    hello.get_str("setName").is_ok() || hello.get_str("msg").is_ok_and(|msg| msg == "isdbgrid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_server_cannot_run_transactions() {
        assert!(!supports_transactions(&doc! { "isWritablePrimary": true }));
    }

    #[test]
    fn replica_set_and_router_can_run_transactions() {
        assert!(supports_transactions(&doc! { "setName": "rs0" }));
        assert!(supports_transactions(&doc! { "msg": "isdbgrid" }));
    }
}
