//! MongoDB connection bootstrap.
//!
//! The service treats a store it cannot reach at startup as fatal, so
//! [`connect`] pings the server before handing the database back.

use anyhow::Context;
use catalog_kernel::settings::DatabaseSettings;
use mongodb::{bson::doc, options::ClientOptions, Client, Database};

/// Connect to the configured MongoDB deployment and verify it answers a ping.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Database> {
    let uri = settings.redacted_uri();
    tracing::info!(target: "catalog-db", uri = %uri, database = %settings.name, "connecting to MongoDB");

    let mut options = ClientOptions::parse(&settings.uri)
        .await
        .with_context(|| format!("invalid MongoDB connection string '{uri}'"))?;
    options.app_name = Some(settings.app_name.clone());

    let client = Client::with_options(options).context("failed to build MongoDB client")?;
    let database = client.database(&settings.name);

    ping(&database)
        .await
        .with_context(|| format!("MongoDB at '{uri}' is unreachable"))?;

    tracing::info!(target: "catalog-db", database = %settings.name, "MongoDB connection established");
    Ok(database)
}

/// Round-trip a `ping` command against the database.
pub async fn ping(database: &Database) -> anyhow::Result<()> {
    database
        .run_command(doc! { "ping": 1 })
        .await
        .context("ping command failed")?;
    Ok(())
}
