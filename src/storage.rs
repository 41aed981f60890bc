//! Document store management.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Database};

/// A sink for storing documents into named collections.
///
/// The pipeline only ever inserts through this seam, which keeps per-record failure
/// isolation testable without a live document store.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Insert a single document into the named collection.
    async fn insert(&self, collection: &str, document: Document) -> Result<()>;
}

/// An abstraction over the document store connection.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

struct StorageInner {
    /// The underlying database handle.
    db: Database,
}

impl Storage {
    /// Connect to the document store and verify the connection.
    ///
    /// The driver connects lazily, so a ping is issued here to surface connection failures
    /// at startup instead of at the first insert.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await.context("error building document store client")?;
        let db = client.database(db_name);
        db.run_command(doc! {"ping": 1}, None).await.context("error connecting to document store")?;
        tracing::info!(db = db_name, "connected to document store");
        let inner = Arc::new(StorageInner { db });
        Ok(Self { inner })
    }
}

#[async_trait]
impl DocumentSink for Storage {
    async fn insert(&self, collection: &str, document: Document) -> Result<()> {
        self.inner
            .db
            .collection::<Document>(collection)
            .insert_one(document, None)
            .await
            .with_context(|| format!("error inserting document into collection {}", collection))?;
        Ok(())
    }
}
