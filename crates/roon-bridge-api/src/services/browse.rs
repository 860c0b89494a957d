use serde::Serialize;

use super::{BROWSE_SERVICE, expect_success};
use crate::connection::MooConnection;
use crate::error::Error;
use crate::models::{BrowseOptions, BrowseResult, LoadOptions, LoadResult};

/// Client for `com.roonlabs.browse:1`.
#[derive(Clone)]
pub struct BrowseClient {
    conn: MooConnection,
}

impl BrowseClient {
    pub fn new(conn: MooConnection) -> Self {
        Self { conn }
    }

    pub async fn browse(&self, options: &BrowseOptions) -> Result<BrowseResult, Error> {
        self.call("browse", options).await
    }

    pub async fn load(&self, options: &LoadOptions) -> Result<LoadResult, Error> {
        self.call("load", options).await
    }

    async fn call<B, T>(&self, method: &str, options: &B) -> Result<T, Error>
    where
        B: Serialize,
        T: serde::de::DeserializeOwned,
    {
        let body = serde_json::to_value(options).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        let endpoint = format!("{BROWSE_SERVICE}/{method}");
        let reply = self.conn.request(&endpoint, Some(&body)).await?;
        expect_success(reply)?.json()
    }
}
