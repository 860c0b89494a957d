use serde_json::Value;

use super::{IMAGE_SERVICE, expect_success};
use crate::connection::MooConnection;
use crate::error::Error;
use crate::models::{Image, ImageOptions};

/// Client for `com.roonlabs.image:1`.
#[derive(Clone)]
pub struct ImageClient {
    conn: MooConnection,
}

impl ImageClient {
    pub fn new(conn: MooConnection) -> Self {
        Self { conn }
    }

    /// Fetch an image by key. The reply body is the raw image.
    pub async fn get_image(&self, image_key: &str, options: &ImageOptions) -> Result<Image, Error> {
        let mut body = serde_json::to_value(options).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        if let Value::Object(map) = &mut body {
            map.insert("image_key".into(), image_key.into());
        }

        let endpoint = format!("{IMAGE_SERVICE}/get_image");
        let reply = expect_success(self.conn.request(&endpoint, Some(&body)).await?)?;
        Ok(Image {
            content_type: reply.content_type.unwrap_or_default(),
            data: reply.body,
        })
    }
}
