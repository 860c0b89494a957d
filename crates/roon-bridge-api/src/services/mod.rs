//! Clients for the services the core provides, and the services this
//! extension provides back to the core.

mod browse;
mod image;
mod status;
mod transport;

pub use browse::BrowseClient;
pub use image::ImageClient;
pub use status::StatusService;
pub use transport::TransportClient;

use serde::Deserialize;

use crate::error::Error;
use crate::moo::{MooMessage, Verb};

pub const REGISTRY_SERVICE: &str = "com.roonlabs.registry:1";
pub const TRANSPORT_SERVICE: &str = "com.roonlabs.transport:2";
pub const BROWSE_SERVICE: &str = "com.roonlabs.browse:1";
pub const IMAGE_SERVICE: &str = "com.roonlabs.image:1";
pub const STATUS_SERVICE: &str = "com.roonlabs.status:1";
pub const PING_SERVICE: &str = "com.roonlabs.ping:1";

/// Accept a `COMPLETE Success` reply, turn anything else into
/// [`Error::Request`].
pub(crate) fn expect_success(reply: MooMessage) -> Result<MooMessage, Error> {
    if reply.verb == Verb::Complete && reply.name == "Success" {
        return Ok(reply);
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        message: Option<String>,
    }

    let message = reply
        .json::<ErrorBody>()
        .ok()
        .and_then(|body| body.message);
    Err(Error::Request {
        name: reply.name,
        message,
    })
}
