// ── Command-API surfaces ──
//
// The bridge talks to a paired core through three trait objects so the
// engine can run against the live protocol client or an in-process fake.
// A `Session` bundles the handles for one pairing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use roon_bridge_api::models::{
    BrowseOptions, BrowseResult, Control, Image, ImageOptions, LoadOptions, LoadResult, MuteHow,
    Output, SeekHow, SettingsChange, VolumeHow, ZoneFeedEvent,
};
use roon_bridge_api::{BrowseClient, CoreInfo, ImageClient, TransportClient};

use crate::command::Target;
use crate::error::ServiceError;

/// Zone subscription events, closed when the subscription ends.
pub type ZoneFeed = mpsc::UnboundedReceiver<ZoneFeedEvent>;

#[async_trait]
pub trait TransportApi: Send + Sync {
    async fn subscribe_zones(&self) -> Result<ZoneFeed, ServiceError>;
    async fn change_volume(&self, output: &Output, how: VolumeHow, value: f64) -> Result<(), ServiceError>;
    async fn mute(&self, output: &Output, how: MuteHow) -> Result<(), ServiceError>;
    async fn mute_all(&self, how: MuteHow) -> Result<(), ServiceError>;
    async fn pause_all(&self) -> Result<(), ServiceError>;
    async fn control(&self, target: &Target, control: Control) -> Result<(), ServiceError>;
    async fn seek(&self, target: &Target, how: SeekHow, seconds: i64) -> Result<(), ServiceError>;
    async fn change_settings(&self, target: &Target, settings: &SettingsChange) -> Result<(), ServiceError>;
    async fn standby(&self, output: &Output, control_key: Option<&str>) -> Result<(), ServiceError>;
    async fn toggle_standby(&self, output: &Output, control_key: Option<&str>) -> Result<(), ServiceError>;
    async fn convenience_switch(&self, output: &Output, control_key: Option<&str>) -> Result<(), ServiceError>;
    async fn group_outputs(&self, outputs: &[Output]) -> Result<(), ServiceError>;
    async fn ungroup_outputs(&self, outputs: &[Output]) -> Result<(), ServiceError>;
    async fn transfer_zone(&self, from: &Target, to: &Target) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait BrowseApi: Send + Sync {
    async fn browse(&self, options: &BrowseOptions) -> Result<BrowseResult, ServiceError>;
    async fn load(&self, options: &LoadOptions) -> Result<LoadResult, ServiceError>;
}

#[async_trait]
pub trait ImageApi: Send + Sync {
    async fn get_image(&self, image_key: &str, options: &ImageOptions) -> Result<Image, ServiceError>;
}

/// Extension status shown in the Roon UI.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn set_status(&self, message: &str, is_error: bool);
}

// ── Session ──────────────────────────────────────────────────────────

/// The command-API handles of one pairing.
#[derive(Clone)]
pub struct Session {
    pub core: CoreInfo,
    pub transport: Arc<dyn TransportApi>,
    pub browse: Arc<dyn BrowseApi>,
    pub image: Arc<dyn ImageApi>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("core", &self.core).finish_non_exhaustive()
    }
}

impl Session {
    /// Session backed by the protocol client on one link.
    pub fn from_connection(core: CoreInfo, conn: &roon_bridge_api::MooConnection) -> Self {
        Self {
            core,
            transport: Arc::new(TransportClient::new(conn.clone())),
            browse: Arc::new(BrowseClient::new(conn.clone())),
            image: Arc::new(ImageClient::new(conn.clone())),
        }
    }
}

// ── Protocol client adapters ─────────────────────────────────────────

fn ids(outputs: &[Output]) -> Vec<&str> {
    outputs.iter().map(|o| o.output_id.as_str()).collect()
}

#[async_trait]
impl TransportApi for TransportClient {
    async fn subscribe_zones(&self) -> Result<ZoneFeed, ServiceError> {
        Ok(TransportClient::subscribe_zones(self).await?)
    }

    async fn change_volume(&self, output: &Output, how: VolumeHow, value: f64) -> Result<(), ServiceError> {
        Ok(TransportClient::change_volume(self, &output.output_id, how, value).await?)
    }

    async fn mute(&self, output: &Output, how: MuteHow) -> Result<(), ServiceError> {
        Ok(TransportClient::mute(self, &output.output_id, how).await?)
    }

    async fn mute_all(&self, how: MuteHow) -> Result<(), ServiceError> {
        Ok(TransportClient::mute_all(self, how).await?)
    }

    async fn pause_all(&self) -> Result<(), ServiceError> {
        Ok(TransportClient::pause_all(self).await?)
    }

    async fn control(&self, target: &Target, control: Control) -> Result<(), ServiceError> {
        Ok(TransportClient::control(self, target.id(), control).await?)
    }

    async fn seek(&self, target: &Target, how: SeekHow, seconds: i64) -> Result<(), ServiceError> {
        Ok(TransportClient::seek(self, target.id(), how, seconds).await?)
    }

    async fn change_settings(&self, target: &Target, settings: &SettingsChange) -> Result<(), ServiceError> {
        Ok(TransportClient::change_settings(self, target.id(), settings).await?)
    }

    async fn standby(&self, output: &Output, control_key: Option<&str>) -> Result<(), ServiceError> {
        Ok(TransportClient::standby(self, &output.output_id, control_key).await?)
    }

    async fn toggle_standby(&self, output: &Output, control_key: Option<&str>) -> Result<(), ServiceError> {
        Ok(TransportClient::toggle_standby(self, &output.output_id, control_key).await?)
    }

    async fn convenience_switch(&self, output: &Output, control_key: Option<&str>) -> Result<(), ServiceError> {
        Ok(TransportClient::convenience_switch(self, &output.output_id, control_key).await?)
    }

    async fn group_outputs(&self, outputs: &[Output]) -> Result<(), ServiceError> {
        Ok(TransportClient::group_outputs(self, &ids(outputs)).await?)
    }

    async fn ungroup_outputs(&self, outputs: &[Output]) -> Result<(), ServiceError> {
        Ok(TransportClient::ungroup_outputs(self, &ids(outputs)).await?)
    }

    async fn transfer_zone(&self, from: &Target, to: &Target) -> Result<(), ServiceError> {
        Ok(TransportClient::transfer_zone(self, from.id(), to.id()).await?)
    }
}

#[async_trait]
impl BrowseApi for BrowseClient {
    async fn browse(&self, options: &BrowseOptions) -> Result<BrowseResult, ServiceError> {
        Ok(BrowseClient::browse(self, options).await?)
    }

    async fn load(&self, options: &LoadOptions) -> Result<LoadResult, ServiceError> {
        Ok(BrowseClient::load(self, options).await?)
    }
}

#[async_trait]
impl ImageApi for ImageClient {
    async fn get_image(&self, image_key: &str, options: &ImageOptions) -> Result<Image, ServiceError> {
        Ok(ImageClient::get_image(self, image_key, options).await?)
    }
}

#[async_trait]
impl StatusReporter for roon_bridge_api::StatusService {
    async fn set_status(&self, message: &str, is_error: bool) {
        roon_bridge_api::StatusService::set_status(self, message, is_error).await;
    }
}
