// In-process stand-ins for a paired core.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use roon_bridge_api::CoreInfo;
use roon_bridge_api::models::{
    BrowseOptions, BrowseResult, Control, Image, ImageOptions, LoadOptions, LoadResult, MuteHow,
    Output, SeekHow, SettingsChange, VolumeHow, Zone, ZoneFeedEvent,
};
use roon_bridge_core::{
    Bridge, BrowseApi, ImageApi, ServiceError, Session, StatusReporter, Target, TransportApi, ZoneFeed,
};

/// Records every call and fails the next ones from a script.
#[derive(Default)]
pub struct FakeCore {
    pub calls: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<ServiceError>>,
    feed: Mutex<Option<mpsc::UnboundedReceiver<ZoneFeedEvent>>>,
}

impl FakeCore {
    /// A core whose zone subscription starts with `zones`. The returned
    /// sender pushes further feed events.
    pub fn with_zones(zones: Vec<Zone>) -> (Arc<Self>, mpsc::UnboundedSender<ZoneFeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ZoneFeedEvent::Subscribed(zones)).unwrap();
        let core = Self {
            feed: Mutex::new(Some(rx)),
            ..Self::default()
        };
        (Arc::new(core), tx)
    }

    pub fn fail_next(&self, error: ServiceError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn session(self: &Arc<Self>, core_id: &str) -> Session {
        Session {
            core: CoreInfo {
                core_id: core_id.into(),
                display_name: format!("Core {core_id}"),
                display_version: "2.0".into(),
            },
            transport: self.clone(),
            browse: self.clone(),
            image: self.clone(),
        }
    }

    fn record(&self, call: String) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TransportApi for FakeCore {
    async fn subscribe_zones(&self) -> Result<ZoneFeed, ServiceError> {
        self.feed
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ServiceError::Failed("already subscribed".into()))
    }

    async fn change_volume(&self, output: &Output, how: VolumeHow, value: f64) -> Result<(), ServiceError> {
        self.record(format!("change_volume {} {how:?} {value}", output.output_id))
    }

    async fn mute(&self, output: &Output, how: MuteHow) -> Result<(), ServiceError> {
        self.record(format!("mute {} {how:?}", output.output_id))
    }

    async fn mute_all(&self, how: MuteHow) -> Result<(), ServiceError> {
        self.record(format!("mute_all {how:?}"))
    }

    async fn pause_all(&self) -> Result<(), ServiceError> {
        self.record("pause_all".into())
    }

    async fn control(&self, target: &Target, control: Control) -> Result<(), ServiceError> {
        self.record(format!("control {} {control:?}", target.id()))
    }

    async fn seek(&self, target: &Target, how: SeekHow, seconds: i64) -> Result<(), ServiceError> {
        self.record(format!("seek {} {how:?} {seconds}", target.id()))
    }

    async fn change_settings(&self, target: &Target, settings: &SettingsChange) -> Result<(), ServiceError> {
        self.record(format!("change_settings {} {settings:?}", target.id()))
    }

    async fn standby(&self, output: &Output, control_key: Option<&str>) -> Result<(), ServiceError> {
        self.record(format!("standby {} {control_key:?}", output.output_id))
    }

    async fn toggle_standby(&self, output: &Output, control_key: Option<&str>) -> Result<(), ServiceError> {
        self.record(format!("toggle_standby {} {control_key:?}", output.output_id))
    }

    async fn convenience_switch(&self, output: &Output, control_key: Option<&str>) -> Result<(), ServiceError> {
        self.record(format!("convenience_switch {} {control_key:?}", output.output_id))
    }

    async fn group_outputs(&self, outputs: &[Output]) -> Result<(), ServiceError> {
        let ids: Vec<_> = outputs.iter().map(|o| o.output_id.as_str()).collect();
        self.record(format!("group_outputs {}", ids.join(",")))
    }

    async fn ungroup_outputs(&self, outputs: &[Output]) -> Result<(), ServiceError> {
        let ids: Vec<_> = outputs.iter().map(|o| o.output_id.as_str()).collect();
        self.record(format!("ungroup_outputs {}", ids.join(",")))
    }

    async fn transfer_zone(&self, from: &Target, to: &Target) -> Result<(), ServiceError> {
        self.record(format!("transfer_zone {} {}", from.id(), to.id()))
    }
}

#[async_trait]
impl BrowseApi for FakeCore {
    async fn browse(&self, options: &BrowseOptions) -> Result<BrowseResult, ServiceError> {
        self.record(format!("browse {:?}", options.hierarchy))?;
        Ok(BrowseResult {
            action: "list".into(),
            ..BrowseResult::default()
        })
    }

    async fn load(&self, options: &LoadOptions) -> Result<LoadResult, ServiceError> {
        self.record(format!("load {:?}", options.hierarchy))?;
        Ok(LoadResult::default())
    }
}

#[async_trait]
impl ImageApi for FakeCore {
    async fn get_image(&self, image_key: &str, options: &ImageOptions) -> Result<Image, ServiceError> {
        self.record(format!("get_image {image_key} {:?}", options.scale))?;
        Ok(Image {
            content_type: "image/jpeg".into(),
            data: vec![0xff, 0xd8].into(),
        })
    }
}

/// Remembers every status the bridge reports.
#[derive(Default)]
pub struct RecordingStatus {
    pub history: Mutex<Vec<(String, bool)>>,
}

impl RecordingStatus {
    pub fn last(&self) -> Option<(String, bool)> {
        self.history.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl StatusReporter for RecordingStatus {
    async fn set_status(&self, message: &str, is_error: bool) {
        self.history.lock().unwrap().push((message.to_owned(), is_error));
    }
}

pub fn zone(zone_id: &str, outputs: &[&str]) -> Zone {
    Zone {
        zone_id: zone_id.into(),
        display_name: format!("Zone {zone_id}"),
        outputs: outputs
            .iter()
            .map(|id| Output {
                output_id: (*id).into(),
                zone_id: zone_id.into(),
                display_name: format!("Output {id}"),
                ..Output::default()
            })
            .collect(),
        ..Zone::default()
    }
}

/// Poll until the bridge has cached `zone_id`.
pub async fn wait_for_zone(bridge: &Bridge, zone_id: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while bridge.store().zone(zone_id).await.is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

/// Poll until `n` commands are waiting for replay.
pub async fn wait_for_retries(bridge: &Bridge, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while bridge.queued_retries().await != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}
