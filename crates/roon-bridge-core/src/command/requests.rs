// ── Bridged request types ──
//
// One struct per RPC method, with wire defaults already stripped: empty
// strings and unspecified enums arrive as `None`. Each request validates
// itself against the zone cache and yields the `Command` to route.

use roon_bridge_api::models::{
    BrowseOptions, Control, Hierarchy, ImageOptions, ImageScale, LoadOptions, Loop, MuteHow,
    Output, SeekHow, SettingsChange, VolumeHow,
};

use super::{Command, Target};
use crate::error::BridgeError;
use crate::store::ZoneCache;

const IMAGE_FORMATS: [&str; 2] = ["image/jpeg", "image/png"];

/// A request the dispatcher can bridge.
pub trait BridgeRequest: Send + Sync {
    /// RPC method name, used in logs.
    const METHOD: &'static str;

    /// Check arguments and resolve ids against the cache.
    fn validate(&self, zones: &ZoneCache) -> Result<Command, BridgeError>;
}

// ── Lookup helpers ───────────────────────────────────────────────────

fn require_output(zones: &ZoneCache, output_id: Option<&str>) -> Result<Output, BridgeError> {
    let output_id = output_id.ok_or_else(|| BridgeError::invalid("Must specify an output_id"))?;
    zones
        .output(output_id)
        .ok_or_else(|| BridgeError::output_not_found(output_id))
}

/// Zone id wins over output id when both are given.
fn resolve_target(
    zones: &ZoneCache,
    zone_id: Option<&str>,
    output_id: Option<&str>,
    missing: &str,
) -> Result<Target, BridgeError> {
    if let Some(zone_id) = zone_id {
        return zones
            .zone(zone_id)
            .map(Target::Zone)
            .ok_or_else(|| BridgeError::zone_not_found(zone_id));
    }
    if let Some(output_id) = output_id {
        return zones
            .output(output_id)
            .map(Target::Output)
            .ok_or_else(|| BridgeError::output_not_found(output_id));
    }
    Err(BridgeError::invalid(missing))
}

fn resolve_outputs(zones: &ZoneCache, output_ids: &[String]) -> Result<Vec<Output>, BridgeError> {
    let mut outputs = Vec::with_capacity(output_ids.len());
    let mut missing = Vec::new();
    for id in output_ids {
        match zones.output(id) {
            Some(output) => outputs.push(output),
            None => missing.push(id.as_str()),
        }
    }
    if missing.is_empty() {
        Ok(outputs)
    } else {
        Err(BridgeError::outputs_not_found(&missing))
    }
}

// ── Browse / Load ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseRequest {
    pub hierarchy: Option<Hierarchy>,
    pub multi_session_key: Option<String>,
    pub item_key: Option<String>,
    pub input: Option<String>,
    pub zone_or_output_id: Option<String>,
    pub pop_all: bool,
    pub pop_levels: Option<i32>,
    pub refresh_list: bool,
    pub set_display_offset: Option<i32>,
}

impl BridgeRequest for BrowseRequest {
    const METHOD: &'static str = "Browse";

    fn validate(&self, _zones: &ZoneCache) -> Result<Command, BridgeError> {
        let hierarchy = self
            .hierarchy
            .ok_or_else(|| BridgeError::invalid("Must specify a valid hierarchy"))?;
        Ok(Command::Browse(BrowseOptions {
            hierarchy,
            multi_session_key: self.multi_session_key.clone(),
            item_key: self.item_key.clone(),
            input: self.input.clone(),
            zone_or_output_id: self.zone_or_output_id.clone(),
            pop_all: self.pop_all,
            pop_levels: self.pop_levels,
            refresh_list: self.refresh_list,
            set_display_offset: self.set_display_offset,
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadRequest {
    pub hierarchy: Option<Hierarchy>,
    pub multi_session_key: Option<String>,
    pub level: Option<i32>,
    pub offset: Option<i32>,
    pub count: Option<i32>,
    pub set_display_offset: Option<i32>,
}

impl BridgeRequest for LoadRequest {
    const METHOD: &'static str = "Load";

    fn validate(&self, _zones: &ZoneCache) -> Result<Command, BridgeError> {
        let hierarchy = self
            .hierarchy
            .ok_or_else(|| BridgeError::invalid("Must specify a valid hierarchy"))?;
        Ok(Command::Load(LoadOptions {
            hierarchy,
            multi_session_key: self.multi_session_key.clone(),
            level: self.level,
            offset: self.offset,
            count: self.count,
            set_display_offset: self.set_display_offset,
        }))
    }
}

// ── Image ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetImageRequest {
    pub image_key: Option<String>,
    pub scale: Option<ImageScale>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

impl BridgeRequest for GetImageRequest {
    const METHOD: &'static str = "GetImage";

    fn validate(&self, _zones: &ZoneCache) -> Result<Command, BridgeError> {
        let image_key = self
            .image_key
            .clone()
            .ok_or_else(|| BridgeError::invalid("Must specify an image_key"))?;
        if let Some(format) = &self.format {
            if !IMAGE_FORMATS.contains(&format.as_str()) {
                return Err(BridgeError::invalid(
                    r#"Image format must be one of "image/jpeg" or "image/png""#,
                ));
            }
        }
        if self.scale.is_some() {
            let positive = |v: Option<u32>| v.is_some_and(|v| v > 0);
            if !positive(self.width) || !positive(self.height) {
                return Err(BridgeError::invalid(
                    "When scale is specified, must specify width and height > 0",
                ));
            }
        }
        Ok(Command::GetImage {
            image_key,
            options: ImageOptions {
                scale: self.scale,
                width: self.width,
                height: self.height,
                format: self.format.clone(),
            },
        })
    }
}

// ── Zone-level transport ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSettingsRequest {
    pub zone_id: Option<String>,
    pub output_id: Option<String>,
    pub shuffle: Option<bool>,
    pub auto_radio: Option<bool>,
    pub loop_mode: Option<Loop>,
}

impl BridgeRequest for ChangeSettingsRequest {
    const METHOD: &'static str = "ChangeSettings";

    fn validate(&self, zones: &ZoneCache) -> Result<Command, BridgeError> {
        let target = resolve_target(
            zones,
            self.zone_id.as_deref(),
            self.output_id.as_deref(),
            "Must specify a zone_id or output_id",
        )?;
        Ok(Command::ChangeSettings {
            target,
            settings: SettingsChange {
                shuffle: self.shuffle,
                auto_radio: self.auto_radio,
                loop_mode: self.loop_mode,
            },
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlRequest {
    pub zone_id: Option<String>,
    pub output_id: Option<String>,
    pub control: Option<Control>,
}

impl BridgeRequest for ControlRequest {
    const METHOD: &'static str = "Control";

    fn validate(&self, zones: &ZoneCache) -> Result<Command, BridgeError> {
        let control = self
            .control
            .ok_or_else(|| BridgeError::invalid("Must specify a control action"))?;
        let target = resolve_target(
            zones,
            self.zone_id.as_deref(),
            self.output_id.as_deref(),
            "Must specify a zone_id or output_id",
        )?;
        Ok(Command::Control { target, control })
    }
}

/// `seconds` is forwarded as given; zero is a valid absolute position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeekRequest {
    pub zone_id: Option<String>,
    pub output_id: Option<String>,
    pub how: Option<SeekHow>,
    pub seconds: i64,
}

impl BridgeRequest for SeekRequest {
    const METHOD: &'static str = "Seek";

    fn validate(&self, zones: &ZoneCache) -> Result<Command, BridgeError> {
        let target = resolve_target(
            zones,
            self.zone_id.as_deref(),
            self.output_id.as_deref(),
            "Must specify a zone_id or output_id",
        )?;
        let how = self
            .how
            .ok_or_else(|| BridgeError::invalid("Must specify a seek type (how)"))?;
        Ok(Command::Seek {
            target,
            how,
            seconds: self.seconds,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferZoneRequest {
    pub from_zone_id: Option<String>,
    pub from_output_id: Option<String>,
    pub to_zone_id: Option<String>,
    pub to_output_id: Option<String>,
}

impl BridgeRequest for TransferZoneRequest {
    const METHOD: &'static str = "TransferZone";

    fn validate(&self, zones: &ZoneCache) -> Result<Command, BridgeError> {
        let from = resolve_target(
            zones,
            self.from_zone_id.as_deref(),
            self.from_output_id.as_deref(),
            "Must specify a from_zone_id or from_output_id",
        )?;
        let to = resolve_target(
            zones,
            self.to_zone_id.as_deref(),
            self.to_output_id.as_deref(),
            "Must specify a to_zone_id or to_output_id",
        )?;
        Ok(Command::TransferZone { from, to })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseAllRequest;

impl BridgeRequest for PauseAllRequest {
    const METHOD: &'static str = "PauseAll";

    fn validate(&self, _zones: &ZoneCache) -> Result<Command, BridgeError> {
        Ok(Command::PauseAll)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuteAllRequest {
    pub how: Option<MuteHow>,
}

impl BridgeRequest for MuteAllRequest {
    const METHOD: &'static str = "MuteAll";

    fn validate(&self, _zones: &ZoneCache) -> Result<Command, BridgeError> {
        let how = self
            .how
            .ok_or_else(|| BridgeError::invalid("Must specify a mute action"))?;
        Ok(Command::MuteAll { how })
    }
}

// ── Output-level transport ───────────────────────────────────────────

/// `value` is forwarded as given; zero is a valid absolute volume.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeVolumeRequest {
    pub output_id: Option<String>,
    pub how: Option<VolumeHow>,
    pub value: f64,
}

impl BridgeRequest for ChangeVolumeRequest {
    const METHOD: &'static str = "ChangeVolume";

    fn validate(&self, zones: &ZoneCache) -> Result<Command, BridgeError> {
        let output_id = self
            .output_id
            .as_deref()
            .ok_or_else(|| BridgeError::invalid("Must specify an output_id"))?;
        let how = self
            .how
            .ok_or_else(|| BridgeError::invalid("Must specify how"))?;
        let output = zones
            .output(output_id)
            .ok_or_else(|| BridgeError::output_not_found(output_id))?;
        Ok(Command::ChangeVolume {
            output,
            how,
            value: self.value,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuteRequest {
    pub output_id: Option<String>,
    pub how: Option<MuteHow>,
}

impl BridgeRequest for MuteRequest {
    const METHOD: &'static str = "Mute";

    fn validate(&self, zones: &ZoneCache) -> Result<Command, BridgeError> {
        let output_id = self
            .output_id
            .as_deref()
            .ok_or_else(|| BridgeError::invalid("Must specify an output_id"))?;
        let how = self
            .how
            .ok_or_else(|| BridgeError::invalid("Must specify a mute action"))?;
        let output = zones
            .output(output_id)
            .ok_or_else(|| BridgeError::output_not_found(output_id))?;
        Ok(Command::Mute { output, how })
    }
}

/// Shared shape of the source-control commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceControlRequest {
    pub output_id: Option<String>,
    pub control_key: Option<String>,
}

macro_rules! source_control_request {
    ($name:ident, $method:literal, $variant:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name(pub SourceControlRequest);

        impl BridgeRequest for $name {
            const METHOD: &'static str = $method;

            fn validate(&self, zones: &ZoneCache) -> Result<Command, BridgeError> {
                let output = require_output(zones, self.0.output_id.as_deref())?;
                Ok(Command::$variant {
                    output,
                    control_key: self.0.control_key.clone(),
                })
            }
        }
    };
}

source_control_request!(ConvenienceSwitchRequest, "ConvenienceSwitch", ConvenienceSwitch);
source_control_request!(StandbyRequest, "Standby", Standby);
source_control_request!(ToggleStandbyRequest, "ToggleStandby", ToggleStandby);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupOutputsRequest {
    pub output_ids: Vec<String>,
}

impl BridgeRequest for GroupOutputsRequest {
    const METHOD: &'static str = "GroupOutputs";

    fn validate(&self, zones: &ZoneCache) -> Result<Command, BridgeError> {
        let outputs = resolve_outputs(zones, &self.output_ids)?;
        Ok(Command::GroupOutputs { outputs })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UngroupOutputsRequest {
    pub output_ids: Vec<String>,
}

impl BridgeRequest for UngroupOutputsRequest {
    const METHOD: &'static str = "UngroupOutputs";

    fn validate(&self, zones: &ZoneCache) -> Result<Command, BridgeError> {
        let outputs = resolve_outputs(zones, &self.output_ids)?;
        Ok(Command::UngroupOutputs { outputs })
    }
}

// ── Wire-default helpers ─────────────────────────────────────────────

/// Treat an empty string as absent.
pub fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

// ── Tests ────────────────────────────────────────────────────────────
