//! Wire models for the transport, browse and image services.
//!
//! Field names follow the JSON the core sends. Everything the core may omit
//! is defaulted so a sparse zone record still deserializes.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

// ── Zones and outputs ────────────────────────────────────────────────

/// A logical playback group of one or more outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    pub zone_id: String,
    pub display_name: String,
    pub outputs: Vec<Output>,
    pub state: PlayState,
    pub is_next_allowed: bool,
    pub is_previous_allowed: bool,
    pub is_pause_allowed: bool,
    pub is_play_allowed: bool,
    pub is_seek_allowed: bool,
    pub queue_items_remaining: i64,
    pub queue_time_remaining: i64,
    pub settings: ZoneSettings,
    pub now_playing: Option<NowPlaying>,
}

impl Zone {
    /// Output with `output_id` in this zone, if any.
    pub fn output(&self, output_id: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.output_id == output_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    Playing,
    Paused,
    Loading,
    #[default]
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSettings {
    #[serde(rename = "loop")]
    pub loop_mode: Loop,
    pub shuffle: bool,
    pub auto_radio: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NowPlaying {
    pub seek_position: Option<i64>,
    pub length: Option<i64>,
    pub image_key: Option<String>,
    pub one_line: DisplayLines,
    pub two_line: DisplayLines,
    pub three_line: DisplayLines,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayLines {
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line3: Option<String>,
}

/// An individually addressable playback endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub output_id: String,
    pub zone_id: String,
    pub display_name: String,
    pub state: Option<PlayState>,
    pub source_controls: Vec<SourceControl>,
    pub volume: Option<Volume>,
    pub can_group_with_output_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceControl {
    pub control_key: String,
    pub display_name: String,
    pub supports_standby: bool,
    pub status: SourceControlStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceControlStatus {
    Selected,
    Deselected,
    Standby,
    #[default]
    Indeterminate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volume {
    #[serde(rename = "type")]
    pub kind: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub value: Option<f64>,
    pub step: Option<f64>,
    pub is_muted: bool,
}

// ── Zone subscription feed ───────────────────────────────────────────

/// Body of the `Subscribed` reply to `subscribe_zones`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ZonesSnapshot {
    pub zones: Vec<Zone>,
}

/// Body of a `Changed` reply to `subscribe_zones`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneDiff {
    #[serde(deserialize_with = "zone_ids")]
    pub zones_removed: Vec<String>,
    pub zones_added: Vec<Zone>,
    pub zones_changed: Vec<Zone>,
    pub zones_seek_changed: Vec<SeekChange>,
}

impl ZoneDiff {
    pub fn is_empty(&self) -> bool {
        self.zones_removed.is_empty()
            && self.zones_added.is_empty()
            && self.zones_changed.is_empty()
            && self.zones_seek_changed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekChange {
    pub zone_id: String,
    pub seek_position: Option<i64>,
    pub queue_time_remaining: i64,
}

/// One decoded event from the zone subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneFeedEvent {
    Subscribed(Vec<Zone>),
    Changed(ZoneDiff),
    Unsubscribed,
}

/// Removed zones arrive as bare ids on current cores and as zone objects
/// on some older ones.
fn zone_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ZoneRef {
        Id(String),
        Zone { zone_id: String },
    }

    let refs = Vec::<ZoneRef>::deserialize(deserializer)?;
    Ok(refs
        .into_iter()
        .map(|r| match r {
            ZoneRef::Id(id) | ZoneRef::Zone { zone_id: id } => id,
        })
        .collect())
}

// ── Transport command arguments ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeHow {
    Absolute,
    Relative,
    RelativeStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuteHow {
    Mute,
    Unmute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Play,
    Pause,
    Playpause,
    Stop,
    Previous,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekHow {
    Relative,
    Absolute,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loop {
    Loop,
    LoopOne,
    #[default]
    Disabled,
    Next,
}

/// Settings to change on a zone; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_radio: Option<bool>,
    #[serde(rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_mode: Option<Loop>,
}

// ── Browse ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hierarchy {
    Browse,
    Playlists,
    Settings,
    InternetRadio,
    Albums,
    Artists,
    Genres,
    Composers,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowseOptions {
    pub hierarchy: Hierarchy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_session_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_or_output_id: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub pop_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pop_levels: Option<i32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub refresh_list: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_display_offset: Option<i32>,
}

impl BrowseOptions {
    pub fn new(hierarchy: Hierarchy) -> Self {
        Self {
            hierarchy,
            multi_session_key: None,
            item_key: None,
            input: None,
            zone_or_output_id: None,
            pop_all: false,
            pop_levels: None,
            refresh_list: false,
            set_display_offset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadOptions {
    pub hierarchy: Hierarchy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_session_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_display_offset: Option<i32>,
}

impl LoadOptions {
    pub fn new(hierarchy: Hierarchy) -> Self {
        Self {
            hierarchy,
            multi_session_key: None,
            level: None,
            offset: None,
            count: None,
            set_display_offset: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseResult {
    pub action: String,
    pub item: Option<BrowseItem>,
    pub list: Option<BrowseList>,
    pub message: Option<String>,
    pub is_error: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadResult {
    pub items: Vec<BrowseItem>,
    pub offset: i32,
    pub list: BrowseList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseItem {
    pub title: String,
    pub subtitle: Option<String>,
    pub image_key: Option<String>,
    pub item_key: Option<String>,
    pub hint: Option<String>,
    pub input_prompt: Option<InputPrompt>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPrompt {
    pub prompt: String,
    pub action: String,
    pub value: Option<String>,
    pub is_password: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowseList {
    pub title: String,
    pub count: i32,
    pub subtitle: Option<String>,
    pub image_key: Option<String>,
    pub level: i32,
    pub display_offset: Option<i32>,
    pub hint: Option<String>,
}

// ── Image ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageScale {
    Fit,
    Fill,
    Stretch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<ImageScale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Image bytes as returned by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub content_type: String,
    pub data: Bytes,
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn sparse_zone_deserializes_with_defaults() {
        let zone: Zone = serde_json::from_value(json!({
            "zone_id": "1601",
            "display_name": "Kitchen",
            "state": "playing",
            "outputs": [{
                "output_id": "1701",
                "zone_id": "1601",
                "display_name": "Kitchen Speaker",
                "volume": {"type": "number", "min": 0, "max": 100, "value": 35, "step": 1, "is_muted": false}
            }],
            "settings": {"loop": "loop_one", "shuffle": true, "auto_radio": false}
        }))
        .unwrap();

        assert_eq!(zone.state, PlayState::Playing);
        assert_eq!(zone.settings.loop_mode, Loop::LoopOne);
        assert!(zone.now_playing.is_none());
        let output = zone.output("1701").unwrap();
        assert_eq!(output.volume.as_ref().unwrap().value, Some(35.0));
        assert!(output.source_controls.is_empty());
    }

    #[test]
    fn removed_zones_accept_ids_and_objects() {
        let diff: ZoneDiff = serde_json::from_value(json!({
            "zones_removed": ["a", {"zone_id": "b"}],
            "zones_seek_changed": [{"zone_id": "c", "seek_position": 12, "queue_time_remaining": 300}]
        }))
        .unwrap();

        assert_eq!(diff.zones_removed, vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(diff.zones_seek_changed[0].seek_position, Some(12));
        assert!(diff.zones_added.is_empty());
    }

    #[test]
    fn browse_options_omit_absent_fields() {
        let mut opts = BrowseOptions::new(Hierarchy::InternetRadio);
        opts.set_display_offset = Some(0);

        assert_eq!(
            serde_json::to_value(&opts).unwrap(),
            json!({"hierarchy": "internet_radio", "set_display_offset": 0})
        );
    }

    #[test]
    fn settings_change_serializes_loop_key() {
        let change = SettingsChange {
            loop_mode: Some(Loop::Next),
            ..SettingsChange::default()
        };
        assert_eq!(serde_json::to_value(&change).unwrap(), json!({"loop": "next"}));
    }
}
