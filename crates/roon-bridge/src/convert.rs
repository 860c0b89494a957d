// ── Protobuf conversions ──
//
// Inbound messages become bridge requests with wire defaults stripped:
// empty strings and UNSPECIFIED or unknown enum values arrive as `None`.
// Zero numbers stay as they are. Outbound domain types map field for field.

use roon_bridge_api::models::{
    BrowseItem, BrowseList, BrowseResult, Control, DisplayLines, Hierarchy, Image, ImageScale,
    InputPrompt, LoadResult, Loop, MuteHow, NowPlaying, Output, PlayState, SeekChange, SeekHow,
    SourceControl, SourceControlStatus, Volume, VolumeHow, Zone, ZoneDiff, ZoneSettings,
};
use roon_bridge_core::{
    BrowseRequest, ChangeSettingsRequest, ChangeVolumeRequest, ControlRequest,
    ConvenienceSwitchRequest, GetImageRequest, GroupOutputsRequest, LoadRequest, MuteAllRequest,
    MuteRequest, SeekRequest, SourceControlRequest, StandbyRequest, ToggleStandbyRequest,
    TransferZoneRequest, UngroupOutputsRequest, ZoneEvent, non_empty,
};

use crate::proto as pb;

/// Zero is never a usable image dimension.
fn positive(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}

// ── Inbound enums ────────────────────────────────────────────────────

fn hierarchy(value: i32) -> Option<Hierarchy> {
    use pb::BrowseHierarchy as H;
    Some(match H::try_from(value).ok()? {
        H::Unspecified => return None,
        H::Browse => Hierarchy::Browse,
        H::Playlists => Hierarchy::Playlists,
        H::Settings => Hierarchy::Settings,
        H::InternetRadio => Hierarchy::InternetRadio,
        H::Albums => Hierarchy::Albums,
        H::Artists => Hierarchy::Artists,
        H::Genres => Hierarchy::Genres,
        H::Composers => Hierarchy::Composers,
        H::Search => Hierarchy::Search,
    })
}

fn image_scale(value: i32) -> Option<ImageScale> {
    match pb::ImageScale::try_from(value).ok()? {
        pb::ImageScale::Unspecified => None,
        pb::ImageScale::Fit => Some(ImageScale::Fit),
        pb::ImageScale::Fill => Some(ImageScale::Fill),
        pb::ImageScale::Stretch => Some(ImageScale::Stretch),
    }
}

fn loop_mode(value: i32) -> Option<Loop> {
    match pb::Loop::try_from(value).ok()? {
        pb::Loop::Unspecified => None,
        pb::Loop::Loop => Some(Loop::Loop),
        pb::Loop::LoopOne => Some(Loop::LoopOne),
        pb::Loop::Disabled => Some(Loop::Disabled),
        pb::Loop::Next => Some(Loop::Next),
    }
}

fn volume_how(value: i32) -> Option<VolumeHow> {
    match pb::VolumeHow::try_from(value).ok()? {
        pb::VolumeHow::Unspecified => None,
        pb::VolumeHow::Absolute => Some(VolumeHow::Absolute),
        pb::VolumeHow::Relative => Some(VolumeHow::Relative),
        pb::VolumeHow::RelativeStep => Some(VolumeHow::RelativeStep),
    }
}

fn control(value: i32) -> Option<Control> {
    use pb::Control as C;
    Some(match C::try_from(value).ok()? {
        C::Unspecified => return None,
        C::Play => Control::Play,
        C::Pause => Control::Pause,
        C::Playpause => Control::Playpause,
        C::Stop => Control::Stop,
        C::Previous => Control::Previous,
        C::Next => Control::Next,
    })
}

fn mute_how(value: i32) -> Option<MuteHow> {
    match pb::MuteHow::try_from(value).ok()? {
        pb::MuteHow::Unspecified => None,
        pb::MuteHow::Mute => Some(MuteHow::Mute),
        pb::MuteHow::Unmute => Some(MuteHow::Unmute),
    }
}

fn seek_how(value: i32) -> Option<SeekHow> {
    match pb::SeekHow::try_from(value).ok()? {
        pb::SeekHow::Unspecified => None,
        pb::SeekHow::Relative => Some(SeekHow::Relative),
        pb::SeekHow::Absolute => Some(SeekHow::Absolute),
    }
}

// ── Inbound requests ─────────────────────────────────────────────────

impl From<pb::BrowseRequest> for BrowseRequest {
    fn from(req: pb::BrowseRequest) -> Self {
        Self {
            hierarchy: hierarchy(req.hierarchy),
            multi_session_key: non_empty(req.multi_session_key),
            item_key: non_empty(req.item_key),
            input: non_empty(req.input),
            zone_or_output_id: non_empty(req.zone_or_output_id),
            pop_all: req.pop_all,
            pop_levels: req.pop_levels,
            refresh_list: req.refresh_list,
            set_display_offset: req.set_display_offset,
        }
    }
}

impl From<pb::LoadRequest> for LoadRequest {
    fn from(req: pb::LoadRequest) -> Self {
        Self {
            hierarchy: hierarchy(req.hierarchy),
            multi_session_key: non_empty(req.multi_session_key),
            level: req.level,
            offset: req.offset,
            count: req.count,
            set_display_offset: req.set_display_offset,
        }
    }
}

impl From<pb::GetImageRequest> for GetImageRequest {
    fn from(req: pb::GetImageRequest) -> Self {
        Self {
            image_key: non_empty(req.image_key),
            scale: image_scale(req.scale),
            width: positive(req.width),
            height: positive(req.height),
            format: non_empty(req.format),
        }
    }
}

impl From<pb::ChangeSettingsRequest> for ChangeSettingsRequest {
    fn from(req: pb::ChangeSettingsRequest) -> Self {
        Self {
            zone_id: non_empty(req.zone_id),
            output_id: non_empty(req.output_id),
            shuffle: req.shuffle,
            auto_radio: req.auto_radio,
            loop_mode: loop_mode(req.r#loop),
        }
    }
}

impl From<pb::ChangeVolumeRequest> for ChangeVolumeRequest {
    fn from(req: pb::ChangeVolumeRequest) -> Self {
        Self {
            output_id: non_empty(req.output_id),
            how: volume_how(req.how),
            value: req.value,
        }
    }
}

impl From<pb::ControlRequest> for ControlRequest {
    fn from(req: pb::ControlRequest) -> Self {
        Self {
            zone_id: non_empty(req.zone_id),
            output_id: non_empty(req.output_id),
            control: control(req.control),
        }
    }
}

impl From<pb::SeekRequest> for SeekRequest {
    fn from(req: pb::SeekRequest) -> Self {
        Self {
            zone_id: non_empty(req.zone_id),
            output_id: non_empty(req.output_id),
            how: seek_how(req.how),
            seconds: req.seconds,
        }
    }
}

impl From<pb::TransferZoneRequest> for TransferZoneRequest {
    fn from(req: pb::TransferZoneRequest) -> Self {
        Self {
            from_zone_id: non_empty(req.from_zone_id),
            from_output_id: non_empty(req.from_output_id),
            to_zone_id: non_empty(req.to_zone_id),
            to_output_id: non_empty(req.to_output_id),
        }
    }
}

impl From<pb::MuteAllRequest> for MuteAllRequest {
    fn from(req: pb::MuteAllRequest) -> Self {
        Self {
            how: mute_how(req.how),
        }
    }
}

impl From<pb::MuteRequest> for MuteRequest {
    fn from(req: pb::MuteRequest) -> Self {
        Self {
            output_id: non_empty(req.output_id),
            how: mute_how(req.how),
        }
    }
}

fn source_control(output_id: String, control_key: String) -> SourceControlRequest {
    SourceControlRequest {
        output_id: non_empty(output_id),
        control_key: non_empty(control_key),
    }
}

impl From<pb::ConvenienceSwitchRequest> for ConvenienceSwitchRequest {
    fn from(req: pb::ConvenienceSwitchRequest) -> Self {
        Self(source_control(req.output_id, req.control_key))
    }
}

impl From<pb::StandbyRequest> for StandbyRequest {
    fn from(req: pb::StandbyRequest) -> Self {
        Self(source_control(req.output_id, req.control_key))
    }
}

impl From<pb::ToggleStandbyRequest> for ToggleStandbyRequest {
    fn from(req: pb::ToggleStandbyRequest) -> Self {
        Self(source_control(req.output_id, req.control_key))
    }
}

impl From<pb::GroupOutputsRequest> for GroupOutputsRequest {
    fn from(req: pb::GroupOutputsRequest) -> Self {
        Self {
            output_ids: req.output_ids,
        }
    }
}

impl From<pb::UngroupOutputsRequest> for UngroupOutputsRequest {
    fn from(req: pb::UngroupOutputsRequest) -> Self {
        Self {
            output_ids: req.output_ids,
        }
    }
}

// ── Outbound zones ───────────────────────────────────────────────────

impl From<PlayState> for pb::PlayState {
    fn from(state: PlayState) -> Self {
        match state {
            PlayState::Playing => Self::Playing,
            PlayState::Paused => Self::Paused,
            PlayState::Loading => Self::Loading,
            PlayState::Stopped => Self::Stopped,
        }
    }
}

impl From<Loop> for pb::Loop {
    fn from(mode: Loop) -> Self {
        match mode {
            Loop::Loop => Self::Loop,
            Loop::LoopOne => Self::LoopOne,
            Loop::Disabled => Self::Disabled,
            Loop::Next => Self::Next,
        }
    }
}

impl From<SourceControlStatus> for pb::SourceControlStatus {
    fn from(status: SourceControlStatus) -> Self {
        match status {
            SourceControlStatus::Selected => Self::Selected,
            SourceControlStatus::Deselected => Self::Deselected,
            SourceControlStatus::Standby => Self::Standby,
            SourceControlStatus::Indeterminate => Self::Indeterminate,
        }
    }
}

impl From<&Zone> for pb::Zone {
    fn from(zone: &Zone) -> Self {
        Self {
            zone_id: zone.zone_id.clone(),
            display_name: zone.display_name.clone(),
            outputs: zone.outputs.iter().map(pb::Output::from).collect(),
            state: pb::PlayState::from(zone.state).into(),
            is_next_allowed: zone.is_next_allowed,
            is_previous_allowed: zone.is_previous_allowed,
            is_pause_allowed: zone.is_pause_allowed,
            is_play_allowed: zone.is_play_allowed,
            is_seek_allowed: zone.is_seek_allowed,
            queue_items_remaining: zone.queue_items_remaining,
            queue_time_remaining: zone.queue_time_remaining,
            settings: Some(pb::ZoneSettings::from(&zone.settings)),
            now_playing: zone.now_playing.as_ref().map(pb::NowPlaying::from),
        }
    }
}

impl From<&ZoneSettings> for pb::ZoneSettings {
    fn from(settings: &ZoneSettings) -> Self {
        Self {
            r#loop: pb::Loop::from(settings.loop_mode).into(),
            shuffle: settings.shuffle,
            auto_radio: settings.auto_radio,
        }
    }
}

impl From<&NowPlaying> for pb::NowPlaying {
    fn from(now: &NowPlaying) -> Self {
        Self {
            seek_position: now.seek_position,
            length: now.length,
            image_key: now.image_key.clone().unwrap_or_default(),
            one_line: Some(pb::DisplayLines::from(&now.one_line)),
            two_line: Some(pb::DisplayLines::from(&now.two_line)),
            three_line: Some(pb::DisplayLines::from(&now.three_line)),
        }
    }
}

impl From<&DisplayLines> for pb::DisplayLines {
    fn from(lines: &DisplayLines) -> Self {
        Self {
            line1: lines.line1.clone(),
            line2: lines.line2.clone().unwrap_or_default(),
            line3: lines.line3.clone().unwrap_or_default(),
        }
    }
}

impl From<&Output> for pb::Output {
    fn from(output: &Output) -> Self {
        Self {
            output_id: output.output_id.clone(),
            zone_id: output.zone_id.clone(),
            display_name: output.display_name.clone(),
            state: output
                .state
                .map_or(pb::PlayState::Unspecified, pb::PlayState::from)
                .into(),
            source_controls: output
                .source_controls
                .iter()
                .map(pb::SourceControl::from)
                .collect(),
            volume: output.volume.as_ref().map(pb::Volume::from),
            can_group_with_output_ids: output.can_group_with_output_ids.clone(),
        }
    }
}

impl From<&SourceControl> for pb::SourceControl {
    fn from(control: &SourceControl) -> Self {
        Self {
            control_key: control.control_key.clone(),
            display_name: control.display_name.clone(),
            supports_standby: control.supports_standby,
            status: pb::SourceControlStatus::from(control.status).into(),
        }
    }
}

impl From<&Volume> for pb::Volume {
    fn from(volume: &Volume) -> Self {
        Self {
            r#type: volume.kind.clone(),
            min: volume.min,
            max: volume.max,
            value: volume.value,
            step: volume.step,
            is_muted: volume.is_muted,
        }
    }
}

// ── Outbound zone events ─────────────────────────────────────────────

impl From<&SeekChange> for pb::ZoneSeekChange {
    fn from(change: &SeekChange) -> Self {
        Self {
            zone_id: change.zone_id.clone(),
            seek_position: change.seek_position,
            queue_time_remaining: change.queue_time_remaining,
        }
    }
}

impl From<&ZoneDiff> for pb::ZonesChanged {
    fn from(diff: &ZoneDiff) -> Self {
        Self {
            zones_removed: diff.zones_removed.clone(),
            zones_added: diff.zones_added.iter().map(pb::Zone::from).collect(),
            zones_changed: diff.zones_changed.iter().map(pb::Zone::from).collect(),
            zones_seek_changed: diff
                .zones_seek_changed
                .iter()
                .map(pb::ZoneSeekChange::from)
                .collect(),
        }
    }
}

impl From<&ZoneEvent> for pb::SubscribeZonesResponse {
    fn from(event: &ZoneEvent) -> Self {
        use pb::subscribe_zones_response::Event;

        let event = match event {
            ZoneEvent::Subscribed(zones) => Event::Subscribed(pb::ZonesSubscribed {
                zones: zones.iter().map(|zone| pb::Zone::from(zone.as_ref())).collect(),
            }),
            ZoneEvent::Changed(diff) => Event::Changed(pb::ZonesChanged::from(diff.as_ref())),
            ZoneEvent::Unsubscribed => Event::Unsubscribed(pb::ZonesUnsubscribed {}),
        };
        Self { event: Some(event) }
    }
}

// ── Outbound browse and image results ────────────────────────────────

fn browse_action(action: &str) -> pb::BrowseAction {
    match action {
        "message" => pb::BrowseAction::Message,
        "none" => pb::BrowseAction::None,
        "list" => pb::BrowseAction::List,
        "replace_item" => pb::BrowseAction::ReplaceItem,
        "remove_item" => pb::BrowseAction::RemoveItem,
        _ => pb::BrowseAction::Unspecified,
    }
}

fn item_hint(hint: Option<&str>) -> pb::BrowseItemHint {
    match hint {
        Some("action") => pb::BrowseItemHint::Action,
        Some("action_list") => pb::BrowseItemHint::ActionList,
        Some("list") => pb::BrowseItemHint::List,
        Some("header") => pb::BrowseItemHint::Header,
        _ => pb::BrowseItemHint::Unspecified,
    }
}

fn list_hint(hint: Option<&str>) -> pb::BrowseListHint {
    match hint {
        Some("action_list") => pb::BrowseListHint::ActionList,
        _ => pb::BrowseListHint::Unspecified,
    }
}

impl From<BrowseResult> for pb::BrowseResponse {
    fn from(result: BrowseResult) -> Self {
        Self {
            action: browse_action(&result.action).into(),
            item: result.item.map(pb::BrowseItem::from),
            list: result.list.map(pb::BrowseList::from),
            message: result.message.unwrap_or_default(),
            is_error: result.is_error,
        }
    }
}

impl From<LoadResult> for pb::LoadResponse {
    fn from(result: LoadResult) -> Self {
        Self {
            items: result.items.into_iter().map(pb::BrowseItem::from).collect(),
            offset: result.offset,
            list: Some(pb::BrowseList::from(result.list)),
        }
    }
}

impl From<BrowseItem> for pb::BrowseItem {
    fn from(item: BrowseItem) -> Self {
        Self {
            hint: item_hint(item.hint.as_deref()).into(),
            title: item.title,
            subtitle: item.subtitle.unwrap_or_default(),
            image_key: item.image_key.unwrap_or_default(),
            item_key: item.item_key.unwrap_or_default(),
            input_prompt: item.input_prompt.map(pb::InputPrompt::from),
        }
    }
}

impl From<InputPrompt> for pb::InputPrompt {
    fn from(prompt: InputPrompt) -> Self {
        Self {
            prompt: prompt.prompt,
            action: prompt.action,
            value: prompt.value.unwrap_or_default(),
            is_password: prompt.is_password,
        }
    }
}

impl From<BrowseList> for pb::BrowseList {
    fn from(list: BrowseList) -> Self {
        Self {
            hint: list_hint(list.hint.as_deref()).into(),
            title: list.title,
            count: list.count,
            subtitle: list.subtitle.unwrap_or_default(),
            image_key: list.image_key.unwrap_or_default(),
            level: list.level,
            display_offset: list.display_offset,
        }
    }
}

impl From<Image> for pb::GetImageResponse {
    fn from(image: Image) -> Self {
        Self {
            content_type: image.content_type,
            image: image.data.to_vec(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn unspecified_and_unknown_enums_are_absent() {
        assert_eq!(hierarchy(pb::BrowseHierarchy::Unspecified.into()), None);
        assert_eq!(hierarchy(99), None);
        assert_eq!(
            hierarchy(pb::BrowseHierarchy::InternetRadio.into()),
            Some(Hierarchy::InternetRadio)
        );
        assert_eq!(control(-1), None);
        assert_eq!(loop_mode(pb::Loop::LoopOne.into()), Some(Loop::LoopOne));
    }

    #[test]
    fn empty_ids_are_absent_but_zero_values_survive() {
        let req = ChangeVolumeRequest::from(pb::ChangeVolumeRequest {
            output_id: String::new(),
            how: pb::VolumeHow::Absolute.into(),
            value: 0.0,
        });
        assert_eq!(req.output_id, None);
        assert_eq!(req.how, Some(VolumeHow::Absolute));

        let seek = SeekRequest::from(pb::SeekRequest {
            zone_id: "Z1".into(),
            how: pb::SeekHow::Absolute.into(),
            seconds: 0,
            ..pb::SeekRequest::default()
        });
        assert_eq!(seek.zone_id.as_deref(), Some("Z1"));
        assert_eq!(seek.output_id, None);
        assert_eq!(seek.seconds, 0);
    }

    #[test]
    fn zero_image_sizes_are_absent_but_load_offsets_survive() {
        let image = GetImageRequest::from(pb::GetImageRequest {
            image_key: "abc".into(),
            width: Some(0),
            height: Some(120),
            ..pb::GetImageRequest::default()
        });
        assert_eq!(image.width, None);
        assert_eq!(image.height, Some(120));
        assert_eq!(image.format, None);
        assert_eq!(image.scale, None);

        let load = LoadRequest::from(pb::LoadRequest {
            hierarchy: pb::BrowseHierarchy::Albums.into(),
            offset: Some(0),
            ..pb::LoadRequest::default()
        });
        assert_eq!(load.offset, Some(0));
        assert_eq!(load.count, None);
    }

    #[test]
    fn settings_keep_unset_flags_unset() {
        let req = ChangeSettingsRequest::from(pb::ChangeSettingsRequest {
            zone_id: "Z1".into(),
            shuffle: Some(false),
            ..pb::ChangeSettingsRequest::default()
        });
        assert_eq!(req.shuffle, Some(false));
        assert_eq!(req.auto_radio, None);
        assert_eq!(req.loop_mode, None);
    }

    #[test]
    fn zone_maps_optional_fields_to_proto_defaults() {
        let zone = Zone {
            zone_id: "Z1".into(),
            display_name: "Kitchen".into(),
            state: PlayState::Playing,
            outputs: vec![Output {
                output_id: "O1".into(),
                zone_id: "Z1".into(),
                volume: Some(Volume {
                    kind: "db".into(),
                    value: Some(-20.0),
                    ..Volume::default()
                }),
                ..Output::default()
            }],
            now_playing: Some(NowPlaying {
                seek_position: Some(0),
                one_line: DisplayLines {
                    line1: "Song".into(),
                    ..DisplayLines::default()
                },
                ..NowPlaying::default()
            }),
            ..Zone::default()
        };

        let proto = pb::Zone::from(&zone);

        assert_eq!(proto.state(), pb::PlayState::Playing);
        assert_eq!(proto.settings.unwrap().r#loop(), pb::Loop::Disabled);
        let output = &proto.outputs[0];
        assert_eq!(output.state(), pb::PlayState::Unspecified);
        assert_eq!(output.volume.as_ref().unwrap().r#type, "db");
        assert_eq!(output.volume.as_ref().unwrap().min, None);
        let now = proto.now_playing.unwrap();
        assert_eq!(now.seek_position, Some(0));
        assert_eq!(now.image_key, "");
        assert_eq!(now.one_line.unwrap().line2, "");
    }

    #[test]
    fn zone_events_map_to_the_oneof() {
        use pb::subscribe_zones_response::Event;

        let snapshot = ZoneEvent::Subscribed(Arc::new(vec![Arc::new(Zone::default())]));
        let Some(Event::Subscribed(subscribed)) = pb::SubscribeZonesResponse::from(&snapshot).event
        else {
            panic!("expected subscribed");
        };
        assert_eq!(subscribed.zones.len(), 1);

        let diff = ZoneEvent::Changed(Arc::new(ZoneDiff {
            zones_removed: vec!["Z9".into()],
            zones_seek_changed: vec![SeekChange {
                zone_id: "Z1".into(),
                seek_position: Some(42),
                queue_time_remaining: 100,
            }],
            ..ZoneDiff::default()
        }));
        let Some(Event::Changed(changed)) = pb::SubscribeZonesResponse::from(&diff).event else {
            panic!("expected changed");
        };
        assert_eq!(changed.zones_removed, vec!["Z9".to_owned()]);
        assert_eq!(changed.zones_seek_changed[0].seek_position, Some(42));

        assert!(matches!(
            pb::SubscribeZonesResponse::from(&ZoneEvent::Unsubscribed).event,
            Some(Event::Unsubscribed(_))
        ));
    }

    #[test]
    fn browse_strings_map_to_enums() {
        let response = pb::BrowseResponse::from(BrowseResult {
            action: "replace_item".into(),
            item: Some(BrowseItem {
                title: "Play Album".into(),
                hint: Some("action_list".into()),
                ..BrowseItem::default()
            }),
            ..BrowseResult::default()
        });

        assert_eq!(response.action(), pb::BrowseAction::ReplaceItem);
        assert_eq!(response.item.unwrap().hint(), pb::BrowseItemHint::ActionList);
        assert_eq!(browse_action("bogus"), pb::BrowseAction::Unspecified);
        assert_eq!(list_hint(None), pb::BrowseListHint::Unspecified);
    }
}
