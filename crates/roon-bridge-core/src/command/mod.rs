// ── Command API ──
//
// Every bridged operation becomes a validated `Command` carrying resolved
// zone/output records, then is routed to the session's command-API handle.
// The `CommandResult` is what the RPC layer composes its response from.

pub mod requests;

use std::sync::Arc;

use roon_bridge_api::models::{
    BrowseOptions, BrowseResult, Control, Image, ImageOptions, LoadOptions, LoadResult, MuteHow,
    Output, SeekHow, SettingsChange, VolumeHow, Zone,
};

use crate::error::ServiceError;
use crate::service::Session;

pub use requests::{
    BridgeRequest, BrowseRequest, ChangeSettingsRequest, ChangeVolumeRequest, ControlRequest,
    ConvenienceSwitchRequest, GetImageRequest, GroupOutputsRequest, LoadRequest, MuteAllRequest,
    MuteRequest, PauseAllRequest, SeekRequest, SourceControlRequest, StandbyRequest,
    ToggleStandbyRequest, TransferZoneRequest, UngroupOutputsRequest,
};

/// A zone or an output, resolved from the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Zone(Arc<Zone>),
    Output(Output),
}

impl Target {
    /// The id the core accepts as `zone_or_output_id`.
    pub fn id(&self) -> &str {
        match self {
            Self::Zone(zone) => &zone.zone_id,
            Self::Output(output) => &output.output_id,
        }
    }
}

/// All operations the bridge forwards to a paired core.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ── Browse / image ───────────────────────────────────────────────
    Browse(BrowseOptions),
    Load(LoadOptions),
    GetImage {
        image_key: String,
        options: ImageOptions,
    },

    // ── Zone-level transport ─────────────────────────────────────────
    ChangeSettings {
        target: Target,
        settings: SettingsChange,
    },
    Control {
        target: Target,
        control: Control,
    },
    Seek {
        target: Target,
        how: SeekHow,
        seconds: i64,
    },
    TransferZone {
        from: Target,
        to: Target,
    },
    PauseAll,
    MuteAll {
        how: MuteHow,
    },

    // ── Output-level transport ───────────────────────────────────────
    ChangeVolume {
        output: Output,
        how: VolumeHow,
        value: f64,
    },
    Mute {
        output: Output,
        how: MuteHow,
    },
    ConvenienceSwitch {
        output: Output,
        control_key: Option<String>,
    },
    Standby {
        output: Output,
        control_key: Option<String>,
    },
    ToggleStandby {
        output: Output,
        control_key: Option<String>,
    },
    GroupOutputs {
        outputs: Vec<Output>,
    },
    UngroupOutputs {
        outputs: Vec<Output>,
    },
}

/// Outcome of a routed command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Fire-and-forget commands: the caller gets an empty response.
    Ok,
    Browse(BrowseResult),
    Load(LoadResult),
    Image(Image),
}

/// Invoke the command-API handle a command belongs to.
pub(crate) async fn route(session: &Session, command: Command) -> Result<CommandResult, ServiceError> {
    let transport = &session.transport;
    match command {
        Command::Browse(options) => session.browse.browse(&options).await.map(CommandResult::Browse),
        Command::Load(options) => session.browse.load(&options).await.map(CommandResult::Load),
        Command::GetImage { image_key, options } => session
            .image
            .get_image(&image_key, &options)
            .await
            .map(CommandResult::Image),

        Command::ChangeSettings { target, settings } => transport
            .change_settings(&target, &settings)
            .await
            .map(|()| CommandResult::Ok),
        Command::Control { target, control } => transport
            .control(&target, control)
            .await
            .map(|()| CommandResult::Ok),
        Command::Seek { target, how, seconds } => transport
            .seek(&target, how, seconds)
            .await
            .map(|()| CommandResult::Ok),
        Command::TransferZone { from, to } => transport
            .transfer_zone(&from, &to)
            .await
            .map(|()| CommandResult::Ok),
        Command::PauseAll => transport.pause_all().await.map(|()| CommandResult::Ok),
        Command::MuteAll { how } => transport.mute_all(how).await.map(|()| CommandResult::Ok),

        Command::ChangeVolume { output, how, value } => transport
            .change_volume(&output, how, value)
            .await
            .map(|()| CommandResult::Ok),
        Command::Mute { output, how } => transport.mute(&output, how).await.map(|()| CommandResult::Ok),
        Command::ConvenienceSwitch { output, control_key } => transport
            .convenience_switch(&output, control_key.as_deref())
            .await
            .map(|()| CommandResult::Ok),
        Command::Standby { output, control_key } => transport
            .standby(&output, control_key.as_deref())
            .await
            .map(|()| CommandResult::Ok),
        Command::ToggleStandby { output, control_key } => transport
            .toggle_standby(&output, control_key.as_deref())
            .await
            .map(|()| CommandResult::Ok),
        Command::GroupOutputs { outputs } => transport
            .group_outputs(&outputs)
            .await
            .map(|()| CommandResult::Ok),
        Command::UngroupOutputs { outputs } => transport
            .ungroup_outputs(&outputs)
            .await
            .map(|()| CommandResult::Ok),
    }
}
