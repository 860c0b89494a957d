// ── gRPC service ──
//
// Tonic adapter over `Bridge`. Each RPC decodes its message into a bridge
// request, executes it and encodes the result. Bridge errors map onto the
// four status codes callers see.

use std::pin::Pin;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use roon_bridge_core::{Bridge, BridgeError, BridgeRequest, CommandResult};

use crate::proto as pb;
use crate::proto::roon_service_server::{RoonService, RoonServiceServer};

pub struct RoonGrpc {
    bridge: Bridge,
}

impl RoonGrpc {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    pub fn into_service(self) -> RoonServiceServer<Self> {
        RoonServiceServer::new(self)
    }

    async fn execute<R: BridgeRequest>(&self, request: R) -> Result<CommandResult, Status> {
        self.bridge.execute(&request).await.map_err(to_status)
    }

    async fn command<R: BridgeRequest>(&self, request: R) -> Result<Response<pb::CommandResponse>, Status> {
        self.execute(request).await?;
        Ok(Response::new(pb::CommandResponse {}))
    }
}

/// Status code and message for a failed bridge call.
pub fn to_status(err: BridgeError) -> Status {
    let message = err.to_string();
    match err {
        BridgeError::Unavailable => Status::unavailable(message),
        BridgeError::InvalidArgument(_) => Status::invalid_argument(message),
        BridgeError::NotFound(_) => Status::not_found(message),
        BridgeError::Internal(_) => Status::internal(message),
    }
}

fn unexpected(method: &str, result: &CommandResult) -> Status {
    Status::internal(format!("Error: unexpected {method} result {result:?}"))
}

/// Serve the bridge on `listener` until `shutdown` fires.
pub async fn serve(
    bridge: Bridge,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<(), tonic::transport::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "gRPC server listening");
    }
    Server::builder()
        .add_service(RoonGrpc::new(bridge).into_service())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            shutdown.cancelled().await;
        })
        .await
}

type ZoneEventStream = Pin<Box<dyn Stream<Item = Result<pb::SubscribeZonesResponse, Status>> + Send>>;

#[tonic::async_trait]
impl RoonService for RoonGrpc {
    // ── Zones ────────────────────────────────────────────────────

    async fn get_zone(
        &self,
        request: Request<pb::GetZoneRequest>,
    ) -> Result<Response<pb::GetZoneResponse>, Status> {
        let zone_id = request.into_inner().zone_id;
        let zone = self.bridge.get_zone(&zone_id).await.map_err(to_status)?;
        Ok(Response::new(pb::GetZoneResponse {
            zone: Some(pb::Zone::from(zone.as_ref())),
        }))
    }

    async fn list_all_zones(
        &self,
        _request: Request<pb::ListAllZonesRequest>,
    ) -> Result<Response<pb::ListAllZonesResponse>, Status> {
        let zones = self.bridge.list_zones().await.map_err(to_status)?;
        Ok(Response::new(pb::ListAllZonesResponse {
            zones: zones.iter().map(|zone| pb::Zone::from(zone.as_ref())).collect(),
        }))
    }

    type SubscribeZonesStream = ZoneEventStream;

    async fn subscribe_zones(
        &self,
        _request: Request<pb::SubscribeZonesRequest>,
    ) -> Result<Response<Self::SubscribeZonesStream>, Status> {
        let subscription = self.bridge.subscribe_zones().await;
        debug!(subscriber = subscription.id(), "zone subscriber attached");
        let stream = subscription.map(|event| Ok(pb::SubscribeZonesResponse::from(&event)));
        Ok(Response::new(Box::pin(stream)))
    }

    // ── Browse / Image ───────────────────────────────────────────

    async fn browse(
        &self,
        request: Request<pb::BrowseRequest>,
    ) -> Result<Response<pb::BrowseResponse>, Status> {
        match self.execute(roon_bridge_core::BrowseRequest::from(request.into_inner())).await? {
            CommandResult::Browse(result) => Ok(Response::new(result.into())),
            other => Err(unexpected("browse", &other)),
        }
    }

    async fn load(
        &self,
        request: Request<pb::LoadRequest>,
    ) -> Result<Response<pb::LoadResponse>, Status> {
        match self.execute(roon_bridge_core::LoadRequest::from(request.into_inner())).await? {
            CommandResult::Load(result) => Ok(Response::new(result.into())),
            other => Err(unexpected("load", &other)),
        }
    }

    async fn get_image(
        &self,
        request: Request<pb::GetImageRequest>,
    ) -> Result<Response<pb::GetImageResponse>, Status> {
        match self.execute(roon_bridge_core::GetImageRequest::from(request.into_inner())).await? {
            CommandResult::Image(image) => Ok(Response::new(image.into())),
            other => Err(unexpected("image", &other)),
        }
    }

    // ── Transport ────────────────────────────────────────────────

    async fn change_settings(
        &self,
        request: Request<pb::ChangeSettingsRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::ChangeSettingsRequest::from(request.into_inner()))
            .await
    }

    async fn change_volume(
        &self,
        request: Request<pb::ChangeVolumeRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::ChangeVolumeRequest::from(request.into_inner()))
            .await
    }

    async fn control(
        &self,
        request: Request<pb::ControlRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::ControlRequest::from(request.into_inner()))
            .await
    }

    async fn convenience_switch(
        &self,
        request: Request<pb::ConvenienceSwitchRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::ConvenienceSwitchRequest::from(request.into_inner()))
            .await
    }

    async fn group_outputs(
        &self,
        request: Request<pb::GroupOutputsRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::GroupOutputsRequest::from(request.into_inner()))
            .await
    }

    async fn mute(
        &self,
        request: Request<pb::MuteRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::MuteRequest::from(request.into_inner()))
            .await
    }

    async fn mute_all(
        &self,
        request: Request<pb::MuteAllRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::MuteAllRequest::from(request.into_inner()))
            .await
    }

    async fn pause_all(
        &self,
        _request: Request<pb::PauseAllRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::PauseAllRequest).await
    }

    async fn seek(
        &self,
        request: Request<pb::SeekRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::SeekRequest::from(request.into_inner()))
            .await
    }

    async fn standby(
        &self,
        request: Request<pb::StandbyRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::StandbyRequest::from(request.into_inner()))
            .await
    }

    async fn toggle_standby(
        &self,
        request: Request<pb::ToggleStandbyRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::ToggleStandbyRequest::from(request.into_inner()))
            .await
    }

    async fn transfer_zone(
        &self,
        request: Request<pb::TransferZoneRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::TransferZoneRequest::from(request.into_inner()))
            .await
    }

    async fn ungroup_outputs(
        &self,
        request: Request<pb::UngroupOutputsRequest>,
    ) -> Result<Response<pb::CommandResponse>, Status> {
        self.command(roon_bridge_core::UngroupOutputsRequest::from(request.into_inner()))
            .await
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;
    use tonic::Code;
    use tonic::transport::Channel;

    use roon_bridge_api::CoreInfo;
    use roon_bridge_api::models::{
        BrowseOptions, BrowseResult, Control, Image, ImageOptions, LoadOptions, LoadResult, MuteHow,
        Output, SeekHow, SettingsChange, VolumeHow, Zone, ZoneFeedEvent,
    };
    use roon_bridge_core::{
        BridgeConfig, BrowseApi, ImageApi, ServiceError, Session, StatusReporter, Target,
        TransportApi, ZoneFeed,
    };

    use super::*;
    use crate::proto::roon_service_client::RoonServiceClient;
    use crate::proto::subscribe_zones_response::Event;

    /// Accepts every command and records its name.
    #[derive(Default)]
    struct StubCore {
        calls: Mutex<Vec<String>>,
        feed: Mutex<Option<mpsc::UnboundedReceiver<ZoneFeedEvent>>>,
    }

    impl StubCore {
        fn record(&self, call: &str) -> Result<(), ServiceError> {
            self.calls.lock().unwrap().push(call.to_owned());
            Ok(())
        }
    }

    #[async_trait]
    impl TransportApi for StubCore {
        async fn subscribe_zones(&self) -> Result<ZoneFeed, ServiceError> {
            self.feed
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| ServiceError::Failed("already subscribed".into()))
        }
        async fn change_volume(&self, _: &Output, _: VolumeHow, _: f64) -> Result<(), ServiceError> {
            self.record("change_volume")
        }
        async fn mute(&self, output: &Output, _: MuteHow) -> Result<(), ServiceError> {
            self.record(&format!("mute {}", output.output_id))
        }
        async fn mute_all(&self, _: MuteHow) -> Result<(), ServiceError> {
            self.record("mute_all")
        }
        async fn pause_all(&self) -> Result<(), ServiceError> {
            self.record("pause_all")
        }
        async fn control(&self, _: &Target, _: Control) -> Result<(), ServiceError> {
            self.record("control")
        }
        async fn seek(&self, _: &Target, _: SeekHow, _: i64) -> Result<(), ServiceError> {
            self.record("seek")
        }
        async fn change_settings(&self, _: &Target, _: &SettingsChange) -> Result<(), ServiceError> {
            self.record("change_settings")
        }
        async fn standby(&self, _: &Output, _: Option<&str>) -> Result<(), ServiceError> {
            self.record("standby")
        }
        async fn toggle_standby(&self, _: &Output, _: Option<&str>) -> Result<(), ServiceError> {
            self.record("toggle_standby")
        }
        async fn convenience_switch(&self, _: &Output, _: Option<&str>) -> Result<(), ServiceError> {
            self.record("convenience_switch")
        }
        async fn group_outputs(&self, _: &[Output]) -> Result<(), ServiceError> {
            self.record("group_outputs")
        }
        async fn ungroup_outputs(&self, _: &[Output]) -> Result<(), ServiceError> {
            self.record("ungroup_outputs")
        }
        async fn transfer_zone(&self, _: &Target, _: &Target) -> Result<(), ServiceError> {
            self.record("transfer_zone")
        }
    }

    #[async_trait]
    impl BrowseApi for StubCore {
        async fn browse(&self, _: &BrowseOptions) -> Result<BrowseResult, ServiceError> {
            Ok(BrowseResult {
                action: "list".into(),
                ..BrowseResult::default()
            })
        }
        async fn load(&self, _: &LoadOptions) -> Result<LoadResult, ServiceError> {
            Ok(LoadResult::default())
        }
    }

    #[async_trait]
    impl ImageApi for StubCore {
        async fn get_image(&self, _: &str, _: &ImageOptions) -> Result<Image, ServiceError> {
            Ok(Image {
                content_type: "image/png".into(),
                data: vec![0x89, 0x50].into(),
            })
        }
    }

    struct NoStatus;

    #[async_trait]
    impl StatusReporter for NoStatus {
        async fn set_status(&self, _message: &str, _is_error: bool) {}
    }

    fn kitchen() -> Zone {
        Zone {
            zone_id: "Z1".into(),
            display_name: "Kitchen".into(),
            outputs: vec![Output {
                output_id: "O1".into(),
                zone_id: "Z1".into(),
                ..Output::default()
            }],
            ..Zone::default()
        }
    }

    async fn start(bridge: Bridge) -> (RoonServiceClient<Channel>, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(serve(bridge, listener, shutdown.clone()));
        let client = RoonServiceClient::connect(format!("http://{addr}")).await.unwrap();
        (client, shutdown)
    }

    async fn paired_bridge() -> (Bridge, Arc<StubCore>) {
        let bridge = Bridge::new(&BridgeConfig::default(), Arc::new(NoStatus));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(ZoneFeedEvent::Subscribed(vec![kitchen()])).unwrap();
        let core = Arc::new(StubCore {
            feed: Mutex::new(Some(rx)),
            ..StubCore::default()
        });
        bridge
            .on_paired(Session {
                core: CoreInfo {
                    core_id: "C1".into(),
                    display_name: "Core".into(),
                    display_version: "2.0".into(),
                },
                transport: core.clone(),
                browse: core.clone(),
                image: core.clone(),
            })
            .await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while bridge.store().zone("Z1").await.is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        (bridge, core)
    }

    #[test]
    fn bridge_errors_map_to_status_codes() {
        assert_eq!(to_status(BridgeError::Unavailable).code(), Code::Unavailable);
        assert_eq!(to_status(BridgeError::invalid("x")).code(), Code::InvalidArgument);
        assert_eq!(to_status(BridgeError::zone_not_found("Z")).code(), Code::NotFound);
        let internal = to_status(BridgeError::Internal("NetworkError".into()));
        assert_eq!(internal.code(), Code::Internal);
        assert_eq!(internal.message(), "Error: NetworkError");
    }

    #[tokio::test]
    async fn unpaired_calls_are_unavailable() {
        let bridge = Bridge::new(&BridgeConfig::default(), Arc::new(NoStatus));
        let (mut client, shutdown) = start(bridge).await;

        let err = client
            .get_zone(pb::GetZoneRequest { zone_id: "Z1".into() })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);

        let err = client.list_all_zones(pb::ListAllZonesRequest {}).await.unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);

        let err = client.pause_all(pb::PauseAllRequest {}).await.unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn unpaired_subscription_starts_with_an_empty_snapshot() {
        let bridge = Bridge::new(&BridgeConfig::default(), Arc::new(NoStatus));
        let (mut client, shutdown) = start(bridge).await;

        let mut stream = client
            .subscribe_zones(pb::SubscribeZonesRequest {})
            .await
            .unwrap()
            .into_inner();

        let first = stream.message().await.unwrap().unwrap();
        let Some(Event::Subscribed(snapshot)) = first.event else {
            panic!("expected snapshot, got {first:?}");
        };
        assert!(snapshot.zones.is_empty());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn paired_reads_return_cached_zones() {
        let (bridge, _core) = paired_bridge().await;
        let (mut client, shutdown) = start(bridge).await;

        let zone = client
            .get_zone(pb::GetZoneRequest { zone_id: "Z1".into() })
            .await
            .unwrap()
            .into_inner()
            .zone
            .unwrap();
        assert_eq!(zone.display_name, "Kitchen");

        let err = client
            .get_zone(pb::GetZoneRequest { zone_id: "nope".into() })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(err.message(), "Zone nope not found");

        let zones = client
            .list_all_zones(pb::ListAllZonesRequest {})
            .await
            .unwrap()
            .into_inner()
            .zones;
        assert_eq!(zones.len(), 1);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn commands_validate_then_forward() {
        let (bridge, core) = paired_bridge().await;
        let (mut client, shutdown) = start(bridge).await;

        client
            .mute(pb::MuteRequest {
                output_id: "O1".into(),
                how: pb::MuteHow::Mute.into(),
            })
            .await
            .unwrap();

        let err = client
            .change_volume(pb::ChangeVolumeRequest {
                output_id: "O1".into(),
                how: pb::VolumeHow::Unspecified.into(),
                value: 10.0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let err = client
            .group_outputs(pb::GroupOutputsRequest {
                output_ids: vec!["O1".into(), "O7".into()],
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(err.message(), "Outputs O7 not found");

        let err = client
            .browse(pb::BrowseRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        assert_eq!(*core.calls.lock().unwrap(), vec!["mute O1".to_owned()]);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn payload_rpcs_encode_results() {
        let (bridge, _core) = paired_bridge().await;
        let (mut client, shutdown) = start(bridge).await;

        let browse = client
            .browse(pb::BrowseRequest {
                hierarchy: pb::BrowseHierarchy::Browse.into(),
                ..pb::BrowseRequest::default()
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(browse.action(), pb::BrowseAction::List);

        let image = client
            .get_image(pb::GetImageRequest {
                image_key: "k".into(),
                format: "image/png".into(),
                ..pb::GetImageRequest::default()
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.image, vec![0x89, 0x50]);

        let err = client
            .get_image(pb::GetImageRequest {
                image_key: "k".into(),
                scale: pb::ImageScale::Fit.into(),
                ..pb::GetImageRequest::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn subscribers_see_unpairing() {
        let (bridge, _core) = paired_bridge().await;
        let (mut client, shutdown) = start(bridge.clone()).await;

        let mut stream = client
            .subscribe_zones(pb::SubscribeZonesRequest {})
            .await
            .unwrap()
            .into_inner();
        let Some(Event::Subscribed(snapshot)) = stream.message().await.unwrap().unwrap().event else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.zones[0].zone_id, "Z1");

        bridge.on_unpaired().await;

        let next = stream.message().await.unwrap().unwrap();
        assert!(matches!(next.event, Some(Event::Unsubscribed(_))));
        shutdown.cancel();
    }
}
