//! Cloud Trace v1 gRPC client.

use super::TraceBackend;
use crate::error::{BridgeError, Result};
use shared::cloudtrace::{proto, GET_TRACE_PATH, LIST_TRACES_PATH};
use std::time::Duration;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// [`TraceBackend`] talking to the Cloud Trace API over gRPC.
#[derive(Clone)]
pub struct CloudTraceClient {
    grpc: tonic::client::Grpc<Channel>,
    authorization: Option<MetadataValue<Ascii>>,
}

impl CloudTraceClient {
    /// Connects to `endpoint`, using TLS with the system roots for `https` URLs.
    ///
    /// When `access_token` is set, every call carries it as a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::BackendInit` if the endpoint is malformed, the
    /// token is not a valid header value, or the connection fails.
    pub async fn connect(endpoint: &str, access_token: Option<&str>) -> Result<Self> {
        let authorization = access_token
            .map(|token| MetadataValue::<Ascii>::try_from(format!("Bearer {token}")))
            .transpose()
            .map_err(|e| BridgeError::BackendInit(format!("invalid access token: {e}")))?;

        let mut builder = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| BridgeError::BackendInit(format!("invalid endpoint {endpoint}: {e}")))?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .keep_alive_while_idle(true)
            .http2_keep_alive_interval(KEEP_ALIVE_INTERVAL);

        if endpoint.starts_with("https://") {
            builder = builder
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| BridgeError::BackendInit(e.to_string()))?;
        }

        let channel = builder
            .connect()
            .await
            .map_err(|e| BridgeError::BackendInit(format!("connect to {endpoint}: {e}")))?;

        tracing::info!(
            endpoint,
            authenticated = authorization.is_some(),
            "Connected to Cloud Trace"
        );

        Ok(Self {
            grpc: tonic::client::Grpc::new(channel),
            authorization,
        })
    }

    async fn unary<Req, Resp>(
        &self,
        message: Req,
        path: &'static str,
    ) -> std::result::Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.grpc.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("Cloud Trace channel not ready: {e}")))?;

        let mut request = Request::new(message);
        if let Some(value) = &self.authorization {
            request.metadata_mut().insert("authorization", value.clone());
        }

        let codec = tonic_prost::ProstCodec::<Req, Resp>::default();
        grpc.unary(request, PathAndQuery::from_static(path), codec)
            .await
            .map(tonic::Response::into_inner)
    }
}

#[async_trait::async_trait]
impl TraceBackend for CloudTraceClient {
    async fn list_traces(
        &self,
        request: proto::ListTracesRequest,
    ) -> std::result::Result<proto::ListTracesResponse, Status> {
        self.unary(request, LIST_TRACES_PATH).await
    }

    async fn get_trace(
        &self,
        request: proto::GetTraceRequest,
    ) -> std::result::Result<proto::Trace, Status> {
        self.unary(request, GET_TRACE_PATH).await
    }
}

impl std::fmt::Debug for CloudTraceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudTraceClient")
            .field("authenticated", &self.authorization.is_some())
            .finish_non_exhaustive()
    }
}
