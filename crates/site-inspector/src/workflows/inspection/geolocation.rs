//! Best-effort device position and reverse-geocoded address.
//!
//! Nothing here ever fails a submission: every platform or network error
//! collapses into "no location" or "no address", and the raw coordinates are
//! enough provenance on their own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::domain::{GeoPoint, GeoTag};
use crate::config::{GeocoderConfig, PipelineConfig};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("no position available")]
    Unavailable,
    #[error("position request timed out")]
    Timeout,
}

/// Device positioning API.
#[async_trait]
pub trait DeviceLocator: Send + Sync {
    async fn current_position(&self, timeout: Duration) -> Result<GeoPoint, LocationError>;
}

/// Position reported by the capturing device alongside its upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedPosition(pub Option<GeoPoint>);

#[async_trait]
impl DeviceLocator for ReportedPosition {
    async fn current_position(&self, _timeout: Duration) -> Result<GeoPoint, LocationError> {
        self.0.ok_or(LocationError::Unavailable)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDeviceLocation;

#[async_trait]
impl DeviceLocator for NoDeviceLocation {
    async fn current_position(&self, _timeout: Duration) -> Result<GeoPoint, LocationError> {
        Err(LocationError::Unavailable)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoder returned status {0}")]
    Status(u16),
    #[error("geocoder url '{url}' is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Address lookup for a coordinate pair. `Ok(None)` means the service
/// answered but had no address for the point.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError>;
}

/// OpenStreetMap Nominatim `/reverse` client.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl NominatimGeocoder {
    /// `request_timeout` is the service-side budget; callers still apply
    /// their own hard timeout on top of it.
    pub fn new(config: &GeocoderConfig, request_timeout: Duration) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(request_timeout)
            .build()?;

        let url = format!("{}/reverse", config.base_url.trim_end_matches('/'));
        let endpoint = reqwest::Url::parse(&url).map_err(|err| GeocodeError::InvalidUrl {
            reason: err.to_string(),
            url,
        })?;

        Ok(Self { client, endpoint })
    }

    fn reverse_url(&self, point: GeoPoint) -> reqwest::Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("format", "jsonv2")
            .append_pair("lat", &point.lat.to_string())
            .append_pair("lon", &point.lng.to_string());
        url
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        let response = self
            .client
            .get(self.reverse_url(point))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        Ok(parse_display_name(&body))
    }
}

/// Used when address lookup is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeocoder;

#[async_trait]
impl ReverseGeocoder for DisabledGeocoder {
    async fn reverse_geocode(&self, _point: GeoPoint) -> Result<Option<String>, GeocodeError> {
        Ok(None)
    }
}

pub(crate) fn parse_display_name(body: &Value) -> Option<String> {
    body.get("display_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Handle to an in-flight address lookup.
///
/// Owns the spawned task: the lookup is aborted when the handle is dropped,
/// and waiting on it is always bounded by the lookup's own deadline.
#[derive(Debug)]
pub struct PendingAddress {
    receiver: Option<oneshot::Receiver<Option<String>>>,
    resolved: Option<String>,
    deadline: Instant,
    task: Option<AbortHandle>,
}

impl PendingAddress {
    fn spawn(geocoder: Arc<dyn ReverseGeocoder>, point: GeoPoint, timeout: Duration) -> Self {
        let (sender, receiver) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let address = match tokio::time::timeout(timeout, geocoder.reverse_geocode(point)).await
            {
                Ok(Ok(address)) => address,
                Ok(Err(err)) => {
                    warn!(error = %err, "reverse geocoding failed; keeping raw coordinates");
                    None
                }
                Err(_) => {
                    warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        "reverse geocoding timed out; keeping raw coordinates"
                    );
                    None
                }
            };
            let _ = sender.send(address);
        });

        Self {
            receiver: Some(receiver),
            resolved: None,
            deadline: Instant::now() + timeout,
            task: Some(handle.abort_handle()),
        }
    }

    /// A handle that will never produce an address.
    pub fn none() -> Self {
        Self {
            receiver: None,
            resolved: None,
            deadline: Instant::now(),
            task: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.receiver.is_some()
    }

    /// Non-blocking check for a finished lookup.
    pub fn poll_now(&mut self) -> Option<&str> {
        if let Some(receiver) = self.receiver.as_mut() {
            match receiver.try_recv() {
                Ok(address) => {
                    self.resolved = address;
                    self.receiver = None;
                }
                Err(oneshot::error::TryRecvError::Empty) => {
                    if Instant::now() >= self.deadline {
                        self.expire();
                    }
                }
                Err(oneshot::error::TryRecvError::Closed) => self.receiver = None,
            }
        }
        self.resolved.as_deref()
    }

    /// Waits at most `grace` (and never past the lookup deadline) for the
    /// address. A lookup still running afterwards stays pending.
    pub async fn wait_for(&mut self, grace: Duration) -> Option<&str> {
        if let Some(receiver) = self.receiver.as_mut() {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            let outcome = tokio::time::timeout(grace.min(remaining), receiver).await;
            match outcome {
                Ok(Ok(address)) => {
                    self.resolved = address;
                    self.receiver = None;
                }
                Ok(Err(_)) => self.receiver = None,
                Err(_) if Instant::now() >= self.deadline => self.expire(),
                Err(_) => debug!("address still resolving; watermarking with coordinates"),
            }
        }
        self.resolved.as_deref()
    }

    fn expire(&mut self) {
        self.receiver = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PendingAddress {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Device position plus the address lookup it triggered.
#[derive(Debug)]
pub struct ResolvedLocation {
    pub point: GeoPoint,
    pub address: PendingAddress,
}

impl ResolvedLocation {
    /// Geotag with whatever address has arrived within `grace`.
    pub async fn geotag_within(&mut self, grace: Duration) -> GeoTag {
        let address = self.address.wait_for(grace).await.map(str::to_string);
        GeoTag::new(self.point, address)
    }
}

/// Single-attempt, fail-soft position and address acquisition.
#[derive(Clone)]
pub struct LocationAdapter {
    geocoder: Arc<dyn ReverseGeocoder>,
    location_timeout: Duration,
    geocode_timeout: Duration,
}

impl LocationAdapter {
    pub fn new(
        geocoder: Arc<dyn ReverseGeocoder>,
        location_timeout: Duration,
        geocode_timeout: Duration,
    ) -> Self {
        Self {
            geocoder,
            location_timeout,
            geocode_timeout,
        }
    }

    pub fn from_config(geocoder: Arc<dyn ReverseGeocoder>, config: &PipelineConfig) -> Self {
        Self::new(geocoder, config.location_timeout, config.geocode_timeout)
    }

    /// Without an address service; photos are tagged with coordinates only.
    pub fn coordinates_only(location_timeout: Duration) -> Self {
        Self::new(Arc::new(DisabledGeocoder), location_timeout, Duration::ZERO)
    }

    pub async fn acquire_location(&self, locator: &dyn DeviceLocator) -> Option<GeoPoint> {
        let attempt = locator.current_position(self.location_timeout);
        match tokio::time::timeout(self.location_timeout, attempt).await {
            Ok(Ok(point)) => Some(point),
            Ok(Err(err)) => {
                debug!(error = %err, "device location unavailable");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.location_timeout.as_millis() as u64,
                    "device location timed out"
                );
                None
            }
        }
    }

    /// Starts the address lookup in the background and returns immediately.
    pub fn reverse_geocode(&self, point: GeoPoint) -> PendingAddress {
        if self.geocode_timeout.is_zero() {
            return PendingAddress::none();
        }
        PendingAddress::spawn(self.geocoder.clone(), point, self.geocode_timeout)
    }

    pub async fn locate(&self, locator: &dyn DeviceLocator) -> Option<ResolvedLocation> {
        let point = self.acquire_location(locator).await?;
        Some(ResolvedLocation {
            point,
            address: self.reverse_geocode(point),
        })
    }
}

impl std::fmt::Debug for LocationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationAdapter")
            .field("location_timeout", &self.location_timeout)
            .field("geocode_timeout", &self.geocode_timeout)
            .finish_non_exhaustive()
    }
}
