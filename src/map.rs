//! # Map Lifecycle
//!
//! The map itself is an opaque external service. This module only owns its
//! lifecycle: attach once the container has a size, retry on a short fixed delay
//! while it does not, forward resizes, log errors, and detach on teardown.
//!
//! A missing access token disables the map for the session; the rest of the
//! dashboard keeps running.

use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Delay before re-attempting attach on a zero-sized container
pub const ATTACH_RETRY: Duration = Duration::from_millis(100);

/// Errors reported by a map surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError {
    #[error("missing map access token")]
    MissingToken,

    #[error("map backend: {0}")]
    Backend(String),
}

/// Camera and credentials for the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Place name shown alongside the map
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub access_token: Option<String>,
}

impl MapConfig {
    /// Build from the location section, reading the token from the environment.
    pub fn from_location(location: &crate::config::LocationConfig) -> Self {
        let access_token = std::env::var(&location.access_token_env)
            .ok()
            .filter(|token| !token.trim().is_empty());
        MapConfig {
            name: location.name.clone(),
            longitude: location.longitude,
            latitude: location.latitude,
            zoom: location.zoom,
            pitch: location.pitch,
            bearing: location.bearing,
            access_token,
        }
    }
}

/// Size of the map container, in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSize {
    pub width: u16,
    pub height: u16,
}

impl ContainerSize {
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Event raised by a surface after attach.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    Ready,
    Error(MapError),
}

/// A map backend.
pub trait MapSurface {
    type Handle;

    fn attach(&mut self, size: ContainerSize, config: &MapConfig)
        -> Result<Self::Handle, MapError>;

    fn resize(&mut self, handle: &mut Self::Handle, size: ContainerSize);

    /// Next pending lifecycle event for `handle`, if any.
    fn poll_event(&mut self, handle: &Self::Handle) -> Option<MapEvent>;

    fn detach(&mut self, handle: Self::Handle);
}

/// Lifecycle state of the hosted map.
#[derive(Debug)]
pub enum MapState<H> {
    /// Not started yet
    Idle,
    /// Waiting for the container to get a size
    Retrying { at: Instant },
    /// Attached; `ready` once the surface reported it
    Attached { handle: H, ready: bool },
    /// Permanently off for this session
    Disabled(MapError),
    /// Torn down
    Detached,
}

/// Drives a [`MapSurface`] through its lifecycle.
pub struct MapHost<S: MapSurface> {
    surface: S,
    config: MapConfig,
    state: MapState<S::Handle>,
}

impl<S: MapSurface> MapHost<S> {
    pub fn new(surface: S, config: MapConfig) -> Self {
        MapHost {
            surface,
            config,
            state: MapState::Idle,
        }
    }

    pub fn state(&self) -> &MapState<S::Handle> {
        &self.state
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Attached handle, if any.
    pub fn handle(&self) -> Option<&S::Handle> {
        match &self.state {
            MapState::Attached { handle, .. } => Some(handle),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, MapState::Attached { ready: true, .. })
    }

    /// Try to attach now.
    pub fn start(&mut self, size: ContainerSize, now: Instant) {
        if !matches!(self.state, MapState::Idle | MapState::Retrying { .. }) {
            return;
        }
        if self.config.access_token.is_none() {
            error!("Missing map access token; map disabled");
            self.state = MapState::Disabled(MapError::MissingToken);
            return;
        }
        if size.is_zero() {
            if matches!(self.state, MapState::Idle) {
                warn!(
                    "Map container has zero size ({}x{}), retrying",
                    size.width, size.height
                );
            } else {
                debug!("Map container still zero-sized");
            }
            self.state = MapState::Retrying {
                at: now + ATTACH_RETRY,
            };
            return;
        }
        self.state = match self.surface.attach(size, &self.config) {
            Ok(handle) => MapState::Attached {
                handle,
                ready: false,
            },
            Err(e) => {
                error!("Map attach failed: {}", e);
                MapState::Disabled(e)
            }
        };
    }

    /// Run due retries and dispatch pending surface events.
    pub fn poll(&mut self, size: ContainerSize, now: Instant) {
        if let MapState::Retrying { at } = self.state {
            if now >= at {
                self.start(size, now);
            }
        }
        while let Some(event) = self.next_event() {
            match event {
                MapEvent::Ready => self.on_ready(),
                MapEvent::Error(e) => self.on_error(&e),
            }
        }
    }

    fn next_event(&mut self) -> Option<MapEvent> {
        match &self.state {
            MapState::Attached { handle, .. } => self.surface.poll_event(handle),
            _ => None,
        }
    }

    pub fn on_ready(&mut self) {
        if let MapState::Attached { ready, .. } = &mut self.state {
            if !*ready {
                info!("Map loaded successfully");
            }
            *ready = true;
        }
    }

    /// Surface errors are logged; the map stays attached.
    pub fn on_error(&mut self, e: &MapError) {
        error!("Map error: {}", e);
    }

    pub fn on_resize(&mut self, size: ContainerSize) {
        if let MapState::Attached { handle, .. } = &mut self.state {
            self.surface.resize(handle, size);
        }
    }

    /// Detach the surface and stop all lifecycle handling.
    pub fn teardown(&mut self) {
        let state = std::mem::replace(&mut self.state, MapState::Detached);
        if let MapState::Attached { handle, .. } = state {
            self.surface.detach(handle);
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

/// Map rendered as a header: place, coordinates and a static-image link.
#[derive(Debug, Default)]
pub struct HeaderMap {
    pending: Vec<MapEvent>,
    attached: usize,
}

/// What [`HeaderMap`] shows.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderView {
    pub title: String,
    pub camera: MapConfig,
    pub size: ContainerSize,
}

const STATIC_STYLE: &str = "mapbox/streets-v12";

/// Placeholder shown instead of the access token
const REDACTED: &str = "<redacted>";

impl HeaderView {
    /// Static-image URL for the current size, including the access token.
    pub fn image_url(&self) -> String {
        let token = self.camera.access_token.as_deref().unwrap_or_default();
        HeaderMap::image_url(&self.camera, token, self.size)
    }

    /// The same URL with the token hidden, safe to put on screen.
    pub fn display_url(&self) -> String {
        HeaderMap::image_url(&self.camera, REDACTED, self.size)
    }
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live attachments.
    pub fn attached(&self) -> usize {
        self.attached
    }

    fn image_url(config: &MapConfig, token: &str, size: ContainerSize) -> String {
        // ~8x16 px per cell, capped at the static API maximum
        let width = (u32::from(size.width) * 8).clamp(1, 1280);
        let height = (u32::from(size.height) * 16).clamp(1, 1280);
        format!(
            "https://api.mapbox.com/styles/v1/{}/static/{:.6},{:.6},{},{},{}/{}x{}?access_token={}",
            STATIC_STYLE,
            config.longitude,
            config.latitude,
            config.zoom,
            config.bearing,
            config.pitch,
            width,
            height,
            token
        )
    }
}

impl MapSurface for HeaderMap {
    type Handle = HeaderView;

    fn attach(&mut self, size: ContainerSize, config: &MapConfig) -> Result<HeaderView, MapError> {
        if config.access_token.is_none() {
            return Err(MapError::MissingToken);
        }
        if !(-180.0..=180.0).contains(&config.longitude) || !(-90.0..=90.0).contains(&config.latitude)
        {
            return Err(MapError::Backend(format!(
                "center out of range: {}, {}",
                config.longitude, config.latitude
            )));
        }
        let (ns, ew) = (
            if config.latitude >= 0.0 { 'N' } else { 'S' },
            if config.longitude >= 0.0 { 'E' } else { 'W' },
        );
        self.attached += 1;
        self.pending.push(MapEvent::Ready);
        Ok(HeaderView {
            title: format!(
                "{}  {:.5}°{} {:.5}°{}  z{}",
                config.name,
                config.latitude.abs(),
                ns,
                config.longitude.abs(),
                ew,
                config.zoom
            ),
            camera: config.clone(),
            size,
        })
    }

    fn resize(&mut self, handle: &mut HeaderView, size: ContainerSize) {
        handle.size = size;
    }

    fn poll_event(&mut self, _handle: &HeaderView) -> Option<MapEvent> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    fn detach(&mut self, _handle: HeaderView) {
        self.attached = self.attached.saturating_sub(1);
        self.pending.clear();
    }
}
