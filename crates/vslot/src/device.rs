use crate::error::HostError;
use crate::host::{DisplayId, DisplayRegistry, DisplayState, HostDisplayInfo, SurfaceInfo};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: i32,
    pub height: i32,
    pub density_dpi: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    Added,
    Changed,
    Removed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchCapability {
    None,
    Virtual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayKind {
    Overlay,
}

/// What the registry learns about a virtual display. Replaced wholesale on
/// every change, never edited after publication.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualDisplayDescriptor {
    pub name: String,
    pub unique_id: String,
    pub width: i32,
    pub height: i32,
    pub density_dpi: i32,
    pub x_dpi: f32,
    pub y_dpi: f32,
    pub refresh_rate: f32,
    pub presentation_deadline_nanos: i64,
    pub state: DisplayState,
    pub kind: DisplayKind,
    pub presentation: bool,
    pub touch: TouchCapability,
    pub stable_unique_id: bool,
}

impl VirtualDisplayDescriptor {
    pub fn new(
        name: &str,
        unique_id: &str,
        mode: DisplayMode,
        host: &HostDisplayInfo,
        touch: TouchCapability,
    ) -> Self {
        // One frame of slack on top of the host's own deadline.
        let frame_nanos = if host.refresh_rate > 0.0 {
            (NANOS_PER_SECOND as f64 / host.refresh_rate as f64) as i64
        } else {
            0
        };

        Self {
            name: name.to_string(),
            unique_id: unique_id.to_string(),
            width: mode.width,
            height: mode.height,
            density_dpi: mode.density_dpi,
            x_dpi: mode.density_dpi as f32,
            y_dpi: mode.density_dpi as f32,
            refresh_rate: host.refresh_rate,
            presentation_deadline_nanos: host.presentation_deadline_nanos + frame_nanos,
            state: host.state,
            kind: DisplayKind::Overlay,
            presentation: true,
            touch,
            stable_unique_id: false,
        }
    }

    pub fn with_state(&self, state: DisplayState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    pub fn with_mode(&self, mode: DisplayMode) -> Self {
        Self {
            width: mode.width,
            height: mode.height,
            density_dpi: mode.density_dpi,
            x_dpi: mode.density_dpi as f32,
            y_dpi: mode.density_dpi as f32,
            ..self.clone()
        }
    }
}

/// A virtual display published to the registry. Exists only while the
/// backing surface does.
#[derive(Debug)]
pub struct DisplayDevice {
    id: DisplayId,
    descriptor: VirtualDisplayDescriptor,
    surface: SurfaceInfo,
}

impl DisplayDevice {
    pub fn publish(
        registry: &dyn DisplayRegistry,
        descriptor: VirtualDisplayDescriptor,
        surface: SurfaceInfo,
    ) -> Result<Self, HostError> {
        let id = registry.register_device(&descriptor)?;
        registry.notify(id, &descriptor, DeviceEvent::Added);
        log::info!(
            "[device] {} added as display {} ({}x{} @{}dpi, surface {})",
            descriptor.name,
            id,
            descriptor.width,
            descriptor.height,
            descriptor.density_dpi,
            surface.target
        );
        Ok(Self {
            id,
            descriptor,
            surface,
        })
    }

    pub fn id(&self) -> DisplayId {
        self.id
    }

    pub fn descriptor(&self) -> &VirtualDisplayDescriptor {
        &self.descriptor
    }

    pub fn surface(&self) -> SurfaceInfo {
        self.surface
    }

    pub fn set_state(&mut self, registry: &dyn DisplayRegistry, state: DisplayState) {
        self.descriptor = self.descriptor.with_state(state);
        registry.notify(self.id, &self.descriptor, DeviceEvent::Changed);
        log::debug!("[device] {} state -> {}", self.descriptor.name, state.name());
    }

    pub fn set_mode(&mut self, registry: &dyn DisplayRegistry, mode: DisplayMode) {
        self.descriptor = self.descriptor.with_mode(mode);
        registry.notify(self.id, &self.descriptor, DeviceEvent::Changed);
        log::debug!(
            "[device] {} mode -> {}x{}",
            self.descriptor.name,
            mode.width,
            mode.height
        );
    }

    pub fn destroy(self, registry: &dyn DisplayRegistry) {
        registry.notify(self.id, &self.descriptor, DeviceEvent::Removed);
        log::info!("[device] {} removed (display {})", self.descriptor.name, self.id);
    }
}
