//! Interfaces of the services this crate drives but does not implement:
//! the display registry, the window/compositor service, the host display
//! and the input-injection service.

use std::fmt;
use std::sync::Arc;

use crate::device::{DeviceEvent, VirtualDisplayDescriptor};
use crate::error::HostError;
use crate::input::{InjectMode, PointerEvent};
use crate::queue::SurfaceNotifier;

pub type DisplayId = u32;

/// Identifies one overlay window for its whole life. Never reused, so a
/// late notification for a torn-down window cannot reach its successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayState {
    #[default]
    Unknown,
    Off,
    On,
    Doze,
    DozeSuspend,
    Vr,
}

impl DisplayState {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unknown" => Some(DisplayState::Unknown),
            "off" => Some(DisplayState::Off),
            "on" => Some(DisplayState::On),
            "doze" => Some(DisplayState::Doze),
            "doze_suspend" | "dozesuspend" => Some(DisplayState::DozeSuspend),
            "vr" => Some(DisplayState::Vr),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DisplayState::Unknown => "unknown",
            DisplayState::Off => "off",
            DisplayState::On => "on",
            DisplayState::Doze => "doze",
            DisplayState::DozeSuspend => "doze_suspend",
            DisplayState::Vr => "vr",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HostDisplayInfo {
    pub id: DisplayId,
    pub logical_width: i32,
    pub logical_height: i32,
    pub density_dpi: i32,
    pub refresh_rate: f32,
    pub presentation_deadline_nanos: i64,
    pub state: DisplayState,
}

impl HostDisplayInfo {
    pub fn logical_size(&self) -> (i32, i32) {
        (self.logical_width, self.logical_height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Gravity {
    #[default]
    TopLeft,
}

/// Placement handed to the window service for one overlay view.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowParams {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub content_width: i32,
    pub content_height: i32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub alpha: f32,
    pub touchable: bool,
    pub secure: bool,
    pub gravity: Gravity,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            content_width: 0,
            content_height: 0,
            scale_x: 1.0,
            scale_y: 1.0,
            alpha: 1.0,
            touchable: true,
            secure: false,
            gravity: Gravity::TopLeft,
        }
    }
}

/// Rendering target produced by the surface provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub target: u64,
    pub width: i32,
    pub height: i32,
}

pub trait DisplayRegistry: Send + Sync {
    fn register_device(&self, descriptor: &VirtualDisplayDescriptor) -> Result<DisplayId, HostError>;
    fn notify(&self, id: DisplayId, descriptor: &VirtualDisplayDescriptor, event: DeviceEvent);
}

pub trait WindowService: Send + Sync {
    /// Places a new overlay view. Surface lifecycle and touch input for the
    /// view are reported back through `surfaces`.
    fn add_view(
        &self,
        view: ViewId,
        name: &str,
        params: &WindowParams,
        surfaces: SurfaceNotifier,
    ) -> Result<(), HostError>;
    fn update_view_layout(&self, view: ViewId, params: &WindowParams) -> Result<(), HostError>;
    fn remove_view(&self, view: ViewId) -> Result<(), HostError>;
}

pub trait HostDisplay: Send + Sync {
    /// `None` while the default display is unavailable.
    fn default_display_info(&self) -> Option<HostDisplayInfo>;
}

pub trait InputInjector: Send + Sync {
    fn inject(&self, event: PointerEvent, mode: InjectMode) -> Result<(), HostError>;
}

#[derive(Clone)]
pub struct HostServices {
    pub registry: Arc<dyn DisplayRegistry>,
    pub windows: Arc<dyn WindowService>,
    pub host: Arc<dyn HostDisplay>,
    pub injector: Arc<dyn InputInjector>,
}
