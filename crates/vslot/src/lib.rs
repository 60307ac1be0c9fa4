//! Virtual display slots rendered as overlay windows.
//!
//! A [`SlotTable`] hands out up to four primary slots, each optionally
//! paired with a mirror, and drives their overlay windows through a
//! single-threaded UI queue. Touches on a window are either forwarded to the
//! slot's own display or used to pan and pinch the window itself.

pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod gesture;
pub mod headless;
pub mod host;
pub mod input;
pub mod ipc;
pub mod placement;
pub mod queue;
pub mod slot;
pub mod table;
pub mod transform;
pub mod window;

pub use config::Config;
pub use control::Controller;
pub use device::{DeviceEvent, DisplayDevice, DisplayMode, VirtualDisplayDescriptor};
pub use error::{HostError, SlotError};
pub use host::{DisplayId, DisplayState, HostDisplayInfo, HostServices, SurfaceInfo, ViewId};
pub use input::{InputRedirector, PointerAction, PointerCoords, PointerEvent};
pub use placement::{LayoutMode, Region};
pub use queue::{UiLoop, UiQueue};
pub use slot::{SlotIndex, SlotInfo, SlotState, MAX_SLOTS, PRIMARY_SLOTS};
pub use table::{SlotTable, TableOptions};
pub use transform::{BaseTransform, Placement, ScaleLimits, Transform};
pub use window::{OverlayWindow, TouchMode, WindowListener};
