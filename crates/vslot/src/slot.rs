//! Per-slot bookkeeping and lifecycle.
//!
//! A [`Slot`] is only ever touched under the table lock. Its state moves
//! `Created -> WindowScheduled -> SurfacePending -> Live <-> Hidden ->
//! Dismissed`; every transition goes through [`Slot::transition`] so it is
//! logged in one place.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::device::{DisplayDevice, DisplayMode, TouchCapability, VirtualDisplayDescriptor};
use crate::error::SlotError;
use crate::host::{DisplayId, DisplayState, HostDisplayInfo, SurfaceInfo, ViewId};
use crate::queue::TaskHandle;
use crate::table::TableShared;
use crate::window::WindowListener;

pub const PRIMARY_SLOTS: u8 = 4;
pub const MAX_SLOTS: u8 = PRIMARY_SLOTS * 2;

/// Slot address. `0..4` are primaries, `i + 4` mirrors primary `i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub fn new(raw: u8) -> Result<Self, SlotError> {
        if raw < MAX_SLOTS {
            Ok(Self(raw))
        } else {
            Err(SlotError::InvalidIndex(raw))
        }
    }

    pub fn primary(raw: u8) -> Option<Self> {
        (raw < PRIMARY_SLOTS).then_some(Self(raw))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_mirror(self) -> bool {
        self.0 >= PRIMARY_SLOTS
    }

    /// The mirror partner of a primary; `None` for mirrors.
    pub fn mirror(self) -> Option<Self> {
        (!self.is_mirror()).then_some(Self(self.0 + PRIMARY_SLOTS))
    }

    pub fn primary_of(self) -> Self {
        Self(self.0 % PRIMARY_SLOTS)
    }

    pub fn name(self) -> String {
        format!("vslot-{}", self.0)
    }

    pub fn unique_id(self) -> String {
        format!("vslot:{}", self.0)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Created,
    WindowScheduled,
    SurfacePending,
    Live,
    Hidden,
    Dismissed,
}

impl SlotState {
    pub fn name(&self) -> &'static str {
        match self {
            SlotState::Created => "created",
            SlotState::WindowScheduled => "window_scheduled",
            SlotState::SurfacePending => "surface_pending",
            SlotState::Live => "live",
            SlotState::Hidden => "hidden",
            SlotState::Dismissed => "dismissed",
        }
    }

    /// Still waiting for the surface to show up.
    pub fn is_pending(&self) -> bool {
        matches!(self, SlotState::WindowScheduled | SlotState::SurfacePending)
    }
}

#[derive(Debug)]
pub struct Slot {
    pub(crate) index: SlotIndex,
    pub(crate) view: ViewId,
    pub(crate) name: String,
    pub(crate) mode: DisplayMode,
    pub(crate) visible: bool,
    pub(crate) gesture_mode: bool,
    state: SlotState,
    device: Option<DisplayDevice>,
    show_task: Option<TaskHandle>,
    scheduled_at: Instant,
}

impl Slot {
    pub fn new(index: SlotIndex, view: ViewId, mode: DisplayMode, visible: bool, gesture_mode: bool) -> Self {
        let slot = Self {
            index,
            view,
            name: index.name(),
            mode,
            visible,
            gesture_mode,
            state: SlotState::Created,
            device: None,
            show_task: None,
            scheduled_at: Instant::now(),
        };
        log::info!(
            "[slot] {} created {}x{} @{}dpi{}",
            slot.name,
            mode.width,
            mode.height,
            mode.density_dpi,
            if index.is_mirror() { " (mirror)" } else { "" }
        );
        slot
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub(crate) fn device_mut(&mut self) -> Option<&mut DisplayDevice> {
        self.device.as_mut()
    }

    fn transition(&mut self, next: SlotState) {
        if self.state == next {
            return;
        }
        log::info!("[slot] {}: {} -> {}", self.name, self.state.name(), next.name());
        self.state = next;
    }

    fn settled_state(&self) -> SlotState {
        if self.visible {
            SlotState::Live
        } else {
            SlotState::Hidden
        }
    }

    pub(crate) fn window_scheduled(&mut self, show_task: TaskHandle) {
        self.show_task = Some(show_task);
        self.scheduled_at = Instant::now();
        self.transition(SlotState::WindowScheduled);
    }

    /// The show task ran; the surface is now up to the window service.
    pub(crate) fn window_shown(&mut self) {
        self.show_task = None;
        if self.state == SlotState::WindowScheduled {
            self.transition(SlotState::SurfacePending);
        }
    }

    pub(crate) fn surface_ready(&mut self, device: DisplayDevice) -> Option<DisplayDevice> {
        let previous = self.device.replace(device);
        self.transition(self.settled_state());
        previous
    }

    /// Drops the device but keeps the slot around for a later surface.
    pub(crate) fn surface_lost(&mut self) -> Option<DisplayDevice> {
        self.device.take()
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if matches!(self.state, SlotState::Live | SlotState::Hidden) {
            self.transition(self.settled_state());
        }
    }

    /// Cancels a pending show and hands back the device for teardown.
    pub(crate) fn dismiss(&mut self) -> Option<DisplayDevice> {
        if let Some(task) = self.show_task.take() {
            task.cancel();
        }
        self.transition(SlotState::Dismissed);
        self.device.take()
    }

    pub fn pending_for(&self) -> Option<Duration> {
        self.state.is_pending().then(|| self.scheduled_at.elapsed())
    }

    pub fn info(&self) -> SlotInfo {
        SlotInfo {
            index: self.index,
            name: self.name.clone(),
            mode: self.mode,
            mirror: self.index.is_mirror(),
            visible: self.visible,
            gesture_mode: self.gesture_mode,
            state: self.state,
            display_id: self.device.as_ref().map(|d| d.id()),
        }
    }
}

/// Point-in-time copy of a slot, safe to hand out of the table lock.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotInfo {
    pub index: SlotIndex,
    pub name: String,
    pub mode: DisplayMode,
    pub mirror: bool,
    pub visible: bool,
    pub gesture_mode: bool,
    pub state: SlotState,
    pub display_id: Option<DisplayId>,
}

/// Connects one overlay window back to its slot's display device.
pub(crate) struct SlotListener {
    shared: Arc<TableShared>,
    index: SlotIndex,
    view: ViewId,
}

impl SlotListener {
    pub(crate) fn new(shared: Arc<TableShared>, index: SlotIndex, view: ViewId) -> Self {
        Self {
            shared,
            index,
            view,
        }
    }
}

impl WindowListener for SlotListener {
    fn on_window_created(&self, surface: SurfaceInfo, host: &HostDisplayInfo) -> Option<DisplayId> {
        let registry = self.shared.services.registry.clone();
        let mut inner = self.shared.lock();
        let slot = inner.slot_for_view(self.index, self.view)?;
        if slot.state == SlotState::Dismissed {
            return None;
        }

        let touch = if self.index.is_mirror() {
            TouchCapability::None
        } else {
            TouchCapability::Virtual
        };
        let descriptor =
            VirtualDisplayDescriptor::new(&slot.name, &self.index.unique_id(), slot.mode, host, touch);

        match DisplayDevice::publish(registry.as_ref(), descriptor, surface) {
            Ok(device) => {
                let id = device.id();
                if let Some(stale) = slot.surface_ready(device) {
                    stale.destroy(registry.as_ref());
                }
                Some(id)
            }
            Err(e) => {
                log::warn!("[slot] {}: failed to publish display: {}", slot.name, e);
                None
            }
        }
    }

    fn on_window_destroyed(&self) {
        let registry = self.shared.services.registry.clone();
        let mut inner = self.shared.lock();
        let Some(slot) = inner.slot_for_view(self.index, self.view) else {
            return;
        };
        if let Some(device) = slot.surface_lost() {
            device.destroy(registry.as_ref());
            log::info!("[slot] {}: surface gone, waiting for a new one", slot.name);
        }
    }

    fn on_state_changed(&self, state: DisplayState) {
        let registry = self.shared.services.registry.clone();
        let mut inner = self.shared.lock();
        if let Some(device) = inner
            .slot_for_view(self.index, self.view)
            .and_then(|slot| slot.device_mut())
        {
            device.set_state(registry.as_ref(), state);
        }
    }
}
