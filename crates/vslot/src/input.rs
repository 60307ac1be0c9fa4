use std::sync::Arc;

use vslot_common::{TouchAction, TouchPoint};

use crate::host::{DisplayId, InputInjector};
use crate::transform::Placement;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerAction {
    Down,
    Move,
    Up,
    Cancel,
    PointerDown,
    PointerUp,
}

impl From<TouchAction> for PointerAction {
    fn from(action: TouchAction) -> Self {
        match action {
            TouchAction::Down => PointerAction::Down,
            TouchAction::Move => PointerAction::Move,
            TouchAction::Up => PointerAction::Up,
            TouchAction::Cancel => PointerAction::Cancel,
            TouchAction::PointerDown => PointerAction::PointerDown,
            TouchAction::PointerUp => PointerAction::PointerUp,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerCoords {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

impl From<TouchPoint> for PointerCoords {
    fn from(point: TouchPoint) -> Self {
        Self {
            id: point.id,
            x: point.x,
            y: point.y,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectMode {
    Async,
    WaitForResult,
    WaitForFinish,
}

/// A touch event in the coordinate space of whoever currently holds it.
#[derive(Clone, Debug, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub pointers: Vec<PointerCoords>,
    /// Pointer going down or up for `PointerDown`/`PointerUp`.
    pub action_pointer: Option<u32>,
    pub event_time_ms: u64,
    pub display_id: Option<DisplayId>,
}

impl PointerEvent {
    pub fn new(action: PointerAction, pointers: Vec<PointerCoords>) -> Self {
        Self {
            action,
            pointers,
            action_pointer: None,
            event_time_ms: 0,
            display_id: None,
        }
    }

    pub fn single(action: PointerAction, x: f32, y: f32) -> Self {
        Self::new(action, vec![PointerCoords { id: 0, x, y }])
    }

    pub fn with_action_pointer(mut self, id: u32) -> Self {
        self.action_pointer = Some(id);
        self
    }
}

/// Forwards pass-through touches to the virtual display behind a window.
pub struct InputRedirector {
    injector: Arc<dyn InputInjector>,
}

impl InputRedirector {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        Self { injector }
    }

    /// Maps window-local coordinates into the slot's own coordinate space.
    pub fn to_slot_space(event: &PointerEvent, placement: &Placement, display: DisplayId) -> PointerEvent {
        let mut mapped = event.clone();
        for pointer in &mut mapped.pointers {
            pointer.x /= placement.scale_x;
            pointer.y /= placement.scale_y;
        }
        mapped.display_id = Some(display);
        mapped
    }

    pub fn redirect(&self, event: &PointerEvent, placement: &Placement, display: DisplayId) {
        let mapped = Self::to_slot_space(event, placement, display);
        if let Err(e) = self.injector.inject(mapped, InjectMode::Async) {
            log::debug!("[input] Injection to display {} failed: {}", display, e);
        }
    }
}
