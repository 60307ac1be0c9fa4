//! The slot table: the one entry point callers use to manage slots.
//!
//! All bookkeeping happens under a single table-wide lock. Window work is
//! posted to the UI queue after the lock is released, so no caller ever
//! waits on the window service.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::device::DisplayMode;
use crate::error::SlotError;
use crate::host::{DisplayId, HostServices, ViewId};
use crate::input::PointerEvent;
use crate::placement::{self, LayoutMode, Region};
use crate::queue::{SurfaceNotifier, UiQueue};
use crate::slot::{Slot, SlotIndex, SlotInfo, SlotListener, SlotState, PRIMARY_SLOTS};
use crate::transform::{BaseTransform, ScaleLimits};
use crate::window::{OverlayWindow, TouchMode, WindowSpec};

/// Density used when no host display is around to copy it from.
const FALLBACK_DENSITY_DPI: i32 = 160;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableOptions {
    pub limits: ScaleLimits,
    pub initial_scale: f32,
    pub secure: bool,
    /// Primaries start in resize mode instead of pass-through.
    pub gesture_mode: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            limits: ScaleLimits::default(),
            initial_scale: 1.0,
            secure: false,
            gesture_mode: false,
        }
    }
}

pub(crate) struct TableInner {
    slots: BTreeMap<SlotIndex, Slot>,
    next_view: u64,
}

impl TableInner {
    fn next_view(&mut self) -> ViewId {
        self.next_view += 1;
        ViewId(self.next_view)
    }

    /// The slot at `index`, provided it still belongs to `view`.
    pub(crate) fn slot_for_view(&mut self, index: SlotIndex, view: ViewId) -> Option<&mut Slot> {
        self.slots.get_mut(&index).filter(|slot| slot.view == view)
    }

    /// `index` plus its mirror, whichever of the two exist.
    fn group(&self, index: SlotIndex) -> Vec<SlotIndex> {
        std::iter::once(index)
            .chain(index.mirror())
            .filter(|i| self.slots.contains_key(i))
            .collect()
    }
}

pub(crate) struct TableShared {
    inner: Mutex<TableInner>,
    pub(crate) services: HostServices,
}

impl TableShared {
    /// A task that panicked mid-update must not wedge every other slot.
    pub(crate) fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct SlotTable {
    shared: Arc<TableShared>,
    queue: UiQueue,
    options: TableOptions,
}

impl SlotTable {
    pub fn new(services: HostServices, queue: UiQueue, options: TableOptions) -> Self {
        Self {
            shared: Arc::new(TableShared {
                inner: Mutex::new(TableInner {
                    slots: BTreeMap::new(),
                    next_view: 0,
                }),
                services,
            }),
            queue,
            options,
        }
    }

    fn density_dpi(&self) -> i32 {
        self.shared
            .services
            .host
            .default_display_info()
            .map(|info| info.density_dpi)
            .unwrap_or(FALLBACK_DENSITY_DPI)
    }

    pub fn create_slot(&self, width: i32, height: i32) -> Result<SlotIndex, SlotError> {
        self.create_slot_with_visibility(width, height, true)
    }

    fn checked_mode(&self, width: i32, height: i32) -> Result<DisplayMode, SlotError> {
        if width <= 0 || height <= 0 {
            return Err(SlotError::InvalidSize { width, height });
        }
        Ok(DisplayMode {
            width,
            height,
            density_dpi: self.density_dpi(),
        })
    }

    /// Allocates the lowest free primary index and schedules its window.
    pub fn create_slot_with_visibility(
        &self,
        width: i32,
        height: i32,
        visible: bool,
    ) -> Result<SlotIndex, SlotError> {
        let mode = self.checked_mode(width, height)?;

        let mut inner = self.shared.lock();
        let index = (0..PRIMARY_SLOTS)
            .filter_map(SlotIndex::primary)
            .find(|i| !inner.slots.contains_key(i))
            .ok_or(SlotError::CapacityExceeded {
                limit: PRIMARY_SLOTS,
            })?;

        let view = inner.next_view();
        let slot = Slot::new(index, view, mode, visible, self.options.gesture_mode);
        self.schedule_window(&mut inner, slot)?;
        Ok(index)
    }

    /// Pairs `primary` with a mirror at `primary + 4`. Asking again for an
    /// existing pair returns the mirror that is already there.
    pub fn create_mirror_slot(&self, primary: u8, width: i32, height: i32) -> Result<SlotIndex, SlotError> {
        let requested = SlotIndex::new(primary)?;
        let index = requested.mirror().ok_or(SlotError::NoSuchPrimary(requested))?;
        let mode = self.checked_mode(width, height)?;

        let mut inner = self.shared.lock();
        let visible = match inner.slots.get(&requested) {
            Some(slot) => slot.visible,
            None => return Err(SlotError::NoSuchPrimary(requested)),
        };
        if inner.slots.contains_key(&index) {
            log::debug!("[table] Mirror {} already exists", index);
            return Ok(index);
        }

        let view = inner.next_view();
        let slot = Slot::new(index, view, mode, visible, false);
        self.schedule_window(&mut inner, slot)?;
        Ok(index)
    }

    fn schedule_window(&self, inner: &mut TableInner, mut slot: Slot) -> Result<(), SlotError> {
        let index = slot.index;
        let view = slot.view;
        let setup = WindowSpec {
            view,
            name: slot.name.clone(),
            width: slot.mode.width,
            height: slot.mode.height,
            density_dpi: slot.mode.density_dpi,
            mirror: index.is_mirror(),
            visible: slot.visible,
            secure: self.options.secure,
            touch_mode: touch_mode(slot.gesture_mode),
            initial_scale: self.options.initial_scale,
        };
        let listener = SlotListener::new(self.shared.clone(), index, view);
        let shared = self.shared.clone();
        let queue = self.queue.clone();
        let limits = self.options.limits;

        let handle = self.queue.post_cancellable("show", move |ui| {
            let notifier = SurfaceNotifier::new(queue, view);
            let mut window =
                OverlayWindow::new(setup, limits, shared.services.clone(), Box::new(listener), notifier);
            let shown = window.show();

            let mut inner = shared.lock();
            let accepted = match inner.slot_for_view(index, view) {
                Some(slot) if slot.state() != SlotState::Dismissed => {
                    if let Err(e) = shown {
                        log::warn!("[table] {}: window not shown: {}", slot.name, e);
                    }
                    slot.window_shown();
                    true
                }
                _ => false,
            };
            drop(inner);

            if accepted {
                ui.insert_window(window);
            } else {
                window.dismiss();
            }
        })?;

        slot.window_scheduled(handle);
        inner.slots.insert(index, slot);
        Ok(())
    }

    fn post_window<F>(&self, view: ViewId, label: &'static str, f: F) -> Result<(), SlotError>
    where
        F: FnOnce(&mut OverlayWindow) + Send + 'static,
    {
        self.queue.post(label, move |ui| match ui.window_mut(view) {
            Some(window) => f(window),
            None => log::debug!("[table] {} for {} skipped, no window", label, view),
        })
    }

    fn view_of(&self, index: SlotIndex) -> Result<ViewId, SlotError> {
        self.shared
            .lock()
            .slots
            .get(&index)
            .map(|slot| slot.view)
            .ok_or(SlotError::NoSuchSlot(index))
    }

    /// Places every slot that has a rule for `mode` inside the region.
    /// Mirrors follow their primary's rule, shifted by half the host width.
    pub fn relayout(
        &self,
        mode: LayoutMode,
        region: Region,
        scale: f32,
    ) -> Result<(), SlotError> {
        if !scale.is_finite() || scale <= 0.0 {
            log::warn!("[table] Ignoring relayout with scale {}", scale);
            return Ok(());
        }
        let host_width = self
            .shared
            .services
            .host
            .default_display_info()
            .map(|info| info.logical_width)
            .unwrap_or(0);

        let jobs: Vec<(ViewId, BaseTransform)> = {
            let inner = self.shared.lock();
            inner
                .slots
                .values()
                .filter_map(|slot| {
                    let rule = placement::rule_for(mode, slot.index.primary_of().get())?;
                    let offset = if slot.index.is_mirror() { host_width / 2 } else { 0 };
                    let content = (slot.mode.width, slot.mode.height);
                    Some((slot.view, placement::place(rule, region, scale, content, offset)))
                })
                .collect()
        };

        log::debug!("[table] Relayout mode {} touches {} slots", mode.0, jobs.len());
        for (view, base) in jobs {
            self.post_window(view, "relayout", move |w| w.relayout_to(base))?;
        }
        Ok(())
    }

    /// Changes the mode of a slot and its mirror. Absent slots are ignored.
    pub fn resize(&self, index: u8, width: i32, height: i32) -> Result<(), SlotError> {
        let index = SlotIndex::new(index)?;
        self.checked_mode(width, height)?;
        let registry = self.shared.services.registry.clone();

        let jobs: Vec<(ViewId, DisplayMode)> = {
            let mut inner = self.shared.lock();
            let group = inner.group(index);
            group
                .into_iter()
                .filter_map(|i| {
                    let slot = inner.slots.get_mut(&i)?;
                    slot.mode = DisplayMode {
                        width,
                        height,
                        ..slot.mode
                    };
                    let mode = slot.mode;
                    if let Some(device) = slot.device_mut() {
                        device.set_mode(registry.as_ref(), mode);
                    }
                    Some((slot.view, mode))
                })
                .collect()
        };

        if jobs.is_empty() {
            log::debug!("[table] Resize of absent slot {} ignored", index);
        }
        for (view, mode) in jobs {
            self.post_window(view, "resize", move |w| {
                w.resize(mode.width, mode.height, mode.density_dpi)
            })?;
        }
        Ok(())
    }

    pub fn hide(&self, index: u8) -> Result<(), SlotError> {
        self.set_visible(index, false)
    }

    pub fn show(&self, index: u8) -> Result<(), SlotError> {
        self.set_visible(index, true)
    }

    fn set_visible(&self, index: u8, visible: bool) -> Result<(), SlotError> {
        let index = SlotIndex::new(index)?;
        let views: Vec<ViewId> = {
            let mut inner = self.shared.lock();
            let group = inner.group(index);
            if group.is_empty() {
                return Err(SlotError::NoSuchSlot(index));
            }
            group
                .into_iter()
                .filter_map(|i| {
                    let slot = inner.slots.get_mut(&i)?;
                    slot.set_visible(visible);
                    Some(slot.view)
                })
                .collect()
        };

        for view in views {
            self.post_window(view, "visibility", move |w| w.set_visible(visible))?;
        }
        Ok(())
    }

    /// Tears down a slot and its mirror. Dismissing an absent slot is fine.
    pub fn dismiss(&self, index: u8) -> Result<(), SlotError> {
        let index = SlotIndex::new(index)?;
        let views = {
            let mut inner = self.shared.lock();
            let group = inner.group(index);
            self.remove_slots(&mut inner, group)
        };
        self.post_dismissals(views)
    }

    pub fn dismiss_all(&self) -> Result<(), SlotError> {
        let views = {
            let mut inner = self.shared.lock();
            let all: Vec<SlotIndex> = inner.slots.keys().copied().collect();
            self.remove_slots(&mut inner, all)
        };
        self.post_dismissals(views)
    }

    fn remove_slots(&self, inner: &mut TableInner, indices: Vec<SlotIndex>) -> Vec<ViewId> {
        let registry = self.shared.services.registry.clone();
        indices
            .into_iter()
            .filter_map(|i| inner.slots.remove(&i))
            .map(|mut slot| {
                if let Some(device) = slot.dismiss() {
                    device.destroy(registry.as_ref());
                }
                slot.view
            })
            .collect()
    }

    fn post_dismissals(&self, views: Vec<ViewId>) -> Result<(), SlotError> {
        for view in views {
            self.queue.post("dismiss", move |ui| {
                if let Some(mut window) = ui.remove_window(view) {
                    window.dismiss();
                }
            })?;
        }
        Ok(())
    }

    pub fn slot_count(&self) -> usize {
        self.shared.lock().slots.len()
    }

    /// Resolves a display name to its mirror slot: the slot itself when the
    /// name is a mirror's, or the mirror of a named primary.
    pub fn lookup_display_id_for_mirror(&self, name: &str) -> Result<SlotIndex, SlotError> {
        let inner = self.shared.lock();
        let slot = inner
            .slots
            .values()
            .find(|slot| slot.name == name)
            .ok_or_else(|| SlotError::NotFound(name.to_string()))?;

        if slot.index.is_mirror() {
            return Ok(slot.index);
        }
        let mirror = slot.index.mirror().filter(|m| inner.slots.contains_key(m));
        mirror.ok_or_else(|| SlotError::NotFound(name.to_string()))
    }

    pub fn slot_info(&self, index: u8) -> Result<SlotInfo, SlotError> {
        let index = SlotIndex::new(index)?;
        self.shared
            .lock()
            .slots
            .get(&index)
            .map(Slot::info)
            .ok_or(SlotError::NoSuchSlot(index))
    }

    pub fn slots(&self) -> Vec<SlotInfo> {
        self.shared.lock().slots.values().map(Slot::info).collect()
    }

    /// Hands a touch to the slot's window as the compositor would.
    pub fn deliver_touch(&self, index: u8, event: PointerEvent) -> Result<(), SlotError> {
        let view = self.view_of(SlotIndex::new(index)?)?;
        self.post_window(view, "touch", move |w| w.on_touch(event))
    }

    pub fn set_gesture_mode(&self, index: u8, enabled: bool) -> Result<(), SlotError> {
        let index = SlotIndex::new(index)?;
        let view = {
            let mut inner = self.shared.lock();
            let slot = inner
                .slots
                .get_mut(&index)
                .ok_or(SlotError::NoSuchSlot(index))?;
            slot.gesture_mode = enabled;
            slot.view
        };
        self.post_window(view, "touch-mode", move |w| w.set_touch_mode(touch_mode(enabled)))
    }

    pub fn reset_transform(&self, index: u8) -> Result<(), SlotError> {
        let view = self.view_of(SlotIndex::new(index)?)?;
        self.post_window(view, "reset-transform", |w| {
            if !w.reset_transform() {
                log::debug!("[table] {} has no layout to reset to", w.name());
            }
        })
    }

    pub fn host_display_added(&self, id: DisplayId) -> Result<(), SlotError> {
        self.queue.post("host-added", move |ui| ui.host_display_added(id))
    }

    pub fn host_display_changed(&self, id: DisplayId) -> Result<(), SlotError> {
        self.queue.post("host-changed", move |ui| ui.host_display_changed(id))
    }

    pub fn host_display_removed(&self, id: DisplayId) -> Result<(), SlotError> {
        self.queue.post("host-removed", move |ui| ui.host_display_removed(id))
    }

    /// Slots whose surface has not shown up within `timeout`.
    pub fn stalled_slots(&self, timeout: Duration) -> Vec<SlotIndex> {
        self.shared
            .lock()
            .slots
            .values()
            .filter(|slot| slot.pending_for().is_some_and(|t| t >= timeout))
            .map(|slot| slot.index)
            .collect()
    }
}

fn touch_mode(gesture_mode: bool) -> TouchMode {
    if gesture_mode {
        TouchMode::Resize
    } else {
        TouchMode::PassThrough
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceEvent;
    use crate::headless::HeadlessBackend;
    use crate::host::{DisplayState, HostDisplayInfo};
    use crate::input::{InjectMode, PointerAction, PointerCoords};
    use crate::queue::UiLoop;

    const REGION: Region = Region {
        left: 0,
        right: 1080,
        bottom: 2340,
        top: 0,
    };

    fn host_info() -> HostDisplayInfo {
        HostDisplayInfo {
            id: 0,
            logical_width: 1080,
            logical_height: 2340,
            density_dpi: 420,
            refresh_rate: 60.0,
            presentation_deadline_nanos: 0,
            state: DisplayState::On,
        }
    }

    struct Fixture {
        ui: UiLoop,
        table: SlotTable,
        backend: HeadlessBackend,
    }

    impl Fixture {
        fn new(auto_surface: bool) -> Self {
            Self::with_options(auto_surface, TableOptions::default())
        }

        fn with_options(auto_surface: bool, options: TableOptions) -> Self {
            let backend = HeadlessBackend::new(host_info(), auto_surface);
            let (ui, queue) = UiLoop::new().unwrap();
            let table = SlotTable::new(backend.services(), queue, options);
            Self { ui, table, backend }
        }

        fn settle(&mut self) {
            self.ui.dispatch_pending().unwrap();
        }

        fn params(&self, name: &str) -> crate::host::WindowParams {
            self.backend.windows.params_for(name).unwrap()
        }
    }

    #[test]
    fn test_create_and_pair() {
        let mut f = Fixture::new(true);
        assert_eq!(f.table.create_slot(400, 800).unwrap().get(), 0);
        assert_eq!(f.table.create_mirror_slot(0, 400, 800).unwrap().get(), 4);
        f.settle();

        assert_eq!(f.table.slot_count(), 2);
        let mirror = f.table.slot_info(4).unwrap();
        assert!(mirror.mirror);
        assert_eq!(mirror.state, SlotState::Live);
        assert_eq!(mirror.mode.density_dpi, 420);
        assert_eq!(f.params("vslot-4").x, 540);
        assert!(!f.params("vslot-4").touchable);
        assert!(f.params("vslot-0").touchable);
    }

    #[test]
    fn test_mirror_requires_primary() {
        let f = Fixture::new(true);
        for i in 0..4 {
            assert_eq!(
                f.table.create_mirror_slot(i, 400, 800),
                Err(SlotError::NoSuchPrimary(SlotIndex::new(i).unwrap()))
            );
        }
        f.table.create_slot(400, 800).unwrap();
        f.table.create_slot(400, 800).unwrap();
        assert_eq!(f.table.create_mirror_slot(1, 400, 800).unwrap().get(), 5);
        assert!(matches!(
            f.table.create_mirror_slot(5, 400, 800),
            Err(SlotError::NoSuchPrimary(_))
        ));
        assert_eq!(
            f.table.create_mirror_slot(9, 400, 800),
            Err(SlotError::InvalidIndex(9))
        );
    }

    #[test]
    fn test_existing_mirror_is_returned() {
        let f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        assert_eq!(f.table.create_mirror_slot(0, 400, 800).unwrap().get(), 4);
        assert_eq!(f.table.create_mirror_slot(0, 100, 100).unwrap().get(), 4);
        assert_eq!(f.table.slot_info(4).unwrap().mode.width, 400);
        assert_eq!(f.table.slot_count(), 2);
    }

    #[test]
    fn test_capacity_is_four_primaries() {
        let mut f = Fixture::new(true);
        for expected in 0..4 {
            assert_eq!(f.table.create_slot(100, 100).unwrap().get(), expected);
        }
        assert_eq!(
            f.table.create_slot(100, 100),
            Err(SlotError::CapacityExceeded { limit: 4 })
        );

        f.table.dismiss(2).unwrap();
        f.settle();
        assert_eq!(f.table.create_slot(100, 100).unwrap().get(), 2);
    }

    #[test]
    fn test_hide_and_show_apply_to_pair() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.table.create_mirror_slot(0, 400, 800).unwrap();
        f.settle();

        f.table.hide(0).unwrap();
        f.settle();
        for name in ["vslot-0", "vslot-4"] {
            let params = f.params(name);
            assert_eq!(params.alpha, 0.0);
            assert!(!params.touchable);
        }
        assert_eq!(f.table.slot_info(0).unwrap().state, SlotState::Hidden);
        assert_eq!(f.table.slot_info(4).unwrap().state, SlotState::Hidden);

        f.table.show(0).unwrap();
        f.settle();
        for name in ["vslot-0", "vslot-4"] {
            let params = f.params(name);
            assert_eq!(params.alpha, 1.0);
            assert!(params.touchable);
        }
        assert_eq!(f.table.slot_info(0).unwrap().state, SlotState::Live);

        assert_eq!(f.table.hide(3), Err(SlotError::NoSuchSlot(SlotIndex::new(3).unwrap())));
    }

    #[test]
    fn test_dismiss_cascades_to_mirror() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.table.create_slot(400, 800).unwrap();
        f.table.create_mirror_slot(0, 400, 800).unwrap();
        f.settle();
        assert_eq!(f.backend.windows.view_count(), 3);

        f.table.dismiss(0).unwrap();
        assert_eq!(f.table.slot_count(), 1);
        f.settle();

        assert_eq!(f.backend.windows.view_count(), 1);
        assert_eq!(
            f.backend.registry.events_for("vslot-4"),
            vec![DeviceEvent::Added, DeviceEvent::Removed]
        );
        assert!(f.table.slot_info(1).is_ok());

        // Idempotent.
        f.table.dismiss(0).unwrap();
        f.settle();
        assert_eq!(f.table.slot_count(), 1);
    }

    #[test]
    fn test_dismiss_all_empties_table() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.table.create_mirror_slot(0, 400, 800).unwrap();
        f.settle();

        f.table.hide(0).unwrap();
        f.table.show(0).unwrap();
        f.table.dismiss_all().unwrap();
        f.settle();

        assert_eq!(f.table.slot_count(), 0);
        assert_eq!(f.backend.windows.view_count(), 0);
        assert_eq!(f.ui.state().window_count(), 0);
    }

    #[test]
    fn test_dismiss_before_show_runs_creates_nothing() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.table.dismiss(0).unwrap();
        f.settle();

        assert_eq!(f.backend.windows.view_count(), 0);
        assert!(f.backend.registry.events().is_empty());
        assert_eq!(f.ui.state().window_count(), 0);
    }

    #[test]
    fn test_non_positive_sizes_are_rejected() {
        let mut f = Fixture::new(true);
        assert_eq!(
            f.table.create_slot(0, 800),
            Err(SlotError::InvalidSize { width: 0, height: 800 })
        );
        f.table.create_slot(400, 800).unwrap();
        assert_eq!(
            f.table.create_mirror_slot(0, 400, -5),
            Err(SlotError::InvalidSize { width: 400, height: -5 })
        );
        assert_eq!(
            f.table.resize(0, -1, 10),
            Err(SlotError::InvalidSize { width: -1, height: 10 })
        );
        f.settle();

        assert_eq!(f.table.slot_count(), 1);
        let info = f.table.slot_info(0).unwrap();
        assert_eq!((info.mode.width, info.mode.height), (400, 800));
        assert_eq!(f.backend.windows.view_count(), 1);
    }

    #[test]
    fn test_surface_after_dismiss_publishes_nothing() {
        let mut f = Fixture::new(false);
        f.table.create_slot(400, 800).unwrap();
        f.settle();

        f.backend.windows.report_surface("vslot-0");
        f.table.dismiss(0).unwrap();
        f.settle();

        assert!(f.backend.registry.events().is_empty());
        assert_eq!(f.backend.windows.view_count(), 0);
        assert_eq!(f.table.slot_count(), 0);
    }

    #[test]
    fn test_stale_work_skips_recreated_slot() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.settle();

        f.table.relayout(LayoutMode(0), REGION, 0.5).unwrap();
        f.table.resize(0, 600, 1000).unwrap();
        f.table.dismiss(0).unwrap();
        f.table.create_slot(300, 300).unwrap();
        f.settle();

        assert_eq!(f.backend.windows.view_count(), 1);
        let params = f.params("vslot-0");
        assert_eq!((params.content_width, params.content_height), (300, 300));
        assert_eq!((params.width, params.height), (300, 300));
        let info = f.table.slot_info(0).unwrap();
        assert_eq!((info.mode.width, info.mode.height), (300, 300));
    }

    #[test]
    fn test_resize_updates_mirror_too() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.table.create_mirror_slot(0, 400, 800).unwrap();
        f.settle();

        f.table.resize(0, 600, 1000).unwrap();
        f.settle();

        for index in [0, 4] {
            let info = f.table.slot_info(index).unwrap();
            assert_eq!((info.mode.width, info.mode.height), (600, 1000));
        }
        for name in ["vslot-0", "vslot-4"] {
            let params = f.params(name);
            assert_eq!((params.content_width, params.content_height), (600, 1000));
        }
        let last = f.backend.registry.events().last().cloned().unwrap();
        assert_eq!(last.event, DeviceEvent::Changed);
        assert_eq!(last.descriptor.width, 600);

        // Absent slot: nothing happens.
        f.table.resize(2, 10, 10).unwrap();
    }

    #[test]
    fn test_relayout_is_idempotent_and_offsets_mirrors() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.table.create_mirror_slot(0, 400, 800).unwrap();
        f.settle();

        f.table.relayout(LayoutMode(1), REGION, 1.0).unwrap();
        f.settle();
        let first = (f.params("vslot-0"), f.params("vslot-4"));
        assert_eq!((first.0.x, first.0.y, first.0.width), (0, 0, 200));
        assert_eq!((first.1.x, first.1.y), (540, 0));

        f.table.relayout(LayoutMode(1), REGION, 1.0).unwrap();
        f.settle();
        assert_eq!((f.params("vslot-0"), f.params("vslot-4")), first);
    }

    #[test]
    fn test_relayout_without_rule_leaves_slot_alone() {
        let mut f = Fixture::new(true);
        for _ in 0..4 {
            f.table.create_slot(400, 800).unwrap();
        }
        f.settle();
        let before = f.params("vslot-3");

        f.table.relayout(LayoutMode(2), REGION, 0.5).unwrap();
        f.settle();
        assert_eq!(f.params("vslot-3"), before);
        assert_eq!(f.params("vslot-1").x, 1080 - 200);
    }

    #[test]
    fn test_pass_through_touch_is_scaled_and_injected() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.settle();
        f.table.relayout(LayoutMode(0), REGION, 0.5).unwrap();
        f.settle();

        let display = f.table.slot_info(0).unwrap().display_id.unwrap();
        assert!(f
            .backend
            .windows
            .touch("vslot-0", PointerEvent::single(PointerAction::Down, 100.0, 150.0)));
        f.settle();

        let events = f.backend.injector.events();
        assert_eq!(events.len(), 1);
        let (event, mode) = &events[0];
        assert_eq!(*mode, InjectMode::Async);
        assert_eq!(event.display_id, Some(display));
        assert_eq!((event.pointers[0].x, event.pointers[0].y), (200.0, 300.0));
    }

    #[test]
    fn test_hidden_slot_ignores_touch() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.settle();
        f.table.hide(0).unwrap();
        f.table
            .deliver_touch(0, PointerEvent::single(PointerAction::Down, 1.0, 1.0))
            .unwrap();
        f.settle();
        assert!(f.backend.injector.events().is_empty());
    }

    fn drag(f: &Fixture, index: u8) {
        for event in [
            PointerEvent::single(PointerAction::Down, 10.0, 10.0),
            PointerEvent::single(PointerAction::Move, 110.0, 60.0),
            PointerEvent::single(PointerAction::Up, 110.0, 60.0),
        ] {
            f.table.deliver_touch(index, event).unwrap();
        }
    }

    #[test]
    fn test_hidden_slot_ignores_gestures() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.table.create_mirror_slot(0, 400, 800).unwrap();
        f.settle();
        let before = (f.params("vslot-0"), f.params("vslot-4"));

        f.table.hide(0).unwrap();
        f.table.set_gesture_mode(0, true).unwrap();
        f.table.set_gesture_mode(4, true).unwrap();
        drag(&f, 0);
        drag(&f, 4);
        f.settle();

        let (primary, mirror) = (f.params("vslot-0"), f.params("vslot-4"));
        assert_eq!((primary.x, primary.y), (before.0.x, before.0.y));
        assert_eq!((mirror.x, mirror.y), (before.1.x, before.1.y));
    }

    #[test]
    fn test_untouchable_mirror_ignores_gestures() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.table.create_mirror_slot(0, 400, 800).unwrap();
        f.settle();
        let before = f.params("vslot-4");

        f.table.set_gesture_mode(4, true).unwrap();
        drag(&f, 4);
        f.settle();
        assert_eq!(f.params("vslot-4"), before);

        // The visible primary still follows the drag.
        f.table.set_gesture_mode(0, true).unwrap();
        drag(&f, 0);
        f.settle();
        assert_eq!((f.params("vslot-0").x, f.params("vslot-0").y), (100, 50));
    }

    #[test]
    fn test_pinch_in_gesture_mode() {
        let options = TableOptions {
            limits: ScaleLimits::new(0.1, 4.0),
            ..TableOptions::default()
        };
        let mut f = Fixture::with_options(true, options);
        f.table.create_slot(200, 400).unwrap();
        f.settle();
        f.table.set_gesture_mode(0, true).unwrap();

        let pinch = |action, span: f32| {
            PointerEvent::new(
                action,
                vec![
                    PointerCoords { id: 0, x: 100.0 - span / 2.0, y: 100.0 },
                    PointerCoords { id: 1, x: 100.0 + span / 2.0, y: 100.0 },
                ],
            )
        };
        f.table
            .deliver_touch(0, PointerEvent::single(PointerAction::Down, 50.0, 100.0))
            .unwrap();
        f.table
            .deliver_touch(0, pinch(PointerAction::PointerDown, 100.0).with_action_pointer(1))
            .unwrap();
        f.table.deliver_touch(0, pinch(PointerAction::Move, 120.0)).unwrap();
        f.table.deliver_touch(0, pinch(PointerAction::Move, 180.0)).unwrap();
        f.settle();

        let scale = f.params("vslot-0").scale_x;
        assert!((scale - 1.8).abs() < 1e-4, "scale {}", scale);
        assert!(f.backend.injector.events().is_empty());

        f.table
            .deliver_touch(0, PointerEvent::single(PointerAction::Up, 100.0, 100.0))
            .unwrap();
        f.settle();
        let committed = f.params("vslot-0");
        assert!((committed.scale_x - 1.8).abs() < 1e-4);
    }

    #[test]
    fn test_pinch_clamped_to_max_scale() {
        let mut f = Fixture::new(true);
        f.table.create_slot(200, 400).unwrap();
        f.table.set_gesture_mode(0, true).unwrap();
        f.settle();

        let two = |action, span: f32| {
            PointerEvent::new(
                action,
                vec![
                    PointerCoords { id: 0, x: 0.0, y: 0.0 },
                    PointerCoords { id: 1, x: span, y: 0.0 },
                ],
            )
        };
        f.table.deliver_touch(0, two(PointerAction::PointerDown, 100.0)).unwrap();
        f.table.deliver_touch(0, two(PointerAction::Move, 500.0)).unwrap();
        f.table
            .deliver_touch(0, PointerEvent::single(PointerAction::Up, 0.0, 0.0))
            .unwrap();
        f.settle();

        let params = f.params("vslot-0");
        assert_eq!(params.scale_x, 1.0);
        assert!(params.width <= 1080 && params.height <= 2340);
    }

    #[test]
    fn test_gesture_commit_then_relayout_restores_placement() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.settle();
        f.table.relayout(LayoutMode(0), REGION, 0.5).unwrap();
        f.settle();
        let before = f.params("vslot-0");

        f.table.set_gesture_mode(0, true).unwrap();
        f.table
            .deliver_touch(0, PointerEvent::single(PointerAction::Down, 10.0, 10.0))
            .unwrap();
        f.table
            .deliver_touch(0, PointerEvent::single(PointerAction::Move, 40.0, 30.0))
            .unwrap();
        f.table
            .deliver_touch(0, PointerEvent::single(PointerAction::Up, 40.0, 30.0))
            .unwrap();
        f.settle();
        assert_ne!(f.params("vslot-0"), before);

        f.table.relayout(LayoutMode(0), REGION, 0.5).unwrap();
        f.settle();
        assert_eq!(f.params("vslot-0"), before);
    }

    #[test]
    fn test_reset_transform_returns_to_first_layout() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.settle();
        f.table.relayout(LayoutMode(0), REGION, 0.5).unwrap();
        f.settle();
        let first = f.params("vslot-0");

        f.table.relayout(LayoutMode(0), REGION, 1.0).unwrap();
        f.settle();
        assert_ne!(f.params("vslot-0"), first);

        f.table.reset_transform(0).unwrap();
        f.settle();
        assert_eq!(f.params("vslot-0"), first);
    }

    #[test]
    fn test_surface_pending_is_reported_not_retried() {
        let mut f = Fixture::new(false);
        f.table.create_slot(400, 800).unwrap();
        f.settle();

        assert_eq!(f.table.slot_info(0).unwrap().state, SlotState::SurfacePending);
        assert_eq!(f.table.stalled_slots(Duration::ZERO), vec![SlotIndex::new(0).unwrap()]);
        assert!(f.table.stalled_slots(Duration::from_secs(3600)).is_empty());
        assert!(f.backend.registry.events().is_empty());

        assert!(f.backend.windows.report_surface("vslot-0"));
        f.settle();
        assert_eq!(f.table.slot_info(0).unwrap().state, SlotState::Live);
        assert!(f.table.stalled_slots(Duration::ZERO).is_empty());
    }

    #[test]
    fn test_surface_loss_keeps_slot_for_recreation() {
        let mut f = Fixture::new(false);
        f.table.create_slot(400, 800).unwrap();
        f.settle();
        f.backend.windows.report_surface("vslot-0");
        f.settle();
        let first_id = f.table.slot_info(0).unwrap().display_id.unwrap();

        assert!(f.backend.windows.has_surface("vslot-0"));
        f.backend.windows.destroy_surface("vslot-0");
        f.settle();
        assert!(!f.backend.windows.has_surface("vslot-0"));
        let info = f.table.slot_info(0).unwrap();
        assert_eq!(info.state, SlotState::Live);
        assert_eq!(info.display_id, None);

        f.backend.windows.report_surface("vslot-0");
        f.settle();
        let second_id = f.table.slot_info(0).unwrap().display_id.unwrap();
        assert_ne!(first_id, second_id);
        assert_eq!(
            f.backend.registry.events_for("vslot-0"),
            vec![DeviceEvent::Added, DeviceEvent::Removed, DeviceEvent::Added]
        );
    }

    #[test]
    fn test_host_state_change_updates_device() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.settle();

        f.backend.host.set_state(DisplayState::Doze);
        f.table.host_display_changed(0).unwrap();
        f.settle();

        let last = f.backend.registry.events().last().cloned().unwrap();
        assert_eq!(last.event, DeviceEvent::Changed);
        assert_eq!(last.descriptor.state, DisplayState::Doze);
    }

    #[test]
    fn test_host_loss_dismisses_window_until_readded() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.settle();

        let info = f.backend.host.remove().unwrap();
        f.table.host_display_changed(0).unwrap();
        f.settle();
        assert_eq!(f.backend.windows.view_count(), 0);
        assert_eq!(f.table.slot_info(0).unwrap().display_id, None);
        assert_eq!(f.table.slot_count(), 1);

        f.backend.host.restore(info);
        f.table.host_display_added(0).unwrap();
        f.settle();
        assert_eq!(f.backend.windows.view_count(), 1);
        assert!(f.table.slot_info(0).unwrap().display_id.is_some());
    }

    #[test]
    fn test_other_display_ids_are_ignored() {
        let mut f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.settle();
        f.table.host_display_removed(7).unwrap();
        f.settle();
        assert_eq!(f.backend.windows.view_count(), 1);
    }

    #[test]
    fn test_lookup_mirror_by_name() {
        let f = Fixture::new(true);
        f.table.create_slot(400, 800).unwrap();
        f.table.create_slot(400, 800).unwrap();
        f.table.create_mirror_slot(0, 400, 800).unwrap();

        assert_eq!(f.table.lookup_display_id_for_mirror("vslot-0").unwrap().get(), 4);
        assert_eq!(f.table.lookup_display_id_for_mirror("vslot-4").unwrap().get(), 4);
        assert_eq!(
            f.table.lookup_display_id_for_mirror("vslot-1"),
            Err(SlotError::NotFound("vslot-1".to_string()))
        );
        assert!(f.table.lookup_display_id_for_mirror("nope").is_err());
    }

    #[test]
    fn test_hidden_creation() {
        let mut f = Fixture::new(true);
        f.table.create_slot_with_visibility(400, 800, false).unwrap();
        f.settle();

        let params = f.params("vslot-0");
        assert_eq!(params.alpha, 0.0);
        assert!(!params.touchable);
        assert_eq!(f.table.slot_info(0).unwrap().state, SlotState::Hidden);
    }

    #[test]
    fn test_concurrent_callers() {
        let backend = HeadlessBackend::new(host_info(), true);
        let (handle, queue) = UiLoop::spawn().unwrap();
        let table = SlotTable::new(backend.services(), queue.clone(), TableOptions::default());

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || table.create_slot(100, 100))
            })
            .collect();
        let mut created: Vec<u8> = workers
            .into_iter()
            .map(|w| w.join().unwrap().unwrap().get())
            .collect();
        created.sort();
        assert_eq!(created, vec![0, 1, 2, 3]);

        table.dismiss_all().unwrap();
        assert_eq!(table.slot_count(), 0);
        drop(table);
        queue.shutdown().unwrap();
        handle.join().unwrap();
        assert_eq!(backend.windows.view_count(), 0);
    }
}
