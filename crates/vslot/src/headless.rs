//! In-process implementations of every host service.
//!
//! `vslotd` runs on these when there is no real compositor, and the unit
//! tests use them to observe what the slot table asked the host to do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::device::{DeviceEvent, VirtualDisplayDescriptor};
use crate::error::HostError;
use crate::host::{
    DisplayId, DisplayRegistry, DisplayState, HostDisplay, HostDisplayInfo, HostServices,
    InputInjector, SurfaceInfo, ViewId, WindowParams, WindowService,
};
use crate::input::{InjectMode, PointerEvent};
use crate::queue::SurfaceNotifier;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Id 0 is the host display itself.
const FIRST_VIRTUAL_DISPLAY_ID: DisplayId = 2;

pub struct HeadlessHost {
    info: Mutex<Option<HostDisplayInfo>>,
}

impl HeadlessHost {
    pub fn new(info: HostDisplayInfo) -> Self {
        Self {
            info: Mutex::new(Some(info)),
        }
    }

    pub fn info(&self) -> Option<HostDisplayInfo> {
        lock(&self.info).clone()
    }

    pub fn set_state(&self, state: DisplayState) {
        if let Some(info) = lock(&self.info).as_mut() {
            info.state = state;
        }
    }

    /// Makes the default display unavailable until [`HeadlessHost::restore`].
    pub fn remove(&self) -> Option<HostDisplayInfo> {
        lock(&self.info).take()
    }

    pub fn restore(&self, info: HostDisplayInfo) {
        *lock(&self.info) = Some(info);
    }
}

impl HostDisplay for HeadlessHost {
    fn default_display_info(&self) -> Option<HostDisplayInfo> {
        self.info()
    }
}

struct ViewRecord {
    name: String,
    params: WindowParams,
    notifier: SurfaceNotifier,
    surface: Option<SurfaceInfo>,
}

/// Window service that keeps views in a map. With `auto_surface` every new
/// view immediately reports a surface; otherwise surfaces only appear via
/// [`HeadlessWindowService::report_surface`].
pub struct HeadlessWindowService {
    views: Mutex<HashMap<ViewId, ViewRecord>>,
    auto_surface: bool,
    next_target: AtomicU64,
}

impl HeadlessWindowService {
    pub fn new(auto_surface: bool) -> Self {
        Self {
            views: Mutex::new(HashMap::new()),
            auto_surface,
            next_target: AtomicU64::new(1),
        }
    }

    fn find(&self, name: &str) -> Option<ViewId> {
        lock(&self.views)
            .iter()
            .find(|(_, record)| record.name == name)
            .map(|(view, _)| *view)
    }

    pub fn view_count(&self) -> usize {
        lock(&self.views).len()
    }

    pub fn params_for(&self, name: &str) -> Option<WindowParams> {
        lock(&self.views)
            .values()
            .find(|record| record.name == name)
            .map(|record| record.params.clone())
    }

    pub fn has_surface(&self, name: &str) -> bool {
        lock(&self.views)
            .values()
            .any(|record| record.name == name && record.surface.is_some())
    }

    /// Creates the surface for a view that is waiting for one.
    pub fn report_surface(&self, name: &str) -> bool {
        let Some(view) = self.find(name) else {
            return false;
        };
        let mut views = lock(&self.views);
        let Some(record) = views.get_mut(&view) else {
            return false;
        };
        if record.surface.is_some() {
            return false;
        }
        let surface = self.new_surface(&record.params);
        record.surface = Some(surface);
        record.notifier.surface_available(surface);
        true
    }

    pub fn destroy_surface(&self, name: &str) -> bool {
        let Some(view) = self.find(name) else {
            return false;
        };
        let mut views = lock(&self.views);
        let Some(record) = views.get_mut(&view) else {
            return false;
        };
        if record.surface.take().is_none() {
            return false;
        }
        record.notifier.surface_destroyed();
        true
    }

    /// Delivers a touch to a view as if the compositor had hit-tested it.
    pub fn touch(&self, name: &str, event: PointerEvent) -> bool {
        let views = lock(&self.views);
        match views.values().find(|record| record.name == name) {
            Some(record) if record.params.touchable => {
                record.notifier.touch(event);
                true
            }
            _ => false,
        }
    }

    fn new_surface(&self, params: &WindowParams) -> SurfaceInfo {
        SurfaceInfo {
            target: self.next_target.fetch_add(1, Ordering::Relaxed),
            width: params.content_width,
            height: params.content_height,
        }
    }
}

impl WindowService for HeadlessWindowService {
    fn add_view(
        &self,
        view: ViewId,
        name: &str,
        params: &WindowParams,
        surfaces: SurfaceNotifier,
    ) -> Result<(), HostError> {
        let mut views = lock(&self.views);
        if views.contains_key(&view) {
            return Err(HostError::Window(format!("{} already added", view)));
        }

        let surface = self.auto_surface.then(|| self.new_surface(params));
        if let Some(surface) = surface {
            surfaces.surface_available(surface);
        }
        log::debug!("[headless] add_view {} ({})", view, name);
        views.insert(
            view,
            ViewRecord {
                name: name.to_string(),
                params: params.clone(),
                notifier: surfaces,
                surface,
            },
        );
        Ok(())
    }

    fn update_view_layout(&self, view: ViewId, params: &WindowParams) -> Result<(), HostError> {
        let mut views = lock(&self.views);
        let record = views
            .get_mut(&view)
            .ok_or_else(|| HostError::Window(format!("{} not added", view)))?;

        if record.surface.is_some()
            && (record.params.content_width != params.content_width
                || record.params.content_height != params.content_height)
        {
            record
                .notifier
                .surface_size_changed(params.content_width, params.content_height);
        }
        record.params = params.clone();
        Ok(())
    }

    fn remove_view(&self, view: ViewId) -> Result<(), HostError> {
        let record = lock(&self.views)
            .remove(&view)
            .ok_or_else(|| HostError::Window(format!("{} not added", view)))?;
        if record.surface.is_some() {
            record.notifier.surface_destroyed();
        }
        log::debug!("[headless] remove_view {} ({})", view, record.name);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegistryEvent {
    pub id: DisplayId,
    pub event: DeviceEvent,
    pub descriptor: VirtualDisplayDescriptor,
}

pub struct RecordingRegistry {
    next_id: AtomicU32,
    events: Mutex<Vec<RegistryEvent>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(FIRST_VIRTUAL_DISPLAY_ID),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<RegistryEvent> {
        lock(&self.events).clone()
    }

    pub fn events_for(&self, name: &str) -> Vec<DeviceEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| e.descriptor.name == name)
            .map(|e| e.event)
            .collect()
    }
}

impl Default for RecordingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayRegistry for RecordingRegistry {
    fn register_device(&self, descriptor: &VirtualDisplayDescriptor) -> Result<DisplayId, HostError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::debug!("[headless] registered {} as display {}", descriptor.name, id);
        Ok(id)
    }

    fn notify(&self, id: DisplayId, descriptor: &VirtualDisplayDescriptor, event: DeviceEvent) {
        lock(&self.events).push(RegistryEvent {
            id,
            event,
            descriptor: descriptor.clone(),
        });
    }
}

#[derive(Default)]
pub struct RecordingInjector {
    events: Mutex<Vec<(PointerEvent, InjectMode)>>,
}

impl RecordingInjector {
    pub fn events(&self) -> Vec<(PointerEvent, InjectMode)> {
        lock(&self.events).clone()
    }
}

impl InputInjector for RecordingInjector {
    fn inject(&self, event: PointerEvent, mode: InjectMode) -> Result<(), HostError> {
        log::trace!(
            "[headless] inject {:?} on display {:?}",
            event.action,
            event.display_id
        );
        lock(&self.events).push((event, mode));
        Ok(())
    }
}

/// All headless services, kept by concrete type so callers can drive them.
#[derive(Clone)]
pub struct HeadlessBackend {
    pub host: Arc<HeadlessHost>,
    pub windows: Arc<HeadlessWindowService>,
    pub registry: Arc<RecordingRegistry>,
    pub injector: Arc<RecordingInjector>,
}

impl HeadlessBackend {
    pub fn new(info: HostDisplayInfo, auto_surface: bool) -> Self {
        Self {
            host: Arc::new(HeadlessHost::new(info)),
            windows: Arc::new(HeadlessWindowService::new(auto_surface)),
            registry: Arc::new(RecordingRegistry::new()),
            injector: Arc::new(RecordingInjector::default()),
        }
    }

    pub fn services(&self) -> HostServices {
        HostServices {
            registry: self.registry.clone(),
            windows: self.windows.clone(),
            host: self.host.clone(),
            injector: self.injector.clone(),
        }
    }
}
