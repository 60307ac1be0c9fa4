//! On-screen overlay window backing one slot.
//!
//! Lives on the UI thread only. Every call into the window service happens
//! here, never under the slot table lock.

use crate::error::{HostError, SlotError};
use crate::gesture::{GestureStep, GestureTracker};
use crate::host::{
    DisplayId, DisplayState, Gravity, HostDisplayInfo, HostServices, SurfaceInfo, ViewId,
    WindowParams,
};
use crate::input::{InputRedirector, PointerEvent};
use crate::queue::SurfaceNotifier;
use crate::transform::{BaseTransform, Placement, ScaleLimits, Transform};

/// Callbacks from a window to whoever owns its display device.
pub trait WindowListener: Send {
    /// The surface is ready. Returns the id of the display now rendering
    /// into it, if one could be published.
    fn on_window_created(&self, surface: SurfaceInfo, host: &HostDisplayInfo) -> Option<DisplayId>;
    fn on_window_destroyed(&self);
    fn on_state_changed(&self, state: DisplayState);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchMode {
    /// Touches are forwarded to the slot's display.
    PassThrough,
    /// Touches drive pan/pinch of the window itself.
    Resize,
}

#[derive(Clone, Debug)]
pub struct WindowSpec {
    pub view: ViewId,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub density_dpi: i32,
    pub mirror: bool,
    pub visible: bool,
    pub secure: bool,
    pub touch_mode: TouchMode,
    pub initial_scale: f32,
}

pub struct OverlayWindow {
    view: ViewId,
    name: String,
    content: (i32, i32),
    density_dpi: i32,
    mirror: bool,
    secure: bool,
    visible: bool,
    touchable: bool,
    attached: bool,
    awaiting_host: bool,
    touch_mode: TouchMode,
    transform: Transform,
    limits: ScaleLimits,
    host: Option<HostDisplayInfo>,
    host_id: DisplayId,
    display_id: Option<DisplayId>,
    surface: Option<SurfaceInfo>,
    params: WindowParams,
    gestures: GestureTracker,
    redirector: InputRedirector,
    services: HostServices,
    listener: Box<dyn WindowListener>,
    notifier: SurfaceNotifier,
}

impl OverlayWindow {
    pub fn new(
        setup: WindowSpec,
        limits: ScaleLimits,
        services: HostServices,
        listener: Box<dyn WindowListener>,
        notifier: SurfaceNotifier,
    ) -> Self {
        let host = services.host.default_display_info();
        let host_id = host.as_ref().map(|h| h.id).unwrap_or(0);
        // Mirrors open on the right half of the host display.
        let x = match (&host, setup.mirror) {
            (Some(info), true) => info.logical_width / 2,
            _ => 0,
        };

        let mut window = Self {
            view: setup.view,
            name: setup.name,
            content: (setup.width, setup.height),
            density_dpi: setup.density_dpi,
            mirror: setup.mirror,
            secure: setup.secure,
            visible: setup.visible,
            touchable: setup.visible && !setup.mirror,
            attached: false,
            awaiting_host: false,
            touch_mode: setup.touch_mode,
            transform: Transform::new(x, 0, setup.initial_scale),
            limits,
            host,
            host_id,
            display_id: None,
            surface: None,
            params: WindowParams::default(),
            gestures: GestureTracker::new(),
            redirector: InputRedirector::new(services.injector.clone()),
            services,
            listener,
            notifier,
        };
        window.params = window.compute_params();
        window
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_awaiting_host(&self) -> bool {
        self.awaiting_host
    }

    pub fn is_mirror(&self) -> bool {
        self.mirror
    }

    pub fn params(&self) -> &WindowParams {
        &self.params
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn display_id(&self) -> Option<DisplayId> {
        self.display_id
    }

    pub fn surface(&self) -> Option<SurfaceInfo> {
        self.surface
    }

    pub fn touch_mode(&self) -> TouchMode {
        self.touch_mode
    }

    pub fn density_dpi(&self) -> i32 {
        self.density_dpi
    }

    fn host_size(&self) -> (i32, i32) {
        self.host.as_ref().map(|h| h.logical_size()).unwrap_or((0, 0))
    }

    pub fn placement(&self) -> Placement {
        self.transform.effective(self.content, self.host_size(), self.limits)
    }

    fn compute_params(&self) -> WindowParams {
        let placement = self.placement();
        WindowParams {
            x: placement.x,
            y: placement.y,
            width: placement.width,
            height: placement.height,
            content_width: self.content.0,
            content_height: self.content.1,
            scale_x: placement.scale_x,
            scale_y: placement.scale_y,
            alpha: if self.visible { 1.0 } else { 0.0 },
            touchable: self.touchable,
            secure: self.secure,
            gravity: Gravity::TopLeft,
        }
    }

    fn refresh_host(&mut self) -> bool {
        match self.services.host.default_display_info() {
            Some(info) => {
                self.host_id = info.id;
                self.host = Some(info);
                true
            }
            None => false,
        }
    }

    /// Adds the view to the window service. No-op while already shown.
    pub fn show(&mut self) -> Result<(), HostError> {
        if self.attached {
            return Ok(());
        }
        if !self.refresh_host() {
            log::warn!("[window] {}: no default display to draw on", self.name);
            self.awaiting_host = true;
            return Err(HostError::NoHostDisplay);
        }

        self.transform.clear_live();
        self.gestures.reset();
        self.params = self.compute_params();
        self.services
            .windows
            .add_view(self.view, &self.name, &self.params, self.notifier.clone())?;
        self.attached = true;
        self.awaiting_host = false;

        log::info!(
            "[window] {} shown at {},{} {}x{} (alpha {})",
            self.name,
            self.params.x,
            self.params.y,
            self.params.width,
            self.params.height,
            self.params.alpha
        );
        Ok(())
    }

    /// Removes the view. No-op while not shown.
    pub fn dismiss(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        self.gestures.reset();
        if let Err(e) = self.services.windows.remove_view(self.view) {
            log::warn!("[window] {}: remove_view failed: {}", self.name, e);
        }
        log::info!("[window] {} dismissed", self.name);
    }

    pub fn resize(&mut self, width: i32, height: i32, density_dpi: i32) {
        self.content = (width, height);
        self.density_dpi = density_dpi;
        self.apply_layout();
    }

    pub fn relayout_to(&mut self, base: BaseTransform) {
        self.transform.apply_explicit(base);
        self.apply_layout();
    }

    pub fn relayout(&mut self, x: i32, y: i32, scale: f32) {
        self.relayout_to(BaseTransform::uniform(x, y, scale));
    }

    pub fn relayout_xy(&mut self, x: i32, y: i32, scale_x: f32, scale_y: f32) {
        self.relayout_to(BaseTransform {
            x,
            y,
            scale_x,
            scale_y,
        });
    }

    /// Recomputes params and pushes them to the window service if shown.
    pub fn apply_layout(&mut self) {
        self.params = self.compute_params();
        if !self.attached {
            return;
        }
        if let Err(e) = self.services.windows.update_view_layout(self.view, &self.params) {
            log::warn!("[window] {}: update_view_layout failed: {}", self.name, e);
        }
    }

    /// Hidden means fully transparent and not touchable.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.touchable = visible;
        self.apply_layout();
    }

    pub fn set_touch_mode(&mut self, mode: TouchMode) {
        if self.touch_mode == mode {
            return;
        }
        if self.transform.has_live_state() {
            self.commit_gesture();
        }
        self.gestures.reset();
        self.touch_mode = mode;
        log::debug!("[window] {} touch mode {:?}", self.name, mode);
    }

    pub fn reset_transform(&mut self) -> bool {
        let reset = self.transform.reset_to_defaults();
        if reset {
            self.apply_layout();
        }
        reset
    }

    fn commit_gesture(&mut self) {
        let host = self.host_size();
        self.transform.commit(self.content, host, self.limits);
        let base = self.transform.base();
        log::debug!(
            "[window] {} committed {},{} x{:.3}",
            self.name,
            base.x,
            base.y,
            base.scale_x
        );
    }

    pub fn on_surface_available(&mut self, surface: SurfaceInfo) {
        self.surface = Some(surface);
        if self.host.is_none() && !self.refresh_host() {
            log::warn!("[window] {}: surface ready but no host display", self.name);
            return;
        }
        let Some(host) = self.host.clone() else {
            return;
        };
        self.display_id = self.listener.on_window_created(surface, &host);
        log::debug!(
            "[window] {} surface {} available, display {:?}",
            self.name,
            surface.target,
            self.display_id
        );
    }

    pub fn on_surface_destroyed(&mut self) {
        self.surface = None;
        self.display_id = None;
        self.listener.on_window_destroyed();
        log::debug!("[window] {} surface destroyed", self.name);
    }

    pub fn on_surface_size_changed(&mut self, width: i32, height: i32) {
        log::debug!("[window] {} surface resized to {}x{}", self.name, width, height);
        self.apply_layout();
    }

    pub fn on_host_display_added(&mut self, id: DisplayId) {
        if !self.awaiting_host || id != self.host_id {
            return;
        }
        match self.show() {
            Ok(()) => log::info!("[window] {} restored on host display {}", self.name, id),
            Err(e) => log::debug!("[window] {} still waiting for host: {}", self.name, e),
        }
    }

    pub fn on_host_display_changed(&mut self, id: DisplayId) {
        if !self.attached || id != self.host_id {
            return;
        }
        if self.refresh_host() {
            self.apply_layout();
            if let Some(state) = self.host.as_ref().map(|h| h.state) {
                self.listener.on_state_changed(state);
            }
        } else {
            log::warn!("[window] {}: {} (display {})", self.name, SlotError::HostDisplayLost, id);
            self.dismiss();
            self.awaiting_host = true;
        }
    }

    pub fn on_host_display_removed(&mut self, id: DisplayId) {
        if !self.attached || id != self.host_id {
            return;
        }
        log::warn!("[window] {}: {} (display {} removed)", self.name, SlotError::HostDisplayLost, id);
        self.dismiss();
        self.awaiting_host = true;
    }

    pub fn on_touch(&mut self, event: PointerEvent) {
        if !self.attached || !self.touchable {
            return;
        }
        match self.touch_mode {
            TouchMode::PassThrough => {
                match self.display_id {
                    Some(display) => self.redirector.redirect(&event, &self.placement(), display),
                    None => log::debug!("[window] {}: touch before display exists", self.name),
                }
            }
            TouchMode::Resize => self.on_gesture_event(&event),
        }
    }

    fn on_gesture_event(&mut self, event: &PointerEvent) {
        let origin = (self.params.x as f32, self.params.y as f32);
        let steps = self.gestures.on_event(event, origin);
        if steps.is_empty() {
            return;
        }
        for step in steps {
            match step {
                GestureStep::Pan { dx, dy } => self.transform.pan(dx, dy),
                GestureStep::Scale {
                    factor,
                    focus_x,
                    focus_y,
                } => {
                    if !self.transform.scale_by(factor, (focus_x, focus_y)) {
                        log::debug!("[window] {}: ignoring scale factor {}", self.name, factor);
                    }
                }
                GestureStep::Reseed => {
                    let host = self.host_size();
                    self.transform.rebase_pinch(self.content, host, self.limits);
                }
                GestureStep::End => self.commit_gesture(),
            }
        }
        self.apply_layout();
    }
}
