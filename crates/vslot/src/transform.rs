//! Pan/scale state of an overlay window.
//!
//! A window carries a committed *base* transform plus an uncommitted *live*
//! layer that interactive gestures accumulate into. The placement actually
//! applied is derived from both, clamped to the configured scale range and
//! to the host display's logical size.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleLimits {
    pub min: f32,
    pub max: f32,
}

impl ScaleLimits {
    /// Falls back to the default range when `min`/`max` are unusable.
    pub fn new(min: f32, max: f32) -> Self {
        if min.is_finite() && max.is_finite() && min > 0.0 && min <= max {
            Self { min, max }
        } else {
            log::warn!("Invalid scale range {}..{}, using defaults", min, max);
            Self::default()
        }
    }

    fn clamp(&self, scale: f32) -> f32 {
        scale.max(self.min).min(self.max)
    }
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self { min: 0.1, max: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseTransform {
    pub x: i32,
    pub y: i32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl BaseTransform {
    pub fn uniform(x: i32, y: i32, scale: f32) -> Self {
        Self {
            x,
            y,
            scale_x: scale,
            scale_y: scale,
        }
    }

    fn is_uniform(&self) -> bool {
        self.scale_x == self.scale_y
    }
}

/// Final on-screen geometry of a window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub scale_x: f32,
    pub scale_y: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    base: BaseTransform,
    defaults: Option<BaseTransform>,
    live_dx: f32,
    live_dy: f32,
    live_scale: f32,
    /// Pinch focus relative to the window origin when the pinch began,
    /// and the live scale at that moment.
    anchor: Option<Anchor>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Anchor {
    x: f32,
    y: f32,
    live_scale: f32,
}

fn fit_axis(scale: f32, limits: ScaleLimits, content: i32, host: i32) -> f32 {
    let scale = limits.clamp(scale);
    // The host bound wins over the minimum so the window stays on screen.
    if content > 0 && host > 0 {
        scale.min(host as f32 / content as f32)
    } else {
        scale
    }
}

impl Transform {
    pub fn new(x: i32, y: i32, scale: f32) -> Self {
        Self {
            base: BaseTransform::uniform(x, y, scale),
            defaults: None,
            live_dx: 0.0,
            live_dy: 0.0,
            live_scale: 1.0,
            anchor: None,
        }
    }

    pub fn base(&self) -> BaseTransform {
        self.base
    }

    pub fn defaults(&self) -> Option<BaseTransform> {
        self.defaults
    }

    pub fn live_scale(&self) -> f32 {
        self.live_scale
    }

    pub fn has_live_state(&self) -> bool {
        self.live_dx != 0.0 || self.live_dy != 0.0 || self.live_scale != 1.0
    }

    /// Applies a caller-requested placement. The first one ever applied is
    /// kept as the window's defaults.
    pub fn apply_explicit(&mut self, base: BaseTransform) {
        if self.defaults.is_none() {
            self.defaults = Some(base);
        }
        self.base = base;
        self.clear_live();
    }

    pub fn reset_to_defaults(&mut self) -> bool {
        match self.defaults {
            Some(defaults) => {
                self.base = defaults;
                self.clear_live();
                true
            }
            None => false,
        }
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        if dx.is_finite() && dy.is_finite() {
            self.live_dx += dx;
            self.live_dy += dy;
        }
    }

    /// Multiplies the live scale by `factor` around a screen-space focus.
    /// Returns false when the factor is unusable (NaN, infinite, <= 0).
    pub fn scale_by(&mut self, factor: f32, focus: (f32, f32)) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        if self.anchor.is_none() && focus.0.is_finite() && focus.1.is_finite() {
            let origin_x = self.base.x as f32 + self.live_dx;
            let origin_y = self.base.y as f32 + self.live_dy;
            self.anchor = Some(Anchor {
                x: focus.0 - origin_x,
                y: focus.1 - origin_y,
                live_scale: self.live_scale,
            });
        }
        self.live_scale *= factor;
        true
    }

    /// Folds the current pinch recentering into the live pan so the next
    /// pinch captures its own focus without the window jumping.
    pub fn rebase_pinch(&mut self, content: (i32, i32), host: (i32, i32), limits: ScaleLimits) {
        let (dx, dy) = self.anchor_offset(content, host, limits);
        self.live_dx += dx;
        self.live_dy += dy;
        self.anchor = None;
    }

    pub fn clear_live(&mut self) {
        self.live_dx = 0.0;
        self.live_dy = 0.0;
        self.live_scale = 1.0;
        self.anchor = None;
    }

    /// Folds the live layer into the base transform.
    pub fn commit(&mut self, content: (i32, i32), host: (i32, i32), limits: ScaleLimits) {
        let placement = self.effective(content, host, limits);
        self.base = BaseTransform {
            x: placement.x,
            y: placement.y,
            scale_x: placement.scale_x,
            scale_y: placement.scale_y,
        };
        self.clear_live();
    }

    fn scale_with_live(
        &self,
        live: f32,
        content: (i32, i32),
        host: (i32, i32),
        limits: ScaleLimits,
    ) -> (f32, f32) {
        let sx = fit_axis(self.base.scale_x * live, limits, content.0, host.0);
        let sy = fit_axis(self.base.scale_y * live, limits, content.1, host.1);
        if self.base.is_uniform() {
            let s = sx.min(sy);
            (s, s)
        } else {
            (sx, sy)
        }
    }

    pub fn effective_scale(
        &self,
        content: (i32, i32),
        host: (i32, i32),
        limits: ScaleLimits,
    ) -> (f32, f32) {
        self.scale_with_live(self.live_scale, content, host, limits)
    }

    fn anchor_offset(&self, content: (i32, i32), host: (i32, i32), limits: ScaleLimits) -> (f32, f32) {
        let Some(anchor) = self.anchor else {
            return (0.0, 0.0);
        };
        let (sx, sy) = self.effective_scale(content, host, limits);
        let (start_x, start_y) = self.scale_with_live(anchor.live_scale, content, host, limits);
        (anchor.x * (1.0 - sx / start_x), anchor.y * (1.0 - sy / start_y))
    }

    pub fn effective(&self, content: (i32, i32), host: (i32, i32), limits: ScaleLimits) -> Placement {
        let (sx, sy) = self.effective_scale(content, host, limits);
        let (offset_x, offset_y) = self.anchor_offset(content, host, limits);

        Placement {
            x: (self.base.x as f32 + self.live_dx + offset_x).round() as i32,
            y: (self.base.y as f32 + self.live_dy + offset_y).round() as i32,
            width: (content.0 as f32 * sx) as i32,
            height: (content.1 as f32 * sy) as i32,
            scale_x: sx,
            scale_y: sy,
        }
    }
}
