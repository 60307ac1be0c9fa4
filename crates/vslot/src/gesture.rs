//! Pan and pinch recognition for windows in resize mode.
//!
//! Recognizers work on screen-space copies of the pointer positions; the
//! event itself is never modified.

use crate::input::{PointerAction, PointerCoords, PointerEvent};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureStep {
    Pan { dx: f32, dy: f32 },
    Scale { factor: f32, focus_x: f32, focus_y: f32 },
    /// The set of fingers changed; a following pinch has a new focus.
    Reseed,
    End,
}

fn active_points(event: &PointerEvent, origin: (f32, f32)) -> Vec<(f32, f32)> {
    let lifting = match event.action {
        PointerAction::PointerUp => event.action_pointer,
        _ => None,
    };
    event
        .pointers
        .iter()
        .filter(|p: &&PointerCoords| Some(p.id) != lifting)
        .map(|p| (p.x + origin.0, p.y + origin.1))
        .collect()
}

fn centroid(points: &[(f32, f32)]) -> Option<(f32, f32)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
    Some((sx / n, sy / n))
}

fn span(points: &[(f32, f32)]) -> Option<f32> {
    match points {
        [a, b, ..] => Some(((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct PanRecognizer {
    last_focus: Option<(f32, f32)>,
}

impl PanRecognizer {
    fn reseed(&mut self, points: &[(f32, f32)]) {
        self.last_focus = centroid(points);
    }

    fn on_move(&mut self, points: &[(f32, f32)]) -> Option<GestureStep> {
        let focus = centroid(points)?;
        let step = self.last_focus.map(|(lx, ly)| GestureStep::Pan {
            dx: focus.0 - lx,
            dy: focus.1 - ly,
        });
        self.last_focus = Some(focus);
        step.filter(|s| !matches!(s, GestureStep::Pan { dx, dy } if *dx == 0.0 && *dy == 0.0))
    }
}

#[derive(Debug, Default)]
struct PinchRecognizer {
    last_span: Option<f32>,
}

impl PinchRecognizer {
    fn reseed(&mut self, points: &[(f32, f32)]) {
        self.last_span = span(points);
    }

    fn on_move(&mut self, points: &[(f32, f32)]) -> Option<GestureStep> {
        let current = span(points)?;
        let previous = self.last_span.replace(current)?;
        if previous <= 0.0 || current == previous {
            return None;
        }
        let (focus_x, focus_y) = centroid(points)?;
        Some(GestureStep::Scale {
            factor: current / previous,
            focus_x,
            focus_y,
        })
    }
}

#[derive(Debug, Default)]
pub struct GestureTracker {
    pan: PanRecognizer,
    pinch: PinchRecognizer,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `origin` is the window's current screen position, used to turn
    /// window-local coordinates into screen coordinates.
    pub fn on_event(&mut self, event: &PointerEvent, origin: (f32, f32)) -> Vec<GestureStep> {
        let points = active_points(event, origin);

        match event.action {
            PointerAction::Down | PointerAction::PointerDown | PointerAction::PointerUp => {
                self.pan.reseed(&points);
                self.pinch.reseed(&points);
                vec![GestureStep::Reseed]
            }
            PointerAction::Move => {
                let mut steps = Vec::with_capacity(2);
                steps.extend(self.pan.on_move(&points));
                steps.extend(self.pinch.on_move(&points));
                steps
            }
            PointerAction::Up | PointerAction::Cancel => {
                self.reset();
                vec![GestureStep::End]
            }
        }
    }

    pub fn reset(&mut self) {
        self.pan = PanRecognizer::default();
        self.pinch = PinchRecognizer::default();
    }
}
