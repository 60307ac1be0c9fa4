//! Canned slot placements selected by a layout mode id.
//!
//! Each rule pins one primary slot to a corner of the caller's region at a
//! fixed fraction of the requested scale. Mirrors reuse their primary's rule
//! shifted right by half the host width. Slot/mode pairs without a rule are
//! left where they are.

use crate::transform::BaseTransform;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutMode(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementSize {
    Small,
    Large,
}

impl PlacementSize {
    fn factor(self) -> f32 {
        match self {
            PlacementSize::Small => 0.5,
            PlacementSize::Large => 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementRule {
    pub mode: LayoutMode,
    pub primary: u8,
    pub corner: Corner,
    pub size: PlacementSize,
}

const fn rule(mode: u32, primary: u8, corner: Corner, size: PlacementSize) -> PlacementRule {
    PlacementRule {
        mode: LayoutMode(mode),
        primary,
        corner,
        size,
    }
}

/// Mode 0 stacks every primary at the top left, mode 1 is the four-corner
/// split, mode 2 puts two primaries side by side.
pub const RULES: &[PlacementRule] = &[
    rule(0, 0, Corner::TopLeft, PlacementSize::Large),
    rule(0, 1, Corner::TopLeft, PlacementSize::Large),
    rule(0, 2, Corner::TopLeft, PlacementSize::Large),
    rule(0, 3, Corner::TopLeft, PlacementSize::Large),
    rule(1, 0, Corner::TopLeft, PlacementSize::Small),
    rule(1, 1, Corner::BottomLeft, PlacementSize::Large),
    rule(1, 2, Corner::TopRight, PlacementSize::Small),
    rule(1, 3, Corner::BottomRight, PlacementSize::Large),
    rule(2, 0, Corner::TopLeft, PlacementSize::Large),
    rule(2, 1, Corner::TopRight, PlacementSize::Large),
];

/// Target rectangle in host logical coordinates, y growing downwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub right: i32,
    pub bottom: i32,
    pub top: i32,
}

pub fn rule_for(mode: LayoutMode, primary: u8) -> Option<&'static PlacementRule> {
    RULES.iter().find(|r| r.mode == mode && r.primary == primary)
}

/// Base transform for a window of `content` size under `rule`.
pub fn place(
    rule: &PlacementRule,
    region: Region,
    scale: f32,
    content: (i32, i32),
    mirror_offset: i32,
) -> BaseTransform {
    let s = scale * rule.size.factor();
    let w = (content.0 as f32 * s) as i32;
    let h = (content.1 as f32 * s) as i32;

    let (x, y) = match rule.corner {
        Corner::TopLeft => (region.left, region.top),
        Corner::TopRight => (region.right - w, region.top),
        Corner::BottomLeft => (region.left, region.bottom - h),
        Corner::BottomRight => (region.right - w, region.bottom - h),
    };

    BaseTransform::uniform(x + mirror_offset, y, s)
}
