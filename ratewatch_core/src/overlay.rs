// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overlay geometry: container resolution and placement.
//!
//! Both pieces are pure reads of the host. Creating, wiring, and destroying
//! overlays is done by the [`Engine`](crate::engine::Engine), which owns the
//! registry the overlays belong to.

use kurbo::{Point, Rect, Size};

use crate::config::{Anchor, EngineConfig};
use crate::host::{LayoutMode, MediaHost, Positioning};

/// Finds the ancestor an element's overlay is positioned in.
///
/// Walks at most `config.container_search_depth` ancestors starting at the
/// parent and takes the first that is positioned, lays out as flex or grid, or
/// is about as wide as the element. Falls back to the parent. Returns `None`
/// for an element without a parent.
#[must_use]
pub fn resolve_container<H: MediaHost>(
    host: &H,
    el: &H::Element,
    config: &EngineConfig,
) -> Option<H::Element> {
    let parent = host.parent(el)?;
    let width = host.bounds(el).width();

    let mut candidate = Some(parent.clone());
    for _ in 0..config.container_search_depth {
        let Some(ancestor) = candidate else { break };
        let style = host.layout_style(&ancestor);
        if style.positioning == Positioning::Positioned
            || style.mode != LayoutMode::Flow
            || wraps_width(
                host.bounds(&ancestor).width(),
                width,
                config.container_width_tolerance,
            )
        {
            return Some(ancestor);
        }
        candidate = host.parent(&ancestor);
    }
    Some(parent)
}

/// Whether `container` is still one of the ancestors [`resolve_container`]
/// could have picked for `el`.
///
/// False once the page has moved the element out from under the container.
#[must_use]
pub fn still_contains<H: MediaHost>(
    host: &H,
    container: &H::Element,
    el: &H::Element,
    config: &EngineConfig,
) -> bool {
    let mut ancestor = host.parent(el);
    for _ in 0..config.container_search_depth.max(1) {
        match ancestor {
            Some(a) if a == *container => return true,
            Some(a) => ancestor = host.parent(&a),
            None => return false,
        }
    }
    false
}

fn wraps_width(ancestor: f64, element: f64, tolerance: f64) -> bool {
    element > 0.0 && (ancestor - element).abs() <= element * tolerance
}

/// Computes the overlay origin relative to its container's border box.
///
/// The overlay is put at the anchored corner of the element, `inset` px in on
/// both axes, then clamped so it keeps `margin` px from every container edge.
/// When the container is too small for that, the overlay sits at `margin`.
#[must_use]
pub fn place_overlay(
    container: Rect,
    element: Rect,
    overlay: Size,
    anchor: Anchor,
    inset: f64,
    margin: f64,
) -> Point {
    let left = element.x0 - container.x0 + inset;
    let top = element.y0 - container.y0 + inset;
    let right = element.x1 - container.x0 - inset - overlay.width;
    let bottom = element.y1 - container.y0 - inset - overlay.height;

    let (x, y) = match anchor {
        Anchor::TopLeft => (left, top),
        Anchor::TopRight => (right, top),
        Anchor::BottomLeft => (left, bottom),
        Anchor::BottomRight => (right, bottom),
    };

    Point::new(
        clamp_axis(x, container.width() - overlay.width, margin),
        clamp_axis(y, container.height() - overlay.height, margin),
    )
}

fn clamp_axis(value: f64, room: f64, margin: f64) -> f64 {
    let max = room - margin;
    if max < margin {
        margin
    } else {
        value.clamp(margin, max)
    }
}
