// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory document and prompt used by unit tests.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use kurbo::{Point, Rect, Size};

use crate::error::HostError;
use crate::host::{LayoutStyle, MediaHost, SpeedPrompt, Visibility, WatchedAttr};
use crate::registry::TrackId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct OverlayId(u32);

#[derive(Debug)]
pub(crate) struct FakeListener(OverlayId);

#[derive(Debug)]
pub(crate) struct FakeWatch(NodeId);

#[derive(Debug)]
struct Node {
    is_video: bool,
    parent: Option<NodeId>,
    style: LayoutStyle,
    bounds: Rect,
    src: Option<String>,
    tag: Option<TrackId>,
    rate: f64,
    default_rate: f64,
    playing: bool,
    position: f64,
    resumes: u32,
}

#[derive(Debug)]
struct OverlayNode {
    container: NodeId,
    attached: bool,
    text: String,
    origin: Point,
    tag: Option<TrackId>,
}

/// A document tree whose root is node 0 and whose body is node 1.
#[derive(Debug, Default)]
pub(crate) struct FakeDom {
    nodes: Vec<Node>,
    overlays: Vec<OverlayNode>,
    listeners: usize,
    watches: usize,
    pub(crate) fail_create: bool,
    pub(crate) fail_wire: bool,
    pub(crate) fail_watch: bool,
    pub(crate) reject_rate: bool,
}

impl FakeDom {
    pub(crate) fn new() -> Self {
        let mut dom = Self::default();
        let root = dom.push(false, None);
        dom.push(false, Some(root));
        dom
    }

    fn push(&mut self, is_video: bool, parent: Option<NodeId>) -> NodeId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "test documents are tiny"
        )]
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            is_video,
            parent,
            style: LayoutStyle::default(),
            bounds: if is_video {
                Rect::new(0.0, 0.0, 400.0, 300.0)
            } else {
                Rect::ZERO
            },
            src: None,
            tag: None,
            rate: 1.0,
            default_rate: 1.0,
            playing: false,
            position: 0.0,
            resumes: 0,
        });
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    fn overlay(&self, id: OverlayId) -> &OverlayNode {
        &self.overlays[id.0 as usize]
    }

    fn overlay_mut(&mut self, id: OverlayId) -> &mut OverlayNode {
        &mut self.overlays[id.0 as usize]
    }

    pub(crate) fn body(&self) -> NodeId {
        NodeId(1)
    }

    pub(crate) fn add_div(&mut self, parent: Option<NodeId>) -> NodeId {
        self.push(false, parent)
    }

    pub(crate) fn add_video(&mut self, parent: Option<NodeId>, src: &str) -> NodeId {
        let id = self.push(true, parent);
        self.node_mut(id).src = (!src.is_empty()).then(|| src.to_string());
        id
    }

    /// Unlinks `id` (and so its subtree) from its parent.
    pub(crate) fn detach_node(&mut self, id: NodeId) {
        self.node_mut(id).parent = None;
    }

    pub(crate) fn insert_node(&mut self, id: NodeId, parent: NodeId) {
        self.node_mut(id).parent = Some(parent);
    }

    pub(crate) fn set_bounds(&mut self, id: NodeId, bounds: Rect) {
        self.node_mut(id).bounds = bounds;
    }

    pub(crate) fn set_style(&mut self, id: NodeId, style: LayoutStyle) {
        self.node_mut(id).style = style;
    }

    pub(crate) fn set_visibility(&mut self, id: NodeId, visibility: Visibility) {
        self.node_mut(id).style.visibility = visibility;
    }

    pub(crate) fn set_src(&mut self, id: NodeId, src: &str) {
        self.node_mut(id).src = Some(src.to_string());
    }

    pub(crate) fn set_playing(&mut self, id: NodeId, playing: bool, position: f64) {
        let node = self.node_mut(id);
        node.playing = playing;
        node.position = position;
    }

    pub(crate) fn rate(&self, id: NodeId) -> f64 {
        self.node(id).rate
    }

    pub(crate) fn default_rate(&self, id: NodeId) -> f64 {
        self.node(id).default_rate
    }

    pub(crate) fn resumes(&self, id: NodeId) -> u32 {
        self.node(id).resumes
    }

    pub(crate) fn tag(&self, id: NodeId) -> Option<TrackId> {
        self.node(id).tag
    }

    pub(crate) fn overlay_text(&self, id: OverlayId) -> &str {
        &self.overlay(id).text
    }

    pub(crate) fn overlay_origin(&self, id: OverlayId) -> Point {
        self.overlay(id).origin
    }

    pub(crate) fn overlay_container(&self, id: OverlayId) -> NodeId {
        self.overlay(id).container
    }

    /// Overlays currently attached under `container`.
    pub(crate) fn overlays_under(&self, container: NodeId) -> usize {
        self.overlays
            .iter()
            .filter(|o| o.attached && o.container == container)
            .count()
    }

    /// Overlays attached anywhere in the document.
    pub(crate) fn live_overlays(&self) -> usize {
        self.overlays_in_document().len()
    }

    pub(crate) fn listeners(&self) -> usize {
        self.listeners
    }

    pub(crate) fn watches(&self) -> usize {
        self.watches
    }

    /// Inserts an overlay-looking node nobody owns.
    pub(crate) fn add_stray_overlay(&mut self, container: NodeId) -> OverlayId {
        self.new_overlay(container)
    }

    fn new_overlay(&mut self, container: NodeId) -> OverlayId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "test documents are tiny"
        )]
        let id = OverlayId(self.overlays.len() as u32);
        self.overlays.push(OverlayNode {
            container,
            attached: true,
            text: String::new(),
            origin: Point::ZERO,
            tag: None,
        });
        id
    }
}

impl MediaHost for FakeDom {
    type Element = NodeId;
    type Overlay = OverlayId;
    type Listener = FakeListener;
    type Watch = FakeWatch;

    fn media_elements(&self) -> Vec<NodeId> {
        (0_u32..)
            .zip(&self.nodes)
            .map(|(i, node)| (NodeId(i), node))
            .filter(|(id, node)| node.is_video && self.is_connected(id))
            .map(|(id, _)| id)
            .collect()
    }

    fn is_media(&self, el: &NodeId) -> bool {
        self.node(*el).is_video
    }

    fn is_connected(&self, el: &NodeId) -> bool {
        let mut cur = *el;
        loop {
            if cur == NodeId(0) {
                return true;
            }
            match self.node(cur).parent {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
    }

    fn layout_style(&self, el: &NodeId) -> LayoutStyle {
        self.node(*el).style
    }

    fn bounds(&self, el: &NodeId) -> Rect {
        self.node(*el).bounds
    }

    fn parent(&self, el: &NodeId) -> Option<NodeId> {
        self.node(*el).parent
    }

    fn source(&self, el: &NodeId) -> Option<String> {
        self.node(*el).src.clone()
    }

    fn track_tag(&self, el: &NodeId) -> Option<TrackId> {
        self.node(*el).tag
    }

    fn set_track_tag(&mut self, el: &NodeId, tag: Option<TrackId>) {
        self.node_mut(*el).tag = tag;
    }

    fn create_overlay(&mut self, container: &NodeId) -> Result<OverlayId, HostError> {
        if self.fail_create {
            return Err(HostError::Rejected("create refused".to_string()));
        }
        if !self.is_connected(container) {
            return Err(HostError::Detached);
        }
        Ok(self.new_overlay(*container))
    }

    fn remove_overlay(&mut self, overlay: &OverlayId) {
        self.overlay_mut(*overlay).attached = false;
    }

    fn overlay_attached(&self, overlay: &OverlayId, container: &NodeId) -> bool {
        let o = self.overlay(*overlay);
        o.attached && o.container == *container && self.is_connected(container)
    }

    fn overlays_in_document(&self) -> Vec<OverlayId> {
        (0_u32..)
            .zip(&self.overlays)
            .filter(|(_, o)| o.attached && self.is_connected(&o.container))
            .map(|(i, _)| OverlayId(i))
            .collect()
    }

    fn overlay_tag(&self, overlay: &OverlayId) -> Option<TrackId> {
        self.overlay(*overlay).tag
    }

    fn overlay_size(&self, _overlay: &OverlayId) -> Size {
        Size::new(40.0, 20.0)
    }

    fn set_overlay_text(&mut self, overlay: &OverlayId, text: &str) {
        self.overlay_mut(*overlay).text = text.to_string();
    }

    fn move_overlay(&mut self, overlay: &OverlayId, origin: Point) {
        self.overlay_mut(*overlay).origin = origin;
    }

    fn wire_overlay(&mut self, overlay: &OverlayId, id: TrackId) -> Result<FakeListener, HostError> {
        if self.fail_wire {
            return Err(HostError::Rejected("wire refused".to_string()));
        }
        self.overlay_mut(*overlay).tag = Some(id);
        self.listeners += 1;
        Ok(FakeListener(*overlay))
    }

    fn unwire_overlay(&mut self, listener: FakeListener) {
        self.overlay_mut(listener.0).tag = None;
        self.listeners -= 1;
    }

    fn watch_attributes(
        &mut self,
        el: &NodeId,
        _id: TrackId,
        attrs: &[WatchedAttr],
    ) -> Result<FakeWatch, HostError> {
        assert_eq!(attrs, WatchedAttr::ALL, "every attribute is watched");
        if self.fail_watch {
            return Err(HostError::Rejected("watch refused".to_string()));
        }
        self.watches += 1;
        Ok(FakeWatch(*el))
    }

    fn unwatch(&mut self, watch: FakeWatch) {
        let _ = watch.0;
        self.watches -= 1;
    }

    fn set_playback_rate(&mut self, el: &NodeId, rate: f64) -> Result<(), HostError> {
        if self.reject_rate {
            return Err(HostError::Rejected("rate refused".to_string()));
        }
        if !self.is_connected(el) {
            return Err(HostError::Detached);
        }
        let node = self.node_mut(*el);
        node.rate = rate;
        node.default_rate = rate;
        Ok(())
    }

    fn playback_rate(&self, el: &NodeId) -> f64 {
        self.node(*el).rate
    }

    fn is_playing(&self, el: &NodeId) -> bool {
        self.node(*el).playing
    }

    fn current_time(&self, el: &NodeId) -> f64 {
        self.node(*el).position
    }

    fn resume_at(&mut self, el: &NodeId, position: f64) -> Result<(), HostError> {
        let node = self.node_mut(*el);
        node.position = position;
        node.resumes += 1;
        Ok(())
    }
}

/// What a [`ScriptedPrompt`] was asked and told.
#[derive(Debug, Default)]
pub(crate) struct PromptLog {
    pub(crate) answers: VecDeque<Option<String>>,
    pub(crate) asked: Vec<(String, String)>,
    pub(crate) notices: Vec<String>,
}

/// Answers prompts from a script; the test keeps a clone of the log.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedPrompt(pub(crate) Rc<RefCell<PromptLog>>);

impl ScriptedPrompt {
    pub(crate) fn answer(&self, answer: Option<&str>) {
        self.0
            .borrow_mut()
            .answers
            .push_back(answer.map(ToString::to_string));
    }
}

impl SpeedPrompt for ScriptedPrompt {
    fn ask(&mut self, message: &str, default: &str) -> Option<String> {
        let mut log = self.0.borrow_mut();
        log.asked.push((message.to_string(), default.to_string()));
        log.answers.pop_front().flatten()
    }

    fn notify(&mut self, message: &str) {
        self.0.borrow_mut().notices.push(message.to_string());
    }
}
