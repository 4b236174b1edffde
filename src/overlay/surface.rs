// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::geometry::{PageMetrics, SelectionRect};

/// Nodes the overlay puts on top of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverlayNode {
    Backdrop,
    Instructions,
    Outline,
    ConfirmButton,
    ProcessingIndicator,
}

impl OverlayNode {
    pub const ALL: [OverlayNode; 5] = [
        OverlayNode::Backdrop,
        OverlayNode::Instructions,
        OverlayNode::Outline,
        OverlayNode::ConfirmButton,
        OverlayNode::ProcessingIndicator,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerSet {
    /// pointer-down, touch-start, key-down
    Activation,
    /// pointer-move, pointer-up
    Drag,
}

/// Where the confirm affordance goes: horizontally centred on `center_x`, top edge at `top`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmPlacement {
    pub center_x: f64,
    pub top: f64,
}

/// The page the overlay is drawn on.
///
/// Unmounting a node that is not mounted, or detaching listeners that are not attached,
/// must be a no-op.
pub trait PageSurface {
    fn metrics(&self) -> PageMetrics;

    fn mount(&mut self, node: OverlayNode);

    fn unmount(&mut self, node: OverlayNode);

    fn set_instructions(&mut self, text: &str);

    fn place_outline(&mut self, rect: SelectionRect);

    fn place_confirm(&mut self, placement: ConfirmPlacement);

    fn listen(&mut self, listeners: ListenerSet);

    fn unlisten(&mut self, listeners: ListenerSet);
}

#[derive(Debug, Default)]
struct SurfaceState {
    metrics: PageMetrics,
    mounted: HashSet<OverlayNode>,
    listening: HashSet<ListenerSet>,
    instructions: String,
    outline: Option<SelectionRect>,
    confirm: Option<ConfirmPlacement>,
}

/// In-memory page without a renderer, for the CLI and tests.
///
/// Clones share state, so one clone can drive the overlay while another inspects it.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl HeadlessSurface {
    #[must_use]
    pub fn new(metrics: PageMetrics) -> Self {
        let surface = Self::default();
        surface.lock().metrics = metrics;
        surface
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn mounted(&self) -> Vec<OverlayNode> {
        let mut nodes: Vec<_> = self.lock().mounted.iter().copied().collect();
        nodes.sort();
        nodes
    }

    #[must_use]
    pub fn is_mounted(&self, node: OverlayNode) -> bool {
        self.lock().mounted.contains(&node)
    }

    #[must_use]
    pub fn is_listening(&self, listeners: ListenerSet) -> bool {
        self.lock().listening.contains(&listeners)
    }

    /// No overlay node left and no listener attached.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        let state = self.lock();
        state.mounted.is_empty() && state.listening.is_empty()
    }

    #[must_use]
    pub fn instructions(&self) -> String {
        self.lock().instructions.clone()
    }

    #[must_use]
    pub fn outline(&self) -> Option<SelectionRect> {
        self.lock().outline
    }

    #[must_use]
    pub fn confirm(&self) -> Option<ConfirmPlacement> {
        self.lock().confirm
    }
}

impl PageSurface for HeadlessSurface {
    fn metrics(&self) -> PageMetrics {
        self.lock().metrics
    }

    fn mount(&mut self, node: OverlayNode) {
        if self.lock().mounted.insert(node) {
            log::trace!("mounted {node:?}");
        }
    }

    fn unmount(&mut self, node: OverlayNode) {
        let mut state = self.lock();
        if state.mounted.remove(&node) {
            log::trace!("unmounted {node:?}");
        }
        match node {
            OverlayNode::Outline => state.outline = None,
            OverlayNode::ConfirmButton => state.confirm = None,
            OverlayNode::Instructions => state.instructions.clear(),
            _ => {}
        }
    }

    fn set_instructions(&mut self, text: &str) {
        text.clone_into(&mut self.lock().instructions);
    }

    fn place_outline(&mut self, rect: SelectionRect) {
        self.lock().outline = Some(rect);
    }

    fn place_confirm(&mut self, placement: ConfirmPlacement) {
        self.lock().confirm = Some(placement);
    }

    fn listen(&mut self, listeners: ListenerSet) {
        self.lock().listening.insert(listeners);
    }

    fn unlisten(&mut self, listeners: ListenerSet) {
        self.lock().listening.remove(&listeners);
    }
}
