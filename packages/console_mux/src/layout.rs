//! Pane-split geometry between the graph (top) and terminal (bottom) panes.
//!
//! ```text
//! ┌──────────────────────────────┐  ─┐
//! │            graph             │   │ viewport_height − terminal_pane_height
//! ├──────────── handle ──────────┤  ─┤
//! │           terminal           │   │ terminal_pane_height
//! └──────────────────────────────┘  ─┘
//! ```
//!
//! Two states: `Idle` and `Dragging`. Pointer-down on the handle starts a
//! drag, pointer-up ends it, pointer-move only matters while dragging.

/// Minimum distance, in viewport units, between the handle and either edge.
pub const DEFAULT_PANE_MARGIN: u16 = 50;
/// How far from the handle row a pointer-down still grabs it.
pub const DEFAULT_HANDLE_TOLERANCE: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutState {
    pub terminal_pane_height: u16,
    pub viewport_width: u16,
    pub viewport_height: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

/// Target dimensions for both renderers after a layout change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneBounds {
    pub graph: Size,
    pub terminal: Size,
}

/// A renderer that can be told to re-fit itself to new bounds.
pub trait FitTarget {
    fn fit(&mut self, size: Size);
}

impl PaneBounds {
    /// Signal both renderers.
    pub fn fit(self, graph: &mut dyn FitTarget, terminal: &mut dyn FitTarget) {
        graph.fit(self.graph);
        terminal.fit(self.terminal);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Dragging,
}

#[derive(Debug, Clone)]
pub struct LayoutController {
    state: LayoutState,
    drag: DragState,
    margin: u16,
    tolerance: u16,
}

/// `[lo, hi]` for the terminal pane height. When the viewport is too short
/// for both margins the range collapses instead of inverting.
fn height_bounds(viewport_height: u16, margin: u16) -> (u16, u16) {
    let lo = margin.min(viewport_height);
    let hi = viewport_height.saturating_sub(margin).max(lo);
    (lo, hi)
}

impl LayoutController {
    pub fn new(viewport_width: u16, viewport_height: u16, terminal_pane_height: u16) -> Self {
        Self::with_margin(
            viewport_width,
            viewport_height,
            terminal_pane_height,
            DEFAULT_PANE_MARGIN,
        )
    }

    pub fn with_margin(
        viewport_width: u16,
        viewport_height: u16,
        terminal_pane_height: u16,
        margin: u16,
    ) -> Self {
        let (lo, hi) = height_bounds(viewport_height, margin);
        Self {
            state: LayoutState {
                terminal_pane_height: terminal_pane_height.clamp(lo, hi),
                viewport_width,
                viewport_height,
            },
            drag: DragState::Idle,
            margin,
            tolerance: DEFAULT_HANDLE_TOLERANCE,
        }
    }

    pub fn with_handle_tolerance(mut self, tolerance: u16) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn margin(&self) -> u16 {
        self.margin
    }

    pub fn height_bounds(&self) -> (u16, u16) {
        height_bounds(self.state.viewport_height, self.margin)
    }

    /// Row of the boundary between the two panes.
    pub fn handle_row(&self) -> u16 {
        self.state
            .viewport_height
            .saturating_sub(self.state.terminal_pane_height)
    }

    pub fn bounds(&self) -> PaneBounds {
        let LayoutState {
            terminal_pane_height,
            viewport_width,
            viewport_height,
        } = self.state;
        PaneBounds {
            graph: Size {
                width: viewport_width,
                height: viewport_height.saturating_sub(terminal_pane_height),
            },
            terminal: Size {
                width: viewport_width,
                height: terminal_pane_height,
            },
        }
    }

    /// Starts a drag if `y` is on the handle. Returns whether it did.
    pub fn pointer_down(&mut self, y: u16) -> bool {
        if self.handle_row().abs_diff(y) <= self.tolerance {
            self.drag = DragState::Dragging;
            true
        } else {
            false
        }
    }

    /// While dragging, moves the handle to `y`. Returns new bounds only when
    /// the terminal pane height actually changed.
    pub fn pointer_move(&mut self, y: u16) -> Option<PaneBounds> {
        if self.drag != DragState::Dragging {
            return None;
        }
        let (lo, hi) = self.height_bounds();
        let height = self.state.viewport_height.saturating_sub(y).clamp(lo, hi);
        if height == self.state.terminal_pane_height {
            return None;
        }
        self.state.terminal_pane_height = height;
        Some(self.bounds())
    }

    pub fn pointer_up(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Viewport changed. Always yields bounds, dragging or not; the pane
    /// height is re-clamped against the new viewport.
    pub fn resize(&mut self, viewport_width: u16, viewport_height: u16) -> PaneBounds {
        self.state.viewport_width = viewport_width;
        self.state.viewport_height = viewport_height;
        let (lo, hi) = self.height_bounds();
        self.state.terminal_pane_height = self.state.terminal_pane_height.clamp(lo, hi);
        self.bounds()
    }
}
