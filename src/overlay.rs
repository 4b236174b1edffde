// SPDX-License-Identifier: GPL-3.0-only

//! Selector overlay
//!
//! Lets the user drag a rectangle over the page, then either confirms it (the selection
//! is dispatched to the capture coordinator) or cancels. All overlay UI is removed before
//! dispatching so none of it ends up in the screenshot.

pub mod surface;

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::coordinator::{CaptureReport, CoordinatorHandle};
use crate::error::{CaptureError, PendingError};
use crate::geometry::{CaptureContext, Point, SelectionRect, MIN_SELECTION_SIZE};
use crate::messages::CaptureResponder;

pub use surface::{ConfirmPlacement, HeadlessSurface, ListenerSet, OverlayNode, PageSurface};

pub const INSTRUCTIONS_IDLE: &str =
    "Click to start selection, move mouse, then release to finish (Press ESC to cancel)";
pub const INSTRUCTIONS_SELECTING: &str =
    "Release mouse button to complete selection (Press ESC to cancel)";
pub const INSTRUCTIONS_SELECTED: &str =
    "Area selected. Click \"Capture This Area\" to proceed or ESC to cancel.";

/// Vertical gap between the selection and the confirm affordance.
pub const CONFIRM_GAP: f64 = 10.0;

/// How long the processing indicator may stay up without a result.
pub const DEFAULT_PROCESSING_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayState {
    Idle,
    Selecting { origin: Point, rect: SelectionRect },
    Selected(SelectionRect),
    Dispatched,
    Cancelled,
}

impl OverlayState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dispatched | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pointer {
    Mouse,
    Touch { touches: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayEvent {
    PointerDown { position: Point, pointer: Pointer },
    PointerMove { position: Point },
    PointerUp { position: Point },
    KeyPressed(Key),
    ConfirmClicked,
}

#[derive(Debug)]
pub enum OverlayOutcome {
    Dispatched(PendingCapture),
    Cancelled,
}

/// Where confirmed selections go.
pub trait SelectionDispatch {
    fn dispatch(&self, context: CaptureContext) -> PendingCapture;
}

impl SelectionDispatch for CoordinatorHandle {
    fn dispatch(&self, context: CaptureContext) -> PendingCapture {
        self.confirm_selection(context)
    }
}

pub struct SelectorOverlay<S: PageSurface, D: SelectionDispatch = CoordinatorHandle> {
    surface: S,
    dispatcher: D,
    state: OverlayState,
    min_selection_size: f64,
    confirmed: Option<SelectionRect>,
}

impl<S: PageSurface, D: SelectionDispatch> SelectorOverlay<S, D> {
    /// Mounts the backdrop and instructions and starts listening for activation.
    pub fn new(mut surface: S, dispatcher: D) -> Self {
        surface.mount(OverlayNode::Backdrop);
        surface.mount(OverlayNode::Instructions);
        surface.set_instructions(INSTRUCTIONS_IDLE);
        surface.listen(ListenerSet::Activation);

        Self {
            surface,
            dispatcher,
            state: OverlayState::Idle,
            min_selection_size: MIN_SELECTION_SIZE,
            confirmed: None,
        }
    }

    /// Raises the minimum selection edge. Values below `MIN_SELECTION_SIZE` are ignored.
    #[must_use]
    pub fn with_min_selection_size(mut self, min_selection_size: f64) -> Self {
        self.min_selection_size = min_selection_size.max(MIN_SELECTION_SIZE);
        self
    }

    /// Restores a remembered selection if it is still valid for the current viewport.
    #[must_use]
    pub fn with_remembered(mut self, remembered: Option<SelectionRect>) -> Self {
        let Some(rect) = remembered else {
            return self;
        };
        let viewport = self.surface.metrics().viewport;
        if self.state == OverlayState::Idle
            && rect.is_finite()
            && rect.meets_minimum(self.min_selection_size)
            && rect.fits_in(viewport)
        {
            self.surface.mount(OverlayNode::Outline);
            self.surface.place_outline(rect);
            self.select(rect);
        } else {
            log::debug!("remembered selection {rect:?} does not fit {viewport:?}");
        }
        self
    }

    #[must_use]
    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// The rectangle being dragged or awaiting confirmation.
    #[must_use]
    pub fn selection(&self) -> Option<SelectionRect> {
        match self.state {
            OverlayState::Selecting { rect, .. } | OverlayState::Selected(rect) => Some(rect),
            _ => None,
        }
    }

    /// The rectangle that was dispatched, once confirmed.
    #[must_use]
    pub fn confirmed(&self) -> Option<SelectionRect> {
        self.confirmed
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn handle(&mut self, event: OverlayEvent) -> Option<OverlayOutcome> {
        if self.state.is_terminal() {
            log::trace!("overlay finished, ignoring {event:?}");
            return None;
        }

        match (self.state, event) {
            (_, OverlayEvent::KeyPressed(Key::Escape)) => {
                self.cancel();
                Some(OverlayOutcome::Cancelled)
            }
            (OverlayState::Idle, OverlayEvent::PointerDown { position, pointer }) => {
                if let Pointer::Touch { touches } = pointer {
                    if touches != 1 {
                        log::trace!("ignoring {touches}-finger touch");
                        return None;
                    }
                }
                self.start(position);
                None
            }
            (OverlayState::Selecting { origin, .. }, OverlayEvent::PointerMove { position }) => {
                self.drag(origin, position);
                None
            }
            (OverlayState::Selecting { origin, .. }, OverlayEvent::PointerUp { position }) => {
                let rect = self.drag(origin, position);
                self.surface.unlisten(ListenerSet::Drag);
                self.validate(rect);
                None
            }
            (
                OverlayState::Selected(rect),
                OverlayEvent::ConfirmClicked | OverlayEvent::KeyPressed(Key::Enter),
            ) => Some(OverlayOutcome::Dispatched(self.dispatch(rect))),
            _ => None,
        }
    }

    /// Drags `rect` from its top-left to its bottom-right corner and confirms it, the way a
    /// user would with a mouse.
    pub fn select_rect(&mut self, rect: SelectionRect) -> Option<OverlayOutcome> {
        let events = [
            OverlayEvent::PointerDown {
                position: Point::new(rect.left, rect.top),
                pointer: Pointer::Mouse,
            },
            OverlayEvent::PointerMove {
                position: Point::new(rect.right(), rect.bottom()),
            },
            OverlayEvent::PointerUp {
                position: Point::new(rect.right(), rect.bottom()),
            },
            OverlayEvent::ConfirmClicked,
        ];
        events.into_iter().find_map(|event| self.handle(event))
    }

    fn start(&mut self, origin: Point) {
        let rect = SelectionRect::collapsed(origin);
        self.surface.mount(OverlayNode::Outline);
        self.surface.place_outline(rect);
        self.surface.listen(ListenerSet::Drag);
        self.surface.set_instructions(INSTRUCTIONS_SELECTING);
        self.state = OverlayState::Selecting { origin, rect };
        log::debug!("selection started at ({}, {})", origin.x, origin.y);
    }

    fn drag(&mut self, origin: Point, position: Point) -> SelectionRect {
        let rect = SelectionRect::from_corners(origin, position);
        self.surface.place_outline(rect);
        self.state = OverlayState::Selecting { origin, rect };
        rect
    }

    fn validate(&mut self, rect: SelectionRect) {
        if rect.meets_minimum(self.min_selection_size) {
            self.select(rect);
            return;
        }

        log::debug!("selection {rect:?} too small, back to idle");
        self.surface.place_outline(SelectionRect::collapsed(Point::new(rect.left, rect.top)));
        self.surface.set_instructions(INSTRUCTIONS_IDLE);
        self.state = OverlayState::Idle;
    }

    fn select(&mut self, rect: SelectionRect) {
        self.surface.mount(OverlayNode::ConfirmButton);
        self.surface.place_confirm(ConfirmPlacement {
            center_x: rect.left + rect.width / 2.0,
            top: rect.bottom() + CONFIRM_GAP,
        });
        self.surface.set_instructions(INSTRUCTIONS_SELECTED);
        self.state = OverlayState::Selected(rect);
        log::debug!("selection {rect:?} awaiting confirmation");
    }

    fn dispatch(&mut self, rect: SelectionRect) -> PendingCapture {
        let context = CaptureContext::new(rect, self.surface.metrics());
        self.remove_ui();
        self.state = OverlayState::Dispatched;
        self.confirmed = Some(rect);
        log::debug!("dispatching selection {context:?}");
        self.dispatcher.dispatch(context)
    }

    fn cancel(&mut self) {
        self.remove_ui();
        self.state = OverlayState::Cancelled;
        log::debug!("selection cancelled");
    }

    fn remove_ui(&mut self) {
        self.surface.unlisten(ListenerSet::Drag);
        self.surface.unlisten(ListenerSet::Activation);
        for node in OverlayNode::ALL {
            self.surface.unmount(node);
        }
    }
}

/// Outcome of a dispatched selection, as seen from the page.
#[derive(Debug)]
pub struct PendingCapture {
    captured: oneshot::Receiver<()>,
    done: oneshot::Receiver<Result<CaptureReport, CaptureError>>,
}

impl PendingCapture {
    #[must_use]
    pub fn new(
        captured: oneshot::Receiver<()>,
        done: oneshot::Receiver<Result<CaptureReport, CaptureError>>,
    ) -> Self {
        Self { captured, done }
    }

    /// A connected responder/pending pair.
    #[must_use]
    pub fn channel() -> (CaptureResponder, Self) {
        let (captured, captured_rx) = oneshot::channel();
        let (done, done_rx) = oneshot::channel();
        let responder = CaptureResponder {
            captured: Some(captured),
            done: Some(done),
        };
        (responder, Self::new(captured_rx, done_rx))
    }

    /// Waits for the result without any page feedback
    ///
    /// # Errors
    /// The capture error of the cycle, or `PendingError::Disconnected` if the cycle ended
    /// without answering
    pub async fn wait(self) -> Result<CaptureReport, PendingError> {
        match self.done.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PendingError::Disconnected),
        }
    }

    /// Shows the processing indicator once the screenshot is taken and removes it when
    /// the result arrives or `timeout` runs out, whichever comes first
    ///
    /// # Errors
    /// As [`PendingCapture::wait`], plus `PendingError::TimedOut`
    pub async fn finish<S: PageSurface>(
        self,
        surface: &mut S,
        timeout: Duration,
    ) -> Result<CaptureReport, PendingError> {
        let Self { captured, done } = self;
        let deadline = Instant::now() + timeout;

        let outcome = tokio::time::timeout_at(deadline, async {
            if captured.await.is_ok() {
                surface.mount(OverlayNode::ProcessingIndicator);
            }
            done.await
        })
        .await;
        surface.unmount(OverlayNode::ProcessingIndicator);

        match outcome {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(_)) => Err(PendingError::Disconnected),
            Err(_) => {
                log::warn!("no capture result after {timeout:?}, hiding the processing indicator");
                Err(PendingError::TimedOut(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PageMetrics, ScrollOffset, ViewportSize};
    use crate::screenshot::CroppedImage;
    use std::cell::RefCell;

    struct Recorder {
        page: HeadlessSurface,
        dispatched: RefCell<Vec<CaptureContext>>,
        ui_left_at_dispatch: RefCell<Vec<OverlayNode>>,
        // Held so dispatched captures stay connected
        responders: RefCell<Vec<CaptureResponder>>,
    }

    fn recorder() -> Recorder {
        Recorder {
            page: surface(),
            dispatched: RefCell::default(),
            ui_left_at_dispatch: RefCell::default(),
            responders: RefCell::default(),
        }
    }

    impl SelectionDispatch for &Recorder {
        fn dispatch(&self, context: CaptureContext) -> PendingCapture {
            self.dispatched.borrow_mut().push(context);
            self.ui_left_at_dispatch
                .borrow_mut()
                .extend(self.page.mounted());
            let (responder, pending) = PendingCapture::channel();
            self.responders.borrow_mut().push(responder);
            pending
        }
    }

    fn metrics() -> PageMetrics {
        PageMetrics {
            scroll: ScrollOffset { x: 0.0, y: 340.0 },
            device_pixel_ratio: 2.0,
            viewport: ViewportSize::new(1280.0, 800.0),
        }
    }

    fn surface() -> HeadlessSurface {
        HeadlessSurface::new(metrics())
    }

    fn down(x: f64, y: f64) -> OverlayEvent {
        OverlayEvent::PointerDown {
            position: Point::new(x, y),
            pointer: Pointer::Mouse,
        }
    }

    fn moved(x: f64, y: f64) -> OverlayEvent {
        OverlayEvent::PointerMove {
            position: Point::new(x, y),
        }
    }

    fn up(x: f64, y: f64) -> OverlayEvent {
        OverlayEvent::PointerUp {
            position: Point::new(x, y),
        }
    }

    fn report() -> CaptureReport {
        CaptureReport {
            image: CroppedImage::from_png(vec![1, 2, 3]),
            fallback: None,
        }
    }

    #[test]
    fn opens_idle_with_backdrop_and_instructions() {
        let recorder = recorder();
        let overlay = SelectorOverlay::new(recorder.page.clone(), &recorder);

        assert_eq!(overlay.state(), OverlayState::Idle);
        assert_eq!(
            recorder.page.mounted(),
            vec![OverlayNode::Backdrop, OverlayNode::Instructions]
        );
        assert!(recorder.page.is_listening(ListenerSet::Activation));
        assert!(!recorder.page.is_listening(ListenerSet::Drag));
        assert_eq!(recorder.page.instructions(), INSTRUCTIONS_IDLE);
    }

    #[test]
    fn drag_tracks_bounding_box() {
        let recorder = recorder();
        let mut overlay = SelectorOverlay::new(recorder.page.clone(), &recorder);

        overlay.handle(down(300.0, 200.0));
        assert_eq!(recorder.page.outline(), Some(SelectionRect::new(300.0, 200.0, 0.0, 0.0)));
        assert!(recorder.page.is_listening(ListenerSet::Drag));
        assert_eq!(recorder.page.instructions(), INSTRUCTIONS_SELECTING);

        overlay.handle(moved(250.0, 120.0));
        assert_eq!(overlay.selection(), Some(SelectionRect::new(250.0, 120.0, 50.0, 80.0)));
        assert_eq!(recorder.page.outline(), overlay.selection());
    }

    #[test]
    fn small_selection_returns_to_idle() {
        let recorder = recorder();
        let mut overlay = SelectorOverlay::new(recorder.page.clone(), &recorder);

        for (w, h) in [(9.0, 100.0), (100.0, 9.0), (0.0, 0.0)] {
            overlay.handle(down(10.0, 10.0));
            overlay.handle(up(10.0 + w, 10.0 + h));

            assert_eq!(overlay.state(), OverlayState::Idle);
            let outline = recorder.page.outline().unwrap();
            assert_eq!((outline.width, outline.height), (0.0, 0.0));
            assert_eq!(recorder.page.instructions(), INSTRUCTIONS_IDLE);
            assert!(!recorder.page.is_listening(ListenerSet::Drag));
            assert!(!recorder.page.is_mounted(OverlayNode::ConfirmButton));
        }
        assert!(recorder.dispatched.borrow().is_empty());
    }

    #[test]
    fn valid_selection_places_confirm_below() {
        let recorder = recorder();
        let mut overlay = SelectorOverlay::new(recorder.page.clone(), &recorder);

        overlay.handle(down(100.0, 50.0));
        overlay.handle(moved(200.0, 100.0));
        overlay.handle(up(300.0, 200.0));

        assert_eq!(
            overlay.state(),
            OverlayState::Selected(SelectionRect::new(100.0, 50.0, 200.0, 150.0))
        );
        assert!(recorder.page.is_mounted(OverlayNode::ConfirmButton));
        assert_eq!(
            recorder.page.confirm(),
            Some(ConfirmPlacement {
                center_x: 200.0,
                top: 210.0
            })
        );
        assert_eq!(recorder.page.instructions(), INSTRUCTIONS_SELECTED);

        // A new press does not restart the selection.
        overlay.handle(down(5.0, 5.0));
        assert!(matches!(overlay.state(), OverlayState::Selected(_)));
    }

    #[test]
    fn confirm_removes_ui_before_dispatch() {
        let recorder = recorder();
        let mut overlay = SelectorOverlay::new(recorder.page.clone(), &recorder);

        overlay.handle(down(100.0, 50.0));
        overlay.handle(up(300.0, 200.0));
        let outcome = overlay.handle(OverlayEvent::ConfirmClicked);

        assert!(matches!(outcome, Some(OverlayOutcome::Dispatched(_))));
        assert_eq!(overlay.state(), OverlayState::Dispatched);
        assert!(recorder.ui_left_at_dispatch.borrow().is_empty());
        assert!(recorder.page.is_clear());

        let dispatched = recorder.dispatched.borrow();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].rect, SelectionRect::new(100.0, 50.0, 200.0, 150.0));
        assert_eq!(dispatched[0].scroll, ScrollOffset { x: 0.0, y: 340.0 });
        assert_eq!(dispatched[0].device_pixel_ratio, 2.0);
        assert_eq!(dispatched[0].viewport, ViewportSize::new(1280.0, 800.0));
    }

    #[test]
    fn enter_confirms_too() {
        let recorder = recorder();
        let mut overlay = SelectorOverlay::new(recorder.page.clone(), &recorder);

        overlay.handle(down(0.0, 0.0));
        overlay.handle(up(40.0, 40.0));
        assert!(overlay.handle(OverlayEvent::KeyPressed(Key::Enter)).is_some());
        assert_eq!(recorder.dispatched.borrow().len(), 1);
        assert_eq!(overlay.confirmed(), Some(SelectionRect::new(0.0, 0.0, 40.0, 40.0)));
    }

    #[test]
    fn escape_while_selecting_cancels_silently() {
        let recorder = recorder();
        let mut overlay = SelectorOverlay::new(recorder.page.clone(), &recorder);

        overlay.handle(down(10.0, 10.0));
        overlay.handle(moved(200.0, 200.0));
        let outcome = overlay.handle(OverlayEvent::KeyPressed(Key::Escape));

        assert!(matches!(outcome, Some(OverlayOutcome::Cancelled)));
        assert_eq!(overlay.state(), OverlayState::Cancelled);
        assert!(recorder.page.is_clear());
        assert!(recorder.dispatched.borrow().is_empty());
    }

    #[test]
    fn escape_in_other_states_cancels() {
        for events in [vec![], vec![down(0.0, 0.0), up(50.0, 50.0)]] {
            let recorder = recorder();
            let mut overlay = SelectorOverlay::new(recorder.page.clone(), &recorder);
            for event in events {
                overlay.handle(event);
            }
            overlay.handle(OverlayEvent::KeyPressed(Key::Escape));
            assert_eq!(overlay.state(), OverlayState::Cancelled);
            assert!(recorder.page.is_clear());
        }
    }

    #[test]
    fn events_after_terminal_state_are_ignored() {
        let recorder = recorder();
        let mut overlay = SelectorOverlay::new(recorder.page.clone(), &recorder);

        overlay.handle(OverlayEvent::KeyPressed(Key::Escape));
        assert!(overlay.handle(down(0.0, 0.0)).is_none());
        assert!(overlay.handle(OverlayEvent::ConfirmClicked).is_none());
        assert!(overlay.handle(OverlayEvent::KeyPressed(Key::Escape)).is_none());
        assert_eq!(overlay.state(), OverlayState::Cancelled);
        assert!(recorder.page.is_clear());
    }

    #[test]
    fn only_single_touch_starts_selection() {
        let recorder = recorder();
        let mut overlay = SelectorOverlay::new(recorder.page.clone(), &recorder);

        overlay.handle(OverlayEvent::PointerDown {
            position: Point::new(10.0, 10.0),
            pointer: Pointer::Touch { touches: 2 },
        });
        assert_eq!(overlay.state(), OverlayState::Idle);

        overlay.handle(OverlayEvent::PointerDown {
            position: Point::new(10.0, 10.0),
            pointer: Pointer::Touch { touches: 1 },
        });
        assert!(matches!(overlay.state(), OverlayState::Selecting { .. }));
    }

    #[test]
    fn remembered_selection_is_restored_when_it_fits() {
        let fitting = recorder();
        let rect = SelectionRect::new(100.0, 100.0, 300.0, 200.0);
        let overlay = SelectorOverlay::new(fitting.page.clone(), &fitting).with_remembered(Some(rect));
        assert_eq!(overlay.state(), OverlayState::Selected(rect));
        assert_eq!(fitting.page.outline(), Some(rect));

        let outside = recorder();
        let rect = SelectionRect::new(1200.0, 100.0, 300.0, 200.0);
        let overlay = SelectorOverlay::new(outside.page.clone(), &outside).with_remembered(Some(rect));
        assert_eq!(overlay.state(), OverlayState::Idle);
    }

    #[test]
    fn remembered_selection_confirms_without_dragging() {
        let recorder = recorder();
        let rect = SelectionRect::new(20.0, 30.0, 40.0, 50.0);
        let mut overlay = SelectorOverlay::new(recorder.page.clone(), &recorder).with_remembered(Some(rect));

        assert!(matches!(
            overlay.handle(OverlayEvent::ConfirmClicked),
            Some(OverlayOutcome::Dispatched(_))
        ));
        assert_eq!(recorder.dispatched.borrow()[0].rect, rect);
        assert!(recorder.page.is_clear());
    }

    #[test]
    fn minimum_size_cannot_go_below_default() {
        let lenient = recorder();
        let mut overlay = SelectorOverlay::new(lenient.page.clone(), &lenient).with_min_selection_size(2.0);

        overlay.handle(down(10.0, 10.0));
        overlay.handle(up(15.0, 15.0));
        assert_eq!(overlay.state(), OverlayState::Idle);

        let stricter = recorder();
        let mut overlay = SelectorOverlay::new(stricter.page.clone(), &stricter).with_min_selection_size(30.0);
        overlay.handle(down(10.0, 10.0));
        overlay.handle(up(30.0, 30.0));
        assert_eq!(overlay.state(), OverlayState::Idle);
    }

    #[tokio::test]
    async fn indicator_shown_between_capture_and_result() {
        let mut surface = surface();
        let page = surface.clone();
        let (mut responder, pending) = PendingCapture::channel();

        let waiter = tokio::spawn(async move { pending.finish(&mut surface, DEFAULT_PROCESSING_TIMEOUT).await });
        responder.captured();
        tokio::task::yield_now().await;
        while !page.is_mounted(OverlayNode::ProcessingIndicator) {
            tokio::task::yield_now().await;
        }

        responder.finish(Ok(report()));
        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.image.as_bytes(), &[1, 2, 3]);
        assert!(!page.is_mounted(OverlayNode::ProcessingIndicator));
    }

    #[tokio::test]
    async fn capture_failure_never_shows_indicator() {
        let mut surface = surface();
        let (responder, pending) = PendingCapture::channel();
        responder.finish(Err(CaptureError::NoActiveTarget));

        let result = pending.finish(&mut surface, DEFAULT_PROCESSING_TIMEOUT).await;
        assert!(matches!(
            result,
            Err(PendingError::Capture(CaptureError::NoActiveTarget))
        ));
        assert!(surface.is_clear());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_hides_indicator() {
        let mut surface = surface();
        let (mut responder, pending) = PendingCapture::channel();
        responder.captured();

        let result = pending.finish(&mut surface, Duration::from_secs(15)).await;
        assert!(matches!(result, Err(PendingError::TimedOut(t)) if t == Duration::from_secs(15)));
        assert!(!surface.is_mounted(OverlayNode::ProcessingIndicator));
        drop(responder);
    }

    #[tokio::test]
    async fn dropped_responder_disconnects() {
        let mut surface = surface();
        let (responder, pending) = PendingCapture::channel();
        drop(responder);
        assert!(matches!(
            pending.finish(&mut surface, DEFAULT_PROCESSING_TIMEOUT).await,
            Err(PendingError::Disconnected)
        ));
    }
}
