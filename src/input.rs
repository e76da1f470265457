//! Pointer input for the particle field.
//!
//! [`PointerTracker`] turns raw `winit` window events into
//! [`PointerEvent`]s: a screen position paired with the size of the viewport
//! it was measured in, which is everything
//! [`Controller::pointer_move`](crate::Controller::pointer_move) needs.
//!
//! # Usage
//!
//! ```ignore
//! fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
//!     if let Some(pointer) = self.pointer.handle_event(&event) {
//!         self.controller.pointer_move(pointer);
//!     }
//! }
//! ```

use glam::Vec2;
use winit::event::{TouchPhase, WindowEvent};

/// A pointer move in screen pixels (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: Vec2,
    /// Size of the viewport `position` was measured in.
    pub viewport: Vec2,
}

/// Tracks pointer position and viewport size across window events.
#[derive(Debug)]
pub struct PointerTracker {
    position: Vec2,
    delta: Vec2,
    viewport: Vec2,
    inside: bool,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new(Vec2::new(800.0, 600.0))
    }
}

impl PointerTracker {
    pub fn new(viewport: Vec2) -> Self {
        Self {
            position: Vec2::ZERO,
            delta: Vec2::ZERO,
            viewport,
            inside: false,
        }
    }

    // ========== Queries ==========

    /// Last pointer position in screen pixels.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Movement since the previous event, in pixels.
    pub fn delta(&self) -> Vec2 {
        self.delta
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Whether the pointer is over the window.
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Pointer position in normalized device coordinates (-1 to 1, y up).
    pub fn ndc(&self) -> Vec2 {
        if self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return Vec2::ZERO;
        }
        crate::projection::screen_to_ndc(self.position, self.viewport)
    }

    // ========== Updates ==========

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Vec2::new(width as f32, height as f32);
    }

    /// Record a move and return the event to forward.
    pub fn move_to(&mut self, position: Vec2) -> PointerEvent {
        self.delta = position - self.position;
        self.position = position;
        self.inside = true;
        PointerEvent {
            position,
            viewport: self.viewport,
        }
    }

    /// Process a window event. Returns a pointer event for cursor moves and
    /// for touches that start or move.
    pub fn handle_event(&mut self, event: &WindowEvent) -> Option<PointerEvent> {
        match event {
            WindowEvent::Resized(size) => {
                self.set_viewport(size.width, size.height);
                None
            }

            WindowEvent::CursorMoved { position, .. } => {
                Some(self.move_to(Vec2::new(position.x as f32, position.y as f32)))
            }

            WindowEvent::Touch(touch) => match touch.phase {
                TouchPhase::Started | TouchPhase::Moved => {
                    Some(self.move_to(Vec2::new(touch.location.x as f32, touch.location.y as f32)))
                }
                TouchPhase::Ended | TouchPhase::Cancelled => None,
            },

            WindowEvent::CursorLeft { .. } => {
                self.inside = false;
                None
            }

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_carries_viewport() {
        let mut pointer = PointerTracker::new(Vec2::new(1024.0, 768.0));
        let event = pointer.move_to(Vec2::new(10.0, 20.0));
        assert_eq!(event.viewport, Vec2::new(1024.0, 768.0));
        assert!(pointer.is_inside());

        pointer.set_viewport(640, 480);
        let event = pointer.move_to(Vec2::new(15.0, 20.0));
        assert_eq!(event.viewport, Vec2::new(640.0, 480.0));
        assert_eq!(pointer.delta(), Vec2::new(5.0, 0.0));
    }

    #[test]
    fn test_ndc() {
        let mut pointer = PointerTracker::new(Vec2::new(800.0, 600.0));
        pointer.move_to(Vec2::new(400.0, 300.0));
        assert!(pointer.ndc().length() < 0.01);

        pointer.move_to(Vec2::new(0.0, 0.0));
        assert_eq!(pointer.ndc(), Vec2::new(-1.0, 1.0));
    }

    #[test]
    fn test_resize_event() {
        let mut pointer = PointerTracker::default();
        let event = WindowEvent::Resized(winit::dpi::PhysicalSize::new(300, 200));
        assert_eq!(pointer.handle_event(&event), None);
        assert_eq!(pointer.viewport(), Vec2::new(300.0, 200.0));
    }
}
