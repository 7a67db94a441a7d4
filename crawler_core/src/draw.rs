//! The drawing surface the game draws through.
//!
//! Hosts implement [`Canvas`] and [`Camera`]; the crate itself never touches a
//! window or terminal.

use serde::{Deserialize, Serialize};

use crate::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

/// Colour of the attack hitbox overlay.
pub const HITBOX_COLOR: Rgba = Rgba(255, 60, 60, 110);

/// World-to-screen transform.
pub trait Camera {
    fn apply(&self, rect: Rect) -> Rect;
}

/// A surface that accepts screen-space rectangles.
pub trait Canvas {
    fn fill_rect(&mut self, rect: Rect, color: Rgb);

    /// Draws a translucent rectangle over what is already there.
    fn blend_rect(&mut self, rect: Rect, color: Rgba);
}

/// Camera that leaves world coordinates untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCamera;

impl Camera for IdentityCamera {
    fn apply(&self, rect: Rect) -> Rect {
        rect
    }
}
