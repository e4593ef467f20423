//! Gesture recognition for trade controls.
//!
//! Turns one continuous pointer contact into at most one discrete outcome:
//! a trade intent after a completed press-and-hold, or a coin/amount preset
//! change after a deliberate swipe. Taps and short drags produce nothing.

pub mod config;
pub mod control;
pub mod driver;
pub mod error;
pub mod layout;
pub mod recognizer;

pub use config::GestureConfig;
pub use control::{ControlId, ControlKind, ControlSpec, Point, Selection};
pub use driver::GestureDriver;
pub use error::{GestureError, GestureResult};
pub use layout::{layout_for_width, standard_buttons, ButtonLayout, ButtonSlot};
pub use recognizer::{side_for_position, GestureEvent, GestureRecognizer, Phase};
