//! Touch gesture recognition (pan, pinch, single and double tap) and the
//! affine view-transform algebra that turns gestures into a scale/translate
//! state for a zoomable surface.

pub mod config;
pub mod geometry;
pub mod gestures;
pub mod pipeline;
pub mod touch;
pub mod tracker;
pub mod transform;
pub mod view;
