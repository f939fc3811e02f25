pub mod color;
pub mod composite;
pub mod mask;

pub use color::{bgr_to_hsv, rgb_to_hsv, ColorRange, Hsv};
pub use composite::{combine, CompositeError};
pub use mask::{build_mask, Mask, MaskBuilder, MaskWindow};
