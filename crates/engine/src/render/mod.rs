mod compositor;
mod pixel_buffer;
mod textures;
mod transform;

pub use compositor::{
    blend_pixel, Compositor, CompositorError, DynamicProp, SpriteStamp, StaticProp,
};
pub use pixel_buffer::{
    channel_to_u8, PixelBuffer, PixelBufferError, PixelBufferLoadError, A, B, CHANNELS, G, R,
};
pub use textures::{TexturePack, TextureSizeError};
pub use transform::{world_to_screen_px, Viewport};
