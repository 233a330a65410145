use std::sync::Arc;

use pixels::{Error as PixelsError, Pixels, SurfaceTexture};
use thiserror::Error;
use winit::window::Window;

use crate::render::{CompositorError, Viewport};

use super::Simulation;

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("failed to composite frame: {0}")]
    Composite(#[from] CompositorError),
    #[error("failed to present frame: {0}")]
    Surface(#[from] PixelsError),
}

/// Owns the window surface and pushes composited frames to it.
pub struct Presenter {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
}

impl Presenter {
    pub fn new(window: Arc<Window>) -> Result<Self, PixelsError> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Rebuilds the surface at the new size. Zero sizes (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool, PixelsError> {
        if width == 0 || height == 0 {
            return Ok(false);
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(true)
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, PixelsError> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub fn present(&mut self, simulation: &mut Simulation) -> Result<(), PresentError> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Ok(());
        }
        simulation.draw(self.pixels.frame_mut())?;
        self.pixels.render()?;
        Ok(())
    }
}
