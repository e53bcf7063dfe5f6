use framelink::prelude::*;

pub const DEFAULT_SIZE: (u32, u32) = (800, 600);

const OVERLAY_ROWS: u32 = 24;

/// A CPU framebuffer standing in for a GPU window. Rows are stored
/// bottom-up, the way an OpenGL readback returns them.
pub struct SoftwareViewport {
    frame: u64,
    width: u32,
    height: u32,
    overlay_visible: bool,
    pixels: Vec<u8>,
}

impl SoftwareViewport {
    pub fn new((width, height): (u32, u32)) -> Self {
        let mut viewport = Self {
            frame: 0,
            width: width.max(1),
            height: height.max(1),
            overlay_visible: true,
            pixels: Vec::new(),
        };
        viewport.render();
        viewport
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    /// Moves to `frame` and redraws.
    pub fn present(&mut self, frame: u64) {
        self.frame = frame;
        self.render();
    }

    fn render(&mut self) {
        let (width, height) = (self.width as usize, self.height as usize);
        self.pixels.resize(width * height * 3, 0);

        let shift = (self.frame % 256) as usize;
        for (row, line) in self.pixels.chunks_exact_mut(width * 3).enumerate()
        {
            // Row 0 is the bottom of the image.
            let y = height - 1 - row;
            let in_overlay =
                self.overlay_visible && y < OVERLAY_ROWS as usize;

            for (x, pixel) in line.chunks_exact_mut(3).enumerate() {
                if in_overlay {
                    pixel.copy_from_slice(&[230, 230, 230]);
                } else {
                    pixel[0] = ((x * 255) / width.max(1)) as u8;
                    pixel[1] = ((y * 255) / height.max(1)) as u8;
                    pixel[2] = ((x + y + shift) % 256) as u8;
                }
            }
        }
    }
}

impl Viewport for SoftwareViewport {
    fn current_frame(&self) -> u64 {
        self.frame
    }

    fn resize_viewport(&mut self, width: u32, height: u32) {
        debug!("viewport resized to {}x{}", width, height);
        self.width = width.max(1);
        self.height = height.max(1);
        self.render();
    }

    fn viewport_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_overlay_visible(&mut self, visible: bool) {
        self.overlay_visible = visible;
    }

    fn read_framebuffer_rgb(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, String> {
        if (width, height) != (self.width, self.height) {
            return Err(format!(
                "readback of {}x{} from a {}x{} framebuffer",
                width, height, self.width, self.height
            ));
        }
        Ok(self.pixels.clone())
    }

    fn framebuffer_origin(&self) -> FramebufferOrigin {
        FramebufferOrigin::BottomLeft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_changes_readback_size() {
        let mut viewport = SoftwareViewport::new((32, 16));
        viewport.resize_viewport(20, 10);

        assert_eq!(viewport.viewport_size(), (20, 10));
        assert_eq!(viewport.read_framebuffer_rgb(20, 10).unwrap().len(), 600);
        assert!(viewport.read_framebuffer_rgb(32, 16).is_err());
    }

    #[test]
    fn overlay_covers_top_rows_when_visible() {
        let mut viewport = SoftwareViewport::new((4, 40));
        let with_overlay = viewport.read_framebuffer_rgb(4, 40).unwrap();

        viewport.set_overlay_visible(false);
        viewport.present(1);
        let without_overlay = viewport.read_framebuffer_rgb(4, 40).unwrap();

        // Last stored row is the top of the image.
        let top = 39 * 4 * 3;
        assert_eq!(&with_overlay[top..top + 3], &[230, 230, 230]);
        assert_ne!(&without_overlay[top..top + 3], &[230, 230, 230]);
        assert_eq!(viewport.current_frame(), 1);
    }
}
