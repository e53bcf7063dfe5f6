/// Row order of the pixels returned by [`Viewport::read_framebuffer_rgb`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FramebufferOrigin {
    #[default]
    TopLeft,
    /// First row is the bottom of the image (OpenGL readback convention).
    BottomLeft,
}

/// The host's rendering/windowing surface. Only ever called from the main
/// loop thread.
pub trait Viewport {
    fn current_frame(&self) -> u64;

    fn resize_viewport(&mut self, width: u32, height: u32);

    /// The size the viewport actually has, which may differ from the last
    /// requested size.
    fn viewport_size(&self) -> (u32, u32);

    fn set_overlay_visible(&mut self, visible: bool);

    /// Tightly packed 8-bit RGB, `width * height * 3` bytes.
    fn read_framebuffer_rgb(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, String>;

    fn framebuffer_origin(&self) -> FramebufferOrigin {
        FramebufferOrigin::TopLeft
    }
}
