use crate::error::Result;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl From<(i32, i32)> for Size {
    fn from((width, height): (i32, i32)) -> Self {
        Self { width, height }
    }
}

/// Client area of a freshly created window.
pub const DEFAULT_CLIENT_SIZE: Size = Size::new(1280, 720);

/// Owner-side callbacks of a presentation surface. Invoked synchronously from
/// inside message dispatch on the control thread.
pub trait WindowPresenter {
    fn on_window_close(&self);

    /// Smallest allowed client area while the user resizes the window.
    fn window_min_size(&self) -> Size;
}

pub trait PresentationSurface {
    fn client_size(&self) -> Result<Size>;

    fn show(&self);
    fn hide(&self);
    fn set_foreground(&self);
    fn update(&self);
}
