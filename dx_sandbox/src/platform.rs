use std::rc::Weak;

use common::{
    app::{GraphicsParams, Message, Platform},
    gfx::{create_graphics_system, D3d12GraphicsSystem},
    os::Window,
    surface::WindowPresenter,
    Result,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageA, PeekMessageA, PostQuitMessage, TranslateMessage, MSG, PM_REMOVE, WM_QUIT,
};

/// A Win32 window presented to by Direct3D 12.
pub struct Win32Platform;

impl Platform for Win32Platform {
    type Surface = Window;
    type Renderer = D3d12GraphicsSystem;

    fn create_surface(&mut self, presenter: Weak<dyn WindowPresenter>) -> Result<Window> {
        Window::new(presenter)
    }

    fn create_renderer(
        &mut self,
        surface: &Window,
        params: GraphicsParams,
    ) -> Result<D3d12GraphicsSystem> {
        create_graphics_system(surface.handle()?, params)
    }

    fn peek_message(&mut self) -> Option<Message> {
        let mut message = MSG::default();
        if !unsafe { PeekMessageA(&mut message, None, 0, 0, PM_REMOVE) }.as_bool() {
            return None;
        }

        if message.message == WM_QUIT {
            return Some(Message::Quit(message.wParam.0 as i32));
        }

        unsafe {
            let _ = TranslateMessage(&message);
            DispatchMessageA(&message);
        }

        Some(Message::Dispatched)
    }

    fn post_quit_message(&mut self, exit_code: i32) {
        unsafe { PostQuitMessage(exit_code) };
    }
}
