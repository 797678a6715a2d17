use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
    sync::atomic::{AtomicU32, Ordering},
};

use windows::{
    core::PCSTR,
    Win32::{
        Foundation::{
            GetLastError, SetLastError, E_INVALIDARG, ERROR_SUCCESS, HINSTANCE, HWND, LPARAM,
            LRESULT, POINT, RECT, WPARAM,
        },
        Graphics::Gdi::{GetStockObject, UpdateWindow, BLACK_BRUSH, HBRUSH},
        System::LibraryLoader::GetModuleHandleA,
        UI::WindowsAndMessaging::{
            AdjustWindowRect, CreateWindowExA, DefWindowProcA, DestroyWindow, GetClientRect,
            GetWindowLongPtrA, IsWindow, LoadCursorW, LoadIconW, RegisterClassExA,
            SetForegroundWindow, ShowWindow, UnregisterClassA, CS_HREDRAW, CS_VREDRAW,
            CW_USEDEFAULT, GWL_STYLE, IDC_ARROW, IDI_APPLICATION, MINMAXINFO, SW_HIDE, SW_NORMAL,
            WINDOW_EX_STYLE, WINDOW_STYLE, WM_CLOSE, WM_CREATE, WM_DESTROY, WM_GETMINMAXINFO,
            WNDCLASSEXA,
            WS_OVERLAPPEDWINDOW,
        },
    },
};

use crate::{
    error::{Error, Result},
    registry::WindowRegistry,
    surface::{PresentationSurface, Size, WindowPresenter, DEFAULT_CLIENT_SIZE},
    util::AsCString,
};

const WINDOWED_MODE_STYLE: WINDOW_STYLE = WS_OVERLAPPEDWINDOW;

const DEFAULT_WINDOW_TITLE: &str = "DX Sandbox";

// Class names are process-wide; every window registers its own.
static NEXT_CLASS_ID: AtomicU32 = AtomicU32::new(0);

thread_local! {
    static WINDOWS: RefCell<WindowRegistry<Rc<WindowState>>> = RefCell::new(WindowRegistry::new());
}

fn registry_key(hwnd: HWND) -> isize {
    hwnd.0 as isize
}

/// Outer window size whose client area is `size` under `style`.
pub fn adjusted_size(size: Size, style: WINDOW_STYLE) -> Result<Size> {
    let mut bounds = RECT {
        left: 0,
        top: 0,
        right: size.width,
        bottom: size.height,
    };
    unsafe { AdjustWindowRect(&mut bounds, style, false) }?;

    Ok(rect_size(&bounds))
}

fn rect_size(rect: &RECT) -> Size {
    Size::new(rect.right - rect.left, rect.bottom - rect.top)
}

struct WindowClass {
    atom: u16,
    instance: HINSTANCE,
}

impl WindowClass {
    fn register(instance: HINSTANCE) -> Result<Self> {
        let icon = unsafe { LoadIconW(None, IDI_APPLICATION) }?;
        let cursor = unsafe { LoadCursorW(None, IDC_ARROW) }?;

        let brush = HBRUSH(unsafe { GetStockObject(BLACK_BRUSH) }.0);
        if brush.is_invalid() {
            return Err(windows::core::Error::from(E_INVALIDARG).into());
        }

        let class_name = format!(
            "DxSandboxWindowClass{}",
            NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed)
        )
        .as_c_string();

        let wc = WNDCLASSEXA {
            cbSize: std::mem::size_of::<WNDCLASSEXA>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(wndproc),
            hInstance: instance,
            hIcon: icon,
            hCursor: cursor,
            hbrBackground: brush,
            lpszClassName: PCSTR(class_name.as_ptr() as _),
            ..Default::default()
        };

        let atom = unsafe { RegisterClassExA(&wc) };
        if atom == 0 {
            return Err(Error::last_os_error());
        }

        Ok(Self { atom, instance })
    }

    fn name(&self) -> PCSTR {
        PCSTR(self.atom as usize as *const u8)
    }
}

impl Drop for WindowClass {
    fn drop(&mut self) {
        if let Err(e) = unsafe { UnregisterClassA(self.name(), self.instance) } {
            log::error!("failed to unregister window class: {e}");
        }
    }
}

/// The part of a window the window procedure reaches through the registry.
struct WindowState {
    hwnd: Cell<HWND>,
    presenter: Weak<dyn WindowPresenter>,
    // Set at WM_CREATE. Before that the requested size must not be clamped.
    created: Cell<bool>,
}

impl WindowState {
    fn new(presenter: Weak<dyn WindowPresenter>) -> Self {
        Self {
            hwnd: Cell::new(HWND::default()),
            presenter,
            created: Cell::new(false),
        }
    }

    /// Returns `false` when the message is left to the default procedure.
    fn on_get_min_max_info(&self, hwnd: HWND, info: &mut MINMAXINFO) -> Result<bool> {
        if !self.created.get() {
            return Ok(false);
        }

        let Some(presenter) = self.presenter.upgrade() else {
            return Ok(false);
        };

        let min_size = adjusted_size(presenter.window_min_size(), window_style(hwnd)?)?;
        info.ptMinTrackSize = POINT {
            x: min_size.width,
            y: min_size.height,
        };

        Ok(true)
    }

    fn on_close(&self) {
        if let Some(presenter) = self.presenter.upgrade() {
            presenter.on_window_close();
        }
    }

    fn on_destroy(&self, hwnd: HWND) {
        let removed = WINDOWS.with_borrow_mut(|windows| windows.remove(registry_key(hwnd)));
        debug_assert!(removed.is_some());

        self.hwnd.set(HWND::default());
    }
}

fn window_style(hwnd: HWND) -> Result<WINDOW_STYLE> {
    let style = unsafe {
        SetLastError(ERROR_SUCCESS);
        GetWindowLongPtrA(hwnd, GWL_STYLE)
    };
    if style == 0 && unsafe { GetLastError() } != ERROR_SUCCESS {
        return Err(Error::last_os_error());
    }

    Ok(WINDOW_STYLE(style as u32))
}

pub struct Window {
    state: Rc<WindowState>,
    _class: WindowClass,
}

impl Window {
    pub fn new(presenter: Weak<dyn WindowPresenter>) -> Result<Self> {
        Self::with_client_size(presenter, DEFAULT_CLIENT_SIZE)
    }

    /// Creates a hidden window whose client area is `client_size`.
    pub fn with_client_size(
        presenter: Weak<dyn WindowPresenter>,
        client_size: Size,
    ) -> Result<Self> {
        let instance: HINSTANCE = unsafe { GetModuleHandleA(None) }?.into();
        let class = WindowClass::register(instance)?;

        let size = adjusted_size(client_size, WINDOWED_MODE_STYLE)?;

        let state = Rc::new(WindowState::new(presenter));

        let title = DEFAULT_WINDOW_TITLE.as_c_string();

        WINDOWS.with_borrow_mut(|windows| windows.begin_create(state.clone()));
        let created = unsafe {
            CreateWindowExA(
                WINDOW_EX_STYLE::default(),
                class.name(),
                PCSTR(title.as_ptr() as _),
                WINDOWED_MODE_STYLE,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                size.width,
                size.height,
                None, // No parent window.
                None, // No menus.
                instance,
                None,
            )
        };
        WINDOWS.with_borrow_mut(|windows| windows.end_create());

        let hwnd = match created {
            Ok(hwnd) => hwnd,
            Err(e) => {
                let bound = state.hwnd.replace(HWND::default());
                if !bound.0.is_null() {
                    WINDOWS.with_borrow_mut(|windows| windows.remove(registry_key(bound)));
                }
                return Err(e.into());
            }
        };
        debug_assert_eq!(state.hwnd.get(), hwnd);
        state.created.set(true);

        Ok(Self {
            state,
            _class: class,
        })
    }

    pub fn handle(&self) -> Result<HWND> {
        let hwnd = self.state.hwnd.get();
        if hwnd.0.is_null() || !unsafe { IsWindow(hwnd) }.as_bool() {
            return Err(Error::InvalidWindowHandle);
        }

        Ok(hwnd)
    }

    pub fn is_alive(&self) -> bool {
        self.handle().is_ok()
    }
}

impl PresentationSurface for Window {
    fn client_size(&self) -> Result<Size> {
        let mut client_rect = RECT::default();
        unsafe { GetClientRect(self.handle()?, &mut client_rect) }?;

        Ok(rect_size(&client_rect))
    }

    fn show(&self) {
        if let Ok(hwnd) = self.handle() {
            let _ = unsafe { ShowWindow(hwnd, SW_NORMAL) };
        }
    }

    fn hide(&self) {
        if let Ok(hwnd) = self.handle() {
            let _ = unsafe { ShowWindow(hwnd, SW_HIDE) };
        }
    }

    fn set_foreground(&self) {
        if let Ok(hwnd) = self.handle() {
            let _ = unsafe { SetForegroundWindow(hwnd) };
        }
    }

    fn update(&self) {
        if let Ok(hwnd) = self.handle() {
            let _ = unsafe { UpdateWindow(hwnd) };
        }
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        if let Ok(hwnd) = self.handle() {
            // WM_DESTROY is delivered before this returns.
            if let Err(e) = unsafe { DestroyWindow(hwnd) } {
                log::error!("failed to destroy window: {e}");
            }
        }

        debug_assert!(!self.is_alive());
    }
}

extern "system" fn wndproc(hwnd: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let Some((window, bound)) = WINDOWS.with_borrow_mut(|windows| windows.bind(registry_key(hwnd)))
    else {
        return unsafe { DefWindowProcA(hwnd, message, wparam, lparam) };
    };

    if bound {
        window.hwnd.set(hwnd);
    }

    match message {
        WM_GETMINMAXINFO => {
            let info = unsafe { &mut *(lparam.0 as *mut MINMAXINFO) };
            match window.on_get_min_max_info(hwnd, info) {
                Ok(true) => LRESULT::default(),
                Ok(false) => unsafe { DefWindowProcA(hwnd, message, wparam, lparam) },
                Err(e) => {
                    log::error!("failed to compute minimum window size: {e}");
                    unsafe { DefWindowProcA(hwnd, message, wparam, lparam) }
                }
            }
        }

        WM_CREATE => {
            window.created.set(true);
            unsafe { DefWindowProcA(hwnd, message, wparam, lparam) }
        }

        WM_CLOSE => {
            window.on_close();
            LRESULT::default()
        }

        WM_DESTROY => {
            window.on_destroy(hwnd);
            LRESULT::default()
        }

        _ => unsafe { DefWindowProcA(hwnd, message, wparam, lparam) },
    }
}
