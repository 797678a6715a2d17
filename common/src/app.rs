use std::{
    cell::Cell,
    rc::{Rc, Weak},
};

use crate::{
    args::CommandLineArgs,
    error::Result,
    frame::Renderer,
    surface::{PresentationSurface, Size, WindowPresenter},
};

pub const WINDOW_MIN_SIZE: Size = Size::new(1280, 720);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphicsParams {
    pub width: u32,
    pub height: u32,
    pub enable_debug_layer: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    /// A message was handed to the window procedure.
    Dispatched,
    /// The platform quit message, carrying the exit code.
    Quit(i32),
}

/// Window system and graphics backend the application runs on.
pub trait Platform {
    type Surface: PresentationSurface;
    type Renderer: Renderer;

    fn create_surface(&mut self, presenter: Weak<dyn WindowPresenter>) -> Result<Self::Surface>;

    fn create_renderer(
        &mut self,
        surface: &Self::Surface,
        params: GraphicsParams,
    ) -> Result<Self::Renderer>;

    /// Removes one pending message and dispatches it, unless it is the quit
    /// message. `None` when the queue is empty.
    fn peek_message(&mut self) -> Option<Message>;

    fn post_quit_message(&mut self, exit_code: i32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    Exiting,
    Stopped,
}

/// Set once; later requests keep the first exit code.
#[derive(Debug, Default)]
pub struct ExitState {
    requested: Cell<bool>,
    code: Cell<i32>,
}

impl ExitState {
    /// Returns `false` if an exit had already been requested.
    pub fn request(&self, exit_code: i32) -> bool {
        if self.requested.get() {
            return false;
        }

        self.code.set(exit_code);
        self.requested.set(true);
        true
    }

    pub fn is_requested(&self) -> bool {
        self.requested.get()
    }

    pub fn code(&self) -> i32 {
        self.code.get()
    }
}

#[derive(Debug, Default)]
struct AppPresenter {
    exit: ExitState,
}

impl WindowPresenter for AppPresenter {
    fn on_window_close(&self) {
        log::debug!("window close requested");
        self.exit.request(0);
    }

    fn window_min_size(&self) -> Size {
        WINDOW_MIN_SIZE
    }
}

pub struct Application<P: Platform> {
    // Field order is drop order: graphics before the surface it presents to.
    graphics: Option<P::Renderer>,
    surface: Option<P::Surface>,
    presenter: Rc<AppPresenter>,
    platform: P,
    args: CommandLineArgs,
    state: LoopState,
    quit_posted: bool,
}

impl<P: Platform> Application<P> {
    pub fn new(platform: P, args: CommandLineArgs) -> Self {
        Self {
            graphics: None,
            surface: None,
            presenter: Rc::new(AppPresenter::default()),
            platform,
            args,
            state: LoopState::Starting,
            quit_posted: false,
        }
    }

    /// Runs until the window is closed and returns the exit code.
    pub fn run(&mut self) -> Result<i32> {
        let result = self.startup().and_then(|()| self.main_loop());
        self.shutdown();
        result?;

        Ok(self.exit_code())
    }

    pub fn request_exit(&self, exit_code: i32) {
        self.presenter.exit.request(exit_code);
    }

    pub fn is_exit_requested(&self) -> bool {
        self.presenter.exit.is_requested()
    }

    pub fn exit_code(&self) -> i32 {
        self.presenter.exit.code()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    fn startup(&mut self) -> Result<()> {
        self.state = LoopState::Starting;

        let presenter: Weak<dyn WindowPresenter> = Rc::downgrade(&self.presenter) as _;
        let surface = self.platform.create_surface(presenter)?;

        let size = surface.client_size()?;
        let params = GraphicsParams {
            width: size.width as u32,
            height: size.height as u32,
            enable_debug_layer: self.args.enable_debug_layer(),
        };
        log::info!(
            "creating graphics for {}x{} (debug layer: {})",
            params.width,
            params.height,
            params.enable_debug_layer
        );

        let surface = self.surface.insert(surface);
        self.graphics = Some(self.platform.create_renderer(surface, params)?);

        surface.show();
        surface.set_foreground();
        surface.update();

        self.process_messages();
        Ok(())
    }

    fn main_loop(&mut self) -> Result<()> {
        self.state = LoopState::Running;

        if self.is_exit_requested() {
            return Ok(());
        }

        while self.process_messages() {
            // The quit message is only seen on the next drain, so one more
            // frame is rendered after the exit request.
            if self.is_exit_requested() {
                self.post_quit_message();
            }

            if let Some(graphics) = self.graphics.as_mut() {
                graphics.render()?;
            }
        }

        debug_assert!(self.is_exit_requested());
        Ok(())
    }

    /// Drains the message queue. Returns `false` once the quit message is seen.
    fn process_messages(&mut self) -> bool {
        while let Some(message) = self.platform.peek_message() {
            if let Message::Quit(exit_code) = message {
                if !self.presenter.exit.request(exit_code) {
                    debug_assert_eq!(exit_code, self.exit_code());
                }
                return false;
            }
        }

        true
    }

    fn post_quit_message(&mut self) {
        if self.quit_posted {
            return;
        }

        log::debug!("posting quit message, exit code {}", self.exit_code());
        self.platform.post_quit_message(self.exit_code());
        self.quit_posted = true;
    }

    fn shutdown(&mut self) {
        self.state = LoopState::Exiting;

        if let Some(surface) = self.surface.as_ref() {
            surface.hide();
        }

        self.graphics = None;
        self.surface = None;

        self.state = LoopState::Stopped;
        log::info!("stopped with exit code {}", self.exit_code());
    }
}
