#![windows_subsystem = "windows"]

#[cfg(windows)]
mod platform;

use common::{args::CommandLineArgs, util::init_logging};

fn main() {
    init_logging();

    let command_line = CommandLineArgs::from_env();

    let exit_code = match run(&command_line) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            log::error!("{e}");
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(windows)]
fn run(command_line: &CommandLineArgs) -> common::Result<i32> {
    use common::app::Application;

    let mut app = Application::new(platform::Win32Platform, command_line.clone());
    let exit_code = app.run();
    drop(app);

    if command_line.enable_debug_layer() {
        common::gfx::report_live_objects();
    }

    exit_code
}

#[cfg(not(windows))]
fn run(_command_line: &CommandLineArgs) -> common::Result<i32> {
    Err(common::Error::UnsupportedPlatform)
}
