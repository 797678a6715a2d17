use std::{ffi::CString, io};

#[cfg(windows)]
use windows::{core::PCSTR, Win32::System::Diagnostics::Debug::OutputDebugStringA};

pub trait AsCString {
    fn as_c_string(&self) -> CString;
}

impl AsCString for String {
    fn as_c_string(&self) -> CString {
        CString::new(self.clone()).unwrap_or_default()
    }
}

impl AsCString for &str {
    fn as_c_string(&self) -> CString {
        self.to_string().as_c_string()
    }
}

/// Writes `s` to the attached debugger. Without a Windows debugger channel the
/// text goes to stderr instead.
pub fn print_debug_string(s: &str) {
    #[cfg(windows)]
    {
        let message = s.as_c_string();
        unsafe {
            OutputDebugStringA(PCSTR(message.as_ptr() as _));
        }
    }

    #[cfg(not(windows))]
    eprint!("{s}");
}

/// Log sink that forwards every formatted record to [`print_debug_string`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DebugStringWriter;

impl io::Write for DebugStringWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        print_debug_string(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "warn"
    }
}

/// Installs the process logger. `RUST_LOG` overrides the default filter.
/// Calling this more than once is harmless.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or(default_log_filter());

    let _ = env_logger::Builder::from_env(env)
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Pipe(Box::new(DebugStringWriter)))
        .try_init();
}
