use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// A native call reported failure. `code` is the HRESULT (Win32 errors are
    /// carried in their HRESULT form).
    #[error("HRESULT: {code:#010x} {message}")]
    Native { code: i32, message: String },

    #[error("no hardware adapter supports the required feature level")]
    AdapterNotFound,

    #[error("window handle is no longer valid")]
    InvalidWindowHandle,

    #[error("this application requires Windows")]
    UnsupportedPlatform,
}

impl Error {
    pub fn native(code: i32, message: impl Into<String>) -> Self {
        Self::Native {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[cfg(windows)]
    pub fn last_os_error() -> Self {
        windows::core::Error::from_win32().into()
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for Error {
    fn from(e: windows::core::Error) -> Self {
        Self::native(e.code().0, e.message().to_string())
    }
}
