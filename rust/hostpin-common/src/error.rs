use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    /// The allocator refused a pinned allocation of `size` bytes with the given
    /// native status.
    pub fn allocation(size: usize, code: i32) -> Error {
        Error(ErrorKind::Allocation { size, code }.into())
    }

    /// The allocator's copy primitive failed while moving `size` bytes.
    pub fn copy(size: usize, code: i32) -> Error {
        Error(ErrorKind::Copy { size, code }.into())
    }

    /// Returns the native allocator status carried by this error, if any.
    pub fn native_code(&self) -> Option<i32> {
        match self.kind() {
            ErrorKind::Allocation { code, .. } | ErrorKind::Copy { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("failed to allocate {size} bytes of pinned memory (status {code})")]
    Allocation { size: usize, code: i32 },

    #[error("failed to copy {size} bytes (status {code})")]
    Copy { size: usize, code: i32 },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
