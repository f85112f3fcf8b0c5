/// Errors raised while building, decoding, or registering messages.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// A read would run past the end of the message body.
    #[error("buffer underrun: need {needed} bytes at offset {offset}, {available} available")]
    BufferUnderrun {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A length prefix was negative.
    #[error("invalid length prefix {0}")]
    InvalidLength(i32),

    /// A string field was not valid UTF-8.
    #[error("string at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    /// A string is too long for its `Int32` length prefix.
    #[error("string of {0} bytes exceeds the Int32 length prefix")]
    StringTooLong(usize),

    /// Two different names hash to the same type id.
    #[error("type id {id:#010x} already belongs to '{existing}', cannot register '{requested}'")]
    TypeIdCollision {
        id: u32,
        existing: String,
        requested: String,
    },

    /// Outer frame error.
    #[error("frame error: {0}")]
    Frame(#[from] wirehub_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, MessageError>;
