/// Number of bytes in a stdout/stderr frame header.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Offset of the big-endian payload length inside the frame header.
pub const FRAME_LENGTH_OFFSET: usize = 4;

/// Stream selector carried in byte 0 of a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamSelector {
    Stdin = 0,
    Stdout = 1,
    Stderr = 2,
}

impl StreamSelector {
    /// Converts a raw header byte into a selector.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }

    /// Returns the header byte for this selector.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}
