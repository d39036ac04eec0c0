use super::*;

/// Reference type of a file record sub-request.
pub const FILE_REFERENCE_TYPE: u8 = 0x06;

/// One record of a write file record (`0x15`) request.
///
/// `data` is already padded to an even number of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecord<'r> {
    pub file_number: u16,
    pub record_number: u16,
    pub data: RawData<'r>,
}

impl FileRecord<'_> {
    /// Record length in words.
    #[must_use]
    pub const fn record_len(&self) -> u16 {
        (self.data.len() / 2) as u16
    }
}
