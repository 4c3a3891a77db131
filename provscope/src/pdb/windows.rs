//! Windows (legacy) debug format probe.
//!
//! The legacy format is an MSF container. Source link and the compiler records are
//! portable-format-only features, so the probe only needs to establish that a blob *is*
//! a structurally plausible legacy debug file - that distinguishes "old but readable
//! symbols" from "garbage", which map to different verdicts.

/// MSF 7.0 container signature.
const MSF_MAGIC: &[u8; 32] = b"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0";

/// Returns `true` when the buffer opens like a legacy (MSF) debug file.
///
/// Checks the container signature and that the declared page size is a sane power of
/// two; page contents are never decoded.
#[must_use]
pub fn is_windows_pdb(data: &[u8]) -> bool {
    if data.len() < 52 || &data[..32] != MSF_MAGIC {
        return false;
    }

    let page_size = u32::from_le_bytes([data[32], data[33], data[34], data[35]]);
    page_size.is_power_of_two() && (512..=8192).contains(&page_size)
}
