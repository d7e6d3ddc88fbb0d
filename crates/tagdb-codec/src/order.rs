use serde::{Deserialize, Serialize};

/// Byte order of multi-byte values inside the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the host.
    pub const NATIVE: Self = if cfg!(target_endian = "big") {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    };

    /// Returns `true` if values in this order need no swapping on this host.
    pub fn is_native(self) -> bool {
        self == Self::NATIVE
    }
}
