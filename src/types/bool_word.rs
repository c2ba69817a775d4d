//! BoolWord type for Slate BOOL fields

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A BOOL field as it travels on the wire: a full 32-bit word.
///
/// The raw word is kept so a decoded message re-encodes to the same bytes.
/// Any non-zero word reads as `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BoolWord(pub u32);

impl BoolWord {
    pub const TRUE: BoolWord = BoolWord(1);
    pub const FALSE: BoolWord = BoolWord(0);

    /// Create a new BoolWord from the raw wire word.
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Boolean projection of the word.
    pub fn is_set(&self) -> bool {
        self.0 != 0
    }

    /// Get the raw u32 value.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl From<bool> for BoolWord {
    fn from(value: bool) -> Self {
        if value { Self::TRUE } else { Self::FALSE }
    }
}

impl From<BoolWord> for bool {
    fn from(word: BoolWord) -> Self {
        word.is_set()
    }
}

impl Serialize for BoolWord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.is_set())
    }
}

impl<'de> Deserialize<'de> for BoolWord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        bool::deserialize(deserializer).map(BoolWord::from)
    }
}
