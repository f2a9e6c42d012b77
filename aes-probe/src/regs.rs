/*!
Register layout of the aes engine, as far as it is understood.

Offsets are relative to the window base. Most names are guesses derived from
watching the vendor firmware drive the block, none of them are confirmed.
*/

use memprobe::error::{Error, ErrorKind, ErrorOrigin, Result};
use serde::{Deserialize, Serialize};

/// Physical base of the engine on the target.
pub const AES_BASE: u64 = 0x38c0_0000;
/// Bytes mapped around the engine. The real size of the block is unknown.
pub const AES_WINDOW_SIZE: usize = 0x100;
/// Bytes covered by a register dump.
pub const AES_DUMP_LEN: usize = 0x90;

/// Mixes interrupt status and engine state. Set to 1 before setup, 0 when done.
pub const CONTROL: usize = 0x00;
/// Starts the operation.
pub const GO: usize = 0x04;
/// Written 1 for the fourth hardware key and expected to read back 0.
#[allow(dead_code)]
pub const KEY_UNKNOWN: usize = 0x08;
pub const STATUS: usize = 0x0c;
#[allow(dead_code)]
pub const UNKNOWN_1: usize = 0x10;
pub const KEY_CONTROL: usize = 0x14;

pub const OUT_SIZE: usize = 0x18;
/// Writes appear to be ignored.
#[allow(dead_code)]
pub const OUT_UNUSED: usize = 0x1c;
pub const OUT_ADDRESS: usize = 0x20;

pub const IN_SIZE: usize = 0x24;
pub const IN_ADDRESS: usize = 0x28;

pub const AUX_SIZE: usize = 0x2c;
pub const AUX_ADDRESS: usize = 0x30;
pub const ADDITIONAL_SIZE: usize = 0x34;

#[allow(dead_code)]
pub const UNKNOWN_2: usize = 0x38;
#[allow(dead_code)]
pub const UNKNOWN_3: usize = 0x3c;
#[allow(dead_code)]
pub const UNKNOWN_4: usize = 0x40;
#[allow(dead_code)]
pub const UNKNOWN_5: usize = 0x44;
#[allow(dead_code)]
pub const UNKNOWN_6: usize = 0x48;

/// First of eight key words. 256-bit keys start here, 192-bit keys at `KEY3`, 128-bit keys at `KEY5`.
pub const KEY1: usize = 0x4c;
pub const KEY_WORDS: usize = 8;

/// Selects between the custom key and the hardware keys.
pub const KEY_TYPE: usize = 0x6c;
/// Written 1 before every operation, possibly a flush.
pub const OPERATION: usize = 0x70;

/// First of four iv words.
pub const IV1: usize = 0x74;
pub const IV_WORDS: usize = 4;

pub const UNUSED_1: usize = 0x84;
/// Receives the inverted value read back from `KEY_TYPE`.
pub const KEY_TYPE_AGAIN: usize = 0x88;

/// Status bit that stays set while the engine is busy.
pub const STATUS_BUSY: u32 = 1 << 0;

/// Offset of the n-th key word (starting at 0).
pub const fn key(n: usize) -> usize {
    KEY1 + n * 4
}

/// Offset of the n-th iv word (starting at 0).
pub const fn iv(n: usize) -> usize {
    IV1 + n * 4
}

/// Key size field, bits 5:4 of the key control word.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl KeySize {
    /// Number of 32-bit key words.
    pub const fn words(self) -> usize {
        match self {
            KeySize::Aes128 => 4,
            KeySize::Aes192 => 6,
            KeySize::Aes256 => 8,
        }
    }

    const fn bits(self) -> u32 {
        match self {
            KeySize::Aes128 => 0b00,
            KeySize::Aes192 => 0b01,
            KeySize::Aes256 => 0b10,
        }
    }

    /// Offset of the first key register used for this key size.
    ///
    /// Shorter keys occupy the tail of the key registers.
    pub const fn first_register(self) -> usize {
        key(KEY_WORDS - self.words())
    }

    /// Derives the key size from the number of key words.
    pub fn from_words(words: usize) -> Result<Self> {
        match words {
            4 => Ok(KeySize::Aes128),
            6 => Ok(KeySize::Aes192),
            8 => Ok(KeySize::Aes256),
            _ => Err(Error(ErrorOrigin::Config, ErrorKind::Configuration)
                .log_error(format!("{} key words do not form an aes key", words))),
        }
    }
}

/// Cipher mode field, bits 3:2 of the key control word.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherMode {
    /// Behaves like ecb, meaning unknown.
    Unknown,
    Ecb,
    Cbc,
    Ctr,
}

impl CipherMode {
    const fn bits(self) -> u32 {
        match self {
            CipherMode::Unknown => 0b00,
            CipherMode::Ecb => 0b01,
            CipherMode::Cbc => 0b10,
            CipherMode::Ctr => 0b11,
        }
    }
}

/// The guessed layout of the key control register.
///
/// ```text
///  31           6  5  4  3  2  1  0
/// +--------------+-----+-----+---+---+
/// | reserved     | key | mode| ? |enc|
/// +--------------+-----+-----+---+---+
/// ```
///
/// The vendor firmware sets the reserved bits and bit 1, so we do the same.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyControl {
    pub key_size: KeySize,
    pub mode: CipherMode,
    pub encrypt: bool,
    pub bit1: bool,
    pub reserved_high: bool,
}

impl Default for KeyControl {
    fn default() -> Self {
        Self {
            key_size: KeySize::Aes128,
            mode: CipherMode::Cbc,
            encrypt: true,
            bit1: true,
            reserved_high: true,
        }
    }
}

impl KeyControl {
    const RESERVED_MASK: u32 = !0x3f;

    /// Assembles the register value.
    pub const fn to_word(&self) -> u32 {
        let mut word = (self.key_size.bits() << 4) | (self.mode.bits() << 2);
        if self.reserved_high {
            word |= Self::RESERVED_MASK;
        }
        if self.bit1 {
            word |= 1 << 1;
        }
        if self.encrypt {
            word |= 1 << 0;
        }
        word
    }
}
