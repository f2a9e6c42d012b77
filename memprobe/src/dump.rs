/*!
Human readable formatting of register values, register windows and raw buffers.

All helpers are `Display` wrappers so they can be logged, printed or collected into a `String`.

```
use memprobe::dump::RegisterBits;

assert_eq!(
    RegisterBits(0xdead_beef).to_string(),
    "deadbeef (11011110 10101101 10111110 11101111)"
);
```
*/

use crate::types::Address;

use std::fmt;

/// Formats a register value as hex followed by its bits, grouped by byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterBits(pub u32);

impl fmt::Display for RegisterBits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        write!(
            f,
            "{:08x} ({:08b} {:08b} {:08b} {:08b})",
            self.0, bytes[0], bytes[1], bytes[2], bytes[3]
        )
    }
}

/// Formats a list of registers as returned by [`RegisterWindow::dump`](crate::window::RegisterWindow::dump),
/// one `address => value (bits)` line per register.
#[derive(Copy, Clone, Debug)]
pub struct WindowDump<'a>(pub &'a [(Address, u32)]);

impl fmt::Display for WindowDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (addr, value) in self.0.iter() {
            writeln!(f, "{:08x} => {}", addr, RegisterBits(*value))?;
        }
        Ok(())
    }
}

/// A classic hex dump with offsets and an ascii column.
///
/// ```text
/// input buf:
///   0000  48 65 6c 6c 6f 2c 20 77 6f 72 6c 64 21 00 00 00  Hello, world!...
/// ```
#[derive(Copy, Clone, Debug)]
pub struct HexDump<'a> {
    desc: Option<&'a str>,
    bytes: &'a [u8],
    per_line: usize,
}

/// Default amount of bytes per line.
pub const HEX_DUMP_PER_LINE: usize = 16;

/// Creates a hex dump of `bytes` with `per_line` bytes on each line.
///
/// Line widths outside of `4..=64` fall back to 16 bytes.
pub fn hex_dump<'a>(desc: Option<&'a str>, bytes: &'a [u8], per_line: usize) -> HexDump<'a> {
    let per_line = if (4..=64).contains(&per_line) {
        per_line
    } else {
        HEX_DUMP_PER_LINE
    };
    HexDump {
        desc,
        bytes,
        per_line,
    }
}

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(desc) = self.desc {
            writeln!(f, "{}:", desc)?;
        }

        if self.bytes.is_empty() {
            return writeln!(f, "  ZERO LENGTH");
        }

        for (line, chunk) in self.bytes.chunks(self.per_line).enumerate() {
            write!(f, "  {:04x} ", line * self.per_line)?;
            for byte in chunk.iter() {
                write!(f, " {:02x}", byte)?;
            }
            for _ in chunk.len()..self.per_line {
                f.write_str("   ")?;
            }

            f.write_str("  ")?;
            for byte in chunk.iter() {
                let c = if (0x20..=0x7e).contains(byte) {
                    *byte as char
                } else {
                    '.'
                };
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
