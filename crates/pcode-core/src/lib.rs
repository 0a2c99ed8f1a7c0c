//! pcode-core — primitives partagées entre le générateur et la machine
//!
//! Fournit :
//! - le jeu d'instructions fermé (`Opcode`, `Instruction`, `Operand`, `Target`)
//! - les valeurs d'exécution (`Value`) et leurs règles de coercition
//! - un désassembleur texte (`index: OPCODE operand ...`)
//! - un codec binaire compact (magic `PCBC`, CRC32 final)
//! - `crc32_ieee` (compact, sans table)
//!
//! Features :
//! - `serde` : dérive la (dé)sérialisation des instructions et des valeurs

#![deny(missing_docs)]

/* ─────────────────────────── Public modules ─────────────────────────── */

/// Bytecode primitives (instructions, chunk, disassembler, validation).
pub mod bytecode;

pub use bytecode::disasm;
pub use bytecode::helpers;

pub use bytecode::{
    ArithOp, Chunk, ChunkError, CmpOp, Instruction, Opcode, Operand, Target, Temp, Value,
    ValueParseError,
};

/* ─────────────────────────── Constants ─────────────────────────── */

/// Magic of a serialized chunk: `b"PCBC"`.
pub const MAGIC_PCBC: &[u8; 4] = b"PCBC";

/// Current chunk format version.
pub const PCBC_VERSION: u16 = 1;

/* ─────────────────────────── CRC32 IEEE ─────────────────────────── */

/// CRC32 (IEEE 802.3), compact table-less implementation.
#[must_use]
pub fn crc32_ieee(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &b in data {
        let mut x = (crc ^ u32::from(b)) & 0xFF;
        // polynomial 0xEDB88320, one bit per round
        for _ in 0..8 {
            let mask = (x & 1).wrapping_neg() & 0xEDB8_8320;
            x = (x >> 1) ^ mask;
        }
        crc = (crc >> 8) ^ x;
    }
    !crc
}

/* ─────────────────────────── Tests ─────────────────────────── */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_known_vector() {
        // standard check value for "123456789"
        assert_eq!(crc32_ieee(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_empty() {
        assert_eq!(crc32_ieee(b""), 0);
    }
}
