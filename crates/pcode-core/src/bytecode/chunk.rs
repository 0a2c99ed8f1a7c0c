//! Instruction sequence plus a compact binary roundtrip implementation.
//!
//! Layout (little-endian):
//! `PCBC` · version `u16` · reserved `u16` · count `u32` · instructions · CRC32 `u32`
//! where the CRC covers every byte before it.

use core::fmt;

use crate::bytecode::instr::{ArithOp, CmpOp, Instruction, Operand, Target, Temp};
use crate::{crc32_ieee, MAGIC_PCBC, PCBC_VERSION};

const OP_ASN: u8 = 0x01;
const OP_AOP: u8 = 0x02;
const OP_COM: u8 = 0x03;
const OP_IDX: u8 = 0x04;
const OP_RET: u8 = 0x05;
const OP_SKP: u8 = 0x06;
const OP_JMP: u8 = 0x07;

const OPERAND_INT: u8 = 0x00;
const OPERAND_VAR: u8 = 0x01;
const OPERAND_TEMP: u8 = 0x02;

const TARGET_VAR: u8 = 0x00;
const TARGET_ELEMENT: u8 = 0x01;

/// Errors returned when decoding a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// Binary payload does not match the expected layout.
    Format(&'static str),
    /// Opcode tag outside the closed instruction set.
    UnknownOpcode {
        /// Raw tag.
        tag: u8,
        /// Index of the offending instruction.
        pc: u32,
    },
    /// CRC32 mismatch detected while decoding a payload.
    HashMismatch {
        /// CRC32 recomputed from the payload.
        expected: u32,
        /// CRC32 value read from the payload.
        found: u32,
    },
    /// A jump or skip lands outside the instruction sequence.
    BadTarget {
        /// Index of the offending instruction.
        pc: u32,
        /// Index it would land on.
        target: u64,
    },
    /// A temporary index no generated program of this length can use.
    BadTemp {
        /// Index of the offending instruction.
        pc: u32,
        /// Temporary index.
        temp: u32,
    },
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::UnknownOpcode { tag, pc } => write!(f, "unknown opcode 0x{tag:02X} at {pc}"),
            Self::HashMismatch { expected, found } => write!(
                f,
                "hash mismatch (crc32): expected=0x{expected:08X}, found=0x{found:08X}"
            ),
            Self::BadTarget { pc, target } => {
                write!(f, "instruction {pc} lands on {target}, past the end of the program")
            }
            Self::BadTemp { pc, temp } => write!(f, "instruction {pc} uses temporary t{temp}, out of range"),
        }
    }
}

impl std::error::Error for ChunkError {}

/// A generated program, ready to be written to disk or executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    version: u16,
    /// Linear instruction sequence.
    pub code: Vec<Instruction>,
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl From<Vec<Instruction>> for Chunk {
    fn from(code: Vec<Instruction>) -> Self {
        Self::new(code)
    }
}

impl Chunk {
    /// Wraps an instruction sequence.
    #[must_use]
    pub const fn new(code: Vec<Instruction>) -> Self {
        Self { version: PCBC_VERSION, code }
    }

    /// Chunk format version.
    #[must_use]
    pub const fn version(&self) -> u16 {
        self.version
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// True when the chunk holds no instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// True when `data` starts with the chunk magic.
    #[must_use]
    pub fn sniff(data: &[u8]) -> bool {
        data.starts_with(MAGIC_PCBC)
    }

    /// Encode the chunk to its binary form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC_PCBC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // reserved

        write_u32(&mut out, len_u32(self.code.len()));
        for instr in &self.code {
            match instr {
                Instruction::Asn { target, value } => {
                    out.push(OP_ASN);
                    match target {
                        Target::Var(name) => {
                            out.push(TARGET_VAR);
                            write_str(&mut out, name);
                        }
                        Target::Element { array, index } => {
                            out.push(TARGET_ELEMENT);
                            write_operand(&mut out, array);
                            write_operand(&mut out, index);
                        }
                    }
                    write_operand(&mut out, value);
                }
                Instruction::Aop { op, lhs, rhs, dest } => {
                    out.push(OP_AOP);
                    out.push(op.code());
                    write_operand(&mut out, lhs);
                    match rhs {
                        Some(rhs) => {
                            out.push(1);
                            write_operand(&mut out, rhs);
                        }
                        None => out.push(0),
                    }
                    write_u32(&mut out, dest.0);
                }
                Instruction::Com { op, lhs, rhs, dest } => {
                    out.push(OP_COM);
                    out.push(op.code());
                    write_operand(&mut out, lhs);
                    write_operand(&mut out, rhs);
                    write_u32(&mut out, dest.0);
                }
                Instruction::Idx { array, index, dest } => {
                    out.push(OP_IDX);
                    write_operand(&mut out, array);
                    write_operand(&mut out, index);
                    write_u32(&mut out, dest.0);
                }
                Instruction::Ret(value) => {
                    out.push(OP_RET);
                    match value {
                        Some(v) => {
                            out.push(1);
                            write_operand(&mut out, v);
                        }
                        None => out.push(0),
                    }
                }
                Instruction::Skp(n) => {
                    out.push(OP_SKP);
                    write_u32(&mut out, *n);
                }
                Instruction::Jmp(target) => {
                    out.push(OP_JMP);
                    write_u32(&mut out, *target);
                }
            }
        }

        let crc = crc32_ieee(&out);
        write_u32(&mut out, crc);
        out
    }

    /// Decode a chunk from [`Chunk::to_bytes`] output.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ChunkError> {
        if data.len() < MAGIC_PCBC.len() + 2 + 2 + 4 + 4 {
            return Err(ChunkError::Format("too short"));
        }

        let (payload, crc_bytes) = data.split_at(data.len() - 4);
        let found = read_u32(crc_bytes, &mut 0)?;
        let expected = crc32_ieee(payload);
        if expected != found {
            return Err(ChunkError::HashMismatch { expected, found });
        }

        if &payload[..MAGIC_PCBC.len()] != MAGIC_PCBC {
            return Err(ChunkError::Format("bad magic"));
        }
        let mut off = MAGIC_PCBC.len();

        let version = read_u16(payload, &mut off)?;
        if version != PCBC_VERSION {
            return Err(ChunkError::Format("unsupported version"));
        }
        let _reserved = read_u16(payload, &mut off)?;

        let count = read_u32(payload, &mut off)?;
        let mut code = Vec::new();
        for pc in 0..count {
            let tag = read_u8(payload, &mut off)?;
            let instr = match tag {
                OP_ASN => {
                    let target = match read_u8(payload, &mut off)? {
                        TARGET_VAR => Target::Var(read_string(payload, &mut off)?),
                        TARGET_ELEMENT => Target::Element {
                            array: read_operand(payload, &mut off)?,
                            index: read_operand(payload, &mut off)?,
                        },
                        _ => return Err(ChunkError::Format("unknown target tag")),
                    };
                    Instruction::Asn { target, value: read_operand(payload, &mut off)? }
                }
                OP_AOP => {
                    let op = ArithOp::from_code(read_u8(payload, &mut off)?)
                        .ok_or(ChunkError::Format("unknown arithmetic operator"))?;
                    let lhs = read_operand(payload, &mut off)?;
                    let rhs = match read_u8(payload, &mut off)? {
                        0 => None,
                        1 => Some(read_operand(payload, &mut off)?),
                        _ => return Err(ChunkError::Format("invalid operand flag")),
                    };
                    Instruction::Aop { op, lhs, rhs, dest: Temp(read_u32(payload, &mut off)?) }
                }
                OP_COM => {
                    let op = CmpOp::from_code(read_u8(payload, &mut off)?)
                        .ok_or(ChunkError::Format("unknown comparison operator"))?;
                    Instruction::Com {
                        op,
                        lhs: read_operand(payload, &mut off)?,
                        rhs: read_operand(payload, &mut off)?,
                        dest: Temp(read_u32(payload, &mut off)?),
                    }
                }
                OP_IDX => Instruction::Idx {
                    array: read_operand(payload, &mut off)?,
                    index: read_operand(payload, &mut off)?,
                    dest: Temp(read_u32(payload, &mut off)?),
                },
                OP_RET => match read_u8(payload, &mut off)? {
                    0 => Instruction::Ret(None),
                    1 => Instruction::Ret(Some(read_operand(payload, &mut off)?)),
                    _ => return Err(ChunkError::Format("invalid operand flag")),
                },
                OP_SKP => Instruction::Skp(read_u32(payload, &mut off)?),
                OP_JMP => Instruction::Jmp(read_u32(payload, &mut off)?),
                _ => return Err(ChunkError::UnknownOpcode { tag, pc }),
            };
            code.push(instr);
        }

        if off != payload.len() {
            return Err(ChunkError::Format("trailing bytes"));
        }

        Ok(Self { version, code })
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn len_u32(len: usize) -> u32 {
    len as u32
}

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    write_u32(buf, len_u32(bytes.len()));
    buf.extend_from_slice(bytes);
}

fn write_operand(buf: &mut Vec<u8>, operand: &Operand) {
    match operand {
        Operand::Int(v) => {
            buf.push(OPERAND_INT);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Operand::Var(name) => {
            buf.push(OPERAND_VAR);
            write_str(buf, name);
        }
        Operand::Temp(t) => {
            buf.push(OPERAND_TEMP);
            write_u32(buf, t.0);
        }
    }
}

fn read_u8(data: &[u8], off: &mut usize) -> Result<u8, ChunkError> {
    let v = *data.get(*off).ok_or(ChunkError::Format("u8 eof"))?;
    *off += 1;
    Ok(v)
}

fn read_u16(data: &[u8], off: &mut usize) -> Result<u16, ChunkError> {
    let bytes = read_exact(data, off, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], off: &mut usize) -> Result<u32, ChunkError> {
    let bytes = read_exact(data, off, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_i64(data: &[u8], off: &mut usize) -> Result<i64, ChunkError> {
    let bytes = read_exact(data, off, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(i64::from_le_bytes(raw))
}

fn read_string(data: &[u8], off: &mut usize) -> Result<String, ChunkError> {
    let len = read_u32(data, off)? as usize;
    let bytes = read_exact(data, off, len)?;
    let s = core::str::from_utf8(bytes).map_err(|_| ChunkError::Format("utf8"))?;
    Ok(String::from(s))
}

fn read_operand(data: &[u8], off: &mut usize) -> Result<Operand, ChunkError> {
    match read_u8(data, off)? {
        OPERAND_INT => Ok(Operand::Int(read_i64(data, off)?)),
        OPERAND_VAR => Ok(Operand::Var(read_string(data, off)?)),
        OPERAND_TEMP => Ok(Operand::Temp(Temp(read_u32(data, off)?))),
        _ => Err(ChunkError::Format("unknown operand tag")),
    }
}

fn read_exact<'a>(data: &'a [u8], off: &mut usize, len: usize) -> Result<&'a [u8], ChunkError> {
    let end = off.checked_add(len).ok_or(ChunkError::Format("overflow"))?;
    if end > data.len() {
        return Err(ChunkError::Format("slice eof"));
    }
    let slice = &data[*off..end];
    *off = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Chunk {
        Chunk::new(vec![
            Instruction::Asn { target: Target::Var("x".into()), value: Operand::Int(-5) },
            Instruction::Com { op: CmpOp::Le, lhs: Operand::var("x"), rhs: Operand::Int(3), dest: Temp(0) },
            Instruction::Skp(2),
            Instruction::Aop { op: ArithOp::Not, lhs: Operand::Temp(Temp(0)), rhs: None, dest: Temp(1) },
            Instruction::Asn {
                target: Target::Element { array: Operand::var("a"), index: Operand::Int(2) },
                value: Operand::Temp(Temp(1)),
            },
            Instruction::Idx { array: Operand::var("a"), index: Operand::Int(2), dest: Temp(2) },
            Instruction::Jmp(0),
            Instruction::Ret(Some(Operand::Temp(Temp(2)))),
        ])
    }

    #[test]
    fn binary_roundtrip() {
        let chunk = sample();
        let bytes = chunk.to_bytes();
        assert!(Chunk::sniff(&bytes));
        assert_eq!(Chunk::from_bytes(&bytes), Ok(chunk));
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let mut bytes = sample().to_bytes();
        bytes[12] ^= 0xFF;
        assert!(matches!(Chunk::from_bytes(&bytes), Err(ChunkError::HashMismatch { .. })));
    }

    #[test]
    fn unknown_opcode_is_reported_with_its_position() {
        let mut bytes = Chunk::new(vec![Instruction::Ret(None)]).to_bytes();
        bytes.truncate(bytes.len() - 4);
        // first instruction tag sits right after the 12-byte header
        bytes[12] = 0x7F;
        let crc = crc32_ieee(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(Chunk::from_bytes(&bytes), Err(ChunkError::UnknownOpcode { tag: 0x7F, pc: 0 }));
    }

    #[test]
    fn too_short() {
        assert_eq!(Chunk::from_bytes(b"PCBC"), Err(ChunkError::Format("too short")));
    }
}
