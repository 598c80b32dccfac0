// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Parser for the HTIF byte stream written by the test harness.
//!
//! The stream interleaves printable text with 8-byte little-endian markers,
//! each followed by a fixed-size payload of little-endian 64-bit words.

use crate::trace::InstructionTrace;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

pub const MARKER_REGISTERS_INT_ONLY: u64 = 0xFEED_C0DE_2000;
pub const MARKER_REGISTERS_INT_AND_FLOAT: u64 = 0xFEED_C0DE_1000;
pub const MARKER_EXCEPTION_CSR: u64 = 0xBAD_C0DE_1000;

/// 32 GPRs followed by 18 core CSRs.
pub const INT_DUMP_SIZE: usize = 400;
/// Integer dump, `fcsr`, then 32 FPRs.
pub const INT_FLOAT_DUMP_SIZE: usize = 664;
pub const EXCEPTION_DUMP_SIZE: usize = 72;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerType {
    RegistersIntOnly,
    RegistersIntAndFloat,
    ExceptionCsr,
    Unknown(u64),
}

impl MarkerType {
    pub fn from_value(value: u64) -> Option<Self> {
        match value {
            MARKER_REGISTERS_INT_ONLY => Some(MarkerType::RegistersIntOnly),
            MARKER_REGISTERS_INT_AND_FLOAT => Some(MarkerType::RegistersIntAndFloat),
            MARKER_EXCEPTION_CSR => Some(MarkerType::ExceptionCsr),
            _ => None,
        }
    }

    fn payload_size(self) -> usize {
        match self {
            MarkerType::RegistersIntOnly => INT_DUMP_SIZE,
            MarkerType::RegistersIntAndFloat => INT_FLOAT_DUMP_SIZE,
            MarkerType::ExceptionCsr => EXCEPTION_DUMP_SIZE,
            MarkerType::Unknown(_) => 0,
        }
    }
}

impl fmt::Display for MarkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerType::RegistersIntOnly => write!(f, "Integer register dump"),
            MarkerType::RegistersIntAndFloat => write!(f, "Integer + floating-point register dump"),
            MarkerType::ExceptionCsr => write!(f, "Exception CSR dump"),
            MarkerType::Unknown(v) => write!(f, "Unknown marker (0x{:016X})", v),
        }
    }
}

/// Machine-mode CSRs captured with every register dump, in dump order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreCsrs {
    pub mstatus: u64,
    pub misa: u64,
    pub medeleg: u64,
    pub mideleg: u64,
    pub mie: u64,
    pub mtvec: u64,
    pub mcounteren: u64,
    pub mscratch: u64,
    pub mepc: u64,
    pub mcause: u64,
    pub mtval: u64,
    pub mip: u64,
    pub mcycle: u64,
    pub minstret: u64,
    pub mvendorid: u64,
    pub marchid: u64,
    pub mimpid: u64,
    pub mhartid: u64,
}

impl CoreCsrs {
    pub const NAMES: [&'static str; 18] = [
        "mstatus",
        "misa",
        "medeleg",
        "mideleg",
        "mie",
        "mtvec",
        "mcounteren",
        "mscratch",
        "mepc",
        "mcause",
        "mtval",
        "mip",
        "mcycle",
        "minstret",
        "mvendorid",
        "marchid",
        "mimpid",
        "mhartid",
    ];

    pub fn from_words(w: &[u64; 18]) -> Self {
        Self {
            mstatus: w[0],
            misa: w[1],
            medeleg: w[2],
            mideleg: w[3],
            mie: w[4],
            mtvec: w[5],
            mcounteren: w[6],
            mscratch: w[7],
            mepc: w[8],
            mcause: w[9],
            mtval: w[10],
            mip: w[11],
            mcycle: w[12],
            minstret: w[13],
            mvendorid: w[14],
            marchid: w[15],
            mimpid: w[16],
            mhartid: w[17],
        }
    }

    pub fn to_words(&self) -> [u64; 18] {
        [
            self.mstatus,
            self.misa,
            self.medeleg,
            self.mideleg,
            self.mie,
            self.mtvec,
            self.mcounteren,
            self.mscratch,
            self.mepc,
            self.mcause,
            self.mtval,
            self.mip,
            self.mcycle,
            self.minstret,
            self.mvendorid,
            self.marchid,
            self.mimpid,
            self.mhartid,
        ]
    }

    /// `(name, value)` pairs in dump order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, u64)> {
        Self::NAMES.into_iter().zip(self.to_words())
    }
}

/// CSRs captured by the trap handler, in dump order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionCsrs {
    pub mstatus: u64,
    pub mcause: u64,
    pub mepc: u64,
    pub mtval: u64,
    pub mie: u64,
    pub mip: u64,
    pub mtvec: u64,
    pub mscratch: u64,
    pub mhartid: u64,
}

impl ExceptionCsrs {
    pub const NAMES: [&'static str; 9] = [
        "mstatus", "mcause", "mepc", "mtval", "mie", "mip", "mtvec", "mscratch", "mhartid",
    ];

    pub fn from_words(w: &[u64; 9]) -> Self {
        Self {
            mstatus: w[0],
            mcause: w[1],
            mepc: w[2],
            mtval: w[3],
            mie: w[4],
            mip: w[5],
            mtvec: w[6],
            mscratch: w[7],
            mhartid: w[8],
        }
    }

    pub fn to_words(&self) -> [u64; 9] {
        [
            self.mstatus,
            self.mcause,
            self.mepc,
            self.mtval,
            self.mie,
            self.mip,
            self.mtvec,
            self.mscratch,
            self.mhartid,
        ]
    }

    pub fn named(&self) -> impl Iterator<Item = (&'static str, u64)> {
        Self::NAMES.into_iter().zip(self.to_words())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDump {
    pub dump_type: MarkerType,
    pub int_registers: [u64; 32],
    pub core_csrs: CoreCsrs,
    pub float_registers: Option<[u64; 32]>,
    pub float_csr: Option<u64>,
    /// Byte offset of the marker in the stream.
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionDump {
    pub csrs: ExceptionCsrs,
    pub position: usize,
    #[serde(default)]
    pub inst_trace: Option<InstructionTrace>,
}

/// One recognised piece of the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamItem {
    Text(String),
    Marker { marker: MarkerType, position: usize },
    UnknownBinary { data: Vec<u8>, position: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedStream {
    pub raw_len: usize,
    pub items: Vec<StreamItem>,
    pub register_dumps: Vec<RegisterDump>,
    pub exception_dumps: Vec<ExceptionDump>,
}

impl ParsedStream {
    pub fn unknown_binary(&self) -> impl Iterator<Item = (usize, &[u8])> {
        self.items.iter().filter_map(|item| match item {
            StreamItem::UnknownBinary { data, position } => Some((*position, data.as_slice())),
            _ => None,
        })
    }

    pub fn text(&self) -> String {
        self.items
            .iter()
            .filter_map(|item| match item {
                StreamItem::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(buf)
}

fn read_words<const N: usize>(data: &[u8]) -> [u64; N] {
    let mut out = [0u64; N];
    for (i, w) in out.iter_mut().enumerate() {
        *w = read_u64_le(&data[i * 8..]);
    }
    out
}

fn is_text_byte(b: u8) -> bool {
    b.is_ascii_graphic() || b == b' ' || b == b'\n' || b == b'\r' || b == b'\t'
}

/// Values that look like markers the harness does not know about.
fn looks_like_marker(value: u64) -> bool {
    let unique: HashSet<u8> = value.to_le_bytes().into_iter().collect();
    let low = value & 0xFFFF_FFFF;
    unique.len() <= 3
        || low == 0xDEAD_BEEF
        || low == 0xCAFE_BABE
        || low == 0xFEED_FACE
        || low == 0x0BAD_C0DE
}

fn known_marker_at(data: &[u8], pos: usize) -> bool {
    pos + 8 <= data.len() && MarkerType::from_value(read_u64_le(&data[pos..pos + 8])).is_some()
}

/// Split a raw emulator log into text, dumps and unrecognised bytes.
///
/// Never fails: anything not understood is kept as `UnknownBinary`.
pub fn parse_stream(data: &[u8]) -> ParsedStream {
    let mut out = ParsedStream {
        raw_len: data.len(),
        ..ParsedStream::default()
    };
    let mut pos = 0;

    while pos < data.len() {
        if pos + 8 <= data.len() {
            let value = read_u64_le(&data[pos..pos + 8]);
            if let Some(marker) = MarkerType::from_value(value) {
                out.items.push(StreamItem::Marker {
                    marker,
                    position: pos,
                });
                let payload = &data[pos + 8..];
                let size = marker.payload_size();
                if payload.len() < size {
                    debug!(
                        "Truncated {} at {}: {} of {} bytes",
                        marker,
                        pos,
                        payload.len(),
                        size
                    );
                    pos += 8;
                    continue;
                }
                match marker {
                    MarkerType::RegistersIntOnly | MarkerType::RegistersIntAndFloat => {
                        out.register_dumps
                            .push(parse_register_dump(marker, payload, pos));
                    }
                    MarkerType::ExceptionCsr => {
                        let csrs = ExceptionCsrs::from_words(&read_words::<9>(payload));
                        debug!(
                            "Exception dump at {}: mcause=0x{:X} mepc=0x{:X}",
                            pos, csrs.mcause, csrs.mepc
                        );
                        out.exception_dumps.push(ExceptionDump {
                            csrs,
                            position: pos,
                            inst_trace: None,
                        });
                    }
                    MarkerType::Unknown(_) => {}
                }
                pos += 8 + size;
                continue;
            }
        }

        if is_text_byte(data[pos]) {
            let end = data[pos..]
                .iter()
                .position(|&b| !is_text_byte(b))
                .map_or(data.len(), |n| pos + n);
            let text = String::from_utf8_lossy(&data[pos..end]).into_owned();
            out.items.push(StreamItem::Text(text));
            pos = end;
            continue;
        }

        if pos + 8 <= data.len() {
            let value = read_u64_le(&data[pos..pos + 8]);
            if looks_like_marker(value) {
                out.items.push(StreamItem::Marker {
                    marker: MarkerType::Unknown(value),
                    position: pos,
                });
                pos += 8;
                continue;
            }
        }

        // Up to 8 unknown bytes, stopping early where a known marker begins.
        let limit = (pos + 8).min(data.len());
        let end = (pos + 1..limit)
            .find(|&p| known_marker_at(data, p))
            .unwrap_or(limit);
        out.items.push(StreamItem::UnknownBinary {
            data: data[pos..end].to_vec(),
            position: pos,
        });
        pos = end;
    }

    debug!(
        "Parsed {} bytes: {} items, {} register dumps, {} exception dumps",
        out.raw_len,
        out.items.len(),
        out.register_dumps.len(),
        out.exception_dumps.len()
    );
    out
}

fn parse_register_dump(marker: MarkerType, payload: &[u8], position: usize) -> RegisterDump {
    let int_registers = read_words::<32>(payload);
    let core_csrs = CoreCsrs::from_words(&read_words::<18>(&payload[256..]));
    let (float_csr, float_registers) = if marker == MarkerType::RegistersIntAndFloat {
        (
            Some(read_u64_le(&payload[400..408])),
            Some(read_words::<32>(&payload[408..])),
        )
    } else {
        (None, None)
    };
    RegisterDump {
        dump_type: marker,
        int_registers,
        core_csrs,
        float_registers,
        float_csr,
        position,
    }
}

/// Serialise dumps the way the harness emits them. Used to build fixtures.
pub fn encode_register_dump(dump: &RegisterDump) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + INT_FLOAT_DUMP_SIZE);
    let marker = match dump.float_registers {
        Some(_) => MARKER_REGISTERS_INT_AND_FLOAT,
        None => MARKER_REGISTERS_INT_ONLY,
    };
    out.extend_from_slice(&marker.to_le_bytes());
    for w in dump.int_registers.iter().chain(dump.core_csrs.to_words().iter()) {
        out.extend_from_slice(&w.to_le_bytes());
    }
    if let Some(fprs) = &dump.float_registers {
        out.extend_from_slice(&dump.float_csr.unwrap_or(0).to_le_bytes());
        for w in fprs {
            out.extend_from_slice(&w.to_le_bytes());
        }
    }
    out
}

pub fn encode_exception_dump(csrs: &ExceptionCsrs) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + EXCEPTION_DUMP_SIZE);
    out.extend_from_slice(&MARKER_EXCEPTION_CSR.to_le_bytes());
    for w in csrs.to_words() {
        out.extend_from_slice(&w.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_dump(with_float: bool) -> RegisterDump {
        let mut int_registers = [0u64; 32];
        for (i, r) in int_registers.iter_mut().enumerate() {
            *r = i as u64 * 0x1111;
        }
        RegisterDump {
            dump_type: if with_float {
                MarkerType::RegistersIntAndFloat
            } else {
                MarkerType::RegistersIntOnly
            },
            int_registers,
            core_csrs: CoreCsrs {
                mstatus: 0x8000_0000_0000_6000,
                misa: 0x8000_0000_0014_112D,
                mcause: 2,
                ..CoreCsrs::default()
            },
            float_registers: with_float.then(|| [0x3FF0_0000_0000_0000; 32]),
            float_csr: with_float.then_some(0x20),
            position: 0,
        }
    }

    #[test]
    fn test_text_then_int_dump() {
        let mut data = b"hello\n".to_vec();
        let mut dump = sample_dump(false);
        data.extend(encode_register_dump(&dump));
        let parsed = parse_stream(&data);

        assert_eq!(parsed.text(), "hello\n");
        assert_eq!(parsed.register_dumps.len(), 1);
        dump.position = 6;
        assert_eq!(parsed.register_dumps[0], dump);
        assert_eq!(parsed.unknown_binary().count(), 0);
    }

    #[test]
    fn test_float_dump_layout() {
        let dump = sample_dump(true);
        let bytes = encode_register_dump(&dump);
        assert_eq!(bytes.len(), 8 + INT_FLOAT_DUMP_SIZE);
        let parsed = parse_stream(&bytes);
        let got = &parsed.register_dumps[0];
        assert_eq!(got.float_csr, Some(0x20));
        assert_eq!(got.float_registers, dump.float_registers);
        assert_eq!(got.core_csrs.misa, 0x8000_0000_0014_112D);
    }

    #[test]
    fn test_exception_dumps_in_order() {
        let mut data = Vec::new();
        for mepc in [0x8000_0100u64, 0x8000_0104] {
            data.extend(encode_exception_dump(&ExceptionCsrs {
                mcause: 2,
                mepc,
                ..ExceptionCsrs::default()
            }));
        }
        let parsed = parse_stream(&data);
        let pcs: Vec<u64> = parsed.exception_dumps.iter().map(|e| e.csrs.mepc).collect();
        assert_eq!(pcs, vec![0x8000_0100, 0x8000_0104]);
        assert_eq!(parsed.exception_dumps[1].position, 8 + EXCEPTION_DUMP_SIZE);
    }

    #[test]
    fn test_truncated_payload_keeps_marker() {
        let mut data = MARKER_EXCEPTION_CSR.to_le_bytes().to_vec();
        data.extend_from_slice(&[0x01; 16]);
        let parsed = parse_stream(&data);
        assert!(parsed.exception_dumps.is_empty());
        assert!(matches!(
            parsed.items[0],
            StreamItem::Marker {
                marker: MarkerType::ExceptionCsr,
                position: 0
            }
        ));
    }

    #[test]
    fn test_unknown_marker_heuristic() {
        let data = 0x1234_5678_DEAD_BEEFu64.to_le_bytes();
        let parsed = parse_stream(&data);
        assert_eq!(
            parsed.items,
            vec![StreamItem::Marker {
                marker: MarkerType::Unknown(0x1234_5678_DEAD_BEEF),
                position: 0
            }]
        );
    }

    #[test]
    fn test_unknown_binary_stops_before_marker() {
        let mut data = vec![0x81, 0x92, 0xA3];
        data.extend(encode_exception_dump(&ExceptionCsrs::default()));
        let parsed = parse_stream(&data);
        assert_eq!(
            parsed.items[0],
            StreamItem::UnknownBinary {
                data: vec![0x81, 0x92, 0xA3],
                position: 0
            }
        );
        assert_eq!(parsed.exception_dumps.len(), 1);
        assert_eq!(parsed.exception_dumps[0].position, 3);
    }

    proptest! {
        #[test]
        fn parse_never_panics(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let parsed = parse_stream(&data);
            prop_assert_eq!(parsed.raw_len, data.len());
        }
    }
}
