//! Output formats for a coalesced image.
//!
//! All writers take a [`Section`] that has already been coalesced (see
//! [`Sections::coalesce_all`](crate::section::Sections::coalesce_all)) so
//! that spans are sorted by load address and do not overlap.

use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::section::Section;
use crate::symbol::SymbolTable;

/// Data bytes per Intel HEX record.
const HEX_RECORD_LEN: usize = 16;

/// Largest DECB block; the length field is 16 bits.
const DECB_BLOCK_LEN: usize = 0xffff;

/// Raw bytes of every span, in load-address order.
#[must_use]
pub fn binary(image: &Section) -> Vec<u8> {
    image
        .spans()
        .iter()
        .flat_map(|s| s.data.iter().copied())
        .collect()
}

/// Disk Extended Color BASIC loadable binary.
///
/// Each span becomes one or more `00 len_hi len_lo addr_hi addr_lo data`
/// blocks; the file ends with `FF 00 00 exec_hi exec_lo`.
#[must_use]
pub fn decb(image: &Section, exec: u16) -> Vec<u8> {
    let mut out = Vec::new();
    for span in image.spans() {
        let mut addr = span.put as u16;
        for chunk in span.data.chunks(DECB_BLOCK_LEN) {
            out.push(0x00);
            out.extend_from_slice(&(chunk.len() as u16).to_be_bytes());
            out.extend_from_slice(&addr.to_be_bytes());
            out.extend_from_slice(chunk);
            addr = addr.wrapping_add(chunk.len() as u16);
        }
    }
    out.extend_from_slice(&[0xff, 0x00, 0x00]);
    out.extend_from_slice(&exec.to_be_bytes());
    out
}

/// Intel HEX text: 16-byte data records, an optional start-segment record
/// carrying `exec`, and the EOF record.
#[must_use]
pub fn intel_hex(image: &Section, exec: Option<u16>) -> String {
    let mut out = String::new();
    for span in image.spans() {
        let mut addr = span.put as u16;
        for chunk in span.data.chunks(HEX_RECORD_LEN) {
            hex_record(&mut out, addr, 0x00, chunk);
            addr = addr.wrapping_add(chunk.len() as u16);
        }
    }
    if let Some(exec) = exec {
        let [hi, lo] = exec.to_be_bytes();
        hex_record(&mut out, 0, 0x03, &[0, 0, hi, lo]);
    }
    hex_record(&mut out, 0, 0x01, &[]);
    out
}

fn hex_record(out: &mut String, addr: u16, kind: u8, data: &[u8]) {
    let [hi, lo] = addr.to_be_bytes();
    let mut sum = (data.len() as u8).wrapping_add(hi).wrapping_add(lo).wrapping_add(kind);
    let _ = write!(out, ":{:02X}{:04X}{:02X}", data.len(), addr, kind);
    for b in data {
        sum = sum.wrapping_add(*b);
        let _ = write!(out, "{:02X}", b);
    }
    let _ = writeln!(out, "{:02X}", sum.wrapping_neg());
}

/// `name equ $XXXX` for every exported name that has an integer value.
#[must_use]
pub fn exports(names: &[String], symbols: &SymbolTable) -> String {
    let mut out = String::new();
    for name in names {
        match symbols.get(name).and_then(|v| v.as_int()) {
            Some(v) => {
                let _ = writeln!(out, "{} equ ${:04X}", name, v & 0xffff);
            }
            None => log::warn!("exported symbol {} has no value", name),
        }
    }
    out
}
