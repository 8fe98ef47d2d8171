//! Assembly listing.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

/// Bytes shown per listing row.
const BYTES_PER_ROW: usize = 5;

/// Receives one record per assembled source line.
pub trait Listing {
    /// Record a line: its address (if any), how far it moved the PC, the
    /// bytes it emitted (empty if they are not contiguous) and its text.
    fn record(&mut self, address: Option<u16>, length: usize, bytes: &[u8], text: &str);
}

/// One listing record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListingLine {
    /// Address the line was assembled at.
    pub address: Option<u16>,
    /// PC advance caused by the line.
    pub length: usize,
    /// Emitted bytes.
    pub bytes: Vec<u8>,
    /// Source text.
    pub text: String,
}

/// Collects listing records and renders them as text.
#[derive(Debug, Clone, Default)]
pub struct ListingCollector {
    lines: Vec<ListingLine>,
}

impl ListingCollector {
    /// Empty listing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all records, e.g. at the start of a pass.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Records so far.
    #[must_use]
    pub fn lines(&self) -> &[ListingLine] {
        &self.lines
    }

    /// Render as `ADDR BYTES TEXT` rows.  Lines emitting more bytes than fit
    /// on one row continue on following rows with the address advanced.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let mut chunks = line.bytes.chunks(BYTES_PER_ROW);
            let first = chunks.next().unwrap_or(&[]);
            let _ = match line.address {
                Some(a) => write!(out, "{:04X} ", a),
                None => write!(out, "     "),
            };
            let _ = writeln!(out, "{:<w$} {}", hex(first), line.text, w = BYTES_PER_ROW * 2);
            let mut addr = line.address.map(|a| a.wrapping_add(first.len() as u16));
            for chunk in chunks {
                let _ = match addr {
                    Some(a) => writeln!(out, "{:04X} {}", a, hex(chunk)),
                    None => writeln!(out, "     {}", hex(chunk)),
                };
                addr = addr.map(|a| a.wrapping_add(chunk.len() as u16));
            }
        }
        out
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut acc, b| {
        let _ = write!(acc, "{:02X}", b);
        acc
    })
}

impl Listing for ListingCollector {
    fn record(&mut self, address: Option<u16>, length: usize, bytes: &[u8], text: &str) {
        self.lines.push(ListingLine {
            address,
            length,
            bytes: bytes.to_vec(),
            text: String::from(text),
        });
    }
}
