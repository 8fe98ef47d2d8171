//! Sections and spans: where assembled bytes live.
//!
//! A [`Section`] is a named stream of code with its own program counter.
//! Bytes emitted into it accumulate in [`Span`]s, each a run of contiguous
//! data with an assembly origin (`org`) and a load address (`put`).  When
//! the PC jumps (ORG, RMB, PUT) the next emit starts a new span.
//!
//! For output, spans are coalesced: adjacent or overlapping spans merge,
//! and where two spans overlap the one created later (higher `sequence`)
//! provides the bytes.

use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;

use crate::error::AsmError;
use crate::symbol::LocalLabels;

/// Name of the section selected at the start of every pass.
pub const DEFAULT_SECTION: &str = "CODE";

/// The 6809 address space.  PC and load addresses fold into it before
/// bytes are placed.
pub const ADDRESS_MASK: i64 = 0xffff;

/// One run of contiguous data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Creation order across the whole run; later spans win overlaps.
    pub sequence: u32,
    /// Address the first byte was assembled at.
    pub org: i64,
    /// Address the first byte is loaded at.
    pub put: i64,
    /// The bytes.
    pub data: Vec<u8>,
}

impl Span {
    /// Load address one past the last byte.
    #[must_use]
    pub fn end(&self) -> i64 {
        self.put.wrapping_add(self.data.len() as i64)
    }
}

/// Data handed to [`Sections::emit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    /// `n` zero bytes.
    Pad(usize),
    /// One byte.
    Byte(u8),
    /// Big-endian 16-bit word.
    Word(u16),
    /// Opcode; values above 0xFF carry a page prefix byte.
    Opcode(u16),
}

/// A named section.
#[derive(Debug, Clone)]
pub struct Section {
    /// Section name; empty for coalesced output sections.
    pub name: String,
    spans: Vec<Span>,
    current: Option<usize>,
    /// Numeric local labels defined in this section.
    pub local_labels: LocalLabels,
    pass: u32,
    /// Lines processed in this section during the current pass.
    pub line_number: u64,
    /// Program counter.
    pub pc: i64,
    /// Difference between load address and PC set by PUT.
    pub put_offset: i64,
    /// Direct page assumed by SETDP.
    pub dp: Option<u8>,
    last_pc: i64,
    end_pc: Option<i64>,
}

impl Section {
    /// A new, empty section.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            spans: Vec::new(),
            current: None,
            local_labels: LocalLabels::new(),
            pass: 0,
            line_number: 0,
            pc: 0,
            put_offset: 0,
            dp: None,
            last_pc: 0,
            end_pc: None,
        }
    }

    fn reset(&mut self, pass: u32, pc: i64) {
        self.spans.clear();
        self.current = None;
        self.pass = pass;
        self.line_number = 0;
        self.pc = pc;
        self.put_offset = 0;
        self.dp = None;
    }

    /// Spans in their current order.
    #[must_use]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Pass this section was last selected in.
    #[must_use]
    pub fn pass(&self) -> u32 {
        self.pass
    }

    /// The last `n` bytes emitted, if they are contiguous and end at PC.
    #[must_use]
    pub fn tail(&self, n: usize) -> Option<&[u8]> {
        let span = &self.spans[self.current?];
        let len = span.data.len();
        if span.org.wrapping_add(len as i64) != self.pc || n > len {
            return None;
        }
        Some(&span.data[len - n..])
    }

    fn emit_bytes(&mut self, bytes: &[u8], next_sequence: &mut u32) {
        if bytes.is_empty() {
            return;
        }
        self.pc &= ADDRESS_MASK;
        let put = self.pc.wrapping_add(self.put_offset) & ADDRESS_MASK;
        let extend = self.current.is_some_and(|i| {
            let s = &self.spans[i];
            let len = s.data.len() as i64;
            s.org.wrapping_add(len) == self.pc && s.put.wrapping_add(len) == put
        });
        let idx = match self.current {
            Some(i) if extend => i,
            _ => {
                log::trace!(
                    "section {}: new span {} at ${:04X} (put ${:04X})",
                    self.name,
                    *next_sequence,
                    self.pc,
                    put
                );
                self.spans.push(Span {
                    sequence: *next_sequence,
                    org: self.pc,
                    put,
                    data: Vec::new(),
                });
                *next_sequence += 1;
                self.spans.len() - 1
            }
        };
        self.current = Some(idx);
        self.spans[idx].data.extend_from_slice(bytes);
        self.pc = self.pc.wrapping_add(bytes.len() as i64);
    }

    /// Merge spans.
    ///
    /// With `sort`, spans are ordered by load address (then sequence) and
    /// any that touch or overlap are merged.  Without it, only spans that
    /// follow each other exactly are merged.  With `pad`, everything becomes
    /// one zero-filled span.  Overlapping bytes come from the span with the
    /// higher sequence number.
    pub fn coalesce(&mut self, sort: bool, pad: bool) {
        if sort {
            self.spans.sort_by_key(|s| (s.put, s.sequence));
        }
        let mut groups: Vec<Vec<Span>> = Vec::new();
        let mut group_end = i64::MIN;
        let mut last_end = i64::MIN;
        for span in core::mem::take(&mut self.spans) {
            let joins = match groups.last() {
                None => false,
                Some(_) if pad => true,
                Some(_) if sort => span.put <= group_end,
                Some(_) => span.put == last_end,
            };
            last_end = span.end();
            if joins {
                group_end = group_end.max(span.end());
                if let Some(g) = groups.last_mut() {
                    g.push(span);
                }
            } else {
                group_end = span.end();
                groups.push(vec![span]);
            }
        }
        self.spans = groups.into_iter().map(merge_group).collect();
        self.current = None;
    }
}

/// Merge a group of spans into one, painting in sequence order.
fn merge_group(mut group: Vec<Span>) -> Span {
    if group.len() == 1 {
        if let Some(span) = group.pop() {
            return span;
        }
    }
    let base = group.iter().map(|s| s.put).min().unwrap_or(0);
    let end = group.iter().map(Span::end).max().unwrap_or(base);
    let org = group
        .iter()
        .min_by_key(|s| (s.put, s.sequence))
        .map_or(base, |s| s.org);
    let sequence = group.iter().map(|s| s.sequence).max().unwrap_or(0);
    let mut data = vec![0u8; (end - base) as usize];
    group.sort_by_key(|s| s.sequence);
    for s in &group {
        let at = (s.put - base) as usize;
        data[at..at + s.data.len()].copy_from_slice(&s.data);
    }
    Span {
        sequence,
        org,
        put: base,
        data,
    }
}

/// All named sections, with one always current.
#[derive(Debug, Clone)]
pub struct Sections {
    list: Vec<Section>,
    current: usize,
    next_sequence: u32,
}

impl Default for Sections {
    fn default() -> Self {
        Self::new()
    }
}

impl Sections {
    /// Start with the default section current.
    #[must_use]
    pub fn new() -> Self {
        Self {
            list: vec![Section::new(DEFAULT_SECTION)],
            current: 0,
            next_sequence: 0,
        }
    }

    /// The current section.
    #[must_use]
    pub fn current(&self) -> &Section {
        &self.list[self.current]
    }

    /// The current section, mutably.
    pub fn current_mut(&mut self) -> &mut Section {
        &mut self.list[self.current]
    }

    /// Section by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Section> {
        self.list.iter().find(|s| s.name == name)
    }

    /// All named sections in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.list.iter()
    }

    /// Select `name`, creating it on first use.  A section not yet seen in
    /// `pass` loses its spans and restarts at the outgoing section's PC.
    pub fn select(&mut self, name: &str, pass: u32) {
        let outgoing = &mut self.list[self.current];
        outgoing.last_pc = outgoing.pc;
        let last_pc = outgoing.last_pc;
        let idx = match self.list.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                self.list.push(Section::new(name));
                self.list.len() - 1
            }
        };
        let section = &mut self.list[idx];
        if section.pass != pass {
            section.reset(pass, last_pc);
        }
        self.current = idx;
    }

    /// Select the default section at address zero for a new pass.
    pub fn start_pass(&mut self, pass: u32) {
        self.select(DEFAULT_SECTION, pass);
        let code = self.current_mut();
        code.pc = 0;
        code.last_pc = 0;
    }

    /// Emit data into the current section at its PC.
    pub fn emit(&mut self, e: Emit) {
        let mut seq = self.next_sequence;
        let section = &mut self.list[self.current];
        match e {
            Emit::Pad(n) => section.emit_bytes(&vec![0u8; n], &mut seq),
            Emit::Byte(b) => section.emit_bytes(&[b], &mut seq),
            Emit::Word(w) => section.emit_bytes(&w.to_be_bytes(), &mut seq),
            Emit::Opcode(op) if op > 0xff => section.emit_bytes(&op.to_be_bytes(), &mut seq),
            Emit::Opcode(op) => section.emit_bytes(&[op as u8], &mut seq),
        }
        self.next_sequence = seq;
    }

    /// Emit raw bytes into the current section.
    pub fn emit_slice(&mut self, data: &[u8]) {
        let mut seq = self.next_sequence;
        self.list[self.current].emit_bytes(data, &mut seq);
        self.next_sequence = seq;
    }

    /// Check every section used in `pass` against the end address it
    /// reached on the previous pass, then record the new end addresses.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::LayoutDiverged`] (or several in
    /// [`AsmError::Multiple`]) for each section whose end moved.
    pub fn finish_pass(&mut self, pass: u32) -> Result<(), AsmError> {
        let mut errors = Vec::new();
        for s in self.list.iter_mut().filter(|s| s.pass == pass) {
            log::debug!("pass {}: section {} ends at ${:04X}", pass, s.name, s.pc);
            if let Some(previous) = s.end_pc {
                if previous != s.pc {
                    errors.push(AsmError::LayoutDiverged {
                        section: s.name.clone(),
                        previous,
                        current: s.pc,
                    });
                }
            }
            s.end_pc = Some(s.pc);
        }
        match AsmError::from_list(errors) {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Combine the spans of every named section into a new unnamed
    /// section, sorted by load address and coalesced.
    #[must_use]
    pub fn coalesce_all(&self, pad: bool) -> Section {
        let mut all = Section::new("");
        all.spans = self
            .list
            .iter()
            .flat_map(|s| s.spans.iter().cloned())
            .collect();
        all.coalesce(true, pad);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(sequence: u32, put: i64, data: &[u8]) -> Span {
        Span {
            sequence,
            org: put,
            put,
            data: data.to_vec(),
        }
    }

    fn with_spans(spans: Vec<Span>) -> Section {
        let mut s = Section::new("T");
        s.spans = spans;
        s
    }

    #[test]
    fn emit_extends_current_span() {
        let mut s = Sections::new();
        s.start_pass(1);
        s.current_mut().pc = 0x100;
        s.emit(Emit::Byte(1));
        s.emit(Emit::Word(0x0203));
        s.emit(Emit::Opcode(0x10ce));
        let spans = s.current().spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].org, 0x100);
        assert_eq!(spans[0].data, vec![1, 2, 3, 0x10, 0xce]);
        assert_eq!(s.current().pc, 0x105);
    }

    #[test]
    fn pc_jump_breaks_span() {
        let mut s = Sections::new();
        s.start_pass(1);
        s.emit(Emit::Byte(1));
        s.current_mut().pc += 4;
        s.emit(Emit::Byte(2));
        let spans = s.current().spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].org, 5);
        assert!(spans[1].sequence > spans[0].sequence);
    }

    #[test]
    fn put_change_breaks_span() {
        let mut s = Sections::new();
        s.start_pass(1);
        s.emit(Emit::Byte(1));
        s.current_mut().put_offset = 0x1000;
        s.emit(Emit::Byte(2));
        let spans = s.current().spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].org, 1);
        assert_eq!(spans[1].put, 0x1001);
    }

    #[test]
    fn empty_emit_is_noop() {
        let mut s = Sections::new();
        s.start_pass(1);
        s.emit(Emit::Pad(0));
        assert!(s.current().spans().is_empty());
        assert_eq!(s.current().pc, 0);
    }

    #[test]
    fn tail_returns_last_bytes() {
        let mut s = Sections::new();
        s.start_pass(1);
        s.emit(Emit::Opcode(0x86));
        s.emit(Emit::Byte(0x12));
        assert_eq!(s.current().tail(2), Some(&[0x86, 0x12][..]));
        s.current_mut().pc += 1;
        assert_eq!(s.current().tail(1), None);
    }

    #[test]
    fn select_resets_stale_section() {
        let mut s = Sections::new();
        s.start_pass(1);
        s.emit(Emit::Pad(3));
        s.select("DATA", 1);
        assert_eq!(s.current().pc, 3);
        s.emit(Emit::Byte(9));
        s.select(DEFAULT_SECTION, 1);
        assert_eq!(s.current().spans().len(), 1);

        s.start_pass(2);
        assert!(s.current().spans().is_empty());
        assert_eq!(s.current().pc, 0);
        s.select("DATA", 2);
        assert!(s.current().spans().is_empty());
        assert_eq!(s.current().pc, 0);
    }

    #[test]
    fn finish_pass_detects_moved_end() {
        let mut s = Sections::new();
        s.start_pass(1);
        s.emit(Emit::Pad(2));
        assert!(s.finish_pass(1).is_ok());
        s.start_pass(2);
        s.emit(Emit::Pad(2));
        assert!(s.finish_pass(2).is_ok());
        s.start_pass(3);
        s.emit(Emit::Pad(3));
        let err = s.finish_pass(3).unwrap_err();
        assert!(matches!(
            err,
            AsmError::LayoutDiverged {
                previous: 2,
                current: 3,
                ..
            }
        ));
    }

    #[test]
    fn coalesce_adjacent() {
        let mut s = with_spans(vec![span(0, 0x10, &[1, 2]), span(1, 0x12, &[3])]);
        s.coalesce(false, false);
        assert_eq!(s.spans(), &[Span {
            sequence: 1,
            org: 0x10,
            put: 0x10,
            data: vec![1, 2, 3],
        }]);
    }

    #[test]
    fn coalesce_disjoint_sorted() {
        let mut s = with_spans(vec![span(0, 0x20, &[2]), span(1, 0x10, &[1])]);
        s.coalesce(true, false);
        assert_eq!(s.spans().len(), 2);
        assert_eq!(s.spans()[0].put, 0x10);
        assert_eq!(s.spans()[1].put, 0x20);
    }

    #[test]
    fn coalesce_unsorted_keeps_gaps() {
        let mut s = with_spans(vec![span(0, 0x20, &[2]), span(1, 0x10, &[1])]);
        s.coalesce(false, false);
        assert_eq!(s.spans().len(), 2);
        assert_eq!(s.spans()[0].put, 0x20);
    }

    #[test]
    fn coalesce_overlap_later_sequence_wins() {
        let mut s = with_spans(vec![span(5, 0x10, &[9, 9]), span(2, 0x10, &[1, 2, 3])]);
        s.coalesce(true, false);
        assert_eq!(s.spans().len(), 1);
        assert_eq!(s.spans()[0].data, vec![9, 9, 3]);
        assert_eq!(s.spans()[0].sequence, 5);
    }

    #[test]
    fn coalesce_pad_fills_gaps() {
        let mut s = with_spans(vec![span(0, 0x10, &[1]), span(1, 0x13, &[2])]);
        s.coalesce(true, true);
        assert_eq!(s.spans().len(), 1);
        assert_eq!(s.spans()[0].data, vec![1, 0, 0, 2]);
    }

    #[test]
    fn coalesce_all_merges_sections() {
        let mut s = Sections::new();
        s.start_pass(1);
        s.emit(Emit::Byte(1));
        s.select("DATA", 1);
        s.current_mut().pc = 0x10;
        s.emit(Emit::Byte(2));
        let all = s.coalesce_all(false);
        assert_eq!(all.name, "");
        assert_eq!(all.spans().len(), 2);
        let padded = s.coalesce_all(true);
        assert_eq!(padded.spans().len(), 1);
        assert_eq!(padded.spans()[0].data.len(), 0x11);
    }

    #[test]
    fn addresses_fold_into_sixteen_bits() {
        let mut s = Sections::new();
        s.start_pass(1);
        s.current_mut().pc = 0x1_2345;
        s.emit(Emit::Byte(1));
        s.current_mut().pc = -1;
        s.current_mut().put_offset = 0x8000_0000;
        s.emit(Emit::Byte(2));
        let spans = s.current().spans();
        assert_eq!((spans[0].org, spans[0].put), (0x2345, 0x2345));
        assert_eq!((spans[1].org, spans[1].put), (0xffff, 0xffff));
        let padded = s.coalesce_all(true);
        assert_eq!(padded.spans()[0].put, 0x2345);
        assert_eq!(padded.spans()[0].data.len(), 0xffff - 0x2345 + 1);
    }
}
