//! Encoder stage cascade: DATA24 → F1 → F2 → F3 → channel T-values.
//!
//! Every stage owns its output queue and exposes the same push/pop/is_ready
//! shape, so a driver can feed one input unit and opportunistically drain
//! each stage into the next.

use std::collections::VecDeque;

use crate::efm::bits::BitQueue;
use crate::efm::circ::{c1_encode, c2_encode, interleave, invert_parity};
use crate::efm::delay::DelayLines;
use crate::efm::error::{EfmError, EfmResult};
use crate::efm::frames::{
    F1Frame, F2Frame, F3Frame, F3FrameType, DATA24_FRAME_SIZE, FLUSH_FRAMES, SECTION_FRAMES,
};
use crate::efm::subcode::{QMode, SubcodeGenerator};
use crate::efm::tables::{
    EFM_LUT, EFM_SYMBOL_BITS, MERGING_FIELD_BITS, SYNC0_SYMBOL, SYNC1_SYMBOL, SYNC_HEADER,
    SYNC_HEADER_BITS,
};

/// Encoder-side delay patterns (ECMA-130 clause 18); the decoder runs the
/// complements so every lane sees the same total delay.
const DELAY_LINE_1: [usize; 32] = [
    1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0,
];
const DELAY_LINE_2: [usize; 24] = [
    2, 2, 2, 2, 0, 0, 0, 0, 2, 2, 2, 2, 0, 0, 0, 0, 2, 2, 2, 2, 0, 0, 0, 0,
];
const DELAY_LINE_M: [usize; 28] = [
    0, 4, 8, 12, 16, 20, 24, 28, 32, 36, 40, 44, 48, 52, 56, 60, 64, 68, 72, 76, 80, 84, 88, 92,
    96, 100, 104, 108,
];

const MERGING_CANDIDATES: [u32; 4] = [0b000, 0b001, 0b010, 0b100];
const MAX_ZERO_RUN: usize = 10;

/// Swaps the bytes of each pair (ECMA-130 clause 16). Self-inverse.
pub struct Data24ToF1 {
    output: VecDeque<F1Frame>,
}

impl Data24ToF1 {
    pub fn new() -> Self {
        Self {
            output: VecDeque::new(),
        }
    }

    pub fn push(&mut self, mut data: [u8; DATA24_FRAME_SIZE]) {
        for pair in data.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
        self.output.push_back(F1Frame { data });
    }

    pub fn pop(&mut self) -> Option<F1Frame> {
        self.output.pop_front()
    }

    pub fn is_ready(&self) -> bool {
        !self.output.is_empty()
    }
}

/// CIRC encoder: delay 2 → interleave → C2 → delay M → C1 → parity
/// inversion → delay 1.
pub struct F1ToF2 {
    delay_line1: DelayLines<32>,
    delay_line2: DelayLines<24>,
    delay_line_m: DelayLines<28>,
    output: VecDeque<F2Frame>,
}

impl F1ToF2 {
    pub fn new() -> Self {
        Self {
            delay_line1: DelayLines::new(DELAY_LINE_1),
            delay_line2: DelayLines::new(DELAY_LINE_2),
            delay_line_m: DelayLines::new(DELAY_LINE_M),
            output: VecDeque::new(),
        }
    }

    pub fn push(&mut self, frame: F1Frame) {
        let data = self.delay_line2.push(frame.data);
        let data = interleave(data);
        let data = c2_encode(data);
        let data = self.delay_line_m.push(data);
        let data = c1_encode(data);
        let data = invert_parity(data);
        let data = self.delay_line1.push(data);
        self.output.push_back(F2Frame { data });
    }

    pub fn pop(&mut self) -> Option<F2Frame> {
        self.output.pop_front()
    }

    pub fn is_ready(&self) -> bool {
        !self.output.is_empty()
    }
}

/// Annotates F2 frames with their section role: Sync0, Sync1, then 96
/// subcode carriers per 98-frame section.
pub struct F2ToF3 {
    section_cursor: usize,
    sections: u64,
    subcode: SubcodeGenerator,
    output: VecDeque<F3Frame>,
}

impl F2ToF3 {
    pub fn new(track_number: u8, q_mode: QMode) -> EfmResult<Self> {
        Ok(Self {
            section_cursor: 0,
            sections: 0,
            subcode: SubcodeGenerator::new(track_number, q_mode)?,
            output: VecDeque::new(),
        })
    }

    pub fn push(&mut self, frame: F2Frame) -> EfmResult<()> {
        let frame_type = match self.section_cursor {
            0 => F3FrameType::Sync0,
            1 => F3FrameType::Sync1,
            symbol => F3FrameType::Subcode(self.subcode.subcode_byte(symbol)),
        };
        self.output.push_back(F3Frame {
            frame_type,
            data: frame.data,
        });

        self.section_cursor += 1;
        if self.section_cursor == SECTION_FRAMES {
            self.section_cursor = 0;
            self.sections += 1;
            self.subcode.next_section()?;
        }
        Ok(())
    }

    pub fn pop(&mut self) -> Option<F3Frame> {
        self.output.pop_front()
    }

    pub fn is_ready(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn sections(&self) -> u64 {
        self.sections
    }
}

/// One operand of a merging-bit junction: the sync header or a 14-bit
/// EFM symbol.
#[derive(Debug, Clone, Copy)]
struct ChannelWord {
    bits: u32,
    width: usize,
}

const SYNC_WORD: ChannelWord = ChannelWord {
    bits: SYNC_HEADER,
    width: SYNC_HEADER_BITS,
};

/// EFM modulator: emits sync header, symbols and merging bits as one
/// 588-bit channel frame, then re-expresses complete runs as T-values.
pub struct F3ToChannel {
    bits: BitQueue,
    dsv: i64,
    polarity: i64,
    /// Last committed channel bits, for the sync containment window.
    tail: u64,
    tail_width: usize,
    output: VecDeque<Vec<u8>>,
}

impl F3ToChannel {
    pub fn new() -> Self {
        Self {
            bits: BitQueue::new(),
            dsv: 0,
            polarity: -1,
            tail: 0,
            tail_width: 0,
            output: VecDeque::new(),
        }
    }

    pub fn push(&mut self, frame: F3Frame) -> EfmResult<()> {
        let marker = match frame.frame_type {
            F3FrameType::Sync0 => SYNC0_SYMBOL,
            F3FrameType::Sync1 => SYNC1_SYMBOL,
            F3FrameType::Subcode(byte) => u16::from(byte),
        };

        let mut symbols = Vec::with_capacity(2 + frame.data.len());
        symbols.push(SYNC_WORD);
        symbols.push(efm_word(marker));
        for &byte in frame.data.iter() {
            symbols.push(efm_word(u16::from(byte)));
        }

        for (i, &current) in symbols.iter().enumerate() {
            // the next frame always opens with another sync header
            let next = symbols.get(i + 1).copied().unwrap_or(SYNC_WORD);
            let merging = self.choose_merging_bits(current, next)?;
            self.commit(current, merging);
        }

        self.drain_t_values()
    }

    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.output.pop_front()
    }

    pub fn is_ready(&self) -> bool {
        !self.output.is_empty()
    }

    /// Running digital sum of the NRZ-I stream.
    pub fn dsv(&self) -> i64 {
        self.dsv
    }

    /// Picks the merging field that keeps the junction legal and moves the
    /// DSV closest to zero; ties resolve in candidate order.
    fn choose_merging_bits(&self, current: ChannelWord, next: ChannelWord) -> EfmResult<u32> {
        let mut best: Option<(u32, i64)> = None;
        for &candidate in MERGING_CANDIDATES.iter() {
            if !self.is_legal(current, candidate, next) {
                continue;
            }
            let (window, width) = join(current, candidate, next);
            let mut polarity = self.polarity;
            let delta = dsv_delta(window, width, &mut polarity);
            let magnitude = (self.dsv + delta).abs();
            if best.map_or(true, |(_, best_magnitude)| magnitude < best_magnitude) {
                best = Some((candidate, magnitude));
            }
        }
        best.map(|(candidate, _)| candidate)
            .ok_or(EfmError::NoLegalMergingBits)
    }

    fn is_legal(&self, current: ChannelWord, candidate: u32, next: ChannelWord) -> bool {
        let (window, width) = join(current, candidate, next);
        // d = 2: no two ones within three bit periods of each other
        if window & window >> 1 != 0 || window & window >> 2 != 0 {
            return false;
        }
        if !zero_runs_ok(window, width) {
            return false;
        }
        self.sync_free(current, candidate, next)
    }

    /// Rejects candidates that would reproduce the sync header anywhere in
    /// the stream. The scan covers the previously committed tail bits, so
    /// patterns straddling several symbol groups or overlapping a genuine
    /// header are caught as well.
    fn sync_free(&self, current: ChannelWord, candidate: u32, next: ChannelWord) -> bool {
        let mut window = u128::from(self.tail);
        let mut width = self.tail_width;
        for (bits, bits_width) in [
            (current.bits, current.width),
            (candidate, MERGING_FIELD_BITS),
            (next.bits, next.width),
        ] {
            window = window << bits_width | u128::from(bits);
            width += bits_width;
        }

        if width < SYNC_HEADER_BITS {
            return true;
        }
        let current_at = self.tail_width;
        let next_at = self.tail_width + current.width + MERGING_FIELD_BITS;
        for offset in 0..=width - SYNC_HEADER_BITS {
            let shift = width - SYNC_HEADER_BITS - offset;
            if (window >> shift) as u32 & 0xFF_FFFF != SYNC_HEADER {
                continue;
            }
            let genuine = (offset == current_at && current.width == SYNC_HEADER_BITS)
                || (offset == next_at && next.width == SYNC_HEADER_BITS);
            if !genuine {
                return false;
            }
        }
        true
    }

    /// Appends the word and its merging field, updating DSV, polarity and
    /// the committed tail.
    fn commit(&mut self, word: ChannelWord, merging: u32) {
        let bits = u64::from(word.bits) << MERGING_FIELD_BITS | u64::from(merging);
        let width = word.width + MERGING_FIELD_BITS;
        self.dsv += dsv_delta(u128::from(bits), width, &mut self.polarity);
        self.bits.push_bits(word.bits, word.width);
        self.bits.push_bits(merging, MERGING_FIELD_BITS);

        let tail_mask = (1u64 << (SYNC_HEADER_BITS - 1)) - 1;
        self.tail = (self.tail << width | bits) & tail_mask;
        self.tail_width = (self.tail_width + width).min(SYNC_HEADER_BITS - 1);
    }

    /// Pops complete runs off the front of the committed stream. Anything
    /// shorter than 12 bits stays queued: the longest run is 11 bits, so a
    /// shorter remainder may still be missing its terminating one.
    fn drain_t_values(&mut self) -> EfmResult<()> {
        let mut t_values = Vec::new();
        while self.bits.len() >= 12 {
            if !self.bits.bit(0) {
                return Err(EfmError::ChannelDesync);
            }
            let mut zeros = 0;
            while 1 + zeros < self.bits.len() && !self.bits.bit(1 + zeros) {
                zeros += 1;
            }
            if !(2..=MAX_ZERO_RUN).contains(&zeros) {
                return Err(EfmError::RunLengthViolation { zeros });
            }
            self.bits.drop_front(zeros + 1);
            t_values.push((zeros + 1) as u8);
        }
        if !t_values.is_empty() {
            self.output.push_back(t_values);
        }
        Ok(())
    }
}

fn efm_word(symbol: u16) -> ChannelWord {
    ChannelWord {
        bits: u32::from(EFM_LUT[symbol as usize]),
        width: EFM_SYMBOL_BITS,
    }
}

fn join(current: ChannelWord, candidate: u32, next: ChannelWord) -> (u128, usize) {
    let window = (u128::from(current.bits) << MERGING_FIELD_BITS | u128::from(candidate))
        << next.width
        | u128::from(next.bits);
    (window, current.width + MERGING_FIELD_BITS + next.width)
}

fn zero_runs_ok(window: u128, width: usize) -> bool {
    let mut run = 0;
    for i in (0..width).rev() {
        if window >> i & 1 == 0 {
            run += 1;
            if run > MAX_ZERO_RUN {
                return false;
            }
        } else {
            run = 0;
        }
    }
    run < MAX_ZERO_RUN
}

/// DSV change of a bit window under NRZ-I: each one flips the polarity and
/// every bit period contributes the polarity in force.
fn dsv_delta(bits: u128, width: usize, polarity: &mut i64) -> i64 {
    let mut delta = 0;
    for i in (0..width).rev() {
        if bits >> i & 1 != 0 {
            *polarity = -*polarity;
        }
        delta += *polarity;
    }
    delta
}

/// The full encoder cascade, from 24-byte frames to T-values.
pub struct EfmEncoder {
    data24_to_f1: Data24ToF1,
    f1_to_f2: F1ToF2,
    f2_to_f3: F2ToF3,
    f3_to_channel: F3ToChannel,
    f1_frames: u64,
    f2_frames: u64,
    f3_frames: u64,
    channel_bytes: u64,
}

impl EfmEncoder {
    pub fn new(track_number: u8, q_mode: QMode) -> EfmResult<Self> {
        Ok(Self {
            data24_to_f1: Data24ToF1::new(),
            f1_to_f2: F1ToF2::new(),
            f2_to_f3: F2ToF3::new(track_number, q_mode)?,
            f3_to_channel: F3ToChannel::new(),
            f1_frames: 0,
            f2_frames: 0,
            f3_frames: 0,
            channel_bytes: 0,
        })
    }

    /// Pushes one 24-byte frame and drains every stage, appending produced
    /// T-values to `sink`.
    pub fn push(&mut self, data: [u8; DATA24_FRAME_SIZE], sink: &mut Vec<u8>) -> EfmResult<()> {
        self.data24_to_f1.push(data);
        while self.data24_to_f1.is_ready() {
            let Some(f1) = self.data24_to_f1.pop() else { break };
            self.f1_frames += 1;
            self.f1_to_f2.push(f1);
        }
        while self.f1_to_f2.is_ready() {
            let Some(f2) = self.f1_to_f2.pop() else { break };
            self.f2_frames += 1;
            self.f2_to_f3.push(f2)?;
        }
        while self.f2_to_f3.is_ready() {
            let Some(f3) = self.f2_to_f3.pop() else { break };
            self.f3_frames += 1;
            self.f3_to_channel.push(f3)?;
        }
        while self.f3_to_channel.is_ready() {
            let Some(chunk) = self.f3_to_channel.pop() else { break };
            self.channel_bytes += chunk.len() as u64;
            sink.extend_from_slice(&chunk);
        }
        Ok(())
    }

    /// Pushes the trailing zero frames that flush the delay lines.
    pub fn finish(&mut self, sink: &mut Vec<u8>) -> EfmResult<()> {
        for _ in 0..FLUSH_FRAMES {
            self.push([0u8; DATA24_FRAME_SIZE], sink)?;
        }
        Ok(())
    }

    pub fn f1_frames(&self) -> u64 {
        self.f1_frames
    }

    pub fn f2_frames(&self) -> u64 {
        self.f2_frames
    }

    pub fn f3_frames(&self) -> u64 {
        self.f3_frames
    }

    pub fn channel_bytes(&self) -> u64 {
        self.channel_bytes
    }

    pub fn sections(&self) -> u64 {
        self.f2_to_f3.sections()
    }

    pub fn dsv(&self) -> i64 {
        self.f3_to_channel.dsv()
    }
}
