//! Decoder stage cascade: T-values → channel bits → F3 → F2 → F1 → DATA24.
//!
//! The mirror of the encoder, with C1 ahead of C2 and the delay-line
//! patterns complemented so data and parity realign lane by lane.

use std::collections::VecDeque;

use log::debug;

use crate::efm::bits::BitQueue;
use crate::efm::circ::{deinterleave, invert_parity, CircCounters, CircDecoder};
use crate::efm::delay::DelayLines;
use crate::efm::frames::{
    F1Frame, F2Frame, F3Frame, F3FrameType, CHANNEL_FRAME_BITS, DATA24_FRAME_SIZE, F2_FRAME_SIZE,
};
use crate::efm::subcode::{bcd2_to_int, q_channel_is_valid};
use crate::efm::tables::{
    EFM_REVERSE_LUT, EFM_SYMBOL_BITS, MERGING_FIELD_BITS, SYNC0_SYMBOL, SYNC1_SYMBOL, SYNC_HEADER,
    SYNC_HEADER_BITS,
};

/// Decoder-side delay patterns; complements of the encoder's, so each lane
/// totals 1 (line 1), 108 (line M) and 2 (line 2) frames of delay.
const DELAY_LINE_1: [usize; 32] = [
    0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1,
];
const DELAY_LINE_2: [usize; 24] = [
    0, 0, 0, 0, 2, 2, 2, 2, 0, 0, 0, 0, 2, 2, 2, 2, 0, 0, 0, 0, 2, 2, 2, 2,
];
const DELAY_LINE_M: [usize; 28] = [
    108, 104, 100, 96, 92, 88, 84, 80, 76, 72, 68, 64, 60, 56, 52, 48, 44, 40, 36, 32, 28, 24, 20,
    16, 12, 8, 4, 0,
];

/// Lowest and highest representable run lengths.
const T_MIN: u8 = 3;
const T_MAX: u8 = 11;

/// Expands T-value bytes into channel bits, clamping out-of-range values.
pub struct TvaluesToChannel {
    valid_t_values: u64,
    invalid_t_values: u64,
    output: VecDeque<BitQueue>,
}

impl TvaluesToChannel {
    pub fn new() -> Self {
        Self {
            valid_t_values: 0,
            invalid_t_values: 0,
            output: VecDeque::new(),
        }
    }

    pub fn push(&mut self, t_values: &[u8]) {
        if t_values.is_empty() {
            return;
        }
        let mut bits = BitQueue::new();
        for &raw in t_values {
            let t = if raw < T_MIN {
                self.invalid_t_values += 1;
                T_MIN
            } else if raw > T_MAX {
                self.invalid_t_values += 1;
                T_MAX
            } else {
                self.valid_t_values += 1;
                raw
            };
            // one "1" followed by t-1 zeros
            bits.push_bits(1 << (t - 1), usize::from(t));
        }
        self.output.push_back(bits);
    }

    pub fn pop(&mut self) -> Option<BitQueue> {
        self.output.pop_front()
    }

    pub fn is_ready(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn valid_t_values(&self) -> u64 {
        self.valid_t_values
    }

    pub fn invalid_t_values(&self) -> u64 {
        self.invalid_t_values
    }
}

/// Re-acquires channel frame alignment from the sync header and parses
/// 588-bit frames back into F3 frames.
pub struct ChannelToF3 {
    buffer: BitQueue,
    valid_channel_frames: u64,
    invalid_channel_frames: u64,
    output: VecDeque<F3Frame>,
}

impl ChannelToF3 {
    pub fn new() -> Self {
        Self {
            buffer: BitQueue::new(),
            valid_channel_frames: 0,
            invalid_channel_frames: 0,
            output: VecDeque::new(),
        }
    }

    pub fn push(&mut self, bits: &BitQueue) {
        if bits.is_empty() {
            return;
        }
        self.buffer.append(bits);
        self.process();
    }

    fn process(&mut self) {
        // a frame plus the next header must be in view before parsing
        while self.buffer.len() > CHANNEL_FRAME_BITS + SYNC_HEADER_BITS {
            let Some(first) = self.buffer.find(SYNC_HEADER, SYNC_HEADER_BITS, 0) else {
                debug!("No sync header in view, discarding all but the trailing bits");
                self.buffer.drop_front(self.buffer.len() - SYNC_HEADER_BITS);
                break;
            };
            let Some(next) = self.buffer.find(SYNC_HEADER, SYNC_HEADER_BITS, first + 1) else {
                break; // wait for the closing header
            };

            if next - first == CHANNEL_FRAME_BITS {
                let frame = self.parse_frame(first);
                self.output.push_back(frame);
                self.valid_channel_frames += 1;
            } else {
                debug!("Channel frame spans {} bits, resyncing", next - first);
                self.invalid_channel_frames += 1;
            }
            self.buffer.drop_front(next);
        }
    }

    /// Channel frame layout: sync(24) ‖ merge(3) ‖ marker(14) ‖ merge(3) ‖
    /// (data(14) ‖ merge(3)) × 32.
    fn parse_frame(&self, start: usize) -> F3Frame {
        let mut offset = start + SYNC_HEADER_BITS + MERGING_FIELD_BITS;
        let marker = self.symbol_at(offset);
        offset += EFM_SYMBOL_BITS + MERGING_FIELD_BITS;

        let mut data = [0u8; F2_FRAME_SIZE];
        for byte in data.iter_mut() {
            let symbol = self.symbol_at(offset);
            // out-of-code words decode to zero
            *byte = if symbol < 256 { symbol as u8 } else { 0 };
            offset += EFM_SYMBOL_BITS + MERGING_FIELD_BITS;
        }

        let frame_type = match marker {
            SYNC0_SYMBOL => F3FrameType::Sync0,
            SYNC1_SYMBOL => F3FrameType::Sync1,
            symbol if symbol < 256 => F3FrameType::Subcode(symbol as u8),
            _ => F3FrameType::Subcode(0),
        };
        F3Frame { frame_type, data }
    }

    fn symbol_at(&self, offset: usize) -> u16 {
        EFM_REVERSE_LUT[self.buffer.read_bits(offset, EFM_SYMBOL_BITS) as usize]
    }

    pub fn pop(&mut self) -> Option<F3Frame> {
        self.output.pop_front()
    }

    pub fn is_ready(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn valid_channel_frames(&self) -> u64 {
        self.valid_channel_frames
    }

    pub fn invalid_channel_frames(&self) -> u64 {
        self.invalid_channel_frames
    }
}

/// Strips the section annotation. The payload passes through unchanged
/// while the 96 subcode bytes of each section are reassembled into the Q
/// channel and checked against its CRC.
pub struct F3ToF2 {
    valid_f3_frames: u64,
    q_channel: [u8; 12],
    q_count: usize,
    collecting: bool,
    saw_sync0: bool,
    valid_q_sections: u64,
    invalid_q_sections: u64,
    output: VecDeque<F2Frame>,
}

impl F3ToF2 {
    pub fn new() -> Self {
        Self {
            valid_f3_frames: 0,
            q_channel: [0; 12],
            q_count: 0,
            collecting: false,
            saw_sync0: false,
            valid_q_sections: 0,
            invalid_q_sections: 0,
            output: VecDeque::new(),
        }
    }

    pub fn push(&mut self, frame: F3Frame) {
        self.valid_f3_frames += 1;
        self.track_subcode(frame.frame_type);
        self.output.push_back(F2Frame { data: frame.data });
    }

    /// Follows the section cadence: a Sync0/Sync1 pair opens a section,
    /// the next 96 subcode bytes contribute one Q bit each. Partial
    /// sections lost to resynchronisation are silently abandoned.
    fn track_subcode(&mut self, frame_type: F3FrameType) {
        match frame_type {
            F3FrameType::Sync0 => {
                self.saw_sync0 = true;
                self.collecting = false;
            }
            F3FrameType::Sync1 => {
                if self.saw_sync0 {
                    self.q_channel = [0; 12];
                    self.q_count = 0;
                    self.collecting = true;
                }
                self.saw_sync0 = false;
            }
            F3FrameType::Subcode(byte) => {
                self.saw_sync0 = false;
                if !self.collecting {
                    return;
                }
                if byte & 0x40 != 0 {
                    self.q_channel[self.q_count / 8] |= 0x80 >> (self.q_count % 8);
                }
                self.q_count += 1;
                if self.q_count == 96 {
                    self.collecting = false;
                    if q_channel_is_valid(&self.q_channel) {
                        self.valid_q_sections += 1;
                        debug!(
                            "Q section time {:02}:{:02}.{:02}",
                            bcd2_to_int(self.q_channel[3]),
                            bcd2_to_int(self.q_channel[4]),
                            bcd2_to_int(self.q_channel[5])
                        );
                    } else {
                        self.invalid_q_sections += 1;
                        debug!("Q channel CRC mismatch: {:02x?}", self.q_channel);
                    }
                }
            }
        }
    }

    pub fn pop(&mut self) -> Option<F2Frame> {
        self.output.pop_front()
    }

    pub fn is_ready(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn valid_f3_frames(&self) -> u64 {
        self.valid_f3_frames
    }

    pub fn valid_q_sections(&self) -> u64 {
        self.valid_q_sections
    }

    pub fn invalid_q_sections(&self) -> u64 {
        self.invalid_q_sections
    }
}

/// CIRC decoder: delay 1 → parity inversion → C1 → delay M → C2 →
/// deinterleave → delay 2.
pub struct F2ToF1 {
    circ: CircDecoder,
    delay_line1: DelayLines<32>,
    delay_line2: DelayLines<24>,
    delay_line_m: DelayLines<28>,
    valid_f2_frames: u64,
    invalid_f2_frames: u64,
    output: VecDeque<F1Frame>,
}

impl F2ToF1 {
    pub fn new() -> Self {
        Self {
            circ: CircDecoder::new(),
            delay_line1: DelayLines::new(DELAY_LINE_1),
            delay_line2: DelayLines::new(DELAY_LINE_2),
            delay_line_m: DelayLines::new(DELAY_LINE_M),
            valid_f2_frames: 0,
            invalid_f2_frames: 0,
            output: VecDeque::new(),
        }
    }

    pub fn push(&mut self, frame: F2Frame) {
        // sample readiness before this frame enters the banks: a codeword
        // is only trustworthy once every byte feeding it is real data
        let c1_trusted = self.delay_line1.is_ready();
        let c2_trusted = c1_trusted && self.delay_line_m.is_ready();
        let emit = c2_trusted && self.delay_line2.is_ready();

        let data = self.delay_line1.push(frame.data);
        let data = invert_parity(data);
        let data = if c1_trusted {
            self.circ.c1_decode(data).0
        } else {
            let mut stripped = [0u8; 28];
            stripped.copy_from_slice(&data[..28]);
            stripped
        };

        let data = self.delay_line_m.push(data);
        let data = if c2_trusted {
            self.circ.c2_decode(data).0
        } else {
            let mut stripped = [0u8; 24];
            stripped.copy_from_slice(&data[..24]);
            stripped
        };

        let data = deinterleave(data);
        let data = self.delay_line2.push(data);

        if emit {
            self.valid_f2_frames += 1;
            self.output.push_back(F1Frame { data });
        } else {
            self.invalid_f2_frames += 1;
        }
    }

    pub fn pop(&mut self) -> Option<F1Frame> {
        self.output.pop_front()
    }

    pub fn is_ready(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn valid_f2_frames(&self) -> u64 {
        self.valid_f2_frames
    }

    pub fn invalid_f2_frames(&self) -> u64 {
        self.invalid_f2_frames
    }

    pub fn c1_counters(&self) -> CircCounters {
        self.circ.c1_counters()
    }

    pub fn c2_counters(&self) -> CircCounters {
        self.circ.c2_counters()
    }
}

/// Undoes the byte-pair swap of the F1 layer.
pub struct F1ToData24 {
    valid_f1_frames: u64,
    output: VecDeque<[u8; DATA24_FRAME_SIZE]>,
}

impl F1ToData24 {
    pub fn new() -> Self {
        Self {
            valid_f1_frames: 0,
            output: VecDeque::new(),
        }
    }

    pub fn push(&mut self, frame: F1Frame) {
        let mut data = frame.data;
        for pair in data.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
        self.valid_f1_frames += 1;
        self.output.push_back(data);
    }

    pub fn pop(&mut self) -> Option<[u8; DATA24_FRAME_SIZE]> {
        self.output.pop_front()
    }

    pub fn is_ready(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn valid_f1_frames(&self) -> u64 {
        self.valid_f1_frames
    }
}
