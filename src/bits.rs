// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Extraction of arbitrary width bit windows from a stream of generator words.
//!
//! The stream is read most significant bit first: the first bit of every
//! word is its highest significant bit. A word from a generator with a
//! narrower range than 32 bits only contributes its significant bits.

/// Widest window the word model supports.
pub const MAX_WINDOW_BITS: u32 = 32;
/// Width of the words in a pre-filled buffer.
pub const WORD_BITS: usize = 32;

/// Anything that hands out one word per call.
pub trait WordSource {
    /// Next word, never exceeding `significant_bits` bits.
    fn draw(&mut self) -> u32;
    /// Number of meaningful low-order bits in each word.
    fn significant_bits(&self) -> u32;
}

/// All-ones mask of `width` bits, `width` in 0..=32.
pub fn low_mask(width: u32) -> u32 {
    if width >= u32::BITS {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

/// Bits drawn from a stream but not yet handed out.
///
/// Only the low `residual_count` bits of `residual_bits` are valid, and
/// `residual_count` stays below the word width of the source it buffers for.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BitWindowState {
    residual_bits: u32,
    residual_count: u32,
}

impl BitWindowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn residual_count(&self) -> u32 {
        self.residual_count
    }

    /// Forget buffered bits so the next window starts on a fresh word.
    pub fn reset(&mut self) {
        self.residual_bits = 0;
        self.residual_count = 0;
    }

    /// Take the next `width` bits of the stream.
    /// `mask`, when given, must be `low_mask(width)`.
    ///
    /// Panics if `width` exceeds 32 bits.
    pub fn take_bits(
        &mut self,
        source: &mut impl WordSource,
        width: u32,
        mask: Option<u32>,
    ) -> u32 {
        if width == 0 {
            return 0;
        }
        if width > MAX_WINDOW_BITS {
            panic!(
                "cannot take {} bit windows, at most {} bits are supported",
                width, MAX_WINDOW_BITS
            );
        }
        let word_bits = source.significant_bits();
        if width == word_bits && self.residual_count == 0 {
            return source.draw();
        }
        let mask = mask.unwrap_or_else(|| low_mask(width));
        debug_assert_eq!(mask, low_mask(width));

        if self.residual_count >= width {
            self.residual_count -= width;
            return (self.residual_bits >> self.residual_count) & mask;
        }

        let mut missing = width - self.residual_count;
        let mut answer = if missing < u32::BITS {
            (self.residual_bits << missing) & mask
        } else {
            0
        };
        loop {
            self.residual_bits = source.draw();
            self.residual_count = word_bits;
            if self.residual_count >= missing {
                self.residual_count -= missing;
                answer |= self.residual_bits >> self.residual_count;
                return answer & mask;
            }
            missing -= self.residual_count;
            answer |= self.residual_bits << missing;
            self.residual_count = 0;
        }
    }
}

/// Read the `width` bit window starting `bit_offset` bits into `words`.
///
/// The window may straddle two words; `words` must then hold the word
/// after the one `bit_offset` lands in.
pub fn extract_window(words: &[u32], bit_offset: usize, width: u32) -> u32 {
    assert!(
        width > 0 && width <= MAX_WINDOW_BITS,
        "window width {} out of range",
        width
    );
    let index = bit_offset / WORD_BITS;
    let shift = (bit_offset % WORD_BITS) as u32;
    let mask = low_mask(width);
    if shift + width <= u32::BITS {
        // shift == 0 && width == 32 shifts by zero here
        (words[index] >> (u32::BITS - width - shift)) & mask
    } else {
        ((words[index] << (shift + width - u32::BITS)) & mask)
            | (words[index + 1] >> (2 * u32::BITS - width - shift))
    }
}
