use smallvec::{smallvec, SmallVec};

const WORD_BITS: usize = 64;

/// Fixed-width set of slot addresses, as returned by an associative search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchSet {
    width: usize,
    words: SmallVec<[u64; 4]>,
}

impl MatchSet {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            words: smallvec![0; width.div_ceil(WORD_BITS)],
        }
    }

    pub fn from_addrs(width: usize, addrs: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::new(width);
        addrs.into_iter().for_each(|addr| set.set(addr));
        set
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn set(&mut self, addr: usize) {
        assert!(addr < self.width, "address {} out of range", addr);
        self.words[addr / WORD_BITS] |= 1u64 << (addr % WORD_BITS);
    }

    pub fn clear(&mut self, addr: usize) {
        assert!(addr < self.width, "address {} out of range", addr);
        self.words[addr / WORD_BITS] &= !(1u64 << (addr % WORD_BITS));
    }

    pub fn contains(&self, addr: usize) -> bool {
        addr < self.width && self.words[addr / WORD_BITS] & (1u64 << (addr % WORD_BITS)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(i * WORD_BITS + bit)
            })
        })
    }

    pub fn num_banks(&self, bank_size: usize) -> usize {
        self.width.div_ceil(bank_size)
    }

    /// Bits `[index * bank_size, (index + 1) * bank_size)` packed into the low end of a word.
    /// The last bank may be narrower than `bank_size`.
    pub fn bank(&self, index: usize, bank_size: usize) -> u64 {
        assert!(bank_size > 0 && bank_size <= WORD_BITS, "bank_size must be in 1..=64");
        let start = index * bank_size;
        if start >= self.width {
            return 0;
        }
        let len = bank_size.min(self.width - start);
        let lo = start / WORD_BITS;
        let off = start % WORD_BITS;
        let mut bits = self.words[lo] >> off;
        if off != 0 && lo + 1 < self.words.len() {
            bits |= self.words[lo + 1] << (WORD_BITS - off);
        }
        if len == WORD_BITS {
            bits
        } else {
            bits & ((1u64 << len) - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MatchSet;

    #[test]
    fn set_clear_contains() {
        let mut set = MatchSet::new(130);
        set.set(0);
        set.set(64);
        set.set(129);
        assert!(set.contains(64));
        assert_eq!(set.count_ones(), 3);
        set.clear(64);
        assert!(!set.contains(64));
        assert!(!set.contains(500));
        assert_eq!(set.iter_ones().collect::<Vec<_>>(), vec![0, 129]);
    }

    #[test]
    fn banks_straddle_word_boundaries() {
        let set = MatchSet::from_addrs(100, [47, 48, 50, 99]);
        // bank size 24: bank 1 covers 24..48, bank 2 covers 48..72, bank 4 covers 96..100
        assert_eq!(set.num_banks(24), 5);
        assert_eq!(set.bank(1, 24), 1 << 23);
        assert_eq!(set.bank(2, 24), 0b101);
        assert_eq!(set.bank(4, 24), 1 << 3);
        assert_eq!(set.bank(9, 24), 0);
    }

    #[test]
    fn full_word_bank() {
        let set = MatchSet::from_addrs(128, [64, 127]);
        assert_eq!(set.bank(1, 64), 1 | (1 << 63));
        assert_eq!(set.bank(0, 64), 0);
    }
}
