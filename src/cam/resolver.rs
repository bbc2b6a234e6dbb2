use crate::cam::bitset::MatchSet;

/// Pure per-bank view of a match vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BankResolution {
    pub lowest: Option<u32>,
    pub highest: Option<u32>,
    pub count: u32,
    /// Input with its lowest set bit cleared.
    pub next: u64,
}

pub fn resolve_bank(bits: u64) -> BankResolution {
    if bits == 0 {
        return BankResolution::default();
    }
    BankResolution {
        lowest: Some(bits.trailing_zeros()),
        highest: Some(63 - bits.leading_zeros()),
        count: bits.count_ones(),
        next: bits & (bits - 1),
    }
}

/// Turns a latched match set into a stream of addresses, lowest first, one per `advance`.
///
/// The address space is split into banks of `bank_size`.  Each step the lowest non-empty bank
/// wins and offers its lowest set bit; consuming it replaces that bank with its `next` value.
#[derive(Debug, Clone)]
pub struct MatchResolver {
    bank_size: usize,
    banks: Vec<u64>,
}

impl MatchResolver {
    pub fn new(capacity: usize, bank_size: usize) -> Self {
        assert!(bank_size > 0 && bank_size <= 64, "bank_size must be in 1..=64");
        Self {
            bank_size,
            banks: vec![0; capacity.div_ceil(bank_size)],
        }
    }

    pub fn load(&mut self, matches: &MatchSet) {
        assert_eq!(matches.num_banks(self.bank_size), self.banks.len(), "match set width mismatch");
        for (index, bank) in self.banks.iter_mut().enumerate() {
            *bank = matches.bank(index, self.bank_size);
        }
    }

    pub fn clear(&mut self) {
        self.banks.iter_mut().for_each(|bank| *bank = 0);
    }

    pub fn resolutions(&self) -> impl Iterator<Item = BankResolution> + '_ {
        self.banks.iter().map(|&bits| resolve_bank(bits))
    }

    /// Remaining matches, summed over every bank.
    pub fn total(&self) -> usize {
        self.resolutions().map(|r| r.count as usize).sum()
    }

    pub fn any(&self) -> bool {
        self.banks.iter().any(|&bits| bits != 0)
    }

    /// Bank granted by the fixed-priority scan.
    pub fn granted_bank(&self) -> Option<usize> {
        self.banks.iter().position(|&bits| bits != 0)
    }

    pub fn current(&self) -> Option<usize> {
        let bank = self.granted_bank()?;
        let lowest = resolve_bank(self.banks[bank]).lowest?;
        Some(bank * self.bank_size + lowest as usize)
    }

    /// Highest pending address, for diagnostics.
    pub fn highest(&self) -> Option<usize> {
        let (bank, res) = self
            .resolutions()
            .enumerate()
            .filter(|(_, r)| r.highest.is_some())
            .last()?;
        Some(bank * self.bank_size + res.highest? as usize)
    }

    /// Consume the current address and step the granted bank to its next value.
    pub fn advance(&mut self) -> Option<usize> {
        let addr = self.current()?;
        let bank = addr / self.bank_size;
        self.banks[bank] = resolve_bank(self.banks[bank]).next;
        Some(addr)
    }
}
