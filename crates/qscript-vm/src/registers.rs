//! The 256 general purpose registers.

use qscript_ir::REGISTER_COUNT;

/// Bytes per register.
pub const REGISTER_SIZE: usize = 4;

/// Little-endian register file. Every register can be viewed as a signed or
/// unsigned dword, a word, a byte or a float.
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterFile {
    bytes: [u8; REGISTER_COUNT * REGISTER_SIZE],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            bytes: [0; REGISTER_COUNT * REGISTER_SIZE],
        }
    }
}

impl RegisterFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zero(&mut self) {
        self.bytes.fill(0);
    }

    fn slot(&self, reg: u8) -> [u8; REGISTER_SIZE] {
        let offset = usize::from(reg) * REGISTER_SIZE;
        let mut word = [0; REGISTER_SIZE];
        word.copy_from_slice(&self.bytes[offset..offset + REGISTER_SIZE]);
        word
    }

    fn slot_mut(&mut self, reg: u8) -> &mut [u8] {
        let offset = usize::from(reg) * REGISTER_SIZE;
        &mut self.bytes[offset..offset + REGISTER_SIZE]
    }

    #[must_use]
    pub fn signed(&self, reg: u8) -> i32 {
        i32::from_le_bytes(self.slot(reg))
    }

    pub fn set_signed(&mut self, reg: u8, value: i32) {
        self.slot_mut(reg).copy_from_slice(&value.to_le_bytes());
    }

    #[must_use]
    pub fn unsigned(&self, reg: u8) -> u32 {
        u32::from_le_bytes(self.slot(reg))
    }

    pub fn set_unsigned(&mut self, reg: u8, value: u32) {
        self.slot_mut(reg).copy_from_slice(&value.to_le_bytes());
    }

    /// Low 16 bits of the register.
    #[must_use]
    pub fn word(&self, reg: u8) -> u16 {
        let [lo, hi, _, _] = self.slot(reg);
        u16::from_le_bytes([lo, hi])
    }

    /// Overwrite the low 16 bits, keeping the rest.
    pub fn set_word(&mut self, reg: u8, value: u16) {
        self.slot_mut(reg)[..2].copy_from_slice(&value.to_le_bytes());
    }

    /// Low 8 bits of the register.
    #[must_use]
    pub fn byte(&self, reg: u8) -> u8 {
        self.slot(reg)[0]
    }

    /// Overwrite the low 8 bits, keeping the rest.
    pub fn set_byte(&mut self, reg: u8, value: u8) {
        self.slot_mut(reg)[0] = value;
    }

    #[must_use]
    pub fn float(&self, reg: u8) -> f32 {
        f32::from_le_bytes(self.slot(reg))
    }

    pub fn set_float(&mut self, reg: u8, value: f32) {
        self.slot_mut(reg).copy_from_slice(&value.to_le_bytes());
    }

    /// Address of a register as seen by `leta`/`arg_pusha`.
    #[must_use]
    pub fn address(reg: u8) -> u32 {
        u32::from(reg) * 4
    }

    /// Zero-terminated UTF-16 string starting at byte `address`.
    #[must_use]
    pub fn utf16_string_at(&self, address: usize) -> String {
        let units: Vec<u16> = self
            .bytes
            .get(address..)
            .unwrap_or_default()
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        String::from_utf16_lossy(&units)
    }

    /// Registers holding a non-zero value, in register order.
    pub fn non_zero(&self) -> impl Iterator<Item = (u8, i32)> + '_ {
        (0..=u8::MAX)
            .map(|reg| (reg, self.signed(reg)))
            .filter(|&(_, value)| value != 0)
    }
}

impl std::fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.non_zero().map(|(reg, value)| (format!("r{reg}"), value)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_share_storage() {
        let mut regs = RegisterFile::new();
        regs.set_signed(3, -1);
        assert_eq!(regs.unsigned(3), u32::MAX);
        assert_eq!(regs.word(3), 0xffff);
        assert_eq!(regs.byte(3), 0xff);

        regs.set_byte(3, 0);
        assert_eq!(regs.unsigned(3), 0xffff_ff00);
        regs.set_word(3, 0x1234);
        assert_eq!(regs.unsigned(3), 0xffff_1234);
    }

    #[test]
    fn test_utf16_string() {
        let mut regs = RegisterFile::new();
        regs.set_unsigned(1, u32::from_le_bytes([b'h', 0, b'i', 0]));
        assert_eq!(regs.utf16_string_at(4), "hi");
        assert_eq!(regs.utf16_string_at(8), "");
    }

    #[test]
    fn test_float_roundtrip() {
        let mut regs = RegisterFile::new();
        regs.set_float(255, 1.5);
        assert!((regs.float(255) - 1.5).abs() < f32::EPSILON);
        assert_eq!(regs.unsigned(255), 1.5f32.to_bits());
    }

    #[test]
    fn test_zero_and_non_zero() {
        let mut regs = RegisterFile::new();
        regs.set_signed(0, 1);
        regs.set_signed(200, -7);
        assert_eq!(regs.non_zero().collect::<Vec<_>>(), vec![(0, 1), (200, -7)]);
        regs.zero();
        assert_eq!(regs.non_zero().count(), 0);
        assert_eq!(RegisterFile::address(10), 40);
    }
}
