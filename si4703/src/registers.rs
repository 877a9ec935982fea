/* Register type definitions
 *
 * Bit positions follow the Si4702/03-C19 datasheet, section 6. The chip has a
 * flat file of sixteen 16 bit registers with no register pointer: every read
 * starts at STATUSRSSI and wraps around through 0x00, every write starts at
 * POWERCFG.
 * */
// FIXME: rustfmt enum_discrim_align_threshold when it gets out of nightly
//        instead of rustfmt::skip
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut, RangeInclusive};
#[cfg(test)] use proptest::prelude::*;
#[cfg(test)] use proptest_derive::Arbitrary;

pub const DEVICEID: usize = 0x00;
pub const CHIPID: usize = 0x01;
pub const POWERCFG: usize = 0x02;
pub const CHANNEL: usize = 0x03;
pub const SYSCONFIG1: usize = 0x04;
pub const SYSCONFIG2: usize = 0x05;
pub const SYSCONFIG3: usize = 0x06;
pub const TEST1: usize = 0x07;
pub const STATUSRSSI: usize = 0x0A;
pub const READCHAN: usize = 0x0B;

pub const REGISTER_COUNT: usize = 16;
/// Bytes in a full read of the register file
pub const BURST_LEN: usize = 2 * REGISTER_COUNT;
/// The only registers the chip accepts writes to, in transfer order
pub const WINDOW: RangeInclusive<usize> = POWERCFG..=TEST1;
pub const WINDOW_LEN: usize = 2 * (TEST1 - POWERCFG + 1);

pub const CHANNEL_MASK: u16 = 0x03FF;
/// CHANNEL bit 15
pub const TUNE: u16 = 1 << 15;
pub const VOLUME_MASK: u16 = 0x000F;
pub const MAX_VOLUME: u8 = 15;
/// XOSCEN plus the reserved bit 8 that AN230 says to set with it
pub const OSCILLATOR_ENABLE: u16 = 0x8100;

const BAND_SHIFT: u16 = 6;
const SPACE_SHIFT: u16 = 4;
const SEEKTH_SHIFT: u16 = 8;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PowerCfg: u16 {
        const DSMUTE  = 1 << 15; // Softmute disable
        const DMUTE   = 1 << 14; // Mute disable
        const MONO    = 1 << 13;
        const RDSM    = 1 << 11;
        const SKMODE  = 1 << 10; // Stop seeking at the band limit
        const SEEKUP  = 1 << 9;
        const SEEK    = 1 << 8;
        const DISABLE = 1 << 6;
        const ENABLE  = 1 << 0;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SysConfig1: u16 {
        const RDSIEN = 1 << 15;
        const STCIEN = 1 << 14;
        const RDS    = 1 << 12;
        const DE     = 1 << 11; // 50us de-emphasis when set
        const AGCD   = 1 << 10;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StatusRssi: u16 {
        const RDSR  = 1 << 15;
        const STC   = 1 << 14; // Seek/tune complete
        const SFBL  = 1 << 13; // Seek fail/band limit
        const AFCRL = 1 << 12;
        const RDSS  = 1 << 11;
        const ST    = 1 << 8;  // Stereo indicator
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[derive(IntoPrimitive, TryFromPrimitive, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
#[rustfmt::skip]
pub enum Band {
    UsEurope  = 0b00, // 87.5 - 108 MHz
    JapanWide = 0b01, // 76 - 108 MHz
    Japan     = 0b10, // 76 - 90 MHz
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[derive(IntoPrimitive, TryFromPrimitive, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
#[repr(u8)]
#[rustfmt::skip]
pub enum Spacing {
    #[serde(rename = "200khz")]
    Khz200 = 0b00,
    #[serde(rename = "100khz")]
    Khz100 = 0b01,
    #[serde(rename = "50khz")]
    Khz50  = 0b10,
}

// Manual Default: num_enum maps reserved encodings onto a #[default] variant
impl Default for Band {
    fn default() -> Self {
        Band::UsEurope
    }
}

impl Default for Spacing {
    fn default() -> Self {
        Spacing::Khz100
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum DeEmphasis {
    #[serde(rename = "75us")]
    Us75,
    #[default]
    #[serde(rename = "50us")]
    Us50,
}

/// Shadow copy of the register file, indexed by logical register address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterBank([u16; REGISTER_COUNT]);

impl Index<usize> for RegisterBank {
    type Output = u16;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for RegisterBank {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl From<[u16; REGISTER_COUNT]> for RegisterBank {
    fn from(item: [u16; REGISTER_COUNT]) -> Self {
        Self(item)
    }
}

impl RegisterBank {
    /// Un-wraps a burst read. Burst word `i` is logical register
    /// `(STATUSRSSI + i) % 16`.
    pub fn from_burst(burst: &[u8; BURST_LEN]) -> Self {
        let mut regs = [0; REGISTER_COUNT];
        for (i, word) in burst.chunks_exact(2).enumerate() {
            regs[(STATUSRSSI + i) % REGISTER_COUNT] = u16::from_be_bytes([word[0], word[1]]);
        }
        Self(regs)
    }

    /// The bytes the chip would send for this register file.
    pub fn to_burst(&self) -> [u8; BURST_LEN] {
        let mut burst = [0; BURST_LEN];
        for (i, word) in burst.chunks_exact_mut(2).enumerate() {
            word.copy_from_slice(&self.0[(STATUSRSSI + i) % REGISTER_COUNT].to_be_bytes());
        }
        burst
    }

    /// POWERCFG through TEST1, big endian, ready to send.
    pub fn window(&self) -> [u8; WINDOW_LEN] {
        let mut out = [0; WINDOW_LEN];
        for (word, reg) in out.chunks_exact_mut(2).zip(WINDOW) {
            word.copy_from_slice(&self.0[reg].to_be_bytes());
        }
        out
    }

    pub fn words(&self) -> &[u16; REGISTER_COUNT] {
        &self.0
    }

    pub fn power_cfg(&self) -> PowerCfg {
        PowerCfg::from_bits_retain(self.0[POWERCFG])
    }

    pub fn set_power_cfg(&mut self, flags: PowerCfg) {
        self.0[POWERCFG] = flags.bits();
    }

    pub fn channel(&self) -> u16 {
        self.0[CHANNEL] & CHANNEL_MASK
    }

    /// Replaces the 10 bit channel field. Values past the field are masked.
    pub fn set_channel(&mut self, channel: u16) {
        self.0[CHANNEL] = (self.0[CHANNEL] & !CHANNEL_MASK) | (channel & CHANNEL_MASK);
    }

    pub fn tune(&self) -> bool {
        self.0[CHANNEL] & TUNE != 0
    }

    pub fn set_tune(&mut self, tune: bool) {
        if tune {
            self.0[CHANNEL] |= TUNE;
        } else {
            self.0[CHANNEL] &= !TUNE;
        }
    }

    pub fn sys_config1(&self) -> SysConfig1 {
        SysConfig1::from_bits_retain(self.0[SYSCONFIG1])
    }

    pub fn set_deemphasis(&mut self, de: DeEmphasis) {
        let mut flags = self.sys_config1();
        flags.set(SysConfig1::DE, de == DeEmphasis::Us50);
        self.0[SYSCONFIG1] = flags.bits();
    }

    pub fn deemphasis(&self) -> DeEmphasis {
        match self.sys_config1().contains(SysConfig1::DE) {
            true => DeEmphasis::Us50,
            false => DeEmphasis::Us75,
        }
    }

    pub fn volume(&self) -> u8 {
        (self.0[SYSCONFIG2] & VOLUME_MASK) as u8
    }

    /// Replaces the low nibble of SYSCONFIG2, nothing else.
    pub fn set_volume(&mut self, level: u8) {
        self.0[SYSCONFIG2] = (self.0[SYSCONFIG2] & !VOLUME_MASK) | (u16::from(level) & VOLUME_MASK);
    }

    pub fn band(&self) -> Result<Band, u16> {
        let bits = (self.0[SYSCONFIG2] >> BAND_SHIFT) & 0b11;
        Band::try_from(bits as u8).or(Err(self.0[SYSCONFIG2]))
    }

    pub fn set_band(&mut self, band: Band) {
        let field = 0b11 << BAND_SHIFT;
        self.0[SYSCONFIG2] = (self.0[SYSCONFIG2] & !field) | (u16::from(u8::from(band)) << BAND_SHIFT);
    }

    pub fn spacing(&self) -> Result<Spacing, u16> {
        let bits = (self.0[SYSCONFIG2] >> SPACE_SHIFT) & 0b11;
        Spacing::try_from(bits as u8).or(Err(self.0[SYSCONFIG2]))
    }

    pub fn set_spacing(&mut self, spacing: Spacing) {
        let field = 0b11 << SPACE_SHIFT;
        self.0[SYSCONFIG2] =
            (self.0[SYSCONFIG2] & !field) | (u16::from(u8::from(spacing)) << SPACE_SHIFT);
    }

    pub fn seek_threshold(&self) -> u8 {
        (self.0[SYSCONFIG2] >> SEEKTH_SHIFT) as u8
    }

    pub fn set_seek_threshold(&mut self, rssi: u8) {
        self.0[SYSCONFIG2] = (self.0[SYSCONFIG2] & 0x00FF) | (u16::from(rssi) << SEEKTH_SHIFT);
    }

    pub fn status(&self) -> StatusRssi {
        StatusRssi::from_bits_retain(self.0[STATUSRSSI])
    }

    pub fn stc(&self) -> bool {
        self.status().contains(StatusRssi::STC)
    }

    pub fn sfbl(&self) -> bool {
        self.status().contains(StatusRssi::SFBL)
    }

    pub fn stereo(&self) -> bool {
        self.status().contains(StatusRssi::ST)
    }

    pub fn rssi(&self) -> u8 {
        (self.0[STATUSRSSI] & 0x00FF) as u8
    }

    /// Channel the chip is actually on, valid once STC has been seen.
    pub fn read_channel(&self) -> u16 {
        self.0[READCHAN] & CHANNEL_MASK
    }
}

#[cfg(test)]
proptest! {
    #[test]
    fn burst_unwraps_to_logical_order(burst in prop::array::uniform32(any::<u8>())) {
        let bank = RegisterBank::from_burst(&burst);
        for i in 0..REGISTER_COUNT {
            let word = u16::from_be_bytes([burst[2 * i], burst[2 * i + 1]]);
            prop_assert_eq!(bank[(STATUSRSSI + i) % REGISTER_COUNT], word);
        }
    }

    #[test]
    fn burst_inverse(burst in prop::array::uniform32(any::<u8>())) {
        prop_assert_eq!(burst, RegisterBank::from_burst(&burst).to_burst());
    }

    #[test]
    fn volume_keeps_upper_bits(initial: u16, level in 0..=MAX_VOLUME) {
        let mut bank = RegisterBank::default();
        bank[SYSCONFIG2] = initial;
        bank.set_volume(level);
        prop_assert_eq!(bank[SYSCONFIG2] & !VOLUME_MASK, initial & !VOLUME_MASK);
        prop_assert_eq!(bank.volume(), level);
    }

    #[test]
    fn channel_keeps_tune_and_reserved(initial: u16, channel: u16) {
        let mut bank = RegisterBank::default();
        bank[CHANNEL] = initial;
        bank.set_channel(channel);
        prop_assert_eq!(bank[CHANNEL] & !CHANNEL_MASK, initial & !CHANNEL_MASK);
        prop_assert_eq!(bank.channel(), channel & CHANNEL_MASK);
    }

    #[test]
    fn band_spacing_inverse(initial: u16, band in any::<Band>(), spacing in any::<Spacing>()) {
        let mut bank = RegisterBank::default();
        bank[SYSCONFIG2] = initial;
        bank.set_band(band);
        bank.set_spacing(spacing);
        prop_assert_eq!(bank.band(), Ok(band));
        prop_assert_eq!(bank.spacing(), Ok(spacing));
        prop_assert_eq!(bank[SYSCONFIG2] & 0xFF0F, initial & 0xFF0F);
    }

    #[test]
    fn deemphasis_inverse(initial: u16, de in any::<DeEmphasis>()) {
        let mut bank = RegisterBank::default();
        bank[SYSCONFIG1] = initial;
        bank.set_deemphasis(de);
        prop_assert_eq!(bank.deemphasis(), de);
        prop_assert_eq!(bank[SYSCONFIG1] & !SysConfig1::DE.bits(), initial & !SysConfig1::DE.bits());
    }
}

#[test]
fn window_is_powercfg_to_test1() {
    let bank = RegisterBank::from([
        0x1242, 0x1253, 0x4001, 0x8066, 0x0800, 0x1918, 0x0000, 0x8100,
        0, 0, 0, 0, 0, 0, 0, 0,
    ]);
    assert_eq!(
        bank.window(),
        [0x40, 0x01, 0x80, 0x66, 0x08, 0x00, 0x19, 0x18, 0x00, 0x00, 0x81, 0x00]
    );
}

#[test]
fn tune_bit() {
    let mut bank = RegisterBank::default();
    bank.set_channel(0x66);
    bank.set_tune(true);
    assert_eq!(bank[CHANNEL], 0x8066);
    assert!(bank.tune());
    bank.set_tune(false);
    assert_eq!(bank[CHANNEL], 0x0066);
    assert!(!bank.tune());
}

#[test]
fn status_fields() {
    let mut bank = RegisterBank::default();
    bank[STATUSRSSI] = 0x612A; // STC | SFBL | ST, RSSI 42
    assert!(bank.stc());
    assert!(bank.sfbl());
    assert!(bank.stereo());
    assert_eq!(bank.rssi(), 42);
}
