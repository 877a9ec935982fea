use super::div_nearest;
use crate::registers::{Band, DeEmphasis, Spacing};
use serde::{Deserialize, Serialize};
#[cfg(test)] use proptest::prelude::*;
#[cfg(test)] use proptest_derive::Arbitrary;

#[rustfmt::skip]
pub const EUROPE: Region = Region {
    band: Band::UsEurope, spacing: Spacing::Khz100, deemphasis: DeEmphasis::Us50,
};

#[rustfmt::skip]
pub const USA: Region = Region {
    band: Band::UsEurope, spacing: Spacing::Khz200, deemphasis: DeEmphasis::Us75,
};

#[rustfmt::skip]
pub const JAPAN: Region = Region {
    band: Band::Japan,    spacing: Spacing::Khz100, deemphasis: DeEmphasis::Us50,
};

#[rustfmt::skip]
pub const JAPAN_WIDE: Region = Region {
    band: Band::JapanWide, spacing: Spacing::Khz100, deemphasis: DeEmphasis::Us50,
};

/// Band plan: where channel 0 sits, how far channels go, and the step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
#[serde(default)]
pub struct Region {
    pub band: Band,
    pub spacing: Spacing,
    pub deemphasis: DeEmphasis,
}

impl Region {
    pub fn min_khz(&self) -> u32 {
        match self.band {
            Band::UsEurope => 87_500,
            Band::JapanWide | Band::Japan => 76_000,
        }
    }

    pub fn max_khz(&self) -> u32 {
        match self.band {
            Band::UsEurope | Band::JapanWide => 108_000,
            Band::Japan => 90_000,
        }
    }

    pub fn step_khz(&self) -> u32 {
        match self.spacing {
            Spacing::Khz200 => 200,
            Spacing::Khz100 => 100,
            Spacing::Khz50 => 50,
        }
    }

    /// Highest channel that still lies inside the band
    pub fn max_channel(&self) -> u16 {
        // At most 640 for 76-108 MHz at 50 kHz, well inside the 10 bit field
        ((self.max_khz() - self.min_khz()) / self.step_khz()) as u16
    }

    pub fn channel_to_khz(&self, channel: u16) -> u32 {
        self.min_khz() + u32::from(channel.min(self.max_channel())) * self.step_khz()
    }

    /// Clamps to the band and rounds to the nearest channel, halves up.
    pub fn quantize_khz(&self, khz: u32) -> u32 {
        let offset = khz.saturating_sub(self.min_khz());
        let steps = div_nearest(offset.into(), self.step_khz().into())
            .min(self.max_channel().into());
        self.min_khz() + steps as u32 * self.step_khz()
    }

    pub fn khz_to_channel(&self, khz: u32) -> u16 {
        ((self.quantize_khz(khz) - self.min_khz()) / self.step_khz()) as u16
    }

    pub fn channel_to_frequency(&self, channel: u16) -> f64 {
        f64::from(self.channel_to_khz(channel)) / 1000.0
    }

    /// MHz to channel. Out of band values land on the nearest band edge.
    pub fn frequency_to_channel(&self, mhz: f64) -> u16 {
        // `as` saturates: negatives and NaN become 0
        self.khz_to_channel((mhz * 1000.0).round() as u32)
    }
}

#[cfg(test)]
proptest! {
    #[test]
    fn frequency_round_trip(f in 87.5f64..=108.0) {
        let back = EUROPE.channel_to_frequency(EUROPE.frequency_to_channel(f));
        prop_assert!((back - f).abs() <= 0.1 + 1e-9, "{} -> {}", f, back);
    }

    #[test]
    fn channel_never_past_band(region in any::<Region>(), khz: u32) {
        prop_assert!(region.khz_to_channel(khz) <= region.max_channel());
        let q = region.quantize_khz(khz);
        prop_assert!(q >= region.min_khz() && q <= region.max_khz());
    }

    #[test]
    fn channel_inverse(region in any::<Region>(), channel: u16) {
        let channel = channel % (region.max_channel() + 1);
        prop_assert_eq!(channel, region.khz_to_channel(region.channel_to_khz(channel)));
    }
}

#[test]
fn europe_band_edges() {
    assert_eq!(EUROPE.max_channel(), 205);
    assert_eq!(EUROPE.frequency_to_channel(87.5), 0);
    assert_eq!(EUROPE.frequency_to_channel(108.0), 205);
    assert_eq!(EUROPE.frequency_to_channel(101.7), 142);
    assert_eq!(EUROPE.frequency_to_channel(120.0), 205);
    assert_eq!(EUROPE.frequency_to_channel(50.0), 0);
    assert_eq!(EUROPE.frequency_to_channel(f64::NAN), 0);
}

#[test]
fn quantize_rounds_half_up() {
    assert_eq!(EUROPE.quantize_khz(101_740), 101_700);
    assert_eq!(EUROPE.quantize_khz(101_750), 101_800);
    assert_eq!(EUROPE.quantize_khz(108_040), 108_000);
}

#[test]
fn wide_spacing_stays_in_band() {
    // 20.5 MHz is not a whole number of 200 kHz steps
    assert_eq!(USA.max_channel(), 102);
    assert_eq!(USA.channel_to_khz(102), 107_900);
    assert_eq!(USA.quantize_khz(108_000), 107_900);
}

#[test]
fn japan_bands() {
    assert_eq!(JAPAN.max_channel(), 140);
    assert_eq!(JAPAN.channel_to_frequency(0), 76.0);
    assert_eq!(JAPAN_WIDE.max_channel(), 320);
}
