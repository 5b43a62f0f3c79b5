//! Stereo balance from window position.

use winpan_core::audio::{ChannelVolumes, Volume};

/// Left/right balance, `0.0` fully left to `1.0` fully right.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Balance(f64);

impl Balance {
    pub const CENTRE: Balance = Balance(0.5);

    pub fn new(value: f64) -> Self {
        Self(if value.is_nan() { 0.5 } else { value.clamp(0.0, 1.0) })
    }

    /// Balance for a window spanning `[x, x + width)` on a panning field
    /// `screen_width` pixels wide.
    pub fn from_geometry(x: i32, width: u32, screen_width: u32) -> Self {
        if screen_width == 0 {
            return Self::CENTRE;
        }
        let centre = f64::from(x) + f64::from(width) / 2.0;
        Self::new(centre / f64::from(screen_width))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Pans `volume` toward `balance`, keeping the louder front channel as the
/// reference level. Channels past the front pair keep their levels.
///
/// `None` for streams with fewer than two channels.
pub fn pan(volume: &ChannelVolumes, balance: Balance) -> Option<ChannelVolumes> {
    let (left, right) = volume.front_pair()?;
    let max = left.max(right);
    let b = balance.value();
    let scaled = |factor: f64| (factor * f64::from(max)) as Volume;
    let (left, right) = if b > 0.5 {
        (scaled(1.0 - b), max)
    } else {
        (max, scaled(b))
    };
    volume.with_front_pair(left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use winpan_core::audio::VOLUME_NORM;

    #[test]
    fn test_balance_from_geometry() {
        assert_eq!(Balance::from_geometry(0, 0, 3840).value(), 0.0);
        assert_eq!(Balance::from_geometry(1600, 640, 3840).value(), 0.5);
        assert_eq!(Balance::from_geometry(3000, 1680, 3840).value(), 1.0);
        assert_eq!(Balance::from_geometry(-500, 200, 3840).value(), 0.0);
        assert_eq!(Balance::from_geometry(10, 10, 0), Balance::CENTRE);
    }

    #[test]
    fn test_pan_right_attenuates_left() {
        let volume = ChannelVolumes::stereo(VOLUME_NORM, VOLUME_NORM / 2);
        let panned = pan(&volume, Balance::new(0.75)).unwrap();
        assert_eq!(panned.as_slice(), &[VOLUME_NORM / 4, VOLUME_NORM]);
    }

    #[test]
    fn test_pan_left_attenuates_right() {
        let volume = ChannelVolumes::stereo(VOLUME_NORM, VOLUME_NORM);
        let panned = pan(&volume, Balance::new(0.25)).unwrap();
        assert_eq!(panned.as_slice(), &[VOLUME_NORM, VOLUME_NORM / 4]);
    }

    #[test]
    fn test_centre_keeps_left_at_max() {
        let volume = ChannelVolumes::stereo(100, 200);
        let panned = pan(&volume, Balance::CENTRE).unwrap();
        assert_eq!(panned.as_slice(), &[200, 100]);
    }

    #[test]
    fn test_mono_is_untouched() {
        assert_eq!(pan(&ChannelVolumes::mono(VOLUME_NORM), Balance::new(1.0)), None);
        assert_eq!(pan(&ChannelVolumes::default(), Balance::new(0.0)), None);
    }

    #[test]
    fn test_surround_rear_channels_kept() {
        let volume = ChannelVolumes::new(&[40, 40, 7, 7, 7, 7]).unwrap();
        let panned = pan(&volume, Balance::new(1.0)).unwrap();
        assert_eq!(panned.as_slice(), &[0, 40, 7, 7, 7, 7]);
    }
}
