use crate::types::{CoordinateMap, DepthSpacePoint, DEPTH_TO_BYTE_DIVISOR};

/// What happens when `depth / 31` does not fit in a byte (depth > 7935 mm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantizePolicy {
    /// Keep the low 8 bits. Far samples wrap back into dark values.
    #[default]
    Truncate,
    /// Saturate at 255.
    Clamp,
}

impl QuantizePolicy {
    pub fn quantize(self, depth_mm: u16) -> u8 {
        let level = depth_mm / DEPTH_TO_BYTE_DIVISOR;
        match self {
            QuantizePolicy::Truncate => (level & 0xff) as u8,
            QuantizePolicy::Clamp => level.min(u8::MAX as u16) as u8,
        }
    }
}

/// Borrowed view of the raw depth samples the map points into.
#[derive(Debug, Clone, Copy)]
pub struct DepthView<'a> {
    pub width: usize,
    pub height: usize,
    pub min_reliable_distance: u16,
    pub data: &'a [u16],
}

impl DepthView<'_> {
    /// Depth at the nearest pixel to `p`, `None` if unmapped or off-frame.
    #[inline]
    fn sample(&self, p: DepthSpacePoint) -> Option<u16> {
        if p.is_sentinel() {
            return None;
        }
        let x = (p.x + 0.5).floor();
        let y = (p.y + 0.5).floor();
        // NaN fails both comparisons; +inf fails the upper bound.
        if !(x >= 0.0 && y >= 0.0 && x < self.width as f32 && y < self.height as f32) {
            return None;
        }
        self.data.get(y as usize * self.width + x as usize).copied()
    }
}

/// Writes one intensity byte per color pixel into `out`. Returns how many
/// pixels got a reliable depth sample; the rest are written as 0.
///
/// `out` must be exactly as long as the map. Each entry is written once, in
/// index order; nothing from a previous call survives.
pub fn align_depth(
    map: &CoordinateMap,
    depth: &DepthView<'_>,
    policy: QuantizePolicy,
    out: &mut [u8],
) -> usize {
    debug_assert_eq!(map.len(), out.len(), "aligned image must match the coordinate map");

    let mut sampled = 0;
    for (point, pixel) in map.points().iter().zip(out.iter_mut()) {
        *pixel = match depth.sample(*point) {
            Some(d) if d >= depth.min_reliable_distance => {
                sampled += 1;
                policy.quantize(d)
            }
            _ => 0,
        };
    }
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEG: f32 = f32::NEG_INFINITY;

    fn map(w: usize, h: usize, pts: &[(f32, f32)]) -> CoordinateMap {
        CoordinateMap::from_points(w, h, pts.iter().map(|&(x, y)| DepthSpacePoint::new(x, y)).collect()).unwrap()
    }

    fn view(width: usize, height: usize, min: u16, data: &[u16]) -> DepthView<'_> {
        DepthView { width, height, min_reliable_distance: min, data }
    }

    fn run(m: &CoordinateMap, d: &DepthView<'_>, policy: QuantizePolicy) -> Vec<u8> {
        let mut out = vec![0xAA; m.len()];
        align_depth(m, d, policy, &mut out);
        out
    }

    #[test]
    fn worked_example() {
        let m = map(4, 1, &[(0.0, 0.0), (1.0, 0.0), (NEG, NEG), (1.0, 0.0)]);
        let d = view(2, 1, 400, &[500, 1000]);
        assert_eq!(run(&m, &d, QuantizePolicy::Truncate), vec![16, 32, 0, 32]);
    }

    #[test]
    fn counts_only_sampled_pixels() {
        let m = map(4, 1, &[(0.0, 0.0), (1.0, 0.0), (NEG, NEG), (5.0, 0.0)]);
        let mut out = vec![0xAA; 4];
        // 300 is below the threshold, (5, 0) is off-frame.
        assert_eq!(align_depth(&m, &view(2, 1, 400, &[300, 1000]), QuantizePolicy::Truncate, &mut out), 1);
        assert_eq!(out, vec![0, 32, 0, 0]);
        // A reliable sample that quantizes to 0 still counts.
        assert_eq!(align_depth(&m, &view(2, 1, 0, &[10, 1000]), QuantizePolicy::Truncate, &mut out), 2);
        assert_eq!(out, vec![0, 32, 0, 0]);
        assert_eq!(align_depth(&CoordinateMap::new(2, 2), &view(1, 1, 0, &[900]), QuantizePolicy::Clamp, &mut [0; 4]), 0);
    }

    #[test]
    fn all_sentinel_map_is_black() {
        let m = CoordinateMap::new(3, 3);
        let data = [4000u16; 9];
        for policy in [QuantizePolicy::Truncate, QuantizePolicy::Clamp] {
            assert!(run(&m, &view(3, 3, 0, &data), policy).iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn one_sentinel_component_is_enough() {
        let m = map(2, 1, &[(NEG, 0.0), (0.0, NEG)]);
        assert_eq!(run(&m, &view(1, 1, 0, &[3100]), QuantizePolicy::Truncate), vec![0, 0]);
    }

    #[test]
    fn bounds_are_inclusive_of_last_pixel_only() {
        let data: Vec<u16> = (1..=6).map(|i| i * 310).collect(); // 3x2
        let d = view(3, 2, 0, &data);
        let m = map(4, 1, &[(2.0, 1.0), (3.0, 0.0), (0.0, 2.0), (-1.0, 0.0)]);
        assert_eq!(run(&m, &d, QuantizePolicy::Truncate), vec![60, 0, 0, 0]);
    }

    #[test]
    fn rounds_to_nearest_pixel() {
        let d = view(2, 1, 0, &[310, 620]);
        // -0.5 rounds up to 0, 0.49 stays at 0, 0.5 goes to 1, 1.49 stays at 1, 1.5 is off-frame.
        let m = map(5, 1, &[(-0.5, 0.0), (0.49, 0.0), (0.5, 0.0), (1.49, 0.2), (1.5, 0.0)]);
        assert_eq!(run(&m, &d, QuantizePolicy::Truncate), vec![10, 10, 20, 20, 0]);
    }

    #[test]
    fn slightly_negative_rounds_into_frame() {
        let d = view(1, 1, 0, &[310]);
        let m = map(2, 1, &[(-0.4, -0.4), (-0.6, 0.0)]);
        assert_eq!(run(&m, &d, QuantizePolicy::Truncate), vec![10, 0]);
    }

    #[test]
    fn non_finite_coordinates_are_unmapped() {
        let d = view(1, 1, 0, &[310]);
        let m = map(3, 1, &[(f32::NAN, 0.0), (f32::INFINITY, 0.0), (0.0, f32::NAN)]);
        assert_eq!(run(&m, &d, QuantizePolicy::Truncate), vec![0, 0, 0]);
    }

    #[test]
    fn reliability_threshold() {
        let d = view(3, 1, 500, &[499, 500, 0]);
        let m = map(3, 1, &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert_eq!(run(&m, &d, QuantizePolicy::Truncate), vec![0, (500 / 31) as u8, 0]);
    }

    #[test]
    fn zero_min_distance_still_maps_zero_to_black() {
        let d = view(1, 1, 0, &[0]);
        let m = map(1, 1, &[(0.0, 0.0)]);
        assert_eq!(run(&m, &d, QuantizePolicy::Clamp), vec![0]);
    }

    #[test]
    fn overflow_policy() {
        let d = view(2, 1, 400, &[u16::MAX, 7935]);
        let m = map(2, 1, &[(0.0, 0.0), (1.0, 0.0)]);
        // 65535 / 31 = 2114, 2114 mod 256 = 66; 7935 / 31 = 255 fits either way.
        assert_eq!(run(&m, &d, QuantizePolicy::Truncate), vec![66, 255]);
        assert_eq!(run(&m, &d, QuantizePolicy::Clamp), vec![255, 255]);
    }

    #[test]
    fn quantize_wraps_just_past_a_byte() {
        assert_eq!(QuantizePolicy::Truncate.quantize(7936), 0);
        assert_eq!(QuantizePolicy::Clamp.quantize(7936), 255);
        assert_eq!(QuantizePolicy::Truncate.quantize(30), 0);
    }

    #[test]
    fn no_state_carries_between_calls() {
        let m = map(1, 1, &[(0.0, 0.0)]);
        let mut out = vec![0u8; 1];
        align_depth(&m, &view(1, 1, 0, &[3100]), QuantizePolicy::Truncate, &mut out);
        assert_eq!(out, vec![100]);
        align_depth(&m, &view(1, 1, 0, &[0]), QuantizePolicy::Truncate, &mut out);
        assert_eq!(out, vec![0]);
    }
}
