use image::Rgb;
use std::sync::OnceLock;

const LUT_SIZE: usize = 256;

// Color of a 0/0 normalization (image with only class 0).
pub const BAD_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

fn viridis_lut() -> &'static [Rgb<u8>; LUT_SIZE] {
    static LUT: OnceLock<[Rgb<u8>; LUT_SIZE]> = OnceLock::new();
    LUT.get_or_init(|| {
        std::array::from_fn(|i| {
            let color = colorous::VIRIDIS.eval_continuous(i as f64 / (LUT_SIZE - 1) as f64);
            Rgb([color.r, color.g, color.b])
        })
    })
}

/// Looks up `value` (expected in [0, 1]) in a 256-entry viridis table.
pub fn viridis(value: f32) -> Rgb<u8> {
    if value.is_nan() {
        return BAD_COLOR;
    }
    let index = (value * LUT_SIZE as f32).clamp(0.0, (LUT_SIZE - 1) as f32) as usize;
    viridis_lut()[index]
}

/// Builds the per-class palette for an image whose largest class index is `max_class`.
///
/// Class indices are scaled by `max_class`, not by the total number of model classes,
/// so the same class can get different colors in different images.
pub fn class_palette(max_class: usize) -> Vec<Rgb<u8>> {
    if max_class == 0 {
        return vec![BAD_COLOR];
    }
    (0..=max_class)
        .map(|class| viridis(class as f32 / max_class as f32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viridis_endpoints() {
        // viridis runs from dark purple to yellow
        let low = viridis(0.0);
        let high = viridis(1.0);
        assert!(low.0[2] > low.0[1]);
        assert!(high.0[0] > 200 && high.0[1] > 200 && high.0[2] < 100);
        assert_eq!(viridis(1.0), viridis(1.5));
        assert_eq!(viridis(0.0), viridis(-0.5));
    }

    #[test]
    fn test_class_palette_scales_by_max_class() {
        let palette = class_palette(4);
        assert_eq!(palette.len(), 5);
        assert_eq!(palette[0], viridis(0.0));
        assert_eq!(palette[4], viridis(1.0));

        // class 2 is the top color when it is the largest class present
        assert_eq!(class_palette(2)[2], palette[4]);
    }

    #[test]
    fn test_only_background_uses_bad_color() {
        assert_eq!(class_palette(0), vec![BAD_COLOR]);
        assert_eq!(viridis(f32::NAN), BAD_COLOR);
    }
}
