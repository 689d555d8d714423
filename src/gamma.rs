// sRGB <-> linear lookup tables for the overlay dimming.
// Darkening happens in linear light so the dimmed video keeps its contrast
// instead of going muddy; tables avoid a powf per channel per pixel.

pub struct GammaLut {
    // sRGB(0..255) -> linear (0..1) as f32
    srgb_to_linear: [f32; 256],
    // linear(0..1) -> sRGB(0..255) via 4096-step quantization
    // (index = (linear * 4095).round())
    linear_to_srgb: [u8; 4096],
}

impl Default for GammaLut {
    fn default() -> Self {
        Self::new()
    }
}

impl GammaLut {
    /// Build both tables once at startup.
    pub fn new() -> Self {
        let mut s2l = [0.0f32; 256];
        for (v, slot) in s2l.iter_mut().enumerate() {
            let c = v as f32 / 255.0;
            *slot = if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) };
        }

        let mut l2s = [0u8; 4096];
        for (i, slot) in l2s.iter_mut().enumerate() {
            let l = i as f32 / 4095.0;
            let s = if l <= 0.003_130_8 { 12.92 * l } else { 1.055 * l.powf(1.0 / 2.4) - 0.055 };
            *slot = (s * 255.0).round().clamp(0.0, 255.0) as u8;
        }

        Self { srgb_to_linear: s2l, linear_to_srgb: l2s }
    }

    #[inline]
    pub fn srgb_u8_to_linear(&self, v: u8) -> f32 {
        self.srgb_to_linear[v as usize]
    }

    #[inline]
    pub fn linear_to_srgb_u8(&self, l: f32) -> u8 {
        let idx = (l.clamp(0.0, 1.0) * 4095.0).round() as usize;
        self.linear_to_srgb[idx]
    }

    /// Per-channel table that scales linear light by `1 - strength`.
    pub fn dim_table(&self, strength: f32) -> [u8; 256] {
        let keep = (1.0 - strength).clamp(0.0, 1.0);
        let mut table = [0u8; 256];
        for (v, slot) in table.iter_mut().enumerate() {
            *slot = self.linear_to_srgb_u8(self.srgb_u8_to_linear(v as u8) * keep);
        }
        table
    }
}

/// Apply a 256-entry channel table to a packed 0x00RRGGBB pixel.
#[inline]
pub fn map_packed(px: u32, table: &[u8; 256]) -> u32 {
    let r = table[((px >> 16) & 0xFF) as usize] as u32;
    let g = table[((px >> 8) & 0xFF) as usize] as u32;
    let b = table[(px & 0xFF) as usize] as u32;
    (r << 16) | (g << 8) | b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_round_trip() {
        let lut = GammaLut::new();
        for v in [0u8, 1, 64, 128, 200, 255] {
            assert_eq!(lut.linear_to_srgb_u8(lut.srgb_u8_to_linear(v)), v);
        }
    }

    #[test]
    fn dimming_darkens_but_keeps_black() {
        let lut = GammaLut::new();
        let t = lut.dim_table(0.55);
        assert_eq!(t[0], 0);
        assert!(t[255] < 255 && t[255] > 128, "{}", t[255]);
        assert!(t.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(map_packed(0x00FFFFFF, &lut.dim_table(0.0)), 0x00FFFFFF);
        assert_eq!(map_packed(0x00FFFFFF, &lut.dim_table(1.0)), 0);
    }
}
