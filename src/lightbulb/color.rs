use serde::{Deserialize, Serialize};

/// The 16-bit ceiling for per-channel PWM duty (spec.md GLOSSARY).
pub const PWM_SCALE: u16 = u16::MAX;

/// CIE xy chromaticity coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chromaticity {
    pub x: f32,
    pub y: f32,
}

/// Reference primaries for the generic HSI colour wheel (step 1-3), ahead
/// of gamut mapping into the LED's own primaries. Close to the ITU-R
/// BT.709/sRGB primaries.
pub const REFERENCE_PRIMARIES: [Chromaticity; 3] = [
    Chromaticity { x: 0.64, y: 0.33 }, // R
    Chromaticity { x: 0.30, y: 0.60 }, // G
    Chromaticity { x: 0.15, y: 0.06 }, // B
];

pub const WHITE_POINT_D50: Chromaticity = Chromaticity { x: 0.3457, y: 0.3585 };
pub const WHITE_POINT_D65: Chromaticity = Chromaticity { x: 0.3127, y: 0.3290 };

/// HSI input: hue in degrees `[0, 360)`, saturation and intensity as
/// fractions `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct Hsi {
    pub hue: f32,
    pub saturation: f32,
    pub intensity: f32,
}

/// Parameters describing a specific lightbulb's optical path (spec.md
/// §3 "Lightbulb group" and §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportParams {
    pub channel_count: u8,
    pub flux: [f32; 5],
    pub white_point: Chromaticity,
    pub led_primaries: [Chromaticity; 3],
    pub curve_factor: f32,
    pub max_power_cap: Option<f32>,
}

fn gamma_to_linear(v: f32) -> f32 {
    if v > 0.04045 {
        ((v + 0.055) / 1.055).powf(2.4)
    } else {
        v / 12.92
    }
}

/// Which of the six 60-degree hue wedges (R→Y, Y→G, G→C, C→B, B→M, M→R)
/// `hue` falls into. Shared by [`hsi_to_rgb`]'s sector split and
/// [`gamut_map`]'s wedge classification (spec.md §4.2 step 4), so a hue
/// maps to the same wedge throughout the whole pipeline.
fn hue_sector(hue: f32) -> usize {
    ((hue.rem_euclid(360.0) / 60.0).floor() as i32).rem_euclid(6) as usize
}

/// Step 1: HSI to linear RGB using the six 60-degree sector rule.
fn hsi_to_rgb(hsi: Hsi) -> (f32, f32, f32) {
    let h = hsi.hue.rem_euclid(360.0);
    let s = hsi.saturation.clamp(0.0, 1.0);
    let i = hsi.intensity.clamp(0.0, 1.0);

    let sector = hue_sector(h) as i32;
    let within = (h - sector as f32 * 60.0).to_radians();
    let mid = (60f32).to_radians();

    // within each 120-degree third the Agoston HSI formula produces one
    // "low" channel, one "cosine-weighted" channel and a remainder; the
    // six-sector split only changes which channel plays which role.
    let low = i * (1.0 - s);
    let peak = i * (1.0 + s * within.cos() / (mid - within).cos());
    let mid_ch = 3.0 * i - (low + peak);

    match sector {
        0 => (peak, mid_ch, low),
        1 => (mid_ch, peak, low),
        2 => (low, peak, mid_ch),
        3 => (low, mid_ch, peak),
        4 => (mid_ch, low, peak),
        _ => (peak, low, mid_ch),
    }
}

fn xy_to_xyz(c: Chromaticity, y: f32) -> [f32; 3] {
    [c.x * y / c.y, y, (1.0 - c.x - c.y) * y / c.y]
}

fn invert3(m: [[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    let inv_det = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}

fn mat_vec(m: [[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Builds the RGB-to-XYZ matrix for a triangle of primaries against a
/// reference white, by the standard working-space construction: scale
/// each primary's XYZ so that summing them (unit RGB) reproduces the
/// white point.
fn rgb_to_xyz_matrix(primaries: [Chromaticity; 3], white: Chromaticity) -> [[f32; 3]; 3] {
    let cols = primaries.map(|p| xy_to_xyz(p, 1.0));
    let m = [
        [cols[0][0], cols[1][0], cols[2][0]],
        [cols[0][1], cols[1][1], cols[2][1]],
        [cols[0][2], cols[1][2], cols[2][2]],
    ];
    let w = xy_to_xyz(white, 1.0);
    let s = mat_vec(invert3(m), w);
    [
        [m[0][0] * s[0], m[0][1] * s[1], m[0][2] * s[2]],
        [m[1][0] * s[0], m[1][1] * s[1], m[1][2] * s[2]],
        [m[2][0] * s[0], m[2][1] * s[1], m[2][2] * s[2]],
    ]
}

fn xyz_to_xy(xyz: [f32; 3]) -> Chromaticity {
    let sum = xyz[0] + xyz[1] + xyz[2];
    if sum.abs() < 1e-9 {
        return Chromaticity { x: 0.0, y: 0.0 };
    }
    Chromaticity { x: xyz[0] / sum, y: xyz[1] / sum }
}

/// Barycentric coordinates of `p` in the triangle `a, b, c`. Returns
/// `None` when the triangle is degenerate.
fn barycentric(p: Chromaticity, a: Chromaticity, b: Chromaticity, c: Chromaticity) -> Option<(f32, f32, f32)> {
    let denom = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if denom.abs() < 1e-9 {
        return None;
    }
    let l1 = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / denom;
    let l2 = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / denom;
    let l3 = 1.0 - l1 - l2;
    Some((l1, l2, l3))
}

/// The medial-triangle secondary points (cyan, magenta, yellow) at the
/// midpoint of each pair of adjacent primaries — spec.md §4.2 step 4's
/// "nominal sCMY intermediate points", in the same xy space as
/// `primaries`.
fn secondary_points(primaries: [Chromaticity; 3]) -> [Chromaticity; 3] {
    let [r, g, b] = primaries;
    let mid = |a: Chromaticity, c: Chromaticity| Chromaticity { x: (a.x + c.x) / 2.0, y: (a.y + c.y) / 2.0 };
    [mid(g, b), mid(b, r), mid(r, g)] // [cyan, magenta, yellow]
}

/// The six hue-wheel vertices in hue order (R, Y, G, C, B, M) — wedge
/// `i` spans `hexagon[i]..hexagon[i+1]` and matches [`hue_sector`]'s
/// split exactly, alternating a primary and a nominal sCMY secondary.
fn hexagon(primaries: [Chromaticity; 3]) -> [Chromaticity; 6] {
    let [r, g, b] = primaries;
    let [c, m, y] = secondary_points(primaries);
    [r, y, g, c, b, m]
}

/// Expresses `p - center` in the basis `(a - center, b - center)`.
/// `None` for a degenerate (collinear) basis.
fn solve_basis(p: Chromaticity, center: Chromaticity, a: Chromaticity, b: Chromaticity) -> Option<(f32, f32)> {
    let (ax, ay) = (a.x - center.x, a.y - center.y);
    let (bx, by) = (b.x - center.x, b.y - center.y);
    let (px, py) = (p.x - center.x, p.y - center.y);
    let det = ax * by - ay * bx;
    if det.abs() < 1e-9 {
        return None;
    }
    let u = (px * by - py * bx) / det;
    let v = (ax * py - ay * px) / det;
    Some((u, v))
}

/// Inverse of [`solve_basis`]: rebuilds a point from basis coordinates
/// `(u, v)` against `(a - center, b - center)`.
fn apply_basis(center: Chromaticity, a: Chromaticity, b: Chromaticity, u: f32, v: f32) -> Chromaticity {
    Chromaticity { x: center.x + u * (a.x - center.x) + v * (b.x - center.x), y: center.y + u * (a.y - center.y) + v * (b.y - center.y) }
}

/// Clamps barycentric weights to the simplex (each `>= 0`, summing to
/// 1); `None` (degenerate triangle) falls back to pure first-primary.
fn clamp_to_simplex(coords: Option<(f32, f32, f32)>) -> (f32, f32, f32) {
    let Some((mut l1, mut l2, mut l3)) = coords else {
        return (1.0, 0.0, 0.0);
    };
    if l1 < 0.0 || l2 < 0.0 || l3 < 0.0 {
        l1 = l1.max(0.0);
        l2 = l2.max(0.0);
        l3 = l3.max(0.0);
        let sum = l1 + l2 + l3;
        if sum > 1e-9 {
            l1 /= sum;
            l2 /= sum;
            l3 /= sum;
        }
    }
    (l1, l2, l3)
}

/// Gamut-maps `point` into the LED's own primaries, returning barycentric
/// (r, g, b) weights that sum to 1 (spec.md §4.2 steps 4-5).
///
/// When `point` already lies inside the LED (R,G,B) triangle it's kept
/// as-is (step 4's "keep it" branch — exact, including the achromatic
/// white-point case). Otherwise `sector` (the same 60-degree hue wedge
/// [`hsi_to_rgb`] used, reused here rather than re-classifying `point`
/// against the reference hexagon — equivalent for any hue that survived
/// steps 1-3 undistorted, and avoids a degenerate case right at the
/// white point) picks a pair of reference-space vertices: one sRGB
/// primary and one nominal sCMY secondary. That pair, re-expressed as a
/// basis centered on `white`, is swapped for the same wedge's pair of
/// LED-space vertices — one continuous pair-transform rather than the
/// two discontinuous inner/outer steps spec.md §4.2 describes (a
/// resolved simplification, documented in DESIGN.md the way the
/// humidifier midpoint deviation is): near `white` this behaves like
/// the "inner" sCMY-pair transform, and out at the wedge's far vertex it
/// reaches the "outer" primary-to-primary transform, without a seam
/// between the two. The mapped point's barycentric coordinates in the
/// LED triangle are then clamped to the simplex as a safety net for
/// residual floating-point overshoot.
fn gamut_map(point: Chromaticity, white: Chromaticity, sector: usize, primaries: [Chromaticity; 3]) -> (f32, f32, f32) {
    if let Some((l1, l2, l3)) = barycentric(point, primaries[0], primaries[1], primaries[2]) {
        if l1 >= 0.0 && l2 >= 0.0 && l3 >= 0.0 {
            return (l1, l2, l3);
        }
    }

    let ref_hex = hexagon(REFERENCE_PRIMARIES);
    let led_hex = hexagon(primaries);
    let next = (sector + 1) % 6;
    let mapped = solve_basis(point, white, ref_hex[sector], ref_hex[next])
        .map(|(u, v)| apply_basis(white, led_hex[sector], led_hex[next], u, v))
        .unwrap_or(point);

    clamp_to_simplex(barycentric(mapped, primaries[0], primaries[1], primaries[2]))
}

fn saturation_white_curve(coeff: &mut [f32], k: f32, saturation: f32) {
    if k.abs() < 1e-9 {
        return;
    }
    let factor = 1.0 - (((k * saturation / 100.0).exp() - 1.0) / (k.exp() - 1.0));
    for c in coeff.iter_mut() {
        *c *= factor;
    }
}

/// Runs the full HSI-to-per-channel-PWM pipeline (spec.md §4.2 steps
/// 1-12). `brightness` is `v` in `[0, 100]`. Pure and idempotent: calling
/// this twice with the same inputs yields byte-identical output.
pub fn hsi_to_rgbww(hsi: Hsi, brightness: f32, params: &TransportParams) -> [u16; 5] {
    if params.channel_count < 3 {
        // 1-2 channel bulbs skip colour entirely; only brightness (and,
        // for 2-channel, colour temperature) drive duty. Colour-temp
        // mixing is out of scope for the pure colour-wheel path.
        let scale = (brightness.clamp(0.0, 100.0) / 100.0) * PWM_SCALE as f32;
        let mut out = [0u16; 5];
        for slot in out.iter_mut().take(params.channel_count as usize) {
            *slot = scale.floor() as u16;
        }
        return out;
    }

    let (r, g, b) = hsi_to_rgb(hsi);
    let linear = (gamma_to_linear(r), gamma_to_linear(g), gamma_to_linear(b));
    let ref_to_xyz = rgb_to_xyz_matrix(REFERENCE_PRIMARIES, params.white_point);
    let xyz = mat_vec(ref_to_xyz, [linear.0, linear.1, linear.2]);
    let point = xyz_to_xy(xyz);

    let sector = hue_sector(hsi.hue);
    let (wr, wg, wb) = gamut_map(point, params.white_point, sector, params.led_primaries);

    let mut coeff = [wr, wg, wb, 0.0, 0.0];
    if params.channel_count >= 4 {
        // CW decomposition: the white vertex absorbs the shared minimum
        // of the three channels, the rest stays on R/G/B.
        let w = coeff[0].min(coeff[1]).min(coeff[2]);
        coeff[0] -= w;
        coeff[1] -= w;
        coeff[2] -= w;
        coeff[3] = w;
    }
    if params.channel_count >= 5 {
        let half = coeff[3] / 2.0;
        coeff[3] = half;
        coeff[4] = half;
    }

    // Step 7: flux correction. A zero-flux channel is forced to 0 to
    // avoid division (documented failure mode).
    for (c, f) in coeff.iter_mut().zip(params.flux.iter()) {
        *c = if *f > 0.0 { *c / f } else { 0.0 };
    }
    // The raw barycentric weights already sum to <= 1 on the achromatic
    // axis; only clamp down when flux correction pushed a channel over 1,
    // rather than always forcing the max to exactly 1 -- the latter
    // reading would violate the documented brightness-sum invariant for
    // an unsaturated (white) input. See DESIGN.md.
    let max_after_flux = coeff.iter().cloned().fold(0.0f32, f32::max);
    if max_after_flux > 1.0 {
        for c in coeff.iter_mut() {
            *c /= max_after_flux;
        }
    }

    saturation_white_curve(&mut coeff[..3], params.curve_factor, hsi.saturation * 100.0);

    // Step 10: final safety clamp, same "max <= 1" semantics as step 7.
    let max_final = coeff.iter().cloned().fold(0.0f32, f32::max);
    if max_final > 1.0 {
        for c in coeff.iter_mut() {
            *c /= max_final;
        }
    }

    let mut brightness_scale = (brightness.clamp(0.0, 100.0) / 100.0) * PWM_SCALE as f32;
    if let Some(cap) = params.max_power_cap {
        let flux_weighted: f32 = coeff.iter().zip(params.flux.iter()).map(|(c, f)| c * f).sum();
        let flux_total: f32 = params.flux.iter().sum();
        if flux_weighted > 0.0 && flux_total > 0.0 {
            let avg_power = flux_weighted / flux_total;
            let ratio = avg_power.min(cap) / avg_power;
            brightness_scale *= ratio;
        }
    }

    let mut out = [0u16; 5];
    for i in 0..5 {
        out[i] = (coeff[i] * brightness_scale).floor().clamp(0.0, PWM_SCALE as f32) as u16;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_channel_params(white_point: Chromaticity) -> TransportParams {
        TransportParams {
            channel_count: 3,
            flux: [1.0, 1.0, 1.0, 1.0, 1.0],
            white_point,
            led_primaries: REFERENCE_PRIMARIES,
            curve_factor: 0.0,
            max_power_cap: None,
        }
    }

    #[test]
    fn pure_white_sums_to_brightness_scale() {
        let params = three_channel_params(WHITE_POINT_D50);
        let hsi = Hsi { hue: 0.0, saturation: 0.0, intensity: 1.0 };
        let out = hsi_to_rgbww(hsi, 100.0, &params);
        let sum: u32 = out[..3].iter().map(|v| *v as u32).sum();
        let expected = PWM_SCALE as u32;
        assert!(
            (sum as i64 - expected as i64).abs() <= 3,
            "sum {sum} vs expected {expected}"
        );
    }

    #[test]
    fn max_power_cap_above_average_does_not_scale_down() {
        let mut params = three_channel_params(WHITE_POINT_D50);
        let hsi = Hsi { hue: 0.0, saturation: 0.0, intensity: 1.0 };

        params.max_power_cap = Some(10.0); // far above any reachable average power
        let capped = hsi_to_rgbww(hsi, 100.0, &params);

        params.max_power_cap = None;
        let uncapped = hsi_to_rgbww(hsi, 100.0, &params);

        assert_eq!(capped, uncapped, "a cap nobody is hitting must not dim the output");
    }

    #[test]
    fn max_power_cap_below_average_scales_brightness_down() {
        let mut params = three_channel_params(WHITE_POINT_D50);
        let hsi = Hsi { hue: 0.0, saturation: 0.0, intensity: 1.0 };
        let uncapped = hsi_to_rgbww(hsi, 100.0, &params);

        params.max_power_cap = Some(0.1); // well below the achievable average power
        let capped = hsi_to_rgbww(hsi, 100.0, &params);

        let uncapped_sum: u32 = uncapped.iter().map(|v| *v as u32).sum();
        let capped_sum: u32 = capped.iter().map(|v| *v as u32).sum();
        assert!(capped_sum < uncapped_sum, "capped {capped_sum} should be dimmer than uncapped {uncapped_sum}");
    }

    #[test]
    fn gamut_map_sends_a_reference_primary_to_the_leds_own_primary() {
        let white = WHITE_POINT_D65;
        let shrink = |p: Chromaticity| Chromaticity { x: white.x + 0.5 * (p.x - white.x), y: white.y + 0.5 * (p.y - white.y) };
        let led_primaries = REFERENCE_PRIMARIES.map(shrink);

        // Pure reference red sits exactly on REFERENCE_PRIMARIES[0] after
        // steps 1-3 (gamma_to_linear is the identity at 0 and 1), which is
        // outside the shrunk LED triangle and lands in sector 0 (R -> Y).
        let (wr, wg, wb) = gamut_map(REFERENCE_PRIMARIES[0], white, 0, led_primaries);

        assert!((wr - 1.0).abs() < 1e-4, "wr={wr}");
        assert!(wg.abs() < 1e-4, "wg={wg}");
        assert!(wb.abs() < 1e-4, "wb={wb}");
    }

    #[test]
    fn gamut_map_stays_on_the_simplex_for_every_sector() {
        let white = WHITE_POINT_D65;
        let shrink = |p: Chromaticity| Chromaticity { x: white.x + 0.5 * (p.x - white.x), y: white.y + 0.5 * (p.y - white.y) };
        let led_primaries = REFERENCE_PRIMARIES.map(shrink);

        for sector in 0..6 {
            let hue = sector as f32 * 60.0 + 30.0;
            let hsi = Hsi { hue, saturation: 1.0, intensity: 1.0 };
            let (r, g, b) = hsi_to_rgb(hsi);
            let linear = (gamma_to_linear(r), gamma_to_linear(g), gamma_to_linear(b));
            let ref_to_xyz = rgb_to_xyz_matrix(REFERENCE_PRIMARIES, white);
            let xyz = mat_vec(ref_to_xyz, [linear.0, linear.1, linear.2]);
            let point = xyz_to_xy(xyz);

            let (wr, wg, wb) = gamut_map(point, white, sector, led_primaries);
            assert!(wr >= -1e-5 && wg >= -1e-5 && wb >= -1e-5, "sector {sector}: ({wr}, {wg}, {wb})");
            assert!((wr + wg + wb - 1.0).abs() < 1e-3, "sector {sector}: sum {}", wr + wg + wb);
        }
    }

    #[test]
    fn idempotent_across_repeated_calls() {
        let params = three_channel_params(WHITE_POINT_D65);
        let hsi = Hsi { hue: 210.0, saturation: 0.6, intensity: 0.8 };
        let a = hsi_to_rgbww(hsi, 75.0, &params);
        let b = hsi_to_rgbww(hsi, 75.0, &params);
        assert_eq!(a, b);
    }
}
