use vx_core::{Vec3f, Volume};

/// 1D Gaussian kernel.
///
/// Conventions:
/// - `radius = ceil(3*sigma)`, minimum 1.
/// - `weights` is normalized such that `sum(weights) ~= 1`.
#[derive(Debug, Clone)]
pub struct GaussKernel1D {
    pub sigma: f32,
    pub radius: usize,
    pub weights: Vec<f32>,
}

impl GaussKernel1D {
    pub fn new(sigma: f32) -> Self {
        assert!(
            sigma.is_finite() && sigma > 0.0,
            "sigma must be > 0 and finite"
        );

        let radius = ((3.0 * sigma).ceil() as usize).max(1);
        let len = 2 * radius + 1;

        let sigma2 = sigma * sigma;
        let mut weights = vec![0.0f32; len];
        for (i, w) in weights.iter_mut().enumerate() {
            let x = i as isize - radius as isize;
            let xf = x as f32;
            *w = (-(xf * xf) / (2.0 * sigma2)).exp();
        }

        let sum: f32 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }

        Self {
            sigma,
            radius,
            weights,
        }
    }
}

fn convolve_line_clamp(signal: &[f32], kernel: &GaussKernel1D, out: &mut [f32]) {
    let n = signal.len();
    let radius = kernel.radius as isize;
    for (i, out_i) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (k, &w) in kernel.weights.iter().enumerate() {
            let idx = i as isize + radius - k as isize;
            let idx = if idx < 0 { 0 } else { (idx as usize).min(n - 1) };
            acc += signal[idx] * w;
        }
        *out_i = acc;
    }
}

/// Separable Gaussian smoothing with per-axis sigma; an axis with sigma 0
/// is left untouched. Borders clamp to the edge value.
pub fn smooth_volume(vol: &Volume<f32>, sigma: Vec3f) -> Volume<f32> {
    let shape = vol.shape();
    let mut out = vol.clone();
    if shape.iter().any(|&s| s == 0) {
        return out;
    }

    let sigmas = [sigma.x, sigma.y, sigma.z];
    let mut line = Vec::new();
    let mut smoothed = Vec::new();

    for axis in 0..3 {
        if sigmas[axis] <= 0.0 {
            continue;
        }
        let kernel = GaussKernel1D::new(sigmas[axis]);
        let n = shape[axis];
        line.resize(n, 0.0);
        smoothed.resize(n, 0.0);

        let others: [usize; 2] = match axis {
            0 => [1, 2],
            1 => [0, 2],
            _ => [0, 1],
        };

        for b in 0..shape[others[1]] {
            for a in 0..shape[others[0]] {
                for (i, slot) in line.iter_mut().enumerate() {
                    let mut c = [0usize; 3];
                    c[axis] = i;
                    c[others[0]] = a;
                    c[others[1]] = b;
                    *slot = out.at(c[0], c[1], c[2]);
                }
                convolve_line_clamp(&line, &kernel, &mut smoothed);
                for (i, &v) in smoothed.iter().enumerate() {
                    let mut c = [0usize; 3];
                    c[axis] = i;
                    c[others[0]] = a;
                    c[others[1]] = b;
                    out.set(c[0], c[1], c[2], v);
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{smooth_volume, GaussKernel1D};
    use vx_core::{Vec3f, Volume};

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = GaussKernel1D::new(1.2);

        let sum: f32 = k.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);

        for i in 1..=k.radius {
            let pos = k.weights[k.radius + i];
            let neg = k.weights[k.radius - i];
            assert!((pos - neg).abs() < 1e-6);
        }
    }

    #[test]
    fn smoothing_preserves_constant_volumes() {
        let vol = Volume::new_fill([5, 4, 3], 2.0f32);
        let out = smooth_volume(&vol, Vec3f::new(1.0, 1.0, 1.0));
        for &v in out.data() {
            assert!((v - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn smoothing_spreads_an_impulse_per_axis() {
        let mut vol = Volume::new_fill([7, 7, 7], 0.0f32);
        vol.set(3, 3, 3, 1.0);

        let out = smooth_volume(&vol, Vec3f::new(1.0, 0.0, 0.0));

        // Mass moved along x only.
        assert!(out.at(2, 3, 3) > 0.0);
        assert!(out.at(4, 3, 3) > 0.0);
        assert_eq!(out.at(3, 2, 3), 0.0);
        assert_eq!(out.at(3, 3, 2), 0.0);
        assert!(out.at(3, 3, 3) < 1.0);

        let total: f32 = out.data().iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn zero_sigma_is_identity() {
        let mut vol = Volume::new_fill([3, 3, 3], 0.0f32);
        vol.set(1, 0, 2, 5.0);
        let out = smooth_volume(&vol, Vec3f::default());
        assert_eq!(out, vol);
    }
}
