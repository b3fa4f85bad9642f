/// Triangular mel filterbank applied to power spectra.
///
/// Filters are laid out on the HTK mel scale between 0 Hz and the
/// Nyquist frequency; each filter spans the bins between its two
/// neighbors with triangular weights.
#[derive(Debug, Clone)]
pub struct MelFilterBank {
    /// One weight row per filter, each `fft_size / 2 + 1` long
    filters: Vec<Vec<f32>>,
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

impl MelFilterBank {
    pub fn new(n_mels: usize, sample_rate: u32, fft_size: usize) -> Self {
        let n_bins = fft_size / 2 + 1;
        let nyquist = sample_rate as f32 / 2.0;

        // n_mels + 2 points: each filter is anchored on its neighbors
        let mel_max = hz_to_mel(nyquist);
        let points: Vec<f32> = (0..n_mels + 2)
            .map(|i| {
                let mel = mel_max * i as f32 / (n_mels + 1) as f32;
                mel_to_hz(mel)
            })
            .collect();

        let bin_freq = |bin: usize| bin as f32 * sample_rate as f32 / fft_size as f32;

        let mut filters = Vec::with_capacity(n_mels);
        for m in 0..n_mels {
            let (lower, center, upper) = (points[m], points[m + 1], points[m + 2]);
            let mut weights = vec![0.0_f32; n_bins];
            for (bin, w) in weights.iter_mut().enumerate() {
                let f = bin_freq(bin);
                if f > lower && f < center {
                    *w = (f - lower) / (center - lower);
                } else if f >= center && f < upper {
                    *w = (upper - f) / (upper - center);
                }
            }
            filters.push(weights);
        }

        Self { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Apply the bank to one power spectrum, producing one energy per filter
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|weights| {
                weights
                    .iter()
                    .zip(power.iter())
                    .map(|(&w, &p)| w * p)
                    .sum::<f32>()
            })
            .collect()
    }
}
