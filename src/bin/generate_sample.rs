use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::WriterBuilder;

use rusty_transmittance::{AlignedSeriesMeasurement, ParseOptions, ReferenceModel, SeriesCollection};

/// Dark current added to every simulated reading, in nA.
const DARK_CURRENT: f64 = 0.35;

/// Lamp spectrum: broad blackbody-like hump peaking near 650 nm.
fn lamp(wavelength: f64) -> f64 {
    let x = (wavelength - 650.0) / 220.0;
    120.0 * (-x * x).exp() + 8.0
}

/// Long-pass filter edge at `edge` nm.
fn long_pass(wavelength: f64, edge: f64) -> f64 {
    0.92 / (1.0 + (-(wavelength - edge) / 12.0).exp())
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Write one scan in the picoammeter logger layout: header, dark-current row,
/// then `time, mean, std, wavelength` rows in acquisition order.
fn write_log(
    path: &Path,
    wavelengths: &[f64],
    signal: impl Fn(f64) -> f64,
    rng: &mut SimpleRng,
) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    wtr.write_record(["Time", "Average/nA", "STD/nA", "Wavelength/nm"])?;
    wtr.write_record([
        "0.0".to_string(),
        DARK_CURRENT.to_string(),
        "0.002".to_string(),
        "DC".to_string(),
    ])?;
    for (i, &wl) in wavelengths.iter().enumerate() {
        let noise = 0.02 * signal(wl).abs().sqrt();
        let mean = signal(wl) + DARK_CURRENT + rng.gauss(0.0, noise);
        wtr.write_record([
            format!("{:.1}", (i + 1) as f64 * 0.5),
            format!("{mean:.6}"),
            format!("{noise:.6}"),
            format!("{wl:.1}"),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);

    // Fine lamp scan, 1 nm step, recorded once.
    let fine: Vec<f64> = (0..=600).map(|i| 400.0 + i as f64).collect();
    // Coarse filtered scans, 10 nm step, recorded high-to-low.
    let coarse: Vec<f64> = (0..=58).rev().map(|i| 405.0 + i as f64 * 10.0).collect();

    let reference_path = out_dir.join("reference.tsv");
    let shape_path = out_dir.join("lamp_shape.tsv");
    write_log(&reference_path, &fine, lamp, &mut rng)?;
    write_log(&shape_path, &fine, |wl| lamp(wl) / 120.0, &mut rng)?;

    let options = ParseOptions::default();
    let mut collection = SeriesCollection::new("long-pass filters");

    let edges = [500.0, 550.0, 600.0];
    for edge in edges {
        let filtered_path = out_dir.join(format!("filtered_lp{edge:.0}.tsv"));
        write_log(
            &filtered_path,
            &coarse,
            |wl| lamp(wl) * long_pass(wl, edge),
            &mut rng,
        )?;

        for shape in [None, Some(shape_path.as_path())] {
            let series = AlignedSeriesMeasurement::from_files(
                &reference_path,
                &filtered_path,
                shape,
                &options,
            )
            .with_context(|| format!("reconciling {}", filtered_path.display()))?;
            collection.push(series);
        }
    }

    for (series, transmittance) in collection
        .series()
        .zip(collection.transmittances()?.iter())
    {
        let model = match series.reference_model()? {
            ReferenceModel::Spline(_) => "spline",
            ReferenceModel::Fitted(_) => "shape fit",
        };
        let max = transmittance.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        log::info!(
            "{} points via {model}: max transmittance {max:.3}",
            series.len()
        );
    }

    println!(
        "Wrote {} scans to {} ({} measurements reconciled)",
        2 + edges.len(),
        out_dir.display(),
        collection.len()
    );
    Ok(())
}
