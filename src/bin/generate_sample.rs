use std::path::PathBuf;

use anyhow::{Context, Result};
use platereader::ExperimentConfig;

/// Logistic expression curve.
fn expression(t_hours: f64, max: f64, rate: f64, midpoint: f64) -> f64 {
    max / (1.0 + (-rate * (t_hours - midpoint)).exp())
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
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
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

/// `hhh:mm:ss.sss`
fn format_elapsed(seconds: f64) -> String {
    let ms = (seconds * 1000.0).round() as u64;
    format!(
        "{:03}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        ms % 1000
    )
}

const REPEATS: u32 = 25;
const CYCLE_SECONDS: f64 = 600.0;
const BACKGROUND: f64 = 850.0;

fn main() -> Result<()> {
    let dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "data".to_string()));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let mut config = ExperimentConfig::default();

    // Row B, even columns: labelled samples, B:16 is the blank.
    // Row C is read by the instrument but left off the plate map.
    let labelled: Vec<u32> = (1..=8).map(|i| 2 * i).collect();
    let unlabelled: Vec<u32> = (1..=4).collect();

    // Plate map grid: labels are the well names.
    let platemap_path = dir.join(format!("{}-platemap.tsv", config.date));
    let header: Vec<String> = std::iter::once("Row".to_string())
        .chain(labelled.iter().map(|c| c.to_string()))
        .collect();
    let cells: Vec<String> = std::iter::once("B".to_string())
        .chain(labelled.iter().map(|c| format!("B:{c}")))
        .collect();
    std::fs::write(&platemap_path, format!("{}\n{}\n", header.join("\t"), cells.join("\t")))
        .with_context(|| format!("writing {}", platemap_path.display()))?;

    // Envision export
    let data_path = dir.join(format!(
        "M_{}-204829 b.next Envision FLUOR deGFP Timecourse.csv",
        config.date
    ));
    let mut writer = csv::Writer::from_path(&data_path)
        .with_context(|| format!("creating {}", data_path.display()))?;
    writer.write_record([
        "Plate",
        "Repeat",
        "Barcode",
        "Well ID",
        "Type",
        "Time [hhh:mm:ss.sss]",
        "Result Channel 1",
        "Exc WL[nm]",
        "Ems WL Channel 1[nm]",
    ])?;

    let wells: Vec<(char, u32)> = labelled
        .iter()
        .map(|&c| ('B', c))
        .chain(unlabelled.iter().map(|&c| ('C', c)))
        .collect();

    let mut rows = 0usize;
    for repeat in 1..=REPEATS {
        for (slot, &(row, column)) in wells.iter().enumerate() {
            // Wells in one cycle are read a fraction of a second apart.
            let elapsed = f64::from(repeat - 1) * CYCLE_SECONDS + slot as f64 * 0.35;
            let hours = elapsed / 3600.0;
            let signal = if row == 'B' && column == 16 {
                0.0
            } else {
                expression(hours, 4000.0 * f64::from(column) / 2.0, 1.6, 1.5)
            };
            let value = (BACKGROUND + signal + rng.gauss(0.0, 15.0)).round();

            writer.write_record([
                "1".to_string(),
                repeat.to_string(),
                String::new(),
                format!("{row}{column:02}"),
                "S".to_string(),
                format_elapsed(elapsed),
                value.to_string(),
                "485".to_string(),
                "535".to_string(),
            ])?;
            rows += 1;
        }
    }
    writer.flush()?;

    config.data_file = data_path.clone();
    config.platemap = Some(platemap_path.clone());
    config.output_dir = Some(dir.join("out"));
    let config_path = dir.join("experiment.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)
        .with_context(|| format!("writing {}", config_path.display()))?;

    println!(
        "Wrote {rows} readings ({} wells × {REPEATS} repeats) to {}",
        wells.len(),
        data_path.display()
    );
    println!("Plate map: {}", platemap_path.display());
    println!("Config:    {}", config_path.display());
    Ok(())
}
