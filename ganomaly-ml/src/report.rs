//! Human-readable artifacts written next to the JSON results.
//!
//! Each backend bundle carries its own reporter. Both write a run summary and
//! a text rendering of a few held-out reconstructions; the quantum reporter
//! adds a description of the decoder circuit.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use ganomaly_core::persistence::atomic_write;
use ganomaly_core::{DataSource, GanConfig, History, Phase, SeedManager, Split};

use crate::backend::GanBackend;
use crate::error::MlError;
use crate::matrix::{from_rows, row_mse};

/// How many held-out samples the reconstruction grid shows.
pub const RECONSTRUCTION_SAMPLES: usize = 4;

/// Losses summarized from the tail of the training history.
const SUMMARY_KEYS: [&str; 4] = [
    "discriminator_loss",
    "generator_loss",
    "reconstruction_loss",
    "gradient_penalty",
];

/// What a reporter can look at once a run has produced its result.
pub struct ReportContext<'a> {
    pub config: &'a GanConfig,
    pub data: &'a dyn DataSource,
    pub backend: &'a mut dyn GanBackend,
    pub history: &'a History,
}

pub trait Reporter {
    fn name(&self) -> &'static str;

    /// Artifacts after a training run, under `model_dir/train_history`.
    fn report_training(&self, ctx: ReportContext<'_>) -> Result<Vec<PathBuf>, MlError>;

    /// Artifacts after an evaluation run, under `model_dir`.
    fn report_evaluation(&self, ctx: ReportContext<'_>) -> Result<Vec<PathBuf>, MlError>;
}

#[derive(Debug, Clone)]
pub struct ClassicalReporter {
    model_dir: PathBuf,
    side: usize,
}

impl ClassicalReporter {
    pub fn new(config: &GanConfig) -> Self {
        Self {
            model_dir: PathBuf::from(&config.model_dir),
            side: config.pix_num_one_side,
        }
    }
}

impl Reporter for ClassicalReporter {
    fn name(&self) -> &'static str {
        "classical"
    }

    fn report_training(&self, ctx: ReportContext<'_>) -> Result<Vec<PathBuf>, MlError> {
        let dir = self.model_dir.join("train_history");
        let mut written = vec![write_text(
            &dir.join("summary.txt"),
            &training_summary(ctx.history, ctx.backend),
        )?];
        written.push(write_text(
            &dir.join("reconstructions.txt"),
            &reconstruction_grid(ctx.data, ctx.backend, ctx.config.seed, self.side)?,
        )?);
        Ok(written)
    }

    fn report_evaluation(&self, ctx: ReportContext<'_>) -> Result<Vec<PathBuf>, MlError> {
        let mut written = vec![write_text(
            &self.model_dir.join("test_summary.txt"),
            &evaluation_summary(ctx.history),
        )?];
        written.push(write_text(
            &self.model_dir.join("test_reconstructions.txt"),
            &reconstruction_grid(ctx.data, ctx.backend, ctx.config.seed, self.side)?,
        )?);
        Ok(written)
    }
}

/// Classical artifacts plus `circuit.txt`.
#[derive(Debug, Clone)]
pub struct QuantumReporter {
    inner: ClassicalReporter,
    circuit: String,
}

impl QuantumReporter {
    pub fn new(config: &GanConfig) -> Self {
        Self {
            inner: ClassicalReporter::new(config),
            circuit: format!(
                "circuit: {}\ndepth: {}\nshots: {}\nlatent qubits: {}\n",
                config.quantum_circuit_type,
                config.quantum_depth,
                config.shots,
                config.latent_dimensions
            ),
        }
    }

    fn circuit_file(&self, ctx: &ReportContext<'_>) -> Result<PathBuf, MlError> {
        let text = format!("{}\n{}\n", self.circuit, ctx.backend.summarize());
        write_text(&self.inner.model_dir.join("circuit.txt"), &text)
    }
}

impl Reporter for QuantumReporter {
    fn name(&self) -> &'static str {
        "quantum"
    }

    fn report_training(&self, ctx: ReportContext<'_>) -> Result<Vec<PathBuf>, MlError> {
        let circuit = self.circuit_file(&ctx)?;
        let mut written = self.inner.report_training(ctx)?;
        written.push(circuit);
        Ok(written)
    }

    fn report_evaluation(&self, ctx: ReportContext<'_>) -> Result<Vec<PathBuf>, MlError> {
        let circuit = self.circuit_file(&ctx)?;
        let mut written = self.inner.report_evaluation(ctx)?;
        written.push(circuit);
        Ok(written)
    }
}

fn write_text(path: &Path, text: &str) -> Result<PathBuf, MlError> {
    atomic_write(path, text.as_bytes())?;
    info!(path = %path.display(), "Report written");
    Ok(path.to_path_buf())
}

fn training_summary(history: &History, backend: &dyn GanBackend) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}\n", backend.summarize());
    let _ = writeln!(
        out,
        "training steps: {}",
        history.training_records().count()
    );
    if let Some(last) = history.training_records().last() {
        let _ = writeln!(out, "final step {}:", last.step);
        for key in SUMMARY_KEYS {
            if let Some(v) = last.get(key) {
                let _ = writeln!(out, "  {key:<22} {v:.6}");
            }
        }
    }
    let _ = writeln!(
        out,
        "validation intervals: {}",
        history.validation_records().count()
    );
    if let Some(best) = history.best_validation("auc", false) {
        let _ = writeln!(out, "best validation auc at step {}:", best.step);
        for (key, v) in &best.metrics {
            let _ = writeln!(out, "  {key:<24} {v:.6}");
        }
    }
    out
}

fn evaluation_summary(result: &History) -> String {
    let mut out = String::new();
    for record in result.records_in(Phase::Test) {
        let _ = writeln!(out, "test results:");
        for (key, v) in &record.metrics {
            let _ = writeln!(out, "  {key:<24} {v:.6}");
        }
    }
    out
}

/// Side-by-side digit grids (`0`-`9`) of held-out inputs and reconstructions.
fn reconstruction_grid(
    data: &dyn DataSource,
    backend: &mut dyn GanBackend,
    seed: u64,
    side: usize,
) -> Result<String, MlError> {
    let n = RECONSTRUCTION_SAMPLES.min(data.split_len(Split::Test));
    if n == 0 {
        return Ok(String::from("no held-out samples\n"));
    }
    let mut rng = SeedManager::new(seed).rng_for("report");
    let batch = data.sample_batch(Split::Test, n, &mut rng)?;
    let x = from_rows(batch.features())?;
    let z = backend.encode(&x)?;
    let x_hat = backend.decode(&z)?;
    let errors = row_mse(&x, &x_hat)?;

    let width = if side > 0 && side * side == x.ncols() {
        side
    } else {
        x.ncols()
    };
    let mut out = String::new();
    for (i, sample) in batch.samples().iter().enumerate() {
        let _ = writeln!(
            out,
            "sample {i} ({:?}), reconstruction mse {:.5}",
            sample.label, errors[i]
        );
        let (input, recon) = (x.row(i).to_vec(), x_hat.row(i).to_vec());
        for (input, recon) in input.chunks(width).zip(recon.chunks(width)) {
            let _ = writeln!(out, "  {}   {}", digits(input), digits(recon));
        }
    }
    Ok(out)
}

fn digits(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| {
            let level = (v.clamp(0.0, 1.0) * 9.0).round() as u32;
            char::from_digit(level, 10).unwrap_or('?')
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ClassicalDenseNetworks, QuantumDecoderNetworks};
    use ganomaly_core::{DataStorage, HistoryRecord, Method};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::TempDir;

    fn config(dir: &TempDir, method: Method) -> GanConfig {
        GanConfig {
            method,
            model_dir: dir.path().to_string_lossy().into_owned(),
            latent_dimensions: 2,
            quantum_depth: 1,
            shots: 0,
            ..GanConfig::default()
        }
    }

    fn history() -> History {
        let mut h = History::new();
        let mut r = HistoryRecord::new(1, Phase::Train);
        r.insert("generator_loss", 1.5);
        h.append(r).unwrap();
        let mut v = HistoryRecord::new(1, Phase::Validation);
        v.insert("auc", 0.75);
        h.append(v).unwrap();
        h
    }

    #[test]
    fn test_digits() {
        assert_eq!(digits(&[0.0, 0.5, 1.0, 2.0, -1.0]), "05990");
    }

    #[test]
    fn test_classical_training_report() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Method::Classical);
        let data = DataStorage::synthetic(3, &mut StdRng::seed_from_u64(1));
        let mut backend = ClassicalDenseNetworks::classical(&cfg, 9).unwrap();
        let history = history();
        let written = ClassicalReporter::new(&cfg)
            .report_training(ReportContext {
                config: &cfg,
                data: &data,
                backend: &mut backend,
                history: &history,
            })
            .unwrap();
        assert_eq!(written.len(), 2);
        let summary = std::fs::read_to_string(&written[0]).unwrap();
        assert!(summary.contains("best validation auc at step 1"));
        let grid = std::fs::read_to_string(&written[1]).unwrap();
        assert_eq!(grid.lines().count(), RECONSTRUCTION_SAMPLES * 4);
    }

    #[test]
    fn test_quantum_report_adds_circuit() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Method::Quantum);
        let data = DataStorage::synthetic(2, &mut StdRng::seed_from_u64(1));
        let mut backend = QuantumDecoderNetworks::quantum(&cfg, 4).unwrap();
        let result = History::single(HistoryRecord::new(0, Phase::Test));
        let written = QuantumReporter::new(&cfg)
            .report_evaluation(ReportContext {
                config: &cfg,
                data: &data,
                backend: &mut backend,
                history: &result,
            })
            .unwrap();
        assert_eq!(written.len(), 3);
        let circuit = std::fs::read_to_string(dir.path().join("circuit.txt")).unwrap();
        assert!(circuit.contains("circuit: standard"));
        assert!(circuit.contains("Method: quantum"));
    }
}
