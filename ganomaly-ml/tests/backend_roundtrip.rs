//! Checkpoint round-trips through the public backend interface.

use std::path::Path;

use ndarray::array;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use ganomaly_core::{GanConfig, Method};
use ganomaly_ml::backend::checkpoint::{MANIFEST_FILE, NETWORKS_FILE};
use ganomaly_ml::{Matrix, MlError, bundle};

fn config(method: Method) -> GanConfig {
    GanConfig {
        method,
        latent_dimensions: 3,
        quantum_depth: 2,
        shots: 0,
        ..GanConfig::default()
    }
}

fn inputs() -> Matrix {
    array![
        [0.0, 0.5, 1.0, 0.0, 0.5, 1.0, 0.0, 0.5, 1.0],
        [0.9, 0.1, 0.9, 0.1, 0.9, 0.1, 0.9, 0.1, 0.9],
    ]
}

#[test]
fn save_then_load_reproduces_outputs() {
    for method in Method::ALL {
        let dir = TempDir::new().unwrap();
        let b = bundle(method);
        let mut original = (b.networks)(&config(method), 9).unwrap();
        let saved = original.save(dir.path()).unwrap();
        assert_eq!(saved, dir.path().join(NETWORKS_FILE));
        assert!(dir.path().join(MANIFEST_FILE).is_file());

        let mut restored = (b.networks)(&GanConfig { seed: 1234, ..config(method) }, 9).unwrap();
        restored.load(dir.path()).unwrap();
        assert_eq!(restored.summarize(), original.summarize());

        let x = inputs();
        let z_a = original.encode(&x).unwrap();
        let z_b = restored.encode(&x).unwrap();
        let recon_a = original.decode(&z_a).unwrap();
        let recon_b = restored.decode(&z_b).unwrap();
        for (a, b) in recon_a.iter().zip(recon_b.iter()) {
            assert!((a - b).abs() < 1e-9, "{method}: {a} vs {b}");
        }
        let d_a = original.discriminate(&x).unwrap();
        let d_b = restored.discriminate(&x).unwrap();
        for (a, b) in d_a.iter().zip(d_b.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}

#[test]
fn load_from_missing_directory_fails() {
    for method in Method::ALL {
        let mut nets = (bundle(method).networks)(&config(method), 9).unwrap();
        let before = nets.parameters();
        let err = nets.load(Path::new("/definitely/not/a/checkpoint")).unwrap_err();
        assert!(matches!(err, MlError::CheckpointNotFound(_)));
        assert_eq!(nets.parameters(), before);
    }
}

#[test]
fn load_rejects_other_backend() {
    let dir = TempDir::new().unwrap();
    (bundle(Method::Quantum).networks)(&config(Method::Quantum), 9)
        .unwrap()
        .save(dir.path())
        .unwrap();
    let mut classical = (bundle(Method::Classical).networks)(&config(Method::Classical), 9).unwrap();
    assert!(matches!(
        classical.load(dir.path()),
        Err(MlError::CheckpointMismatch(_))
    ));
}
