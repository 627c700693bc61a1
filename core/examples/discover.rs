//! Runs the discovery pipeline over a synthetic connection log: a large
//! population of ordinary flows plus a small cluster of exfiltration-like
//! outliers.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example discover
//! ```

use argus_core::{discover_anomalies, Dataset, SearchConfig};
use nalgebra::DMatrix;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};

fn main() {
    env_logger::init();

    let dataset = synthetic_connections(400, 24);
    let config = SearchConfig {
        seed: Some(7),
        max_iterations: 500,
        ..SearchConfig::default()
    };

    let discovery = discover_anomalies(&dataset, 3, config).expect("valid input");

    println!(
        "winning features: {:?} (action {})",
        discovery.search.features, discovery.search.configuration.action
    );
    println!(
        "cluster distribution: {}",
        serde_json::to_string_pretty(&discovery.anomalies.distribution).expect("serializable")
    );
    println!("{} anomalous rows:", discovery.anomalies.rows.n_rows());
    for id in discovery.anomalies.rows.dataset().identifier_values() {
        println!("  uid {id}");
    }
}

/// `normal + outliers` rows over four traffic-shaped columns.
fn synthetic_connections(normal: usize, outliers: usize) -> Dataset {
    let mut rng = ChaCha20Rng::seed_from_u64(1234);
    let baseline = Normal::new(0.0, 1.0).expect("valid normal");
    let n = normal + outliers;
    let mut cells = Vec::with_capacity(n * 5);
    for r in 0..n {
        let shift = if r < normal { 0.0 } else { 12.0 };
        cells.push(r as f64); // uid
        cells.push(120.0 + 40.0 * baseline.sample(&mut rng) + shift * 50.0); // bytes
        cells.push(0.8 + 0.3 * baseline.sample(&mut rng) + shift * 0.2); // duration
        cells.push(6.0 + 2.0 * baseline.sample(&mut rng) + shift); // packets
        cells.push(baseline.sample(&mut rng)); // jitter
    }
    Dataset::new(
        vec![
            "uid".into(),
            "bytes".into(),
            "duration".into(),
            "packets".into(),
            "jitter".into(),
        ],
        DMatrix::from_row_slice(n, 5, &cells),
        "uid",
    )
    .expect("well-formed synthetic dataset")
}
