//! Traffic flow prediction.
//!
//! [`TrafficPredictor`] owns the full model lifecycle: synthesizing
//! labeled training data, fitting a feature scaler and a regression
//! forest, persisting the artifact to disk, reloading it on startup,
//! and serving predictions. The model is either `Untrained` or
//! `Trained`; a predict call on an untrained model trains it
//! transparently, and concurrent first callers collapse to a single
//! training run.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::TrafficError;
use crate::forest::{FEATURE_COUNT, RegressionForest};
use crate::types::PredictionFeatures;

pub const DEFAULT_TRAINING_SAMPLES: usize = 1000;
pub const DEFAULT_ESTIMATORS: usize = 100;

/// Seed for the bootstrap draws and the train/test shuffle, so a given
/// synthetic dataset always fits to the same forest.
const FIT_SEED: u64 = 42;

const MODEL_FILE: &str = "traffic_model.json";
const SCALER_FILE: &str = "scaler.json";
const MODEL_INFO_FILE: &str = "model_info.json";

/// Per-feature standardisation fitted on the training split only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: [f64; FEATURE_COUNT],
    std: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    pub fn fit(samples: &[[f64; FEATURE_COUNT]]) -> Self {
        let n = samples.len().max(1) as f64;
        let mut mean = [0.0; FEATURE_COUNT];
        for sample in samples {
            for (m, value) in mean.iter_mut().zip(sample) {
                *m += value;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut std = [0.0; FEATURE_COUNT];
        for sample in samples {
            for ((s, value), m) in std.iter_mut().zip(sample).zip(&mean) {
                *s += (value - m) * (value - m);
            }
        }
        for s in &mut std {
            *s = (*s / n).sqrt();
            if *s == 0.0 {
                *s = 1.0;
            }
        }

        Self { mean, std }
    }

    pub fn transform(&self, x: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            out[i] = (x[i] - self.mean[i]) / self.std[i];
        }
        out
    }

    pub fn transform_all(&self, samples: &[[f64; FEATURE_COUNT]]) -> Vec<[f64; FEATURE_COUNT]> {
        samples.iter().map(|x| self.transform(x)).collect()
    }
}

/// Metadata persisted alongside the fitted forest and scaler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: DateTime<Utc>,
    pub model_type: String,
    pub n_estimators: usize,
    pub features: Vec<String>,
    pub is_trained: bool,
}

/// A fully fitted artifact. Immutable once built; replaced wholesale
/// on retrain so readers never observe a half-written model.
#[derive(Debug)]
pub struct FittedModel {
    pub forest: RegressionForest,
    pub scaler: StandardScaler,
    pub metadata: ModelMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Untrained,
    Trained,
}

/// Synthesize labeled samples from the generative traffic rules the
/// regressor approximates: a base flow of 80 shaped by extended rush
/// hours, afternoon traffic, quiet nights, weekends and rain.
pub fn generate_training_data(
    rng: &mut StdRng,
    n_samples: usize,
) -> (Vec<[f64; FEATURE_COUNT]>, Vec<f64>) {
    let mut samples = Vec::with_capacity(n_samples);
    let mut targets = Vec::with_capacity(n_samples);

    for _ in 0..n_samples {
        let hour: i64 = rng.gen_range(0..=23);
        let day_of_week: i64 = rng.gen_range(0..=6);
        let weather: i64 = rng.gen_range(0..=2);

        let mut flow: i64 = 80;
        if (7..=11).contains(&hour) || (16..=21).contains(&hour) {
            flow += rng.gen_range(150..=300);
        } else if (12..=15).contains(&hour) {
            flow += rng.gen_range(50..=100);
        } else if hour >= 22 || hour <= 5 {
            flow -= rng.gen_range(30..=50);
        }
        if day_of_week >= 5 {
            flow -= rng.gen_range(20..=40);
        }
        if weather == 1 {
            // Monsoon rain pushes flow up, not down
            flow += rng.gen_range(40..=80);
        }
        flow = (flow + rng.gen_range(-30..=30)).max(0);

        samples.push([hour as f64, day_of_week as f64, weather as f64]);
        targets.push(flow as f64);
    }

    (samples, targets)
}

pub struct TrafficPredictor {
    artifact: RwLock<Option<Arc<FittedModel>>>,
    train_lock: Mutex<()>,
    model_dir: PathBuf,
    n_samples: usize,
    n_estimators: usize,
}

impl TrafficPredictor {
    /// Create a predictor rooted at `model_dir`, loading an existing
    /// artifact if one is present and readable.
    pub fn new(model_dir: impl AsRef<Path>) -> Self {
        Self::with_training_config(model_dir, DEFAULT_TRAINING_SAMPLES, DEFAULT_ESTIMATORS)
    }

    pub fn with_training_config(
        model_dir: impl AsRef<Path>,
        n_samples: usize,
        n_estimators: usize,
    ) -> Self {
        let predictor = Self {
            artifact: RwLock::new(None),
            train_lock: Mutex::new(()),
            model_dir: model_dir.as_ref().to_path_buf(),
            // A fit needs at least one training and one held-out
            // sample, and at least one tree to average.
            n_samples: n_samples.max(2),
            n_estimators: n_estimators.max(1),
        };
        predictor.load();
        predictor
    }

    pub fn state(&self) -> ModelState {
        let guard = self.artifact.read().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            ModelState::Trained
        } else {
            ModelState::Untrained
        }
    }

    /// Train on freshly synthesized data and swap the new artifact in.
    /// Returns the R^2 score on the held-out 20% split.
    pub fn train(&self) -> f64 {
        self.train_with_rng(&mut StdRng::from_entropy())
    }

    /// Train with an explicit random source for the synthetic data, so
    /// tests can make the whole run reproducible.
    pub fn train_with_rng(&self, rng: &mut StdRng) -> f64 {
        let _guard = self.train_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.fit_and_swap(rng).0
    }

    /// Predict traffic flow for the given features. Trains first if no
    /// artifact is available; the result is a non-negative flow count,
    /// deterministic for a fixed artifact.
    pub fn predict(&self, features: PredictionFeatures) -> u32 {
        let artifact = self.ensure_trained();
        let scaled = artifact.scaler.transform(&features.as_array());
        let flow = artifact.forest.predict(&scaled);
        flow.max(0.0) as u32
    }

    /// Persist the current artifact. Returns false (after logging) on
    /// any I/O failure or if the model is untrained.
    pub fn save(&self) -> bool {
        let artifact = {
            let guard = self.artifact.read().unwrap_or_else(|e| e.into_inner());
            guard.clone()
        };
        match artifact {
            Some(fitted) => self.save_artifact(&fitted),
            None => {
                tracing::warn!("nothing to save, model is untrained");
                false
            }
        }
    }

    /// Restore the artifact from disk. A missing or malformed file
    /// leaves the model untrained and returns false; it never panics.
    pub fn load(&self) -> bool {
        match self.read_files() {
            Ok(fitted) => {
                tracing::info!(
                    trained_at = %fitted.metadata.trained_at,
                    n_estimators = fitted.metadata.n_estimators,
                    "loaded existing model"
                );
                let mut guard = self.artifact.write().unwrap_or_else(|e| e.into_inner());
                *guard = Some(Arc::new(fitted));
                true
            }
            Err(e) => {
                tracing::info!(error = %e, "no usable model artifact, will train a new one");
                false
            }
        }
    }

    fn ensure_trained(&self) -> Arc<FittedModel> {
        {
            let guard = self.artifact.read().unwrap_or_else(|e| e.into_inner());
            if let Some(fitted) = guard.as_ref() {
                return Arc::clone(fitted);
            }
        }

        // Serialize first-use training; losers of the race reuse the
        // winner's artifact.
        let _guard = self.train_lock.lock().unwrap_or_else(|e| e.into_inner());
        {
            let guard = self.artifact.read().unwrap_or_else(|e| e.into_inner());
            if let Some(fitted) = guard.as_ref() {
                return Arc::clone(fitted);
            }
        }
        self.fit_and_swap(&mut StdRng::from_entropy()).1
    }

    /// Caller must hold `train_lock`.
    fn fit_and_swap(&self, rng: &mut StdRng) -> (f64, Arc<FittedModel>) {
        tracing::info!(
            n_samples = self.n_samples,
            n_estimators = self.n_estimators,
            "training traffic model"
        );

        let (samples, targets) = generate_training_data(rng, self.n_samples);

        let mut order: Vec<usize> = (0..samples.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(FIT_SEED));
        // The training split is never empty, even for tiny sample
        // counts.
        let split = ((samples.len() as f64 * 0.8) as usize).max(1);
        let (train_idx, test_idx) = order.split_at(split);

        let train_samples: Vec<_> = train_idx.iter().map(|&i| samples[i]).collect();
        let train_targets: Vec<_> = train_idx.iter().map(|&i| targets[i]).collect();
        let test_samples: Vec<_> = test_idx.iter().map(|&i| samples[i]).collect();
        let test_targets: Vec<_> = test_idx.iter().map(|&i| targets[i]).collect();

        let scaler = StandardScaler::fit(&train_samples);
        let forest = RegressionForest::fit(
            &scaler.transform_all(&train_samples),
            &train_targets,
            self.n_estimators,
            FIT_SEED,
        );
        let score = forest.score(&scaler.transform_all(&test_samples), &test_targets);
        tracing::info!(score, "model trained");

        let fitted = Arc::new(FittedModel {
            metadata: ModelMetadata {
                trained_at: Utc::now(),
                model_type: "RegressionForest".to_string(),
                n_estimators: forest.n_estimators(),
                features: vec![
                    "hour".to_string(),
                    "day_of_week".to_string(),
                    "weather".to_string(),
                ],
                is_trained: true,
            },
            forest,
            scaler,
        });

        // Persist first, then swap, so readers only ever see a fully
        // written artifact. A failed save is logged, not fatal.
        self.save_artifact(&fitted);
        {
            let mut guard = self.artifact.write().unwrap_or_else(|e| e.into_inner());
            *guard = Some(Arc::clone(&fitted));
        }

        (score, fitted)
    }

    fn save_artifact(&self, fitted: &FittedModel) -> bool {
        match self.write_files(fitted) {
            Ok(()) => {
                tracing::info!(dir = %self.model_dir.display(), "model saved");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to save model");
                false
            }
        }
    }

    fn write_files(&self, fitted: &FittedModel) -> Result<(), TrafficError> {
        std::fs::create_dir_all(&self.model_dir)?;
        write_json(&self.model_dir.join(MODEL_FILE), &fitted.forest)?;
        write_json(&self.model_dir.join(SCALER_FILE), &fitted.scaler)?;
        write_json(&self.model_dir.join(MODEL_INFO_FILE), &fitted.metadata)?;
        Ok(())
    }

    fn read_files(&self) -> Result<FittedModel, TrafficError> {
        let forest = read_json(&self.model_dir.join(MODEL_FILE))?;
        let scaler = read_json(&self.model_dir.join(SCALER_FILE))?;
        let metadata = read_json(&self.model_dir.join(MODEL_INFO_FILE))?;
        Ok(FittedModel {
            forest,
            scaler,
            metadata,
        })
    }
}

/// Write JSON through a temp file and rename, so a crash mid-write
/// never leaves a truncated artifact behind.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), TrafficError> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, TrafficError> {
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    fn fast_predictor(dir: &TempDir) -> TrafficPredictor {
        TrafficPredictor::with_training_config(dir.path(), 400, 20)
    }

    #[test]
    fn train_reports_a_usable_score() {
        let dir = TempDir::new().unwrap();
        let predictor = fast_predictor(&dir);
        let score = predictor.train_with_rng(&mut StdRng::seed_from_u64(5));
        assert!(
            score > 0.5,
            "R^2 {score} too low for the synthetic rule set"
        );
        assert_eq!(predictor.state(), ModelState::Trained);
    }

    #[test]
    fn predictions_are_deterministic_for_a_fixed_artifact() {
        let dir = TempDir::new().unwrap();
        let predictor = fast_predictor(&dir);
        predictor.train_with_rng(&mut StdRng::seed_from_u64(5));
        let features = PredictionFeatures::new(8, 1, 0);
        let first = predictor.predict(features);
        for _ in 0..10 {
            assert_eq!(predictor.predict(features), first);
        }
    }

    #[test]
    fn rush_hour_predicts_more_flow_than_night() {
        let dir = TempDir::new().unwrap();
        let predictor = TrafficPredictor::new(dir.path());
        predictor.train_with_rng(&mut StdRng::seed_from_u64(5));
        let rush = predictor.predict(PredictionFeatures::new(8, 1, 0));
        let night = predictor.predict(PredictionFeatures::new(2, 1, 0));
        assert!(rush > night, "rush {rush} not above night {night}");
    }

    #[test]
    fn auto_train_promotes_untrained_model_once() {
        let dir = TempDir::new().unwrap();
        let predictor = Arc::new(fast_predictor(&dir));
        assert_eq!(predictor.state(), ModelState::Untrained);

        let features = PredictionFeatures::new(9, 2, 1);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let predictor = Arc::clone(&predictor);
                thread::spawn(move || predictor.predict(features))
            })
            .collect();
        let results: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(predictor.state(), ModelState::Trained);
        // All concurrent callers observed the same single artifact.
        assert!(results.windows(2).all(|w| w[0] == w[1]));

        // The auto-train also persisted a loadable artifact that
        // reproduces the same predictions.
        let reloaded = fast_predictor(&dir);
        assert_eq!(reloaded.state(), ModelState::Trained);
        assert_eq!(reloaded.predict(features), results[0]);
    }

    #[test]
    fn save_load_round_trip_reproduces_predictions() {
        let dir = TempDir::new().unwrap();
        let predictor = fast_predictor(&dir);
        predictor.train_with_rng(&mut StdRng::seed_from_u64(9));
        assert!(predictor.save());

        let expected: Vec<u32> = (0..24)
            .map(|hour| predictor.predict(PredictionFeatures::new(hour, 3, 2)))
            .collect();

        let reloaded = fast_predictor(&dir);
        assert_eq!(reloaded.state(), ModelState::Trained);
        let actual: Vec<u32> = (0..24)
            .map(|hour| reloaded.predict(PredictionFeatures::new(hour, 3, 2)))
            .collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn malformed_artifact_degrades_to_untrained() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("traffic_model.json"), b"not json").unwrap();
        std::fs::write(dir.path().join("scaler.json"), b"{}").unwrap();
        let predictor = fast_predictor(&dir);
        assert_eq!(predictor.state(), ModelState::Untrained);
        assert!(!predictor.load());
    }

    #[test]
    fn degenerate_training_config_still_trains() {
        let dir = TempDir::new().unwrap();
        let predictor = TrafficPredictor::with_training_config(dir.path(), 0, 0);
        let score = predictor.train_with_rng(&mut StdRng::seed_from_u64(3));
        assert!(score.is_finite());
        assert_eq!(predictor.state(), ModelState::Trained);

        let flow = predictor.predict(PredictionFeatures::new(8, 1, 0));
        assert_eq!(flow, predictor.predict(PredictionFeatures::new(8, 1, 0)));
    }

    #[test]
    fn untrained_save_reports_failure() {
        let dir = TempDir::new().unwrap();
        let predictor = fast_predictor(&dir);
        assert!(!predictor.save());
    }

    #[test]
    fn training_data_follows_the_generative_rules() {
        let mut rng = StdRng::seed_from_u64(21);
        let (samples, targets) = generate_training_data(&mut rng, 2000);
        assert_eq!(samples.len(), 2000);

        let mean_for = |predicate: &dyn Fn(&[f64; 3]) -> bool| -> f64 {
            let mut sum = 0.0;
            let mut count = 0.0;
            for (x, &y) in samples.iter().zip(&targets) {
                if predicate(x) {
                    sum += y;
                    count += 1.0;
                }
            }
            sum / count
        };

        let rush = mean_for(&|x| (7.0..=11.0).contains(&x[0]) || (16.0..=21.0).contains(&x[0]));
        let night = mean_for(&|x| x[0] >= 22.0 || x[0] <= 5.0);
        assert!(rush > night + 100.0, "rush {rush} vs night {night}");
        assert!(targets.iter().all(|&y| y >= 0.0));
    }
}
