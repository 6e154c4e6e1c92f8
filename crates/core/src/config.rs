use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{LeakError, Result};
use crate::series::TimeWindow;
use crate::time::parse_timestamp;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str) -> Option<T> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

impl Config {
    /// Build config from defaults plus environment overrides (call
    /// `load_dotenv()` first). Profile is read from `AQUAGUARD_PROFILE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a TOML file (if given), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str::<Config>(&raw)
                    .map_err(|e| LeakError::Config(format!("{}: {e}", path.display())))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        let profile = env_or("AQUAGUARD_PROFILE", &self.profile).to_uppercase();
        let p = profile.as_str();
        self.data.apply_env(p);
        self.detector.apply_env(p);
        self.profile = profile;
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        let d = &self.detector;
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  data:          dir={}, flow_source={}", self.data.data_dir.display(), self.data.flow_source);
        tracing::info!(
            "  calibration:   {} .. {}",
            self.data.calibration_start.as_deref().unwrap_or("(auto)"),
            self.data.calibration_end.as_deref().unwrap_or("(auto)")
        );
        tracing::info!("  residual:      learner={:?}, trees={}, depth={}", d.residual.learner, d.residual.n_estimators, d.residual.max_depth);
        tracing::info!("  cusum:         delta={}, c_thr={}, est_length={}h", d.cusum.delta, d.cusum.c_thr, d.cusum.est_length_hours);
        tracing::info!("  gnn:           enabled={}, window={}/{}, summary={:?}", d.gnn.enabled, d.gnn.window_size, d.gnn.stride, d.gnn.summary);
        tracing::info!("  triangulation: top_k={}, w_gnn={}, w_ent={}", d.triangulation.top_k, d.triangulation.w_gnn, d.triangulation.w_ent);
    }
}

// ── Data locations ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_pressures_file")]
    pub pressures_file: String,
    #[serde(default = "default_flows_file")]
    pub flows_file: String,
    #[serde(default)]
    pub edges_file: Option<PathBuf>,
    #[serde(default)]
    pub coordinates_file: Option<PathBuf>,
    #[serde(default)]
    pub inp_file: Option<PathBuf>,
    #[serde(default)]
    pub ground_truth_file: Option<PathBuf>,
    /// Flow column used as the network source.
    #[serde(default = "default_flow_source")]
    pub flow_source: String,
    #[serde(default)]
    pub calibration_start: Option<String>,
    #[serde(default)]
    pub calibration_end: Option<String>,
    /// Reference localization error to report improvement against.
    #[serde(default)]
    pub baseline_error: Option<f64>,
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_pressures_file() -> String { "Pressures.csv".to_string() }
fn default_flows_file() -> String { "Flows.csv".to_string() }
fn default_flow_source() -> String { "PUMP_1".to_string() }

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            pressures_file: default_pressures_file(),
            flows_file: default_flows_file(),
            edges_file: None,
            coordinates_file: None,
            inp_file: None,
            ground_truth_file: None,
            flow_source: default_flow_source(),
            calibration_start: None,
            calibration_end: None,
            baseline_error: None,
        }
    }
}

impl DataConfig {
    fn apply_env(&mut self, p: &str) {
        if let Some(v) = profiled_env_opt(p, "AQUAGUARD_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = profiled_env_opt(p, "AQUAGUARD_FLOW_SOURCE") {
            self.flow_source = v;
        }
        if let Some(v) = profiled_env_opt(p, "AQUAGUARD_CALIBRATION_START") {
            self.calibration_start = Some(v);
        }
        if let Some(v) = profiled_env_opt(p, "AQUAGUARD_CALIBRATION_END") {
            self.calibration_end = Some(v);
        }
        if let Some(v) = profiled_env_opt(p, "AQUAGUARD_GROUND_TRUTH") {
            self.ground_truth_file = Some(PathBuf::from(v));
        }
    }

    pub fn pressures_path(&self) -> PathBuf {
        self.data_dir.join(&self.pressures_file)
    }

    pub fn flows_path(&self) -> PathBuf {
        self.data_dir.join(&self.flows_file)
    }

    /// Explicit calibration window, if both ends are configured.
    pub fn calibration_window(&self) -> Result<Option<TimeWindow>> {
        let (Some(start), Some(end)) = (&self.calibration_start, &self.calibration_end) else {
            return Ok(None);
        };
        let parse = |raw: &str| {
            parse_timestamp(raw)
                .ok_or_else(|| LeakError::Config(format!("invalid calibration timestamp: {raw}")))
        };
        let window = TimeWindow::new(parse(start)?, parse(end)?);
        if window.end < window.start {
            return Err(LeakError::Config(format!("calibration window {window} is reversed")));
        }
        Ok(Some(window))
    }
}

// ── Detector ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub residual: ResidualConfig,
    #[serde(default)]
    pub cusum: CusumConfig,
    #[serde(default)]
    pub gnn: GnnConfig,
    #[serde(default)]
    pub triangulation: TriangulationConfig,
}

impl DetectorConfig {
    fn apply_env(&mut self, p: &str) {
        if let Some(v) = profiled_env_opt(p, "AQUAGUARD_LEARNER") {
            match v.to_lowercase().as_str() {
                "forest" | "random_forest" => self.residual.learner = Learner::Forest,
                "linear" => self.residual.learner = Learner::Linear,
                other => tracing::warn!(learner = %other, "Unknown learner, keeping {:?}", self.residual.learner),
            }
        }
        if let Some(v) = profiled_env_parse(p, "AQUAGUARD_CUSUM_DELTA") {
            self.cusum.delta = v;
        }
        if let Some(v) = profiled_env_parse(p, "AQUAGUARD_CUSUM_THRESHOLD") {
            self.cusum.c_thr = v;
        }
        if let Some(v) = profiled_env_parse(p, "AQUAGUARD_GNN_ENABLED") {
            self.gnn.enabled = v;
        }
        if let Some(v) = profiled_env_parse(p, "AQUAGUARD_GNN_EPOCHS") {
            self.gnn.epochs = v;
        }
        if let Some(v) = profiled_env_parse(p, "AQUAGUARD_W_GNN") {
            self.triangulation.w_gnn = v;
        }
        if let Some(v) = profiled_env_parse(p, "AQUAGUARD_W_ENT") {
            self.triangulation.w_ent = v;
        }
    }
}

/// Regression learner used for the pairwise sensor models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Learner {
    /// Bagged regression trees.
    Forest,
    /// Ordinary least squares.
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualConfig {
    #[serde(default = "default_learner")]
    pub learner: Learner,
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Guard added to the reference pressure in the flow/pressure ratio.
    #[serde(default = "default_ratio_epsilon")]
    pub ratio_epsilon: f64,
}

fn default_learner() -> Learner { Learner::Forest }
fn default_n_estimators() -> usize { 100 }
fn default_max_depth() -> usize { 5 }
fn default_min_samples_split() -> usize { 2 }
fn default_seed() -> u64 { 42 }
fn default_ratio_epsilon() -> f64 { 1e-6 }

impl Default for ResidualConfig {
    fn default() -> Self {
        Self {
            learner: default_learner(),
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            seed: default_seed(),
            ratio_epsilon: default_ratio_epsilon(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CusumConfig {
    /// Allowance multiplier: K = delta / 2 * std.
    #[serde(default = "default_delta")]
    pub delta: f64,
    /// Threshold multiplier: H = c_thr * std.
    #[serde(default = "default_c_thr")]
    pub c_thr: f64,
    /// Length of the baseline estimation period after the first non-zero sample.
    #[serde(default = "default_est_length_hours")]
    pub est_length_hours: i64,
}

fn default_delta() -> f64 { 4.0 }
fn default_c_thr() -> f64 { 3.0 }
fn default_est_length_hours() -> i64 { 72 }

impl CusumConfig {
    pub fn est_length(&self) -> Duration {
        Duration::hours(self.est_length_hours)
    }
}

impl Default for CusumConfig {
    fn default() -> Self {
        Self {
            delta: default_delta(),
            c_thr: default_c_thr(),
            est_length_hours: default_est_length_hours(),
        }
    }
}

/// How a pressure window is summarized into a per-node feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSummaryKind {
    /// The raw window samples.
    RawSequence,
    /// Mean, max, min and standard deviation of the window.
    RollingStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnnConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_stride")]
    pub stride: usize,
    #[serde(default = "default_summary")]
    pub summary: WindowSummaryKind,
    #[serde(default = "default_hidden_dim")]
    pub hidden_dim: usize,
    #[serde(default = "default_heads")]
    pub heads: usize,
    #[serde(default = "default_num_layers")]
    pub num_layers: usize,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_patience")]
    pub patience: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_weight_decay")]
    pub weight_decay: f64,
    /// Maximum global gradient L2 norm; 0 disables clipping.
    #[serde(default = "default_grad_clip")]
    pub grad_clip: f64,
    #[serde(default = "default_val_fraction")]
    pub val_fraction: f64,
    /// History searched for the inference window ending at an onset.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_true() -> bool { true }
fn default_window_size() -> usize { 120 }
fn default_stride() -> usize { 10 }
fn default_summary() -> WindowSummaryKind { WindowSummaryKind::RollingStats }
fn default_hidden_dim() -> usize { 32 }
fn default_heads() -> usize { 4 }
fn default_num_layers() -> usize { 4 }
fn default_epochs() -> usize { 30 }
fn default_patience() -> usize { 5 }
fn default_batch_size() -> usize { 256 }
fn default_learning_rate() -> f64 { 0.01 }
fn default_weight_decay() -> f64 { 1e-4 }
fn default_grad_clip() -> f64 { 1.0 }
fn default_val_fraction() -> f64 { 0.2 }
fn default_lookback_hours() -> i64 { 20 }

impl GnnConfig {
    pub fn lookback(&self) -> Duration {
        Duration::hours(self.lookback_hours)
    }
}

impl Default for GnnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_size: default_window_size(),
            stride: default_stride(),
            summary: default_summary(),
            hidden_dim: default_hidden_dim(),
            heads: default_heads(),
            num_layers: default_num_layers(),
            epochs: default_epochs(),
            patience: default_patience(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            weight_decay: default_weight_decay(),
            grad_clip: default_grad_clip(),
            val_fraction: default_val_fraction(),
            lookback_hours: default_lookback_hours(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangulationConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Blend coefficient of the scaled GNN reconstruction error.
    #[serde(default = "default_w_gnn")]
    pub w_gnn: f64,
    /// Blend coefficient of the scaled entropy score.
    #[serde(default = "default_w_ent")]
    pub w_ent: f64,
    /// Entropy is only computed on windows longer than this.
    #[serde(default = "default_min_entropy_samples")]
    pub min_entropy_samples: usize,
    #[serde(default = "default_permutation_order")]
    pub permutation_order: usize,
    #[serde(default = "default_permutation_delay")]
    pub permutation_delay: usize,
    /// Keep every n-th sample before permutation entropy.
    #[serde(default = "default_permutation_decimation")]
    pub permutation_decimation: usize,
}

fn default_top_k() -> usize { 3 }
fn default_w_gnn() -> f64 { 0.5 }
fn default_w_ent() -> f64 { 2.0 }
fn default_min_entropy_samples() -> usize { 10 }
fn default_permutation_order() -> usize { 3 }
fn default_permutation_delay() -> usize { 1 }
fn default_permutation_decimation() -> usize { 3 }

impl Default for TriangulationConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            w_gnn: default_w_gnn(),
            w_ent: default_w_ent(),
            min_entropy_samples: default_min_entropy_samples(),
            permutation_order: default_permutation_order(),
            permutation_delay: default_permutation_delay(),
            permutation_decimation: default_permutation_decimation(),
        }
    }
}
