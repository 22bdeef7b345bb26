//! Centroid-based partitioning
//!
//! K-means via Lloyd's iteration with multiple seeded restarts. Each restart
//! runs an explicit state machine:
//!
//! ```text
//! Init ──▶ Assign ──▶ Update ──▶ Done
//!             ▲          │
//!             └──────────┘  (labels changed or a cluster was repaired,
//!                            and the partition differs from the last update)
//! ```
//!
//! - **Init**: k-means++ seeding (probability proportional to squared distance)
//! - **Assign**: each point to its nearest centroid, lowest index on ties
//! - **Update**: centroids become member means; an empty cluster takes the
//!   point farthest from its own centroid (from a cluster with >1 member)
//!
//! The restart with the lowest inertia wins; earlier restarts win ties.

use crate::error::ComputeError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default number of clusters
pub const DEFAULT_N_CLUSTERS: usize = 3;

/// Default random seed
pub const DEFAULT_SEED: u64 = 42;

/// Default number of independent restarts
pub const DEFAULT_N_INIT: usize = 10;

/// Default iteration cap per restart
pub const DEFAULT_MAX_ITER: usize = 300;

/// Configuration for k-means partitioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KMeansConfig {
    /// Number of clusters (K)
    pub n_clusters: usize,
    /// Seed for centroid initialization
    pub seed: u64,
    /// Independent restarts
    pub n_init: usize,
    /// Iteration cap per restart
    pub max_iter: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: DEFAULT_N_CLUSTERS,
            seed: DEFAULT_SEED,
            n_init: DEFAULT_N_INIT,
            max_iter: DEFAULT_MAX_ITER,
        }
    }
}

impl KMeansConfig {
    /// Create a config for `n_clusters` with default seed, restarts and cap
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
}

/// Result of partitioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// Cluster label per input row
    pub labels: Vec<usize>,
    /// Final centroids in the input (standardized) space
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances to assigned centroids
    pub inertia: f64,
    /// Iterations run by the winning restart
    pub n_iter: usize,
    /// Index of the winning restart
    pub best_restart: usize,
    /// Inertia of every restart, in run order
    pub restart_inertias: Vec<f64>,
}

impl Partition {
    /// Nearest centroid for a new point, lowest index on ties
    pub fn predict(&self, point: &[f64]) -> usize {
        nearest_centroid(point, &self.centroids)
    }

    /// Member count per cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            if label < sizes.len() {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

/// K-means partitioner
pub struct KMeans {
    config: KMeansConfig,
}

impl KMeans {
    pub fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Partition rows into `n_clusters` groups.
    ///
    /// Fails with [`ComputeError::InvalidClusterCount`] if K is 0 or exceeds
    /// the number of rows, and with [`ComputeError::DimensionMismatch`] on a
    /// ragged matrix.
    pub fn fit(&self, data: &[Vec<f64>]) -> Result<Partition, ComputeError> {
        let k = self.config.n_clusters;
        if k < 1 || k > data.len() {
            return Err(ComputeError::InvalidClusterCount {
                requested: k,
                users: data.len(),
            });
        }

        let width = data[0].len();
        if let Some(row) = data.iter().find(|row| row.len() != width) {
            return Err(ComputeError::DimensionMismatch {
                expected: width,
                found: row.len(),
            });
        }

        let n_init = self.config.n_init.max(1);
        let max_iter = self.config.max_iter.max(1);
        let mut seeds = ChaCha8Rng::seed_from_u64(self.config.seed);

        let mut restart_inertias = Vec::with_capacity(n_init);
        let mut best: Option<(usize, RestartResult)> = None;

        for restart in 0..n_init {
            let mut rng = ChaCha8Rng::seed_from_u64(seeds.random::<u64>());
            let result = LloydRun::new(data, k).run(&mut rng, max_iter);
            debug!(
                restart,
                inertia = result.inertia,
                n_iter = result.n_iter,
                "k-means restart finished"
            );

            restart_inertias.push(result.inertia);
            let improves = match &best {
                Some((_, current)) => result.inertia < current.inertia,
                None => true,
            };
            if improves {
                best = Some((restart, result));
            }
        }

        let (best_restart, result) = best.ok_or(ComputeError::InvalidClusterCount {
            requested: k,
            users: data.len(),
        })?;

        Ok(Partition {
            labels: result.labels,
            centroids: result.centroids,
            inertia: result.inertia,
            n_iter: result.n_iter,
            best_restart,
            restart_inertias,
        })
    }
}

/// States of a single Lloyd restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LloydState {
    Init,
    Assign,
    Update { changed: bool },
    Done,
}

struct RestartResult {
    labels: Vec<usize>,
    centroids: Vec<Vec<f64>>,
    inertia: f64,
    n_iter: usize,
}

/// Marker for a point that has not been assigned yet
const UNASSIGNED: usize = usize::MAX;

struct LloydRun<'a> {
    data: &'a [Vec<f64>],
    k: usize,
    centroids: Vec<Vec<f64>>,
    labels: Vec<usize>,
    n_iter: usize,
}

impl<'a> LloydRun<'a> {
    fn new(data: &'a [Vec<f64>], k: usize) -> Self {
        Self {
            data,
            k,
            centroids: Vec::new(),
            labels: vec![UNASSIGNED; data.len()],
            n_iter: 0,
        }
    }

    fn run<R: Rng>(mut self, rng: &mut R, max_iter: usize) -> RestartResult {
        let mut state = LloydState::Init;
        // Labels after the previous update, for spotting a repair that keeps undoing itself
        let mut previous: Option<Vec<usize>> = None;

        loop {
            state = match state {
                LloydState::Init => {
                    self.centroids = init_plus_plus(self.data, self.k, rng);
                    LloydState::Assign
                }
                LloydState::Assign => LloydState::Update {
                    changed: self.assign(),
                },
                LloydState::Update { changed } => {
                    let repaired = self.update();
                    self.n_iter += 1;
                    if !changed && !repaired {
                        LloydState::Done
                    } else if previous.as_deref() == Some(self.labels.as_slice()) {
                        debug!(n_iter = self.n_iter, "partition unchanged since previous update");
                        LloydState::Done
                    } else if self.n_iter >= max_iter {
                        warn!(max_iter, "k-means reached iteration cap before converging");
                        LloydState::Done
                    } else {
                        previous = Some(self.labels.clone());
                        LloydState::Assign
                    }
                }
                LloydState::Done => break,
            };
        }

        let inertia = self.inertia();
        RestartResult {
            labels: self.labels,
            centroids: self.centroids,
            inertia,
            n_iter: self.n_iter,
        }
    }

    /// Assign every point to its nearest centroid; true if any label changed
    fn assign(&mut self) -> bool {
        let mut changed = false;
        for (label, point) in self.labels.iter_mut().zip(self.data) {
            let nearest = nearest_centroid(point, &self.centroids);
            if *label != nearest {
                *label = nearest;
                changed = true;
            }
        }
        changed
    }

    /// Repair empty clusters and recompute centroids; true if any repair ran
    fn update(&mut self) -> bool {
        let mut counts = vec![0usize; self.k];
        for &label in &self.labels {
            counts[label] += 1;
        }

        let mut repaired = false;
        for cluster in 0..self.k {
            if counts[cluster] > 0 {
                continue;
            }

            let donor = self
                .labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| counts[label] > 1)
                .map(|(i, &label)| (i, squared_distance(&self.data[i], &self.centroids[label])))
                .fold(None, |best: Option<(usize, f64)>, (i, dist)| match best {
                    Some((_, best_dist)) if best_dist >= dist => best,
                    _ => Some((i, dist)),
                });

            if let Some((point, dist)) = donor {
                debug!(cluster, point, dist, "empty cluster reseeded with farthest point");
                counts[self.labels[point]] -= 1;
                counts[cluster] = 1;
                self.labels[point] = cluster;
                self.centroids[cluster] = self.data[point].clone();
                repaired = true;
            }
        }

        let width = self.data.first().map_or(0, Vec::len);
        let mut sums = vec![vec![0.0; width]; self.k];
        for (point, &label) in self.data.iter().zip(&self.labels) {
            for (sum, value) in sums[label].iter_mut().zip(point) {
                *sum += value;
            }
        }
        for (cluster, sum) in sums.into_iter().enumerate() {
            if counts[cluster] > 0 {
                let n = counts[cluster] as f64;
                self.centroids[cluster] = sum.into_iter().map(|s| s / n).collect();
            }
        }

        repaired
    }

    fn inertia(&self) -> f64 {
        self.data
            .iter()
            .zip(&self.labels)
            .map(|(point, &label)| squared_distance(point, &self.centroids[label]))
            .sum()
    }
}

/// K-means++ seeding: first centroid uniform, each further centroid drawn with
/// probability proportional to squared distance from the nearest chosen one
fn init_plus_plus<R: Rng>(data: &[Vec<f64>], k: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let n = data.len();
    let first = rng.random_range(0..n);
    let mut centroids = vec![data[first].clone()];
    let mut closest: Vec<f64> = data
        .iter()
        .map(|point| squared_distance(point, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();

        let chosen = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            closest
                .iter()
                .position(|&d| {
                    cumulative += d;
                    target < cumulative
                })
                .or_else(|| closest.iter().rposition(|&d| d > 0.0))
                .unwrap_or(n - 1)
        } else {
            // All points coincide with chosen centroids
            rng.random_range(0..n)
        };

        let centroid = data[chosen].clone();
        for (dist, point) in closest.iter_mut().zip(data) {
            *dist = dist.min(squared_distance(point, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (idx, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best_dist {
            best = idx;
            best_dist = dist;
        }
    }
    best
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
