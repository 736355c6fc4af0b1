use tracing::debug;
use voxid_vector::{FeatureVector, VectorError};

use crate::rng::SplitRng;

/// Options of one LBG run.
pub(crate) struct LbgOptions {
    pub order: usize,
    pub max_iterations: usize,
    pub perturbation: f64,
    pub seed: u64,
}

/// Trains a codebook of exactly `opts.order` centroids with the
/// Linde-Buzo-Gray splitting algorithm.
///
/// Starts from the global mean and doubles the codebook each round by
/// splitting every centroid into `c + d` and `c - d`, where `d` is a seeded
/// normal perturbation scaled by the per-dimension spread of the data. When
/// the order is not a power of two, the last round only splits the most
/// populated centroids. Every round is followed by k-means refinement.
///
/// `samples` must be non-empty.
pub(crate) fn train_codebook(
    samples: &[FeatureVector],
    opts: &LbgOptions,
) -> Result<Vec<FeatureVector>, VectorError> {
    let Some(mean) = FeatureVector::mean_of(samples)? else {
        return Ok(Vec::new());
    };
    let spread = spread(samples, &mean)?;

    let mut rng = SplitRng::new(opts.seed);
    let mut centroids = vec![mean];
    let mut populations = vec![samples.len()];
    let mut assignments = vec![0usize; samples.len()];
    let mut round = 0usize;

    while centroids.len() < opts.order {
        round += 1;
        let target = (centroids.len() * 2).min(opts.order);
        let to_split = target - centroids.len();

        for idx in most_populated(&populations, to_split) {
            let delta = perturbation(&mut rng, &spread, opts.perturbation);
            let mut lower = centroids[idx].clone();
            lower.subtract(&delta)?;
            centroids[idx].add(&delta)?;
            centroids.push(lower);

            let half = populations[idx] / 2;
            populations[idx] -= half;
            populations.push(half);
        }

        let iterations = refine(
            samples,
            &mut centroids,
            &mut populations,
            &mut assignments,
            opts,
            &mut rng,
            &spread,
        )?;
        debug!(round, size = centroids.len(), iterations, "lbg split round");
    }

    Ok(centroids)
}

/// Index of the centroid closest to `frame`, and the squared distance to it.
/// Ties go to the lowest index.
pub(crate) fn nearest(
    centroids: &[FeatureVector],
    frame: &FeatureVector,
) -> Result<(usize, f64), VectorError> {
    let mut best = (0usize, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = c.distance(frame)?;
        if d < best.1 {
            best = (i, d);
        }
    }
    Ok(best)
}

/// K-means refinement. Stops when no frame changes cluster and no empty
/// cluster had to be re-seeded, or after `max_iterations` passes.
fn refine(
    samples: &[FeatureVector],
    centroids: &mut [FeatureVector],
    populations: &mut [usize],
    assignments: &mut [usize],
    opts: &LbgOptions,
    rng: &mut SplitRng,
    spread: &FeatureVector,
) -> Result<usize, VectorError> {
    let max_iterations = opts.max_iterations.max(1);
    let dim = spread.len();

    for iteration in 0..max_iterations {
        let mut changed = iteration == 0;
        for (frame, slot) in samples.iter().zip(assignments.iter_mut()) {
            let (idx, _) = nearest(centroids, frame)?;
            if *slot != idx {
                *slot = idx;
                changed = true;
            }
        }

        let mut sums = vec![FeatureVector::new(dim); centroids.len()];
        populations.iter_mut().for_each(|p| *p = 0);
        for (frame, &idx) in samples.iter().zip(assignments.iter()) {
            sums[idx].add(frame)?;
            populations[idx] += 1;
        }
        for ((centroid, mut sum), &count) in centroids.iter_mut().zip(sums).zip(populations.iter()) {
            if count > 0 {
                sum.scale(1.0 / count as f64);
                *centroid = sum;
            }
        }

        let reseeded = reseed_empty(centroids, populations, rng, spread, opts.perturbation)?;
        if !changed && !reseeded {
            return Ok(iteration + 1);
        }
    }
    Ok(max_iterations)
}

/// Moves every empty centroid next to the most populated one and splits
/// that cluster between the two. Clusters of a single frame are not split.
fn reseed_empty(
    centroids: &mut [FeatureVector],
    populations: &mut [usize],
    rng: &mut SplitRng,
    spread: &FeatureVector,
    scale: f64,
) -> Result<bool, VectorError> {
    let mut reseeded = false;
    for empty in 0..centroids.len() {
        if populations[empty] > 0 {
            continue;
        }
        let Some(heaviest) = most_populated(populations, 1).into_iter().next() else {
            break;
        };
        if populations[heaviest] < 2 {
            break;
        }

        let delta = perturbation(rng, spread, scale);
        let mut seed = centroids[heaviest].clone();
        seed.subtract(&delta)?;
        centroids[heaviest].add(&delta)?;
        centroids[empty] = seed;

        let half = populations[heaviest] / 2;
        populations[heaviest] -= half;
        populations[empty] = half;
        reseeded = true;
    }
    Ok(reseeded)
}

/// Indices of the `n` largest populations, largest first, ties by index.
fn most_populated(populations: &[usize], n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..populations.len()).collect();
    order.sort_by(|&a, &b| populations[b].cmp(&populations[a]).then(a.cmp(&b)));
    order.truncate(n);
    order
}

fn perturbation(rng: &mut SplitRng, spread: &FeatureVector, scale: f64) -> FeatureVector {
    spread.iter().map(|s| scale * s * rng.normal()).collect()
}

/// Per-dimension standard deviation. Constant dimensions get 1 so that a
/// split still separates the two halves.
fn spread(samples: &[FeatureVector], mean: &FeatureVector) -> Result<FeatureVector, VectorError> {
    let mut var = FeatureVector::new(mean.len());
    for frame in samples {
        let mut diff = frame.clone();
        diff.subtract(mean)?;
        let sq = diff.clone();
        diff.multiply(&sq)?;
        var.add(&diff)?;
    }
    var.scale(1.0 / samples.len() as f64);
    Ok(var
        .iter()
        .map(|v| if *v > 0.0 { v.sqrt() } else { 1.0 })
        .collect())
}
