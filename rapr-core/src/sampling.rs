//! Proportional stratified sampling with deterministic rounding.
//!
//! Allocation is largest-remainder: each stratum gets the floor of its
//! proportional share, and the rounding shortfall is distributed one unit at
//! a time to the strata with the largest fractional remainders. Remainder
//! ties are broken by the stratum's first-encounter order in the input
//! table, which makes the draw deterministic for a fixed input ordering.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Per-stratum record of a completed draw, kept for the audit manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratumCount {
    pub stratum: String,
    pub population: usize,
    pub sampled: usize,
}

/// Draw exactly `n_total` rows, proportionally across strata, reproducibly
/// for a fixed `seed` and input row order.
///
/// Fails if any stratum's population is smaller than its allocation; a
/// silently short sample would be misleading.
pub fn stratified_sample<T: Clone>(
    rows: &[T],
    stratum_of: impl Fn(&T) -> &str,
    n_total: usize,
    seed: u64,
) -> Result<(Vec<T>, Vec<StratumCount>)> {
    if rows.len() < n_total {
        bail!(
            "Population has {} rows, cannot sample {}",
            rows.len(),
            n_total
        );
    }

    // Strata in first-encounter order.
    let mut strata: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let key = stratum_of(row);
        match strata.iter_mut().find(|(name, _)| name.as_str() == key) {
            Some((_, indices)) => indices.push(i),
            None => strata.push((key.to_string(), vec![i])),
        }
    }

    let total = rows.len() as f64;
    let ideal: Vec<f64> = strata
        .iter()
        .map(|(_, indices)| indices.len() as f64 / total * n_total as f64)
        .collect();
    let mut allocated: Vec<usize> = ideal.iter().map(|share| share.floor() as usize).collect();
    let shortfall = n_total - allocated.iter().sum::<usize>();

    // Stable sort keeps first-encounter order for equal remainders.
    let mut by_remainder: Vec<usize> = (0..strata.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let frac_a = ideal[a] - ideal[a].floor();
        let frac_b = ideal[b] - ideal[b].floor();
        frac_b
            .partial_cmp(&frac_a)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for &stratum in by_remainder.iter().take(shortfall) {
        allocated[stratum] += 1;
    }

    for (i, (name, indices)) in strata.iter().enumerate() {
        if indices.len() < allocated[i] {
            bail!(
                "Stratum {} has only {} rows, cannot sample {}",
                name,
                indices.len(),
                allocated[i]
            );
        }
    }

    let mut sampled = Vec::with_capacity(n_total);
    let mut counts = Vec::with_capacity(strata.len());
    for (i, (name, indices)) in strata.iter().enumerate() {
        if allocated[i] > 0 {
            // Fresh RNG per stratum: the draw for one stratum must not
            // depend on how many strata precede it.
            let mut rng = StdRng::seed_from_u64(seed);
            for pick in index::sample(&mut rng, indices.len(), allocated[i]).iter() {
                sampled.push(rows[indices[pick]].clone());
            }
        }
        counts.push(StratumCount {
            stratum: name.clone(),
            population: indices.len(),
            sampled: allocated[i],
        });
    }

    // Presentation-only shuffle: membership is fixed above.
    let mut rng = StdRng::seed_from_u64(seed);
    sampled.shuffle(&mut rng);

    Ok((sampled, counts))
}
