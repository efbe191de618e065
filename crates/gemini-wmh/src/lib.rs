//! # gemini-wmh
//!
//! **Tier 3 (Weighted MinHash + LSH Banding)**
//!
//! Turns a `FeatureBag` into a Weighted MinHash `Sketch` via Consistent
//! Weighted Sampling (spec §4.A/§4.D), and partitions a sketch into LSH
//! `Band`s for hashtable lookup (spec §4.E). Parameter generation and
//! sketching are pure functions of `(seed, FeatureBag, WmhParams)` — the
//! only source of randomness is the seeded PRNG used once to build the
//! parameter tables.
//!
//! ## What belongs here
//! * `generate_params`, `sketch`, `bands`
//!
//! ## What does NOT belong here
//! * Persisting bands into a hashtable (`gemini-index`)
//! * Community detection over colliding bands (`gemini-report`)

use gemini_math::Mt19937;
use gemini_types::{Band, FeatureBag, RowMajorTable, Sketch, WmhParams};

/// Seed the reference CWS parameter tables are generated with (spec §4.A).
pub const REFERENCE_SEED: u32 = 1;

/// Build the `(rs, ln_cs, betas)` parameter tables for Consistent Weighted
/// Sampling (spec §4.A "WMH Parameters").
///
/// Draws are taken from a single `Mt19937::seeded(seed)` stream in a fixed
/// order — all of `rs`, then all of `ln_cs`, then all of `betas`, each
/// filled row-major (`s` outer, `i` inner) — so that two calls with the
/// same `(seed, sample_size, k)` always produce byte-identical tables. The
/// order itself is arbitrary; only its stability matters.
#[must_use]
pub fn generate_params(seed: u32, sample_size: usize, k: usize) -> WmhParams {
    let mut rng = Mt19937::seeded(seed);
    let rs = RowMajorTable::filled_with(sample_size, k, |_, _| rng.next_gamma2());
    let ln_cs = RowMajorTable::filled_with(sample_size, k, |_, _| rng.next_gamma2());
    let betas = RowMajorTable::filled_with(sample_size, k, |_, _| rng.next_f64());
    WmhParams {
        sample_size,
        k,
        rs,
        ln_cs,
        betas,
    }
}

/// Compute the Weighted MinHash sketch of `bag` under `params` (spec §4.D).
///
/// For each of `params.sample_size` independent samples, this finds the
/// vocabulary index minimizing `ln_a = ln_cs[s][i] - r*(t_i - beta) - r`
/// over every non-zero feature index `i`, where
/// `t_i = floor(ln(weight[i]) / r + beta)`. Iterating non-zero indices in
/// ascending order and keeping a strict `<` minimum naturally resolves ties
/// toward the lowest index, matching spec §4.D's tie-break rule without
/// extra bookkeeping.
///
/// An empty bag (spec edge case) produces `sample_size` all-zero rows.
#[must_use]
pub fn sketch(bag: &FeatureBag, params: &WmhParams) -> Sketch {
    let features: Vec<(usize, u32)> = bag.nonzero().collect();
    if features.is_empty() {
        return Sketch {
            rows: vec![(0, 0); params.sample_size],
        };
    }

    let mut rows = Vec::with_capacity(params.sample_size);
    for s in 0..params.sample_size {
        let rs_row = params.rs.row(s);
        let ln_cs_row = params.ln_cs.row(s);
        let betas_row = params.betas.row(s);

        let mut best_ln_a = f64::INFINITY;
        let mut best_i = 0usize;
        let mut best_t = 0i64;

        for &(i, weight) in &features {
            let r = rs_row[i];
            let beta = betas_row[i];
            let ln_w = f64::from(weight).ln();
            let t_i = (ln_w / r + beta).floor();
            let ln_y = r * (t_i - beta);
            let ln_a = ln_cs_row[i] - ln_y - r;

            if ln_a < best_ln_a {
                best_ln_a = ln_a;
                best_i = i;
                best_t = t_i as i64;
            }
        }

        rows.push((best_i as u64, gemini_math::i64_to_u64_bits(best_t)));
    }

    Sketch { rows }
}

/// Partition a sketch into `htnum` bands of `band_size` consecutive rows
/// each (spec §4.E "Banding"), packing each band's rows big-endian.
///
/// Panics if `sketch.rows.len() != htnum * band_size` — the caller is
/// expected to pass a sketch produced with matching `SimilarityParams`.
#[must_use]
pub fn bands(sketch: &Sketch, htnum: usize, band_size: usize) -> Vec<Band> {
    assert_eq!(
        sketch.rows.len(),
        htnum * band_size,
        "sketch row count must equal htnum * band_size"
    );

    sketch
        .rows
        .chunks(band_size)
        .enumerate()
        .map(|(h, chunk)| Band {
            hashtable_id: h as u32,
            bytes: gemini_math::pack_rows_be(chunk),
        })
        .collect()
}
