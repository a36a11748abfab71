//! Statistical recall test (spec.md §8): over 1000 random unit vectors of
//! dimension 128, average recall@10 against brute-force exact nearest
//! neighbors must be at least 0.80.

use quartz_vector::{HnswConfig, HnswIndex};

/// A small deterministic LCG, so the test is reproducible without pulling
/// in a random crate dependency just for fixture generation.
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    }

    fn unit_vector(&mut self, dim: usize) -> Vec<f32> {
        let v: Vec<f32> = (0..dim).map(|_| self.next_f32()).collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
}

fn brute_force_top_k(query: &[f32], vectors: &[Vec<f32>], k: usize) -> Vec<usize> {
    let mut distances: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, euclidean(query, v)))
        .collect();
    distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    distances.into_iter().take(k).map(|(i, _)| i).collect()
}

#[test]
fn recall_at_10_over_1000_random_unit_vectors_meets_the_floor() {
    let dim = 128;
    let n = 1000;
    let k = 10;
    let mut rng = Lcg(0x5eed_f00d_cafe_babe);

    let vectors: Vec<Vec<f32>> = (0..n).map(|_| rng.unit_vector(dim)).collect();

    let mut index = HnswIndex::new(HnswConfig::balanced(dim)).unwrap();
    let mut ids = Vec::with_capacity(n);
    for v in &vectors {
        ids.push(index.insert(v, None).unwrap());
    }

    let n_queries = 50;
    let mut total_recall = 0.0;
    for q in 0..n_queries {
        let query = &vectors[q * (n / n_queries)];
        let exact = brute_force_top_k(query, &vectors, k);
        let approx: Vec<_> = index
            .search(query, k)
            .unwrap()
            .iter()
            .map(|r| ids.iter().position(|&id| id == r.id).unwrap())
            .collect();

        let hits = approx.iter().filter(|i| exact.contains(i)).count();
        total_recall += hits as f64 / k as f64;
    }

    let avg_recall = total_recall / n_queries as f64;
    assert!(
        avg_recall >= 0.80,
        "recall@10 should be at least 0.80, got {:.3}",
        avg_recall
    );
}
