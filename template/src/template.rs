use std::fmt;

use facetriage_store::Identity;

/// Enrolled embeddings of one identity plus the vector used at match time.
#[derive(Clone, PartialEq)]
pub struct Template {
    /// Owner of the template.
    pub identity: Identity,

    /// Enrollment order. Earlier templates win distance ties.
    pub seq: u64,

    /// Embeddings captured at enrollment, in capture order.
    pub embeddings: Vec<Vec<f32>>,

    /// Mean of `embeddings`.
    pub representative: Vec<f32>,
}

impl Template {
    /// Builds a template, deriving the representative vector.
    ///
    /// Callers validate `embeddings` first: non-empty, one dimension.
    pub(crate) fn new(identity: Identity, seq: u64, embeddings: Vec<Vec<f32>>) -> Self {
        let representative = centroid(&embeddings);
        Self {
            identity,
            seq,
            embeddings,
            representative,
        }
    }

    pub fn dim(&self) -> usize {
        self.representative.len()
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("identity", &self.identity)
            .field("seq", &self.seq)
            .field("embeddings", &self.embeddings.len())
            .field("dim", &self.dim())
            .finish()
    }
}

/// Component-wise mean of `vectors`, accumulated in f64.
///
/// Returns an empty vector for empty input.
pub fn centroid(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut sum = vec![0.0f64; first.len()];
    for v in vectors {
        for (acc, &x) in sum.iter_mut().zip(v) {
            *acc += x as f64;
        }
    }
    let n = vectors.len() as f64;
    sum.into_iter().map(|s| (s / n) as f32).collect()
}
