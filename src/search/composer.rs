//! Batch composition: mutation first, then random fill.

use crate::schema::Sample;

use super::ops::OpResult;

/// The samples one iteration tests, in the order they were produced.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    samples: Vec<Sample>,
    mutated: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Entries derived by mutation. They always come first.
    pub fn mutated_count(&self) -> usize {
        self.mutated
    }

    /// Entries drawn from the Random operation.
    pub fn random_count(&self) -> usize {
        self.samples.len() - self.mutated
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }
}

impl IntoIterator for Batch {
    type Item = Sample;
    type IntoIter = std::vec::IntoIter<Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Fill one batch of `mutated + random` non-empty samples.
///
/// Up to `mutated` mutation draws are attempted first. Each draw asks
/// `history` for two parents; if either comes back empty the pool of top
/// performers is not populated yet, so the remaining draws are skipped.
/// Children that `mutate` declines to produce (empty) are dropped.
///
/// The rest of the batch is then filled from `random`, discarding empty
/// results. There is no attempt cap: `random` must eventually return a
/// non-empty sample or this never returns.
///
/// The first operation error aborts composition and is returned as is.
pub fn compose_batch<H, M, R>(
    mutated: usize,
    random_count: usize,
    mut history: H,
    mut mutate: M,
    mut random: R,
) -> OpResult<Batch>
where
    H: FnMut() -> OpResult<Sample>,
    M: FnMut(&Sample, &Sample) -> OpResult<Sample>,
    R: FnMut() -> OpResult<Sample>,
{
    let target = mutated.saturating_add(random_count);
    let mut samples = Vec::with_capacity(target);

    for _ in 0..mutated {
        let h1 = history()?;
        let h2 = history()?;
        if h1.is_empty() || h2.is_empty() {
            break;
        }

        let child = mutate(&h1, &h2)?;
        if !child.is_empty() {
            samples.push(child);
        }
    }
    let mutated = samples.len();

    while samples.len() < target {
        let sample = random()?;
        if !sample.is_empty() {
            samples.push(sample);
        }
    }

    Ok(Batch { samples, mutated })
}
