use crate::analysis::roster::StudentSubmission;

/// A contiguous slice of the roster sent to the model in one call.
/// Batch 0 is the only one asked for class metrics and narrative.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    pub index: usize,
    pub students: &'a [StudentSubmission],
}

impl Batch<'_> {
    pub fn is_first(&self) -> bool {
        self.index == 0
    }
}

/// Splits `items` into `ceil(len / size)` contiguous, order-preserving groups.
/// Only the last group may be shorter than `size`; a `size` of 0 is treated as 1.
pub fn partition<T>(items: &[T], size: usize) -> Vec<&[T]> {
    items.chunks(size.max(1)).collect()
}

/// Partitions the submissions into indexed batches.
pub fn batches(submissions: &[StudentSubmission], size: usize) -> Vec<Batch<'_>> {
    partition(submissions, size)
        .into_iter()
        .enumerate()
        .map(|(index, students)| Batch { index, students })
        .collect()
}
