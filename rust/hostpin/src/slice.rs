/// Resolves `slice(start, end)` offsets against a buffer of `len` bytes.
///
/// Negative offsets count back from the end of the buffer (`-3` is `len - 3`).
/// Both offsets are then clamped into `[0, len]`, and an `end` before `start`
/// collapses to an empty range at `start`. The result always satisfies
/// `start <= end <= len`, so slicing never fails on its offsets.
pub fn clamp_slice_args(len: usize, start: i64, end: i64) -> (usize, usize) {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let resolve = |offset: i64| {
        let offset = if offset < 0 {
            len.saturating_add(offset)
        } else {
            offset
        };
        offset.clamp(0, len)
    };
    let start = resolve(start);
    let end = resolve(end).max(start);
    (start as usize, end as usize)
}
