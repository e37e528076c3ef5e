/// Rounds `size` up to a whole number of `page_size` pages. A zero size still takes
/// one page.
///
/// Fails with [`std::io::ErrorKind::OutOfMemory`] when the rounded size does not fit
/// in `usize`.
pub(crate) fn round_to_pages(size: usize, page_size: usize) -> std::io::Result<usize> {
    assert!(page_size.is_power_of_two());
    size.max(1)
        .checked_next_multiple_of(page_size)
        .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::OutOfMemory))
}
