use crate::feed::UrlEntry;

/// Number of entries that do not occur again later in the list.
///
/// Duplicates are resolved towards the last occurrence: for `[a, b, a]` the
/// first `a` is dropped and the count is 2. Entries compare by all of their
/// keys, not just `url`.
pub fn count_unique_keep_last(entries: &[UrlEntry]) -> usize {
    entries
        .iter()
        .enumerate()
        .filter(|(idx, entry)| !entries[idx + 1..].contains(entry))
        .count()
}

/// Print every URL followed by a blank line, then the deduplicated count.
pub fn report(entries: &[UrlEntry]) -> usize {
    for entry in entries {
        println!("{}\n", entry.url);
    }
    let unique = count_unique_keep_last(entries);
    println!("{}", unique);
    unique
}
