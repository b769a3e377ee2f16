//! Group-size inference from server display names

/// Infers the group-size cap from a server's display name
///
/// Case-insensitive substring checks in a fixed order, first match wins:
///
/// | Name contains | Cap |
/// |---------------|-----|
/// | "quad" | 4 |
/// | "trio" | 3 |
/// | "duo", not "trio" | 2 |
/// | "solo", not "duo", not "trio" | 1 |
///
/// The order is load-bearing: "duo quad" is 4 only because "quad" is
/// checked first.
pub fn infer_max_group(name: &str) -> Option<u8> {
    let name = name.to_lowercase();

    if name.contains("quad") {
        Some(4)
    } else if name.contains("trio") {
        Some(3)
    } else if name.contains("duo") && !name.contains("trio") {
        Some(2)
    } else if name.contains("solo") && !name.contains("duo") && !name.contains("trio") {
        Some(1)
    } else {
        None
    }
}

/// Name inference first, then a source-reported value as the fallback
///
/// Reported values outside 1..=4 are ignored.
pub fn resolve_max_group(name: &str, reported: Option<i64>) -> Option<u8> {
    infer_max_group(name).or_else(|| {
        reported
            .filter(|v| (1..=4).contains(v))
            .map(|v| v as u8)
    })
}
