//! Parsing of interactive package selections.

/// Parses a reply such as `1,3,5` or `all` against a numbered list.
///
/// # Errors
///
/// Returns a message for replies without numbers or with out-of-range numbers.
pub fn parse_selection<'a>(reply: &str, packages: &[&'a str]) -> Result<Vec<&'a str>, String> {
    let reply = reply.trim().to_ascii_lowercase();
    if reply == "all" {
        return Ok(packages.to_vec());
    }

    let indices: Vec<usize> = reply
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    if indices.is_empty() {
        return Err("enter numbers separated by commas, or `all`".to_owned());
    }

    indices
        .into_iter()
        .map(|index| {
            index
                .checked_sub(1)
                .and_then(|slot| packages.get(slot))
                .copied()
                .ok_or_else(|| format!("invalid number: {index}"))
        })
        .collect()
}
