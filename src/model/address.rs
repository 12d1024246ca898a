//! Address-list parsing for `From`/`To`/`Cc`/`Bcc` and their `X-` name headers.

/// One address as written in a header, before registry resolution.
///
/// # Examples
/// - `"Jane Doe <JANE@x.com>"` → `name = Some("Jane Doe")`, `address = "jane@x.com"`
/// - `"user@example.com"` → `name = None`, `address = "user@example.com"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    /// Display name after cleanup, if any survived.
    pub name: Option<String>,
    /// Lowercased bare address (`user@domain`).
    pub address: String,
}

impl ParsedAddress {
    /// Parse a single address entry.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Last, First\" <user@domain.com>"`
    ///
    /// Returns `None` when the entry holds nothing with an `@` in it.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                let address = normalize_address(&trimmed[open + 1..close]);
                if !address.contains('@') {
                    return None;
                }
                let name = clean_display_name(&trimmed[..open], &address);
                return Some(Self { name, address });
            }
        }

        let address = normalize_address(trimmed);
        if !address.contains('@') || address.contains(char::is_whitespace) {
            return None;
        }
        Some(Self {
            name: None,
            address,
        })
    }

    /// Parse a comma-separated address list.
    ///
    /// A comma only ends an entry once the entry already holds an address, so
    /// unquoted `"Doe, Jane <jane@x.com>"` stays a single entry.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        split_entries(raw, true)
            .iter()
            .filter_map(|entry| Self::parse(entry))
            .collect()
    }
}

/// Lowercase and trim an address, dropping stray quotes and brackets.
pub fn normalize_address(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '<' || c == '>')
        .trim()
        .to_lowercase()
}

/// Split a header value into entries on commas outside quotes and brackets.
///
/// With `require_address`, a comma is also ignored while the current entry
/// has neither an `@` nor a closing `>`.
fn split_entries(raw: &str, require_address: bool) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut has_address = false;

    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '<' if !in_quotes => {
                in_angle = true;
                current.push(ch);
            }
            '>' if !in_quotes => {
                in_angle = false;
                has_address = true;
                current.push(ch);
            }
            '@' if !in_quotes => {
                has_address = true;
                current.push(ch);
            }
            ',' if !in_quotes && !in_angle && (has_address || !require_address) => {
                if !current.trim().is_empty() {
                    entries.push(current.trim().to_string());
                }
                current.clear();
                has_address = false;
            }
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        entries.push(current.trim().to_string());
    }
    entries
}

/// Extract display names from an `X-From`/`X-To`/`X-Cc`/`X-Bcc` value, one
/// per address in the matching header.
///
/// Unbracketed values are ambiguous because `"Lay, Kenneth"` is a single
/// name. When there are exactly two comma fragments per address they are
/// re-paired as `"Last, First"` names. Any other count mismatch yields an
/// empty list so callers fall back to the header's own display names.
pub fn parse_name_list(raw: &str, expected: usize) -> Vec<Option<String>> {
    let bracketed = raw.contains('<');
    let entries = split_entries(raw, bracketed);

    let names: Vec<String> = if entries.len() == expected {
        entries
    } else if bracketed || expected == 0 {
        return Vec::new();
    } else if entries.len() == expected * 2 {
        entries.chunks(2).map(|pair| pair.join(", ")).collect()
    } else {
        return Vec::new();
    };

    names
        .iter()
        .map(|entry| {
            let name_part = match entry.find('<') {
                Some(open) => &entry[..open],
                None => entry.as_str(),
            };
            clean_display_name(name_part, "")
        })
        .collect()
}

/// Clean a display name: strip quotes, rewrite `"Last, First"` as
/// `"First Last"`, and discard it when it is just the address again.
pub fn clean_display_name(raw: &str, address: &str) -> Option<String> {
    let unquoted: String = raw.chars().filter(|&c| c != '"' && c != '\'').collect();
    let unquoted = unquoted.trim();
    if unquoted.is_empty() {
        return None;
    }

    let name = match unquoted.split_once(',') {
        Some((last, first)) if !first.contains(',') => {
            let (last, first) = (last.trim(), first.trim());
            if first.is_empty() {
                last.to_string()
            } else {
                format!("{first} {last}")
            }
        }
        _ => unquoted.to_string(),
    };

    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() || name.eq_ignore_ascii_case(address.trim()) {
        return None;
    }
    Some(name)
}
