//! Entry naming: sanitization and collision suffixes.

use std::collections::HashSet;

/// Make a display name safe to use as one archive path component.
///
/// Separators become `_`, and names that would navigate (`.`, `..`) or are
/// empty become `_`, so no entry can escape the archive root.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Hands out unique relative paths within one archive.
///
/// A name already taken in the same directory gets a numeric suffix before
/// its extension: `a.txt`, `a (1).txt`, `a (2).txt`. Files and directories
/// share one namespace so extraction never hits a file/directory clash.
#[derive(Debug, Default)]
pub struct EntryNamer {
    taken: HashSet<String>,
}

impl EntryNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a unique path for `name` inside `dir` (`""` for the root, or a
    /// path ending in `/`).
    pub fn claim(&mut self, dir: &str, name: &str) -> String {
        let name = sanitize_component(name);
        let first = format!("{dir}{name}");
        if self.taken.insert(first.clone()) {
            return first;
        }

        let (stem, ext) = split_extension(&name);
        let mut n = 1usize;
        loop {
            let candidate = format!("{dir}{stem} ({n}){ext}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Split `report.final.pdf` into (`report.final`, `.pdf`). Leading-dot names
/// such as `.env` have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("a.txt"), "a.txt");
        assert_eq!(sanitize_component("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_component("..\\win"), ".._win");
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component("  "), "_");
    }

    #[test]
    fn test_collisions_get_numeric_suffixes() {
        let mut namer = EntryNamer::new();
        assert_eq!(namer.claim("", "a.txt"), "a.txt");
        assert_eq!(namer.claim("", "a.txt"), "a (1).txt");
        assert_eq!(namer.claim("", "a.txt"), "a (2).txt");
        assert_eq!(namer.claim("sub/", "a.txt"), "sub/a.txt");
        assert_eq!(namer.claim("", ".env"), ".env");
        assert_eq!(namer.claim("", ".env"), ".env (1)");
        assert_eq!(namer.claim("", "Makefile"), "Makefile");
        assert_eq!(namer.claim("", "Makefile"), "Makefile (1)");
    }
}
