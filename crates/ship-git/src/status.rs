//! `git status --porcelain` parsing

/// One line of porcelain v1 status output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-character `XY` status code
    pub code: String,
    pub path: String,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }
}

/// Parse porcelain v1 output into entries. Renames report the new path.
pub fn parse_porcelain(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let (code, rest) = line.split_at(2);
            let path = rest.trim_start();
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            StatusEntry {
                code: code.to_string(),
                path: path.trim_matches('"').to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_status_is_clean() {
        assert!(parse_porcelain("").is_empty());
        assert!(parse_porcelain("\n").is_empty());
    }

    #[test]
    fn test_parse_mixed_status() {
        let entries = parse_porcelain("M  index.html\nA  README.md\n?? notes.txt\n");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].code, "M ");
        assert_eq!(entries[0].path, "index.html");
        assert_eq!(entries[1].path, "README.md");
        assert!(entries[2].is_untracked());
    }

    #[test]
    fn test_parse_rename() {
        let entries = parse_porcelain("R  old.html -> index.html\n");
        assert_eq!(entries[0].path, "index.html");
    }
}
