//! Shell-safe path normalisation for files written into the sandbox.

/// Characters that are never allowed in a sandbox path.
const FORBIDDEN: &[char] = &[
    '(', ')', '[', ']', '{', '}', '@', '#', '$', '&', '*', '?', '!', '|', ';', '<', '>', '`',
    '\'', '"',
];

/// Strips shell metacharacters, turns spaces into underscores and collapses
/// doubled separators.
#[must_use]
pub fn sanitize_path(path: &str) -> String {
    let mut cleaned: String = path
        .chars()
        .filter(|c| !FORBIDDEN.contains(c))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    while cleaned.contains("__") {
        cleaned = cleaned.replace("__", "_");
    }
    while cleaned.contains("//") {
        cleaned = cleaned.replace("//", "/");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::sanitize_path;

    #[test]
    fn removes_shell_metacharacters() {
        assert_eq!(sanitize_path("app/(auth)/[id]/page.tsx"), "app/auth/id/page.tsx");
        assert_eq!(sanitize_path("a$b&c;d|e.py"), "abcde.py");
    }

    #[test]
    fn replaces_spaces_and_collapses_separators() {
        assert_eq!(sanitize_path("my  docs//read me.md"), "my_docs/read_me.md");
        assert_eq!(sanitize_path("a___b"), "a_b");
    }

    #[test]
    fn leaves_plain_paths_alone() {
        assert_eq!(sanitize_path("backend/main.py"), "backend/main.py");
    }
}
