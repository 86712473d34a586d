// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Path helpers. Paths are absolute, `/`-separated and carry no trailing
//! slash except for the root itself.

/// Strip trailing slashes; an empty path is the root.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// The root is its own parent.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// First path segment of `key` below `parent`, and whether further segments
/// follow (in which case the child is a directory).
///
/// `child_name("/a", "/a/b/c")` is `("b", true)`.
pub fn child_name<'a>(parent: &str, key: &'a str) -> (&'a str, bool) {
    let below = if parent == "/" {
        key.strip_prefix('/')
    } else {
        key.strip_prefix(parent).and_then(|rest| rest.strip_prefix('/'))
    };
    let rest = below.unwrap_or(key);
    match rest.split_once('/') {
        Some((name, _)) => (name, true),
        None => (rest, false),
    }
}

/// `path` equals `root` or lies below it.
pub fn is_within(path: &str, root: &str) -> bool {
    if root == "/" {
        return true;
    }
    match path.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Replace the leading `from` of `path` with `to`.
pub fn rebase(path: &str, from: &str, to: &str) -> Option<String> {
    if !is_within(path, from) {
        return None;
    }
    let rest = if from == "/" {
        path.strip_prefix('/')?
    } else {
        path.strip_prefix(from)?.trim_start_matches('/')
    };
    if rest.is_empty() {
        return Some(to.to_string());
    }
    // Keep the trailing slash of a directory marker.
    Some(join(to, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let cases = [
            ("/", "/"),
            ("", "/"),
            ("///", "/"),
            ("/a/", "/a"),
            ("/a/b//", "/a/b"),
            ("/a/b", "/a/b"),
            ("a", "/a"),
        ];
        for (input, want) in cases {
            assert_eq!(normalize(input), want, "normalize({input:?})");
        }
    }

    #[test]
    fn test_child_name() {
        let cases = [
            ("/a/b/c", "/a/b/c/d", "d", false),
            ("/", "/a", "a", false),
            ("/", "/a/b", "a", true),
            ("/a", "/a/b", "b", false),
            ("/a", "/a/b/c", "b", true),
            ("/a", "/a/b/", "b", true),
        ];
        for (parent, key, name, is_dir) in cases {
            assert_eq!(child_name(parent, key), (name, is_dir), "{parent} {key}");
        }
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("/a", "/a"));
        assert!(is_within("/a/b", "/a"));
        assert!(!is_within("/ab", "/a"));
        assert!(!is_within("/b", "/a"));
        assert!(is_within("/anything", "/"));
    }

    #[test]
    fn test_rebase() {
        assert_eq!(rebase("/a/1", "/a", "/b").as_deref(), Some("/b/1"));
        assert_eq!(rebase("/a/c/", "/a", "/b").as_deref(), Some("/b/c/"));
        assert_eq!(rebase("/a", "/a", "/b").as_deref(), Some("/b"));
        assert_eq!(rebase("/ab/1", "/a", "/b"), None);
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("/"), "/");
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("/a/b"), "/a");
        assert_eq!(parent("/a/b/c"), "/a/b");
    }
}
