use std::fmt;

use casefile_types::{CaseId, SuspectId};
use chrono::{DateTime, Utc};
use rand::Rng;

const TOKEN_LEN: usize = 8;
const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const FALLBACK_NAME: &str = "file";

/// The record an attachment belongs to, which decides its path prefix.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentOwner {
    CaseExhibit(CaseId),
    SuspectProfile(SuspectId),
}

impl AttachmentOwner {
    /// Path prefix, always ending in `/`.
    pub fn prefix(&self) -> String {
        match self {
            Self::CaseExhibit(id) => format!("cases/{id}/exhibits/"),
            Self::SuspectProfile(id) => format!("suspects/{id}/profileImage/"),
        }
    }

    /// True when `path` lies directly under this owner's prefix.
    pub fn owns(&self, path: &str) -> bool {
        path.strip_prefix(&self.prefix())
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/') && !contains_path_traversal(rest))
    }
}

impl fmt::Display for AttachmentOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaseExhibit(id) => write!(f, "case {id}"),
            Self::SuspectProfile(id) => write!(f, "suspect {id}"),
        }
    }
}

/// Reduce an original file name to a single safe path segment.
///
/// Whitespace becomes `_`; separators, control characters and leading dots
/// are dropped. An empty result becomes `file`.
pub fn sanitize_file_name(name: &str) -> String {
    let mapped: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control() && *c != '/' && *c != '\\')
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    let stripped = mapped.trim_start_matches('.');
    if stripped.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        stripped.to_string()
    }
}

/// Checks if a path string contains `..` segments.
pub fn contains_path_traversal(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}

/// Build a storage path from explicit parts.
pub fn storage_path_with(owner: &AttachmentOwner, name: &str, at: DateTime<Utc>, token: &str) -> String {
    format!(
        "{}{}-{}-{}",
        owner.prefix(),
        at.timestamp_millis(),
        token,
        sanitize_file_name(name)
    )
}

/// Build a fresh, collision-resistant storage path for `name`.
pub fn generate_storage_path(owner: &AttachmentOwner, name: &str) -> String {
    storage_path_with(owner, name, Utc::now(), &random_token())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn case_owner() -> AttachmentOwner {
        AttachmentOwner::CaseExhibit(CaseId::new("c1").unwrap())
    }

    #[test]
    fn prefixes() {
        assert_eq!(case_owner().prefix(), "cases/c1/exhibits/");
        let owner = AttachmentOwner::SuspectProfile(SuspectId::new("s1").unwrap());
        assert_eq!(owner.prefix(), "suspects/s1/profileImage/");
    }

    #[test]
    fn sanitize_replaces_whitespace() {
        assert_eq!(sanitize_file_name("crime scene 1.jpg"), "crime_scene_1.jpg");
    }

    #[test]
    fn sanitize_drops_separators_and_dots() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name("a\\b"), "ab");
    }

    #[test]
    fn sanitize_empty_falls_back() {
        assert_eq!(sanitize_file_name("   "), "file");
        assert_eq!(sanitize_file_name("..."), "file");
    }

    #[test]
    fn explicit_path_layout() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let path = storage_path_with(&case_owner(), "my photo.png", at, "abc12345");
        assert_eq!(path, "cases/c1/exhibits/1700000000123-abc12345-my_photo.png");
    }

    #[test]
    fn generated_paths_do_not_collide() {
        let a = generate_storage_path(&case_owner(), "same.jpg");
        let b = generate_storage_path(&case_owner(), "same.jpg");
        assert_ne!(a, b);
        assert!(case_owner().owns(&a));
    }

    #[test]
    fn owns_rejects_foreign_and_nested_paths() {
        let owner = case_owner();
        assert!(owner.owns("cases/c1/exhibits/1-x-a.jpg"));
        assert!(!owner.owns("cases/c2/exhibits/1-x-a.jpg"));
        assert!(!owner.owns("cases/c1/exhibits/"));
        assert!(!owner.owns("cases/c1/exhibits/sub/a.jpg"));
        assert!(!owner.owns("cases/c1/exhibits/.."));
    }

    #[test]
    fn traversal_detection() {
        assert!(contains_path_traversal("a/../b"));
        assert!(contains_path_traversal(".."));
        assert!(!contains_path_traversal("a/..b/c"));
    }
}
