//! Input sanitization for untrusted upload metadata.

use crate::constants::{FALLBACK_FILE_NAME, MAX_SAFE_FILE_NAME_LEN};

/// Reduce an untrusted file name to something usable as a single path
/// component and object key segment.
///
/// Only the final component is kept (both `/` and `\` count as separators),
/// every character outside `[A-Za-z0-9._-]` becomes `_`, and leading dots are
/// stripped so the result can never be `.`, `..` or a hidden file.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .skip_while(|c| *c == '.')
        .take(MAX_SAFE_FILE_NAME_LEN)
        .collect();

    if sanitized.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_names() {
        assert_eq!(sanitize_file_name("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("my-file_1.mov"), "my-file_1.mov");
    }

    #[test]
    fn strips_directories_and_traversal() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name(".."), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_file_name("..hidden.mp4"), "hidden.mp4");
    }

    #[test]
    fn replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my clip (1).mp4"), "my_clip__1_.mp4");
        assert_eq!(sanitize_file_name("vidéo.mp4"), "vid_o.mp4");
        assert_eq!(sanitize_file_name("a;rm -rf.mp4"), "a_rm_-rf.mp4");
    }

    #[test]
    fn falls_back_when_nothing_is_left() {
        assert_eq!(sanitize_file_name(""), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_file_name("dir/"), FALLBACK_FILE_NAME);
    }

    #[test]
    fn caps_length() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_file_name(&long).len(), MAX_SAFE_FILE_NAME_LEN);
    }
}
