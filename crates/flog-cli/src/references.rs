//! Rewrite local `files/...` media references into content-addressed upload URLs.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use flog_api_types::{secure_filename, upload_url};
use lol_html::{RewriteStrSettings, element, rewrite_str};
use sha2::{Digest, Sha256};

use crate::client::CliError;

/// Prefix marking a `src` as a file next to `entry.md`.
pub const LOCAL_FILE_PREFIX: &str = "files/";
const HASH_PREFIX_LEN: usize = 8;
const MEDIA_SELECTOR: &str = "img[src], audio[src], video[src], source[src]";

/// Local reference (as written in the document) to its remote URL.
pub type ReferenceMap = BTreeMap<String, String>;

/// Remote file name to the exact bytes its hash was computed from.
pub type MediaFiles = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenHtml {
    pub html: String,
    pub references: ReferenceMap,
    pub files: MediaFiles,
}

/// First eight hex digits of the SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_PREFIX_LEN);
    hex
}

/// Remote file name for a local reference: `<stem>.<hash><.ext>`.
pub fn remote_filename(local: &str, bytes: &[u8]) -> String {
    let safe = secure_filename(local);
    let safe = if safe.is_empty() { "file".to_string() } else { safe };
    let hash = content_hash(bytes);
    let path = Path::new(&safe);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            format!("{}.{hash}.{}", stem.to_string_lossy(), ext.to_string_lossy())
        }
        _ => format!("{safe}.{hash}"),
    }
}

/// Resolve a `files/...` reference against the entry directory.
///
/// `..` and absolute components are refused so a document cannot pull in files
/// from outside its own tree.
pub fn local_path(base_dir: &Path, reference: &str) -> Result<PathBuf, CliError> {
    let relative = Path::new(reference);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(CliError::Rewrite(format!(
            "reference {reference:?} escapes the entry directory"
        )));
    }
    Ok(base_dir.join(relative))
}

pub fn read_reference(base_dir: &Path, reference: &str) -> Result<Vec<u8>, CliError> {
    let path = local_path(base_dir, reference)?;
    fs::read(&path).map_err(|source| CliError::MissingMedia {
        path: path.display().to_string(),
        source,
    })
}

/// Replace every local media `src` in `html` and report what was replaced.
pub fn rewrite_references(
    html: &str,
    slug: &str,
    base_dir: &Path,
) -> Result<RewrittenHtml, CliError> {
    let references = Rc::new(RefCell::new(ReferenceMap::new()));
    let files = Rc::new(RefCell::new(MediaFiles::new()));
    let error_slot = Rc::new(RefCell::new(None));

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(MEDIA_SELECTOR, {
                let references = Rc::clone(&references);
                let files = Rc::clone(&files);
                let error_slot = Rc::clone(&error_slot);
                move |el| {
                    let Some(src) = el.get_attribute("src") else {
                        return Ok(());
                    };
                    if !src.starts_with(LOCAL_FILE_PREFIX) {
                        return Ok(());
                    }
                    if error_slot.borrow().is_some() {
                        return Ok(());
                    }

                    let known = references.borrow().get(&src).cloned();
                    let remote = match known {
                        Some(remote) => remote,
                        None => match read_reference(base_dir, &src) {
                            Ok(bytes) => {
                                let name = remote_filename(&src, &bytes);
                                let remote = upload_url(slug, &name);
                                references.borrow_mut().insert(src.clone(), remote.clone());
                                files.borrow_mut().insert(name, bytes);
                                remote
                            }
                            Err(err) => {
                                *error_slot.borrow_mut() = Some(err);
                                return Ok(());
                            }
                        },
                    };
                    el.set_attribute("src", &remote)?;
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| CliError::Rewrite(err.to_string()))?;

    if let Some(err) = error_slot.borrow_mut().take() {
        return Err(err);
    }

    let references = references.take();
    let files = files.take();
    Ok(RewrittenHtml {
        html: rewritten,
        references,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_dir(files: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("files")).expect("mkdir");
        for (name, bytes) in files {
            fs::write(dir.path().join("files").join(name), bytes).expect("write");
        }
        dir
    }

    #[test]
    fn rewrites_local_image_to_hashed_upload_url() {
        let dir = entry_dir(&[("cat.png", b"meow")]);
        let out = rewrite_references(
            r#"<p><img src="files/cat.png" alt="cat"></p>"#,
            "hello",
            dir.path(),
        )
        .expect("rewrite");

        let expected = format!("/static/uploads/entry/hello/cat.{}.png", content_hash(b"meow"));
        assert!(out.html.contains(&format!(r#"src="{expected}""#)), "{}", out.html);
        assert_eq!(out.references.get("files/cat.png"), Some(&expected));

        let name = format!("cat.{}.png", content_hash(b"meow"));
        assert_eq!(out.files.get(&name).map(Vec::as_slice), Some(&b"meow"[..]));
    }

    #[test]
    fn leaves_remote_and_non_local_sources_alone() {
        let dir = entry_dir(&[]);
        let html = r#"<img src="https://example.org/a.png"><img src="/static/x.png"><a href="files/doc.pdf">doc</a>"#;
        let out = rewrite_references(html, "hello", dir.path()).expect("rewrite");
        assert_eq!(out.html, html);
        assert!(out.references.is_empty());
    }

    #[test]
    fn covers_audio_video_and_source() {
        let dir = entry_dir(&[("clip.mp4", b"video"), ("song.ogg", b"audio")]);
        let html = r#"<video src="files/clip.mp4"><source src="files/clip.mp4"></video><audio src="files/song.ogg"></audio>"#;
        let out = rewrite_references(html, "media", dir.path()).expect("rewrite");
        assert_eq!(out.references.len(), 2);
        assert!(!out.html.contains("files/"));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = entry_dir(&[]);
        let err = rewrite_references(r#"<img src="files/ghost.png">"#, "hello", dir.path())
            .expect_err("missing file");
        assert!(matches!(err, CliError::MissingMedia { .. }));
    }

    #[test]
    fn parent_components_are_refused() {
        let dir = entry_dir(&[]);
        let err = rewrite_references(r#"<img src="files/../../secret.png">"#, "hello", dir.path())
            .expect_err("escape");
        assert!(matches!(err, CliError::Rewrite(_)));
    }

    #[test]
    fn hash_changes_only_with_content() {
        let url = |bytes: &[u8]| upload_url("s", &remote_filename("files/a.png", bytes));
        let same_a = url(b"bytes");
        let same_b = url(b"bytes");
        let changed = url(b"bytez");
        assert_eq!(same_a, same_b);
        assert_ne!(same_a, changed);
        assert!(changed.starts_with("/static/uploads/entry/s/a."));
        assert!(changed.ends_with(".png"));
    }

    #[test]
    fn names_without_extension_keep_hash_suffix() {
        let name = remote_filename("files/LICENSE", b"text");
        assert_eq!(name, format!("LICENSE.{}", content_hash(b"text")));
        assert_eq!(content_hash(b"text").len(), 8);
    }
}
