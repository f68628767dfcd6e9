//! The entry publishing pipeline: prepare, authenticate, upload, submit.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use flog_api_types::{EntryPayload, UploadRequest};
use tracing::{info, warn};

use crate::client::{CliError, Ctx};
use crate::credentials::{Credentials, load_credentials};
use crate::document::read_document;
use crate::linkcheck::check_links;
use crate::markup::MarkupTransformer;
use crate::references::{MediaFiles, ReferenceMap, rewrite_references};

#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub dir: PathBuf,
    pub remote: bool,
    pub check_links: bool,
    pub timeout: Duration,
}

/// An entry ready to be sent: rendered HTML plus the media it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedEntry {
    pub payload: EntryPayload,
    pub references: ReferenceMap,
    pub files: MediaFiles,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Skipped,
    Stored { files: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub slug: String,
    pub public: bool,
    pub upload: UploadOutcome,
}

/// Read `entry.md` from `dir`, render it and rewrite its media references.
pub fn prepare_entry(dir: &Path) -> Result<PreparedEntry, CliError> {
    let document = read_document(dir)?;
    let markup = MarkupTransformer::new();

    let mut references = ReferenceMap::new();
    let mut files = MediaFiles::new();
    let lead = match &document.lead {
        Some(lead) => {
            let rewritten = rewrite_references(&markup.render(lead), &document.slug, dir)?;
            references.extend(rewritten.references);
            files.extend(rewritten.files);
            rewritten.html
        }
        None => String::new(),
    };
    let content = rewrite_references(&markup.render(&document.content), &document.slug, dir)?;
    references.extend(content.references);
    files.extend(content.files);

    Ok(PreparedEntry {
        payload: EntryPayload {
            slug: document.slug,
            meta: document.meta,
            lead,
            content: content.html,
        },
        references,
        files,
    })
}

/// Base64 file map keyed by the remote file name.
pub fn upload_request(slug: &str, files: &MediaFiles) -> UploadRequest {
    UploadRequest {
        slug: slug.to_string(),
        files: files
            .iter()
            .map(|(name, bytes)| (name.clone(), BASE64.encode(bytes)))
            .collect(),
    }
}

/// Publish the entry in `options.dir`.
///
/// With link checking the entry is first pushed as a draft and every link is
/// fetched; only a clean run publishes it with its authored visibility.
pub async fn publish_entry(options: &PublishOptions) -> Result<PublishSummary, CliError> {
    if !options.check_links {
        return publish_final(options).await;
    }

    let draft = publish_once(options, true).await?;
    let payload = &draft.payload;
    println!("Checking links of {}...", payload.slug);
    let fragments = [payload.lead.as_str(), payload.content.as_str()];
    let checked = check_links(&draft.ctx, &payload.slug, &fragments).await;
    draft.ctx.close().await;
    let problems = checked?;

    if !problems.is_empty() {
        println!(">>> failure: {} broken link(s), entry left as draft", problems.len());
        for problem in &problems {
            println!("  broken: {problem}");
        }
        return Err(CliError::LinkValidation {
            broken: problems.len(),
        });
    }

    println!(">>> success");
    if !payload.meta.is_public() {
        return Ok(draft.summary);
    }
    publish_final(options).await
}

async fn publish_final(options: &PublishOptions) -> Result<PublishSummary, CliError> {
    let run = publish_once(options, false).await?;
    run.ctx.close().await;
    Ok(run.summary)
}

struct PipelineRun {
    summary: PublishSummary,
    /// Payload as authored, before any draft override.
    payload: EntryPayload,
    ctx: Ctx,
}

/// One full pass of the pipeline. `force_draft` overrides `public` to false.
async fn publish_once(options: &PublishOptions, force_draft: bool) -> Result<PipelineRun, CliError> {
    let (_, credentials) = load_credentials(&options.dir)?;
    let prepared = prepare_entry(&options.dir)?;
    let upload = upload_request(&prepared.payload.slug, &prepared.files);

    let mut sent = prepared.payload.clone();
    if force_draft {
        sent.meta.public = Some(false);
    }

    let ctx = Ctx::new(credentials.domain(options.remote), options.timeout)?;
    let summary = match push(&ctx, &credentials, &sent, &upload).await {
        Ok(summary) => summary,
        Err(err) => {
            ctx.close().await;
            return Err(err);
        }
    };
    Ok(PipelineRun {
        summary,
        payload: prepared.payload,
        ctx,
    })
}

async fn push(
    ctx: &Ctx,
    credentials: &Credentials,
    payload: &EntryPayload,
    upload: &UploadRequest,
) -> Result<PublishSummary, CliError> {
    println!("Authenticating as {} at {}...", credentials.username, ctx.base);
    if let Err(err) = ctx.authenticate(&credentials.auth_request()).await {
        println!(">>> failure");
        return Err(err);
    }
    println!(">>> success");

    let upload = if upload.files.is_empty() {
        UploadOutcome::Skipped
    } else {
        println!("Uploading {} file(s)...", upload.files.len());
        let outcome = match ctx.upload(upload).await {
            Ok(envelope) if envelope.success => UploadOutcome::Stored {
                files: upload.files.len(),
            },
            Ok(envelope) => UploadOutcome::Failed {
                reason: envelope
                    .error
                    .unwrap_or_else(|| "server reported failure".to_string()),
            },
            Err(err) => UploadOutcome::Failed {
                reason: err.to_string(),
            },
        };
        match &outcome {
            UploadOutcome::Failed { reason } => {
                warn!(target = "flog_cli::publish", slug = %payload.slug, %reason, "upload failed");
                println!(">>> failure: {reason} (continuing)");
            }
            _ => println!(">>> success"),
        }
        outcome
    };

    let public = payload.meta.is_public();
    println!(
        "Submitting entry {} as {}...",
        payload.slug,
        if public { "public" } else { "draft" }
    );
    let envelope = ctx.submit_entry(payload).await?;
    if !envelope.success {
        let message = envelope
            .error
            .unwrap_or_else(|| "server reported failure".to_string());
        println!(">>> failure: {message}");
        return Err(CliError::EntrySubmission(message));
    }
    println!(">>> success");

    info!(target = "flog_cli::publish", slug = %payload.slug, public, "entry submitted");
    Ok(PublishSummary {
        slug: payload.slug.clone(),
        public,
        upload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn prepare_merges_lead_and_content_references() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("files")).expect("mkdir");
        fs::write(dir.path().join("files/a.png"), b"a").expect("write");
        fs::write(dir.path().join("files/b.png"), b"b").expect("write");
        fs::write(
            dir.path().join("entry.md"),
            "---\nslug: pics\ntitle: Pics\n---\n![a](files/a.png)\n<!--more-->\n![b](files/b.png)\n![a again](files/a.png)\n",
        )
        .expect("write");

        let prepared = prepare_entry(dir.path()).expect("prepare");
        assert_eq!(prepared.payload.slug, "pics");
        assert_eq!(prepared.references.len(), 2);
        assert!(prepared.payload.lead.contains("/static/uploads/entry/pics/a."));
        assert!(prepared.payload.content.contains("/static/uploads/entry/pics/b."));
        assert!(!prepared.payload.content.contains("files/"));

        let upload = upload_request("pics", &prepared.files);
        assert_eq!(upload.files.len(), 2);
        assert!(upload.files.keys().all(|name| name.ends_with(".png")));
        assert!(upload.files.values().any(|data| *data == BASE64.encode(b"a")));
    }

    #[test]
    fn upload_carries_the_bytes_that_were_hashed() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("files")).expect("mkdir");
        fs::write(dir.path().join("files/cat.png"), b"before").expect("write");
        fs::write(
            dir.path().join("entry.md"),
            "---\nslug: cat\n---\n![cat](files/cat.png)\n",
        )
        .expect("write");

        let prepared = prepare_entry(dir.path()).expect("prepare");
        fs::write(dir.path().join("files/cat.png"), b"after").expect("rewrite file");

        let upload = upload_request("cat", &prepared.files);
        let url = &prepared.references["files/cat.png"];
        let (name, data) = upload.files.iter().next().expect("one file");
        assert!(url.ends_with(name.as_str()));
        assert_eq!(*data, BASE64.encode(b"before"));
    }

    #[test]
    fn missing_media_stops_preparation() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("entry.md"),
            "---\nslug: broken\n---\n![gone](files/gone.png)\n",
        )
        .expect("write");
        let err = prepare_entry(dir.path()).expect_err("missing media");
        assert!(matches!(err, CliError::MissingMedia { .. }));
    }
}
