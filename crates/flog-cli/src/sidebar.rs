//! Publish `sidebar.yaml`: every module rendered and sent as one replacement.

use std::fs;
use std::path::Path;

use flog_api_types::{SidebarModule, SidebarRequest};
use tracing::info;

use crate::client::{CliError, Ctx};
use crate::credentials::load_credentials;
use crate::markup::MarkupTransformer;
use crate::publish::PublishOptions;

pub const SIDEBAR_FILE: &str = "sidebar.yaml";

/// Load `sidebar.yaml` and render each module's text to HTML.
pub fn load_sidebar(dir: &Path) -> Result<Vec<SidebarModule>, CliError> {
    let path = dir.join(SIDEBAR_FILE);
    let raw = fs::read_to_string(&path).map_err(|source| CliError::InputFile {
        path: path.display().to_string(),
        source,
    })?;
    let modules: Vec<SidebarModule> = serde_yaml_ng::from_str(&raw)
        .map_err(|err| CliError::MalformedDocument(format!("{SIDEBAR_FILE}: {err}")))?;

    let markup = MarkupTransformer::new();
    Ok(modules
        .into_iter()
        .map(|module| SidebarModule {
            text: markup.render(&module.text),
            ..module
        })
        .collect())
}

/// Replace the server's sidebar with the modules in `options.dir`.
pub async fn publish_sidebar(options: &PublishOptions) -> Result<usize, CliError> {
    let (_, credentials) = load_credentials(&options.dir)?;
    let modules = load_sidebar(&options.dir)?;
    let count = modules.len();

    let ctx = Ctx::new(credentials.domain(options.remote), options.timeout)?;
    println!("Authenticating as {} at {}...", credentials.username, ctx.base);
    if let Err(err) = ctx.authenticate(&credentials.auth_request()).await {
        println!(">>> failure");
        return Err(err);
    }
    println!(">>> success");

    println!("Submitting {count} sidebar module(s)...");
    let submitted = ctx.submit_sidebar(&SidebarRequest { modules }).await;
    ctx.close().await;
    let envelope = submitted?;
    if !envelope.success {
        let message = envelope
            .error
            .unwrap_or_else(|| "server reported failure".to_string());
        println!(">>> failure: {message}");
        return Err(CliError::SidebarSubmission(message));
    }
    println!(">>> success");

    info!(target = "flog_cli::sidebar", modules = count, "sidebar submitted");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_module_text_and_keeps_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(SIDEBAR_FILE),
            "- title: About\n  text: I write *things*.\n  visible: true\n- title: Links\n  text: \"[home](/)\"\n  index: 7\n",
        )
        .expect("write");

        let modules = load_sidebar(dir.path()).expect("load");
        assert_eq!(modules.len(), 2);
        assert!(modules[0].text.contains("<em>things</em>"));
        assert_eq!(modules[0].visible, Some(true));
        assert_eq!(modules[1].visible, None);
        assert_eq!(modules[1].index, Some(7));
        assert!(modules[1].text.contains(r#"<a href="/">home</a>"#));
    }

    #[test]
    fn missing_sidebar_file_is_an_input_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_sidebar(dir.path()).expect_err("missing");
        assert!(matches!(err, CliError::InputFile { .. }));
    }
}
