//! The four-stage file chain.
//!
//! ```text
//! convert-diagrams ──▶ collect-images ──▶ upload-images ──▶ rewrite-links
//!  name.md → name.converted.md            (ImageUploader)    → name.cos.md
//! ```
//!
//! A single `current_path` pointer is threaded through the stages and moves
//! forward each time a stage writes a new derived file. A stage failure is
//! recorded in [`PipelineContext::errors`] under the stage's name. Only
//! stages that need its output are skipped: upload needs collected images,
//! rewrite needs upload results.

use crate::config::PipelineOptions;
use crate::convert::{convert_diagrams, write_atomic};
use crate::error::{MdSketchError, StageError};
use crate::output::{PipelineContext, PipelineStage};
use crate::paths::derive_cos_path;
use crate::pipeline::images::{collect_local_images, rewrite_image_links, ImageUploader};
use crate::pipeline::input::load_document;
use std::path::PathBuf;
use tracing::{info, warn};

fn record(ctx: &mut PipelineContext, stage: PipelineStage, message: impl Into<String>) {
    let err = StageError::new(stage, message);
    warn!("{err}");
    ctx.errors.push(err);
}

/// Run the enabled stages over `options.path`.
///
/// # Errors
/// Only when the input document itself cannot be read. Everything after
/// that is reported through the returned context.
pub async fn run_pipeline(
    options: &PipelineOptions,
    uploader: Option<&dyn ImageUploader>,
) -> Result<PipelineContext, MdSketchError> {
    load_document(&options.path).await?;
    let mut ctx = PipelineContext::new(options.path.clone());

    // ── Stage 1: convert-diagrams ────────────────────────────────────────
    if options.convert_diagrams {
        match convert_diagrams(&ctx.current_path, &options.render).await {
            Ok(out) => {
                ctx.rendered_images = out.images;
                ctx.block_errors = out.errors;
                ctx.current_path = out.document_path;
            }
            Err(e) => record(&mut ctx, PipelineStage::ConvertDiagrams, e.to_string()),
        }
    }

    if !options.upload_images {
        return Ok(ctx);
    }

    // ── Stage 2: collect-images ──────────────────────────────────────────
    match load_document(&ctx.current_path).await {
        Ok(content) => {
            ctx.collected_images = collect_local_images(&content, &ctx.current_path);
            info!("Collected {} local images", ctx.collected_images.len());
        }
        Err(e) => record(&mut ctx, PipelineStage::CollectImages, e.to_string()),
    }

    // ── Stage 3: upload-images ───────────────────────────────────────────
    let Some(uploader) = uploader else {
        info!("No uploader configured; skipping upload and link rewrite");
        return Ok(ctx);
    };
    if ctx.collected_images.is_empty() {
        info!("No local images to upload");
        return Ok(ctx);
    }
    let uploaded = uploader.upload(&ctx.collected_images).await;
    match uploaded {
        Ok(results) => ctx.upload_results = results,
        Err(e) => {
            record(&mut ctx, PipelineStage::UploadImages, e);
            return Ok(ctx);
        }
    }
    if ctx.upload_results.is_empty() {
        info!("Uploader returned no URLs; leaving links as they are");
        return Ok(ctx);
    }

    // ── Stage 4: rewrite-links ───────────────────────────────────────────
    match rewrite_links(&ctx).await {
        Ok(path) => {
            info!("Rewrote image links → {}", path.display());
            ctx.current_path = path;
        }
        Err(e) => record(&mut ctx, PipelineStage::RewriteLinks, e.to_string()),
    }

    Ok(ctx)
}

async fn rewrite_links(ctx: &PipelineContext) -> Result<PathBuf, MdSketchError> {
    let content = load_document(&ctx.current_path).await?;
    let rewritten = rewrite_image_links(&content, &ctx.current_path, &ctx.upload_results);
    let dest = derive_cos_path(&ctx.current_path);
    write_atomic(&dest, &rewritten).await?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::UploadResult;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct FixedUploader(Result<Vec<UploadResult>, String>);

    impl ImageUploader for FixedUploader {
        fn upload<'a>(
            &'a self,
            _files: &'a [PathBuf],
        ) -> BoxFuture<'a, Result<Vec<UploadResult>, String>> {
            let r = self.0.clone();
            async move { r }.boxed()
        }
    }

    fn doc_with_image() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("pic.png");
        std::fs::write(&img, b"png").unwrap();
        let doc = dir.path().join("post.md");
        std::fs::write(&doc, "Intro\n\n![pic](pic.png)\n").unwrap();
        let img = std::fs::canonicalize(img).unwrap();
        (dir, doc, img)
    }

    fn options(doc: &std::path::Path) -> PipelineOptions {
        PipelineOptions {
            convert_diagrams: true,
            upload_images: true,
            ..PipelineOptions::new(doc)
        }
    }

    #[tokio::test]
    async fn upload_then_rewrite_writes_cos_file() {
        let (dir, doc, img) = doc_with_image();
        let uploader = FixedUploader(Ok(vec![UploadResult {
            local_path: img,
            url: "https://cdn.test/pic.png".into(),
        }]));

        let ctx = run_pipeline(&options(&doc), Some(&uploader)).await.unwrap();
        assert!(ctx.errors.is_empty(), "{:?}", ctx.errors);
        assert_eq!(ctx.original_path, doc);
        assert_eq!(ctx.current_path, dir.path().join("post.cos.md"));
        let out = std::fs::read_to_string(&ctx.current_path).unwrap();
        assert_eq!(out, "Intro\n\n![pic](https://cdn.test/pic.png)\n");
        // Original untouched.
        assert_eq!(std::fs::read_to_string(&doc).unwrap(), "Intro\n\n![pic](pic.png)\n");
    }

    #[tokio::test]
    async fn failed_upload_skips_rewrite() {
        let (_dir, doc, _img) = doc_with_image();
        let uploader = FixedUploader(Err("bucket unreachable".into()));

        let ctx = run_pipeline(&options(&doc), Some(&uploader)).await.unwrap();
        assert!(ctx.stage_failed(PipelineStage::UploadImages));
        assert!(!ctx.stage_failed(PipelineStage::RewriteLinks));
        assert_eq!(ctx.collected_images.len(), 1);
        assert_eq!(ctx.current_path, doc);
    }

    #[tokio::test]
    async fn no_uploader_stops_after_collect() {
        let (_dir, doc, img) = doc_with_image();
        let ctx = run_pipeline(&options(&doc), None).await.unwrap();
        assert_eq!(ctx.collected_images, vec![img]);
        assert!(ctx.upload_results.is_empty());
        assert_eq!(ctx.current_path, doc);
    }

    #[tokio::test]
    async fn missing_input_is_fatal() {
        let opts = PipelineOptions::new("/no/such/doc.md");
        assert!(matches!(
            run_pipeline(&opts, None).await,
            Err(MdSketchError::FileNotFound { .. })
        ));
    }
}
