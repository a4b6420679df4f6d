//! Incremental publish stage.
//!
//! Mirrors the staging tree (`dirs.cdn`) into a bucket, uploading only what
//! changed. Each staged file is published as up to four objects, in order:
//!
//! ```text
//! prefix/css/main.css          raw
//! prefix/css/main.min.css      minified            (minify allowed)
//! prefix/css/main.css.gz       gzipped             (gzip allowed)
//! prefix/css/main.min.css.gz   gzipped minified    (both allowed)
//! ```
//!
//! Every object carries the MD5 of the file's **raw** bytes as `checksum`
//! metadata. Before uploading a variant the stage reads the stored checksum;
//! if it equals the local one the upload is skipped. Derived bytes are only
//! computed for variants that are actually uploaded.
//!
//! The bucket is verified first: if it is missing or unreachable nothing is
//! uploaded. A failed checksum read counts as "no checksum" and the object
//! is uploaded; a failed upload aborts the stage.

use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use super::{BuildEvent, ObjectStatus, Stage, StageContext, StageError, StageReport, io_err, iter_files};
use crate::artifact::Artifact;
use crate::config::CdnConfig;
use crate::filter::ArtifactFilter;
use crate::store::{ObjectStore, PutObject};

pub struct PublishStage<'a> {
    config: &'a CdnConfig,
    root: PathBuf,
    store: Option<&'a dyn ObjectStore>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    uploaded: usize,
    unchanged: usize,
}

impl<'a> PublishStage<'a> {
    pub fn new(
        config: &'a CdnConfig,
        root: impl Into<PathBuf>,
        store: Option<&'a dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            root: root.into(),
            store,
        }
    }

    fn publish_one(
        &self,
        ctx: &StageContext<'_>,
        store: &dyn ObjectStore,
        filter: &ArtifactFilter,
        source: &Path,
    ) -> Result<Tally, StageError> {
        let bucket = &self.config.bucket_name;
        let bytes = fs::read(source).map_err(io_err(source))?;
        let artifact = Artifact::new(self.relative_path(source), bytes, filter, ctx.deriver);
        let fingerprint = artifact.fingerprint();
        let mut tally = Tally::default();

        for variant in artifact.variants() {
            let key = artifact.key(&self.config.object_key_prefix, variant);
            let stored = store.object_fingerprint(bucket, &key).unwrap_or_else(|e| {
                tracing::warn!(%key, error = %e, "checksum lookup failed, uploading");
                None
            });

            if stored.is_some_and(|s| s.eq_ignore_ascii_case(fingerprint)) {
                tracing::debug!(%key, "unchanged");
                tally.unchanged += 1;
                ctx.emit(BuildEvent::ObjectPublished {
                    key,
                    status: ObjectStatus::Unchanged,
                });
                continue;
            }

            let body = artifact
                .bytes(variant)
                .map_err(|source_err| StageError::Derive {
                    path: source.to_path_buf(),
                    source: source_err,
                })?
                .unwrap_or_default();
            store.put_object(
                bucket,
                &PutObject {
                    key: &key,
                    body,
                    content_type: artifact.content_type(),
                    content_encoding: variant.content_encoding(),
                    fingerprint,
                    acl: &self.config.acl,
                },
            )?;
            tracing::debug!(%key, bytes = body.len(), variant = variant.label(), "uploaded");
            tally.uploaded += 1;
            ctx.emit(BuildEvent::ObjectPublished {
                key,
                status: ObjectStatus::Uploaded,
            });
        }
        Ok(tally)
    }
}

impl Stage for PublishStage<'_> {
    fn name(&self) -> &'static str {
        "cdn"
    }

    fn enabled(&self) -> bool {
        self.config.execute
    }

    fn root_path(&self) -> &Path {
        &self.root
    }

    fn run(&self, ctx: &StageContext<'_>) -> Result<StageReport, StageError> {
        let store = self.store.ok_or(StageError::NoStore)?;
        let bucket = &self.config.bucket_name;
        if !store.head_bucket(bucket)? {
            return Err(StageError::BucketMissing(bucket.clone()));
        }
        tracing::info!(%bucket, "bucket verified");

        let filter = ctx.filter.rooted_at(&self.root);
        let files = iter_files(&self.root)?;
        let tallies = files
            .par_iter()
            .map(|source| self.publish_one(ctx, store, &filter, source))
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = StageReport::new(self.name());
        report.files = files.len();
        for tally in tallies {
            report.uploaded += tally.uploaded;
            report.unchanged += tally.unchanged;
        }
        Ok(report)
    }
}
