//! Remote object store seam.
//!
//! The publish stage talks to the store through [`ObjectStore`], which needs
//! only three operations: verify a bucket, read the checksum stored on an
//! object, and upload an object with its headers and checksum. [`S3Store`]
//! implements them against any S3-compatible endpoint with `rust-s3`.
//!
//! The trait is synchronous so the publish stage can fan out on the rayon
//! pool; `S3Store` drives its async client on a private tokio runtime.

use s3::creds::Credentials;
use s3::{Bucket, Region};
use thiserror::Error;
use tokio::runtime::Runtime;

use crate::config::CdnConfig;

/// User-metadata key holding an object's content checksum.
pub const CHECKSUM_METADATA_KEY: &str = "checksum";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unsupported object store service {0:?} (supported: s3)")]
    UnsupportedService(String),
    #[error("object store client error: {0}")]
    Client(String),
    #[error("request for {target} failed: {message}")]
    Request { target: String, message: String },
    #[error("request for {target} returned HTTP {status}")]
    Status { target: String, status: u16 },
}

/// One object upload.
#[derive(Debug, Clone, Copy)]
pub struct PutObject<'a> {
    pub key: &'a str,
    pub body: &'a [u8],
    pub content_type: &'a str,
    /// Empty for uncompressed bodies.
    pub content_encoding: &'a str,
    /// Stored as the object's checksum metadata.
    pub fingerprint: &'a str,
    /// Canned ACL; empty sends none.
    pub acl: &'a str,
}

/// Remote content store.
pub trait ObjectStore: Sync {
    /// Whether `bucket` exists and is reachable with the configured identity.
    fn head_bucket(&self, bucket: &str) -> Result<bool, StoreError>;

    /// Checksum stored on `key`, or `None` if the object or its checksum is
    /// absent.
    fn object_fingerprint(&self, bucket: &str, key: &str) -> Result<Option<String>, StoreError>;

    fn put_object(&self, bucket: &str, object: &PutObject<'_>) -> Result<(), StoreError>;
}

/// S3-compatible store.
pub struct S3Store {
    region: Region,
    credentials: Credentials,
    path_style: bool,
    runtime: Runtime,
}

impl S3Store {
    pub fn new(config: &CdnConfig) -> Result<Self, StoreError> {
        if !config.service_name.is_empty() && !config.service_name.eq_ignore_ascii_case("s3") {
            return Err(StoreError::UnsupportedService(config.service_name.clone()));
        }
        let region_name = if config.region_name.is_empty() {
            "us-east-1".to_string()
        } else {
            config.region_name.clone()
        };
        let path_style = !config.endpoint.is_empty();
        let region = if path_style {
            Region::Custom {
                region: region_name,
                endpoint: config.endpoint.clone(),
            }
        } else {
            region_name
                .parse::<Region>()
                .map_err(|e| StoreError::Client(e.to_string()))?
        };

        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let access = non_empty(&config.aws_access_key);
        let secret = non_empty(&config.aws_secret_access_key);
        let credentials = Credentials::new(access.as_deref(), secret.as_deref(), None, None, None)
            .map_err(|e| StoreError::Client(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Client(e.to_string()))?;

        Ok(Self {
            region,
            credentials,
            path_style,
            runtime,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, StoreError> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| StoreError::Client(e.to_string()))?;
        Ok(if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

impl ObjectStore for S3Store {
    fn head_bucket(&self, bucket: &str) -> Result<bool, StoreError> {
        let client = self.bucket(bucket)?;
        let result = self.runtime.block_on(client.list_page(
            String::new(),
            None,
            None,
            None,
            Some(1),
        ));
        match result {
            Ok((_, status)) if is_success(status) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, status)) => Err(StoreError::Status {
                target: bucket.to_string(),
                status,
            }),
            Err(e) => Err(StoreError::Request {
                target: bucket.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn object_fingerprint(&self, bucket: &str, key: &str) -> Result<Option<String>, StoreError> {
        let client = self.bucket(bucket)?;
        let (head, status) = self
            .runtime
            .block_on(client.head_object(key))
            .map_err(|e| StoreError::Request {
                target: key.to_string(),
                message: e.to_string(),
            })?;
        if status == 404 {
            return Ok(None);
        }
        if !is_success(status) {
            return Err(StoreError::Status {
                target: key.to_string(),
                status,
            });
        }
        Ok(head.metadata.and_then(|meta| {
            meta.into_iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(CHECKSUM_METADATA_KEY))
                .map(|(_, v)| v)
        }))
    }

    fn put_object(&self, bucket: &str, object: &PutObject<'_>) -> Result<(), StoreError> {
        let mut client = self.bucket(bucket)?;
        if !object.content_encoding.is_empty() {
            client.add_header("content-encoding", object.content_encoding);
        }
        if !object.acl.is_empty() {
            client.add_header("x-amz-acl", object.acl);
        }
        client.add_header(
            &format!("x-amz-meta-{CHECKSUM_METADATA_KEY}"),
            object.fingerprint,
        );
        let response = self
            .runtime
            .block_on(client.put_object_with_content_type(
                object.key,
                object.body,
                object.content_type,
            ))
            .map_err(|e| StoreError::Request {
                target: object.key.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status_code();
        if !is_success(status) {
            return Err(StoreError::Status {
                target: object.key.to_string(),
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// In-memory store that records every call.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockStore {
        pub buckets: HashSet<String>,
        pub objects: Mutex<HashMap<String, StoredObject>>,
        /// Keys whose checksum fetch fails.
        pub failing_fetches: HashSet<String>,
        /// Keys whose upload fails.
        pub failing_puts: HashSet<String>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct StoredObject {
        pub body: Vec<u8>,
        pub content_type: String,
        pub content_encoding: String,
        pub fingerprint: String,
        pub acl: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        HeadBucket(String),
        Fetch(String),
        Put(String),
    }

    impl MockStore {
        pub fn with_bucket(name: &str) -> Self {
            Self {
                buckets: HashSet::from([name.to_string()]),
                ..Self::default()
            }
        }

        pub fn insert(&self, key: &str, body: &[u8], fingerprint: &str) {
            self.objects.lock().unwrap().insert(
                key.to_string(),
                StoredObject {
                    body: body.to_vec(),
                    content_type: String::new(),
                    content_encoding: String::new(),
                    fingerprint: fingerprint.to_string(),
                    acl: String::new(),
                },
            );
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Uploaded keys, sorted.
        pub fn puts(&self) -> Vec<String> {
            let mut keys: Vec<String> = self
                .get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Put(key) => Some(key),
                    _ => None,
                })
                .collect();
            keys.sort();
            keys
        }

        pub fn object(&self, key: &str) -> Option<StoredObject> {
            self.objects.lock().unwrap().get(key).cloned()
        }
    }

    impl ObjectStore for MockStore {
        fn head_bucket(&self, bucket: &str) -> Result<bool, StoreError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::HeadBucket(bucket.to_string()));
            Ok(self.buckets.contains(bucket))
        }

        fn object_fingerprint(&self, _bucket: &str, key: &str) -> Result<Option<String>, StoreError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Fetch(key.to_string()));
            if self.failing_fetches.contains(key) {
                return Err(StoreError::Status {
                    target: key.to_string(),
                    status: 500,
                });
            }
            Ok(self
                .objects
                .lock()
                .unwrap()
                .get(key)
                .map(|o| o.fingerprint.clone()))
        }

        fn put_object(&self, _bucket: &str, object: &PutObject<'_>) -> Result<(), StoreError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Put(object.key.to_string()));
            if self.failing_puts.contains(object.key) {
                return Err(StoreError::Status {
                    target: object.key.to_string(),
                    status: 503,
                });
            }
            self.objects.lock().unwrap().insert(
                object.key.to_string(),
                StoredObject {
                    body: object.body.to_vec(),
                    content_type: object.content_type.to_string(),
                    content_encoding: object.content_encoding.to_string(),
                    fingerprint: object.fingerprint.to_string(),
                    acl: object.acl.to_string(),
                },
            );
            Ok(())
        }
    }

    #[test]
    fn mock_records_operations() {
        let store = MockStore::with_bucket("cdn");
        assert!(store.head_bucket("cdn").unwrap());
        assert!(!store.head_bucket("other").unwrap());
        assert_eq!(store.object_fingerprint("cdn", "a.css").unwrap(), None);

        store
            .put_object(
                "cdn",
                &PutObject {
                    key: "a.css",
                    body: b"a{}",
                    content_type: "text/css",
                    content_encoding: "",
                    fingerprint: "abc",
                    acl: "public-read",
                },
            )
            .unwrap();
        assert_eq!(
            store.object_fingerprint("cdn", "a.css").unwrap().as_deref(),
            Some("abc")
        );
        assert_eq!(store.puts(), vec!["a.css"]);
        assert_eq!(store.get_operations().len(), 5);
    }

    #[test]
    fn s3_store_rejects_unknown_service() {
        let config = CdnConfig {
            service_name: "gcs".into(),
            ..CdnConfig::default()
        };
        assert!(matches!(
            S3Store::new(&config),
            Err(StoreError::UnsupportedService(_))
        ));
    }

    #[test]
    fn s3_store_builds_for_custom_endpoint() {
        let config = CdnConfig {
            endpoint: "http://127.0.0.1:9000".into(),
            aws_access_key: "minio".into(),
            aws_secret_access_key: "minio123".into(),
            ..CdnConfig::default()
        };
        let store = S3Store::new(&config).unwrap();
        assert!(store.path_style);
        assert!(store.bucket("site-assets").is_ok());
    }
}
