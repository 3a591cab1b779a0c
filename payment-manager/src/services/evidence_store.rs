use async_trait::async_trait;
use axum::body::Bytes;
use futures::io::AsyncWriteExt;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::{
    bson::{doc, oid::ObjectId, Bson},
    gridfs::GridFsBucket,
    options::GridFsUploadOptions,
    Database,
};
use service_core::error::AppError;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::io::ReaderStream;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Incoming file bytes. An `Err` item cancels the upload.
pub type ChunkStream<'a> = BoxStream<'a, Result<Bytes, AppError>>;

/// An evidence file on its way out: metadata plus a lazily read body.
pub struct EvidenceDownload {
    pub filename: String,
    pub content_type: String,
    pub length: u64,
    pub body: BoxStream<'static, std::io::Result<Bytes>>,
}

impl std::fmt::Debug for EvidenceDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceDownload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Binary storage for evidence files, keyed by ObjectId.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Writes `chunks` to a new blob as they arrive and returns its id as 24
    /// hex digits. If the stream yields an error nothing is kept and that
    /// error is returned.
    async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        chunks: ChunkStream<'_>,
    ) -> Result<String, AppError>;

    async fn open_download(&self, id: ObjectId) -> Result<Option<EvidenceDownload>, AppError>;
}

/// GridFS bucket `fs`; content type lives in the file's metadata document.
#[derive(Clone)]
pub struct GridFsEvidenceStore {
    bucket: GridFsBucket,
}

impl GridFsEvidenceStore {
    pub fn new(db: &Database) -> Self {
        Self {
            bucket: db.gridfs_bucket(None),
        }
    }
}

#[async_trait]
impl EvidenceStore for GridFsEvidenceStore {
    async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        mut chunks: ChunkStream<'_>,
    ) -> Result<String, AppError> {
        let options = GridFsUploadOptions::builder()
            .metadata(doc! { "content_type": content_type })
            .build();

        let mut upload = self.bucket.open_upload_stream(filename, options);
        while let Some(chunk) = chunks.next().await {
            let written = match chunk {
                Ok(bytes) => upload.write_all(&bytes).await.map_err(|e| {
                    tracing::error!(filename = %filename, error = %e, "GridFS write failed");
                    AppError::from(e)
                }),
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                if let Err(abort) = upload.abort().await {
                    tracing::warn!(filename = %filename, error = %abort, "GridFS abort failed");
                }
                return Err(e);
            }
        }
        upload.close().await.map_err(|e| {
            tracing::error!(filename = %filename, error = %e, "GridFS close failed");
            AppError::from(e)
        })?;

        match upload.id() {
            Bson::ObjectId(id) => Ok(id.to_hex()),
            other => Err(AppError::InternalError(anyhow::anyhow!(
                "GridFS returned a non-ObjectId file id: {}",
                other
            ))),
        }
    }

    async fn open_download(&self, id: ObjectId) -> Result<Option<EvidenceDownload>, AppError> {
        let mut files = self.bucket.find(doc! { "_id": id }, None).await?;
        let Some(file) = files.try_next().await? else {
            return Ok(None);
        };

        let content_type = file
            .metadata
            .as_ref()
            .and_then(|m| m.get_str("content_type").ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let filename = file.filename.clone().unwrap_or_else(|| id.to_hex());

        let stream = self.bucket.open_download_stream(Bson::ObjectId(id)).await?;

        Ok(Some(EvidenceDownload {
            filename,
            content_type,
            length: file.length,
            body: ReaderStream::new(stream.compat()).boxed(),
        }))
    }
}
