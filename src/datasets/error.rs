use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("invalid dataset configuration: {0}")]
    Config(String),
    #[error("pair list file not found: {path}")]
    MissingListFile { path: PathBuf },
    #[error("frames folder not found: {path}")]
    MissingFramesDir { path: PathBuf },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("png decode error at {path}: {source}")]
    Png {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected image mode {mode} at {path}, expected {expected}")]
    UnexpectedImageMode {
        path: PathBuf,
        mode: String,
        expected: &'static str,
    },
    #[error("malformed keypoint file {path}: {msg}")]
    MalformedKeypoints { path: PathBuf, msg: String },
    #[error("keypoint file {path} holds {found} joints, dataset expects {expected}")]
    JointCountMismatch {
        path: PathBuf,
        found: usize,
        expected: usize,
    },
    #[error("no garment file matching *{marker}* in {dir}")]
    MissingGarment { dir: PathBuf, marker: &'static str },
    #[error("segmentation map missing, tried {labelled} and {plain}")]
    MissingSegmentation { labelled: PathBuf, plain: PathBuf },
    #[error("sample index {index} out of range for dataset of {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot collate an empty batch")]
    EmptyBatch,
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
