mod convention;
mod list_file;

pub use convention::ConventionResolver;
pub use list_file::ListFileResolver;

use super::error::{DatasetError, DatasetResult};
use std::path::PathBuf;

/// Everything the example builder reads for one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePaths {
    pub person_name: String,
    pub person_image: PathBuf,
    pub segmentation: PathBuf,
    pub keypoints: PathBuf,
    pub garment_name: String,
    pub garment_image: PathBuf,
    pub garment_mask: PathBuf,
}

pub trait ResolveSample {
    fn len(&self) -> usize;

    fn resolve(&self, index: usize) -> DatasetResult<SamplePaths>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub enum PathResolver {
    ListFile(ListFileResolver),
    Convention(ConventionResolver),
}

impl ResolveSample for PathResolver {
    fn len(&self) -> usize {
        match self {
            PathResolver::ListFile(r) => r.len(),
            PathResolver::Convention(r) => r.len(),
        }
    }

    fn resolve(&self, index: usize) -> DatasetResult<SamplePaths> {
        let len = self.len();
        if index >= len {
            return Err(DatasetError::IndexOutOfRange { index, len });
        }
        let paths = match self {
            PathResolver::ListFile(r) => r.resolve(index),
            PathResolver::Convention(r) => r.resolve(index),
        }?;
        log::debug!("sample {index}: {} / {}", paths.person_name, paths.garment_name);
        Ok(paths)
    }
}

impl From<ListFileResolver> for PathResolver {
    fn from(r: ListFileResolver) -> Self {
        PathResolver::ListFile(r)
    }
}

impl From<ConventionResolver> for PathResolver {
    fn from(r: ConventionResolver) -> Self {
        PathResolver::Convention(r)
    }
}

/// `name` with its extension swapped for `suffix`, e.g. `a.jpg` + `_keypoints.json`.
pub(crate) fn replace_extension(name: &str, suffix: &str) -> String {
    let file_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[file_start..].rfind('.') {
        Some(dot) => format!("{}{}", &name[..file_start + dot], suffix),
        None => format!("{name}{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_replacement() {
        assert_eq!(replace_extension("000001_0.jpg", ".png"), "000001_0.png");
        assert_eq!(
            replace_extension("000001_0.jpg", "_keypoints.json"),
            "000001_0_keypoints.json"
        );
        assert_eq!(replace_extension("dir.v2/frame", ".png"), "dir.v2/frame.png");
        assert_eq!(replace_extension("a.b.png", "_label.png"), "a.b_label.png");
    }
}
