use super::{replace_extension, SamplePaths};
use crate::datasets::error::{DatasetError, DatasetResult};
use crate::datasets::Stage;
use std::path::{Path, PathBuf};

/// Pairs read from a `person garment` list file, assets in fixed companion folders.
#[derive(Debug, Clone)]
pub struct ListFileResolver {
    data_path: PathBuf,
    stage: Stage,
    im_names: Vec<String>,
    c_names: Vec<String>,
}

impl ListFileResolver {
    /// `list_file` holds one whitespace-separated pair per line; samples live under
    /// `data_path` (usually `dataroot/datamode`).
    pub fn new(data_path: impl Into<PathBuf>, list_file: &Path, stage: Stage) -> DatasetResult<Self> {
        if !list_file.is_file() {
            return Err(DatasetError::MissingListFile {
                path: list_file.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(list_file).map_err(|e| DatasetError::io(list_file, e))?;
        let (im_names, c_names) = parse_pairs(list_file, &text)?;
        let data_path = data_path.into();
        log::info!(
            "read {} pairs from {}, samples under {}",
            im_names.len(),
            list_file.display(),
            data_path.display()
        );
        Ok(Self {
            data_path,
            stage,
            im_names,
            c_names,
        })
    }

    pub fn len(&self) -> usize {
        self.im_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.im_names.is_empty()
    }

    pub fn resolve(&self, index: usize) -> DatasetResult<SamplePaths> {
        let (im_name, c_name) = match (self.im_names.get(index), self.c_names.get(index)) {
            (Some(im), Some(c)) => (im, c),
            _ => {
                return Err(DatasetError::IndexOutOfRange {
                    index,
                    len: self.len(),
                })
            }
        };
        let root = &self.data_path;
        Ok(SamplePaths {
            person_name: im_name.clone(),
            person_image: root.join("image").join(im_name),
            segmentation: root.join("image-parse").join(replace_extension(im_name, ".png")),
            keypoints: root
                .join("pose")
                .join(replace_extension(im_name, "_keypoints.json")),
            garment_name: c_name.clone(),
            garment_image: root.join(self.stage.cloth_folder()).join(c_name),
            garment_mask: root.join(self.stage.cloth_mask_folder()).join(c_name),
        })
    }
}

fn parse_pairs(path: &Path, text: &str) -> DatasetResult<(Vec<String>, Vec<String>)> {
    let mut im_names = Vec::new();
    let mut c_names = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        match tokens.as_slice() {
            [] => continue,
            [im, c] => {
                im_names.push(im.to_string());
                c_names.push(c.to_string());
            }
            _ => {
                return Err(DatasetError::Config(format!(
                    "{}:{}: expected `<person> <garment>`, got {:?}",
                    path.display(),
                    lineno + 1,
                    line
                )))
            }
        }
    }
    Ok((im_names, c_names))
}
