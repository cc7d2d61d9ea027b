use super::{replace_extension, SamplePaths};
use crate::datasets::error::{DatasetError, DatasetResult};
use crate::datasets::Stage;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Substring that marks the garment file inside a sequence's garment folder.
pub const GARMENT_MARKER: &str = "cloth";
const MASK_MARKER: &str = "mask";
const LABEL_SUFFIX: &str = "_label";

/// Video-frame layout: `lip_{mode}_frames/{sequence-id}/{frame}.png` with parsing,
/// keypoint and garment folders keyed by the same sequence id.
#[derive(Debug, Clone)]
pub struct ConventionResolver {
    root: PathBuf,
    datamode: String,
    stage: Stage,
    frames: Vec<PathBuf>,
}

impl ConventionResolver {
    pub fn new(root: impl Into<PathBuf>, datamode: &str, stage: Stage) -> DatasetResult<Self> {
        let root = root.into();
        let frames_dir = root.join(format!("lip_{datamode}_frames"));
        if !frames_dir.is_dir() {
            return Err(DatasetError::MissingFramesDir { path: frames_dir });
        }
        let mut frames = Vec::new();
        for entry in WalkDir::new(&frames_dir)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&frames_dir).to_path_buf();
                match e.into_io_error() {
                    Some(source) => DatasetError::Io { path, source },
                    None => DatasetError::Config(format!("cannot walk {}", path.display())),
                }
            })?;
            let is_png = entry.path().extension().map_or(false, |ext| ext == "png");
            if entry.file_type().is_file() && is_png {
                frames.push(entry.into_path());
            }
        }
        if frames.is_empty() {
            log::warn!("no frames found under {}", frames_dir.display());
        } else {
            log::info!("found {} frames under {}", frames.len(), frames_dir.display());
        }
        Ok(Self {
            root,
            datamode: datamode.to_string(),
            stage,
            frames,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn resolve(&self, index: usize) -> DatasetResult<SamplePaths> {
        let frame = self
            .frames
            .get(index)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.len(),
            })?;
        let seq = sequence_id(frame);
        let frame_file = file_name(frame);

        let garment_dir = self.root.join(self.stage.vvt_cloth_folder()).join(&seq);
        let garment_file = find_garment(&garment_dir)?;
        let garment_mask = match self.stage {
            Stage::Gmm => garment_dir.join(replace_extension(
                &garment_file,
                &format!("_{MASK_MARKER}{}", dotted_extension(&garment_file)),
            )),
            Stage::Tom => self.root.join("warp-mask").join(&seq).join(&garment_file),
        };

        let parsing_dir = self
            .root
            .join(format!("lip_{}_frames_parsing", self.datamode))
            .join(&seq);
        let keypoints = self
            .root
            .join(format!("lip_{}_frames_keypoint", self.datamode))
            .join(&seq)
            .join(replace_extension(&frame_file, "_keypoints.json"));

        Ok(SamplePaths {
            person_name: format!("{seq}/{frame_file}"),
            person_image: frame.clone(),
            segmentation: segmentation_path(&parsing_dir, &frame_file)?,
            keypoints,
            garment_name: format!("{seq}/{garment_file}.FOR.{frame_file}"),
            garment_image: garment_dir.join(&garment_file),
            garment_mask,
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Frames are grouped by their parent folder.
fn sequence_id(frame: &Path) -> String {
    frame.parent().map(file_name).unwrap_or_default()
}

fn dotted_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

fn find_garment(dir: &Path) -> DatasetResult<String> {
    let missing = || DatasetError::MissingGarment {
        dir: dir.to_path_buf(),
        marker: GARMENT_MARKER,
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
        Err(e) => return Err(DatasetError::io(dir, e)),
    };
    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DatasetError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains(GARMENT_MARKER) && !name.contains(MASK_MARKER) {
            candidates.push(name);
        }
    }
    candidates.sort();
    candidates.into_iter().next().ok_or_else(missing)
}

/// `{frame}_label.png`, or `{frame}.png` when the labelled name is absent.
fn segmentation_path(parsing_dir: &Path, frame_file: &str) -> DatasetResult<PathBuf> {
    let labelled = parsing_dir.join(replace_extension(frame_file, &format!("{LABEL_SUFFIX}.png")));
    if labelled.is_file() {
        return Ok(labelled);
    }
    let plain = parsing_dir.join(replace_extension(frame_file, ".png"));
    if plain.is_file() {
        log::warn!("no {}, using {}", labelled.display(), plain.display());
        return Ok(plain);
    }
    Err(DatasetError::MissingSegmentation { labelled, plain })
}
