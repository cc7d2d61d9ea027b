use super::error::{DatasetError, DatasetResult};
use super::imageio::{load_luma, load_rgb, mask_to_tensor, rgb_to_tensor};
use super::masks::{body_silhouette, isolate_head, isolate_worn_cloth, LabelGrid};
use super::pose::{read_keypoints, PoseHeatmap};
use super::resolver::{PathResolver, ResolveSample, SamplePaths};
use super::{DatasetOptions, Stage};
use candle_core::{Device, Tensor};
use std::path::PathBuf;

/// One training example. Images are `[-1, 1]`, `cloth_mask` is `[0, 1]`.
#[derive(Debug, Clone)]
pub struct TryOnExample {
    pub cloth_name: String,
    pub im_name: String,
    /// `(3, H, W)` input garment.
    pub cloth: Tensor,
    /// `(1, H, W)`.
    pub cloth_mask: Tensor,
    /// `(3, H, W)` person photograph.
    pub image: Tensor,
    /// `(1 + 3 + J, H, W)` silhouette, head and pose stacked.
    pub agnostic: Tensor,
    /// `(3, H, W)` garment as worn, the supervision target.
    pub parse_cloth: Tensor,
    pub shape: Tensor,
    pub head: Tensor,
    pub pose_image: Tensor,
    /// Only present for the geometric matching stage.
    pub grid_image: Option<Tensor>,
}

impl TryOnExample {
    pub const TENSOR_NAMES: [&'static str; 9] = [
        "cloth",
        "cloth_mask",
        "image",
        "agnostic",
        "parse_cloth",
        "shape",
        "head",
        "pose_image",
        "grid_image",
    ];

    /// Tensors in bundle order, the grid image only when present.
    pub fn tensors(&self) -> Vec<(&'static str, &Tensor)> {
        let all = [
            Some(&self.cloth),
            Some(&self.cloth_mask),
            Some(&self.image),
            Some(&self.agnostic),
            Some(&self.parse_cloth),
            Some(&self.shape),
            Some(&self.head),
            Some(&self.pose_image),
            self.grid_image.as_ref(),
        ];
        Self::TENSOR_NAMES
            .iter()
            .zip(all)
            .filter_map(|(name, t)| t.map(|t| (*name, t)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct TryOnDataset {
    resolver: PathResolver,
    stage: Stage,
    fine_width: u32,
    fine_height: u32,
    radius: u32,
    joints: usize,
    grid_path: PathBuf,
    device: Device,
}

impl TryOnDataset {
    pub fn new(opts: &DatasetOptions, resolver: PathResolver) -> DatasetResult<Self> {
        if opts.fine_width == 0 || opts.fine_height == 0 {
            return Err(DatasetError::Config(format!(
                "working resolution must be non-empty, got {}x{}",
                opts.fine_width, opts.fine_height
            )));
        }
        if resolver.is_empty() {
            log::warn!("dataset is empty");
        }
        Ok(Self {
            resolver,
            stage: opts.stage,
            fine_width: opts.fine_width,
            fine_height: opts.fine_height,
            radius: opts.radius,
            joints: opts.joints,
            grid_path: opts.grid_path.clone(),
            device: Device::Cpu,
        })
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn name(&self) -> &'static str {
        match self.resolver {
            PathResolver::ListFile(_) => "CPDataset",
            PathResolver::Convention(_) => "VVTDataset",
        }
    }

    pub fn len(&self) -> usize {
        self.resolver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolver.is_empty()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn resolve(&self, index: usize) -> DatasetResult<SamplePaths> {
        self.resolver.resolve(index)
    }

    pub fn get(&self, index: usize) -> DatasetResult<TryOnExample> {
        let (w, h) = (self.fine_width, self.fine_height);
        let dev = &self.device;
        let paths = self.resolver.resolve(index)?;

        let cloth = rgb_to_tensor(&load_rgb(&paths.garment_image, w, h)?, dev)?;
        let cloth_mask = mask_to_tensor(&load_luma(&paths.garment_mask, w, h)?, dev)?;

        let image = rgb_to_tensor(&load_rgb(&paths.person_image, w, h)?, dev)?;
        let parse = LabelGrid::load(&paths.segmentation, w, h)?;

        let shape = body_silhouette(&parse, w, h, dev)?;
        let head = isolate_head(&image, &parse)?;
        let parse_cloth = isolate_worn_cloth(&image, &parse)?;

        let (pose_map, pose_image) = self.pose(&paths)?;

        let agnostic = Tensor::cat(&[&shape, &head, &pose_map], 0)?;

        let grid_image = match self.stage {
            Stage::Gmm => Some(rgb_to_tensor(&load_rgb(&self.grid_path, w, h)?, dev)?),
            Stage::Tom => None,
        };

        Ok(TryOnExample {
            cloth_name: paths.garment_name,
            im_name: paths.person_name,
            cloth,
            cloth_mask,
            image,
            agnostic,
            parse_cloth,
            shape,
            head,
            pose_image,
            grid_image,
        })
    }

    fn pose(&self, paths: &SamplePaths) -> DatasetResult<(Tensor, Tensor)> {
        let keypoints = read_keypoints(&paths.keypoints)?;
        if keypoints.len() != self.joints {
            return Err(DatasetError::JointCountMismatch {
                path: paths.keypoints.clone(),
                found: keypoints.len(),
                expected: self.joints,
            });
        }
        PoseHeatmap::build(&keypoints, self.fine_width, self.fine_height, self.radius)
            .to_tensors(&self.device)
    }
}
