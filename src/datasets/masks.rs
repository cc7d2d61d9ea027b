use super::error::{DatasetError, DatasetResult};
use super::imageio::{self, luma_to_tensor};
use candle_core::{Device, Tensor};
use image::{imageops::FilterType, DynamicImage, GrayImage};
use std::path::Path;

/// Face, hair and sunglasses.
pub const HEAD_LABELS: &[u8] = &[1, 2, 4, 13];
/// Upper-body garment regions.
pub const CLOTH_LABELS: &[u8] = &[5, 6, 7];
/// Down/up sampling factor of the body silhouette.
pub const SILHOUETTE_FACTOR: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelSet {
    Ids(&'static [u8]),
    /// Every label except background (0).
    Foreground,
}

impl LabelSet {
    #[inline]
    pub fn contains(self, label: u8) -> bool {
        match self {
            LabelSet::Ids(ids) => ids.contains(&label),
            LabelSet::Foreground => label > 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelGroup {
    Head,
    Cloth,
    Body,
}

impl LabelGroup {
    pub const fn labels(self) -> LabelSet {
        match self {
            LabelGroup::Head => LabelSet::Ids(HEAD_LABELS),
            LabelGroup::Cloth => LabelSet::Ids(CLOTH_LABELS),
            LabelGroup::Body => LabelSet::Foreground,
        }
    }
}

/// Row-major grid of label ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelGrid {
    width: u32,
    height: u32,
    labels: Vec<u8>,
}

impl LabelGrid {
    pub fn new(width: u32, height: u32, labels: Vec<u8>) -> DatasetResult<Self> {
        if labels.len() != (width * height) as usize {
            return Err(DatasetError::Config(format!(
                "label grid of {}x{} needs {} labels, got {}",
                width,
                height,
                width * height,
                labels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            labels,
        })
    }

    pub fn from_image(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            labels: img.into_raw(),
        }
    }

    /// Read a parsing map. PNG maps are decoded without palette expansion so indexed
    /// and 8-bit grey pixels both come back as raw label ids.
    pub fn load(path: &Path, width: u32, height: u32) -> DatasetResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| DatasetError::io(path, e))?;
        let img = if bytes.starts_with(PNG_SIGNATURE) {
            decode_png_labels(path, &bytes)?
        } else {
            match imageio::open_image(path)? {
                DynamicImage::ImageLuma8(img) => img,
                other => {
                    return Err(DatasetError::UnexpectedImageMode {
                        path: path.to_path_buf(),
                        mode: format!("{:?}", other.color()),
                        expected: "L8 or indexed 8-bit",
                    })
                }
            }
        };
        Ok(Self::from_image(imageio::fit_nearest(img, width, height)))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

fn decode_png_labels(path: &Path, bytes: &[u8]) -> DatasetResult<GrayImage> {
    let png_err = |source| DatasetError::Png {
        path: path.to_path_buf(),
        source,
    };
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info().map_err(png_err)?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(png_err)?;
    match (info.color_type, info.bit_depth) {
        (png::ColorType::Indexed | png::ColorType::Grayscale, png::BitDepth::Eight) => {}
        (color, depth) => {
            return Err(DatasetError::UnexpectedImageMode {
                path: path.to_path_buf(),
                mode: format!("{color:?}/{depth:?}"),
                expected: "L8 or indexed 8-bit",
            })
        }
    }
    buf.truncate(info.buffer_size());
    GrayImage::from_raw(info.width, info.height, buf).ok_or_else(|| {
        DatasetError::UnexpectedImageMode {
            path: path.to_path_buf(),
            mode: format!("truncated {}x{} frame", info.width, info.height),
            expected: "L8 or indexed 8-bit",
        }
    })
}

pub fn group_mask(grid: &LabelGrid, set: LabelSet) -> Vec<f32> {
    grid.labels
        .iter()
        .map(|l| if set.contains(*l) { 1.0 } else { 0.0 })
        .collect()
}

/// [`group_mask`] as a `(1, H, W)` tensor.
pub fn group_mask_tensor(grid: &LabelGrid, set: LabelSet, device: &Device) -> DatasetResult<Tensor> {
    Ok(Tensor::from_vec(
        group_mask(grid, set),
        (1, grid.height as usize, grid.width as usize),
        device,
    )?)
}

/// Keep only the head of a `[-1, 1]` image, everything else becomes -1.
pub fn isolate_head(image: &Tensor, grid: &LabelGrid) -> DatasetResult<Tensor> {
    let m = group_mask_tensor(grid, LabelGroup::Head.labels(), image.device())?;
    let fill = m.affine(-1.0, 1.0)?;
    Ok(image.broadcast_mul(&m)?.broadcast_sub(&fill)?)
}

/// Keep only the worn upper cloth of a `[-1, 1]` image, everything else becomes +1.
pub fn isolate_worn_cloth(image: &Tensor, grid: &LabelGrid) -> DatasetResult<Tensor> {
    let m = group_mask_tensor(grid, LabelGroup::Cloth.labels(), image.device())?;
    let fill = m.affine(-1.0, 1.0)?;
    Ok(image.broadcast_mul(&m)?.broadcast_add(&fill)?)
}

/// Blurred body-shape prior: the foreground mask shrunk by [`SILHOUETTE_FACTOR`] and
/// blown back up, both bilinearly.
pub fn silhouette_image(grid: &LabelGrid, width: u32, height: u32) -> GrayImage {
    let body = LabelGroup::Body.labels();
    let mask = GrayImage::from_fn(grid.width, grid.height, |x, y| {
        let l = grid.labels[(y * grid.width + x) as usize];
        image::Luma([if body.contains(l) { 255 } else { 0 }])
    });
    let small = image::imageops::resize(
        &mask,
        (width / SILHOUETTE_FACTOR).max(1),
        (height / SILHOUETTE_FACTOR).max(1),
        FilterType::Triangle,
    );
    image::imageops::resize(&small, width, height, FilterType::Triangle)
}

pub fn body_silhouette(
    grid: &LabelGrid,
    width: u32,
    height: u32,
    device: &Device,
) -> DatasetResult<Tensor> {
    luma_to_tensor(&silhouette_image(grid, width, height), device)
}
