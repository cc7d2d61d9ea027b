use super::error::{DatasetError, DatasetResult};
use candle_core::{Device, Tensor};
use image::{imageops::FilterType, DynamicImage, GrayImage, RgbImage};
use std::path::Path;

pub const NORM_MEAN: f32 = 0.5;
pub const NORM_STD: f32 = 0.5;
pub const MASK_THRESHOLD: u8 = 128;

/// Decode by content rather than by extension, some garment folders hold PNG data
/// under `.jpg` names.
pub fn open_image(path: &Path) -> DatasetResult<DynamicImage> {
    let reader = image::io::Reader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| DatasetError::io(path, e))?;
    reader.decode().map_err(|source| DatasetError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode an RGB image at the working resolution, resampling bilinearly if needed.
pub fn load_rgb(path: &Path, width: u32, height: u32) -> DatasetResult<RgbImage> {
    let img = open_image(path)?.to_rgb8();
    if img.dimensions() == (width, height) {
        return Ok(img);
    }
    log::trace!(
        "resize {} from {:?} to {:?}",
        path.display(),
        img.dimensions(),
        (width, height)
    );
    Ok(image::imageops::resize(&img, width, height, FilterType::Triangle))
}

/// Decode a single-channel mask at the working resolution. Nearest sampling
/// keeps hard mask edges.
pub fn load_luma(path: &Path, width: u32, height: u32) -> DatasetResult<GrayImage> {
    let img = open_image(path)?.to_luma8();
    Ok(fit_nearest(img, width, height))
}

pub fn fit_nearest(img: GrayImage, width: u32, height: u32) -> GrayImage {
    if img.dimensions() == (width, height) {
        img
    } else {
        image::imageops::resize(&img, width, height, FilterType::Nearest)
    }
}

/// Interleaved `HWC` bytes to a `CHW` tensor in `[-1, 1]`.
pub fn to_tensor_and_norm(
    raw: &[u8],
    channels: usize,
    width: u32,
    height: u32,
    device: &Device,
) -> DatasetResult<Tensor> {
    let (w, h) = (width as usize, height as usize);
    let plane = w * h;
    let mut data = vec![0f32; channels * plane];
    for (i, px) in raw.chunks_exact(channels).enumerate() {
        for (c, v) in px.iter().enumerate() {
            data[c * plane + i] = (*v as f32 / 255.0 - NORM_MEAN) / NORM_STD;
        }
    }
    Ok(Tensor::from_vec(data, (channels, h, w), device)?)
}

pub fn rgb_to_tensor(img: &RgbImage, device: &Device) -> DatasetResult<Tensor> {
    to_tensor_and_norm(img.as_raw(), 3, img.width(), img.height(), device)
}

pub fn luma_to_tensor(img: &GrayImage, device: &Device) -> DatasetResult<Tensor> {
    to_tensor_and_norm(img.as_raw(), 1, img.width(), img.height(), device)
}

/// Binarize at [`MASK_THRESHOLD`], result is `(1, H, W)` in `[0, 1]`.
pub fn mask_to_tensor(img: &GrayImage, device: &Device) -> DatasetResult<Tensor> {
    let data = img
        .as_raw()
        .iter()
        .map(|v| if *v >= MASK_THRESHOLD { 1f32 } else { 0f32 })
        .collect::<Vec<_>>();
    Ok(Tensor::from_vec(
        data,
        (1, img.height() as usize, img.width() as usize),
        device,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn normalization_maps_byte_range_to_unit_interval() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        let t = rgb_to_tensor(&img, &Device::Cpu).unwrap();
        assert_eq!(t.dims(), &[3, 1, 2]);
        let v = t.to_vec3::<f32>().unwrap();
        for c in 0..3 {
            assert_eq!(v[c][0], vec![-1.0, 1.0]);
        }
    }

    #[test]
    fn channels_are_planar() {
        let img = RgbImage::from_pixel(1, 1, Rgb([255, 0, 255]));
        let v = rgb_to_tensor(&img, &Device::Cpu)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert_eq!(v, vec![1.0, -1.0, 1.0]);
    }

    #[test]
    fn mask_threshold_is_inclusive() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[127u8, 128, 255][x as usize]]));
        let v = mask_to_tensor(&img, &Device::Cpu)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert_eq!(v, vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn load_rgb_resizes_to_working_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        RgbImage::from_pixel(4, 6, Rgb([10, 20, 30])).save(&path).unwrap();
        let img = load_rgb(&path, 8, 12).unwrap();
        assert_eq!(img.dimensions(), (8, 12));
        assert_eq!(img.get_pixel(3, 3), &Rgb([10, 20, 30]));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = open_image(Path::new("/nonexistent/cloth.jpg")).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }
}
