use super::error::{DatasetError, DatasetResult};
use super::example::{TryOnDataset, TryOnExample};
use candle_core::Tensor;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::Arc;

/// Examples collated along a new leading batch dimension.
#[derive(Debug, Clone)]
pub struct TryOnBatch {
    pub indices: Vec<usize>,
    pub cloth_name: Vec<String>,
    pub im_name: Vec<String>,
    pub cloth: Tensor,
    pub cloth_mask: Tensor,
    pub image: Tensor,
    pub agnostic: Tensor,
    pub parse_cloth: Tensor,
    pub shape: Tensor,
    pub head: Tensor,
    pub pose_image: Tensor,
    pub grid_image: Option<Tensor>,
}

fn stack_field(
    examples: &[TryOnExample],
    f: impl Fn(&TryOnExample) -> &Tensor,
) -> DatasetResult<Tensor> {
    Ok(Tensor::stack(&examples.iter().map(f).collect::<Vec<_>>(), 0)?)
}

impl TryOnBatch {
    pub fn collate(indices: Vec<usize>, examples: Vec<TryOnExample>) -> DatasetResult<Self> {
        if examples.is_empty() {
            return Err(DatasetError::EmptyBatch);
        }
        let grid_image = examples
            .iter()
            .map(|e| e.grid_image.as_ref())
            .collect::<Option<Vec<_>>>()
            .map(|grids| Tensor::stack(&grids, 0))
            .transpose()?;
        Ok(Self {
            cloth: stack_field(&examples, |e| &e.cloth)?,
            cloth_mask: stack_field(&examples, |e| &e.cloth_mask)?,
            image: stack_field(&examples, |e| &e.image)?,
            agnostic: stack_field(&examples, |e| &e.agnostic)?,
            parse_cloth: stack_field(&examples, |e| &e.parse_cloth)?,
            shape: stack_field(&examples, |e| &e.shape)?,
            head: stack_field(&examples, |e| &e.head)?,
            pose_image: stack_field(&examples, |e| &e.pose_image)?,
            grid_image,
            cloth_name: examples.iter().map(|e| e.cloth_name.clone()).collect(),
            im_name: examples.iter().map(|e| e.im_name.clone()).collect(),
            indices,
        })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Restartable, optionally shuffled batch source over a [`TryOnDataset`].
pub struct TryOnDataloader {
    dataset: Arc<TryOnDataset>,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
    pool: rayon::ThreadPool,
    epoch: u64,
    order: Vec<usize>,
    cursor: usize,
}

impl TryOnDataloader {
    pub fn new(
        dataset: Arc<TryOnDataset>,
        batch_size: usize,
        workers: usize,
        shuffle: bool,
        seed: u64,
    ) -> DatasetResult<Self> {
        if batch_size == 0 {
            return Err(DatasetError::Config("batch size must be at least 1".into()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("vton-loader-{i}"))
            .build()
            .map_err(|e| DatasetError::Config(format!("cannot start loader workers: {e}")))?;
        let mut loader = Self {
            dataset,
            batch_size,
            shuffle,
            seed,
            pool,
            epoch: 0,
            order: Vec::new(),
            cursor: 0,
        };
        loader.order = loader.epoch_order(0);
        Ok(loader)
    }

    pub fn dataset(&self) -> &TryOnDataset {
        &self.dataset
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn num_batches(&self) -> usize {
        (self.dataset.len() + self.batch_size - 1) / self.batch_size
    }

    fn epoch_order(&self, epoch: u64) -> Vec<usize> {
        let mut order = (0..self.dataset.len()).collect::<Vec<_>>();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(epoch));
            order.shuffle(&mut rng);
        }
        order
    }

    /// Build the examples of `indices` on the worker pool, collated in index order.
    pub fn load_batch(&self, indices: &[usize]) -> DatasetResult<TryOnBatch> {
        let dataset = &self.dataset;
        let examples = self.pool.install(|| {
            indices
                .par_iter()
                .map(|&i| dataset.get(i))
                .collect::<DatasetResult<Vec<_>>>()
        })?;
        log::debug!("epoch {} batch of {} examples", self.epoch, examples.len());
        TryOnBatch::collate(indices.to_vec(), examples)
    }

    /// Next batch, starting a new epoch when the current one is exhausted.
    pub fn next_batch(&mut self) -> DatasetResult<TryOnBatch> {
        if self.dataset.is_empty() {
            return Err(DatasetError::EmptyBatch);
        }
        if self.cursor >= self.order.len() {
            self.epoch += 1;
            self.order = self.epoch_order(self.epoch);
            self.cursor = 0;
            log::debug!("starting epoch {}", self.epoch);
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let indices = self.order[self.cursor..end].to_vec();
        self.cursor = end;
        self.load_batch(&indices)
    }

    /// One pass over the dataset in the order of `epoch`, independent of `next_batch`.
    pub fn epoch_iter(&self, epoch: u64) -> impl Iterator<Item = DatasetResult<TryOnBatch>> + '_ {
        let order = self.epoch_order(epoch);
        let chunks = order
            .chunks(self.batch_size)
            .map(|c| c.to_vec())
            .collect::<Vec<_>>();
        chunks.into_iter().map(move |indices| self.load_batch(&indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::resolver::ListFileResolver;
    use crate::datasets::{DatasetOptions, Stage};
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::path::Path;

    const W: u32 = 32;
    const H: u32 = 48;

    fn write_samples(root: &Path, n: usize) {
        let data = root.join("test");
        for d in ["image", "image-parse", "pose", "warp-cloth", "warp-mask"] {
            std::fs::create_dir_all(data.join(d)).unwrap();
        }
        let mut list = String::new();
        for i in 0..n {
            let (im, c) = (format!("{i:06}_0.png"), format!("{i:06}_1.png"));
            list.push_str(&format!("{im} {c}\n"));
            RgbImage::from_pixel(W, H, Rgb([i as u8 * 10, 0, 0]))
                .save(data.join("image").join(&im))
                .unwrap();
            GrayImage::from_pixel(W, H, Luma([6])).save(data.join("image-parse").join(&im)).unwrap();
            std::fs::write(
                data.join("pose").join(format!("{i:06}_0_keypoints.json")),
                r#"{"people": [{"pose_keypoints": [10, 10, 1, 0, 0, 0]}]}"#,
            )
            .unwrap();
            RgbImage::from_pixel(W, H, Rgb([0, 0, 255])).save(data.join("warp-cloth").join(&c)).unwrap();
            GrayImage::from_pixel(W, H, Luma([255])).save(data.join("warp-mask").join(&c)).unwrap();
        }
        std::fs::write(root.join("test_pairs.txt"), list).unwrap();
    }

    fn loader(root: &Path, n: usize, batch_size: usize, shuffle: bool) -> TryOnDataloader {
        write_samples(root, n);
        let opts = DatasetOptions {
            dataroot: root.to_path_buf(),
            datamode: "test".into(),
            stage: Stage::Tom,
            fine_width: W,
            fine_height: H,
            joints: 2,
            ..Default::default()
        };
        let resolver = ListFileResolver::new(root.join("test"), &root.join("test_pairs.txt"), Stage::Tom).unwrap();
        let ds = TryOnDataset::new(&opts, resolver.into()).unwrap();
        TryOnDataloader::new(Arc::new(ds), batch_size, 2, shuffle, 7).unwrap()
    }

    #[test]
    fn batches_keep_partial_tail_and_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut dl = loader(dir.path(), 5, 2, false);
        assert_eq!(dl.num_batches(), 3);

        let batches = (0..4).map(|_| dl.next_batch().unwrap()).collect::<Vec<_>>();
        assert_eq!(batches[0].indices, vec![0, 1]);
        assert_eq!(batches[2].indices, vec![4]);
        assert_eq!(batches[3].indices, vec![0, 1]);
        assert_eq!(dl.epoch(), 1);

        let b = &batches[0];
        assert_eq!(b.agnostic.dims(), &[2, 1 + 3 + 2, H as usize, W as usize]);
        assert_eq!(b.cloth_mask.dims(), &[2, 1, H as usize, W as usize]);
        assert_eq!(b.im_name, vec!["000000_0.png", "000001_0.png"]);
        assert!(b.grid_image.is_none());
    }

    #[test]
    fn shuffled_epoch_is_a_seeded_permutation() {
        let dir = tempfile::tempdir().unwrap();
        let dl = loader(dir.path(), 6, 4, true);
        let collect = |epoch| {
            dl.epoch_iter(epoch)
                .flat_map(|b| b.unwrap().indices)
                .collect::<Vec<_>>()
        };
        let first = collect(0);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, (0..6).collect::<Vec<_>>());
        assert_eq!(first, collect(0));
    }

    #[test]
    fn collated_rows_follow_indices() {
        let dir = tempfile::tempdir().unwrap();
        let dl = loader(dir.path(), 3, 3, false);
        let b = dl.load_batch(&[2, 0]).unwrap();
        assert_eq!(b.im_name, vec!["000002_0.png", "000000_0.png"]);
        assert_eq!(b.image.dims(), &[2, 3, H as usize, W as usize]);
        let first = b.image.get(0).unwrap().get(0).unwrap().to_vec2::<f32>().unwrap();
        assert!((first[0][0] - (20.0 / 255.0 * 2.0 - 1.0)).abs() < 1e-6);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_samples(dir.path(), 1);
        let resolver =
            ListFileResolver::new(dir.path().join("test"), &dir.path().join("test_pairs.txt"), Stage::Tom).unwrap();
        let ds = TryOnDataset::new(&DatasetOptions::default(), resolver.into()).unwrap();
        assert!(TryOnDataloader::new(Arc::new(ds), 0, 1, false, 0).is_err());
    }
}
