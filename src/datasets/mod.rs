mod error;
mod example;
pub mod imageio;
mod loader;
pub mod masks;
pub mod pose;
pub mod resolver;

use clap::ValueEnum;
pub use error::{DatasetError, DatasetResult};
pub use example::{TryOnDataset, TryOnExample};
pub use loader::{TryOnBatch, TryOnDataloader};
use std::path::PathBuf;

/// Which trained sub-pipeline the samples are prepared for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Geometric matching, garments before warping.
    Gmm,
    /// Try-on rendering, garments already warped.
    Tom,
}

impl Stage {
    pub fn cloth_folder(self) -> &'static str {
        match self {
            Stage::Gmm => "cloth",
            Stage::Tom => "warp-cloth",
        }
    }

    pub fn cloth_mask_folder(self) -> &'static str {
        match self {
            Stage::Gmm => "cloth-mask",
            Stage::Tom => "warp-mask",
        }
    }

    pub fn vvt_cloth_folder(self) -> &'static str {
        match self {
            Stage::Gmm => "lip_clothes_person",
            Stage::Tom => "warp-cloth",
        }
    }
}

/// On-disk layout of the dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum WhichDataset {
    /// Pairs listed in a text file, CP-VTON folders.
    Cp,
    /// Video frames discovered by folder convention.
    Vvt,
}

#[derive(Clone, Debug)]
pub struct DatasetOptions {
    pub dataroot: PathBuf,
    pub vvt_dataroot: PathBuf,
    pub datamode: String,
    pub stage: Stage,
    pub dataset: WhichDataset,
    pub data_list: String,
    pub fine_width: u32,
    pub fine_height: u32,
    pub radius: u32,
    pub joints: usize,
    pub grid_path: PathBuf,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            dataroot: PathBuf::from("data"),
            vvt_dataroot: PathBuf::from("/data_hdd/vvt_competition"),
            datamode: String::from("train"),
            stage: Stage::Gmm,
            dataset: WhichDataset::Cp,
            data_list: String::from("train_pairs.txt"),
            fine_width: 192,
            fine_height: 256,
            radius: 3,
            joints: pose::DEFAULT_JOINTS,
            grid_path: PathBuf::from("../grid.png"),
        }
    }
}

fn get_resolver(opts: &DatasetOptions) -> DatasetResult<resolver::PathResolver> {
    log::info!("Load dataset: {:?} ({}, {:?})", opts.dataset, opts.datamode, opts.stage);
    Ok(match opts.dataset {
        WhichDataset::Cp => resolver::ListFileResolver::new(
            opts.dataroot.join(&opts.datamode),
            &opts.dataroot.join(&opts.data_list),
            opts.stage,
        )?
        .into(),
        WhichDataset::Vvt => {
            resolver::ConventionResolver::new(&opts.vvt_dataroot, &opts.datamode, opts.stage)?.into()
        }
    })
}

pub fn get_dataset(opts: &DatasetOptions) -> DatasetResult<TryOnDataset> {
    TryOnDataset::new(opts, get_resolver(opts)?)
}
