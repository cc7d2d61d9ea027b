use clap::Parser;
use std::path::PathBuf;
use vton_data::datasets::{DatasetOptions, Stage, WhichDataset};

#[derive(Parser, Debug)]
#[command(name = "Try-on dataset self check")]
#[command(version = "0.1")]
#[command(about = "Build try-on training examples and report what the dataset yields", long_about = None)]
pub struct Checker {
    /// Name of this run, used for the log folder
    #[arg(short, long, default_value_t = String::from("check"))]
    pub name: String,

    /// specify WhichDataset (on-disk layout)
    #[arg(short, long, value_enum, default_value_t = WhichDataset::Cp)]
    pub dataset: WhichDataset,

    /// root of the list-file layout
    #[arg(long, default_value = "data")]
    pub dataroot: PathBuf,

    /// root of the video-frame layout
    #[arg(long, default_value = "/data_hdd/vvt_competition")]
    pub vvt_dataroot: PathBuf,

    /// train, test or a custom split folder
    #[arg(long, default_value_t = String::from("train"))]
    pub datamode: String,

    /// pipeline stage
    #[arg(long, value_enum, default_value_t = Stage::Gmm)]
    pub stage: Stage,

    /// pair list file under dataroot
    #[arg(long, default_value_t = String::from("train_pairs.txt"))]
    pub data_list: String,

    #[arg(long, default_value_t = 192)]
    pub fine_width: u32,

    #[arg(long, default_value_t = 256)]
    pub fine_height: u32,

    /// half size of the joint squares
    #[arg(long, default_value_t = 3)]
    pub radius: u32,

    /// joints per keypoint file
    #[arg(long, default_value_t = 18)]
    pub joints: usize,

    /// shared grid visualization for the geometric matching stage
    #[arg(long, default_value = "../grid.png")]
    pub grid_path: PathBuf,

    /// batch size
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..), default_value_t = 4)]
    pub batch_size: u32,

    /// loader threads
    #[arg(short = 'j', long, default_value_t = 1)]
    pub workers: usize,

    /// shuffle input data
    #[arg(long, default_value_t = false)]
    pub shuffle: bool,

    /// seed
    #[arg(short, long, default_value_t = 42)]
    pub seed: u64,

    /// recoder home path
    #[arg(short, long, default_value_t = String::from("tmp"))]
    pub recoder_home: String,
}

impl Checker {
    pub fn dataset_options(&self) -> DatasetOptions {
        DatasetOptions {
            dataroot: self.dataroot.clone(),
            vvt_dataroot: self.vvt_dataroot.clone(),
            datamode: self.datamode.clone(),
            stage: self.stage,
            dataset: self.dataset,
            data_list: self.data_list.clone(),
            fine_width: self.fine_width,
            fine_height: self.fine_height,
            radius: self.radius,
            joints: self.joints,
            grid_path: self.grid_path.clone(),
        }
    }
}
