use crate::core::Checker;
use std::sync::Arc;
use std::time::Instant;
use vton_data::datasets::{get_dataset, TryOnDataloader};

/// Report the dataset size, then fetch one sample and one batch.
pub fn run(chk: &Checker) -> anyhow::Result<()> {
    let loop_time = Instant::now();
    let dataset = Arc::new(get_dataset(&chk.dataset_options())?);
    let mut loader = TryOnDataloader::new(
        dataset.clone(),
        chk.batch_size as usize,
        chk.workers,
        chk.shuffle,
        chk.seed,
    )?;
    log::info!(
        "{}: size of the dataset: {:05}, dataloader: {:04}, built in {:5.2?}",
        dataset.name(),
        dataset.len(),
        loader.num_batches(),
        loop_time.elapsed()
    );
    if dataset.is_empty() {
        anyhow::bail!("dataset {} has no samples", dataset.name());
    }

    let item_time = Instant::now();
    let first_item = dataset.get(0)?;
    log::info!(
        "first item {} / {} in {:5.2?}",
        first_item.im_name,
        first_item.cloth_name,
        item_time.elapsed()
    );
    for (name, t) in first_item.tensors() {
        log::info!("  {name:<12} {:?}", t.dims());
    }

    let batch_time = Instant::now();
    let first_batch = loader.next_batch()?;
    log::info!(
        "first batch of {} (indices {:?}) in {:5.2?}, agnostic {:?}",
        first_batch.len(),
        first_batch.indices,
        batch_time.elapsed(),
        first_batch.agnostic.dims()
    );

    Ok(())
}
