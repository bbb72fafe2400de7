use std::{env, path::PathBuf, str::FromStr, sync::Arc};

use burn::{
    backend::Wgpu,
    config::Config,
    data::dataloader::{DataLoaderBuilder, batcher::Batcher},
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::info;
use plate_pix2pix::{
    logging::PlateSampleLogger,
    plate_database::{
        cyclic_sampler::SubsetKind,
        plate_batcher::PlateBatcher,
        plate_dataset::{PlateDataset, PlateDatasetConfig},
        split::SiteSplit,
    },
};

const PREVIEW_STEPS: usize = 50;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    type MyBackend = Wgpu<f32, i32>;

    let device = burn::backend::wgpu::WgpuDevice::default();
    let artifact_dir = PathBuf::from_str("./tmp")?;
    std::fs::create_dir_all(&artifact_dir)?;

    let stream = rerun::RecordingStreamBuilder::new("plate preview").spawn()?;
    let rec = PlateSampleLogger::new(stream.clone());

    rerun::Logger::new(stream) // recording streams are ref-counted
        .with_path_prefix("logs")
        .with_filter(rerun::default_log_filter())
        .init()?;

    // either a saved config or the default setup below ./data
    let config = match env::args().nth(1) {
        Some(path) => PlateDatasetConfig::load(&path)?,
        None => PlateDatasetConfig::new(PathBuf::from_str("./data/")?).with_seed(Some(42)),
    };
    config.save(artifact_dir.join("plate_dataset_config.json"))?;

    let split_path = artifact_dir.join("split.ron");
    let dataset = if split_path.exists() {
        info!("reusing split from {:?}", split_path);
        PlateDataset::with_split(config, SiteSplit::load_from_ron(&split_path)?)?
    } else {
        let dataset = PlateDataset::new(config)?;
        dataset.save_split(&split_path)?;
        dataset
    };
    let dataset = Arc::new(dataset);

    let m = MultiProgress::new();
    let sty = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
    )?
    .progress_chars("##-");

    for kind in [SubsetKind::Training, SubsetKind::Validation] {
        dataset.set_validation(kind == SubsetKind::Validation);
        let bar = m.add(ProgressBar::new(PREVIEW_STEPS as u64));
        bar.set_style(sty.clone());
        bar.set_message(format!("{} samples", kind));
        for step in 0..PREVIEW_STEPS {
            let sample = dataset.next_sample()?;
            rec.log_sample(&sample, kind, step);
            bar.inc(1);
        }
        m.remove(&bar);
    }

    let batcher = PlateBatcher::<MyBackend>::new(device.clone());
    let dataloader_train = DataLoaderBuilder::new(batcher.clone())
        .batch_size(4)
        .shuffle(42)
        .num_workers(2)
        .build(dataset.subset_view(SubsetKind::Training));
    if let Some(batch) = dataloader_train.iter().next() {
        info!(
            "training batch: inputs {:?}, targets {:?}",
            batch.inputs.shape().dims,
            batch.targets.shape().dims
        );
    }

    dataset.set_validation(true);
    let sample = dataset.next_sample()?;
    let batch = batcher.batch(vec![sample]);
    info!(
        "validation batch: inputs {:?}, targets {:?}",
        batch.inputs.shape().dims,
        batch.targets.shape().dims
    );
    Ok(())
}
