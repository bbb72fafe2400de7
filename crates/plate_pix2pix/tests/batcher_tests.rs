mod common;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use burn::{
        backend::NdArray,
        data::dataloader::{DataLoaderBuilder, batcher::Batcher},
        tensor::{Device, Shape},
    };
    use ndarray::Array3;
    use plate_pix2pix::plate_database::{
        assembler::PlateSample,
        cyclic_sampler::SubsetKind,
        plate_batcher::{PlateBatch, PlateBatcher},
        plate_dataset::PlateDataset,
        plate_filename::PlateSite,
    };

    use crate::common::TestPlate;

    type TestBackend = NdArray<f32>;

    fn channel_sample(site: u32, h: usize, w: usize) -> PlateSample {
        PlateSample {
            site: PlateSite::new("B02", site),
            input: Array3::from_shape_fn((h, w, 7), |(_, _, k)| k as f32 / 10.),
            target: Array3::from_shape_fn((h, w, 3), |(y, x, _)| ((y + x) % 2) as f32),
        }
    }

    #[test]
    fn test_shape() {
        let device = Device::<TestBackend>::default();
        let batcher = PlateBatcher::<TestBackend>::new(device);
        let items = vec![channel_sample(1, 16, 8), channel_sample(2, 16, 8)];

        let b: PlateBatch<TestBackend> = batcher.batch(items);

        assert_eq!(Shape::new([2, 7, 16, 8]), b.inputs.shape());
        assert_eq!(Shape::new([2, 3, 16, 8]), b.targets.shape());
        assert_eq!(b.sites, vec![PlateSite::new("B02", 1), PlateSite::new("B02", 2)]);
    }

    #[test]
    fn test_channels_first_and_normalized() {
        let device = Device::<TestBackend>::default();
        let batcher = PlateBatcher::<TestBackend>::new(device);
        let (h, w) = (4, 6);
        let b: PlateBatch<TestBackend> = batcher.batch(vec![channel_sample(1, h, w)]);

        let inputs = b
            .inputs
            .into_data()
            .to_vec::<f32>()
            .expect("failed to read input tensor");
        for k in 0..7 {
            for (y, x) in [(0, 0), (3, 5), (2, 1)] {
                let value = inputs[(k * h + y) * w + x];
                let expected = k as f32 / 10. * 2. - 1.;
                assert!((value - expected).abs() < 1e-6, "{} != {}", value, expected);
            }
        }

        let targets = b
            .targets
            .into_data()
            .to_vec::<f32>()
            .expect("failed to read target tensor");
        assert!(targets.iter().all(|&v| v == -1. || v == 1.));
        assert_eq!(targets[0], -1.);
        assert_eq!(targets[1], 1.);
    }

    #[test]
    fn test_dataloader_over_training_subset() {
        let plate = TestPlate::new("batcher_dataloader");
        let dataset = Arc::new(PlateDataset::new(plate.config()).expect("unable to generate dataset"));
        let device = Device::<TestBackend>::default();

        let dataloader = DataLoaderBuilder::new(PlateBatcher::<TestBackend>::new(device))
            .batch_size(4)
            .shuffle(42)
            .build(dataset.subset_view(SubsetKind::Training));

        let batches: Vec<PlateBatch<TestBackend>> = dataloader.iter().collect();
        // 9 training sites in batches of 4
        assert_eq!(batches.len(), 3);
        assert_eq!(Shape::new([4, 7, 32, 32]), batches[0].inputs.shape());
        assert_eq!(Shape::new([4, 3, 32, 32]), batches[0].targets.shape());
        assert_eq!(batches[2].sites.len(), 1);
    }
}
