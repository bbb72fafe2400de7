use burn::{
    data::dataloader::batcher::Batcher,
    prelude::Backend,
    tensor::{Tensor, TensorData},
};
use ndarray::Array3;

use super::{assembler::PlateSample, plate_filename::PlateSite};

#[derive(Clone, Debug)]
pub struct PlateBatch<B: Backend> {
    /// brightfield z-slides, `[N, z_slides, H, W]` in `[-1, 1]`
    pub inputs: Tensor<B, 4>,
    /// fluorescence action layers, `[N, actions, H, W]` in `[-1, 1]`
    pub targets: Tensor<B, 4>,
    pub sites: Vec<PlateSite>,
}

#[derive(Clone, Debug)]
pub struct PlateBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> PlateBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn to_tensor(&self, stack: &Array3<f32>) -> Tensor<B, 4> {
        let (h, w, c) = stack.dim();
        let data = TensorData::new(stack.iter().copied().collect::<Vec<f32>>(), [1, h, w, c]);
        Tensor::<B, 4>::from_data(data, &self.device).permute([0, 3, 1, 2])
    }
}

impl<B: Backend> Batcher<PlateSample, PlateBatch<B>> for PlateBatcher<B> {
    /// Stacks the samples along the batch axis. All samples must share their
    /// spatial size, which holds for cropped training tiles.
    fn batch(&self, items: Vec<PlateSample>) -> PlateBatch<B> {
        let (inputs, targets, sites) = items.into_iter().fold(
            (vec![], vec![], vec![]),
            |(mut inputs, mut targets, mut sites), item| {
                inputs.push(self.to_tensor(&item.input));
                targets.push(self.to_tensor(&item.target));
                sites.push(item.site);
                (inputs, targets, sites)
            },
        );
        let inputs = Tensor::cat(inputs, 0);
        let targets = Tensor::cat(targets, 0);
        // normalize [-1, 1]
        PlateBatch {
            inputs: inputs * 2. - 1.,
            targets: targets * 2. - 1.,
            sites,
        }
    }
}
