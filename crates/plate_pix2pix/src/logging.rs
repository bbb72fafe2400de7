use rerun::{AsComponents, RecordingStream};

use crate::{
    plate_database::{assembler::PlateSample, cyclic_sampler::SubsetKind},
    util::{ImageGridOptions, LogContainer, LogContainerParsingError},
};

/// Streams pulled samples to a rerun recording.
pub struct PlateSampleLogger {
    stream: RecordingStream,
    pub log_image_interval: usize,
    pub image_grid_options: ImageGridOptions,
}

impl PlateSampleLogger {
    pub fn new(stream: RecordingStream) -> Self {
        Self {
            stream,
            log_image_interval: 5,
            image_grid_options: ImageGridOptions::Auto,
        }
    }

    fn log_or_report<K: AsComponents>(
        &self,
        entity_path: String,
        container: Result<K, LogContainerParsingError>,
        what: &str,
    ) {
        match container {
            Ok(c) => {
                let _ = self.stream.log(entity_path, &c);
            }
            Err(e) => {
                let _ = self.stream.log(
                    entity_path,
                    &rerun::TextLog::new(format!("Failed to convert {} due to {:?}", what, e))
                        .with_level(rerun::TextLogLevel::ERROR),
                );
            }
        }
    }

    /// Logs the input z-slides as a grid and the target layers as an RGB
    /// composite (or a grid when there are not exactly three of them).
    /// Only every `log_image_interval`-th step is logged.
    pub fn log_sample(&self, sample: &PlateSample, kind: SubsetKind, step: usize) {
        if self.log_image_interval == 0 || step % self.log_image_interval != 0 {
            return;
        }
        self.stream.set_time_sequence("step", step as i64);
        let base_path = kind.as_str();
        self.log_or_report(
            format!("{}/images/input_stack", base_path),
            LogContainer::from_channel_grid(&sample.input, self.image_grid_options.clone()),
            "input stack",
        );
        let target = if sample.target.dim().2 == 3 {
            LogContainer::from_rgb_stack(&sample.target)
        } else {
            LogContainer::from_channel_grid(&sample.target, self.image_grid_options.clone())
        };
        self.log_or_report(
            format!("{}/images/target_stack", base_path),
            target,
            "target stack",
        );
        let (h, w) = sample.spatial_dims();
        let _ = self.stream.log(
            format!("{}/sites", base_path),
            &rerun::TextLog::new(format!("{} ({}x{})", sample.site, h, w))
                .with_level(rerun::TextLogLevel::INFO),
        );
    }
}
