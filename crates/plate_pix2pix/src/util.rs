use ndarray::{Array3, ArrayView2, Axis};
use rerun::{
    AsComponents,
    external::ndarray as rr_ndarray,
};

pub struct LogContainer<K: ?Sized + AsComponents> {
    component: K,
}

impl<K: ?Sized + AsComponents> AsComponents for LogContainer<K> {
    fn as_serialized_batches(&self) -> Vec<rerun::SerializedComponentBatch> {
        self.component.as_serialized_batches()
    }
    fn to_arrow(
        &self,
    ) -> rerun::SerializationResult<
        Vec<(
            rerun::external::arrow::datatypes::Field,
            rerun::external::arrow::array::ArrayRef,
        )>,
    > {
        self.component.to_arrow()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LogContainerParsingError {
    #[error("{} channels can not be shown as {}", .0, .1)]
    ChannelCountError(usize, String),
    #[error("A {} x {} grid can not hold {} channels", .rows, .columns, .channels)]
    GridError {
        rows: usize,
        columns: usize,
        channels: usize,
    },
    #[error("failed to convert from image due to {}", .0)]
    ImageConstructionError(String),
}

/// Layout used when several channels are tiled into one image.
#[derive(Default, Clone, Debug, PartialEq)]
pub enum ImageGridOptions {
    Columns(usize),
    Rows(usize),
    Exact {
        rows: usize,
        columns: usize,
    },
    #[default]
    Auto,
}

impl ImageGridOptions {
    pub fn into_row_column(self, count: usize) -> Result<(usize, usize), LogContainerParsingError> {
        let (rows, columns) = match self {
            ImageGridOptions::Columns(c) => (count.div_ceil(c.max(1)), c.max(1)),
            ImageGridOptions::Rows(r) => (r.max(1), count.div_ceil(r.max(1))),
            ImageGridOptions::Exact { rows, columns } => (rows, columns),
            ImageGridOptions::Auto => {
                let root = (count as f32).sqrt();
                if root % 1. == 0. {
                    (root as usize, root as usize)
                } else {
                    ((root.floor() as usize + 1), root.round() as usize)
                }
            }
        };
        if rows * columns < count {
            return Err(LogContainerParsingError::GridError {
                rows,
                columns,
                channels: count,
            });
        }
        Ok((rows, columns))
    }
}

/// Minimum and maximum over all finite values, `(0, 1)` for empty input.
pub fn intensity_range<'a>(values: impl IntoIterator<Item = &'a f32>) -> (f32, f32) {
    let (low, high) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(low, high), &v| {
            (low.min(v), high.max(v))
        });
    if low > high { (0., 1.) } else { (low, high) }
}

fn to_u8(value: f32, (low, high): (f32, f32)) -> u8 {
    if high <= low {
        return 0;
    }
    ((value - low) / (high - low) * 255.).clamp(0., 255.) as u8
}

impl LogContainer<rerun::Image> {
    /// Tiles every channel of a `[height, width, channels]` stack into a grey
    /// scale grid. All channels share one intensity range.
    pub fn from_channel_grid(
        stack: &Array3<f32>,
        grid_settings: ImageGridOptions,
    ) -> Result<Self, LogContainerParsingError> {
        let (h, w, c) = stack.dim();
        if c == 0 {
            return Err(LogContainerParsingError::ChannelCountError(c, "a grid".into()));
        }
        let (_rows, columns) = grid_settings.into_row_column(c)?;
        let range = intensity_range(stack.iter());
        let rows = c.div_ceil(columns);

        let nd = rr_ndarray::Array2::<u8>::from_shape_fn((rows * h, columns * w), |(y, x)| {
            let channel = (y / h) * columns + x / w;
            if channel < c {
                to_u8(stack[[y % h, x % w, channel]], range)
            } else {
                0
            }
        });
        let image = rerun::Image::from_color_model_and_tensor(rerun::ColorModel::L, nd)
            .map_err(|err| LogContainerParsingError::ImageConstructionError(format!("{:?}", err)))?;
        Ok(Self { component: image })
    }

    /// Shows a three channel stack as an RGB composite, each channel scaled
    /// by its own intensity range.
    pub fn from_rgb_stack(stack: &Array3<f32>) -> Result<Self, LogContainerParsingError> {
        let (h, w, c) = stack.dim();
        if c != 3 {
            return Err(LogContainerParsingError::ChannelCountError(c, "rgb".into()));
        }
        let ranges: Vec<(f32, f32)> = stack
            .axis_iter(Axis(2))
            .map(|channel| intensity_range(channel.iter()))
            .collect();
        let nd = rr_ndarray::Array3::<u8>::from_shape_fn((h, w, 3), |(y, x, ch)| {
            to_u8(stack[[y, x, ch]], ranges[ch])
        });
        let image = rerun::Image::from_color_model_and_tensor(rerun::ColorModel::RGB, nd)
            .map_err(|err| LogContainerParsingError::ImageConstructionError(format!("{:?}", err)))?;
        Ok(Self { component: image })
    }

    /// A single `[height, width]` channel as grey scale.
    pub fn from_channel(channel: ArrayView2<f32>) -> Result<Self, LogContainerParsingError> {
        let range = intensity_range(channel.iter());
        let nd = rr_ndarray::Array2::<u8>::from_shape_fn(channel.dim(), |(y, x)| {
            to_u8(channel[[y, x]], range)
        });
        let image = rerun::Image::from_color_model_and_tensor(rerun::ColorModel::L, nd)
            .map_err(|err| LogContainerParsingError::ImageConstructionError(format!("{:?}", err)))?;
        Ok(Self { component: image })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(h: usize, w: usize, c: usize) -> Array3<f32> {
        Array3::from_shape_fn((h, w, c), |(y, x, ch)| (y * w + x + ch) as f32 / (h * w + c) as f32)
    }

    #[test]
    fn test_from_channel_grid() {
        let log_container = LogContainer::from_channel_grid(&ramp(4, 4, 7), ImageGridOptions::Auto);
        assert!(log_container.is_ok());
    }

    #[test]
    fn test_from_rgb_stack() {
        assert!(LogContainer::from_rgb_stack(&ramp(4, 4, 3)).is_ok());
        assert_eq!(
            LogContainer::from_rgb_stack(&ramp(4, 4, 7)).err(),
            Some(LogContainerParsingError::ChannelCountError(7, "rgb".into()))
        );
    }

    #[test]
    fn test_auto_grid_2() {
        let (rows, columns) = ImageGridOptions::Auto.into_row_column(2).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(columns, 1);
    }

    #[test]
    fn test_auto_grid_4() {
        let (rows, columns) = ImageGridOptions::Auto.into_row_column(4).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(columns, 2);
    }

    #[test]
    fn test_auto_grid_7() {
        let (rows, columns) = ImageGridOptions::Auto.into_row_column(7).unwrap();
        assert!(rows * columns >= 7);
    }

    #[test]
    fn test_exact_grid_too_small() {
        let grid = ImageGridOptions::Exact { rows: 2, columns: 2 };
        assert!(grid.into_row_column(7).is_err());
    }

    #[test]
    fn test_intensity_range() {
        let values = [0.5f32, f32::NAN, -1., 2.];
        assert_eq!(intensity_range(values.iter()), (-1., 2.));
        let empty: [f32; 0] = [];
        assert_eq!(intensity_range(empty.iter()), (0., 1.));
    }
}
