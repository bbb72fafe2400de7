use std::f64::consts::PI;

use ndarray::{Array3, s};
use rand::Rng;
use ron::de::SpannedError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::assembler::PlateSample;

/// A scalar parameter that is either fixed or drawn anew on every application.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum ParamSpec {
    Fixed(f64),
    /// uniform draw from `[low, high)`
    Uniform { low: f64, high: f64 },
}

impl ParamSpec {
    /// Non-finite values and ranges whose width overflows are rejected.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, AugmentationError> {
        match *self {
            ParamSpec::Fixed(value) if value.is_finite() => Ok(value),
            ParamSpec::Uniform { low, high } if (high - low).is_finite() => {
                if high > low {
                    Ok(rng.random_range(low..high))
                } else {
                    Ok(low)
                }
            }
            _ => Err(AugmentationError::InvalidParameter(*self)),
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(self, ParamSpec::Uniform { low, high } if high > low)
    }
}

/// How pixels sampled from outside the source image are filled.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub enum BoundaryMode {
    /// mirror at the edge pixel (`d c b | a b c d | c b a`)
    #[default]
    Reflect,
    /// repeat the edge pixel
    Nearest,
    Constant(f32),
}

/// Rotation, shear, scale and translation around the image center.
///
/// Angles are in radians, translations in pixels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AffineParams {
    pub rotate: ParamSpec,
    pub shear: ParamSpec,
    pub scale_x: ParamSpec,
    pub scale_y: ParamSpec,
    pub translate_x: ParamSpec,
    pub translate_y: ParamSpec,
    pub mode: BoundaryMode,
}

impl Default for AffineParams {
    fn default() -> Self {
        Self {
            rotate: ParamSpec::Uniform {
                low: 0.,
                high: 2. * PI,
            },
            shear: ParamSpec::Uniform {
                low: -0.15,
                high: 0.15,
            },
            scale_x: ParamSpec::Uniform {
                low: 0.85,
                high: 1.15,
            },
            scale_y: ParamSpec::Uniform {
                low: 0.85,
                high: 1.15,
            },
            translate_x: ParamSpec::Fixed(0.),
            translate_y: ParamSpec::Fixed(0.),
            mode: BoundaryMode::Reflect,
        }
    }
}

fn default_probability() -> f64 {
    0.5
}

/// A single augmentation operator.
///
/// Geometric operators always transform input and target stacks together.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum AugmentationOp {
    /// mirror columns
    FlipLr {
        #[serde(default = "default_probability")]
        probability: f64,
    },
    /// mirror rows
    FlipUd {
        #[serde(default = "default_probability")]
        probability: f64,
    },
    /// swap rows and columns
    FlipDiagonal {
        #[serde(default = "default_probability")]
        probability: f64,
    },
    Affine(AffineParams),
}

#[derive(Error, Debug)]
pub enum AugmentationError {
    #[error("{} received the probability {} which is not in [0, 1]", .operator, .probability)]
    InvalidProbability { operator: String, probability: f64 },
    #[error("{:?} is not a finite parameter", .0)]
    InvalidParameter(ParamSpec),
    #[error("The affine transform drawn for {} is not invertible (determinant {})", .site, .determinant)]
    DegenerateTransform { site: String, determinant: f64 },
    #[error("Unable to parse augmentation descriptor due to {:?}", .0)]
    DescriptorParsingError(#[from] SpannedError),
}

impl AugmentationOp {
    pub fn name(&self) -> &str {
        match self {
            AugmentationOp::FlipLr { .. } => "FlipLr",
            AugmentationOp::FlipUd { .. } => "FlipUd",
            AugmentationOp::FlipDiagonal { .. } => "FlipDiagonal",
            AugmentationOp::Affine(_) => "Affine",
        }
    }

    /// Whether the operator can swap height and width.
    pub fn may_transpose(&self) -> bool {
        matches!(self, AugmentationOp::FlipDiagonal { probability } if *probability > 0.)
    }

    pub fn apply<R: Rng + ?Sized>(
        &self,
        sample: PlateSample,
        rng: &mut R,
    ) -> Result<PlateSample, AugmentationError> {
        match self {
            AugmentationOp::FlipLr { probability } => {
                self.maybe(sample, *probability, rng, |stack| {
                    stack.slice(s![.., ..;-1, ..]).to_owned()
                })
            }
            AugmentationOp::FlipUd { probability } => {
                self.maybe(sample, *probability, rng, |stack| {
                    stack.slice(s![..;-1, .., ..]).to_owned()
                })
            }
            AugmentationOp::FlipDiagonal { probability } => {
                self.maybe(sample, *probability, rng, |stack| {
                    stack
                        .view()
                        .permuted_axes([1, 0, 2])
                        .as_standard_layout()
                        .into_owned()
                })
            }
            AugmentationOp::Affine(params) => apply_affine(sample, params, rng),
        }
    }

    fn maybe<R, F>(
        &self,
        sample: PlateSample,
        probability: f64,
        rng: &mut R,
        transform: F,
    ) -> Result<PlateSample, AugmentationError>
    where
        R: Rng + ?Sized,
        F: Fn(&Array3<f32>) -> Array3<f32>,
    {
        if !(0. ..=1.).contains(&probability) {
            return Err(AugmentationError::InvalidProbability {
                operator: self.name().into(),
                probability,
            });
        }
        if rng.random::<f64>() >= probability {
            return Ok(sample);
        }
        Ok(PlateSample {
            input: transform(&sample.input),
            target: transform(&sample.target),
            site: sample.site,
        })
    }
}

fn apply_affine<R: Rng + ?Sized>(
    sample: PlateSample,
    params: &AffineParams,
    rng: &mut R,
) -> Result<PlateSample, AugmentationError> {
    let rotate = params.rotate.draw(rng)?;
    let shear = params.shear.draw(rng)?;
    let scale_x = params.scale_x.draw(rng)?;
    let scale_y = params.scale_y.draw(rng)?;
    let translate = (params.translate_y.draw(rng)?, params.translate_x.draw(rng)?);

    // forward matrix in (x, y) = (column, row) coordinates
    let m = [
        [scale_x * rotate.cos(), -scale_y * (rotate + shear).sin()],
        [scale_x * rotate.sin(), scale_y * (rotate + shear).cos()],
    ];
    let determinant = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    if !determinant.is_finite() || determinant.abs() < 1e-12 {
        return Err(AugmentationError::DegenerateTransform {
            site: sample.site.to_string(),
            determinant,
        });
    }
    let inverse = [
        [m[1][1] / determinant, -m[0][1] / determinant],
        [-m[1][0] / determinant, m[0][0] / determinant],
    ];
    Ok(PlateSample {
        input: warp_stack(&sample.input, &inverse, translate, params.mode),
        target: warp_stack(&sample.target, &inverse, translate, params.mode),
        site: sample.site,
    })
}

fn boundary_index(index: isize, len: usize, mode: BoundaryMode) -> Option<usize> {
    let n = len as isize;
    if (0..n).contains(&index) {
        return Some(index as usize);
    }
    match mode {
        BoundaryMode::Constant(_) => None,
        BoundaryMode::Nearest => Some(index.clamp(0, n - 1) as usize),
        BoundaryMode::Reflect => {
            if n == 1 {
                return Some(0);
            }
            let period = 2 * (n - 1);
            let mut m = index.rem_euclid(period);
            if m >= n {
                m = period - m;
            }
            Some(m as usize)
        }
    }
}

/// Resamples every channel of `stack` through the inverse matrix with
/// bilinear interpolation. The output keeps the input shape.
fn warp_stack(
    stack: &Array3<f32>,
    inverse: &[[f64; 2]; 2],
    translate: (f64, f64),
    mode: BoundaryMode,
) -> Array3<f32> {
    let (height, width, channels) = stack.dim();
    let center_y = (height as f64 - 1.) / 2.;
    let center_x = (width as f64 - 1.) / 2.;
    let fill = match mode {
        BoundaryMode::Constant(value) => value,
        _ => 0.,
    };
    let mut out = Array3::<f32>::zeros((height, width, channels));
    for row in 0..height {
        for col in 0..width {
            let dx = col as f64 - center_x - translate.1;
            let dy = row as f64 - center_y - translate.0;
            let src_x = inverse[0][0] * dx + inverse[0][1] * dy + center_x;
            let src_y = inverse[1][0] * dx + inverse[1][1] * dy + center_y;

            let x0 = src_x.floor();
            let y0 = src_y.floor();
            let fx = (src_x - x0) as f32;
            let fy = (src_y - y0) as f32;
            let cols = [
                boundary_index(x0 as isize, width, mode),
                boundary_index(x0 as isize + 1, width, mode),
            ];
            let rows = [
                boundary_index(y0 as isize, height, mode),
                boundary_index(y0 as isize + 1, height, mode),
            ];
            for ch in 0..channels {
                let value = |r: Option<usize>, c: Option<usize>| match (r, c) {
                    (Some(r), Some(c)) => stack[[r, c, ch]],
                    _ => fill,
                };
                out[[row, col, ch]] = value(rows[0], cols[0]) * (1. - fx) * (1. - fy)
                    + value(rows[0], cols[1]) * fx * (1. - fy)
                    + value(rows[1], cols[0]) * (1. - fx) * fy
                    + value(rows[1], cols[1]) * fx * fy;
            }
        }
    }
    out
}

/// Ordered chain of augmentation operators, applied left to right.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct Augmentation {
    ops: Vec<AugmentationOp>,
}

impl Augmentation {
    pub fn new(ops: Vec<AugmentationOp>) -> Self {
        Self { ops }
    }

    /// Random flips along all three axes followed by a random affine warp.
    pub fn default_ops() -> Vec<AugmentationOp> {
        vec![
            AugmentationOp::FlipLr { probability: 0.5 },
            AugmentationOp::FlipUd { probability: 0.5 },
            AugmentationOp::FlipDiagonal { probability: 0.5 },
            AugmentationOp::Affine(AffineParams::default()),
        ]
    }

    /// Parses a ron list such as `[FlipLr(probability: 0.5), Affine((rotate: Fixed(0.3)))]`.
    ///
    /// Unknown operator names are rejected.
    pub fn from_ron_str(descriptor: &str) -> Result<Self, AugmentationError> {
        Ok(ron::from_str(descriptor)?)
    }

    pub fn ops(&self) -> &[AugmentationOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn may_transpose(&self) -> bool {
        self.ops.iter().any(AugmentationOp::may_transpose)
    }

    pub fn apply<R: Rng + ?Sized>(
        &self,
        sample: PlateSample,
        rng: &mut R,
    ) -> Result<PlateSample, AugmentationError> {
        self.ops
            .iter()
            .try_fold(sample, |sample, op| op.apply(sample, rng))
    }
}
