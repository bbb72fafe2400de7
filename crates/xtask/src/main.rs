use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use image::{ImageBuffer, Luma};
use indicatif::{ProgressBar, ProgressStyle};
use plate_pix2pix::plate_database::{
    magnification::Magnification,
    plate_filename::{ChannelLayout, PlateFileIndex, PlateFileName, PlateSite},
    split::SiteSplit,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

#[derive(Parser)]
#[command(version, about = "Helper tool for build and dev tasks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// writes a synthetic plate that follows the scanner naming scheme
    SynthesizePlate {
        #[arg(default_value = "data")]
        dest: String,
        #[arg(long, default_value = "60x")]
        magnification: Magnification,
        /// comma separated well ids
        #[arg(long, default_value = "B02,B03,B04,C02,C03,C04,D02,D03,D04")]
        wells: String,
        #[arg(long, default_value_t = 320)]
        size: u32,
        /// write inputs to input/ and targets to targets/
        #[arg(long)]
        separated: bool,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// prints the wells, sites and split sizes found below a plate root
    InspectPlate {
        #[arg(default_value = "data")]
        root: String,
        #[arg(long, default_value = "60x")]
        magnification: Magnification,
        #[arg(long, default_value = ".tif")]
        extension: String,
        #[arg(long, default_value_t = 0.7)]
        train_ratio: f64,
        #[arg(long)]
        separated: bool,
    },
}

fn layout(separated: bool) -> ChannelLayout {
    if separated {
        ChannelLayout::Separated
    } else {
        ChannelLayout::Flat
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::SynthesizePlate {
            dest,
            magnification,
            wells,
            size,
            separated,
            seed,
        } => {
            println!("🧪 synthesizing a {} plate in {}", magnification, dest);
            match synthesize_plate(&dest, magnification, &wells, size, layout(separated), seed) {
                Ok(n) => println!("✅ wrote {} files to {}", n, dest),
                Err(e) => eprintln!("❌ error: {:?}", e),
            }
        }
        Commands::InspectPlate {
            root,
            magnification,
            extension,
            train_ratio,
            separated,
        } => {
            if let Err(e) = inspect_plate(&root, magnification, &extension, train_ratio, layout(separated)) {
                eprintln!("❌ error: {:?}", e);
            }
        }
    }
}

/// Gaussian spots; targets are in focus, inputs blur with the distance of
/// their z-slide from the middle of the stack.
fn render_channel(spots: &[(f32, f32, f32)], size: u32, sigma: f32, gain: f32) -> ImageBuffer<Luma<u16>, Vec<u16>> {
    ImageBuffer::from_fn(size, size, |x, y| {
        let value: f32 = spots
            .iter()
            .map(|&(sx, sy, radius)| {
                let d2 = (x as f32 - sx).powi(2) + (y as f32 - sy).powi(2);
                let s = radius * sigma;
                (-d2 / (2. * s * s)).exp()
            })
            .sum();
        Luma([((value * gain).min(1.) * u16::MAX as f32) as u16])
    })
}

fn synthesize_plate(
    dest: &str,
    magnification: Magnification,
    wells: &str,
    size: u32,
    layout: ChannelLayout,
    seed: u64,
) -> anyhow::Result<usize> {
    let image_root = PathBuf::from(dest).join(magnification.folder_name());
    let input_dir = layout.input_dir(&image_root);
    let target_dir = layout.target_dir(&image_root);
    create_dir_all(&input_dir)?;
    create_dir_all(&target_dir)?;

    let wells: Vec<&str> = wells.split(',').map(str::trim).filter(|w| !w.is_empty()).collect();
    if wells.is_empty() {
        bail!("no wells given");
    }
    let profile = magnification.profile();
    let mut rng = StdRng::seed_from_u64(seed);

    let pb = ProgressBar::new((wells.len() * profile.sites_per_well as usize) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{wide_bar} {pos}/{len} sites ({eta})")?
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );

    let mut written = 0;
    let middle = (profile.z_slides as f32 + 1.) / 2.;
    for well in &wells {
        for site in profile.sites() {
            let site = PlateSite::new(*well, site);
            let spots: Vec<(f32, f32, f32)> = (0..rng.random_range(5..20))
                .map(|_| {
                    (
                        rng.random_range(0.0..size as f32),
                        rng.random_range(0.0..size as f32),
                        rng.random_range(3.0..9.0),
                    )
                })
                .collect();
            for z_slide in 1..=profile.z_slides {
                let sigma = 1. + (z_slide as f32 - middle).abs() * 0.5;
                let path = input_dir.join(PlateFileName::new(&site, 4, z_slide).file_name(".tif"));
                save(&render_channel(&spots, size, sigma, 0.8 / sigma), &path)?;
                written += 1;
            }
            for action in 1..=3u8 {
                let path = target_dir.join(PlateFileName::new(&site, action, 1).file_name(".tif"));
                save(&render_channel(&spots, size, 0.6 + 0.2 * action as f32, 1.), &path)?;
                written += 1;
            }
            pb.inc(1);
        }
    }
    pb.finish_with_message("✅ plate written!");
    Ok(written)
}

fn save(image: &ImageBuffer<Luma<u16>, Vec<u16>>, path: &Path) -> anyhow::Result<()> {
    image
        .save(path)
        .with_context(|| format!("failed to write {:?}", path))
}

fn inspect_plate(
    root: &str,
    magnification: Magnification,
    extension: &str,
    train_ratio: f64,
    layout: ChannelLayout,
) -> anyhow::Result<()> {
    let image_root = PathBuf::from(root).join(magnification.folder_name());
    let index = PlateFileIndex::scan(&layout.input_dir(&image_root), extension)?;
    let profile = magnification.profile();
    println!(
        "📂 {} files in {:?}, {} follow the channel naming scheme",
        index.file_count(),
        index.dir(),
        index.channel_file_count()
    );
    println!("🧫 {} wells: {}", index.wells().len(), index.wells().join(", "));

    let universe = profile.site_universe(index.wells());
    println!(
        "📍 {} sites ({} per well, {} z-slides)",
        universe.len(),
        profile.sites_per_well,
        profile.z_slides
    );
    let split = SiteSplit::partition(universe, train_ratio, &mut rand::rng())?;
    println!(
        "✂️  ratio {}: {} training / {} validation sites",
        train_ratio,
        split.training.len(),
        split.validation.len()
    );
    Ok(())
}
