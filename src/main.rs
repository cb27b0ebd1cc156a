use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::info;
use std::path::PathBuf;
use volconv::{
    BarProgress, CompressionLevel, CompressionMethod, ContainerReader, ConversionConfig,
    NoProgress, ProgressReporter, StreamPipeline, VolumeDescriptor,
};

#[derive(Parser)]
#[command(name = "volconv", version, about = "Convert raw voxel volumes to compressed containers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a raw headerless volume
    Convert {
        /// Raw volume file (dimensions read from <FILE>.xml unless --dims is given)
        input: PathBuf,
        /// Dimensions as DEPTH HEIGHT WIDTH (SIZEZ SIZEY SIZEX)
        #[arg(long, num_args = 3, value_names = ["DEPTH", "HEIGHT", "WIDTH"])]
        dims: Option<Vec<usize>>,
        /// Number of bunches the depth axis is split into
        #[arg(short, long, default_value = "64")]
        divisor: usize,
        /// Skip the 8-bit preview TIFFs
        #[arg(long)]
        no_previews: bool,
        /// Samples are unsigned integers (default: floating point for 2/4/8 bytes)
        #[arg(short, long)]
        integer: bool,
        /// Codec: deflate (default), zstd, none
        #[arg(short, long, default_value = "deflate")]
        codec: String,
        /// Compression level 0-9
        #[arg(short, long, default_value = "9")]
        level: u8,
        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show the manifest of a container
    Inspect { input: PathBuf },
}

#[tokio::main]
async fn main() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    builder.init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Convert {
            input,
            dims,
            divisor,
            no_previews,
            integer,
            codec,
            level,
            quiet,
        } => {
            let method: CompressionMethod = codec.parse()?;
            let mut config = ConversionConfig::new(&input)
                .with_divisor(divisor)
                .with_previews(!no_previews)
                .with_integer_data(integer)
                .with_compression(method, CompressionLevel::new(level));
            if let Some(d) = dims {
                config = config.with_dimensions(VolumeDescriptor::new(d[0], d[1], d[2])?);
            }

            let mut pipeline = StreamPipeline::new(config);
            let plan = pipeline
                .prepare()
                .await
                .with_context(|| format!("cannot convert {}", input.display()))?
                .clone();
            if plan.sample_type.is_float() {
                info!("Note: assuming floating point data unless --integer is given");
            }
            if pipeline.config().write_previews {
                info!("Note: the container holds the precise data; previews are 8-bit, for visualization only");
            }

            let progress: Box<dyn ProgressReporter> = if quiet {
                Box::new(NoProgress)
            } else {
                Box::new(BarProgress::new(plan.fractions.len()))
            };
            let report = pipeline
                .run(progress.as_ref())
                .await
                .with_context(|| format!("conversion of {} failed", input.display()))?;

            println!("Saved {}", report.container_path.display());
            if let Some(dir) = &report.preview_dir {
                println!("Saved {} previews to {}", report.previews_written, dir.display());
            }
            println!("  {}", report.manifest.summary());
        }

        Commands::Inspect { input } => {
            let reader = ContainerReader::open(&input)
                .await
                .with_context(|| format!("cannot open {}", input.display()))?;
            let manifest = reader.manifest();
            println!("Container: {}", input.display());
            println!("  {}", manifest.summary());
            println!("  id:      {}", manifest.id);
            println!("  created: {}", manifest.created_at.to_rfc3339());
            println!("{:>10} {:>8} {:>12} {:>12} {:>10}", "Start", "Slices", "Raw", "Stored", "CRC32");
            for chunk in &manifest.chunks {
                println!(
                    "{:>10} {:>8} {:>12} {:>12} {:>10x}",
                    chunk.start,
                    chunk.slices,
                    volconv::utils::format_bytes(chunk.uncompressed_size),
                    volconv::utils::format_bytes(chunk.compressed_size),
                    chunk.checksum
                );
            }
        }
    }
    Ok(())
}
