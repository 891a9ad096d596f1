use anyhow::Context;
use clap::{Parser, Subcommand};
use jpeg_chaos::key::MIN_GENERATED_DIGITS;
use jpeg_chaos::{decrypt_jpeg_etc, encrypt_jpeg_etc, CryptoKey};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// jpeg-chaos - Chaotic JPEG scrambling tool
///
/// Generates logistic-map keys and splits colour JPEGs into three scrambled
/// grayscale channel images (and merges them back).
#[derive(Parser)]
#[command(name = "jpeg-chaos")]
#[command(version)]
#[command(about = "Reversible chaotic JPEG scrambling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random (x0, mu) key pair
    Keygen {
        /// Significant digits of x0
        #[arg(long, default_value_t = 24)]
        x0_digits: usize,

        /// Significant digits of mu
        #[arg(long, default_value_t = 24)]
        mu_digits: usize,
    },
    /// Scramble a colour JPEG into three grayscale channel JPEGs
    Split {
        /// Input colour JPEG
        #[arg(short, long)]
        input: PathBuf,

        /// Output red channel JPEG
        #[arg(short, long)]
        red: PathBuf,

        /// Output green channel JPEG
        #[arg(short, long)]
        green: PathBuf,

        /// Output blue channel JPEG
        #[arg(short, long)]
        blue: PathBuf,

        /// Initial value of the logistic map
        #[arg(long)]
        x0: String,

        /// Logistic map parameter
        #[arg(long)]
        mu: String,

        /// JPEG quality (1-100)
        #[arg(short, long, default_value_t = 90)]
        quality: u8,
    },
    /// Merge three scrambled channel JPEGs back into a colour JPEG
    Merge {
        /// Red channel JPEG
        #[arg(short, long)]
        red: PathBuf,

        /// Green channel JPEG
        #[arg(short, long)]
        green: PathBuf,

        /// Blue channel JPEG
        #[arg(short, long)]
        blue: PathBuf,

        /// Output colour JPEG
        #[arg(short, long)]
        output: PathBuf,

        /// Initial value of the logistic map
        #[arg(long)]
        x0: String,

        /// Logistic map parameter
        #[arg(long)]
        mu: String,

        /// JPEG quality (1-100)
        #[arg(short, long, default_value_t = 90)]
        quality: u8,
    },
}

fn print_banner() {
    println!("╔══════════════════════════════════════════╗");
    println!("║   jpeg-chaos v{:<27}║", env!("CARGO_PKG_VERSION"));
    println!("║   Logistic-map JPEG scrambler            ║");
    println!("╚══════════════════════════════════════════╝");
    println!();
}

/// Every file this tool reads or writes is a JPEG
fn validate_jpeg_path(path: &Path) -> anyhow::Result<()> {
    match path.extension().map(|ext| ext.to_string_lossy().to_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => Ok(()),
        Some(ext) => Err(anyhow::anyhow!(
            "'{}' has extension '.{}'; only JPEG files (.jpg, .jpeg) are supported",
            path.display(),
            ext
        )),
        None => Err(anyhow::anyhow!(
            "'{}' must have a .jpg or .jpeg extension",
            path.display()
        )),
    }
}

fn open_input(path: &Path) -> anyhow::Result<BufReader<File>> {
    validate_jpeg_path(path)?;
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn create_output(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn main() -> anyhow::Result<()> {
    // Initialize logger
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jpeg_chaos=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    print_banner();

    match cli.command {
        Commands::Keygen { x0_digits, mu_digits } => {
            if x0_digits < MIN_GENERATED_DIGITS || mu_digits < MIN_GENERATED_DIGITS {
                eprintln!(
                    "⚠️  Warning: fewer than {} digits requested, using {}",
                    MIN_GENERATED_DIGITS, MIN_GENERATED_DIGITS
                );
            }
            let key = CryptoKey::generate(x0_digits, mu_digits);
            println!("[✓] Key generated");
            println!("x0 = {}", key.x0());
            println!("mu = {}", key.mu());
            println!("[!] Keep both values secret; they are required to restore the image");
        }

        Commands::Split {
            input,
            red,
            green,
            blue,
            x0,
            mu,
            quality,
        } => {
            let key = CryptoKey::new(x0, mu).context("invalid key")?;
            for path in [&red, &green, &blue] {
                validate_jpeg_path(path)?;
            }

            println!("[*] Loading colour image: {}", input.display());
            let reader = open_input(&input)?;

            // Encode everything before touching the output files
            let (mut r, mut g, mut b) = (Vec::new(), Vec::new(), Vec::new());
            println!("[*] Scrambling 8x8 blocks and splitting channels...");
            encrypt_jpeg_etc(reader, &mut r, &mut g, &mut b, &key, quality)
                .context("channel split failed")?;

            for (path, bytes) in [(&red, &r), (&green, &g), (&blue, &b)] {
                fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
                println!("[✓] Wrote {} ({} bytes)", path.display(), bytes.len());
            }
            println!("[✓] Success! Image split into scrambled channels.");
        }

        Commands::Merge {
            red,
            green,
            blue,
            output,
            x0,
            mu,
            quality,
        } => {
            let key = CryptoKey::new(x0, mu).context("invalid key")?;
            validate_jpeg_path(&output)?;

            println!("[*] Loading channel images...");
            let (r, g, b) = (open_input(&red)?, open_input(&green)?, open_input(&blue)?);

            let mut merged = Vec::new();
            println!("[*] Restoring block order and merging channels...");
            decrypt_jpeg_etc(r, g, b, &mut merged, &key, quality).context("channel merge failed")?;

            let mut writer = create_output(&output)?;
            writer
                .write_all(&merged)
                .and_then(|_| writer.flush())
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("[✓] Wrote {} ({} bytes)", output.display(), merged.len());
            println!("[✓] Success! Channels merged.");
        }
    }

    Ok(())
}
