use std::path::{Path, PathBuf};
use std::process;

use amiramesh::{
    AmiraMeshReader, AmiraMeshWriter, DecodeOptions, EncodeOptions, EncodingMode, Result,
    VolumeStack,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

/// Inspect and convert AmiraMesh volume files
#[derive(Parser)]
#[command(name = "amiramesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the preamble of an AmiraMesh file
    Info {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Print an AmiraMesh 3D ASCII spreadsheet as tab-separated text
    Table {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Re-encode an 8-bit lattice
    Convert {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Payload encoding (default: rle for label fields, zlib otherwise)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Decode and encode the whole volume in one buffer
        #[arg(long)]
        fast: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Raw,
    Rle,
    Zlib,
}

impl From<ModeArg> for EncodingMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Raw => EncodingMode::Raw,
            ModeArg::Rle => EncodingMode::Rle,
            ModeArg::Zlib => EncodingMode::Zlib,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Info { input } => print_info(&input),
        Commands::Table { input } => print_table(&input),
        Commands::Convert {
            input,
            output,
            mode,
            fast,
        } => convert(&input, &output, mode.map(Into::into), fast),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        process::exit(1);
    }
}

fn print_info(input: &Path) -> Result<()> {
    let reader = AmiraMeshReader::open(input, DecodeOptions::default())?;
    let header = &reader.header;

    println!("File: {}", input.display());
    println!("{}", "=".repeat(60));
    println!("  Encoding: {}", header.mode);
    match header.lattice {
        Some(lattice) => {
            println!(
                "  Lattice: {} x {} x {}",
                lattice.width, lattice.height, lattice.num_slices
            );
            println!("  Element width: {} byte(s)", header.element_width);
            println!("  Byte order: {}", header.byte_order);
        }
        None => {
            let names: Vec<&str> = header.columns.iter().map(|c| c.name.as_str()).collect();
            println!("  Columns: {}", names.join(", "));
        }
    }
    if let Some(length) = header.compressed_length {
        println!("  Compressed length: {} bytes", length);
    }
    println!("  Data offset: {}", header.data_offset);
    println!("  Label field: {}", header.parameters.is_label_field());

    if !header.parameters.is_empty() {
        println!("\nParameters:");
        print!("{}", header.parameters.to_text());
    }
    Ok(())
}

fn print_table(input: &Path) -> Result<()> {
    let table = AmiraMeshReader::open(input, DecodeOptions::default())?.read_table()?;
    println!("{}", table.headings());
    println!("{}", table.body());
    Ok(())
}

fn convert(input: &Path, output: &Path, mode: Option<EncodingMode>, fast: bool) -> Result<()> {
    let reader = AmiraMeshReader::open(input, DecodeOptions::default())?;
    let parameters = reader.header.parameters.clone();
    let report = |done: usize, total: usize| info!("Slice {}/{}", done, total);

    let mut stack = VolumeStack::for_descriptor(&reader.descriptor()?, &parameters);
    if fast {
        reader.read_stack_fast_with_progress(&mut stack, report)?;
    } else {
        reader.read_stack_with_progress(&mut stack, report)?;
    }

    let mut writer = AmiraMeshWriter::create(output, EncodeOptions { mode, fast })?;
    let parameters = (!parameters.is_empty()).then_some(&parameters);
    let summary = writer.write_with_progress(&stack, parameters, report)?;

    println!(
        "Wrote {} ({} encoding, {} payload bytes)",
        output.display(),
        summary.mode,
        summary.payload_length
    );
    Ok(())
}
