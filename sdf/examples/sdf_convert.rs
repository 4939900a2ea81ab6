//! Convert an SDF stream between wire modes, filtering pages on the way.
//!
//! Reads a file or standard input, writes a file, standard output, or the
//! input itself (in-place rewrite through a temporary file). Examples:
//!
//!   sdf_convert in.sdf out.sdf --binary
//!   sdf_convert in.sdf --remove-pages 2,4          # rewrite in place
//!   cat in.sdf | sdf_convert --pipe input,output --ascii > out.sdf

use clap::Parser;
use sdf::{
    parse_pipe_option, process_filenames, FileMode, PageFilter, PipeFlags, ReadOutcome,
    SdfConfig, SdfReader, SdfWriter,
};

#[derive(Parser)]
#[command(author, version, about = "Convert SDF streams between wire modes")]
struct Cli {
    /// Input file; omit with --pipe input
    input: Option<String>,

    /// Output file; defaults to rewriting the input in place
    output: Option<String>,

    /// Use standard streams: input, output, or input,output
    #[arg(long)]
    pipe: Option<String>,

    /// Force binary output
    #[arg(long, conflicts_with = "ascii")]
    binary: bool,

    /// Force textual output
    #[arg(long)]
    ascii: bool,

    /// First page to keep
    #[arg(long)]
    from_page: Option<u32>,

    /// Last page to keep
    #[arg(long)]
    to_page: Option<u32>,

    /// Keep only these pages (comma-separated)
    #[arg(long, value_delimiter = ',')]
    keep_pages: Option<Vec<u32>>,

    /// Drop these pages (comma-separated)
    #[arg(long, value_delimiter = ',')]
    remove_pages: Vec<u32>,

    /// Clip pages to at most this many rows
    #[arg(long)]
    row_limit: Option<u64>,

    /// Write the column table one column at a time
    #[arg(long)]
    column_major: bool,
}

fn run(cli: Cli) -> sdf::Result<()> {
    let pipe = match &cli.pipe {
        Some(spec) => parse_pipe_option(&format!("pipe={spec}"))
            .ok_or_else(|| sdf::SdfError::usage(format!("bad pipe specification {spec:?}")))?,
        None => PipeFlags::NONE,
    };
    let pair = process_filenames(
        "sdf_convert",
        cli.input.as_deref(),
        cli.output.as_deref(),
        pipe,
        true,
    )?;

    let config = SdfConfig {
        row_limit: cli.row_limit,
        ..sdf::default_config()
    };
    let mut input = SdfReader::from_source(pair.open_source()?, config)?;
    input.set_page_filter(PageFilter {
        from_page: cli.from_page,
        to_page: cli.to_page,
        keep_pages: cli.keep_pages.clone(),
        remove_pages: cli.remove_pages.clone(),
    });

    let mut mode = input.layout().data_mode;
    if cli.binary {
        mode.mode = FileMode::Binary;
    }
    if cli.ascii {
        mode.mode = FileMode::Ascii;
    }
    mode.column_major = cli.column_major;

    let mut output = SdfWriter::initialize_copy(&input, pair.open_sink()?)?;
    output.set_data_mode(mode)?;

    let mut pages = 0u32;
    loop {
        match input.read_page()? {
            ReadOutcome::Page(_) => {
                output.copy_page(&input)?;
                output.write_page()?;
                pages += 1;
            }
            ReadOutcome::Truncated => {
                input.accept_recovered_page()?;
                output.copy_page(&input)?;
                output.write_page()?;
                pages += 1;
                break;
            }
            ReadOutcome::EndOfStream => break,
        }
    }
    output.terminate()?;
    input.terminate()?;
    eprintln!("sdf_convert: {pages} pages written");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("sdf_convert: error: {err}");
        std::process::exit(1);
    }
}
