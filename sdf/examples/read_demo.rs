//! Walk an SDF file and print its structure and values.
//!
//! Run with: cargo run --example read_demo -- demo.sdf

use sdf::{ReadOutcome, SdfReader};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demo.sdf".to_string());
    let mut input = SdfReader::open(&path)?;

    let (text, contents) = input.description();
    if let Some(text) = text {
        println!("description: {text}");
    }
    if let Some(contents) = contents {
        println!("contents:    {contents}");
    }
    println!("parameters:  {:?}", input.layout().parameter_names());
    println!("columns:     {:?}", input.layout().column_names());
    println!("arrays:      {:?}", input.layout().array_names());

    loop {
        match input.read_page()? {
            ReadOutcome::Page(n) => {
                println!("page {n}: {} rows", input.n_rows());
                for name in input
                    .layout()
                    .parameter_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                {
                    let rendered = input.parameter_as_string(&name)?;
                    println!("  {name} = {rendered}");
                }
                for name in input
                    .layout()
                    .column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                {
                    let values = input.column_as_strings(&name)?;
                    println!("  {name}: {}", values.join(", "));
                }
            }
            ReadOutcome::Truncated => {
                eprintln!("input is truncated; keeping the readable prefix");
                let page = input.accept_recovered_page()?;
                println!("page {page} (partial): {} rows", input.n_rows());
                break;
            }
            ReadOutcome::EndOfStream => break,
        }
    }

    input.diagnostics().print();
    input.terminate()?;
    Ok(())
}
