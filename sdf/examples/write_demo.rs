//! Build a small two-page SDF file from scratch.
//!
//! Run with: cargo run --example write_demo -- demo.sdf [--ascii]

use sdf::{ArrayDef, ColumnDef, DataMode, ParameterDef, ScalarType, SdfWriter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "demo.sdf".to_string());
    let mode = if args.any(|a| a == "--ascii") {
        DataMode::ascii()
    } else {
        DataMode::binary()
    };

    let mut out = SdfWriter::create(
        &path,
        mode,
        Some("demonstration stream"),
        Some("synthetic beam history"),
    )?;

    out.define_parameter(ParameterDef::new("t", ScalarType::F64).with_units("s"))?;
    out.define_parameter(
        ParameterDef::new("machine", ScalarType::String).with_fixed_value("demo ring"),
    )?;
    out.define_column(ColumnDef::new("x", ScalarType::F64).with_units("mm"))?;
    out.define_column(ColumnDef::new("xp", ScalarType::F64).with_units("mrad"))?;
    out.define_column(ColumnDef::new("label", ScalarType::String))?;
    out.define_array(ArrayDef::new("profile", ScalarType::F32, 2))?;

    for page in 0..2u32 {
        let rows = 4 + page as usize;
        out.start_page(rows)?;
        out.set_parameter("t", page as f64 * 0.5)?;
        let x: Vec<f64> = (0..rows).map(|r| (r as f64) * 1.25).collect();
        let xp: Vec<f64> = (0..rows).map(|r| (r as f64) * -0.1).collect();
        let labels: Vec<String> = (0..rows).map(|r| format!("bpm {r}")).collect();
        out.set_column("x", &x)?;
        out.set_column("xp", &xp)?;
        out.set_column("label", &labels)?;
        let profile: Vec<f32> = (0..6).map(|i| i as f32 / 2.0).collect();
        out.set_array("profile", &[2, 3], &profile)?;
        out.write_page()?;
    }

    out.terminate()?;
    println!("wrote 2 pages to {path}");
    Ok(())
}
