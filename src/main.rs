use anyhow::Result;
use std::env;

use municipio_registry::{PipelineConfig, PipelineDriver};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() > 1 && args[1] == "query" {
        // Interactive lookup mode
        run_query_mode(&args)?;
    } else {
        // Pipeline mode (default)
        run_pipeline(&args)?;
    }

    Ok(())
}

/// Args: municipio-registry [run] [data_dir] [source_url]
fn build_config(args: &[String], offset: usize) -> PipelineConfig {
    let mut config = PipelineConfig::default();

    if let Some(dir) = args.get(offset) {
        config.data_dir = dir.into();
    }
    if let Some(url) = args.get(offset + 1) {
        config.source_url = url.clone();
    }

    config
}

fn run_pipeline(args: &[String]) -> Result<()> {
    println!("🏛️  Municipality Registry Pipeline");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let skip = if args.get(1).map(String::as_str) == Some("run") { 2 } else { 1 };
    let config = build_config(args, skip);
    let driver = PipelineDriver::new(config);

    let report = driver.run()?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if report.first_run {
        println!("🎉 First run: base snapshot created");
    } else if let Some(diff) = &report.diff {
        if diff.is_empty() {
            println!("✓ No changes since base snapshot");
        } else {
            println!("✓ Changes vs base: {}", diff.summary());
        }
    }
    println!("✓ {} records parsed", report.record_count);
    println!("✓ Export: {}", report.export.summary());

    Ok(())
}

fn run_query_mode(args: &[String]) -> Result<()> {
    println!("🔎 Municipality Lookup (Press Enter on UF to quit)\n");

    let config = build_config(args, 2);
    let driver = PipelineDriver::new(config);

    let records = driver.load_records_for_lookup()?;
    println!("✓ Loaded {} records\n", records.len());

    municipio_registry::run_query_loop(&records)?;

    println!("\n✅ Lookup session closed");
    Ok(())
}
