use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use fuller_core::codec::InstructionFormat;
use fuller_core::compiler::{PayloadCompiler, PayloadStats};
use fuller_core::payload::{DramVariant, PayloadDescription};
use fuller_core::timings::TimingParameters;
use fuller_core::verifier;
use fuller_rowgen::RowGeneratorConfig;
use log::info;
use serde::Serialize;

/// CLI arguments for the `compile_payload` binary.
///
/// Compiles a row sequence (given directly or produced by a registered
/// row-generator strategy) into a payload-executor program.
#[derive(Debug, Parser, Serialize, Clone)]
struct CliArgs {
    /// The timing parameter file (JSON).
    #[clap(long = "timings")]
    timings: String,
    /// Rows to hammer, as a comma-separated list.
    #[clap(long = "rows", value_delimiter = ',')]
    rows: Option<Vec<u32>>,
    /// Name of a registered row-generator strategy.
    #[clap(long = "generator")]
    generator: Option<String>,
    /// The row-generator configuration file (JSON).
    #[clap(long = "generator-config")]
    generator_config: Option<String>,
    /// Iteration number passed to the row generator.
    #[clap(long = "iteration", default_value = "0")]
    iteration: usize,
    /// The bank to hammer.
    #[clap(long = "bank", default_value = "0")]
    bank: u32,
    /// Combined number of row activations to issue.
    #[clap(long = "read-count", default_value = "1000000")]
    read_count: u64,
    /// Program memory capacity in instruction words.
    #[clap(long = "capacity", default_value = "4096")]
    capacity: usize,
    /// Bank address bits of the instruction format.
    #[clap(long = "bankbits", default_value = "3")]
    bankbits: u32,
    /// Row address bits of the instruction format.
    #[clap(long = "rowbits", default_value = "14")]
    rowbits: u32,
    /// Column address bits of the instruction format.
    #[clap(long = "colbits", default_value = "10")]
    colbits: u32,
    /// Do not issue refreshes; emit NOOP placeholders instead.
    #[clap(long = "no-refresh")]
    no_refresh: bool,
    /// Verify the compiled payload against this DRAM protocol.
    #[clap(long = "verify", value_enum)]
    verify: Option<DramArg>,
    /// Output file for the compilation report (JSON format).
    #[clap(long = "output")]
    output: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum DramArg {
    Ddr3,
    Ddr4,
}

impl From<DramArg> for DramVariant {
    fn from(arg: DramArg) -> Self {
        match arg {
            DramArg::Ddr3 => DramVariant::Ddr3,
            DramArg::Ddr4 => DramVariant::Ddr4,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompilationReport {
    date: String,
    args: CliArgs,
    rows: Vec<u32>,
    timings: TimingParameters,
    stats: PayloadStats,
    words: Vec<String>,
}

fn load_timings(path: &str) -> Result<TimingParameters> {
    let file = File::open(path).with_context(|| format!("failed to open {path}"))?;
    let timings: TimingParameters = serde_json::from_reader(file)
        .with_context(|| format!("failed to parse timing parameters from {path}"))?;
    timings.validate()?;
    Ok(timings)
}

fn resolve_rows(args: &CliArgs) -> Result<Vec<u32>> {
    match (&args.rows, &args.generator) {
        (Some(rows), None) => Ok(rows.clone()),
        (None, Some(name)) => {
            let config_path = args
                .generator_config
                .as_deref()
                .context("--generator requires --generator-config")?;
            let file = File::open(config_path)
                .with_context(|| format!("failed to open {config_path}"))?;
            let config: RowGeneratorConfig = serde_json::from_reader(file)
                .with_context(|| format!("failed to parse generator config from {config_path}"))?;
            let mut generator = fuller_rowgen::get_by_name(name, &config)?;
            let rows = generator.generate_rows(args.iteration);
            Ok(rows.into_iter().map(|row| row as u32).collect())
        }
        (Some(_), Some(_)) => bail!("--rows and --generator are mutually exclusive"),
        (None, None) => bail!("either --rows or --generator is required"),
    }
}

fn main() -> Result<()> {
    fuller_bin::init_logging();
    let args = CliArgs::parse();

    let timings = load_timings(&args.timings)?;
    let rows = resolve_rows(&args)?;
    let format = InstructionFormat::dfi(args.bankbits, args.rowbits, args.colbits)?;

    let compiler = PayloadCompiler::new(format, timings).with_refresh(!args.no_refresh);
    let payload = compiler.compile(&rows, args.bank, args.read_count, args.capacity)?;
    info!(
        "compiled {} words ({} cycles, {} refreshes)",
        payload.stats.size_words, payload.stats.expected_cycles, payload.stats.refreshes
    );

    if let Some(dram) = args.verify {
        let variant = DramVariant::from(dram);
        let description = PayloadDescription::from_program(&payload.program, timings, variant);
        let summary = verifier::verify(&description, variant)?;
        info!("verification OK after {} ticks", summary.ticks);
        fuller_bin::log_opcode_counts(&summary.executed);
    }

    if let Some(path) = &args.output {
        // The trailing zero padding up to capacity is implicit.
        let mut words = payload.program.words()?;
        words.truncate(payload.stats.size_words);
        let report = CompilationReport {
            date: chrono::Local::now().to_rfc3339(),
            args: args.clone(),
            rows,
            timings,
            stats: payload.stats,
            words: words.iter().map(|word| format!("{word:08x}")).collect(),
        };
        let file = File::create(path).with_context(|| format!("failed to create {path}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &report)?;
        writer.flush()?;
        info!("report written to {path}");
    }
    Ok(())
}
