use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use fuller_core::payload::{DramVariant, PayloadDescription};
use fuller_core::verifier;
use log::{error, info};

/// CLI arguments for the `verify_payload` binary.
///
/// Replays a JSON payload description against the timing model of the
/// selected DRAM protocol and reports violations.
#[derive(Debug, Parser)]
struct CliArgs {
    /// The payload description file (JSON).
    payload: String,
    /// The DRAM protocol to verify against.
    #[clap(long = "dram", value_enum, default_value_t = DramArg::Ddr3)]
    dram: DramArg,
    /// Collect every violation instead of stopping at the first.
    #[clap(long = "all")]
    all: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
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

fn main() -> Result<()> {
    fuller_bin::init_logging();
    let args = CliArgs::parse();

    let payload = PayloadDescription::from_json_file(&args.payload)
        .with_context(|| format!("failed to load payload from {}", args.payload))?;
    let variant = DramVariant::from(args.dram);
    info!(
        "verifying {} instructions against {:?}",
        payload.instructions.len(),
        variant
    );

    let summary = if args.all {
        let (summary, errors) = verifier::verify_all(&payload, variant);
        if !errors.is_empty() {
            for error in &errors {
                error!("{error}");
            }
            bail!("{} timing constraint(s) violated", errors.len());
        }
        summary
    } else {
        verifier::verify(&payload, variant)?
    };

    info!("ticks elapsed: {}", summary.ticks);
    fuller_bin::log_opcode_counts(&summary.executed);
    info!("OK");
    Ok(())
}
