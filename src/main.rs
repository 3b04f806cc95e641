use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use locuswalk::genomics::io::read_alignments;
use locuswalk::genomics::{GenomicInterval, InMemoryAlignments, ReferenceSource};
use locuswalk::walker::{CompletionHook, FilterFn, Mapper, Reducer, UnitFilter, Walker};
use locuswalk::walkers::{self, SamOutput};
use locuswalk::{InMemoryReference, ReadUnit, TraversalConfig, TraversalEngine, TraversalOutcome};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "locuswalk", about = "Reference-ordered traversals over sorted read alignments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct TraversalArgs {
    /// Reference genome (FASTA).
    #[arg(short = 'R', long)]
    reference: PathBuf,
    /// Coordinate-sorted alignments (BAM/SAM).
    #[arg(short = 'I', long)]
    reads: PathBuf,
    /// Restrict the traversal to intervals (`chr`, `chr:start-end`), separated by `;`.
    #[arg(short = 'L', long)]
    intervals: Option<String>,
    /// Shards to run in parallel (1 runs sequentially).
    #[arg(long, default_value_t = 1)]
    shards: usize,
    /// Stop after this many units.
    #[arg(long)]
    max_units: Option<u64>,
    /// Visit loci with no coverage too.
    #[arg(long)]
    all_sites: bool,
    /// Units between progress log lines (0 disables).
    #[arg(long, default_value_t = locuswalk::framework::DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: u64,
    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Histogram of base qualities over every covered locus.
    QualHist {
        #[command(flatten)]
        traversal: TraversalArgs,
    },
    /// Per-read mismatches against the reference.
    Mismatches {
        #[command(flatten)]
        traversal: TraversalArgs,
    },
    /// Indel observations per locus.
    Indels {
        #[command(flatten)]
        traversal: TraversalArgs,
    },
    /// Depth of coverage distribution.
    Depth {
        #[command(flatten)]
        traversal: TraversalArgs,
    },
    /// Re-emit reads as SAM text, optionally restricted by mapping quality.
    PrintReads {
        #[command(flatten)]
        traversal: TraversalArgs,
        /// Output SAM file (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Skip reads below this mapping quality.
        #[arg(long, default_value_t = 0)]
        min_mapq: u8,
    },
}

impl Commands {
    fn traversal(&self) -> &TraversalArgs {
        match self {
            Commands::QualHist { traversal }
            | Commands::Mismatches { traversal }
            | Commands::Indels { traversal }
            | Commands::Depth { traversal }
            | Commands::PrintReads { traversal, .. } => traversal,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.command.traversal().verbose);

    match &cli.command {
        Commands::QualHist { traversal } => {
            let histogram = run_walker(traversal, &mut walkers::quality_histogram())?;
            println!("quality\tcount");
            print!("{histogram}");
        }
        Commands::Mismatches { traversal } => {
            let tally = run_walker(traversal, &mut walkers::mismatch_counter())?;
            println!("reads\t{}", tally.reads);
            println!("bases_compared\t{}", tally.compared);
            println!("mismatches\t{}", tally.mismatches);
            println!("mismatch_rate\t{:.6}", tally.rate());
            println!("mismatches_per_read\treads");
            print!("{}", tally.per_read);
        }
        Commands::Indels { traversal } => {
            let tally = run_walker(traversal, &mut walkers::indel_counter())?;
            println!("loci\t{}", tally.loci);
            println!("loci_with_indels\t{}", tally.loci_with_indels);
            println!("indel_observations\t{}", tally.observations);
            println!("base_observations\t{}", tally.bases);
        }
        Commands::Depth { traversal } => {
            let coverage = run_walker(traversal, &mut walkers::depth_of_coverage())?;
            println!("loci\t{}", coverage.loci());
            println!("mean_depth\t{:.3}", coverage.mean_depth());
            println!("depth\tloci");
            print!("{}", coverage.depths);
        }
        Commands::PrintReads {
            traversal,
            output,
            min_mapq,
        } => run_print_reads(traversal, output.as_deref(), *min_mapq)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_inputs(args: &TraversalArgs) -> Result<(InMemoryReference, InMemoryAlignments)> {
    let reference = InMemoryReference::from_fasta_path(&args.reference)
        .with_context(|| format!("failed to read reference from {}", args.reference.display()))?;
    let (alignments, header_contigs) = read_alignments(&args.reads)?;

    for contig in &header_contigs {
        match reference.contig_len(&contig.name) {
            None => warn!("Contig '{}' from the alignment header is missing from the reference", contig.name),
            Some(len) if len != contig.len => warn!(
                "Contig '{}' has length {} in the alignment header but {} in the reference",
                contig.name, contig.len, len
            ),
            Some(_) => {}
        }
    }
    info!(
        "Loaded {} contig(s) and {} alignment record(s)",
        reference.contigs().len(),
        alignments.len()
    );
    Ok((reference, alignments))
}

fn build_config(args: &TraversalArgs) -> Result<TraversalConfig> {
    let mut config = match args.shards {
        0 => bail!("--shards must be at least 1"),
        1 => TraversalConfig::sequential(),
        n => TraversalConfig::parallel(n),
    }
    .with_visit_uncovered(args.all_sites)
    .with_progress_interval(args.progress_interval);

    if let Some(text) = &args.intervals {
        let intervals = GenomicInterval::parse_list(text)
            .with_context(|| format!("invalid --intervals '{text}'"))?;
        config = config.with_intervals(intervals);
    }
    if let Some(limit) = args.max_units {
        config = config.with_max_units(limit);
    }
    Ok(config)
}

fn run_walker<F, M, R, H>(args: &TraversalArgs, walker: &mut Walker<F, M, R, H>) -> Result<H::Output>
where
    M: Mapper + Sync,
    F: UnitFilter<M::Unit> + Sync,
    R: Reducer<M::Value> + Sync,
    R::Accumulator: Send,
    H: CompletionHook<R::Accumulator>,
{
    let (reference, alignments) = load_inputs(args)?;
    let mut engine = TraversalEngine::new(&reference, build_config(args)?);
    let TraversalOutcome { output, summary } = engine
        .run(&alignments, walker)
        .with_context(|| format!("traversal '{}' failed", walker.name()))?;

    if !summary.map_errors.is_empty() {
        warn!("{} unit(s) could not be mapped", summary.map_errors.len());
    }
    if !summary.pileup_warnings.is_empty() {
        warn!("{} read(s) excluded from pileups", summary.pileup_warnings.len());
    }
    Ok(output)
}

fn run_print_reads(args: &TraversalArgs, output: Option<&Path>, min_mapq: u8) -> Result<()> {
    let destination = match output {
        Some(path) => SamOutput::Path(path.to_path_buf()),
        None => SamOutput::Stdout,
    };

    let (reference, alignments) = load_inputs(args)?;
    let mut walker = walkers::print_reads(destination, reference.contigs().to_vec())
        .with_filter(FilterFn::new(move |unit: &ReadUnit| unit.read.mapq >= min_mapq));

    let mut engine = TraversalEngine::new(&reference, build_config(args)?);
    let outcome = engine
        .run(&alignments, &mut walker)
        .context("traversal 'PrintReads' failed")?;
    info!(
        "Wrote {} read(s), {} below mapping quality {}",
        outcome.output, outcome.summary.units_filtered, min_mapq
    );
    Ok(())
}
