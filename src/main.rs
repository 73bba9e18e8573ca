use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use nalgebra::{Complex, DMatrix};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sdc_schur::io::{load_matrix_csv, save_eigenvalues_to_csv, save_matrix_to_csv};
use sdc_schur::kernels::{reconstruction_residual, unitarity_residual};
use sdc_schur::progress::spinner_progress;
use sdc_schur::{
    sdc, sdc_with_vectors, Communicator, ExhaustionPolicy, Grid, RandomContext, Result, SdcConfig,
    SdcContext, SdcError, SdcField, SdcReport, SignControl, SignScaling, ThreadComm, DEFAULT_SEED,
};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Schur decomposition by spectral divide-and-conquer
#[derive(Parser, Debug)]
#[command(
    name = "sdc-schur",
    about = "Compute Schur forms and eigenvalues of dense matrices by spectral divide-and-conquer",
    version,
    propagate_version = true,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decompose a matrix read from CSV or drawn at random
    Schur(SchurArgs),
    /// Write a random Gaussian matrix to CSV
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "random"])))]
struct SchurArgs {
    /// Headerless CSV file holding a square real matrix
    #[arg(short, long, value_name = "CSV")]
    input: Option<PathBuf>,
    /// Decompose a random Gaussian matrix of this order instead
    #[arg(long, value_name = "N")]
    random: Option<usize>,
    /// Draw the random matrix with complex entries
    #[arg(long, requires = "random")]
    complex: bool,
    /// Seed for the random matrix and the solver's random draws
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
    /// Largest block handed directly to the dense solver
    #[arg(long, default_value_t = 256)]
    cutoff: usize,
    /// Randomized attempts per spectral split
    #[arg(long, default_value_t = 10)]
    max_its: usize,
    /// Relative split tolerance (default 50·n·ε)
    #[arg(long)]
    rel_tol: Option<f64>,
    /// Skip the Schur vectors and only report eigenvalues
    #[arg(long)]
    values_only: bool,
    /// Leave the off-diagonal blocks of T untouched after each split
    #[arg(long)]
    skip_atr: bool,
    /// What to do when a split runs out of attempts
    #[arg(long, value_enum, default_value_t = PolicyArg::Dense)]
    on_exhaustion: PolicyArg,
    /// Rescaling applied at each step of the sign iteration
    #[arg(long, value_enum, default_value_t = ScalingArg::Frobenius)]
    sign_scaling: ScalingArg,
    /// Run on this many in-process ranks
    #[arg(long, default_value_t = 1)]
    ranks: usize,
    /// Directory for schur_t.csv, schur_q.csv and eigenvalues.csv
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
    /// Number of eigenvalues to print
    #[arg(long, default_value_t = 10)]
    show: usize,
    /// Hide the progress spinner
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Matrix order
    #[arg(short = 'n', long)]
    size: usize,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
    /// Destination CSV file
    #[arg(short, long, value_name = "CSV")]
    output: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Dense,
    Accept,
    Fail,
}

impl From<PolicyArg> for ExhaustionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Dense => ExhaustionPolicy::FallBackToDense,
            PolicyArg::Accept => ExhaustionPolicy::Accept,
            PolicyArg::Fail => ExhaustionPolicy::Fail,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScalingArg {
    None,
    Determinant,
    Frobenius,
}

impl From<ScalingArg> for SignScaling {
    fn from(arg: ScalingArg) -> Self {
        match arg {
            ScalingArg::None => SignScaling::None,
            ScalingArg::Determinant => SignScaling::Determinant,
            ScalingArg::Frobenius => SignScaling::Frobenius,
        }
    }
}

struct Solution<F: SdcField> {
    t: DMatrix<F>,
    q: Option<DMatrix<F>>,
    report: SdcReport,
}

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

fn random_matrix<F: SdcField>(n: usize, seed: u64) -> DMatrix<F> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    DMatrix::from_fn(n, n, |_, _| F::sample_gaussian(&mut rng))
}

fn solve_once<F: SdcField, C: Communicator>(
    mut t: DMatrix<F>,
    ctx: &mut SdcContext<'_, C>,
    config: &SdcConfig,
    vectors: bool,
) -> Result<Solution<F>> {
    if vectors {
        let (q, report) = sdc_with_vectors(&mut t, ctx, config)?;
        Ok(Solution {
            t,
            q: Some(q),
            report,
        })
    } else {
        let report = sdc(&mut t, ctx, config)?;
        Ok(Solution { t, q: None, report })
    }
}

/// Runs every rank on its own thread and keeps rank 0's result.
fn solve_on_threads<F: SdcField>(
    a: &DMatrix<F>,
    config: &SdcConfig,
    seed: u64,
    ranks: usize,
    vectors: bool,
) -> Result<Solution<F>> {
    let comms = ThreadComm::group(ranks);
    let results: Vec<Result<Solution<F>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .iter()
            .map(|comm| {
                scope.spawn(move || {
                    let mut ctx = SdcContext::new(Grid::square(comm), RandomContext::seeded(seed));
                    solve_once(a.clone(), &mut ctx, config, vectors)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
            .collect()
    });
    results
        .into_iter()
        .next()
        .unwrap_or_else(|| {
            Err(SdcError::InvalidArgument {
                arg: "ranks",
                reason: "at least one rank is required".to_string(),
            })
        })
}

fn solve<F: SdcField>(a: DMatrix<F>, config: &SdcConfig, args: &SchurArgs) -> Result<()> {
    let n = a.nrows();
    let vectors = !args.values_only;
    let solver_seed = args.seed.wrapping_add(1);

    let pb = spinner_progress("sdc", format!("decomposing order {}", n), !args.quiet);
    let solution = if args.ranks <= 1 {
        let mut ctx = SdcContext::local(solver_seed);
        solve_once(a.clone(), &mut ctx, config, vectors)
    } else {
        solve_on_threads(&a, config, solver_seed, args.ranks, vectors)
    };
    pb.finish_and_clear();
    let Solution { t, q, report } = solution?;

    println!(
        "order {}: {} split(s), {} dense block(s), {} exhausted split(s), {} dense fallback(s)",
        n, report.splits, report.dense_blocks, report.exhausted_splits, report.dense_fallbacks
    );
    if let Some(q) = &q {
        println!("unitarity residual: {:.3e}", unitarity_residual(q));
        println!("reconstruction residual: {:.3e}", reconstruction_residual(&a, q, &t));
    }
    println!("eigenvalues:");
    for (i, lambda) in report.eigenvalues.iter().take(args.show).enumerate() {
        println!("{:>6}  {:+.12e} {:+.12e}i", i, lambda.re, lambda.im);
    }
    if report.eigenvalues.len() > args.show {
        println!("   ... {} more", report.eigenvalues.len() - args.show);
    }

    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)?;
        save_matrix_to_csv(&t, dir.join("schur_t.csv"))?;
        if let Some(q) = &q {
            save_matrix_to_csv(q, dir.join("schur_q.csv"))?;
        }
        save_eigenvalues_to_csv(&report.eigenvalues, dir.join("eigenvalues.csv"))?;
        eprintln!("[INFO] Wrote Schur factors and eigenvalues to {}", dir.display());
    }
    Ok(())
}

fn run_schur(args: SchurArgs) -> Result<()> {
    let mut config = SdcConfig::default()
        .with_cutoff(args.cutoff)
        .with_max_its(args.max_its)
        .with_form_atr(!args.skip_atr)
        .with_exhaustion_policy(args.on_exhaustion.into())
        .with_sign_control(SignControl {
            scaling: args.sign_scaling.into(),
            ..SignControl::default()
        });
    if let Some(tol) = args.rel_tol {
        config = config.with_rel_tol(tol);
    }
    config.validate()?;

    match (&args.input, args.random) {
        (Some(path), _) => {
            let a = load_matrix_csv(path)?;
            eprintln!("[INFO] Loaded {}x{} matrix from {}", a.nrows(), a.ncols(), path.display());
            solve(a, &config, &args)
        }
        (None, Some(n)) if args.complex => solve(random_matrix::<Complex<f64>>(n, args.seed), &config, &args),
        (None, Some(n)) => solve(random_matrix::<f64>(n, args.seed), &config, &args),
        (None, None) => Err(SdcError::InvalidArgument {
            arg: "input",
            reason: "pass --input CSV or --random N".to_string(),
        }),
    }
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let a = random_matrix::<f64>(args.size, args.seed);
    save_matrix_to_csv(&a, &args.output)?;
    eprintln!(
        "[INFO] Wrote {}x{} Gaussian matrix to {}",
        args.size,
        args.size,
        args.output.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Schur(args) => run_schur(args),
        Command::Generate(args) => run_generate(args),
    };
    if let Err(err) = result {
        eprintln!("[sdc-schur error] {}", err);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
