use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use nalgebra::Vector3;
use nbins::{
    backend::{Backend, Rayon, Sequential},
    generate,
    grid::{BinningStrategy, GridSpec},
    shared::{PointParticle, SimulationSettings},
    solver::{BinnedSolver, DirectSolver, ErrorStats, ForceSolver},
};

type Body = PointParticle<f32, 3>;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendKind {
    Sequential,
    Rayon,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    /// Rescan every body once per cell
    Scan,
    /// Assign each body once, then scatter
    Partition,
}

impl From<Strategy> for BinningStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Scan => BinningStrategy::Scan,
            Strategy::Partition => BinningStrategy::Partition,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Method {
    Binned,
    Direct,
}

/// Gravitational acceleration of a seeded cloud of unit masses, binned on a uniform grid.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of bodies
    #[arg(short = 'n', long, default_value_t = 320_000)]
    bodies: usize,

    /// Grid cells per axis
    #[arg(long, default_value_t = 10)]
    cells: usize,

    /// Edge length of one cell
    #[arg(long, default_value_t = 100.0)]
    cell_length: f32,

    /// Bodies are generated in [0, space) along every axis
    #[arg(long, default_value_t = 1000.0)]
    space: f32,

    #[arg(long, default_value_t = 1e-10)]
    softening: f32,

    /// Gravitational constant
    #[arg(short, long, default_value_t = 1.0)]
    g: f32,

    #[arg(long, default_value_t = generate::DEFAULT_SEED)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = BackendKind::Rayon)]
    backend: BackendKind,

    /// Worker threads for the rayon backend, one per core when unset
    #[arg(long)]
    threads: Option<usize>,

    #[arg(long, value_enum, default_value_t = Strategy::Partition)]
    strategy: Strategy,

    #[arg(long, value_enum, default_value_t = Method::Binned)]
    method: Method,

    /// Also run direct summation and log the deviation from it
    #[arg(long)]
    compare: bool,

    /// Print at most this many bodies
    #[arg(long)]
    limit: Option<usize>,

    /// Write accelerations as raw native-endian [f32; 4] records
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the per-body printout
    #[arg(short, long)]
    quiet: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn solve<S, B>(solver: &S, bodies: &[Body], backend: &B) -> Vec<Vector3<f32>>
where
    S: ForceSolver<f32, 3>,
    B: Backend,
{
    debug!("running {} solver on {} backend", solver.name(), backend.name());
    solver.accelerations(bodies, backend)
}

fn print_results(bodies: &[Body], accelerations: &[Vector3<f32>], limit: usize) -> io::Result<()> {
    let mut out = BufWriter::new(io::stdout().lock());
    for (body, a) in bodies.iter().zip(accelerations).take(limit) {
        let p = &body.position;
        writeln!(
            out,
            "({:.2},{:.2},{:.2},{:.2}) ({:.3},{:.3},{:.3})",
            p.x, p.y, p.z, body.mass, a.x, a.y, a.z
        )?;
    }
    out.flush()
}

fn write_binary(path: &Path, accelerations: &[Vector3<f32>]) -> io::Result<()> {
    let records: Vec<[f32; 4]> = accelerations.iter().map(|a| [a.x, a.y, a.z, 0.0]).collect();
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(bytemuck::cast_slice(&records))?;
    file.flush()
}

fn run<B: Backend>(args: &Args, backend: &B) -> Result<()> {
    let spec = GridSpec::<f32, 3>::new(args.cells, args.cell_length)?;
    let settings = SimulationSettings {
        g: args.g,
        softening: args.softening,
    };
    if args.space > spec.extent() {
        warn!(
            "bodies span [0, {}) but the grid only covers [0, {}); bodies beyond it belong to no cell",
            args.space,
            spec.extent()
        );
    }

    let bodies = generate::uniform_cube::<3>(args.bodies, args.space, args.seed)?;
    info!(
        "generated {} bodies in [0, {})^3 with seed {}",
        bodies.len(),
        args.space,
        args.seed
    );

    let direct = DirectSolver::new(settings.clone())?;
    let accelerations = match args.method {
        Method::Binned => {
            let solver = BinnedSolver::new(spec, settings)?.with_strategy(args.strategy.into());
            solve(&solver, &bodies, backend)
        }
        Method::Direct => solve(&direct, &bodies, backend),
    };

    if args.compare && args.method != Method::Direct {
        let reference = solve(&direct, &bodies, backend);
        let stats = ErrorStats::compare(&accelerations, &reference);
        info!(
            "relative error against direct summation: max {:.3e} (body {}), mean {:.3e}",
            stats.max, stats.worst, stats.mean
        );
    }

    if let Some(path) = &args.output {
        write_binary(path, &accelerations)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {} accelerations to {}", accelerations.len(), path.display());
    }

    if !args.quiet {
        print_results(&bodies, &accelerations, args.limit.unwrap_or(usize::MAX))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    match args.backend {
        BackendKind::Sequential => run(&args, &Sequential),
        BackendKind::Rayon => {
            let backend = match args.threads {
                Some(threads) => Rayon::with_threads(threads)?,
                None => Rayon::new(),
            };
            info!("rayon backend with {} threads", backend.threads());
            run(&args, &backend)
        }
    }
}
