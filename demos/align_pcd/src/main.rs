use argh::FromArgs;
use std::{path::PathBuf, process::ExitCode, time::Instant};

use kabsch::align::{
    self, metrics::MetricError, report::AlignmentReport, AlignConfig, AlignError, ColumnPairing,
    ReflectionPolicy, SolverParams, Timings,
};
use kabsch::dist::ExecutionStrategy;
use kabsch::k3d::{io::pcd, pointset::PointSet};
use kabsch::linalg::jacobi::JacobiParams;

#[derive(FromArgs)]
/// Rigid alignment of two corresponding point clouds
struct Args {
    /// path to the source point cloud
    #[argh(option)]
    source_path: PathBuf,

    /// path to the target point cloud, paired point by point with the source
    #[argh(option)]
    target_path: PathBuf,

    /// number of workers the correspondences are partitioned across
    #[argh(option, default = "4")]
    num_workers: usize,

    /// number of threads running the workers, all cores when omitted
    #[argh(option)]
    threads: Option<usize>,

    /// convergence tolerance of the eigensolver
    #[argh(option)]
    tolerance: Option<f64>,

    /// treat the tolerance as an absolute bound on the off-diagonal energy
    #[argh(switch)]
    absolute_tolerance: bool,

    /// maximum number of Jacobi rotations per eigensolve
    #[argh(option, default = "1000")]
    max_iterations: usize,

    /// use the raw eigenbases instead of deriving U from V
    #[argh(switch)]
    independent_pairing: bool,

    /// keep a reflection instead of correcting it to a rotation
    #[argh(switch)]
    keep_reflection: bool,

    /// print the report as json
    #[argh(switch)]
    json: bool,
}

impl Args {
    fn config(&self) -> AlignConfig {
        let mut jacobi = match self.absolute_tolerance {
            true => JacobiParams::absolute(),
            false => JacobiParams::default(),
        };
        if let Some(tolerance) = self.tolerance {
            jacobi.tolerance = tolerance;
        }
        jacobi.max_iterations = self.max_iterations;

        AlignConfig {
            num_workers: self.num_workers,
            execution: match self.threads {
                None => ExecutionStrategy::Parallel,
                Some(0 | 1) => ExecutionStrategy::Serial,
                Some(n) => ExecutionStrategy::Fixed(n),
            },
            solver: SolverParams {
                jacobi,
                pairing: match self.independent_pairing {
                    true => ColumnPairing::Independent,
                    false => ColumnPairing::Aligned,
                },
                reflection: match self.keep_reflection {
                    true => ReflectionPolicy::Preserve,
                    false => ReflectionPolicy::Correct,
                },
            },
        }
    }
}

fn run(args: &Args) -> Result<(AlignmentReport, Option<MetricError>), AlignError> {
    let start = Instant::now();

    let source = PointSet::centered(pcd::read_pcd(&args.source_path)?)?;
    log::info!("source cloud: #{} points", source.len());

    let target = PointSet::centered(pcd::read_pcd(&args.target_path)?)?;
    log::info!("target cloud: #{} points", target.len());

    let load = start.elapsed();

    let alignment = align::align(&source, &target, &args.config())?;
    let timings = Timings::new(load, alignment.compute_time);

    Ok((
        AlignmentReport::new(&alignment, &timings),
        alignment.errors.err(),
    ))
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Args = argh::from_env();

    let (report, metric) = match run(&args) {
        Ok(outcome) => outcome,
        Err(err) => {
            let stage = err.stage();
            eprintln!("error: {stage} stage failed: {err}");
            return ExitCode::from(stage.exit_code());
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("error: failed to serialize the report: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{report}");
    }

    // the transform is printed either way, only the error figures are missing
    if let Some(metric) = metric {
        let err = AlignError::from(metric);
        eprintln!("error: {} stage failed: {err}", err.stage());
        return ExitCode::from(err.stage().exit_code());
    }

    ExitCode::SUCCESS
}
