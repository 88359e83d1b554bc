// crates/whatprot-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

//! Command-line entry point: `classify {hmm|nn|hybrid}` scores radiometries
//! against a dye-seq library under a fitted [`SequencingModel`]; `fit` runs
//! the outer EM convergence loop that produces one.

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use tracing::info;

use whatprot_classify::{build_training_set, NnClassifier, TrainingEntry};
use whatprot_hmm::{DyeSeq, Hmm, Radiometry};
use whatprot_io::{
    read_dye_seqs, read_radiometries_binary, read_radiometries_text, write_scored_classifications,
    ScoredClassification, SourcedDyeSeq,
};
use whatprot_model::{ChannelModel, DecayingRateModel, SequencingModel, SequencingModelFitter};

#[derive(Parser, Debug)]
#[command(
    name = "whatprot",
    about = "Protein fluorosequencing HMM classifier and model fitter",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Score radiometries against a dye-seq library and write one
    /// prediction per radiometry.
    Classify {
        /// Which classifier to run.
        #[arg(value_enum)]
        method: ClassifyMethod,

        /// Dye-seq library (schema in `whatprot_io::dye_seq`).
        dye_seqs: PathBuf,

        /// Radiometry batch (text by default; pass `--binary` for the raw
        /// little-endian form).
        radiometries: PathBuf,

        /// Output path for `id,score,total,adjusted_score` rows.
        predictions: PathBuf,

        /// Fitted sequencing model snapshot (required by `hmm`/`hybrid`;
        /// also used by `nn`/`hybrid` to simulate the training set).
        #[arg(long)]
        model: PathBuf,

        /// Radiometries file is the raw binary format, not text.
        #[arg(long, default_value_t = false)]
        binary: bool,

        /// Neighbors considered per `nn`/`hybrid` classification.
        #[arg(long, default_value_t = 10)]
        k: usize,

        /// Simulated training tracks drawn per dye-seq for `nn`/`hybrid`.
        #[arg(long, default_value_t = 200)]
        samples_per_source: usize,

        /// Candidates `hybrid` asks the nn pre-filter to hand to the HMM.
        #[arg(long, default_value_t = 5)]
        hybrid_candidates: usize,

        /// RNG seed for `nn`/`hybrid`'s simulated training set.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Worker threads (0 = rayon default, one per core).
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },

    /// Run the EM outer loop: repeatedly score every (dye-seq, radiometry)
    /// pair, accumulate expected sufficient statistics, and refit the
    /// model, until it stops moving or an epoch cap is hit.
    Fit {
        /// Dye-seq library; each record's `copy_count` is the number of
        /// consecutive entries in `radiometries` sampled from that peptide.
        dye_seqs: PathBuf,

        /// Radiometry batch, one entry per simulated/observed molecule,
        /// grouped by dye-seq in the same order as `dye_seqs`.
        radiometries: PathBuf,

        /// Output path for the fitted model snapshot.
        model_out: PathBuf,

        /// Radiometries file is the raw binary format, not text.
        #[arg(long, default_value_t = false)]
        binary: bool,

        /// Starting model snapshot (uninformative per-channel defaults if
        /// omitted).
        #[arg(long)]
        init_model: Option<PathBuf>,

        /// Maximum number of EM epochs.
        #[arg(long, default_value_t = 20)]
        epochs: usize,

        /// Stop once `SequencingModel::distance` between successive epochs
        /// drops below this.
        #[arg(long, default_value_t = 1e-4)]
        threshold: f64,

        /// Worker threads (0 = rayon default, one per core).
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum ClassifyMethod {
    /// Exact HMM forward-pass likelihood over the whole library.
    Hmm,
    /// Approximate brute-force k-nearest-neighbor over simulated tracks.
    Nn,
    /// Nn pre-filter narrows the library, HMM scores the survivors exactly.
    Hybrid,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Classify {
            method,
            dye_seqs,
            radiometries,
            predictions,
            model,
            binary,
            k,
            samples_per_source,
            hybrid_candidates,
            seed,
            threads,
        } => classify(
            method,
            &dye_seqs,
            &radiometries,
            &predictions,
            &model,
            binary,
            k,
            samples_per_source,
            hybrid_candidates,
            seed,
            threads,
        ),
        Cmd::Fit {
            dye_seqs,
            radiometries,
            model_out,
            binary,
            init_model,
            epochs,
            threshold,
            threads,
        } => fit(
            &dye_seqs,
            &radiometries,
            &model_out,
            binary,
            init_model.as_deref(),
            epochs,
            threshold,
            threads,
        ),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

fn configure_threads(threads: usize) -> Result<()> {
    if threads == 0 {
        return Ok(());
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("configuring worker thread pool")
}

fn read_radiometry_batch(path: &Path, binary: bool) -> Result<Vec<Radiometry>> {
    if binary {
        read_radiometries_binary(path)
    } else {
        read_radiometries_text(path)
    }
}

#[allow(clippy::too_many_arguments)]
fn classify(
    method: ClassifyMethod,
    dye_seqs_path: &Path,
    radiometries_path: &Path,
    predictions_path: &Path,
    model_path: &Path,
    binary: bool,
    k: usize,
    samples_per_source: usize,
    hybrid_candidates: usize,
    seed: u64,
    threads: usize,
) -> Result<()> {
    configure_threads(threads)?;

    let model = whatprot_model::persist::load(
        &std::fs::read_to_string(model_path)
            .with_context(|| format!("open model {}", model_path.display()))?,
    )
    .with_context(|| format!("parsing model {}", model_path.display()))?;

    let (num_channels, dye_seqs) =
        read_dye_seqs(dye_seqs_path).with_context(|| format!("reading {}", dye_seqs_path.display()))?;
    ensure!(
        num_channels == model.num_channels(),
        "dye-seq library has {num_channels} channels, model has {}",
        model.num_channels()
    );

    let radiometries = read_radiometry_batch(radiometries_path, binary)
        .with_context(|| format!("reading {}", radiometries_path.display()))?;

    info!(
        dye_seqs = dye_seqs.len(),
        radiometries = radiometries.len(),
        ?method,
        "classifying"
    );

    let num_timesteps = radiometries.first().map_or(0, Radiometry::num_cycles);
    let needs_training = matches!(method, ClassifyMethod::Nn | ClassifyMethod::Hybrid);
    let entries: Vec<TrainingEntry> = if needs_training {
        let sources: Vec<(i64, DyeSeq, usize)> = dye_seqs
            .iter()
            .enumerate()
            .map(|(i, r)| (i as i64, r.dye_seq.clone(), r.copy_count))
            .collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let training = build_training_set(&model, &sources, num_timesteps, samples_per_source, &mut rng);
        ensure!(!training.is_empty(), "nn/hybrid classification needs at least one non-trivial simulated track");
        training
    } else {
        Vec::new()
    };

    let predictions: Vec<ScoredClassification> = radiometries
        .par_iter()
        .map(|radiometry| match method {
            ClassifyMethod::Hmm => classify_one_hmm(&model, &dye_seqs, radiometry, None),
            ClassifyMethod::Nn => {
                let nn = NnClassifier::new(&model, &entries, k.max(1));
                nn.classify(radiometry)
            }
            ClassifyMethod::Hybrid => {
                let nn = NnClassifier::new(&model, &entries, k.max(1));
                let shortlist = nn.classify_top_h(radiometry, hybrid_candidates.max(1));
                let allow: std::collections::HashSet<i64> =
                    shortlist.iter().map(|c| c.id).collect();
                classify_one_hmm(&model, &dye_seqs, radiometry, Some(&allow))
            }
        })
        .collect();

    write_scored_classifications(predictions_path, &predictions)
        .with_context(|| format!("writing predictions to {}", predictions_path.display()))?;
    info!(predictions = predictions.len(), out = %predictions_path.display(), "classification complete");
    Ok(())
}

/// One HMM classification: exact forward-pass likelihood against every
/// candidate in `dye_seqs` (or, when `restrict_to` is `Some`, just the
/// candidates whose index is in that set — the `hybrid` pre-filter), each
/// weighted by the candidate's library `copy_count` as a Bayesian prior.
fn classify_one_hmm(
    model: &SequencingModel,
    dye_seqs: &[SourcedDyeSeq],
    radiometry: &Radiometry,
    restrict_to: Option<&std::collections::HashSet<i64>>,
) -> ScoredClassification {
    let hmm = Hmm::new(model);
    let mut best: Option<(i64, f64)> = None;
    let mut total = 0.0;

    for (idx, record) in dye_seqs.iter().enumerate() {
        let id = idx as i64;
        if let Some(allow) = restrict_to {
            if !allow.contains(&id) {
                continue;
            }
        }
        let Ok(likelihood) = hmm.probability(&record.dye_seq, radiometry) else {
            continue;
        };
        let weight = likelihood * record.copy_count as f64;
        if !weight.is_finite() || weight < 0.0 {
            continue;
        }
        total += weight;
        let should_replace = match best {
            None => true,
            Some((_, b)) => weight > b,
        };
        if should_replace {
            best = Some((id, weight));
        }
    }

    match best {
        Some((id, score)) if total > 0.0 => {
            let result = ScoredClassification::new(id, score, total);
            if result.adjusted_score().is_nan() {
                ScoredClassification::degenerate()
            } else {
                result
            }
        }
        _ => ScoredClassification::degenerate(),
    }
}

/// Flatten the dye-seq library into one `(DyeSeq, Radiometry)` pair per
/// observation, consuming `copy_count` consecutive radiometries per record
/// in library order — the pairing `fit` trains against.
fn pair_with_radiometries<'a>(
    dye_seqs: &'a [SourcedDyeSeq],
    radiometries: &'a [Radiometry],
) -> Result<Vec<(&'a DyeSeq, &'a Radiometry)>> {
    let expected: usize = dye_seqs.iter().map(|r| r.copy_count).sum();
    ensure!(
        expected == radiometries.len(),
        "dye-seq library's copy counts sum to {expected} but {} radiometries were supplied",
        radiometries.len()
    );
    let mut pairs = Vec::with_capacity(radiometries.len());
    let mut cursor = 0usize;
    for record in dye_seqs {
        for _ in 0..record.copy_count {
            pairs.push((&record.dye_seq, &radiometries[cursor]));
            cursor += 1;
        }
    }
    Ok(pairs)
}

fn default_model(num_channels: usize) -> SequencingModel {
    SequencingModel::new(
        vec![ChannelModel::default(); num_channels],
        0.05,
        0.05,
        0.05,
        DecayingRateModel::new(0.02, 0.1, 0.5),
    )
}

fn fit(
    dye_seqs_path: &Path,
    radiometries_path: &Path,
    model_out_path: &Path,
    binary: bool,
    init_model_path: Option<&Path>,
    epochs: usize,
    threshold: f64,
    threads: usize,
) -> Result<()> {
    configure_threads(threads)?;
    ensure!(epochs > 0, "epochs must be positive");

    let (num_channels, dye_seqs) =
        read_dye_seqs(dye_seqs_path).with_context(|| format!("reading {}", dye_seqs_path.display()))?;
    let radiometries = read_radiometry_batch(radiometries_path, binary)
        .with_context(|| format!("reading {}", radiometries_path.display()))?;
    let pairs = pair_with_radiometries(&dye_seqs, &radiometries)?;

    let mut model = match init_model_path {
        Some(path) => whatprot_model::persist::load(
            &std::fs::read_to_string(path).with_context(|| format!("open model {}", path.display()))?,
        )
        .with_context(|| format!("parsing model {}", path.display()))?,
        None => default_model(num_channels),
    };
    ensure!(
        model.num_channels() == num_channels,
        "dye-seq library has {num_channels} channels, model has {}",
        model.num_channels()
    );

    for epoch in 0..epochs {
        let hmm = Hmm::new(&model);
        let (fitter, total_log_likelihood, skipped) = pairs
            .par_iter()
            .fold(
                || (SequencingModelFitter::new(num_channels), 0.0_f64, 0usize),
                |(mut fitter, mut ll, mut skipped), (dye_seq, radiometry)| {
                    match hmm.improve_fit(dye_seq, radiometry, &mut fitter) {
                        Ok(log_z) if log_z.is_finite() => ll += log_z,
                        _ => skipped += 1,
                    }
                    (fitter, ll, skipped)
                },
            )
            .reduce(
                || (SequencingModelFitter::new(num_channels), 0.0_f64, 0usize),
                |(mut a, a_ll, a_skipped), (b, b_ll, b_skipped)| {
                    a.merge(&b);
                    (a, a_ll + b_ll, a_skipped + b_skipped)
                },
            );

        let next_model = fitter.fit(&model);
        let distance = model.distance(&next_model);
        info!(
            epoch,
            log_likelihood = total_log_likelihood,
            skipped_zero_likelihood = skipped,
            distance,
            "fit epoch complete"
        );
        model = next_model;
        if distance < threshold {
            info!(epoch, distance, "converged");
            break;
        }
    }

    let text = whatprot_model::persist::save(&model);
    if let Some(dir) = model_out_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    std::fs::write(model_out_path, text)
        .with_context(|| format!("writing model to {}", model_out_path.display()))?;
    info!(out = %model_out_path.display(), "fit complete");
    Ok(())
}
