use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use data_loader::parser::{self, MOVIELENS_MOVIE_COLUMNS, MOVIELENS_RATING_COLUMNS};
use data_loader::{Aggregation, FsStore, MatrixBuilder, MatrixStore, Recommendation, Table};
use factorization::{FactorizationConfig, FactorizationRecommender, NmfModel, RngSource};
use neighborhood::{NeighborhoodRecommender, RatingPolicy};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// recsys - Collaborative filtering recommender
#[derive(Parser)]
#[command(name = "recsys")]
#[command(about = "Item recommendations from a user-item rating matrix", long_about = None)]
struct Cli {
    /// Directory holding the rating matrix, model and latent factors
    #[arg(short, long, default_value = "models")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join an item table with a rating table and save the rating matrix
    Build {
        /// Item table (e.g. movies.csv or movies.dat)
        #[arg(long)]
        items: PathBuf,

        /// Rating table (e.g. ratings.csv or ratings.dat)
        #[arg(long)]
        ratings: PathBuf,

        /// Input file format
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,

        /// Join column present in both tables
        #[arg(long, default_value = "movieId")]
        feature_key: String,

        /// Column whose values become matrix rows
        #[arg(long, default_value = "userId")]
        user_key: String,

        /// Column holding the numeric rating
        #[arg(long, default_value = "rating")]
        value: String,

        /// Column whose values become matrix columns
        #[arg(long, default_value = "title")]
        label: String,

        /// How repeated (user, item) ratings are combined
        #[arg(long, value_enum, default_value_t = AggregationArg::Mean)]
        aggregation: AggregationArg,
    },

    /// Fit the factorization model on the saved rating matrix
    Fit {
        /// Number of latent factors
        #[arg(long, default_value = "50")]
        components: usize,

        /// Upper bound on solver iterations
        #[arg(long, default_value = "1000")]
        max_iterations: usize,

        /// Relative error improvement below which the solver stops
        #[arg(long, default_value = "1e-4")]
        tolerance: f64,

        /// Seed for a reproducible fit
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Recommend items for an anonymous user who liked the given items
    Query {
        /// Item the user liked (repeat for several)
        #[arg(long = "item", required = true)]
        items: Vec<String>,

        /// Number of recommendations to show
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Seed for the synthetic ratings
        #[arg(long)]
        seed: Option<u64>,

        /// Print the recommendations as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recommend unseen items for a known user from similar users
    Neighbors {
        /// User to recommend for
        #[arg(long)]
        user: String,

        /// Only items whose predicted score exceeds this are returned
        #[arg(long, default_value = "3.5")]
        threshold: f64,

        /// Number of neighbours consulted
        #[arg(long, default_value = "5")]
        neighbors: usize,

        /// Which rating a neighbour contributes
        #[arg(long, value_enum, default_value_t = PolicyArg::TargetImputed)]
        policy: PolicyArg,

        /// Print the recommendations as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Headered CSV, empty cells are missing values
    Csv,
    /// MovieLens 1M `::`-separated files
    Dat,
}

#[derive(Clone, Copy, ValueEnum)]
enum AggregationArg {
    Mean,
    First,
    Last,
}

impl From<AggregationArg> for Aggregation {
    fn from(arg: AggregationArg) -> Self {
        match arg {
            AggregationArg::Mean => Aggregation::Mean,
            AggregationArg::First => Aggregation::First,
            AggregationArg::Last => Aggregation::Last,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    TargetImputed,
    NeighborObserved,
}

impl From<PolicyArg> for RatingPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::TargetImputed => RatingPolicy::TargetImputed,
            PolicyArg::NeighborObserved => RatingPolicy::NeighborObserved,
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = FsStore::new(&cli.store);

    match cli.command {
        Commands::Build {
            items,
            ratings,
            format,
            feature_key,
            user_key,
            value,
            label,
            aggregation,
        } => {
            let builder = MatrixBuilder::new(feature_key, user_key, value, label)
                .with_aggregation(aggregation.into());
            handle_build(&store, &builder, &items, &ratings, format)?
        }
        Commands::Fit {
            components,
            max_iterations,
            tolerance,
            seed,
        } => {
            let config = FactorizationConfig {
                components,
                max_iterations,
                tolerance,
                seed,
            };
            handle_fit(&store, &config)?
        }
        Commands::Query {
            items,
            limit,
            seed,
            json,
        } => handle_query(&store, &items, limit, seed, json)?,
        Commands::Neighbors {
            user,
            threshold,
            neighbors,
            policy,
            json,
        } => {
            let recommender = NeighborhoodRecommender::new()
                .with_neighbor_count(neighbors)
                .with_rating_policy(policy.into());
            handle_neighbors(&store, &recommender, &user, threshold, json)?
        }
    }

    Ok(())
}

fn read_table(path: &Path, format: Format, dat_headers: &[&str]) -> Result<Table> {
    let table = match format {
        Format::Csv => parser::read_csv(path),
        Format::Dat => parser::read_dat(path, dat_headers),
    };
    table.with_context(|| format!("Failed to read {}", path.display()))
}

/// Handle the 'build' command
fn handle_build(
    store: &FsStore,
    builder: &MatrixBuilder,
    items: &Path,
    ratings: &Path,
    format: Format,
) -> Result<()> {
    let start = Instant::now();
    let items = read_table(items, format, &MOVIELENS_MOVIE_COLUMNS)?;
    let ratings = read_table(ratings, format, &MOVIELENS_RATING_COLUMNS)?;
    info!("Read {} item rows and {} rating rows", items.len(), ratings.len());

    let built = builder
        .build(&items, &ratings)
        .context("Failed to build the rating matrix")?;
    store
        .save_rating_matrix(&built.ratings)
        .context("Failed to save the rating matrix")?;

    let (users, columns) = built.ratings.shape();
    println!(
        "{} Built {} users x {} items ({} ratings, density {:.4}) in {:?}",
        "✓".green(),
        users,
        columns,
        built.ratings.observed_count(),
        built.ratings.density(),
        start.elapsed()
    );
    println!("  saved to {}", store.dir().display());
    Ok(())
}

/// Handle the 'fit' command
fn handle_fit(store: &FsStore, config: &FactorizationConfig) -> Result<()> {
    let start = Instant::now();
    let ratings = store
        .load_rating_matrix()
        .context("Failed to load the rating matrix; run 'build' first")?;
    let imputed = ratings.impute().context("Failed to impute the rating matrix")?;

    let recommender = FactorizationRecommender::fit(&imputed, config)
        .context("Failed to fit the factorization model")?;
    recommender
        .save(store)
        .context("Failed to save the factorization model")?;

    let model = recommender.model();
    println!(
        "{} Fitted {} components in {} iterations (reconstruction error {:.4}) in {:?}",
        "✓".green(),
        config.components,
        model.iterations(),
        model.reconstruction_error(),
        start.elapsed()
    );
    Ok(())
}

/// Handle the 'query' command
fn handle_query(
    store: &FsStore,
    items: &[String],
    limit: usize,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let recommender = FactorizationRecommender::<NmfModel>::load(store)
        .context("Failed to load the factorization model; run 'fit' first")?;

    let recommendations = match seed {
        Some(seed) => recommender.recommend(items, &mut RngSource::seeded(seed), Some(limit)),
        None => recommender.recommend(items, &mut RngSource::from_entropy(), Some(limit)),
    }
    .context("Failed to score the query")?;

    if json {
        return print_json(&recommendations);
    }
    println!(
        "{}",
        format!("Because you liked {}:", items.join(", ")).bold().blue()
    );
    print_recommendations(&recommendations, 2);
    Ok(())
}

/// Handle the 'neighbors' command
fn handle_neighbors(
    store: &FsStore,
    recommender: &NeighborhoodRecommender,
    user: &str,
    threshold: f64,
    json: bool,
) -> Result<()> {
    if recommender.neighbor_count() == 0 {
        bail!("--neighbors must be at least 1");
    }
    let ratings = store
        .load_rating_matrix()
        .context("Failed to load the rating matrix; run 'build' first")?;
    let imputed = ratings.impute().context("Failed to impute the rating matrix")?;

    let recommendations = recommender
        .recommend(user, &ratings, &imputed, threshold)
        .with_context(|| format!("Failed to recommend for user {}", user))?;

    if json {
        return print_json(&recommendations);
    }
    println!(
        "{}",
        format!("User {} rated {} items", user, ratings.user_ratings(user).len())
            .bold()
            .blue()
    );
    if recommendations.is_empty() {
        println!("No unseen items score above {}", threshold);
    }
    print_recommendations(&recommendations, 1);
    Ok(())
}

fn print_json(recommendations: &[Recommendation]) -> Result<()> {
    let json = serde_json::to_string_pretty(recommendations)
        .context("Failed to serialize recommendations")?;
    println!("{}", json);
    Ok(())
}

/// Print a numbered list of recommendations
fn print_recommendations(recommendations: &[Recommendation], precision: usize) {
    for (rank, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. {} - Score: {:.*}",
            (rank + 1).to_string().green(),
            rec.item,
            precision,
            rec.score
        );
    }
}
