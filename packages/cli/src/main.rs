use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use gscope::{Account, CourseList, EnrichOptions, GsConnection};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, layer::SubscriberExt as _, util::SubscriberInitExt};

use crate::output::{CourseReport, assignments_text, courses_text};

mod output;

#[derive(Parser, Debug)]
#[command(
    name = "gscope",
    about = "A tool to list Gradescope courses, assignments and submission times.",
    version
)]
struct GscopeOptions {
    /// Account email.
    #[arg(long, env = "GRADESCOPE_EMAIL")]
    email: String,

    /// Account password.
    #[arg(long, env = "GRADESCOPE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Site to log into.
    #[arg(long, env = "GRADESCOPE_BASE_URL", default_value = gscope::DEFAULT_BASE_URL)]
    base_url: String,

    /// Only show courses of this term, e.g. "Fall 2024". Case-insensitive.
    #[arg(short = 't', long)]
    term: Option<String>,

    /// Print records as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Write logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the courses of the account.
    Courses,
    /// List the assignments of every (filtered) student course.
    Assignments {
        /// Also look up when each submitted assignment was handed in.
        #[arg(short = 's', long)]
        submission_times: bool,

        /// Delay before each submission page request, in milliseconds.
        #[arg(long, default_value_t = 200)]
        delay_ms: u64,

        /// Submission pages fetched at once.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    let options = GscopeOptions::parse();
    setup_tracing(options.log_json);
    color_eyre::install()?;

    let started = Instant::now();
    let mut builder = GsConnection::builder().base_url(&options.base_url);
    if let Some(timeout) = options.timeout {
        builder = builder.timeout(Duration::from_secs(timeout));
    }
    let gs = builder.build()?;

    tracing::info!("Attempting to log in");
    if !gs.login(&options.email, &options.password).await? {
        eyre::bail!("Login failed. Please check your credentials and network connection.");
    }
    let Some(account) = gs.account().await else {
        eyre::bail!("Failed to initialize account");
    };

    let courses = account.get_courses().await?;
    let courses = match options.term.as_deref() {
        Some(term) => courses.filter_term(term),
        None => courses,
    };

    match options.command {
        Command::Courses => {
            if options.json {
                println!("{}", serde_json::to_string_pretty(&courses)?);
            } else {
                print!("{}", courses_text(&courses, options.term.as_deref()));
            }
        }
        Command::Assignments {
            submission_times,
            delay_ms,
            concurrency,
        } => {
            let enrich = submission_times.then_some(EnrichOptions {
                delay: Duration::from_millis(delay_ms),
                concurrency,
            });
            print_assignments(&account, &courses, enrich, options.json).await?;
        }
    }

    tracing::info!("Finished in {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(())
}

async fn print_assignments(
    account: &Account<'_>,
    courses: &CourseList,
    enrich: Option<EnrichOptions>,
    json: bool,
) -> eyre::Result<()> {
    if courses.student.is_empty() {
        tracing::warn!("No student courses to fetch assignments from");
    }
    let results = account
        .assignments_for_courses(courses.student.keys().cloned())
        .await;

    let mut times = Vec::with_capacity(results.len());
    for result in &results {
        let course_times = match enrich {
            Some(options) if result.is_ok() => Some(
                account
                    .enrich_submission_times(&result.course_id, &result.assignments, options)
                    .await,
            ),
            _ => None,
        };
        times.push(course_times);
    }

    let reports = results
        .iter()
        .zip(&times)
        .filter_map(|(result, times)| {
            let course = courses.student.get(&result.course_id)?;
            Some((course, result, times.as_ref()))
        })
        .collect::<Vec<_>>();

    if json {
        let reports = reports
            .into_iter()
            .map(|(course, result, times)| CourseReport::new(course, result, times))
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (course, result, times) in reports {
            print!("{}", assignments_text(course, result, times));
        }
    }
    Ok(())
}

fn setup_tracing(json: bool) {
    let env_filter = || {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
    };
    let text_log = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter())
    });
    let json_log = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter())
    });
    tracing_subscriber::registry()
        .with(text_log)
        .with(json_log)
        .init();
}
