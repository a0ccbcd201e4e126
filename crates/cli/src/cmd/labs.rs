use anyhow::{Context, Result};
use argp::FromArgs;
use lab_grader_core::{config::Config, service::SpreadsheetStore};
use lab_grader_engine::{Grader, Notifications};
use lab_grader_github::GitHub;
use lab_grader_sheets::SheetStore;
use typed_path::Utf8NativePathBuf;

use crate::util::{native_path, std_path};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Grade labs and record the results in the course spreadsheet.
#[argp(subcommand, name = "labs")]
pub struct Args {
    #[argp(option, short = 'c', from_str_fn(native_path))]
    /// course config file
    course: Utf8NativePathBuf,
    #[argp(option, short = 'a', from_str_fn(native_path))]
    /// authentication config file
    auth: Option<Utf8NativePathBuf>,
    #[argp(option, short = 'l')]
    /// lab to check, may be repeated (default: every configured lab)
    lab: Vec<String>,
    #[argp(switch)]
    /// print staged updates instead of writing them
    dry_run: bool,
}

pub async fn run(args: Args) -> Result<()> {
    let config = Config::load(std_path(&args.course), args.auth.as_ref().map(std_path))?;
    let course = &config.course;
    let labs = if args.lab.is_empty() { course.labs.keys().cloned().collect() } else { args.lab };
    for lab in &labs {
        course.lab(lab)?;
    }
    let google = course.google.as_ref().context("No Google spreadsheet configured for course")?;

    let github = GitHub::new(&config.auth).await?;
    let mut store = SheetStore::load(google, &config.auth).await?;
    let notifications = Notifications::default();
    let grader = Grader::new(course, &github, &notifications);
    for lab in &labs {
        let summary = grader
            .check_lab(&mut store, lab)
            .await
            .with_context(|| format!("Failed to check lab {}", lab))?;
        println!("{}", summary);
    }

    let notifications = notifications.take();
    if !notifications.is_empty() {
        println!("{} notifications:", notifications.len());
        for notification in &notifications {
            println!("  {}", notification);
        }
    }

    if args.dry_run {
        for update in store.pending() {
            println!("{} <- {}", update.range, update.value);
        }
        tracing::info!("Dry run, {} staged updates not written", store.pending().len());
        return Ok(());
    }
    store.flush().await.context("Failed to update spreadsheet")?;
    Ok(())
}
