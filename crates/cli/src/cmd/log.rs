use anyhow::{Context, Result};
use argp::FromArgs;
use lab_grader_core::util::format_general;
use lab_grader_engine::gradelog::{
    extract_grading_points, extract_reduction_coefficient, extract_task_id,
};
use typed_path::Utf8NativePathBuf;

use crate::util::native_path;

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Print the grading signals found in a saved CI log.
#[argp(subcommand, name = "log")]
pub struct Args {
    #[argp(positional, from_str_fn(native_path))]
    /// CI log file
    file: Utf8NativePathBuf,
    #[argp(option)]
    /// task id the submission is expected to report
    expected_task_id: Option<u32>,
}

pub fn run(args: Args) -> Result<()> {
    let log = std::fs::read_to_string(args.file.with_platform_encoding())
        .with_context(|| format!("Failed to read {}", args.file))?;
    let task_id = extract_task_id(&log);
    match task_id {
        Some(task_id) => println!("Task id: {}", task_id),
        None => println!("Task id: not found"),
    }
    if let Some(expected) = args.expected_task_id {
        if task_id.is_some_and(|task_id| task_id.matches(expected)) {
            println!("Task id matches {}", expected);
        } else {
            println!("Wrong task id, expected {}", expected);
        }
    }
    match extract_reduction_coefficient(&log) {
        Some(coefficient) => println!("Reduction coefficient: {}", format_general(coefficient)),
        None => println!("Reduction coefficient: none"),
    }
    match extract_grading_points(&log) {
        Some(points) => println!("Points: {}", format_general(points)),
        None => println!("Points: none"),
    }
    Ok(())
}
