//! bndl command line

use bndl::bundle::defaults::DEFAULT_TAG;
use bndl::exit_codes::{
    EXIT_INVALID_ARGS, EXIT_NOT_AN_IMAGE, EXIT_PANIC, EXIT_SUCCESS,
};
use bndl::oci::AnnotationValue;
use bndl::{BundleOptions, BundleOverrides, BundleParameters, create_bundle};
use clap::Parser;
use std::{env, panic, path::PathBuf, process};

#[derive(Parser, Debug)]
#[command(
    name = "bndl",
    about = "Turn an OCI image into a deployable bundle",
    disable_version_flag = true
)]
struct Args {
    /// OCI image tarball (optionally gzipped) or directory holding an OCI layout
    source: PathBuf,

    /// Bundle name
    #[arg(long)]
    name: String,

    /// Output path (a directory, or a .tar.gz with --archive)
    #[arg(short, long)]
    output: PathBuf,

    /// Id of the image component (defaults to the bundle name)
    #[arg(long)]
    component: Option<String>,

    /// Description of the image component (defaults to the bundle name)
    #[arg(long)]
    component_description: Option<String>,

    /// Image tag to start
    #[arg(long, default_value = DEFAULT_TAG)]
    tag: String,

    /// Bundle version (replaces the tags list)
    #[arg(long = "version", value_name = "VERSION")]
    bundle_version: Option<String>,

    #[arg(long)]
    compatibility_version: Option<String>,

    #[arg(long)]
    system: Option<String>,

    #[arg(long)]
    system_version: Option<String>,

    #[arg(long)]
    nr_of_cpus: Option<String>,

    #[arg(long)]
    memory: Option<String>,

    #[arg(long)]
    disk_space: Option<String>,

    /// Role the bundle runs under (repeatable)
    #[arg(long = "role", value_name = "ROLE")]
    roles: Vec<String>,

    /// Extra annotation as KEY=VALUE (repeatable)
    #[arg(long = "annotation", value_name = "KEY=VALUE")]
    annotations: Vec<String>,

    /// Do not synthesize endpoints and the status component
    #[arg(long)]
    no_default_endpoints: bool,

    /// Write a .tar.gz instead of a directory
    #[arg(long)]
    archive: bool,

    /// Skip re-hashing layer blobs
    #[arg(long)]
    skip_verification: bool,

    /// Log level (trace, debug, info, warn, error, json:<level>)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        process::exit(EXIT_PANIC);
    }));

    match panic::catch_unwind(run) {
        Ok(exit_code) => process::exit(exit_code),
        Err(_) => {
            eprintln!("Fatal: Unhandled panic in bndl");
            process::exit(EXIT_PANIC);
        }
    }
}

fn parse_annotation(raw: &str) -> Option<(String, AnnotationValue)> {
    let (key, value) = raw.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), AnnotationValue::parse(value)))
}

fn report(message: &str) {
    if bndl::logger::is_json_logging() {
        log::error!("{message}");
    } else {
        eprintln!("{message}");
    }
}

fn run() -> i32 {
    // A lone --version prints the tool version; with a value it is the bundle version
    let mut argv = env::args().skip(1);
    if let (Some(first), None) = (argv.next(), argv.next()) {
        if first == "--version" {
            println!("bndl {}", bndl::version::full_version());
            return EXIT_SUCCESS;
        }
    }

    let args = Args::parse();

    if let Some(ref level) = args.log_level {
        bndl::logger::JsonLogger::init_with_level(level);
    } else {
        bndl::logger::JsonLogger::init();
    }

    let mut annotations = Vec::with_capacity(args.annotations.len());
    for raw in &args.annotations {
        match parse_annotation(raw) {
            Some(pair) => annotations.push(pair),
            None => {
                report(&format!("Invalid annotation '{raw}', expected KEY=VALUE"));
                return EXIT_INVALID_ARGS;
            }
        }
    }

    let overrides = BundleOverrides {
        version: args.bundle_version,
        compatibility_version: args.compatibility_version,
        system: args.system,
        system_version: args.system_version,
        nr_of_cpus: args.nr_of_cpus,
        memory: args.memory,
        disk_space: args.disk_space,
        roles: (!args.roles.is_empty()).then_some(args.roles),
    };

    let description = args
        .component_description
        .unwrap_or_else(|| args.name.clone());
    let mut params = BundleParameters::new(args.name.clone(), description, args.tag)
        .with_overrides(overrides)
        .with_default_endpoints(!args.no_default_endpoints);
    params.annotations = annotations;

    let component_id = args.component.unwrap_or_else(|| args.name.clone());
    let mut options = BundleOptions::new(component_id, params);
    options.archive = args.archive;
    options.skip_verification = args.skip_verification;

    match create_bundle(&args.source, &args.output, &options) {
        Ok(Some(summary)) => {
            println!("{}", summary.output.display());
            EXIT_SUCCESS
        }
        Ok(None) => {
            report(&format!(
                "No OCI image layout found in {}",
                args.source.display()
            ));
            EXIT_NOT_AN_IMAGE
        }
        Err(e) => {
            report(&format!("Bundle error: {e}"));
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_annotation() {
        let (key, value) = parse_annotation("com.example.replicas=3").unwrap();
        assert_eq!(key, "com.example.replicas");
        assert_eq!(value, AnnotationValue::from(3));

        let (_, value) = parse_annotation("owner=a=b").unwrap();
        assert_eq!(value, AnnotationValue::from("a=b"));

        assert!(parse_annotation("missing-separator").is_none());
        assert!(parse_annotation("=value").is_none());
    }

    #[test]
    fn test_version_flag_takes_a_value() {
        let args = Args::try_parse_from([
            "bndl", "image.tar", "--name", "web", "-o", "out", "--version", "3", "--role", "a",
            "--role", "b",
        ])
        .unwrap();
        assert_eq!(args.bundle_version.as_deref(), Some("3"));
        assert_eq!(args.roles, vec!["a", "b"]);
        assert_eq!(args.tag, DEFAULT_TAG);
    }
}
