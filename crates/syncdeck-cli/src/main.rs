mod logging;
mod ticker;
mod ui;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use syncdeck_core::actions::RuntimeAction;
use syncdeck_core::actions::ShellAction;
use syncdeck_core::config::Config;
use syncdeck_core::control::fetch_snapshot;
use syncdeck_core::discovery::ProjectDiscovery;
use syncdeck_core::reducer::reduce;
use syncdeck_core::state::AppState;
use syncdeck_exec::MutagenCli;
use syncdeck_exec::SystemCommandRunner;
use tracing::info;

const INSTALL_HINT: &str = "mutagen is not installed or not on PATH \
     (see https://mutagen.io/documentation/introduction/installation)";

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Dashboard { project_dir: Option<PathBuf> },
    Help,
    Version,
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match parse_args(env::args().skip(1).collect())? {
        Invocation::Help => {
            print_help();
            Ok(())
        }
        Invocation::Version => {
            println!("syncdeck {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Invocation::Dashboard { project_dir } => run_dashboard(project_dir),
    }
}

fn parse_args(args: Vec<String>) -> Result<Invocation, Box<dyn std::error::Error>> {
    let mut project_dir = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => return Ok(Invocation::Help),
            "--version" | "-V" => return Ok(Invocation::Version),
            "--project-dir" | "-d" => {
                let Some(value) = args.get(i + 1) else {
                    return Err(format!("{} requires a directory", args[i]).into());
                };
                project_dir = Some(PathBuf::from(value));
                i += 2;
            }
            other => {
                if let Some(value) = other.strip_prefix("--project-dir=") {
                    project_dir = Some(PathBuf::from(value));
                    i += 1;
                } else {
                    return Err(format!("unsupported argument: {other}").into());
                }
            }
        }
    }
    Ok(Invocation::Dashboard { project_dir })
}

fn run_dashboard(project_dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = logging::init();
    let config = Config::load()?;
    info!(log = ?log_path, "starting syncdeck");

    let control = MutagenCli::new(SystemCommandRunner, &config.control);
    if !control.is_installed() {
        return Err(INSTALL_HINT.into());
    }

    let base_dir = match project_dir {
        Some(dir) => Some(dir),
        None => env::current_dir().ok(),
    };
    let discovery = ProjectDiscovery::new(base_dir)
        .with_search_paths(config.projects.search_paths.clone())
        .with_exclude_patterns(config.projects.exclude_patterns.clone());
    let projects = discovery.discover();
    info!(count = projects.len(), "discovered projects");

    let mut state = AppState::new(projects, config.ui.default_display_mode);
    let generation = state.next_snapshot_generation();
    let result = fetch_snapshot(&control).map_err(|err| err.to_string());
    reduce(
        &mut state,
        ShellAction::Runtime(RuntimeAction::SnapshotFetched { generation, result }),
    );

    ui::run(
        state,
        ui::UiContext {
            control: Arc::new(control),
            discovery,
            refresh: config.refresh,
        },
    )
}

fn print_help() {
    println!("syncdeck {}", env!("CARGO_PKG_VERSION"));
    println!("Terminal dashboard for mutagen sync projects");
    println!();
    println!("Usage:");
    println!("  syncdeck [-d|--project-dir DIR]");
    println!("  syncdeck --help");
    println!("  syncdeck --version");
    println!();
    println!("Options:");
    println!("  -d, --project-dir DIR  Search DIR for project files (default: current directory)");
    println!("  -h, --help             Show this help");
    println!("  -V, --version          Show the version");
    println!();
    println!("Environment:");
    println!("  SYNCDECK_LOG           Log filter (falls back to RUST_LOG, default: info)");
    println!("  SYNCDECK_EDITOR_IS_GUI Treat $VISUAL/$EDITOR as a GUI editor when 1 or true");
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation, String> {
        parse_args(args.iter().map(|arg| arg.to_string()).collect()).map_err(|err| err.to_string())
    }

    #[test]
    fn no_arguments_runs_dashboard_in_current_directory() {
        assert_eq!(parse(&[]), Ok(Invocation::Dashboard { project_dir: None }));
    }

    #[test]
    fn project_dir_short_long_and_inline() {
        for args in [
            &["-d", "/srv/app"][..],
            &["--project-dir", "/srv/app"][..],
            &["--project-dir=/srv/app"][..],
        ] {
            assert_eq!(
                parse(args),
                Ok(Invocation::Dashboard {
                    project_dir: Some(PathBuf::from("/srv/app"))
                })
            );
        }
    }

    #[test]
    fn help_and_version_win() {
        assert_eq!(parse(&["-d", "/x", "-h"]), Ok(Invocation::Help));
        assert_eq!(parse(&["--version"]), Ok(Invocation::Version));
    }

    #[test]
    fn bad_arguments_are_errors() {
        assert_eq!(
            parse(&["-d"]),
            Err("-d requires a directory".to_string())
        );
        assert_eq!(
            parse(&["--verbose"]),
            Err("unsupported argument: --verbose".to_string())
        );
    }
}
