#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error, LevelFilter};
use serde::Deserialize;
use std::{env, fs, path::Path};
use toml;
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use lazy_static::lazy_static;
use structopt::StructOpt;

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;

// Server utilities.
use crate::utils::{info_utils, errors::Errors};

use super::info_utils::get_absolute_path;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_INFO_ROOT_DIR    : &str = "INFO_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = "~/.info_server";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml";  // relative to config dir
const INFO_CONFIG_FILE     : &str = "/info.toml";   // relative to config dir

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 3000;

// Deployment environment.
const DEFAULT_RUN_ENV      : &str = "development";

// Environment variable overrides, read once at startup.
const ENV_HTTP_PORT        : &str = "PORT";
const ENV_RUN_ENV          : &str = "APP_ENV";

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref INFO_ARGS: InfoArgs = init_info_args();
}

// Calculate the data directories BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref INFO_DIRS: InfoDirs = init_info_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// InfoDirs:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct InfoDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// CommandLineArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "info_args", about = "Command line arguments for info_server.")]
pub struct InfoArgs {
    /// Specify the server's root data directory.
    ///
    /// This directory contains all the files info_server uses during execution.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the INFO_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root_dir command line argument,
    ///
    ///   3. Otherwise, ~/.info_server
    ///
    #[structopt(short, long)]
    pub create_dirs_only: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub info_args: &'static InfoArgs,
    pub info_dirs: &'static InfoDirs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
// Fields missing from the configuration file assume their default values.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub run_env: String,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Info Server".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            run_env: DEFAULT_RUN_ENV.to_string(),
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_info_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_info_args() -> InfoArgs {
    let args = InfoArgs::from_args();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_info_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories. */
fn init_info_dirs() -> InfoDirs {
    // Initialize the mistrust object.
    let mistrust = get_mistrust();

    // Check that each path is absolute and is a directory with the
    // proper permission assign if it exists.  If it doesn't exist,
    // create it.
    let root_dir = get_root_dir();
    check_info_dir(&root_dir, "root directory", &mistrust);

    let config_dir = root_dir.clone() + CONFIG_DIR;
    check_info_dir(&config_dir, "config directory", &mistrust);

    let logs_dir = root_dir.clone() + LOGS_DIR;
    check_info_dir(&logs_dir, "logs directory", &mistrust);

    // Package up and return the directories.
    InfoDirs {
        root_dir, config_dir, logs_dir,
    }
}

// ---------------------------------------------------------------------------
// check_info_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that is has the proper
 * permissions assigned.  If it doesn't exist, create it.  The mistrust package
 * creates directories with 0o700 permissions.
 *
 * Any failure results in a panic.
 */
fn check_info_dir(dir: &String, msgname: &str, mistrust: &Mistrust ) {
    // Get the path object.
    let path = Path::new(dir);
    if !path.is_absolute() {
        panic!("The info_server {} path must be absolute: {}", msgname, dir);
    }
    if path.exists() {
        // Make sure the path represents a directory.
        if !path.is_dir() {
            panic!("The info_server {} path must be a directory: {}", msgname, dir);
        }

        // Make sure the directory had rwx for owner only.
        let meta = path.metadata().unwrap_or_else(|_| panic!("Unable to read metadata for {}: {}", msgname, dir));
        let perm = meta.permissions().mode();
        if perm & 0o777 != 0o700 {
            panic!("The info_server {} path must be have 0o700 permissions: {}", msgname, dir);
        }
    } else {
        // Create the directory with the correct permissions.
        match mistrust.make_directory(path) {
            Ok(_) => (),
            Err(e) => {
                panic!("Make directory error for {:?}: {}", path, &e.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// get_mistrust:
// ---------------------------------------------------------------------------
/** Configure a new mistrust object for initial directory processing. */
fn get_mistrust() -> Mistrust {
    // Configure our mistrust object.
    let mistrust = match Mistrust::builder()
        .ignore_prefix(get_absolute_path("~"))
        .trust_group(0)
        .build() {
            Ok(m) => m,
            Err(e) => {
                panic!("Mistrust configuration error: {}", &e.to_string());
            }
        };
    mistrust
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_INFO_ROOT_DIR).unwrap_or_else(
        |_| {
            match INFO_ARGS.root_dir.clone() {
                Some(r) => r,
                None => DEFAULT_ROOT_DIR.to_string(),
            }
        });

    // Canonicalize the path.
    get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the installation's configuration file when one
 * exists, otherwise install a console-only configuration.
 */
pub fn init_log() {
    let logconfig = init_log_config();
    if Path::new(&logconfig).is_file() {
        match log4rs::init_file(logconfig.clone(), Default::default()) {
            Ok(_) => (),
            Err(e) => {
                println!("{}", e);
                let s = format!("{}", Errors::Log4rsInitialization(logconfig));
                panic!("{}", s);
            },
        }
        info!("Log4rs initialized using: {}", logconfig);
    } else {
        match log4rs::init_config(default_log_config()) {
            Ok(_) => (),
            Err(e) => {
                println!("{}", e);
                let s = format!("{}", Errors::Log4rsInitialization(logconfig));
                panic!("{}", s);
            },
        }
        info!("Log4rs initialized with console defaults.");
    }
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    INFO_DIRS.config_dir.clone() + LOG4RS_CONFIG_FILE
}

// ---------------------------------------------------------------------------
// default_log_config:
// ---------------------------------------------------------------------------
/** Build a console appender configuration used when no log4rs.yml is found. */
fn default_log_config() -> log4rs::Config {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}")))
        .build();
    match log4rs::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info)) {
            Ok(c) => c,
            Err(e) => {
                panic!("Invalid default logging configuration: {}", &e.to_string());
            }
        }
}

/// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * installation's config directory.  A missing file is not an error, the
 * default values apply.  After the file is processed the environment
 * variable overrides are applied.
 */
fn get_parms() -> Result<Parms> {
    // Get the config file path from its data directory.
    let config_file = INFO_DIRS.config_dir.clone() + INFO_CONFIG_FILE;

    // Read the configuration file.
    let config_file_abs = info_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let mut config = match fs::read_to_string(&config_file_abs) {
        Ok(contents) => {
            // Parse the toml configuration.
            match toml::from_str::<Config>(&contents) {
                Ok(c)  => c,
                Err(e) => {
                    let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file_abs), e);
                    error!("{}", msg);
                    return Result::Err(anyhow!(msg));
                }
            }
        },
        Err(_) => {
            println!("Unable to read configuration at {}. Using default values.", config_file);
            Config::new()
        }
    };

    // Environment variables take precedence over file values.
    apply_env_overrides(&mut config)?;

    Ok(Parms { config_file: config_file_abs, config })
}

// ---------------------------------------------------------------------------
// apply_env_overrides:
// ---------------------------------------------------------------------------
/** Overlay configuration values with their environment variable overrides.
 * Unset or empty variables leave the configuration unchanged.  A PORT value
 * that does not parse as a u16 aborts start up.
 */
fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(port) = env::var(ENV_HTTP_PORT) {
        if !port.is_empty() {
            match port.parse::<u16>() {
                Ok(p) => config.http_port = p,
                Err(_) => {
                    let msg = format!("{}", Errors::InvalidEnvValue(ENV_HTTP_PORT.to_string(), port));
                    error!("{}", msg);
                    return Result::Err(anyhow!(msg));
                }
            }
        }
    }

    if let Ok(run_env) = env::var(ENV_RUN_ENV) {
        if !run_env.is_empty() {
            config.run_env = run_env;
        }
    }

    Ok(())
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context() -> RuntimeCtx {
    // If this fails the application aborts.
    let parms = get_parms().expect("FAILED to read configuration.");
    RuntimeCtx {parms, info_args: &INFO_ARGS, info_dirs: &INFO_DIRS}
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_config() {
        println!("{:?}", Config::new());
    }

    #[test]
    fn default_config() {
        let config = Config::new();
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.run_env, DEFAULT_RUN_ENV);
    }

    #[test]
    fn partial_toml_overlays_defaults() {
        let config: Config = toml::from_str("http_port = 4000").expect("parse failed");
        assert_eq!(config.http_port, 4000);
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR);
        assert_eq!(config.run_env, DEFAULT_RUN_ENV);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(toml::from_str::<Config>("http_port = \"not a number\"").is_err());
    }

    // The override scenarios run in a single test because they share the
    // process environment.
    #[test]
    fn env_overrides() {
        env::remove_var(ENV_HTTP_PORT);
        env::remove_var(ENV_RUN_ENV);
        let mut config = Config::new();
        apply_env_overrides(&mut config).expect("overrides failed");
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.run_env, DEFAULT_RUN_ENV);

        env::set_var(ENV_HTTP_PORT, "8080");
        env::set_var(ENV_RUN_ENV, "production");
        let mut config = Config::new();
        apply_env_overrides(&mut config).expect("overrides failed");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.run_env, "production");

        // Empty values behave as if the variables were unset.
        env::set_var(ENV_HTTP_PORT, "");
        env::set_var(ENV_RUN_ENV, "");
        let mut config = Config::new();
        apply_env_overrides(&mut config).expect("overrides failed");
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.run_env, DEFAULT_RUN_ENV);

        // A garbage port aborts start up.
        env::set_var(ENV_HTTP_PORT, "not-a-port");
        assert!(apply_env_overrides(&mut Config::new()).is_err());

        env::remove_var(ENV_HTTP_PORT);
        env::remove_var(ENV_RUN_ENV);
    }
}
