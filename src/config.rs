//! Command-line and engine configuration.
//!
//! The command line is parsed by clap. Flavor and length flags are then
//! applied in the order they appeared, so `--fplen 512 --maccs` yields 166
//! bits while `--maccs --fplen 512` yields 512. The engine adapter is
//! described by an optional YAML file:
//!
//! ```yaml
//! version: 1
//! command: "java"
//! args: ["-cp", "cdk-fputil.jar", "org.openscience.cdk.fputil.Engine"]
//! software: "CDK 2.3"
//! shutdown_timeout_ms: 5000
//! ```

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flavor::{DEFAULT_BIT_LENGTH, Flavor, FingerprintSpec};
use crate::reader::TrailingLine;

/// Environment variable naming the engine config file when
/// `--engine-config` is absent.
pub const ENGINE_CONFIG_ENV: &str = "SMI2FPS_ENGINE_CONFIG";

/// Engine program used when no config file is given.
pub const DEFAULT_ENGINE_COMMAND: &str = "cdkfp-engine";

/// Grace period for the engine to exit after its stdin is closed.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Argument ids of the flavor flags. `--maccs` also answers to its
/// `--mdl-maccs` and `--maccs166` aliases.
const FLAVOR_FLAGS: &[(&str, Flavor)] = &[
    ("ecfp0", Flavor::Ecfp0),
    ("ecfp2", Flavor::Ecfp2),
    ("ecfp4", Flavor::Ecfp4),
    ("ecfp6", Flavor::Ecfp6),
    ("fcfp0", Flavor::Fcfp0),
    ("fcfp2", Flavor::Fcfp2),
    ("fcfp4", Flavor::Fcfp4),
    ("fcfp6", Flavor::Fcfp6),
    ("path5", Flavor::Path5),
    ("path6", Flavor::Path6),
    ("path7", Flavor::Path7),
    ("extpath5", Flavor::ExtPath5),
    ("extpath6", Flavor::ExtPath6),
    ("extpath7", Flavor::ExtPath7),
    ("pubchem", Flavor::Pubchem),
    ("maccs", Flavor::Maccs166),
    ("lingos", Flavor::Lingos),
];

/// Errors from argument resolution or engine config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error("invalid fingerprint length {0:?}, expected a positive integer")]
    InvalidLength(String),

    #[error("No input specified")]
    NoInput,

    #[error("failed to read engine config {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

impl ConfigError {
    /// Errors caused by the argument list itself.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            ConfigError::Cli(_) | ConfigError::InvalidLength(_) | ConfigError::NoInput
        )
    }
}

/// Convert SMILES structures to an FPS1 fingerprint file.
///
/// Flavor flags and --fplen are applied left to right; MACCS and PubChem
/// force their own length unless a later --fplen overrides it.
#[derive(Parser, Debug)]
#[command(name = "smi2fps")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input structure file, `-` for stdin.
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output FPS file, `-` or omitted for stdout.
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Fingerprint length in bits.
    #[arg(long, value_name = "BITS", action = ArgAction::Append,
          value_parser = clap::value_parser!(u32).range(1..))]
    fplen: Vec<u32>,

    /// Raw engine flavor code, decimal or 0x-prefixed hex.
    #[arg(long = "flavor", value_name = "CODE", action = ArgAction::Append,
          value_parser = parse_flavor_code)]
    flavor_code: Vec<Flavor>,

    /// YAML file describing the fingerprint engine
    /// (default: $SMI2FPS_ENGINE_CONFIG).
    #[arg(long, value_name = "FILE", action = ArgAction::Append)]
    engine_config: Vec<PathBuf>,

    /// Convert a final record that has no line terminator.
    #[arg(long, action = ArgAction::Count)]
    keep_last_line: u8,

    #[command(flatten)]
    #[allow(dead_code)]
    flavors: FlavorFlags,
}

/// Flavor selectors. Their order on the command line matters, so they are
/// read back through [`ArgMatches::indices_of`] rather than these counts.
#[derive(clap::Args, Debug)]
#[command(next_help_heading = "Flavors")]
#[allow(dead_code)]
struct FlavorFlags {
    /// ECFP, radius 0.
    #[arg(long, action = ArgAction::Count)]
    ecfp0: u8,
    /// ECFP, radius 2.
    #[arg(long, action = ArgAction::Count)]
    ecfp2: u8,
    /// ECFP, radius 4 (default).
    #[arg(long, action = ArgAction::Count)]
    ecfp4: u8,
    /// ECFP, radius 6.
    #[arg(long, action = ArgAction::Count)]
    ecfp6: u8,
    /// FCFP, radius 0.
    #[arg(long, action = ArgAction::Count)]
    fcfp0: u8,
    /// FCFP, radius 2.
    #[arg(long, action = ArgAction::Count)]
    fcfp2: u8,
    /// FCFP, radius 4.
    #[arg(long, action = ArgAction::Count)]
    fcfp4: u8,
    /// FCFP, radius 6.
    #[arg(long, action = ArgAction::Count)]
    fcfp6: u8,
    /// Hashed path, depth 5.
    #[arg(long, action = ArgAction::Count)]
    path5: u8,
    /// Hashed path, depth 6.
    #[arg(long, action = ArgAction::Count)]
    path6: u8,
    /// Hashed path, depth 7.
    #[arg(long, action = ArgAction::Count)]
    path7: u8,
    /// Extended hashed path, depth 5.
    #[arg(long, action = ArgAction::Count)]
    extpath5: u8,
    /// Extended hashed path, depth 6.
    #[arg(long, action = ArgAction::Count)]
    extpath6: u8,
    /// Extended hashed path, depth 7.
    #[arg(long, action = ArgAction::Count)]
    extpath7: u8,
    /// PubChem substructure keys (881 bits).
    #[arg(long, action = ArgAction::Count)]
    pubchem: u8,
    /// MDL MACCS keys (166 bits).
    #[arg(long, action = ArgAction::Count, visible_aliases = ["mdl-maccs", "maccs166"])]
    maccs: u8,
    /// LINGO substrings.
    #[arg(long, action = ArgAction::Count)]
    lingos: u8,
}

/// Where a stream comes from or goes to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamSelector {
    /// Process stdin for input, stdout for output.
    #[default]
    Std,
    Path(PathBuf),
}

impl StreamSelector {
    fn from_arg(arg: PathBuf) -> Self {
        if arg.as_os_str() == "-" {
            StreamSelector::Std
        } else {
            StreamSelector::Path(arg)
        }
    }
}

/// Everything a conversion run needs, resolved from the argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub spec: FingerprintSpec,
    pub input: StreamSelector,
    pub output: StreamSelector,
    pub trailing: TrailingLine,
    pub engine_config: Option<PathBuf>,
}

/// What the command line asked for. `Help` and `Version` carry the text
/// to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(RunConfig),
    Help(String),
    Version(String),
}

/// One-line synopsis printed after usage errors.
pub fn usage() -> String {
    Cli::command().render_usage().to_string()
}

/// Resolves the argument list (without the program name).
pub fn resolve_args<I, S>(args: I) -> Result<Invocation, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let argv = std::iter::once(OsString::from("smi2fps")).chain(args.into_iter().map(Into::into));
    let matches = match Cli::command().try_get_matches_from(argv) {
        Ok(matches) => matches,
        Err(err) => {
            return match err.kind() {
                ErrorKind::DisplayHelp => Ok(Invocation::Help(err.render().to_string())),
                ErrorKind::DisplayVersion => Ok(Invocation::Version(err.render().to_string())),
                _ => Err(err.into()),
            };
        }
    };
    let cli = Cli::from_arg_matches(&matches)?;
    let spec = resolve_spec(&matches, &cli)?;

    let input = cli.input.ok_or(ConfigError::NoInput)?;
    Ok(Invocation::Run(RunConfig {
        spec,
        input: StreamSelector::from_arg(input),
        output: cli.output.map(StreamSelector::from_arg).unwrap_or_default(),
        trailing: if cli.keep_last_line > 0 {
            TrailingLine::Keep
        } else {
            TrailingLine::Discard
        },
        engine_config: cli.engine_config.into_iter().last(),
    }))
}

enum Setting {
    Flavor(Flavor),
    Length(u32),
}

/// Replays flavor and length flags in command-line order.
fn resolve_spec(matches: &ArgMatches, cli: &Cli) -> Result<FingerprintSpec, ConfigError> {
    let mut settings: Vec<(usize, Setting)> = Vec::new();
    for &(id, flavor) in FLAVOR_FLAGS {
        if let Some(indices) = matches.indices_of(id) {
            settings.extend(indices.map(|idx| (idx, Setting::Flavor(flavor))));
        }
    }
    if let Some(indices) = matches.indices_of("flavor_code") {
        settings.extend(
            indices
                .zip(&cli.flavor_code)
                .map(|(idx, &flavor)| (idx, Setting::Flavor(flavor))),
        );
    }
    if let Some(indices) = matches.indices_of("fplen") {
        settings.extend(
            indices
                .zip(&cli.fplen)
                .map(|(idx, &len)| (idx, Setting::Length(len))),
        );
    }
    settings.sort_by_key(|&(idx, _)| idx);

    let mut flavor = Flavor::Ecfp4;
    let mut bit_length = DEFAULT_BIT_LENGTH;
    for (_, setting) in settings {
        match setting {
            Setting::Flavor(selected) => {
                flavor = selected;
                if let Some(forced) = selected.forced_bit_length() {
                    bit_length = forced;
                }
            }
            Setting::Length(len) => bit_length = len,
        }
    }
    FingerprintSpec::new(flavor, bit_length)
        .ok_or_else(|| ConfigError::InvalidLength(bit_length.to_string()))
}

/// Accepts decimal or `0x`-prefixed hexadecimal engine codes.
fn parse_flavor_code(value: &str) -> Result<Flavor, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex_digits) => u32::from_str_radix(hex_digits, 16),
        None => value.parse::<u32>(),
    };
    parsed
        .map(Flavor::Other)
        .map_err(|_| format!("invalid flavor code {value:?}"))
}

/// How to launch the fingerprint engine helper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Configuration format version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Program to execute.
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Overrides the `#software=` header value.
    #[serde(default)]
    pub software: Option<String>,

    /// How long to wait for the engine to exit once its stdin is closed
    /// before killing it.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl EngineConfig {
    /// Load a YAML engine configuration from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse YAML engine configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Uses `explicit` if given, then [`ENGINE_CONFIG_ENV`], then defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match std::env::var_os(ENGINE_CONFIG_ENV) {
            Some(path) if !path.is_empty() => {
                tracing::debug!(path = ?path, "engine config from environment");
                Self::from_file(PathBuf::from(path))
            }
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        if self.command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "command must not be empty".to_string(),
            ));
        }
        if matches!(&self.software, Some(software) if software.contains(['\n', '\r'])) {
            return Err(ConfigError::Validation(
                "software must be a single line".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            command: default_command(),
            args: Vec::new(),
            software: None,
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_command() -> String {
    DEFAULT_ENGINE_COMMAND.to_string()
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn run(args: &[&str]) -> RunConfig {
        match resolve_args(args).expect("arguments resolve") {
            Invocation::Run(cfg) => cfg,
            other => panic!("expected a run, got {other:?}"),
        }
    }

    #[test]
    fn defaults_to_ecfp4_1024_on_stdout() {
        let cfg = run(&["in.smi"]);
        assert_eq!(cfg.spec, FingerprintSpec::default());
        assert_eq!(cfg.input, StreamSelector::Path(PathBuf::from("in.smi")));
        assert_eq!(cfg.output, StreamSelector::Std);
        assert_eq!(cfg.trailing, TrailingLine::Discard);
        assert!(cfg.engine_config.is_none());
    }

    #[test]
    fn dash_selects_standard_streams() {
        let cfg = run(&["-", "-"]);
        assert_eq!(cfg.input, StreamSelector::Std);
        assert_eq!(cfg.output, StreamSelector::Std);
    }

    #[test]
    fn second_positional_is_output() {
        let cfg = run(&["--path6", "in.smi", "out.fps"]);
        assert_eq!(cfg.spec.flavor(), Flavor::Path6);
        assert_eq!(cfg.output, StreamSelector::Path(PathBuf::from("out.fps")));
    }

    #[test]
    fn maccs_spellings_force_166_bits() {
        for flag in ["--maccs", "--mdl-maccs", "--maccs166"] {
            let cfg = run(&["--fplen", "2048", flag, "in.smi"]);
            assert_eq!(cfg.spec.flavor(), Flavor::Maccs166, "{flag}");
            assert_eq!(cfg.spec.bit_length(), 166, "{flag}");
        }
    }

    #[test]
    fn later_fplen_overrides_forced_length() {
        let cfg = run(&["--maccs", "--fplen", "256", "in.smi"]);
        assert_eq!(cfg.spec.bit_length(), 256);
    }

    #[test]
    fn fplen_sets_bit_length() {
        let cfg = run(&["--fcfp4", "--fplen", "2048", "in.smi"]);
        assert_eq!(cfg.spec.flavor(), Flavor::Fcfp4);
        assert_eq!(cfg.spec.bit_length(), 2048);
    }

    #[test]
    fn fplen_without_value_is_usage_error() {
        let err = resolve_args(["in.smi", "--fplen"]).unwrap_err();
        assert!(matches!(err, ConfigError::Cli(_)));
        assert!(err.to_string().contains("--fplen"));
        assert!(err.is_usage());
    }

    #[test]
    fn fplen_rejects_zero_and_garbage() {
        for bad in ["0", "-5", "abc", ""] {
            let err = resolve_args(["--fplen", bad, "in.smi"]).unwrap_err();
            assert!(matches!(err, ConfigError::Cli(_)), "{bad}");
            assert!(err.is_usage(), "{bad}");
        }
    }

    #[test]
    fn repeated_flags_last_one_wins() {
        let cfg = run(&["--fplen", "64", "--path5", "--fplen", "128", "--fcfp2", "-"]);
        assert_eq!(cfg.spec.flavor(), Flavor::Fcfp2);
        assert_eq!(cfg.spec.bit_length(), 128);

        let cfg = run(&["--pubchem", "--fplen", "64", "--maccs", "-"]);
        assert_eq!(cfg.spec.flavor(), Flavor::Maccs166);
        assert_eq!(cfg.spec.bit_length(), 166);

        let cfg = run(&["--maccs", "--flavor", "0x10004", "-"]);
        assert_eq!(cfg.spec.flavor(), Flavor::Other(0x10004));
        assert_eq!(cfg.spec.bit_length(), 166);
    }

    #[test]
    fn unknown_flag_names_the_argument() {
        let err = resolve_args(["--ecfp5", "in.smi"]).unwrap_err();
        match &err {
            ConfigError::Cli(inner) => assert_eq!(inner.kind(), ErrorKind::UnknownArgument),
            other => panic!("expected a clap error, got {other:?}"),
        }
        assert!(err.to_string().contains("--ecfp5"));
        assert!(err.is_usage());
    }

    #[test]
    fn third_positional_is_rejected() {
        let err = resolve_args(["a", "b", "c"]).unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("'c'"));
    }

    #[test]
    fn no_positional_is_rejected() {
        let err = resolve_args(["--ecfp4"]).unwrap_err();
        assert!(matches!(err, ConfigError::NoInput));
        assert_eq!(err.to_string(), "No input specified");
    }

    #[test]
    fn raw_flavor_codes() {
        assert_eq!(run(&["--flavor", "0x50000", "-"]).spec.flavor(), Flavor::Other(0x50000));
        assert_eq!(run(&["--flavor", "65538", "-"]).spec.flavor(), Flavor::Other(65538));
        let err = resolve_args(["--flavor", "ecfp", "-"]).unwrap_err();
        assert!(err.to_string().contains("invalid flavor code \"ecfp\""));
    }

    #[test]
    fn help_and_version() {
        match resolve_args(["--help"]).unwrap() {
            Invocation::Help(text) => {
                assert!(text.contains("Usage: smi2fps"));
                assert!(text.contains("mdl-maccs"));
                assert!(text.contains("--keep-last-line"));
            }
            other => panic!("expected help, got {other:?}"),
        }
        match resolve_args(["in.smi", "-V"]).unwrap() {
            Invocation::Version(text) => {
                assert_eq!(text.trim_end(), concat!("smi2fps ", env!("CARGO_PKG_VERSION")));
            }
            other => panic!("expected version, got {other:?}"),
        }
    }

    #[test]
    fn usage_line_names_the_program() {
        assert!(usage().starts_with("Usage: smi2fps"));
    }

    #[test]
    fn keep_last_line_and_engine_config() {
        let cfg = run(&["--keep-last-line", "--engine-config", "engine.yaml", "-"]);
        assert_eq!(cfg.trailing, TrailingLine::Keep);
        assert_eq!(cfg.engine_config, Some(PathBuf::from("engine.yaml")));
    }

    #[test]
    fn engine_yaml_defaults() {
        let cfg = EngineConfig::from_yaml("version: 1\n").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.command, DEFAULT_ENGINE_COMMAND);
    }

    #[test]
    fn engine_yaml_full() {
        let yaml = r#"
version: 1
command: "java"
args: ["-cp", "cdk-fputil.jar", "Engine"]
software: "CDK 2.3"
"#;
        let cfg = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.command, "java");
        assert_eq!(cfg.args.len(), 3);
        assert_eq!(cfg.software.as_deref(), Some("CDK 2.3"));
        assert_eq!(cfg.shutdown_timeout_ms, DEFAULT_SHUTDOWN_TIMEOUT_MS);

        let cfg = EngineConfig::from_yaml("shutdown_timeout_ms: 250\n").unwrap();
        assert_eq!(cfg.shutdown_timeout_ms, 250);
    }

    #[test]
    fn engine_yaml_validation() {
        let err = EngineConfig::from_yaml("command: \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("command must not be empty"));
        assert!(!err.is_usage());

        let err = EngineConfig::from_yaml("version: 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion(2)));
    }

    #[test]
    fn engine_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"command: \"/usr/local/bin/fp\"\n").unwrap();

        let cfg = EngineConfig::resolve(Some(file.path())).unwrap();
        assert_eq!(cfg.command, "/usr/local/bin/fp");
    }

    #[test]
    fn missing_engine_config_file() {
        let err = EngineConfig::from_file("/nonexistent/engine.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
