//! # Config Loader
//!
//! Resolves the effective [`RunSettings`] from up to four layers, lowest priority first:
//!
//! 1. built-in defaults (see `constants`),
//! 2. the user file `<config_dir>/tv-fuzz/config.toml`,
//! 3. the project file `tv-fuzz.toml` in the working directory,
//! 4. the file passed with `--config`,
//!
//! and finally the command-line flags. Layers are merged field by field; a stage command in
//! `[tools]` replaces the whole command of the layer below.
use crate::{
    cli::Cli,
    constants::{
        CONFIG_DIR_NAME, DEFAULT_DIALECT, DEFAULT_MARKER, DEFAULT_POST_FILE, DEFAULT_PRE_FILE,
        LOCAL_CONFIG_FILENAME, USER_CONFIG_FILENAME,
    },
    models::{
        FuzzConfig, RunSettings, Stage, StageCommand, TomlCommand, Toolchain, ToolsConfig,
    },
};
use anyhow::{Context, Result, anyhow, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// The main entry point: discovers, merges and resolves every layer for this invocation.
pub fn load_settings(cli: &Cli) -> Result<RunSettings> {
    let cwd = env::current_dir().context("Could not determine the current directory")?;
    let search_dir = match &cli.work_dir {
        Some(dir) => cwd.join(expand(dir)?),
        None => cwd.clone(),
    };
    let user_dir = dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME));

    let mut config = FuzzConfig::default();
    for layer in discover_layers(cli.config.as_deref(), &search_dir, user_dir.as_deref())? {
        log::debug!("Loading config layer '{}'", layer.display());
        config = merge(config, read_config(&layer)?);
    }
    config = merge(config, overlay_from_cli(cli));

    resolve(config, &cwd)
}

/// Lists the config files to load, lowest priority first. Missing optional files are
/// skipped; a missing `--config` file is an error.
fn discover_layers(
    explicit: Option<&Path>,
    search_dir: &Path,
    user_dir: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let mut layers = Vec::new();

    if let Some(user_dir) = user_dir {
        let user_file = user_dir.join(USER_CONFIG_FILENAME);
        if user_file.is_file() {
            layers.push(user_file);
        }
    }

    let local_file = search_dir.join(LOCAL_CONFIG_FILENAME);
    if local_file.is_file() {
        layers.push(local_file);
    }

    if let Some(explicit) = explicit {
        if !explicit.is_file() {
            bail!("Config file '{}' does not exist.", explicit.display());
        }
        layers.push(explicit.to_path_buf());
    }

    Ok(layers)
}

/// Reads and parses one `tv-fuzz.toml`.
pub fn read_config(path: &Path) -> Result<FuzzConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Merges two layers; every field set in `overlay` wins.
pub fn merge(base: FuzzConfig, overlay: FuzzConfig) -> FuzzConfig {
    let mut tools = base.tools;
    let mut overlay_tools = overlay.tools;
    for stage in Stage::ALL {
        if let Some(command) = overlay_tools.slot_mut(stage).take() {
            *tools.slot_mut(stage) = Some(command);
        }
    }

    FuzzConfig {
        dialect: overlay.dialect.or(base.dialect),
        pre_file: overlay.pre_file.or(base.pre_file),
        post_file: overlay.post_file.or(base.post_file),
        marker: overlay.marker.or(base.marker),
        iterations: overlay.iterations.or(base.iterations),
        timeout_secs: overlay.timeout_secs.or(base.timeout_secs),
        work_dir: overlay.work_dir.or(base.work_dir),
        failures_dir: overlay.failures_dir.or(base.failures_dir),
        quiet: overlay.quiet.or(base.quiet),
        tools,
    }
}

/// The command-line flags as the topmost layer. Unset flags leave lower layers alone.
fn overlay_from_cli(cli: &Cli) -> FuzzConfig {
    FuzzConfig {
        dialect: cli.dialect.clone(),
        marker: cli.marker.clone(),
        iterations: cli.iterations,
        timeout_secs: cli.timeout,
        work_dir: cli.work_dir.clone(),
        failures_dir: cli.failures_dir.clone(),
        quiet: cli.quiet.then_some(true),
        ..FuzzConfig::default()
    }
}

/// Fills in defaults, expands paths and validates the merged configuration.
/// Relative `work_dir`s are resolved against `cwd`.
pub fn resolve(config: FuzzConfig, cwd: &Path) -> Result<RunSettings> {
    let mut tools = Toolchain::default();
    let mut overrides = config.tools;
    for stage in Stage::ALL {
        if let Some(command) = overrides.slot_mut(stage).take() {
            *tools.get_mut(stage) = parse_command(stage, command)?;
        }
    }

    let work_dir = cwd.join(expand(config.work_dir.as_deref().unwrap_or("."))?);
    let work_dir = dunce::canonicalize(&work_dir).with_context(|| {
        format!("Working directory '{}' is not accessible", work_dir.display())
    })?;

    let failures_dir = config
        .failures_dir
        .as_deref()
        .map(|dir| expand(dir).map(|dir| work_dir.join(dir)))
        .transpose()?;

    let marker = config.marker.unwrap_or_else(|| DEFAULT_MARKER.to_string());
    if marker.is_empty() {
        bail!("The success marker must not be empty; every solver output would pass.");
    }

    let pre_file = expand_path(config.pre_file.as_deref(), DEFAULT_PRE_FILE)?;
    let post_file = expand_path(config.post_file.as_deref(), DEFAULT_POST_FILE)?;
    // Reproducers store both files side by side under their file names.
    if pre_file.file_name() == post_file.file_name() {
        bail!(
            "pre_file '{}' and post_file '{}' must have different file names.",
            pre_file.display(),
            post_file.display()
        );
    }

    Ok(RunSettings {
        tools,
        dialect: expand_path(config.dialect.as_deref(), DEFAULT_DIALECT)?,
        pre_file,
        post_file,
        marker,
        iterations: config.iterations,
        timeout: config
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        work_dir,
        failures_dir,
        quiet: config.quiet.unwrap_or(false),
    })
}

/// Converts resolved settings back into a fully-populated file model, for `--print-config`.
pub fn effective_config(settings: &RunSettings) -> FuzzConfig {
    let mut tools = ToolsConfig::default();
    for stage in Stage::ALL {
        *tools.slot_mut(stage) = Some(TomlCommand::Argv(settings.tools.get(stage).argv()));
    }

    FuzzConfig {
        dialect: Some(settings.dialect.to_string_lossy().into_owned()),
        pre_file: Some(settings.pre_file.to_string_lossy().into_owned()),
        post_file: Some(settings.post_file.to_string_lossy().into_owned()),
        marker: Some(settings.marker.clone()),
        iterations: settings.iterations,
        timeout_secs: Some(settings.timeout.map_or(0, |t| t.as_secs())),
        work_dir: Some(settings.work_dir.to_string_lossy().into_owned()),
        failures_dir: settings
            .failures_dir
            .as_ref()
            .map(|dir| dir.to_string_lossy().into_owned()),
        quiet: Some(settings.quiet),
        tools,
    }
}

/// Turns a config-file command into an argv. Lines are split with shell-word rules.
fn parse_command(stage: Stage, command: TomlCommand) -> Result<StageCommand> {
    let argv = match command {
        TomlCommand::Argv(argv) => argv,
        TomlCommand::Line(line) => shlex::split(&line).ok_or_else(|| {
            anyhow!(
                "Command for stage '{}' could not be parsed: {}",
                stage,
                line
            )
        })?,
    };

    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("No command specified for stage '{}'.", stage))?;
    Ok(StageCommand {
        program: program.clone(),
        args: args.to_vec(),
    })
}

/// Expands `~` and `$VARS` in a path-like setting.
fn expand(value: &str) -> Result<String> {
    shellexpand::full(value)
        .map(|expanded| expanded.into_owned())
        .with_context(|| format!("Could not expand '{}'", value))
}

fn expand_path(value: Option<&str>, default: &str) -> Result<PathBuf> {
    value.map_or_else(|| Ok(PathBuf::from(default)), |v| expand(v).map(PathBuf::from))
}
