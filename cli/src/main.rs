mod error;
mod wav;

#[cfg(feature = "device")]
mod device;

use clap::{Args, Parser, Subcommand};
use error::CliError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tonelink_core::{
    synthesize, AudioSink, AudioSource, Command, DecodeResult, FrameDecoder, ModemConfig, ModemError, Rejection,
    Session,
};
use tracing_subscriber::EnvFilter;
use wav::{WavSink, WavSource};

#[derive(Parser)]
#[command(name = "tonelink", version)]
#[command(about = "Send and receive short commands over a speaker and a microphone")]
struct Cli {
    /// JSON file overriding modem parameters (both ends must agree)
    #[arg(long, global = true, env = "TONELINK_CONFIG", value_name = "FILE.JSON")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IoArgs {
    /// Read captured audio from a WAV file instead of the microphone
    #[arg(long, value_name = "INPUT.WAV")]
    input_wav: Option<PathBuf>,

    /// Write transmissions to a WAV file instead of the speaker
    #[arg(long, value_name = "OUTPUT.WAV")]
    output_wav: Option<PathBuf>,

    /// Capture device name (system default if omitted)
    #[arg(long, env = "TONELINK_INPUT_DEVICE")]
    input_device: Option<String>,

    /// Playback device name (system default if omitted)
    #[arg(long, env = "TONELINK_OUTPUT_DEVICE")]
    output_device: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize one command frame to a WAV file
    Encode {
        /// CAPTURE, DONE, ERROR, PING or PONG
        command: Command,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,
    },

    /// Decode every frame in a WAV file
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,
    },

    /// Transmit one command
    Send {
        command: Command,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Wait for one command
    Receive {
        /// Seconds to listen before giving up ("inf" waits indefinitely)
        #[arg(short, long, default_value = "10", value_parser = parse_timeout)]
        timeout: Duration,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Send a command and wait for the expected answer (e.g. CAPTURE, then DONE)
    Exchange {
        command: Command,

        expect: Command,

        /// Seconds to wait for the answer ("inf" waits indefinitely)
        #[arg(short, long, default_value = "10", value_parser = parse_timeout)]
        timeout: Duration,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Answer incoming commands: PING with PONG, CAPTURE with DONE or ERROR
    Listen {
        /// Shell command run on CAPTURE; exit status 0 answers DONE, anything else ERROR
        #[arg(long, value_name = "SHELL COMMAND")]
        on_capture: Option<String>,

        /// Seconds per listening attempt ("inf" waits indefinitely)
        #[arg(short, long, default_value = "10", value_parser = parse_timeout)]
        timeout: Duration,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Print the effective modem configuration as JSON
    Config,

    /// List audio devices
    #[cfg(feature = "device")]
    Devices,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Encode { command, output } => encode_command(command, &output, &config),
        Commands::Decode { input } => decode_command(&input, &config),
        Commands::Send { command, io } => send_command(command, &io, &config),
        Commands::Receive { timeout, io } => receive_command(timeout, &io, &config),
        Commands::Exchange {
            command,
            expect,
            timeout,
            io,
        } => exchange_command(command, expect, timeout, &io, &config),
        Commands::Listen {
            on_capture,
            timeout,
            io,
        } => listen_command(on_capture.as_deref(), timeout, &io, &config),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
        #[cfg(feature = "device")]
        Commands::Devices => devices_command(),
    }
}

fn load_config(path: Option<&Path>) -> Result<ModemConfig, CliError> {
    let config = match path {
        Some(path) => {
            tracing::debug!("Loading configuration from {}", path.display());
            serde_json::from_str(&std::fs::read_to_string(path)?)?
        }
        None => ModemConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Timeout in seconds; "inf" means no deadline
fn parse_timeout(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("{:?} is not a number of seconds", value))?;
    if seconds.is_nan() || seconds < 0.0 {
        return Err(format!("{} is not a valid timeout", value));
    }
    if seconds.is_infinite() {
        return Ok(Duration::MAX);
    }
    Duration::try_from_secs_f64(seconds).map_err(|err| format!("{} seconds: {}", value, err))
}

fn encode_command(command: Command, output: &Path, config: &ModemConfig) -> Result<ExitCode, CliError> {
    let samples = synthesize(command, config)?;
    wav::write_wav(output, &samples, config.sample_rate)?;
    println!(
        "Encoded {} ({:.2}s) to {}",
        command,
        config.frame_duration().as_secs_f32(),
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn decode_command(input: &Path, config: &ModemConfig) -> Result<ExitCode, CliError> {
    let samples = wav::read_wav(input, config.sample_rate)?;
    let mut decoder = FrameDecoder::new(*config)?;

    let mut accepted = 0;
    let mut next = decoder.push(&samples)?;
    while let Some(result) = next {
        if result.is_accepted() {
            accepted += 1;
        }
        print_result(&result, config);
        next = decoder.poll();
    }

    if accepted == 0 {
        print_result(&decoder.finish(), config);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn send_command(command: Command, io: &IoArgs, config: &ModemConfig) -> Result<ExitCode, CliError> {
    let mut output = open_output(io, config)?;
    tonelink_core::session::send(&mut output, command, config)?;
    output.finish()?;
    println!("Sent {}", command);
    Ok(ExitCode::SUCCESS)
}

fn receive_command(timeout: Duration, io: &IoArgs, config: &ModemConfig) -> Result<ExitCode, CliError> {
    let mut input = open_input(io, config)?;
    let result = tonelink_core::session::receive(&mut input, config, timeout)?;
    print_result(&result, config);
    Ok(if result.is_accepted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn exchange_command(
    command: Command,
    expect: Command,
    timeout: Duration,
    io: &IoArgs,
    config: &ModemConfig,
) -> Result<ExitCode, CliError> {
    let mut session = Session::new(*config, open_input(io, config)?, open_output(io, config)?)?;
    let answered = session.exchange(command, expect, timeout)?;
    let (_, output) = session.into_parts();
    output.finish()?;

    if answered {
        println!("{} answered with {}", command, expect);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} got no {}", command, expect);
        Ok(ExitCode::FAILURE)
    }
}

fn listen_command(
    on_capture: Option<&str>,
    timeout: Duration,
    io: &IoArgs,
    config: &ModemConfig,
) -> Result<ExitCode, CliError> {
    let mut session = Session::new(*config, open_input(io, config)?, open_output(io, config)?)?;
    tracing::info!("Listening for commands");

    loop {
        let result = match session.serve_once(timeout, |command| respond(command, on_capture)) {
            Ok(result) => result,
            Err(err @ ModemError::CaptureFault { .. }) => {
                tracing::warn!("{}; listening again", err);
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        match &result {
            DecodeResult::Accepted(_) => print_result(&result, config),
            DecodeResult::Rejected(Rejection::Timeout) => tracing::debug!("Nothing heard, still listening"),
            DecodeResult::Rejected(reason) => tracing::info!("Ignored frame: {}", reason),
        }

        let ended = matches!(
            result.rejection(),
            Some(Rejection::NoPreamble) | Some(Rejection::Truncated)
        );
        if ended && session.input().is_exhausted() {
            break;
        }
    }

    let (_, output) = session.into_parts();
    output.finish()?;
    Ok(ExitCode::SUCCESS)
}

/// Reply for an accepted command
fn respond(command: Command, on_capture: Option<&str>) -> Option<Command> {
    match command {
        Command::Capture => Some(if run_capture_hook(on_capture) {
            Command::Done
        } else {
            Command::Error
        }),
        other => other.reply(),
    }
}

fn run_capture_hook(hook: Option<&str>) -> bool {
    let Some(hook) = hook else {
        return true;
    };

    tracing::info!("Running capture hook: {}", hook);
    let status = if cfg!(windows) {
        std::process::Command::new("cmd").args(["/C", hook]).status()
    } else {
        std::process::Command::new("sh").args(["-c", hook]).status()
    };

    match status {
        Ok(status) if status.success() => true,
        Ok(status) => {
            tracing::warn!("Capture hook failed: {}", status);
            false
        }
        Err(err) => {
            tracing::warn!("Capture hook could not start: {}", err);
            false
        }
    }
}

fn print_result(result: &DecodeResult, config: &ModemConfig) {
    match result {
        DecodeResult::Accepted(decoded) => {
            let rate = config.sample_rate as f64;
            println!(
                "Accepted {} at {:.2}s-{:.2}s",
                decoded.command,
                decoded.span.start as f64 / rate,
                decoded.span.end as f64 / rate
            );
        }
        DecodeResult::Rejected(reason) => println!("Rejected: {}", reason),
    }
}

fn open_input(io: &IoArgs, config: &ModemConfig) -> Result<Box<dyn AudioSource>, CliError> {
    match &io.input_wav {
        Some(path) => Ok(Box::new(WavSource::open(path, config.sample_rate)?)),
        None => open_input_device(io.input_device.as_deref(), config),
    }
}

#[cfg(feature = "device")]
fn open_input_device(name: Option<&str>, config: &ModemConfig) -> Result<Box<dyn AudioSource>, CliError> {
    Ok(Box::new(device::DeviceSource::open(name, config.sample_rate)?))
}

#[cfg(not(feature = "device"))]
fn open_input_device(_name: Option<&str>, _config: &ModemConfig) -> Result<Box<dyn AudioSource>, CliError> {
    Err(CliError::NoAudioBackend("input"))
}

/// Where transmissions go
enum Output {
    Wav(WavSink),
    #[cfg(feature = "device")]
    Device(device::DeviceSink),
}

impl Output {
    fn finish(self) -> Result<(), CliError> {
        match self {
            Output::Wav(sink) => sink.finish(),
            #[cfg(feature = "device")]
            Output::Device(_) => Ok(()),
        }
    }
}

impl AudioSink for Output {
    fn play(&mut self, samples: &[f32]) -> tonelink_core::Result<()> {
        match self {
            Output::Wav(sink) => sink.play(samples),
            #[cfg(feature = "device")]
            Output::Device(sink) => sink.play(samples),
        }
    }
}

fn open_output(io: &IoArgs, config: &ModemConfig) -> Result<Output, CliError> {
    match &io.output_wav {
        Some(path) => Ok(Output::Wav(WavSink::create(path, config.sample_rate)?)),
        None => open_output_device(io.output_device.as_deref(), config),
    }
}

#[cfg(feature = "device")]
fn open_output_device(name: Option<&str>, config: &ModemConfig) -> Result<Output, CliError> {
    Ok(Output::Device(device::DeviceSink::open(name, config.sample_rate)?))
}

#[cfg(not(feature = "device"))]
fn open_output_device(_name: Option<&str>, _config: &ModemConfig) -> Result<Output, CliError> {
    Err(CliError::NoAudioBackend("output"))
}

#[cfg(feature = "device")]
fn devices_command() -> Result<ExitCode, CliError> {
    let (inputs, outputs) = device::list_devices()?;
    println!("Input devices:");
    for name in inputs {
        println!("  {}", name);
    }
    println!("Output devices:");
    for name in outputs {
        println!("  {}", name);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ping_is_answered_without_hook() {
        assert_eq!(respond(Command::Ping, None), Some(Command::Pong));
        assert_eq!(respond(Command::Done, None), None);
        assert_eq!(respond(Command::Capture, None), Some(Command::Done));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_hook_answers_error() {
        assert_eq!(respond(Command::Capture, Some("exit 3")), Some(Command::Error));
        assert_eq!(respond(Command::Capture, Some("true")), Some(Command::Done));
    }

    #[test]
    fn test_timeout_parsing() {
        assert_eq!(parse_timeout("2.5"), Ok(Duration::from_millis(2500)));
        assert_eq!(parse_timeout("inf"), Ok(Duration::MAX));
        assert!(parse_timeout("1e300").is_err());
        assert!(parse_timeout("-1").is_err());
        assert!(parse_timeout("NaN").is_err());
        assert!(parse_timeout("soon").is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(load_config(Some(missing.as_path())).is_err());
    }

    #[test]
    fn test_invalid_config_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "mark_freq": 1800.0 }"#).unwrap();
        assert!(matches!(load_config(Some(path.as_path())), Err(CliError::Modem(_))));
    }
}
