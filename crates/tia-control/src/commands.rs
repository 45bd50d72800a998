use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
pub use clap_complete::Shell;

use crate::calibration::CalibrationKind;
use crate::experiment::SedParams;

const LONG_ABOUT: &str = r#"tia-control drives a TIA software server over its remote-automation interface.

Every invocation connects to the server, mirrors the current session (display
windows, displays, images and workspace variables) and applies one command.

NAMES:
    New windows, displays and images are named from the requested name. A name
    that is already taken gets a numeric suffix: W, W1, W2; D1, D2, D3.

POSITIONS:
    Beam positions are fractions of the maximum scan range in [-1, 1] unless
    the beam control is position-calibrated.

EXAMPLES:
    tia-control open W
    tia-control display add W D
    tia-control var calibration cal 0 0 1e-9 1e-9
    tia-control image add W D img --size-x 512 --size-y 512 --calibration cal
    tia-control setup select Image
    tia-control signal link HAADF W D img
    tia-control acquire start
    tia-control tree"#;

#[derive(Parser)]
#[command(name = "tia-control")]
#[command(author, version)]
#[command(about = "Control a TIA instrument session from the command line")]
#[command(long_about = LONG_ABOUT)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Log every remote call to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Software server address (host:port)
    #[arg(long, global = true, env = "TIA_ADDR")]
    pub addr: Option<String>,
}

impl Cli {
    /// Returns the effective output format, considering --json shorthand.
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the window/display/image tree
    Tree,

    /// List open display windows and the active one
    Windows,

    /// Open display windows
    Open {
        /// Requested window name (the server picks one when omitted)
        name: Option<String>,

        /// Number of windows to open
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },

    /// Close a display window
    Close {
        /// Window to close
        #[arg(required_unless_present = "all")]
        name: Option<String>,

        /// Close every known window
        #[arg(long, conflicts_with = "name")]
        all: bool,
    },

    /// Bring a display window to the front
    Activate { name: String },

    /// Display panes inside a window
    #[command(subcommand)]
    Display(DisplayCommand),

    /// Images inside a display
    #[command(subcommand)]
    Image(ImageCommand),

    /// Workspace variables
    #[command(subcommand)]
    Var(VarCommand),

    /// Acquisition manager state and acquisition
    #[command(subcommand)]
    Acquire(AcquireCommand),

    /// Acquisition setups
    #[command(subcommand)]
    Setup(SetupCommand),

    /// Signals and signal-to-image links
    #[command(subcommand)]
    Signal(SignalCommand),

    /// CCD server
    #[command(subcommand)]
    Ccd(CcdCommand),

    /// Scanning server
    #[command(subcommand)]
    Scan(ScanCommand),

    /// Beam position control
    #[command(subcommand)]
    Beam(BeamCommand),

    /// Submit a serial electron diffraction run and print the submitted record
    #[command(allow_negative_numbers = true)]
    Sed {
        #[command(flatten)]
        params: SedArgs,
    },

    /// Calibration artifacts
    #[command(subcommand)]
    Calib(CalibCommand),

    /// Generate shell completion scripts
    #[command(long_about = r#"Generate shell completion scripts.

EXAMPLES:
    tia-control completions bash > /etc/bash_completion.d/tia-control
    tia-control completions zsh > /usr/local/share/zsh/site-functions/_tia-control"#)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum DisplayCommand {
    /// Add display panes to a window
    Add {
        window: String,
        name: String,

        /// Number of displays to add
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Fraction of the window the new pane takes, in (0, 1]
        #[arg(long)]
        split_portion: Option<f64>,
    },

    /// Delete display panes from a window
    Delete {
        window: String,

        #[arg(required_unless_present = "all")]
        name: Option<String>,

        #[arg(long, conflicts_with = "name")]
        all: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ImageCommand {
    /// Add an image bound to a Calibration2D variable
    Add {
        window: String,

        /// Target display; every display of the window when omitted
        #[arg(long)]
        display: Option<String>,

        name: String,

        #[arg(long)]
        size_x: u32,

        #[arg(long)]
        size_y: u32,

        /// Calibration2D workspace variable
        #[arg(long)]
        calibration: String,
    },

    /// Show image metadata, or one pixel value and its calibrated position
    Show {
        window: String,
        display: String,
        image: String,

        #[arg(long, num_args = 2, value_names = ["ROW", "COL"])]
        pixel: Option<Vec<usize>>,
    },

    /// Delete images from a display
    Delete {
        window: String,
        display: String,

        #[arg(required_unless_present = "all")]
        name: Option<String>,

        #[arg(long, conflicts_with = "name")]
        all: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum VarCommand {
    /// List workspace variables
    List,

    /// Create a Calibration2D variable
    #[command(allow_negative_numbers = true)]
    Calibration {
        name: String,
        offset_x: f64,
        offset_y: f64,
        delta_x: f64,
        delta_y: f64,
    },

    /// Create (or with --update, re-create) a Range2D variable
    #[command(allow_negative_numbers = true)]
    Range2d {
        name: String,
        start_x: f64,
        start_y: f64,
        end_x: f64,
        end_y: f64,

        /// The variable must already exist
        #[arg(long)]
        update: bool,
    },

    /// Create a Range1D variable
    #[command(allow_negative_numbers = true)]
    Range1d { name: String, start: f64, end: f64 },

    /// Create a Position2D variable
    #[command(allow_negative_numbers = true)]
    Position { name: String, x: f64, y: f64 },

    /// Position collections
    #[command(subcommand)]
    Collection(CollectionCommand),

    /// Create a SpatialUnit variable, or read its unit back
    Unit {
        name: String,

        /// Unit to create the variable with (m, nm, 1/m, ...)
        unit: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum CollectionCommand {
    /// Create an empty collection
    Create { name: String },

    /// Append a position
    #[command(allow_negative_numbers = true)]
    Add { name: String, x: f64, y: f64 },

    /// Replace the contents with `count` evenly spaced points on a line
    #[command(allow_negative_numbers = true)]
    Line {
        name: String,
        from_x: f64,
        from_y: f64,
        to_x: f64,
        to_y: f64,
        count: u32,
    },

    /// Replace the contents with an n_x by n_y grid over a Range2D variable
    Grid {
        name: String,
        range: String,
        n_x: u32,
        n_y: u32,
    },

    /// Copy positions start..=stop into a new collection
    Sub {
        source: String,
        name: String,
        start: usize,
        stop: usize,
    },

    /// Remove every position
    Clear { name: String },
}

#[derive(Debug, Subcommand)]
pub enum AcquireCommand {
    /// Show the acquisition state and setup
    Status,

    /// Acquire one frame
    Single,

    /// Start continuous acquisition
    Start,

    /// Stop acquisition
    Stop,

    /// Acquire at every position of a collection (spot mode only)
    Set {
        collection: String,

        /// Dwell time per position in seconds
        dwell: f64,
    },
}

#[derive(Debug, Subcommand)]
pub enum SetupCommand {
    Select { name: String },
    Add { name: String },
    Delete { name: String },
    /// Print the current setup
    Current,
}

#[derive(Debug, Subcommand)]
pub enum SignalCommand {
    /// List signals by type, with the enabled subset
    List,

    /// Route a signal into an image
    Link {
        signal: String,
        window: String,
        display: String,
        image: String,
    },

    /// Remove signal links
    Unlink {
        #[arg(required_unless_present = "all")]
        signal: Option<String>,

        #[arg(long, conflicts_with = "signal")]
        all: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum CcdCommand {
    /// Show every CCD server field and its allowed ranges
    Show,

    /// Write one CCD server field
    #[command(allow_negative_numbers = true)]
    Set {
        #[arg(value_enum)]
        field: CcdField,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CcdField {
    AcquireMode,
    Camera,
    CameraInserted,
    IntegrationTime,
    Binning,
    ReadoutRate,
    DriftRateX,
    DriftRateY,
    BiasCorrection,
    GainCorrection,
    SeriesSize,
    /// Position2D variable name
    ReferencePosition,
    /// Range2D variable name
    ReadoutRange,
    /// Range2D variable name
    PixelReadoutRange,
}

#[derive(Debug, Subcommand)]
pub enum ScanCommand {
    /// Show every scanning server field, allowed ranges and magnifications
    Show,

    /// Write one scanning server field
    #[command(allow_negative_numbers = true)]
    Set {
        #[arg(value_enum)]
        field: ScanField,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanField {
    AcquireMode,
    FrameWidth,
    FrameHeight,
    DwellTime,
    ScanResolution,
    ScanMode,
    ForceExternalScan,
    DriftRateX,
    DriftRateY,
    SeriesSize,
    /// Position2D variable name
    ReferencePosition,
    /// Position2D variable name
    BeamPosition,
    /// Range2D variable name
    ScanRange,
}

#[derive(Debug, Subcommand)]
pub enum BeamCommand {
    /// Show beam control state
    Show,

    /// Move the beam to a position
    #[command(allow_negative_numbers = true)]
    Move { x: f64, y: f64 },

    Start,
    Stop,
    Reset,
}

#[derive(Debug, Clone, Copy, clap::Args)]
pub struct SedArgs {
    /// Imaging exposure in seconds
    #[arg(long, default_value_t = SedParams::default().image_exposure)]
    pub image_exposure: f64,

    #[arg(long, default_value_t = SedParams::default().image_spotsize)]
    pub image_spotsize: u32,

    /// Diffraction exposure in seconds
    #[arg(long, default_value_t = SedParams::default().diff_exposure)]
    pub diff_exposure: f64,

    #[arg(long, default_value_t = SedParams::default().diff_spotsize)]
    pub diff_spotsize: u32,

    #[arg(long, default_value_t = SedParams::default().diff_brightness)]
    pub diff_brightness: u32,

    /// Scan radius in micrometres
    #[arg(long, default_value_t = SedParams::default().scan_radius)]
    pub scan_radius: f64,
}

impl From<SedArgs> for SedParams {
    fn from(args: SedArgs) -> Self {
        SedParams {
            image_exposure: args.image_exposure,
            image_spotsize: args.image_spotsize,
            diff_exposure: args.diff_exposure,
            diff_spotsize: args.diff_spotsize,
            diff_brightness: args.diff_brightness,
            scan_radius: args.scan_radius,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CalibCommand {
    /// Print the point series of a calibration artifact
    Show {
        #[arg(value_enum)]
        kind: CalibrationKind,

        /// Direct-beam axis (BeamShift or DiffShift); all axes when omitted
        #[arg(long)]
        axis: Option<String>,

        /// Directory holding the calibration files (defaults to TIA_CALIB_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["tia-control", "tree"]);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Tree));
    }

    #[test]
    fn test_json_shorthand_wins() {
        let cli = Cli::parse_from(["tia-control", "--json", "windows"]);
        assert_eq!(cli.effective_format(), OutputFormat::Json);
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "tia-control",
            "--addr",
            "tem-pc:8088",
            "--format",
            "json",
            "--verbose",
            "windows",
        ]);
        assert_eq!(cli.addr.as_deref(), Some("tem-pc:8088"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn test_open_count() {
        let cli = Cli::parse_from(["tia-control", "open", "W", "-n", "3"]);
        let Commands::Open { name, count } = cli.command else {
            panic!("Expected Open command, got {:?}", cli.command);
        };
        assert_eq!(name.as_deref(), Some("W"));
        assert_eq!(count, 3);
    }

    #[test]
    fn test_close_requires_name_or_all() {
        assert!(Cli::try_parse_from(["tia-control", "close"]).is_err());
        assert!(Cli::try_parse_from(["tia-control", "close", "W", "--all"]).is_err());
        assert!(Cli::try_parse_from(["tia-control", "close", "--all"]).is_ok());
    }

    #[test]
    fn test_negative_positions() {
        let cli = Cli::parse_from(["tia-control", "beam", "move", "-0.5", "0.25"]);
        let Commands::Beam(BeamCommand::Move { x, y }) = cli.command else {
            panic!("Expected beam move, got {:?}", cli.command);
        };
        assert_eq!((x, y), (-0.5, 0.25));

        let cli = Cli::parse_from(["tia-control", "var", "range2d", "r", "-1", "-1", "1", "1"]);
        let Commands::Var(VarCommand::Range2d { start_x, update, .. }) = cli.command else {
            panic!("Expected var range2d, got {:?}", cli.command);
        };
        assert_eq!(start_x, -1.0);
        assert!(!update);
    }

    #[test]
    fn test_image_show_pixel() {
        let cli = Cli::parse_from([
            "tia-control", "image", "show", "W", "D", "img", "--pixel", "1", "3",
        ]);
        let Commands::Image(ImageCommand::Show { pixel, .. }) = cli.command else {
            panic!("Expected image show, got {:?}", cli.command);
        };
        assert_eq!(pixel, Some(vec![1, 3]));
    }

    #[test]
    fn test_sed_defaults() {
        let cli = Cli::parse_from(["tia-control", "sed"]);
        let Commands::Sed { params } = cli.command else {
            panic!("Expected sed, got {:?}", cli.command);
        };
        assert_eq!(SedParams::from(params), SedParams::default());
    }

    #[test]
    fn test_field_names_are_kebab_case() {
        let cli = Cli::parse_from(["tia-control", "ccd", "set", "integration-time", "0.5"]);
        let Commands::Ccd(CcdCommand::Set { field, value }) = cli.command else {
            panic!("Expected ccd set, got {:?}", cli.command);
        };
        assert_eq!(field, CcdField::IntegrationTime);
        assert_eq!(value, "0.5");
    }

    #[test]
    fn test_completions_command() {
        let cli = Cli::parse_from(["tia-control", "completions", "bash"]);
        let Commands::Completions { shell } = cli.command else {
            panic!("Expected Completions command, got {:?}", cli.command);
        };
        assert!(matches!(shell, Shell::Bash));
    }
}
