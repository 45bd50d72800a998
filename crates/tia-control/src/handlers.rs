use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use tia_core::{
    AcquisitionController, BeamControlProxy, Calibration2D, CcdServerProxy, DisplayOptions,
    Position2D, RemoteAdapter, RemoteRef, ScanningServerProxy, SessionGraph, TiaError,
};
use tia_ipc::TcpRemoteHandle;

use crate::calibration::{SeriesCollector, calibration_path, load_calibration, plot};
use crate::commands::{
    AcquireCommand, BeamCommand, CalibCommand, CcdCommand, CcdField, CollectionCommand,
    DisplayCommand, ImageCommand, OutputFormat, ScanCommand, ScanField, SetupCommand,
    SignalCommand, VarCommand,
};
use crate::common::Colors;
use crate::config::ControlConfig;
use crate::experiment::{ExperimentSubmitter, SedParams, TriggerEvent, work_queue};
use crate::presenter::{Presenter, create_presenter};

pub type HandlerResult = Result<(), Box<dyn std::error::Error>>;

/// Per-invocation state shared by the handlers. The remote connection is
/// opened on first use so offline commands never touch the network.
pub struct HandlerContext {
    pub format: OutputFormat,
    config: ControlConfig,
    presenter: Box<dyn Presenter>,
    remote: Option<RemoteRef>,
}

impl HandlerContext {
    pub fn new(config: ControlConfig, format: OutputFormat) -> Self {
        Self {
            format,
            config,
            presenter: create_presenter(format),
            remote: None,
        }
    }

    /// Uses an already connected remote instead of dialing the configured address.
    pub fn with_remote(mut self, remote: RemoteRef) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn presenter(&self) -> &dyn Presenter {
        self.presenter.as_ref()
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn remote(&mut self) -> Result<RemoteRef, Box<dyn std::error::Error>> {
        if let Some(remote) = &self.remote {
            return Ok(remote.clone());
        }
        let handle = TcpRemoteHandle::connect(self.config.remote())?;
        let remote = RemoteAdapter::shared(handle);
        self.remote = Some(remote.clone());
        Ok(remote)
    }

    fn graph(&mut self) -> Result<SessionGraph, Box<dyn std::error::Error>> {
        Ok(SessionGraph::new(self.remote()?)?)
    }

    fn controller(&mut self) -> Result<AcquisitionController, Box<dyn std::error::Error>> {
        Ok(AcquisitionController::new(self.remote()?)?)
    }

    fn success(&self, message: &str) {
        self.presenter.present_success(message, None);
    }

    /// JSON prints the record whole; text prints one line per top-level field.
    fn output_record<T: Serialize>(&self, title: &str, record: &T) -> HandlerResult {
        let value = serde_json::to_value(record)?;
        match self.format {
            OutputFormat::Json => self.presenter.present_value(&value),
            OutputFormat::Text => {
                self.presenter.present_list_header(title);
                match &value {
                    Value::Object(fields) => {
                        for (key, field) in fields {
                            self.presenter.present_kv(key, &compact(field));
                        }
                    }
                    other => self.presenter.present_value(other),
                }
            }
        }
        Ok(())
    }

    fn output_list(&self, title: &str, empty: &str, items: &[String]) {
        match self.format {
            OutputFormat::Json => self.presenter.present_value(&json!(items)),
            OutputFormat::Text if items.is_empty() => self.presenter.present_info(empty),
            OutputFormat::Text => {
                self.presenter.present_list_header(title);
                for item in items {
                    self.presenter.present_list_item(item);
                }
            }
        }
    }
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parses a command-line field value; failures are reported as invalid
/// values for that field.
fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, TiaError> {
    value.parse().map_err(|_| TiaError::InvalidEnumValue {
        field,
        value: value.to_string(),
    })
}

pub fn handle_tree(ctx: &mut HandlerContext) -> HandlerResult {
    let graph = ctx.graph()?;
    match ctx.format {
        OutputFormat::Json => {
            let mut windows = serde_json::Map::new();
            for (window_name, window) in graph.windows() {
                let mut displays = serde_json::Map::new();
                for (display_name, display) in window.displays() {
                    let images: Vec<&String> = display.images().keys().collect();
                    let markers: Vec<&String> = display.position_markers().keys().collect();
                    displays.insert(
                        display_name.clone(),
                        json!({ "images": images, "position_markers": markers }),
                    );
                }
                windows.insert(window_name.clone(), Value::Object(displays));
            }
            let variables: Vec<&String> = graph.variables().keys().collect();
            ctx.presenter()
                .present_value(&json!({ "windows": windows, "variables": variables }));
        }
        OutputFormat::Text => ctx.presenter().present_raw(graph.to_string().trim_end()),
    }
    Ok(())
}

pub fn handle_windows(ctx: &mut HandlerContext) -> HandlerResult {
    let graph = ctx.graph()?;
    let names: Vec<String> = graph.windows().keys().cloned().collect();
    let active = graph.active_window_name()?;
    match ctx.format {
        OutputFormat::Json => ctx.presenter().present_value(&json!({
            "windows": names,
            "active": (!active.is_empty()).then_some(active),
        })),
        OutputFormat::Text => {
            let items: Vec<String> = names
                .iter()
                .map(|name| {
                    if *name == active {
                        format!("{} {}", Colors::name(name), Colors::success("(active)"))
                    } else {
                        Colors::name(name)
                    }
                })
                .collect();
            ctx.output_list("Windows:", "No display windows", &items);
        }
    }
    Ok(())
}

pub fn handle_open(ctx: &mut HandlerContext, name: Option<String>, count: usize) -> HandlerResult {
    let mut graph = ctx.graph()?;
    let opened = graph.open_many(name.as_deref(), count)?;
    match ctx.format {
        OutputFormat::Json => ctx.presenter().present_value(&json!({ "opened": opened })),
        OutputFormat::Text => {
            for name in &opened {
                ctx.success(&format!("Opened window {}", name));
            }
        }
    }
    Ok(())
}

pub fn handle_close(ctx: &mut HandlerContext, name: Option<String>, all: bool) -> HandlerResult {
    let mut graph = ctx.graph()?;
    match name {
        Some(name) if !all => {
            graph.close(&name)?;
            ctx.success(&format!("Closed window {}", name));
        }
        _ => {
            graph.close_all()?;
            ctx.success("Closed all windows");
        }
    }
    Ok(())
}

pub fn handle_activate(ctx: &mut HandlerContext, name: String) -> HandlerResult {
    let graph = ctx.graph()?;
    graph.activate(&name)?;
    ctx.success(&format!("Activated window {}", name));
    Ok(())
}

pub fn handle_display(ctx: &mut HandlerContext, command: DisplayCommand) -> HandlerResult {
    let mut graph = ctx.graph()?;
    match command {
        DisplayCommand::Add {
            window,
            name,
            count,
            split_portion,
        } => {
            let window = graph.require_window_mut(&window)?;
            let added = match split_portion {
                None => window.add_displays(&name, count)?,
                Some(portion) => {
                    let options = DisplayOptions::default().with_split_portion(portion);
                    let mut added = Vec::with_capacity(count);
                    for _ in 0..count {
                        added.push(window.add_display(&name, options)?.name().to_string());
                    }
                    added
                }
            };
            match ctx.format {
                OutputFormat::Json => ctx.presenter().present_value(&json!({ "added": added })),
                OutputFormat::Text => {
                    for name in &added {
                        ctx.success(&format!("Added display {}", name));
                    }
                }
            }
        }
        DisplayCommand::Delete { window, name, all } => {
            let window = graph.require_window_mut(&window)?;
            match name {
                Some(name) if !all => {
                    window.delete_display(&name)?;
                    ctx.success(&format!("Deleted display {}", name));
                }
                _ => {
                    window.delete_all_displays()?;
                    ctx.success("Deleted all displays");
                }
            }
        }
    }
    Ok(())
}

pub fn handle_image(ctx: &mut HandlerContext, command: ImageCommand) -> HandlerResult {
    let mut graph = ctx.graph()?;
    match command {
        ImageCommand::Add {
            window,
            display,
            name,
            size_x,
            size_y,
            calibration,
        } => {
            let window = graph.require_window_mut(&window)?;
            match display {
                Some(display) => {
                    let display = window
                        .display_mut(&display)
                        .ok_or_else(|| TiaError::not_found("display", display.as_str()))?;
                    let image = display.add_image(&name, size_x, size_y, &calibration)?;
                    ctx.success(&format!("Added image {}", image.name()));
                }
                None => {
                    window.add_images_to_displays(&name, size_x, size_y, &calibration)?;
                    ctx.success(&format!("Added image {} to every display", name));
                }
            }
        }
        ImageCommand::Show {
            window,
            display,
            image,
            pixel,
        } => {
            let node = graph
                .window(&window)
                .ok_or_else(|| TiaError::not_found("window", window.as_str()))?
                .display(&display)
                .ok_or_else(|| TiaError::not_found("display", display.as_str()))?
                .image(&image)
                .ok_or_else(|| TiaError::not_found("image", image.as_str()))?;
            let data = node.data();
            match pixel.as_deref() {
                Some([row, col]) => {
                    let missing = || TiaError::not_found("pixel", format!("({}, {})", row, col));
                    let value = data.value.get(*row, *col).ok_or_else(missing)?;
                    let position = data.pixel_position.at(*row, *col).ok_or_else(missing)?;
                    ctx.output_record(
                        &format!("Pixel ({}, {}) of {}", row, col, image),
                        &json!({ "value": value, "position": position }),
                    )?;
                }
                _ => {
                    let (rows, cols) = data.value.shape();
                    ctx.output_record(
                        &format!("Image {}", image),
                        &json!({
                            "size_x": data.size_x,
                            "size_y": data.size_y,
                            "shape": [rows, cols],
                            "calibration": data.calibration,
                            "range": data.range,
                        }),
                    )?;
                }
            }
        }
        ImageCommand::Delete {
            window,
            display,
            name,
            all,
        } => {
            let display_node = graph
                .require_window_mut(&window)?
                .display_mut(&display)
                .ok_or_else(|| TiaError::not_found("display", display.as_str()))?;
            match name {
                Some(name) if !all => {
                    display_node.delete_image(&name)?;
                    ctx.success(&format!("Deleted image {}", name));
                }
                _ => {
                    display_node.delete_all_images()?;
                    ctx.success("Deleted all images");
                }
            }
        }
    }
    Ok(())
}

pub fn handle_var(ctx: &mut HandlerContext, command: VarCommand) -> HandlerResult {
    let mut graph = ctx.graph()?;
    match command {
        VarCommand::List => {
            let summaries: serde_json::Map<String, Value> = graph
                .variables()
                .iter()
                .map(|(name, value)| {
                    serde_json::to_value(value.summary()).map(|summary| (name.clone(), summary))
                })
                .collect::<Result<_, serde_json::Error>>()?;
            match ctx.format {
                OutputFormat::Json => ctx.presenter().present_value(&Value::Object(summaries)),
                OutputFormat::Text => {
                    let items: Vec<String> = summaries
                        .iter()
                        .map(|(name, s)| {
                            format!("{} [{}] {}", name, compact(&s["type"]), compact(&s["value"]))
                        })
                        .collect();
                    ctx.output_list("Workspace variables:", "No workspace variables", &items);
                }
            }
        }
        VarCommand::Calibration {
            name,
            offset_x,
            offset_y,
            delta_x,
            delta_y,
        } => {
            let calibration = Calibration2D::new(offset_x, offset_y, delta_x, delta_y);
            let canonical = graph.add_calibration2d(&name, calibration)?;
            ctx.output_record(&format!("Calibration2D {}", name), &canonical)?;
        }
        VarCommand::Range2d {
            name,
            start_x,
            start_y,
            end_x,
            end_y,
            update,
        } => {
            let start = Position2D::new(start_x, start_y);
            let end = Position2D::new(end_x, end_y);
            let range = if update {
                graph.update_range2d(&name, start, end)?
            } else {
                graph.add_range2d(&name, start, end)?
            };
            ctx.output_record(&format!("Range2D {}", name), &range)?;
        }
        VarCommand::Range1d { name, start, end } => {
            let range = graph.add_range1d(&name, start, end)?;
            ctx.output_record(&format!("Range1D {}", name), &range)?;
        }
        VarCommand::Position { name, x, y } => {
            let position = graph.add_position2d(&name, Position2D::new(x, y))?;
            ctx.output_record(&format!("Position2D {}", name), &position)?;
        }
        VarCommand::Collection(command) => {
            let collection = match command {
                CollectionCommand::Create { name } => graph.add_position_collection(&name)?,
                CollectionCommand::Add { name, x, y } => {
                    let collection = graph.position_collection_mut(&name)?;
                    collection.add_position(Position2D::new(x, y))?;
                    collection
                }
                CollectionCommand::Line {
                    name,
                    from_x,
                    from_y,
                    to_x,
                    to_y,
                    count,
                } => {
                    let collection = graph.position_collection_mut(&name)?;
                    collection.set_line_pattern(
                        Position2D::new(from_x, from_y),
                        Position2D::new(to_x, to_y),
                        count,
                    )?;
                    collection
                }
                CollectionCommand::Grid {
                    name,
                    range,
                    n_x,
                    n_y,
                } => {
                    graph.range2d(&range)?;
                    let collection = graph.position_collection_mut(&name)?;
                    collection.set_grid_pattern(&range, n_x, n_y)?;
                    collection
                }
                CollectionCommand::Sub {
                    source,
                    name,
                    start,
                    stop,
                } => graph.add_sub_collection(&source, &name, start, stop)?,
                CollectionCommand::Clear { name } => {
                    let collection = graph.position_collection_mut(&name)?;
                    collection.clear()?;
                    collection
                }
            };
            ctx.output_record(
                &format!("PositionCollection {}", collection.name()),
                &json!({ "count": collection.count(), "positions": collection.positions() }),
            )?;
        }
        VarCommand::Unit { name, unit } => {
            let unit = match unit {
                Some(unit) => graph.add_spatial_unit(&name, &unit)?.last_unit(),
                None => graph.spatial_unit_mut(&name)?.unit()?,
            };
            ctx.output_record(&format!("SpatialUnit {}", name), &json!({ "unit": unit }))?;
        }
    }
    Ok(())
}

pub fn handle_acquire(ctx: &mut HandlerContext, command: AcquireCommand) -> HandlerResult {
    let controller = ctx.controller()?;
    match command {
        AcquireCommand::Status => {
            ctx.output_record(
                "Acquisition",
                &json!({
                    "state": controller.state()?,
                    "setup": controller.setup(),
                    "can_start": controller.can_start()?,
                    "can_stop": controller.can_stop()?,
                }),
            )?;
        }
        AcquireCommand::Single => {
            controller.acquire_single()?;
            ctx.success("Acquired one frame");
        }
        AcquireCommand::Start => {
            controller.start_acquisition()?;
            ctx.success("Acquisition started");
        }
        AcquireCommand::Stop => {
            controller.stop_acquisition()?;
            ctx.success("Acquisition stopped");
        }
        AcquireCommand::Set { collection, dwell } => {
            controller.acquire_set(&collection, dwell)?;
            ctx.success(&format!("Acquired position set {}", collection));
        }
    }
    Ok(())
}

pub fn handle_setup(ctx: &mut HandlerContext, command: SetupCommand) -> HandlerResult {
    let mut controller = ctx.controller()?;
    match command {
        SetupCommand::Select { name } => {
            controller.select_setup(&name)?;
            ctx.success(&format!("Selected setup {}", name));
        }
        SetupCommand::Add { name } => {
            controller.add_setup(&name)?;
            ctx.success(&format!("Added setup {}", name));
        }
        SetupCommand::Delete { name } => {
            controller.delete_setup(&name)?;
            ctx.success(&format!("Deleted setup {}", name));
        }
        SetupCommand::Current => {
            let current = controller
                .does_current_setup_exist()?
                .then(|| controller.current_setup_name())
                .transpose()?;
            match (ctx.format, current) {
                (OutputFormat::Json, current) => {
                    ctx.presenter().present_value(&json!({ "setup": current }))
                }
                (OutputFormat::Text, Some(name)) => ctx.presenter().present_raw(&name),
                (OutputFormat::Text, None) => ctx.presenter().present_info("No setup selected"),
            }
        }
    }
    Ok(())
}

pub fn handle_signal(ctx: &mut HandlerContext, command: SignalCommand) -> HandlerResult {
    match command {
        SignalCommand::List => {
            let mut controller = ctx.controller()?;
            let enabled = controller.enabled_signal_names()?;
            let by_type = controller.signals_by_type()?.clone();
            ctx.output_record(
                "Signals",
                &json!({
                    "detectors": by_type.detectors,
                    "ccds": by_type.ccds,
                    "enabled": enabled,
                }),
            )?;
        }
        SignalCommand::Link {
            signal,
            window,
            display,
            image,
        } => {
            let graph = ctx.graph()?;
            let mut controller = ctx.controller()?;
            let node = graph
                .window(&window)
                .and_then(|w| w.display(&display))
                .and_then(|d| d.image(&image))
                .ok_or_else(|| {
                    TiaError::not_found("image", format!("{}/{}/{}", window, display, image))
                })?;
            controller.link_signal(&signal, node)?;
            ctx.success(&format!(
                "Linked {} to {}/{}/{}",
                signal, window, display, image
            ));
        }
        SignalCommand::Unlink { signal, all } => {
            let mut controller = ctx.controller()?;
            match signal {
                Some(signal) if !all => {
                    controller.unlink_signal(&signal)?;
                    ctx.success(&format!("Unlinked {}", signal));
                }
                _ => {
                    controller.unlink_all_signals()?;
                    ctx.success("Unlinked all signals");
                }
            }
        }
    }
    Ok(())
}

pub fn handle_ccd(ctx: &mut HandlerContext, command: CcdCommand) -> HandlerResult {
    let mut ccd = CcdServerProxy::load(ctx.remote()?)?;
    match command {
        CcdCommand::Show => ctx.output_record("CCD server", ccd.state())?,
        CcdCommand::Set { field, value } => {
            let v = value.as_str();
            match field {
                CcdField::AcquireMode => ccd.set_acquire_mode(v.parse()?)?,
                CcdField::Camera => ccd.set_camera(v)?,
                CcdField::CameraInserted => {
                    ccd.set_camera_inserted(parse_field("camera_inserted", v)?)?
                }
                CcdField::IntegrationTime => {
                    ccd.set_integration_time(parse_field("integration_time", v)?)?
                }
                CcdField::Binning => ccd.set_binning(parse_field("binning", v)?)?,
                CcdField::ReadoutRate => ccd.set_readout_rate(parse_field("readout_rate", v)?)?,
                CcdField::DriftRateX => {
                    ccd.set_drift_rate(Some(parse_field("drift_rate_x", v)?), None)?
                }
                CcdField::DriftRateY => {
                    ccd.set_drift_rate(None, Some(parse_field("drift_rate_y", v)?))?
                }
                CcdField::BiasCorrection => {
                    ccd.set_bias_correction(parse_field("bias_correction", v)?)?
                }
                CcdField::GainCorrection => {
                    ccd.set_gain_correction(parse_field("gain_correction", v)?)?
                }
                CcdField::SeriesSize => ccd.set_series_size(parse_field("series_size", v)?)?,
                CcdField::ReferencePosition => ccd.set_reference_position(v)?,
                CcdField::ReadoutRange => ccd.set_readout_range(v)?,
                CcdField::PixelReadoutRange => ccd.set_pixel_readout_range(v)?,
            }
            ctx.success(&format!("CCD {:?} set to {}", field, value));
        }
    }
    Ok(())
}

pub fn handle_scan(ctx: &mut HandlerContext, command: ScanCommand) -> HandlerResult {
    let mut scan = ScanningServerProxy::load(ctx.remote()?)?;
    match command {
        ScanCommand::Show => {
            let mut record = serde_json::to_value(scan.state())?;
            record["magnifications"] = serde_json::to_value(scan.magnifications())?;
            ctx.output_record("Scanning server", &record)?;
        }
        ScanCommand::Set { field, value } => {
            let v = value.as_str();
            match field {
                ScanField::AcquireMode => scan.set_acquire_mode(v.parse()?)?,
                ScanField::FrameWidth => {
                    let (_, height) = scan.frame_shape();
                    scan.set_frame_shape(parse_field("frame_width", v)?, height)?
                }
                ScanField::FrameHeight => {
                    let (width, _) = scan.frame_shape();
                    scan.set_frame_shape(width, parse_field("frame_height", v)?)?
                }
                ScanField::DwellTime => scan.set_dwell_time(parse_field("dwell_time", v)?)?,
                ScanField::ScanResolution => {
                    scan.set_scan_resolution(parse_field("scan_resolution", v)?)?
                }
                ScanField::ScanMode => scan.set_scan_mode(v.parse()?)?,
                ScanField::ForceExternalScan => {
                    scan.set_force_external_scan(parse_field("force_external_scan", v)?)?
                }
                ScanField::DriftRateX => {
                    scan.set_drift_rate(Some(parse_field("drift_rate_x", v)?), None)?
                }
                ScanField::DriftRateY => {
                    scan.set_drift_rate(None, Some(parse_field("drift_rate_y", v)?))?
                }
                ScanField::SeriesSize => scan.set_series_size(parse_field("series_size", v)?)?,
                ScanField::ReferencePosition => scan.set_reference_position(v)?,
                ScanField::BeamPosition => scan.set_beam_position(v)?,
                ScanField::ScanRange => scan.set_scan_range(v)?,
            }
            ctx.success(&format!("Scanning {:?} set to {}", field, value));
        }
    }
    Ok(())
}

pub fn handle_beam(ctx: &mut HandlerContext, command: BeamCommand) -> HandlerResult {
    let beam = BeamControlProxy::create(ctx.remote()?)?;
    match command {
        BeamCommand::Show => {
            let mut record = serde_json::to_value(beam.state())?;
            record["scan_mode"] = json!(beam.scan_mode());
            record["can_start"] = json!(beam.can_start()?);
            record["is_scanning"] = json!(beam.is_scanning()?);
            ctx.output_record("Beam control", &record)?;
        }
        BeamCommand::Move { x, y } => {
            beam.move_beam(x, y)?;
            ctx.success(&format!("Beam moved to {}", Position2D::new(x, y)));
        }
        BeamCommand::Start => {
            beam.start()?;
            ctx.success("Beam control started");
        }
        BeamCommand::Stop => {
            beam.stop()?;
            ctx.success("Beam control stopped");
        }
        BeamCommand::Reset => {
            beam.reset()?;
            ctx.success("Beam control reset");
        }
    }
    Ok(())
}

/// Submits the run to an in-process queue and prints what a worker would
/// receive.
pub fn handle_sed(ctx: &mut HandlerContext, params: SedParams) -> HandlerResult {
    let (tx, rx) = work_queue();
    let submitter = ExperimentSubmitter::new(tx, TriggerEvent::new());
    submitter.submit(params)?;
    let item = rx.try_recv()?;
    let mut record = serde_json::to_value(&item)?;
    record["triggered"] = json!(submitter.trigger().is_set());
    ctx.output_record("Submitted", &record)
}

pub fn handle_calib(ctx: &mut HandlerContext, command: CalibCommand) -> HandlerResult {
    let CalibCommand::Show { kind, axis, dir } = command;
    let base = dir.unwrap_or_else(|| ctx.config().calib_dir.clone());
    let path = calibration_path(&base, kind);
    let calibration = load_calibration(kind, &path)?;
    let mut sink = SeriesCollector::default();
    plot(&calibration, &mut sink, axis.as_deref())?;
    match ctx.format {
        OutputFormat::Json => ctx.presenter().present_value(&serde_json::to_value(&sink)?),
        OutputFormat::Text => {
            let items: Vec<String> = sink
                .series
                .iter()
                .map(|s| format!("{} ({} points)", s.name, s.points.len()))
                .collect();
            ctx.output_list(&format!("{}:", path.display()), "No series", &items);
        }
    }
    Ok(())
}
