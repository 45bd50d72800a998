//! Acquisition manager orchestration: setups, signal links and the
//! acquisition servers.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{Result, TiaError};
use crate::graph::ImageNode;
use crate::modes::SignalType;
use crate::ports::RemoteRef;
use crate::servers::{BeamControlProxy, CcdServerProxy, ScanningServerProxy};

/// Coarse acquisition state derived from the remote's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcquisitionState {
    Idle,
    /// A setup is selected and the remote reports it can start.
    Armed,
    Acquiring,
}

/// Where a signal's frames are displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalLink {
    pub window: String,
    pub display: String,
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignalsByType {
    pub detectors: Vec<String>,
    pub ccds: Vec<String>,
}

pub struct AcquisitionController {
    remote: RemoteRef,
    setup: Option<String>,
    links: BTreeMap<String, SignalLink>,
    signals: SignalsByType,
    ccd: CcdServerProxy,
    scanning: ScanningServerProxy,
    beam: BeamControlProxy,
}

impl AcquisitionController {
    /// Attaches to the acquisition manager and loads all three servers.
    pub fn new(remote: RemoteRef) -> Result<Self> {
        let signals = read_signals(&remote)?;
        let ccd = CcdServerProxy::load(remote.clone())?;
        let scanning = ScanningServerProxy::load(remote.clone())?;
        let beam = BeamControlProxy::create(remote.clone())?;
        let setup = if remote.is_current_setup()? {
            Some(remote.current_setup()?)
        } else {
            None
        };

        Ok(Self {
            remote,
            setup,
            links: BTreeMap::new(),
            signals,
            ccd,
            scanning,
            beam,
        })
    }

    pub fn state(&self) -> Result<AcquisitionState> {
        if self.remote.is_acquiring()? {
            return Ok(AcquisitionState::Acquiring);
        }
        if self.setup.is_some() && self.remote.can_start()? {
            return Ok(AcquisitionState::Armed);
        }
        Ok(AcquisitionState::Idle)
    }

    pub fn is_acquiring(&self) -> Result<bool> {
        self.remote.is_acquiring()
    }

    pub fn can_start(&self) -> Result<bool> {
        self.remote.can_start()
    }

    pub fn can_stop(&self) -> Result<bool> {
        self.remote.can_stop()
    }

    /// Returns immediately; poll [`Self::is_acquiring`] for completion.
    #[instrument(skip(self))]
    pub fn start_acquisition(&self) -> Result<()> {
        self.remote.start()
    }

    #[instrument(skip(self))]
    pub fn stop_acquisition(&self) -> Result<()> {
        self.remote.stop()
    }

    /// Blocks until the remote finishes one acquisition.
    #[instrument(skip(self))]
    pub fn acquire_single(&self) -> Result<()> {
        self.remote.acquire()
    }

    /// Blocks while the remote acquires at every position of `collection`.
    /// The current setup must be in spot mode; the remote enforces this.
    #[instrument(skip(self))]
    pub fn acquire_set(&self, collection: &str, dwell_time: f64) -> Result<()> {
        self.remote.acquire_set(collection, dwell_time)
    }

    pub fn setup(&self) -> Option<&str> {
        self.setup.as_deref()
    }

    pub fn does_setup_exist(&self, name: &str) -> Result<bool> {
        self.remote.does_setup_exist(name)
    }

    pub fn does_current_setup_exist(&self) -> Result<bool> {
        self.remote.is_current_setup()
    }

    pub fn current_setup_name(&self) -> Result<String> {
        self.remote.current_setup()
    }

    #[instrument(skip(self))]
    pub fn select_setup(&mut self, name: &str) -> Result<()> {
        if !self.remote.does_setup_exist(name)? {
            return Err(TiaError::SetupNotFound(name.to_string()));
        }
        self.remote.select_setup(name)?;
        self.setup = Some(name.to_string());
        self.scanning.refresh()?;
        self.ccd.refresh()?;
        info!(setup = name, "Setup selected");
        Ok(())
    }

    pub fn add_setup(&self, name: &str) -> Result<()> {
        self.remote.add_setup(name)
    }

    pub fn delete_setup(&mut self, name: &str) -> Result<()> {
        self.remote.delete_setup(name)?;
        if self.setup.as_deref() == Some(name) {
            self.setup = None;
        }
        Ok(())
    }

    /// Routes `signal` to `image`. A signal has at most one link; linking it
    /// again replaces the previous one.
    pub fn link_signal(&mut self, signal: &str, image: &ImageNode) -> Result<()> {
        self.remote
            .link_signal(signal, image.window(), image.display(), image.name())?;
        let link = SignalLink {
            window: image.window().to_string(),
            display: image.display().to_string(),
            image: image.name().to_string(),
        };
        if let Some(previous) = self.links.insert(signal.to_string(), link) {
            info!(signal, previous_image = %previous.image, "Signal link replaced");
        }
        Ok(())
    }

    pub fn unlink_signal(&mut self, signal: &str) -> Result<()> {
        self.remote.unlink_signal(signal)?;
        if self.links.remove(signal).is_none() {
            warn!(signal, "Signal was not linked locally");
        }
        Ok(())
    }

    pub fn unlink_all_signals(&mut self) -> Result<()> {
        self.remote.unlink_all_signals()?;
        self.links.clear();
        Ok(())
    }

    pub fn linked_signals(&self) -> &BTreeMap<String, SignalLink> {
        &self.links
    }

    pub fn available_signal_names(&self) -> Result<Vec<String>> {
        self.remote.signal_names()
    }

    pub fn enabled_signal_names(&self) -> Result<Vec<String>> {
        self.remote.enabled_signal_names()
    }

    /// Re-reads detector and camera signal names.
    pub fn signals_by_type(&mut self) -> Result<&SignalsByType> {
        self.signals = read_signals(&self.remote)?;
        Ok(&self.signals)
    }

    /// Signal names as read at construction or by the last
    /// [`Self::signals_by_type`].
    pub fn signals(&self) -> &SignalsByType {
        &self.signals
    }

    pub fn ccd(&self) -> &CcdServerProxy {
        &self.ccd
    }

    pub fn ccd_mut(&mut self) -> &mut CcdServerProxy {
        &mut self.ccd
    }

    pub fn scanning(&self) -> &ScanningServerProxy {
        &self.scanning
    }

    pub fn scanning_mut(&mut self) -> &mut ScanningServerProxy {
        &mut self.scanning
    }

    pub fn beam(&self) -> &BeamControlProxy {
        &self.beam
    }

    pub fn beam_mut(&mut self) -> &mut BeamControlProxy {
        &mut self.beam
    }
}

fn read_signals(remote: &RemoteRef) -> Result<SignalsByType> {
    Ok(SignalsByType {
        detectors: remote.typed_signal_names(SignalType::Detectors)?,
        ccds: remote.typed_signal_names(SignalType::Ccds)?,
    })
}

#[cfg(test)]
mod tests {
    use tia_ipc::error_codes;

    use super::*;
    use crate::adapter::RemoteAdapter;
    use crate::graph::{DisplayOptions, SessionGraph};
    use crate::modes::ScanMode;
    use crate::test_support::FakeTia;
    use crate::values::Position2D;

    fn controller() -> (AcquisitionController, FakeTia) {
        let fake = FakeTia::new();
        let remote = RemoteAdapter::shared(fake.clone());
        (AcquisitionController::new(remote).unwrap(), fake)
    }

    #[test]
    fn test_new_reads_current_setup_and_signals() {
        let (acq, _fake) = controller();
        assert_eq!(acq.setup(), Some("Image"));
        assert_eq!(acq.signals().detectors, vec!["BF", "HAADF", "DF2"]);
        assert_eq!(acq.signals().ccds, vec!["BM-Ceta"]);
    }

    #[test]
    fn test_state_transitions() {
        let (acq, fake) = controller();
        assert_eq!(acq.state().unwrap(), AcquisitionState::Armed);

        acq.start_acquisition().unwrap();
        assert!(fake.is_acquiring());
        assert_eq!(acq.state().unwrap(), AcquisitionState::Acquiring);
        assert!(acq.can_stop().unwrap());

        acq.stop_acquisition().unwrap();
        assert_eq!(acq.state().unwrap(), AcquisitionState::Armed);
    }

    #[test]
    fn test_deleting_selected_setup_returns_to_idle() {
        let (mut acq, _fake) = controller();
        acq.delete_setup("Image").unwrap();
        assert_eq!(acq.setup(), None);
        assert!(!acq.does_current_setup_exist().unwrap());
        assert_eq!(acq.state().unwrap(), AcquisitionState::Idle);
    }

    #[test]
    fn test_select_unknown_setup_issues_no_select_call() {
        let (mut acq, fake) = controller();
        let err = acq.select_setup("Nope").unwrap_err();
        assert!(matches!(err, TiaError::SetupNotFound(ref name) if name == "Nope"));
        assert_eq!(fake.call_count("SelectSetup"), 0);
        assert_eq!(acq.setup(), Some("Image"));
    }

    #[test]
    fn test_select_setup_refreshes_both_servers() {
        let (mut acq, fake) = controller();
        let scanning_reads = fake.call_count("GetScanningServer");
        let ccd_reads = fake.call_count("GetCCDServer");

        acq.select_setup("Spot").unwrap();
        assert_eq!(fake.call_count("GetScanningServer"), scanning_reads + 1);
        assert_eq!(fake.call_count("GetCCDServer"), ccd_reads + 1);
    }

    #[test]
    fn test_acquire_set_requires_spot_mode() {
        let (mut acq, fake) = controller();
        let mut graph = SessionGraph::new(RemoteAdapter::shared(fake.clone())).unwrap();
        let pc = graph.add_position_collection("pc").unwrap();
        pc.add_position(Position2D::new(0.1, 0.1)).unwrap();
        pc.add_position(Position2D::new(0.2, 0.2)).unwrap();

        let err = acq.acquire_set("pc", 0.01).unwrap_err();
        assert!(matches!(err, TiaError::InvalidMode { .. }));
        assert_eq!(err.code(), error_codes::INVALID_MODE);

        acq.select_setup("Spot").unwrap();
        assert_eq!(acq.scanning().scan_mode(), ScanMode::Spot);
        acq.acquire_set("pc", 0.01).unwrap();
        assert_eq!(fake.acquisition_count(), 2);
    }

    #[test]
    fn test_relinking_replaces_previous_link() {
        let (mut acq, fake) = controller();
        fake.seed_calibration2d("cal", [0.0, 0.0], [1.0, 1.0]);
        let mut graph = SessionGraph::new(RemoteAdapter::shared(fake.clone())).unwrap();
        graph.open(Some("W")).unwrap();
        let window = graph.require_window_mut("W").unwrap();
        window.add_display("D", DisplayOptions::default()).unwrap();
        let display = window.display_mut("D").unwrap();
        display.add_image("a", 4, 4, "cal").unwrap();
        display.add_image("b", 4, 4, "cal").unwrap();

        acq.link_signal("HAADF", display.image("a").unwrap()).unwrap();
        acq.link_signal("HAADF", display.image("b").unwrap()).unwrap();

        assert_eq!(acq.linked_signals().len(), 1);
        assert_eq!(acq.linked_signals()["HAADF"].image, "b");
        assert_eq!(
            fake.linked_image("HAADF"),
            Some(("W".to_string(), "D".to_string(), "b".to_string()))
        );

        acq.unlink_all_signals().unwrap();
        assert!(acq.linked_signals().is_empty());
        assert_eq!(fake.linked_image("HAADF"), None);
    }

    #[test]
    fn test_enabled_signals_are_a_subset() {
        let (acq, _fake) = controller();
        let all = acq.available_signal_names().unwrap();
        let enabled = acq.enabled_signal_names().unwrap();
        assert!(enabled.iter().all(|s| all.contains(s)));
        assert!(!enabled.contains(&"DF2".to_string()));
    }

    #[test]
    fn test_acquire_single_blocks_until_done() {
        let (acq, fake) = controller();
        acq.acquire_single().unwrap();
        assert_eq!(fake.acquisition_count(), 1);
        assert!(!acq.is_acquiring().unwrap());
    }
}
