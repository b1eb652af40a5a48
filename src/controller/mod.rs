//! The Controller aggregates fixture state into DMX frames and sends them down the bus.
//!
//! Every frame carries the value of every channel, so the controller recomposes
//! the whole universe from all attached fixtures each time anything changes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{ControllerConfig, Root};
use crate::device::{Buffer, Fixture};
use crate::error::{Error, Result};
use crate::host::{self, CaptureHost, DmxHost, FrameReader, PipeHost, TransportSink};

pub mod animation;
pub mod resolver;

use animation::{NoDelay, Pacer, RealTime};
pub use resolver::{CommandTable, Dispatch};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a controller without keeping it alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerId(u64);

impl ControllerId {
    fn next() -> ControllerId {
        ControllerId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Aggregates fixtures on one universe and streams their frames.
pub struct Controller {
    id: ControllerId,
    config: ControllerConfig,
    /// Attached fixtures, in attach order.
    fixtures: Vec<Box<dyn Fixture>>,
    /// Command name lookup, kept in step with `fixtures`.
    table: CommandTable,
    sink: TransportSink,
    pacer: Box<dyn Pacer>,
    /// Read end of the capture host in test mode.
    reader: Option<FrameReader>,
}

impl Controller {
    /// Create a controller without fixtures.
    ///
    /// In test mode frames are captured in memory (see `frame_reader`) and
    /// animations don't sleep. Otherwise the configured command is launched on
    /// the first write.
    pub fn new(config: ControllerConfig) -> Controller {
        if config.test {
            let (host, reader) = CaptureHost::new();
            let mut controller = Controller::with_host(config, Box::new(host));
            controller.reader = Some(reader);
            controller
        } else {
            let host = PipeHost::new(config.command());
            Controller::with_host(config, Box::new(host))
        }
    }

    /// Create a controller writing to a custom host.
    pub fn with_host(config: ControllerConfig, host: Box<dyn DmxHost>) -> Controller {
        let pacer: Box<dyn Pacer> = if config.test {
            Box::new(NoDelay::new())
        } else {
            Box::new(RealTime)
        };
        Controller {
            id: ControllerId::next(),
            config,
            fixtures: vec![],
            table: CommandTable::new(),
            sink: TransportSink::new(host),
            pacer,
            reader: None,
        }
    }

    /// Create a controller and attach an initial set of fixtures in order.
    pub fn with_fixtures(config: ControllerConfig, fixtures: Vec<Box<dyn Fixture>>) -> Controller {
        let mut controller = Controller::new(config);
        for fixture in fixtures {
            controller.attach_boxed(fixture);
        }
        controller
    }

    /// Set up a controller and its fixture patch from a configuration.
    pub fn from_config(config: &Root) -> Controller {
        let fixtures = config.fixtures.iter().map(|f| f.build()).collect();
        Controller::with_fixtures(config.controller.clone(), fixtures)
    }

    /// Replace the pacer used between animation ticks.
    pub fn set_pacer(&mut self, pacer: Box<dyn Pacer>) {
        self.pacer = pacer;
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn fps(&self) -> f64 {
        self.config.fps
    }

    pub fn universe(&self) -> u16 {
        self.config.universe
    }

    /// Bus process command line.
    pub fn cmd(&self) -> String {
        self.config.command()
    }

    /// Whether frames are captured and animations run without delay.
    pub fn is_test_mode(&self) -> bool {
        self.config.test
    }

    /// Captured frames, in test mode only.
    pub fn frame_reader(&self) -> Option<&FrameReader> {
        self.reader.as_ref()
    }

    /// Frames written since the controller was created.
    pub fn frames_written(&self) -> u64 {
        self.sink.frames_written()
    }

    /// Attach a fixture. A missing start address is placed right after the
    /// channels already in use.
    pub fn attach<F: Fixture + 'static>(&mut self, fixture: F) {
        self.attach_boxed(Box::new(fixture))
    }

    pub fn attach_boxed(&mut self, mut fixture: Box<dyn Fixture>) {
        if fixture.start_address().is_none() {
            fixture.set_start_address(self.compose().len() + 1);
        }
        fixture.set_controller(self.id);

        let index = self.fixtures.len();
        self.table.register(index, fixture.as_ref());
        debug!(
            "Attached fixture {} at {:?} ({} channels)",
            index,
            fixture.start_address(),
            fixture.capabilities().len()
        );
        self.fixtures.push(fixture);
    }

    pub fn fixtures(&self) -> &[Box<dyn Fixture>] {
        &self.fixtures
    }

    /// Mutable access to the attached fixtures. The set itself can't change.
    pub fn fixtures_mut(&mut self) -> &mut [Box<dyn Fixture>] {
        &mut self.fixtures
    }

    /// Compose the current values of all fixtures into one frame.
    ///
    /// Later fixtures overwrite earlier ones where their channels overlap and
    /// channels nobody covers are zero.
    pub fn compose(&self) -> Vec<f64> {
        // DMX addresses start at 1, so slot 0 is a placeholder that gets dropped.
        let mut results: Vec<f64> = vec![];
        for fixture in &self.fixtures {
            let start = fixture.start_address().unwrap_or(0);
            let values = fixture.current_values();
            let end = start + values.len();
            if results.len() < end {
                results.resize(end, 0.0);
            }
            results[start..end].copy_from_slice(&values);
        }
        if !results.is_empty() {
            results.remove(0);
        }
        results
    }

    /// The current frame in the wire format, without the line terminator.
    pub fn serialize(&self) -> String {
        host::serialize(&self.compose())
    }

    pub fn to_dmx(&self) -> String {
        self.serialize()
    }

    /// Every capability name of the attached fixtures, first-declared first.
    pub fn capabilities(&self) -> &[String] {
        self.table.capabilities()
    }

    /// Every point name of the attached fixtures, first-declared first.
    pub fn points(&self) -> &[String] {
        self.table.points()
    }

    /// Buffer requests on every fixture without writing.
    pub fn buffer(&mut self, requests: &[Buffer]) {
        for fixture in &mut self.fixtures {
            for request in requests {
                fixture.buffer(request);
            }
        }
    }

    /// Buffer requests and write the resulting frame.
    pub fn instant(&mut self, requests: &[Buffer]) -> Result<()> {
        self.buffer(requests);
        self.write()
    }

    /// Write the current frame.
    pub fn write(&mut self) -> Result<()> {
        let values = self.compose();
        self.sink.write(&values)
    }

    /// Look up a command name without applying it.
    pub fn resolve(&self, name: &str, value: Option<f64>) -> Result<Dispatch> {
        self.table.resolve(name, value)
    }

    /// Run a named command.
    ///
    /// `center` or `pan` with a value only buffer. A trailing `!` (`center!`,
    /// `pan!`) also writes the frame right away.
    pub fn call(&mut self, name: &str, value: Option<f64>) -> Result<()> {
        if !self.table.contains(name) {
            if let Some(bare) = name.strip_suffix('!') {
                return self.call_instant(bare, value);
            }
        }
        let dispatch = self.table.resolve(name, value)?;
        self.apply(&dispatch);
        Ok(())
    }

    /// Run a named command and write the frame.
    pub fn call_instant(&mut self, name: &str, value: Option<f64>) -> Result<()> {
        let dispatch = self.table.resolve(name, value)?;
        self.apply(&dispatch);
        self.write()
    }

    fn apply(&mut self, dispatch: &Dispatch) {
        for &index in &dispatch.fixtures {
            self.fixtures[index].buffer(&dispatch.request);
        }
    }

    /// Number of frames an animation of `seconds` takes.
    pub fn ticks(&self, seconds: f64) -> usize {
        animation::ticks(seconds, self.config.fps)
    }

    /// Delay between two animation frames. Fails unless fps is positive.
    pub fn wait_time(&self) -> Result<Duration> {
        animation::wait_time(self.config.fps)
    }

    /// Frame `step` of `total` between two frames.
    pub fn interpolate(&self, first: &[f64], last: &[f64], total: usize, step: usize) -> Vec<f64> {
        animation::interpolate(first, last, total, step)
    }

    /// Fade from the current frame to the one produced by buffering `requests`.
    pub fn animate(&mut self, seconds: f64, requests: &[Buffer]) -> Result<()> {
        self.animate_with(seconds, |fixtures| {
            for fixture in fixtures.iter_mut() {
                for request in requests {
                    fixture.buffer(request);
                }
            }
        })
    }

    /// Fade towards the result of a named command.
    pub fn animate_command(&mut self, seconds: f64, name: &str, value: Option<f64>) -> Result<()> {
        self.animate_commands(seconds, &[(name, value)])
    }

    /// Fade towards the result of several named commands, applied in order.
    ///
    /// Every name is resolved before anything is buffered.
    pub fn animate_commands<S: AsRef<str>>(
        &mut self,
        seconds: f64,
        commands: &[(S, Option<f64>)],
    ) -> Result<()> {
        let dispatches = commands
            .iter()
            .map(|(name, value)| self.table.resolve(name.as_ref(), *value))
            .collect::<Result<Vec<_>>>()?;
        self.animate_with(seconds, |fixtures| {
            for dispatch in &dispatches {
                for &index in &dispatch.fixtures {
                    fixtures[index].buffer(&dispatch.request);
                }
            }
        })
    }

    /// Fade from the current frame to whatever `mutate` leaves the fixtures at.
    ///
    /// `mutate` must only buffer values. Moving fixtures so that the frame
    /// length changes is refused before anything is written. The mutation is
    /// not rolled back in that case: the fixtures keep whatever `mutate` did.
    pub fn animate_with<F>(&mut self, seconds: f64, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut [Box<dyn Fixture>]),
    {
        let previous = self.compose();
        mutate(&mut self.fixtures);
        let current = self.compose();
        if previous.len() != current.len() {
            return Err(Error::FrameLengthMismatch {
                before: previous.len(),
                after: current.len(),
            });
        }

        let count = self.ticks(seconds);
        debug!("Animating {} channels over {} ticks", current.len(), count);
        // A single tick never waits, whatever the frame rate.
        let period = if count > 1 {
            self.wait_time()?
        } else {
            Duration::ZERO
        };
        let sink = &mut self.sink;
        animation::run(
            &previous,
            &current,
            count,
            period,
            self.pacer.as_mut(),
            |frame| sink.write(frame),
        )
    }

    /// Close the bus process. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.sink.close()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Failed to close controller output: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DmxDevice;

    fn head(address: usize) -> DmxDevice {
        DmxDevice::new(vec!["pan", "tilt", "dimmer"])
            .with_point("center", vec![("pan", 127.0), ("tilt", 127.0)])
            .at(address)
    }

    fn two_heads() -> Controller {
        let mut controller = Controller::new(ControllerConfig::for_tests());
        controller.attach(head(1));
        controller.attach(head(4));
        controller
    }

    fn next_frame(controller: &Controller) -> Option<String> {
        controller.frame_reader().and_then(|reader| reader.next_frame())
    }

    #[test]
    fn test_default_config() {
        let controller = Controller::new(ControllerConfig::default());
        assert_eq!(controller.fps(), 40.0);
        assert_eq!(controller.universe(), 1);
        assert_eq!(controller.cmd(), "ola_streaming_client -u 1");
        assert!(!controller.is_test_mode());
        assert!(controller.frame_reader().is_none());
    }

    #[test]
    fn test_devices_keep_attach_order() {
        let mut controller = Controller::new(ControllerConfig::for_tests());
        controller.attach(DmxDevice::new(vec!["dimmer"]).at(1));
        controller.attach(DmxDevice::new(vec!["dimmer"]).at(6));
        let fixtures = controller.fixtures();
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[0].start_address(), Some(1));
        assert_eq!(fixtures[1].start_address(), Some(6));
        assert_eq!(fixtures[0].controller(), Some(controller.id()));
        assert_eq!(fixtures[1].controller(), Some(controller.id()));
    }

    #[test]
    fn test_default_start_address() {
        let mut controller = Controller::new(ControllerConfig::for_tests());
        for _ in 0..3 {
            controller.attach(DmxDevice::new(vec!["pan", "tilt"]));
        }
        let addresses: Vec<_> = controller
            .fixtures()
            .iter()
            .map(|f| f.start_address())
            .collect();
        assert_eq!(addresses, vec![Some(1), Some(3), Some(5)]);
    }

    #[test]
    fn test_empty_controller_composes_nothing() {
        let controller = Controller::new(ControllerConfig::for_tests());
        assert!(controller.compose().is_empty());
        assert_eq!(controller.to_dmx(), "");
    }

    #[test]
    fn test_serializes_all_devices() {
        let mut controller = two_heads();
        assert_eq!(controller.capabilities(), &["pan", "tilt", "dimmer"]);
        assert_eq!(controller.points(), &["center"]);

        assert_eq!(controller.to_dmx(), "0,0,0,0,0,0");
        controller.buffer(&[Buffer::value("pan", 255.0)]);
        assert_eq!(controller.to_dmx(), "255,0,0,255,0,0");
        controller.buffer(&[Buffer::point("center")]);
        assert_eq!(controller.to_dmx(), "127,127,0,127,127,0");
    }

    #[test]
    fn test_named_commands_buffer() {
        let mut controller = two_heads();
        controller.call("center", None).unwrap();
        assert_eq!(controller.to_dmx(), "127,127,0,127,127,0");
        controller.call("dimmer", Some(80.0)).unwrap();
        assert_eq!(controller.to_dmx(), "127,127,80,127,127,80");
        controller.call("pan", Some(25.0)).unwrap();
        assert_eq!(controller.to_dmx(), "25,127,80,25,127,80");
        controller.call("center", None).unwrap();
        assert_eq!(controller.to_dmx(), "127,127,80,127,127,80");
        assert_eq!(next_frame(&controller), None);
    }

    #[test]
    fn test_named_commands_write_with_bang() {
        let mut controller = two_heads();
        controller.call("center!", None).unwrap();
        assert_eq!(next_frame(&controller).as_deref(), Some("127,127,0,127,127,0\n"));
        controller.call("dimmer!", Some(80.0)).unwrap();
        assert_eq!(next_frame(&controller).as_deref(), Some("127,127,80,127,127,80\n"));
        controller.close().unwrap();
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        let mut controller = two_heads();
        assert!(matches!(
            controller.call("offcenter", None),
            Err(Error::UnknownCommand(ref name)) if name == "offcenter"
        ));
        assert!(matches!(
            controller.call("offcenter!", None),
            Err(Error::UnknownCommand(_))
        ));
        assert_eq!(controller.frames_written(), 0);
    }

    #[test]
    fn test_overlapping_start_address() {
        let mut controller = two_heads();
        controller.attach(DmxDevice::new(vec!["pan", "tilt", "dimmer"]).at(5));
        controller.buffer(&[Buffer::value("pan", 127.0)]);
        assert_eq!(controller.to_dmx(), "127,0,0,127,127,0,0");
    }

    #[test]
    fn test_later_fixture_wins_overlap() {
        let mut controller = Controller::new(ControllerConfig::for_tests());
        controller.attach(DmxDevice::new(vec!["pan", "tilt"]).at(5));
        controller.attach(DmxDevice::new(vec!["pan", "tilt"]).at(5));
        controller.fixtures_mut()[0].buffer(&Buffer::value("pan", 10.0));
        controller.fixtures_mut()[1].buffer(&Buffer::value("pan", 20.0));
        assert_eq!(controller.compose(), vec![0.0, 0.0, 0.0, 0.0, 20.0, 0.0]);
    }

    #[test]
    fn test_gaps_are_zero() {
        let mut controller = two_heads();
        controller.attach(DmxDevice::new(vec!["pan", "tilt", "dimmer"]).at(9));
        controller.buffer(&[Buffer::value("pan", 127.0)]);
        assert_eq!(controller.to_dmx(), "127,0,0,127,0,0,0,0,127,0,0");
    }

    #[test]
    fn test_instant_writes() {
        let mut controller = two_heads();
        controller.instant(&[Buffer::value("pan", 127.0)]).unwrap();
        assert_eq!(next_frame(&controller).as_deref(), Some("127,0,0,127,0,0\n"));
    }

    #[test]
    fn test_animate_writes_interpolated_values() {
        let mut controller = Controller::new(ControllerConfig {
            fps: 1.0,
            ..ControllerConfig::for_tests()
        });
        controller.attach(head(1));
        controller.attach(head(4));

        controller.animate(5.0, &[Buffer::value("pan", 25.0)]).unwrap();
        let frames = controller.frame_reader().unwrap().frames();
        assert_eq!(
            frames,
            vec![
                "5,0,0,5,0,0\n",
                "10,0,0,10,0,0\n",
                "15,0,0,15,0,0\n",
                "20,0,0,20,0,0\n",
                "25,0,0,25,0,0\n",
            ]
        );
    }

    #[test]
    fn test_animate_with_callback() {
        let mut controller = Controller::new(ControllerConfig {
            fps: 1.0,
            ..ControllerConfig::for_tests()
        });
        controller.attach(head(1));
        controller.attach(head(4));

        controller
            .animate_with(5.0, |fixtures| {
                fixtures[0].buffer(&Buffer::value("pan", 25.0));
                fixtures[1].buffer(&Buffer::value("pan", 50.0));
            })
            .unwrap();
        let frames = controller.frame_reader().unwrap().frames();
        assert_eq!(frames.first().map(String::as_str), Some("5,0,0,10,0,0\n"));
        assert_eq!(frames.get(2).map(String::as_str), Some("15,0,0,30,0,0\n"));
        assert_eq!(frames.last().map(String::as_str), Some("25,0,0,50,0,0\n"));
        assert_eq!(frames.len(), 5);
    }

    #[test]
    fn test_animate_after_buffering() {
        let mut controller = Controller::new(ControllerConfig {
            fps: 1.0,
            ..ControllerConfig::for_tests()
        });
        controller.attach(head(1));
        controller.attach(head(4));

        controller.call("dimmer", Some(50.0)).unwrap();
        assert_eq!(controller.to_dmx(), "0,0,50,0,0,50");
        controller.animate(1.0, &[Buffer::value("dimmer", 127.0)]).unwrap();
        assert_eq!(next_frame(&controller).as_deref(), Some("0,0,127,0,0,127\n"));
        assert_eq!(next_frame(&controller), None);
    }

    #[test]
    fn test_animate_command() {
        let mut controller = Controller::new(ControllerConfig {
            fps: 2.0,
            ..ControllerConfig::for_tests()
        });
        controller.attach(head(1));
        controller.animate_command(1.0, "center", None).unwrap();
        let frames = controller.frame_reader().unwrap().frames();
        assert_eq!(frames, vec!["63,63,0\n", "127,127,0\n"]);

        assert!(matches!(
            controller.animate_command(1.0, "zoom", Some(1.0)),
            Err(Error::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_animate_commands_resolve_first() {
        let mut controller = Controller::new(ControllerConfig {
            fps: 1.0,
            ..ControllerConfig::for_tests()
        });
        controller.attach(head(1));

        let bad = [("dimmer", Some(200.0)), ("zoom", Some(1.0))];
        assert!(controller.animate_commands(1.0, &bad).is_err());
        assert_eq!(controller.to_dmx(), "0,0,0");

        let good = [("center".to_string(), None), ("dimmer".to_string(), Some(200.0))];
        controller.animate_commands(1.0, &good).unwrap();
        assert_eq!(next_frame(&controller).as_deref(), Some("127,127,200\n"));
    }

    #[test]
    fn test_animate_refuses_length_change() {
        let mut controller = two_heads();
        let result = controller.animate_with(1.0, |fixtures| fixtures[1].set_start_address(10));
        assert!(matches!(
            result,
            Err(Error::FrameLengthMismatch { before: 6, after: 12 })
        ));
        assert_eq!(controller.frames_written(), 0);
    }

    #[test]
    fn test_rejected_mutation_is_kept() {
        let mut controller = Controller::new(ControllerConfig::for_tests());
        controller.attach(DmxDevice::new(vec!["pan"]));
        let result = controller.animate_with(1.0, |fixtures| {
            fixtures[0].buffer(&Buffer::value("pan", 99.0));
            fixtures[0].set_start_address(3);
        });
        assert!(matches!(result, Err(Error::FrameLengthMismatch { before: 1, after: 3 })));
        assert_eq!(controller.to_dmx(), "0,0,99");
    }

    #[test]
    fn test_animate_without_positive_fps_writes_one_frame() {
        for fps in [0.0, -5.0] {
            let mut controller = Controller::new(ControllerConfig {
                fps,
                ..ControllerConfig::for_tests()
            });
            let clock = NoDelay::new();
            controller.set_pacer(Box::new(clock.clone()));
            controller.attach(DmxDevice::new(vec!["pan"]));

            assert_eq!(controller.ticks(10.0), 1);
            assert!(matches!(controller.wait_time(), Err(Error::InvalidFrameRate(_))));

            controller.animate(10.0, &[Buffer::value("pan", 10.0)]).unwrap();
            assert_eq!(controller.frame_reader().unwrap().frames(), vec!["10\n"]);
            assert_eq!(clock.waits(), 0);
        }
    }

    #[test]
    fn test_test_mode_skips_the_wait() {
        let mut controller = Controller::new(ControllerConfig {
            fps: 0.5,
            ..ControllerConfig::for_tests()
        });
        controller.attach(DmxDevice::new(vec!["pan"]));
        let started = std::time::Instant::now();
        controller.animate(60.0, &[Buffer::value("pan", 30.0)]).unwrap();
        assert_eq!(controller.frames_written(), 30);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(controller.wait_time().unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_animation_pacing_is_logical_in_test_mode() {
        let mut controller = Controller::new(ControllerConfig {
            fps: 4.0,
            ..ControllerConfig::for_tests()
        });
        let clock = NoDelay::new();
        controller.set_pacer(Box::new(clock.clone()));
        controller.attach(head(1));
        controller.animate(2.0, &[Buffer::value("dimmer", 255.0)]).unwrap();
        assert_eq!(controller.frames_written(), 8);
        assert_eq!(clock.waits(), 7);
        assert_eq!(clock.elapsed(), Duration::from_millis(1750));
    }
}
