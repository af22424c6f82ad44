//! Input commands, sampled between ticks.

use crate::simulation::GravitySimulation;
use anyhow::Result;
use gravity_common::{Command, ScheduledCommand};
use log::{debug, info};
use std::collections::VecDeque;
use std::path::PathBuf;

const ZOOM_IN_FACTOR: f64 = 0.99;
const ZOOM_OUT_FACTOR: f64 = 1.01;

/// Presentation state owned by the loop, not by the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub zoom: f64,
    pub show_trails: bool,
    pub paused: bool,
    pub quit_requested: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { zoom: 1.0, show_trails: false, paused: false, quit_requested: false }
    }
}

/// FIFO of commands waiting for the next gap between ticks.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<Command>,
}

impl CommandQueue {
    pub fn push(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Command> + '_ {
        self.pending.drain(..)
    }
}

/// Feeds scheduled commands into the queue and applies them to the simulation.
pub struct Controller {
    pub view: ViewState,
    pub queue: CommandQueue,
    schedule: Vec<ScheduledCommand>,
    next_scheduled: usize,
    base_filename: String,
    saved_images: Vec<PathBuf>,
}

impl Controller {
    pub fn new(schedule: &[ScheduledCommand], base_filename: &str) -> Self {
        let mut schedule = schedule.to_vec();
        // Stable, so commands on the same frame keep their file order.
        schedule.sort_by_key(|c| c.frame);
        Self {
            view: ViewState::default(),
            queue: CommandQueue::default(),
            schedule,
            next_scheduled: 0,
            base_filename: base_filename.to_string(),
            saved_images: Vec::new(),
        }
    }

    /// Queues every scheduled command due at or before `frame`.
    pub fn enqueue_due(&mut self, frame: u64) {
        while let Some(scheduled) = self.schedule.get(self.next_scheduled) {
            if scheduled.frame > frame {
                break;
            }
            self.queue.push(scheduled.command);
            self.next_scheduled += 1;
        }
    }

    pub fn has_scheduled(&self) -> bool {
        self.next_scheduled < self.schedule.len()
    }

    pub fn saved_images(&self) -> &[PathBuf] {
        &self.saved_images
    }

    /// Applies every queued command, in order.
    pub fn process_pending(&mut self, sim: &mut GravitySimulation) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }
        debug!("Applying {} queued commands.", self.queue.len());
        let commands: Vec<Command> = self.queue.drain().collect();
        for command in commands {
            self.apply(sim, command)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, sim: &mut GravitySimulation, command: Command) -> Result<()> {
        info!("Command '{}' at tick {}", command, sim.current_time_step);
        match command {
            Command::ZoomIn => self.view.zoom /= ZOOM_IN_FACTOR,
            Command::ZoomOut => self.view.zoom /= ZOOM_OUT_FACTOR,
            Command::ToggleTrails => self.view.show_trails = !self.view.show_trails,
            Command::Pause => self.view.paused = !self.view.paused,
            Command::Quit => self.view.quit_requested = true,
            Command::Save => {
                let path = PathBuf::from(format!(
                    "{}_trails_{}.png",
                    self.base_filename, sim.current_time_step
                ));
                sim.save_trail_png(&path)?;
                self.saved_images.push(path);
            }
            Command::Reset => sim.reset()?,
            Command::SpeedUp => sim.speed_up(),
            Command::SpeedDown => sim.speed_down(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravity_common::SimulationConfig;

    fn small_sim() -> GravitySimulation {
        let mut config = SimulationConfig::default();
        config.seeding.grid_half_x = 2;
        config.seeding.grid_half_y = 2;
        GravitySimulation::new(config).unwrap()
    }

    fn scheduled(frame: u64, command: Command) -> ScheduledCommand {
        ScheduledCommand { frame, command }
    }

    #[test]
    fn schedule_is_released_in_frame_order() {
        let schedule = vec![
            scheduled(5, Command::Quit),
            scheduled(1, Command::ZoomIn),
            scheduled(1, Command::ZoomOut),
        ];
        let mut controller = Controller::new(&schedule, "unused");
        controller.enqueue_due(0);
        assert!(controller.queue.is_empty());
        controller.enqueue_due(3);
        let due: Vec<Command> = controller.queue.drain().collect();
        assert_eq!(due, vec![Command::ZoomIn, Command::ZoomOut]);
        assert!(controller.has_scheduled());
        controller.enqueue_due(5);
        assert_eq!(controller.queue.len(), 1);
        assert!(!controller.has_scheduled());
    }

    #[test]
    fn view_commands_toggle_and_zoom() {
        let mut sim = small_sim();
        let mut controller = Controller::new(&[], "unused");
        for command in [Command::ZoomIn, Command::ToggleTrails, Command::Pause] {
            controller.queue.push(command);
        }
        controller.process_pending(&mut sim).unwrap();
        assert!((controller.view.zoom - 1.0 / 0.99).abs() < 1e-12);
        assert!(controller.view.show_trails);
        assert!(controller.view.paused);

        controller.apply(&mut sim, Command::ZoomOut).unwrap();
        assert!((controller.view.zoom - 1.0 / 0.99 / 1.01).abs() < 1e-12);
        controller.apply(&mut sim, Command::Pause).unwrap();
        assert!(!controller.view.paused);
        controller.apply(&mut sim, Command::Quit).unwrap();
        assert!(controller.view.quit_requested);
    }

    #[test]
    fn speed_and_reset_reach_the_simulation() {
        let mut sim = small_sim();
        let mut controller = Controller::new(&[], "unused");
        controller.apply(&mut sim, Command::SpeedUp).unwrap();
        controller.apply(&mut sim, Command::SpeedUp).unwrap();
        assert_eq!(sim.dt(), 4.0);
        controller.apply(&mut sim, Command::SpeedDown).unwrap();
        assert_eq!(sim.dt(), 2.0);
        sim.step();
        controller.apply(&mut sim, Command::Reset).unwrap();
        assert_eq!(sim.current_time_step, 0);
        assert_eq!(sim.dt(), 1.0);
    }

    #[test]
    fn save_writes_a_trail_png() {
        let mut sim = small_sim();
        let base = std::env::temp_dir().join(format!("control_save_{}", std::process::id()));
        let mut controller = Controller::new(&[], base.to_str().unwrap());
        controller.apply(&mut sim, Command::Save).unwrap();
        let saved = controller.saved_images().to_vec();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].exists());
        std::fs::remove_file(&saved[0]).ok();
    }
}
